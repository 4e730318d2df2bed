//! Property tests for series extraction and decomposition.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use bikeshare::models::{Granularity, StationId, TripEvent};
use bikeshare::services::additive_decompose;
use bikeshare::services::extractor::{arrivals, departures, net_flow};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 7, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Trips among stations 1..=3 within three days.
fn trips() -> impl Strategy<Value = Vec<TripEvent>> {
    prop::collection::vec((1i64..=3, 1i64..=3, 0i64..(72 * 60), 1i64..180), 1..60).prop_map(
        |rows| {
            rows.into_iter()
                .map(|(from, to, start_min, duration_min)| {
                    let start = t0() + Duration::minutes(start_min);
                    TripEvent {
                        start_station_id: StationId(from),
                        end_station_id: StationId(to),
                        start_time: start,
                        stop_time: start + Duration::minutes(duration_min),
                        trip_duration: (duration_min * 60) as f64,
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn net_flow_totals_match_trip_counts(trips in trips()) {
        let station = StationId(1);
        let flow = net_flow(&trips, station, Granularity::HOURLY).unwrap();
        let ends = trips.iter().filter(|t| t.end_station_id == station).count() as f64;
        let starts = trips.iter().filter(|t| t.start_station_id == station).count() as f64;

        prop_assert_eq!(flow.total(), ends - starts);
        prop_assert!(flow.is_contiguous());
        prop_assert_eq!(flow.missing_count(), 0);
    }

    #[test]
    fn arrivals_and_departures_count_every_trip(trips in trips()) {
        let station = StationId(2);
        let ends = trips.iter().filter(|t| t.end_station_id == station).count() as f64;
        let starts = trips.iter().filter(|t| t.start_station_id == station).count() as f64;

        prop_assert_eq!(arrivals(&trips, station, Granularity::HOURLY).unwrap().total(), ends);
        prop_assert_eq!(departures(&trips, station, Granularity::HOURLY).unwrap().total(), starts);
    }

    #[test]
    fn decomposition_components_sum_to_observed(
        values in prop::collection::vec(-50.0f64..50.0, 8..120),
        period in 2usize..5,
    ) {
        prop_assume!(values.len() >= 2 * period);
        let (trend, seasonal, residual) = additive_decompose(&values, period).unwrap();

        for i in 0..values.len() {
            let rebuilt = trend[i] + seasonal[i] + residual[i];
            prop_assert!((rebuilt - values[i]).abs() < 1e-9);
        }
        let cycle: f64 = seasonal[..period].iter().sum();
        prop_assert!(cycle.abs() < 1e-9);
    }
}
