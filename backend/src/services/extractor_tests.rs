use super::*;
use chrono::NaiveDate;

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 7, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn trip(from: i64, to: i64, start: NaiveDateTime, stop: NaiveDateTime) -> TripEvent {
    TripEvent {
        start_station_id: StationId(from),
        end_station_id: StationId(to),
        start_time: start,
        stop_time: stop,
        trip_duration: (stop - start).num_seconds() as f64,
    }
}

fn obs(station: i64, ts: NaiveDateTime, bikes: i64, total: i64) -> StatusObservation {
    StatusObservation {
        station_id: StationId(station),
        observed_at: ts,
        available_bikes: bikes,
        available_docks: total - bikes,
        total_docks: total,
    }
}

#[test]
fn test_net_flow_counts_ends_minus_starts() {
    let trips = vec![
        // Arrives at 72 in the 08:00 bucket.
        trip(79, 72, at(1, 7, 50), at(1, 8, 10)),
        trip(79, 72, at(1, 8, 0), at(1, 8, 20)),
        // Leaves 72 in the 08:00 bucket.
        trip(72, 79, at(1, 8, 30), at(1, 8, 55)),
        // Leaves 72 at 11:00.
        trip(72, 80, at(1, 11, 5), at(1, 11, 40)),
    ];

    let series = net_flow(&trips, StationId(72), Granularity::HOURLY).unwrap();
    assert_eq!(series.metric, SeriesMetric::NetFlow);
    assert_eq!(series.timestamps().first(), Some(&at(1, 8, 0)));
    assert_eq!(
        series.values(),
        vec![Some(1.0), Some(0.0), Some(0.0), Some(-1.0)]
    );
    assert!(series.is_contiguous());
}

#[test]
fn test_net_flow_total_matches_event_counts() {
    let trips = vec![
        trip(1, 2, at(1, 0, 0), at(1, 0, 30)),
        trip(2, 1, at(1, 5, 0), at(1, 6, 30)),
        trip(2, 1, at(2, 9, 0), at(2, 9, 10)),
        trip(1, 3, at(3, 1, 0), at(3, 2, 0)),
        trip(3, 4, at(3, 1, 0), at(3, 2, 0)),
    ];
    let station = StationId(1);
    let ends = trips.iter().filter(|t| t.end_station_id == station).count() as f64;
    let starts = trips.iter().filter(|t| t.start_station_id == station).count() as f64;

    let series = net_flow(&trips, station, Granularity::HOURLY).unwrap();
    assert_eq!(series.total(), ends - starts);
    assert_eq!(series.missing_count(), 0);
}

#[test]
fn test_arrivals_and_departures_use_their_own_timestamps() {
    // Starts late on day 1, ends after midnight on day 2.
    let trips = vec![trip(5, 5, at(1, 23, 50), at(2, 0, 20))];

    let arr = arrivals(&trips, StationId(5), Granularity::DAILY).unwrap();
    assert_eq!(arr.timestamps(), vec![at(2, 0, 0)]);
    assert_eq!(arr.values(), vec![Some(1.0)]);

    let dep = departures(&trips, StationId(5), Granularity::DAILY).unwrap();
    assert_eq!(dep.timestamps(), vec![at(1, 0, 0)]);
    assert_eq!(dep.values(), vec![Some(1.0)]);
}

#[test]
fn test_no_trips_gives_empty_series() {
    let trips = vec![trip(1, 2, at(1, 0, 0), at(1, 0, 30))];
    let series = net_flow(&trips, StationId(99), Granularity::HOURLY).unwrap();
    assert!(series.is_empty());
}

#[test]
fn test_occupancy_means_and_missing_buckets() {
    let observations = vec![
        obs(72, at(1, 8, 0), 4, 50),
        obs(72, at(1, 8, 30), 6, 50),
        obs(72, at(1, 10, 15), 10, 50),
        obs(79, at(1, 9, 0), 1, 10),
    ];

    let series = occupancy(&observations, StationId(72), Granularity::HOURLY, None).unwrap();
    assert_eq!(series.values(), vec![Some(5.0), None, Some(10.0)]);
    assert_eq!(series.missing_count(), 1);
    assert!(series.complete_values().is_none());
}

#[test]
fn test_occupancy_percent_skips_zero_dock_samples() {
    let observations = vec![
        obs(72, at(1, 8, 0), 10, 40),
        obs(72, at(1, 8, 30), 0, 0),
        obs(72, at(1, 9, 0), 0, 0),
    ];

    let series =
        occupancy_percent(&observations, StationId(72), Granularity::HOURLY, None).unwrap();
    assert_eq!(series.values(), vec![Some(0.25), None]);
}

#[test]
fn test_time_range_restricts_buckets() {
    let observations: Vec<_> = (0..6).map(|h| obs(1, at(1, h, 0), h as i64, 10)).collect();
    let range = TimeRange::new(at(1, 2, 0), at(1, 4, 0)).unwrap();

    let series = occupancy(&observations, StationId(1), Granularity::HOURLY, Some(&range)).unwrap();
    assert_eq!(series.values(), vec![Some(2.0), Some(3.0), Some(4.0)]);
}

#[test]
fn test_extract_dispatches_and_tags_station() {
    let trips = vec![trip(1, 2, at(1, 0, 0), at(1, 0, 30))];
    let series = extract(
        SeriesMetric::Departures,
        &trips,
        &[],
        StationId(1),
        Granularity::HOURLY,
        None,
    )
    .unwrap();
    assert_eq!(series.metric, SeriesMetric::Departures);
    assert_eq!(series.station_id, StationId(1));
    assert_eq!(series.total(), 1.0);
}
