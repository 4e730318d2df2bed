//! Station lookups for the dashboard: profiles and proximity.

use serde::{Deserialize, Serialize};

use super::error::{AnalyticsError, AnalyticsResult};
use crate::db::repository::{DataStore, HistoryRepository, StationRepository, TripRepository};
use crate::models::{StationId, StationRecord, StationTable};

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A station record plus what the store knows of its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationProfile {
    pub station: StationRecord,
    pub percent_full: Option<f64>,
    pub trips_started: usize,
    pub trips_ended: usize,
    pub observations: usize,
}

/// A station and its distance from a query point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyStation {
    pub station: StationRecord,
    pub distance_km: f64,
}

pub async fn station_profile(
    repo: &dyn DataStore,
    station_id: StationId,
) -> AnalyticsResult<StationProfile> {
    let station = repo.get_station(station_id).await?;
    let trips = repo.trips_for_station(station_id).await?;
    let observations = repo.observations_for_station(station_id).await?.len();

    Ok(StationProfile {
        percent_full: station.percent_full(),
        trips_started: trips
            .iter()
            .filter(|t| t.start_station_id == station_id)
            .count(),
        trips_ended: trips
            .iter()
            .filter(|t| t.end_station_id == station_id)
            .count(),
        observations,
        station,
    })
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// The `limit` stations closest to `(lat, lon)`, nearest first.
pub fn nearest_stations(
    table: &StationTable,
    lat: f64,
    lon: f64,
    limit: usize,
) -> AnalyticsResult<Vec<NearbyStation>> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(AnalyticsError::invalid_config(format!(
            "coordinates ({}, {}) are out of range",
            lat, lon
        )));
    }

    let mut nearby: Vec<NearbyStation> = table
        .stations()
        .iter()
        .map(|s| NearbyStation {
            distance_km: haversine_km((lat, lon), s.coordinates()),
            station: s.clone(),
        })
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby.truncate(limit);
    Ok(nearby)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use crate::models::{StationStatus, TripEvent};
    use chrono::{NaiveDate, Utc};

    fn station(id: i64, lat: f64, lon: f64) -> StationRecord {
        StationRecord {
            station_id: StationId(id),
            station_name: format!("Station {}", id),
            short_name: None,
            lat,
            lon,
            capacity: 20,
            region_id: None,
            region_name: None,
            rental_methods: vec![],
            has_kiosk: None,
            station_type: None,
            legacy_id: None,
            num_bikes_available: 5,
            num_docks_available: 15,
            num_bikes_disabled: 0,
            num_docks_disabled: 0,
            status: StationStatus::Active,
            is_renting: None,
            is_returning: None,
            last_reported: None,
            bike_angels_action: None,
            bike_angels_score: Some(0),
            bike_angels_digits: None,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Times Square to Union Square, roughly 2.5 km.
        let d = haversine_km((40.7580, -73.9855), (40.7359, -73.9911));
        assert!((d - 2.5).abs() < 0.1, "got {}", d);
        assert_eq!(haversine_km((40.0, -74.0), (40.0, -74.0)), 0.0);
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let table = StationTable::new(
            vec![
                station(1, 40.80, -73.95),
                station(2, 40.71, -74.00),
                station(3, 40.75, -73.99),
            ],
            Utc::now(),
        );
        let nearby = nearest_stations(&table, 40.755, -73.99, 2).unwrap();
        let ids: Vec<i64> = nearby.iter().map(|n| n.station.station_id.0).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(nearest_stations(&table, 95.0, 0.0, 1).is_err());
    }

    #[tokio::test]
    async fn test_profile_counts_history() {
        let repo = LocalRepository::new();
        repo.replace_station_table(StationTable::new(vec![station(1, 40.7, -74.0)], Utc::now()))
            .await
            .unwrap();
        let t = NaiveDate::from_ymd_opt(2019, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        repo.store_trips(vec![
            TripEvent {
                start_station_id: StationId(1),
                end_station_id: StationId(2),
                start_time: t,
                stop_time: t,
                trip_duration: 0.0,
            },
            TripEvent {
                start_station_id: StationId(1),
                end_station_id: StationId(1),
                start_time: t,
                stop_time: t,
                trip_duration: 0.0,
            },
        ])
        .await
        .unwrap();

        let profile = station_profile(&repo, StationId(1)).await.unwrap();
        assert_eq!(profile.trips_started, 2);
        assert_eq!(profile.trips_ended, 1);
        assert_eq!(profile.observations, 0);
        assert_eq!(profile.percent_full, Some(0.25));
    }
}
