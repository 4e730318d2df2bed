use super::repositories::LocalRepository;
use super::repository::RepositoryError;
use super::services::*;
use crate::feed::StaticFeedSource;
use crate::models::{Granularity, SeriesMetric, StationId, StatusObservation, TripEvent};
use crate::services::error::AnalyticsError;
use chrono::{NaiveDate, NaiveDateTime};

const INFO: &str = r#"{"data": {"stations": [
    {"station_id": "72", "name": "W 52 St & 11 Ave", "lat": 40.767, "lon": -73.993, "capacity": 39},
    {"station_id": "79", "name": "Franklin St & W Broadway", "lat": 40.719, "lon": -74.006, "capacity": 33},
    {"station_id": "82", "name": "St James Pl & Pearl St", "lat": 40.711, "lon": -74.000, "capacity": 27}
]}}"#;

const STATUS: &str = r#"{"data": {"stations": [
    {"station_id": "72", "num_bikes_available": 10, "num_docks_available": 28, "num_bikes_disabled": 1,
     "num_docks_disabled": 0, "station_status": "active", "last_reported": 1561968000},
    {"station_id": "79", "num_bikes_available": 0, "num_docks_available": 0, "num_bikes_disabled": 0,
     "num_docks_disabled": 33, "station_status": "out_of_service"},
    {"station_id": "82", "num_bikes_available": 5, "num_docks_available": 22, "num_bikes_disabled": 0,
     "num_docks_disabled": 0, "station_status": "active"}
]}}"#;

const ANGELS: &str = r#"{"features": [
    {"properties": {"station_id": 72, "bike_angels_action": "take", "bike_angels_points": 2}},
    {"properties": {"station_id": 79}}
]}"#;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 7, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[tokio::test]
async fn test_refresh_replaces_table_wholesale() {
    let repo = LocalRepository::new();
    let source = StaticFeedSource::from_json(INFO, STATUS, ANGELS, None).unwrap();

    let summary = refresh_stations(&repo, &source).await.unwrap();
    // 79 is out of service, 82 is absent from the angels document.
    assert_eq!(summary.info.station_count, 1);
    assert_eq!(summary.excluded.len(), 2);

    let stations = list_stations(&repo).await.unwrap();
    assert_eq!(stations[0].station_id, StationId(72));
    assert_eq!(stations[0].bike_angels_score, Some(-2));

    // A second refresh with fewer stations leaves nothing behind.
    let empty = StaticFeedSource::from_json(
        r#"{"data": {"stations": []}}"#,
        r#"{"data": {"stations": []}}"#,
        r#"{"features": []}"#,
        None,
    )
    .unwrap();
    refresh_stations(&repo, &empty).await.unwrap();
    assert!(list_stations(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_records_checksum() {
    let repo = LocalRepository::new();
    let source = StaticFeedSource::from_json(INFO, STATUS, ANGELS, None).unwrap();
    let summary = refresh_stations(&repo, &source).await.unwrap();

    let info = station_table_info(&repo).await.unwrap().unwrap();
    assert_eq!(info.checksum, summary.info.checksum);
    assert_eq!(info.checksum.len(), 64);
}

#[tokio::test]
async fn test_get_and_search() {
    let repo = LocalRepository::new();
    let source = StaticFeedSource::from_json(INFO, STATUS, ANGELS, None).unwrap();
    refresh_stations(&repo, &source).await.unwrap();

    assert_eq!(
        get_station(&repo, StationId(72)).await.unwrap().station_name,
        "W 52 St & 11 Ave"
    );
    assert!(matches!(
        get_station(&repo, StationId(5)).await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert_eq!(search_stations(&repo, "52 st").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_station_series_from_trips() {
    let repo = LocalRepository::new();
    let trips = vec![
        TripEvent {
            start_station_id: StationId(79),
            end_station_id: StationId(72),
            start_time: at(8, 0),
            stop_time: at(8, 20),
            trip_duration: 1200.0,
        },
        TripEvent {
            start_station_id: StationId(72),
            end_station_id: StationId(82),
            start_time: at(10, 5),
            stop_time: at(10, 30),
            trip_duration: 1500.0,
        },
    ];
    assert_eq!(import_trips(&repo, trips).await.unwrap(), 2);

    let series = station_series(
        &repo,
        StationId(72),
        SeriesMetric::NetFlow,
        Granularity::HOURLY,
        None,
    )
    .await
    .unwrap();
    assert_eq!(series.values(), vec![Some(1.0), Some(0.0), Some(-1.0)]);
}

#[tokio::test]
async fn test_station_series_from_observations() {
    let repo = LocalRepository::new();
    let observations = vec![
        StatusObservation {
            station_id: StationId(72),
            observed_at: at(8, 0),
            available_bikes: 4,
            available_docks: 35,
            total_docks: 39,
        },
        StatusObservation {
            station_id: StationId(72),
            observed_at: at(8, 30),
            available_bikes: 6,
            available_docks: 33,
            total_docks: 39,
        },
    ];
    import_observations(&repo, observations).await.unwrap();

    let series = station_series(
        &repo,
        StationId(72),
        SeriesMetric::Occupancy,
        Granularity::HOURLY,
        None,
    )
    .await
    .unwrap();
    assert_eq!(series.values(), vec![Some(5.0)]);
}

#[tokio::test]
async fn test_failed_fetch_keeps_table() {
    struct Down;

    #[async_trait::async_trait]
    impl crate::feed::FeedSource for Down {
        async fn fetch(&self) -> crate::services::error::AnalyticsResult<crate::feed::FeedDocuments> {
            Err(AnalyticsError::external_fetch("connection refused"))
        }
    }

    let repo = LocalRepository::new();
    let source = StaticFeedSource::from_json(INFO, STATUS, ANGELS, None).unwrap();
    refresh_stations(&repo, &source).await.unwrap();

    let err = refresh_stations(&repo, &Down).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(list_stations(&repo).await.unwrap().len(), 1);
}
