//! Historical trip events and station status observations.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::station::StationId;

/// A completed trip. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub start_station_id: StationId,
    pub end_station_id: StationId,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    /// Trip duration in seconds.
    pub trip_duration: f64,
}

impl TripEvent {
    /// Day of week of the trip start, Monday = 0.
    pub fn day_of_week(&self) -> u32 {
        self.start_time.weekday().num_days_from_monday()
    }

    pub fn is_weekday(&self) -> bool {
        self.day_of_week() < 5
    }
}

/// Meteorological season of a timestamp (northern hemisphere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        match timestamp.month() {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }
}

/// One historical sample of a station's dock state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub station_id: StationId,
    pub observed_at: NaiveDateTime,
    pub available_bikes: i64,
    pub available_docks: i64,
    pub total_docks: i64,
}

impl StatusObservation {
    /// `available_bikes / total_docks`, undefined when the station reports no docks.
    pub fn percent_full(&self) -> Option<f64> {
        if self.total_docks <= 0 {
            return None;
        }
        Some(self.available_bikes as f64 / self.total_docks as f64)
    }

    pub fn season(&self) -> Season {
        Season::of(&self.observed_at)
    }
}
