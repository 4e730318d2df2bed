//! Station records and the unified station table.
//!
//! A [`StationTable`] is the joined view of the station-information,
//! station-status and bike-angels feeds. It is rebuilt wholesale on every
//! refresh and never patched in place.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::define_id_type;

define_id_type!(i64, StationId);

/// Operational status reported by the status feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    Active,
    OutOfService,
}

impl StationStatus {
    /// Map a raw feed value. Only `out_of_service` takes a station offline;
    /// any other reported value counts as active.
    pub fn from_feed(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "out_of_service" => StationStatus::OutOfService,
            _ => StationStatus::Active,
        }
    }
}

/// Bike-angels incentive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeAngelsAction {
    /// Riders earn points for returning bikes here.
    Give,
    /// Riders earn points for taking bikes from here.
    Take,
    Neutral,
}

impl BikeAngelsAction {
    pub fn from_feed(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "give" => Some(BikeAngelsAction::Give),
            "take" => Some(BikeAngelsAction::Take),
            "neutral" => Some(BikeAngelsAction::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for BikeAngelsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BikeAngelsAction::Give => "give",
            BikeAngelsAction::Take => "take",
            BikeAngelsAction::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

/// One row of the unified station table.
///
/// Live counters are expected (not enforced) to satisfy
/// `num_bikes_available + num_bikes_disabled <= capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub station_id: StationId,
    pub station_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub capacity: i64,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub rental_methods: Vec<String>,
    #[serde(default)]
    pub has_kiosk: Option<bool>,
    #[serde(default)]
    pub station_type: Option<String>,
    #[serde(default)]
    pub legacy_id: Option<String>,

    pub num_bikes_available: i64,
    pub num_docks_available: i64,
    pub num_bikes_disabled: i64,
    pub num_docks_disabled: i64,
    pub status: StationStatus,
    #[serde(default)]
    pub is_renting: Option<bool>,
    #[serde(default)]
    pub is_returning: Option<bool>,
    #[serde(default)]
    pub last_reported: Option<DateTime<Utc>>,

    #[serde(default)]
    pub bike_angels_action: Option<BikeAngelsAction>,
    /// Directional incentive: positive means the system wants bikes returned here.
    /// `None` when the feed announced an action without points.
    #[serde(default)]
    pub bike_angels_score: Option<i64>,
    #[serde(default)]
    pub bike_angels_digits: Option<i64>,
}

impl StationRecord {
    /// Share of usable docks currently holding an available bike.
    ///
    /// Returns `None` when no dock is usable (the denominator is not positive).
    pub fn percent_full(&self) -> Option<f64> {
        let usable = self.capacity - self.num_bikes_disabled - self.num_docks_disabled;
        if usable <= 0 {
            return None;
        }
        Some(self.num_bikes_available as f64 / usable as f64)
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// A region from the system-regions document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: String,
    pub name: String,
}

/// The unified station table, sorted by station id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationTable {
    stations: Vec<StationRecord>,
    pub refreshed_at: DateTime<Utc>,
}

impl StationTable {
    /// Build a table from records. Rows are ordered by id; when an id repeats
    /// the later row wins.
    pub fn new(mut stations: Vec<StationRecord>, refreshed_at: DateTime<Utc>) -> Self {
        stations.sort_by_key(|s| s.station_id);
        let mut deduped: Vec<StationRecord> = Vec::with_capacity(stations.len());
        for station in stations {
            match deduped.last_mut() {
                Some(last) if last.station_id == station.station_id => *last = station,
                _ => deduped.push(station),
            }
        }
        Self {
            stations: deduped,
            refreshed_at,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Utc::now())
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn into_stations(self) -> Vec<StationRecord> {
        self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, station_id: StationId) -> Option<&StationRecord> {
        self.stations
            .binary_search_by_key(&station_id, |s| s.station_id)
            .ok()
            .map(|idx| &self.stations[idx])
    }

    /// Case-insensitive substring search over station names.
    pub fn search_by_name(&self, query: &str) -> Vec<&StationRecord> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.stations
            .iter()
            .filter(|s| s.station_name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Resolve `region_name` from a `region_id -> name` lookup.
    ///
    /// Stations whose region is unknown keep `region_name = None`.
    pub fn attach_regions(&mut self, regions: &HashMap<String, String>) {
        for station in &mut self.stations {
            station.region_name = station
                .region_id
                .as_ref()
                .and_then(|id| regions.get(id))
                .cloned();
        }
    }
}

/// Lightweight description of the current station table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationTableInfo {
    pub station_count: usize,
    pub refreshed_at: DateTime<Utc>,
    pub checksum: String,
}
