//! Per-station time series and the bucketing vocabulary used to build them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::station::StationId;
use crate::services::error::{AnalyticsError, AnalyticsResult};

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;

/// Width of one time bucket.
///
/// Buckets are aligned to the Unix epoch, so an hourly bucket always starts
/// on the hour and a daily bucket at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Granularity {
    seconds: i64,
}

impl Granularity {
    pub const HOURLY: Granularity = Granularity { seconds: HOUR };
    pub const DAILY: Granularity = Granularity { seconds: DAY };

    pub fn from_seconds(seconds: i64) -> AnalyticsResult<Self> {
        if seconds <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "granularity must be positive, got {} seconds",
                seconds
            )));
        }
        Ok(Self { seconds })
    }

    pub fn minutes(n: i64) -> AnalyticsResult<Self> {
        Self::from_seconds(n.saturating_mul(MINUTE))
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Index of the bucket containing `ts`.
    pub fn bucket_index(&self, ts: &NaiveDateTime) -> i64 {
        ts.and_utc().timestamp().div_euclid(self.seconds)
    }

    /// Start timestamp of bucket `index`.
    pub fn bucket_start(&self, index: i64) -> AnalyticsResult<NaiveDateTime> {
        index
            .checked_mul(self.seconds)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| {
                AnalyticsError::invalid_config(format!("bucket {} is out of range", index))
            })
    }

    /// Align `ts` down to the start of its bucket.
    pub fn floor(&self, ts: &NaiveDateTime) -> AnalyticsResult<NaiveDateTime> {
        self.bucket_start(self.bucket_index(ts))
    }

    /// Number of buckets in one natural seasonal cycle.
    ///
    /// Daily buckets cycle weekly (7); anything finer that divides a day evenly
    /// cycles daily (hourly gives 24). Coarser or irregular widths have no
    /// natural period.
    pub fn seasonal_period(&self) -> Option<usize> {
        if self.seconds == DAY {
            Some(7)
        } else if self.seconds < DAY && DAY % self.seconds == 0 {
            Some((DAY / self.seconds) as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (count, unit) = if self.seconds % WEEK == 0 {
            (self.seconds / WEEK, "W")
        } else if self.seconds % DAY == 0 {
            (self.seconds / DAY, "D")
        } else if self.seconds % HOUR == 0 {
            (self.seconds / HOUR, "H")
        } else if self.seconds % MINUTE == 0 {
            (self.seconds / MINUTE, "min")
        } else {
            (self.seconds, "S")
        };
        if count == 1 {
            write!(f, "{}", unit)
        } else {
            write!(f, "{}{}", count, unit)
        }
    }
}

impl FromStr for Granularity {
    type Err = AnalyticsError;

    /// Parse a pandas-style offset alias: `H`, `D`, `W`, `15min`, `30T`, `2h`, `90S`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);

        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| {
                AnalyticsError::invalid_config(format!("invalid granularity: '{}'", s))
            })?
        };

        let unit_seconds = match unit.to_ascii_lowercase().as_str() {
            "s" | "sec" => 1,
            "t" | "min" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => WEEK,
            _ => {
                return Err(AnalyticsError::invalid_config(format!(
                    "invalid granularity: '{}'",
                    s
                )))
            }
        };

        Self::from_seconds(count.saturating_mul(unit_seconds))
    }
}

impl TryFrom<String> for Granularity {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.to_string()
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::HOURLY
    }
}

/// Which quantity a station series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    /// Trips ending at the station.
    Arrivals,
    /// Trips starting at the station.
    Departures,
    /// Arrivals minus departures.
    NetFlow,
    /// Mean available bikes.
    Occupancy,
    /// Mean share of docks holding a bike.
    OccupancyPercent,
}

impl SeriesMetric {
    /// Trip-derived metrics are zero-filled; status-derived ones leave gaps missing.
    pub fn is_trip_based(&self) -> bool {
        matches!(
            self,
            SeriesMetric::Arrivals | SeriesMetric::Departures | SeriesMetric::NetFlow
        )
    }
}

impl fmt::Display for SeriesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeriesMetric::Arrivals => "arrivals",
            SeriesMetric::Departures => "departures",
            SeriesMetric::NetFlow => "net_flow",
            SeriesMetric::Occupancy => "occupancy",
            SeriesMetric::OccupancyPercent => "occupancy_percent",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SeriesMetric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "arrivals" => Ok(SeriesMetric::Arrivals),
            "departures" => Ok(SeriesMetric::Departures),
            "net_flow" | "netflow" | "net_bikes" => Ok(SeriesMetric::NetFlow),
            "occupancy" | "avail_bikes" => Ok(SeriesMetric::Occupancy),
            "occupancy_percent" | "percent_full" => Ok(SeriesMetric::OccupancyPercent),
            other => Err(AnalyticsError::invalid_config(format!(
                "unknown series metric: '{}'",
                other
            ))),
        }
    }
}

/// Inclusive time window applied to bucket timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> AnalyticsResult<Self> {
        if start > end {
            return Err(AnalyticsError::invalid_config(format!(
                "time range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

/// One bucket of a series. `value = None` is the missing-value marker; zero is a real value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

impl SeriesPoint {
    pub fn new(timestamp: NaiveDateTime, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered, duplicate-free series for one station and metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationTimeSeries {
    pub station_id: StationId,
    pub metric: SeriesMetric,
    pub granularity: Granularity,
    points: Vec<SeriesPoint>,
}

impl StationTimeSeries {
    /// Build a series; points are sorted by timestamp and a repeated
    /// timestamp keeps its last value.
    pub fn new(
        station_id: StationId,
        metric: SeriesMetric,
        granularity: Granularity,
        mut points: Vec<SeriesPoint>,
    ) -> Self {
        points.sort_by_key(|p| p.timestamp);
        let mut deduped: Vec<SeriesPoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            station_id,
            metric,
            granularity,
            points: deduped,
        }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn missing_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }

    /// All values, or `None` if any bucket is missing.
    pub fn complete_values(&self) -> Option<Vec<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// True when consecutive timestamps are exactly one bucket apart.
    pub fn is_contiguous(&self) -> bool {
        let step = self.granularity.seconds();
        self.points
            .windows(2)
            .all(|w| (w[1].timestamp - w[0].timestamp).num_seconds() == step)
    }

    /// Sum of defined values.
    pub fn total(&self) -> f64 {
        self.points.iter().filter_map(|p| p.value).sum()
    }

    /// Restrict to the points whose timestamp falls inside `range`.
    pub fn within(&self, range: &TimeRange) -> Self {
        Self {
            station_id: self.station_id,
            metric: self.metric,
            granularity: self.granularity,
            points: self
                .points
                .iter()
                .filter(|p| range.contains(&p.timestamp))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "series_tests.rs"]
mod series_tests;
