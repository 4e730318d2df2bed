//! Per-station time series from trips and status history.
//!
//! Trip-derived series (arrivals, departures, net flow) count events, so an
//! empty bucket is a real zero. Status-derived series (occupancy) average
//! samples, so an empty bucket is missing (`None`). The two are never
//! conflated.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::error::{AnalyticsError, AnalyticsResult};
use crate::models::{
    Granularity, SeriesMetric, SeriesPoint, StationId, StationTimeSeries, StatusObservation,
    TimeRange, TripEvent,
};

/// Trips ending at the station, per bucket of `stop_time`.
pub fn arrivals(
    trips: &[TripEvent],
    station_id: StationId,
    granularity: Granularity,
) -> AnalyticsResult<StationTimeSeries> {
    let counts = bucket_counts(
        trips
            .iter()
            .filter(|t| t.end_station_id == station_id)
            .map(|t| &t.stop_time),
        granularity,
    );
    counts_to_series(
        station_id,
        SeriesMetric::Arrivals,
        granularity,
        &counts,
        &BTreeMap::new(),
    )
}

/// Trips starting at the station, per bucket of `start_time`.
pub fn departures(
    trips: &[TripEvent],
    station_id: StationId,
    granularity: Granularity,
) -> AnalyticsResult<StationTimeSeries> {
    let counts = bucket_counts(
        trips
            .iter()
            .filter(|t| t.start_station_id == station_id)
            .map(|t| &t.start_time),
        granularity,
    );
    counts_to_series(
        station_id,
        SeriesMetric::Departures,
        granularity,
        &counts,
        &BTreeMap::new(),
    )
}

/// Arrivals minus departures per bucket. Positive means bikes were gained.
///
/// Buckets run contiguously from the first to the last bucket holding any
/// event at the station; buckets without events are explicit zeros, so the
/// series total equals `ends - starts` over the whole period.
pub fn net_flow(
    trips: &[TripEvent],
    station_id: StationId,
    granularity: Granularity,
) -> AnalyticsResult<StationTimeSeries> {
    let ends = bucket_counts(
        trips
            .iter()
            .filter(|t| t.end_station_id == station_id)
            .map(|t| &t.stop_time),
        granularity,
    );
    let starts = bucket_counts(
        trips
            .iter()
            .filter(|t| t.start_station_id == station_id)
            .map(|t| &t.start_time),
        granularity,
    );
    counts_to_series(station_id, SeriesMetric::NetFlow, granularity, &ends, &starts)
}

/// Mean `available_bikes` per bucket, optionally restricted to `range`
/// (inclusive, applied to bucket timestamps). Buckets without samples are
/// missing.
pub fn occupancy(
    observations: &[StatusObservation],
    station_id: StationId,
    granularity: Granularity,
    range: Option<&TimeRange>,
) -> AnalyticsResult<StationTimeSeries> {
    let series = bucket_means(
        observations,
        station_id,
        granularity,
        SeriesMetric::Occupancy,
        |o| Some(o.available_bikes as f64),
    )?;
    Ok(restrict(series, range))
}

/// Mean share of docks holding a bike per bucket. Samples with no docks do
/// not contribute; a bucket with no usable sample is missing.
pub fn occupancy_percent(
    observations: &[StatusObservation],
    station_id: StationId,
    granularity: Granularity,
    range: Option<&TimeRange>,
) -> AnalyticsResult<StationTimeSeries> {
    let series = bucket_means(
        observations,
        station_id,
        granularity,
        SeriesMetric::OccupancyPercent,
        StatusObservation::percent_full,
    )?;
    Ok(restrict(series, range))
}

/// Apply an optional inclusive time range.
pub fn restrict(series: StationTimeSeries, range: Option<&TimeRange>) -> StationTimeSeries {
    match range {
        Some(range) => series.within(range),
        None => series,
    }
}

fn bucket_counts<'a>(
    timestamps: impl Iterator<Item = &'a NaiveDateTime>,
    granularity: Granularity,
) -> BTreeMap<i64, i64> {
    let mut counts = BTreeMap::new();
    for ts in timestamps {
        *counts.entry(granularity.bucket_index(ts)).or_insert(0) += 1;
    }
    counts
}

/// `plus - minus` over the contiguous bucket span covering both maps.
fn counts_to_series(
    station_id: StationId,
    metric: SeriesMetric,
    granularity: Granularity,
    plus: &BTreeMap<i64, i64>,
    minus: &BTreeMap<i64, i64>,
) -> AnalyticsResult<StationTimeSeries> {
    let first = plus.keys().next().into_iter().chain(minus.keys().next()).min();
    let last = plus.keys().next_back().into_iter().chain(minus.keys().next_back()).max();

    let points = match (first, last) {
        (Some(&first), Some(&last)) => (first..=last)
            .map(|idx| {
                let value = plus.get(&idx).copied().unwrap_or(0)
                    - minus.get(&idx).copied().unwrap_or(0);
                Ok(SeriesPoint::new(granularity.bucket_start(idx)?, Some(value as f64)))
            })
            .collect::<AnalyticsResult<Vec<_>>>()?,
        _ => Vec::new(),
    };

    Ok(StationTimeSeries::new(station_id, metric, granularity, points))
}

fn bucket_means(
    observations: &[StatusObservation],
    station_id: StationId,
    granularity: Granularity,
    metric: SeriesMetric,
    value_of: impl Fn(&StatusObservation) -> Option<f64>,
) -> AnalyticsResult<StationTimeSeries> {
    // (sum, count) of defined values; an entry with count 0 marks a bucket that
    // had samples but none usable.
    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.station_id == station_id) {
        let entry = buckets
            .entry(granularity.bucket_index(&obs.observed_at))
            .or_insert((0.0, 0));
        if let Some(v) = value_of(obs) {
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let span = buckets
        .keys()
        .next()
        .copied()
        .zip(buckets.keys().next_back().copied());

    let points = match span {
        Some((first, last)) => (first..=last)
            .map(|idx| {
                let value = buckets
                    .get(&idx)
                    .filter(|(_, n)| *n > 0)
                    .map(|(sum, n)| sum / *n as f64);
                Ok(SeriesPoint::new(granularity.bucket_start(idx)?, value))
            })
            .collect::<AnalyticsResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(StationTimeSeries::new(station_id, metric, granularity, points))
}

/// Dispatch on metric.
pub fn extract(
    metric: SeriesMetric,
    trips: &[TripEvent],
    observations: &[StatusObservation],
    station_id: StationId,
    granularity: Granularity,
    range: Option<&TimeRange>,
) -> AnalyticsResult<StationTimeSeries> {
    match metric {
        SeriesMetric::Arrivals => {
            arrivals(trips, station_id, granularity).map(|s| restrict(s, range))
        }
        SeriesMetric::Departures => {
            departures(trips, station_id, granularity).map(|s| restrict(s, range))
        }
        SeriesMetric::NetFlow => {
            net_flow(trips, station_id, granularity).map(|s| restrict(s, range))
        }
        SeriesMetric::Occupancy => occupancy(observations, station_id, granularity, range),
        SeriesMetric::OccupancyPercent => {
            occupancy_percent(observations, station_id, granularity, range)
        }
    }
    .map_err(|e: AnalyticsError| e.with_station(station_id))
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod extractor_tests;
