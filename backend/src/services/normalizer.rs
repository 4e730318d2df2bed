//! Feed normalization: three raw station documents in, one station table out.
//!
//! The join is an intersection. A station missing from any of the three
//! inputs is dropped and reported in [`NormalizedStations::excluded`], never
//! padded with defaults. Out-of-service stations are dropped the same way.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::feed::{FeedDocuments, RawId, RawStationRow};
use crate::models::{BikeAngelsAction, StationId, StationRecord, StationStatus, StationTable};

/// Which raw document a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Information,
    Status,
    Angels,
}

/// Why a raw row did not make it into the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The id is absent from at least one input.
    NotInAllSources { missing_from: Vec<FeedKind> },
    OutOfService,
    /// The raw id could not be coerced to an integer.
    InvalidStationId { source: FeedKind, raw: String },
    /// A required field is absent from all three inputs.
    MissingField { field: String },
    /// A later row repeated an id already seen in the same input; the first
    /// row is kept.
    DuplicateStationId { source: FeedKind },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedStation {
    pub station_id: Option<StationId>,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Output of [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizedStations {
    pub table: StationTable,
    pub excluded: Vec<ExcludedStation>,
}

/// Directional bike-angels score.
///
/// `give` keeps the points' sign, `take` negates it, `neutral` or a missing
/// action scores zero. An action of `give`/`take` without points is unknown
/// (`None`).
pub fn bike_angels_score(action: Option<BikeAngelsAction>, points: Option<i64>) -> Option<i64> {
    match action {
        Some(BikeAngelsAction::Give) => points,
        Some(BikeAngelsAction::Take) => points.map(|p| -p),
        Some(BikeAngelsAction::Neutral) | None => Some(0),
    }
}

/// Join the three station documents, stamping the table with the current time.
pub fn normalize(
    information: &[RawStationRow],
    status: &[RawStationRow],
    angels: &[RawStationRow],
) -> NormalizedStations {
    normalize_at(information, status, angels, Utc::now())
}

/// Normalize a fetched document set and resolve region names.
pub fn normalize_documents(
    documents: &FeedDocuments,
    refreshed_at: DateTime<Utc>,
) -> NormalizedStations {
    let mut normalized = normalize_at(
        &documents.information,
        &documents.status,
        &documents.angels,
        refreshed_at,
    );
    normalized.table.attach_regions(&documents.regions);
    normalized
}

/// [`normalize`] with an explicit refresh timestamp.
pub fn normalize_at(
    information: &[RawStationRow],
    status: &[RawStationRow],
    angels: &[RawStationRow],
    refreshed_at: DateTime<Utc>,
) -> NormalizedStations {
    let mut excluded = Vec::new();
    let info_by_id = index_rows(information, FeedKind::Information, &mut excluded);
    let status_by_id = index_rows(status, FeedKind::Status, &mut excluded);
    let angels_by_id = index_rows(angels, FeedKind::Angels, &mut excluded);

    let all_ids: BTreeSet<i64> = info_by_id
        .keys()
        .chain(status_by_id.keys())
        .chain(angels_by_id.keys())
        .copied()
        .collect();

    let mut stations = Vec::with_capacity(info_by_id.len());
    for id in all_ids {
        let station_id = StationId(id);
        let (info, stat, angel) = match (
            info_by_id.get(&id),
            status_by_id.get(&id),
            angels_by_id.get(&id),
        ) {
            (Some(i), Some(s), Some(a)) => (*i, *s, *a),
            (i, s, a) => {
                let missing_from = [
                    (i.is_none(), FeedKind::Information),
                    (s.is_none(), FeedKind::Status),
                    (a.is_none(), FeedKind::Angels),
                ]
                .into_iter()
                .filter_map(|(missing, kind)| missing.then_some(kind))
                .collect();
                excluded.push(ExcludedStation {
                    station_id: Some(station_id),
                    reason: ExclusionReason::NotInAllSources { missing_from },
                });
                continue;
            }
        };

        match build_record(station_id, [info, stat, angel]) {
            Ok(record) if record.status == StationStatus::OutOfService => {
                excluded.push(ExcludedStation {
                    station_id: Some(station_id),
                    reason: ExclusionReason::OutOfService,
                });
            }
            Ok(record) => stations.push(record),
            Err(field) => excluded.push(ExcludedStation {
                station_id: Some(station_id),
                reason: ExclusionReason::MissingField { field },
            }),
        }
    }

    info!(
        "Normalized {} stations ({} excluded)",
        stations.len(),
        excluded.len()
    );

    NormalizedStations {
        table: StationTable::new(stations, refreshed_at),
        excluded,
    }
}

fn index_rows<'a>(
    rows: &'a [RawStationRow],
    kind: FeedKind,
    excluded: &mut Vec<ExcludedStation>,
) -> HashMap<i64, &'a RawStationRow> {
    let mut by_id = HashMap::with_capacity(rows.len());
    for row in rows {
        match row.station_id.as_ref().and_then(RawId::as_i64) {
            Some(id) => {
                if by_id.contains_key(&id) {
                    debug!("Dropping duplicate {:?} row for station {}", kind, id);
                    excluded.push(ExcludedStation {
                        station_id: Some(StationId(id)),
                        reason: ExclusionReason::DuplicateStationId { source: kind },
                    });
                } else {
                    by_id.insert(id, row);
                }
            }
            None => {
                let raw = row
                    .station_id
                    .as_ref()
                    .map(RawId::as_text)
                    .unwrap_or_default();
                debug!("Dropping {:?} row with unusable station_id '{}'", kind, raw);
                excluded.push(ExcludedStation {
                    station_id: None,
                    reason: ExclusionReason::InvalidStationId { source: kind, raw },
                });
            }
        }
    }
    by_id
}

/// Looks a field up in information, then status, then angels.
struct Sources<'a>([&'a RawStationRow; 3]);

impl<'a> Sources<'a> {
    fn first<T>(&self, extract: impl Fn(&RawStationRow) -> Option<T>) -> Option<T> {
        self.0.iter().find_map(|row| extract(row))
    }

    fn require<T>(
        &self,
        field: &str,
        extract: impl Fn(&RawStationRow, &str) -> Option<T>,
    ) -> Result<T, String> {
        self.first(|row| extract(row, field))
            .ok_or_else(|| field.to_string())
    }
}

fn build_record(station_id: StationId, rows: [&RawStationRow; 3]) -> Result<StationRecord, String> {
    let src = Sources(rows);
    let angels = rows[2];

    let status_value = src.require("station_status", RawStationRow::get_str)?;
    let bike_angels_action = angels
        .get_str("bike_angels_action")
        .and_then(|a| BikeAngelsAction::from_feed(&a));
    let points = angels.get_i64("bike_angels_points");

    Ok(StationRecord {
        station_id,
        station_name: src.require("name", RawStationRow::get_str)?,
        short_name: src.first(|r| r.get_str("short_name")),
        lat: src.require("lat", RawStationRow::get_f64)?,
        lon: src.require("lon", RawStationRow::get_f64)?,
        capacity: src.require("capacity", RawStationRow::get_i64)?,
        region_id: src.first(|r| r.get_str("region_id")),
        region_name: None,
        rental_methods: src
            .first(|r| r.get_string_list("rental_methods"))
            .unwrap_or_default(),
        has_kiosk: src.first(|r| r.get_bool("has_kiosk")),
        station_type: src.first(|r| r.get_str("station_type")),
        legacy_id: src.first(|r| r.get_str("legacy_id")),
        num_bikes_available: src.require("num_bikes_available", RawStationRow::get_i64)?,
        num_docks_available: src.require("num_docks_available", RawStationRow::get_i64)?,
        num_bikes_disabled: src.require("num_bikes_disabled", RawStationRow::get_i64)?,
        num_docks_disabled: src.require("num_docks_disabled", RawStationRow::get_i64)?,
        status: StationStatus::from_feed(&status_value),
        is_renting: src.first(|r| r.get_bool("is_renting")),
        is_returning: src.first(|r| r.get_bool("is_returning")),
        last_reported: src
            .first(|r| r.get_i64("last_reported"))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        bike_angels_action,
        bike_angels_score: bike_angels_score(bike_angels_action, points),
        bike_angels_digits: angels.get_i64("bike_angels_digits"),
    })
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod normalizer_tests;
