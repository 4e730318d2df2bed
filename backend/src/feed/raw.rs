//! Raw feed documents as published by the operator.
//!
//! Rows keep every field they arrived with; the normalizer decides which
//! source wins for a given field. Only the envelope shape is enforced here.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::services::error::{AnalyticsError, AnalyticsResult};

/// Station ids arrive as JSON strings in the GBFS feeds and as numbers in the
/// bike-angels feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawId {
    /// Integer form of the id, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawId::Int(i) => Some(*i),
            RawId::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            RawId::Float(_) => None,
            RawId::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RawId::Int(i) => i.to_string(),
            RawId::Float(f) => f.to_string(),
            RawId::Text(s) => s.clone(),
        }
    }
}

/// One station row from any of the three station documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStationRow {
    #[serde(default)]
    pub station_id: Option<RawId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawStationRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Booleans appear both as JSON booleans and as 0/1 integers.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get_string_list(&self, field: &str) -> Option<Vec<String>> {
        match self.get(field)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// GBFS envelope: `{ last_updated, ttl, data }`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEnvelope<T> {
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub ttl: Option<i64>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct StationsData {
    #[serde(default)]
    stations: Vec<RawStationRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct RegionsData {
    #[serde(default)]
    regions: Vec<RawRegion>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRegion {
    #[serde(deserialize_with = "deserialize_id_text")]
    region_id: String,
    name: String,
}

fn deserialize_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RawId::deserialize(deserializer)?.as_text())
}

/// Bike-angels GeoJSON: `{ features: [{ properties: {...} }] }`.
#[derive(Debug, Clone, Deserialize)]
struct AngelsCollection {
    #[serde(default)]
    features: Vec<AngelsFeature>,
}

#[derive(Debug, Clone, Deserialize)]
struct AngelsFeature {
    properties: RawStationRow,
}

/// One entry of the discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DiscoveryLanguage {
    #[serde(default)]
    feeds: Vec<FeedLink>,
}

/// The raw inputs of one refresh.
#[derive(Debug, Clone, Default)]
pub struct FeedDocuments {
    pub information: Vec<RawStationRow>,
    pub status: Vec<RawStationRow>,
    pub angels: Vec<RawStationRow>,
    /// `region_id -> region name`
    pub regions: HashMap<String, String>,
}

fn decode<T: DeserializeOwned>(document: &str, what: &str) -> AnalyticsResult<T> {
    serde_json::from_str(document).map_err(|e| {
        AnalyticsError::external_fetch(format!("malformed {} document: {}", what, e))
            .with_operation("parse_feed")
    })
}

pub fn parse_station_information(document: &str) -> AnalyticsResult<Vec<RawStationRow>> {
    let env: FeedEnvelope<StationsData> = decode(document, "station_information")?;
    Ok(env.data.stations)
}

pub fn parse_station_status(document: &str) -> AnalyticsResult<Vec<RawStationRow>> {
    let env: FeedEnvelope<StationsData> = decode(document, "station_status")?;
    Ok(env.data.stations)
}

pub fn parse_bike_angels(document: &str) -> AnalyticsResult<Vec<RawStationRow>> {
    let collection: AngelsCollection = decode(document, "bike_angels")?;
    Ok(collection
        .features
        .into_iter()
        .map(|f| f.properties)
        .collect())
}

pub fn parse_system_regions(document: &str) -> AnalyticsResult<HashMap<String, String>> {
    let env: FeedEnvelope<RegionsData> = decode(document, "system_regions")?;
    Ok(env
        .data
        .regions
        .into_iter()
        .map(|r| (r.region_id, r.name))
        .collect())
}

/// Feed links published for `language` in the discovery document.
pub fn parse_discovery(document: &str, language: &str) -> AnalyticsResult<Vec<FeedLink>> {
    let env: FeedEnvelope<HashMap<String, DiscoveryLanguage>> = decode(document, "gbfs")?;
    env.data
        .get(language)
        .map(|lang| lang.feeds.clone())
        .ok_or_else(|| {
            AnalyticsError::external_fetch(format!(
                "discovery document has no '{}' feeds",
                language
            ))
            .with_operation("parse_feed")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{
        "last_updated": 1561994400, "ttl": 10,
        "data": {"stations": [
            {"station_id": "72", "name": "W 52 St & 11 Ave", "lat": 40.767, "lon": -73.993,
             "capacity": 55, "region_id": "71", "rental_methods": ["KEY", "CREDITCARD"],
             "has_kiosk": true},
            {"station_id": "79", "name": "Franklin St & W Broadway", "lat": 40.719,
             "lon": -74.006, "capacity": 33}
        ]}
    }"#;

    #[test]
    fn test_parse_station_information() {
        let rows = parse_station_information(INFO).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].station_id.as_ref().and_then(RawId::as_i64), Some(72));
        assert_eq!(rows[0].get_str("name").as_deref(), Some("W 52 St & 11 Ave"));
        assert_eq!(rows[0].get_i64("capacity"), Some(55));
        assert_eq!(
            rows[0].get_string_list("rental_methods"),
            Some(vec!["KEY".to_string(), "CREDITCARD".to_string()])
        );
        assert_eq!(rows[1].get("region_id"), None);
    }

    #[test]
    fn test_parse_bike_angels_numeric_ids() {
        let doc = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"station_id": 72, "bike_angels_action": "take",
             "bike_angels_points": 2, "bike_angels_digits": 3}}
        ]}"#;
        let rows = parse_bike_angels(doc).unwrap();
        assert_eq!(rows[0].station_id, Some(RawId::Int(72)));
        assert_eq!(rows[0].get_i64("bike_angels_points"), Some(2));
    }

    #[test]
    fn test_parse_regions_and_discovery() {
        let regions = parse_system_regions(
            r#"{"data": {"regions": [{"region_id": "71", "name": "NYC District"},
                                     {"region_id": 70, "name": "JC District"}]}}"#,
        )
        .unwrap();
        assert_eq!(regions.get("71").map(String::as_str), Some("NYC District"));
        assert_eq!(regions.get("70").map(String::as_str), Some("JC District"));

        let links = parse_discovery(
            r#"{"data": {"en": {"feeds": [
                {"name": "station_status", "url": "https://example.test/station_status.json"}
            ]}}}"#,
            "en",
        )
        .unwrap();
        assert_eq!(links[0].name, "station_status");
        assert!(parse_discovery(r#"{"data": {}}"#, "en").is_err());
    }

    #[test]
    fn test_malformed_document_is_fetch_error() {
        let err = parse_station_status("{not json").unwrap_err();
        assert!(matches!(err, AnalyticsError::ExternalFetchError { .. }));
    }

    #[test]
    fn test_raw_id_coercion() {
        assert_eq!(RawId::Text(" 3255 ".into()).as_i64(), Some(3255));
        assert_eq!(RawId::Float(12.0).as_i64(), Some(12));
        assert_eq!(RawId::Float(12.5).as_i64(), None);
        assert_eq!(RawId::Text("SYS-1".into()).as_i64(), None);
    }

    #[test]
    fn test_bool_coercion() {
        let row: RawStationRow =
            serde_json::from_str(r#"{"station_id": "1", "is_renting": 1, "has_kiosk": false}"#)
                .unwrap();
        assert_eq!(row.get_bool("is_renting"), Some(true));
        assert_eq!(row.get_bool("has_kiosk"), Some(false));
    }
}
