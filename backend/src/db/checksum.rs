//! Checksums identifying station table contents.

use sha2::{Digest, Sha256};

use super::repository::RepositoryResult;
use crate::models::StationTable;

/// Hex SHA-256 of `content`.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checksum of the station rows only, so two refreshes that produced the same
/// stations hash equal regardless of when they ran.
pub fn station_table_checksum(table: &StationTable) -> RepositoryResult<String> {
    let rows = serde_json::to_string(table.stations())?;
    Ok(calculate_checksum(&rows))
}
