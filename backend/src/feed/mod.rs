//! Live station feed boundary: raw document types and the sources that produce them.

pub mod client;
pub mod raw;

pub use client::{FeedSource, StaticFeedSource};
#[cfg(feature = "live-feed")]
pub use client::HttpFeedSource;
pub use raw::{
    parse_bike_angels, parse_discovery, parse_station_information, parse_station_status,
    parse_system_regions, FeedDocuments, FeedLink, RawId, RawStationRow,
};
