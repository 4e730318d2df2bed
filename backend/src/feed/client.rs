//! Sources of raw feed documents.
//!
//! [`FeedSource`] is the seam between the refresh service and the outside
//! world. [`StaticFeedSource`] serves fixed documents (tests, replays of a
//! saved snapshot); [`HttpFeedSource`] polls the operator's GBFS endpoints.

use async_trait::async_trait;

use super::raw::{
    parse_bike_angels, parse_station_information, parse_station_status, parse_system_regions,
    FeedDocuments,
};
use crate::services::error::AnalyticsResult;

/// Anything that can produce one consistent set of raw feed documents.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> AnalyticsResult<FeedDocuments>;
}

/// Serves the documents it was built with.
#[derive(Debug, Clone, Default)]
pub struct StaticFeedSource {
    documents: FeedDocuments,
}

impl StaticFeedSource {
    pub fn new(documents: FeedDocuments) -> Self {
        Self { documents }
    }

    /// Parse raw JSON documents. `regions` may be omitted.
    pub fn from_json(
        information: &str,
        status: &str,
        angels: &str,
        regions: Option<&str>,
    ) -> AnalyticsResult<Self> {
        Ok(Self::new(FeedDocuments {
            information: parse_station_information(information)?,
            status: parse_station_status(status)?,
            angels: parse_bike_angels(angels)?,
            regions: match regions {
                Some(doc) => parse_system_regions(doc)?,
                None => Default::default(),
            },
        }))
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self) -> AnalyticsResult<FeedDocuments> {
        Ok(self.documents.clone())
    }
}

#[cfg(feature = "live-feed")]
pub use http::HttpFeedSource;

#[cfg(feature = "live-feed")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use log::{debug, warn};

    use super::FeedSource;
    use crate::config::FeedSettings;
    use crate::feed::raw::{
        parse_bike_angels, parse_discovery, parse_station_information, parse_station_status,
        parse_system_regions, FeedDocuments, FeedLink,
    };
    use crate::services::error::{AnalyticsError, AnalyticsResult};

    /// GBFS client. Every GET is bounded by the configured timeout and retried
    /// at most `max_retries` times before the error is surfaced.
    #[derive(Debug, Clone)]
    pub struct HttpFeedSource {
        client: reqwest::Client,
        settings: FeedSettings,
    }

    impl HttpFeedSource {
        pub fn new(settings: FeedSettings) -> AnalyticsResult<Self> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()
                .map_err(|e| {
                    AnalyticsError::invalid_config(format!("Failed to build HTTP client: {}", e))
                })?;
            Ok(Self { client, settings })
        }

        async fn get_text(&self, url: &str) -> AnalyticsResult<String> {
            let mut attempt = 0;
            loop {
                match self.try_get(url).await {
                    Ok(body) => return Ok(body),
                    Err(e) if attempt < self.settings.max_retries => {
                        attempt += 1;
                        warn!("GET {} failed ({}), retry {}/{}", url, e, attempt, self.settings.max_retries);
                        tokio::time::sleep(Duration::from_millis(self.settings.retry_delay_ms)).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        async fn try_get(&self, url: &str) -> AnalyticsResult<String> {
            debug!("GET {}", url);
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| {
                    AnalyticsError::external_fetch(format!("GET {} failed: {}", url, e))
                        .with_operation("fetch_feed")
                })?;
            response.text().await.map_err(|e| {
                AnalyticsError::external_fetch(format!("reading {} failed: {}", url, e))
                    .with_operation("fetch_feed")
            })
        }

        fn link<'a>(links: &'a [FeedLink], name: &str) -> Option<&'a str> {
            links
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.url.as_str())
        }

        fn required_link<'a>(links: &'a [FeedLink], name: &str) -> AnalyticsResult<&'a str> {
            Self::link(links, name).ok_or_else(|| {
                AnalyticsError::external_fetch(format!("discovery document lists no '{}' feed", name))
                    .with_operation("fetch_feed")
            })
        }
    }

    #[async_trait]
    impl FeedSource for HttpFeedSource {
        async fn fetch(&self) -> AnalyticsResult<FeedDocuments> {
            let discovery = self.get_text(&self.settings.discovery_url).await?;
            let links = parse_discovery(&discovery, &self.settings.language)?;

            let info_url = Self::required_link(&links, "station_information")?;
            let status_url = Self::required_link(&links, "station_status")?;

            let (information, status, angels) = tokio::try_join!(
                self.get_text(info_url),
                self.get_text(status_url),
                self.get_text(&self.settings.bike_angels_url),
            )?;

            let regions = match Self::link(&links, "system_regions") {
                Some(url) => parse_system_regions(&self.get_text(url).await?)?,
                None => Default::default(),
            };

            Ok(FeedDocuments {
                information: parse_station_information(&information)?,
                status: parse_station_status(&status)?,
                angels: parse_bike_angels(&angels)?,
                regions,
            })
        }
    }
}
