//! Upstream feed sources
//!
//! A source turns one upstream payload into raw key/value records. It knows
//! nothing about canonical fields; that is the normalizer's job.

pub mod html_table;
pub mod json_feed;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::app::ports::HttpClientPort;
use crate::common::error::{FeedError, Result};
use crate::common::types::RawRecord;

pub use html_table::HtmlTableSource;
pub use json_feed::JsonFeedSource;

/// Core trait that all incident feeds must implement
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Identifier used in logs and metric labels
    fn source_name(&self) -> &'static str;

    /// Fetch the upstream payload and split it into raw records
    async fn fetch_records(&self) -> Result<Vec<RawRecord>>;
}

/// Where a source reads its payload from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOrigin {
    Url(String),
    File(PathBuf),
}

impl std::fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadOrigin::Url(url) => write!(f, "{}", url),
            PayloadOrigin::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Read the raw payload bytes, treating any non-2xx response as a failure.
#[instrument(skip_all, fields(origin = %origin))]
pub async fn load_payload(http: &Arc<dyn HttpClientPort>, origin: &PayloadOrigin) -> Result<String> {
    let bytes = match origin {
        PayloadOrigin::Url(url) => {
            let resp = http.get(url).await.map_err(FeedError::Transport)?;
            if !resp.is_success() {
                return Err(FeedError::UpstreamStatus {
                    url: url.clone(),
                    status: resp.status,
                });
            }
            debug!(
                "Fetched {} bytes ({}) from upstream",
                resp.content_length, resp.content_type
            );
            resp.bytes
        }
        PayloadOrigin::File(path) => tokio::fs::read(path).await?,
    };

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
