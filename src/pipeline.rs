use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::app::ports::{Geocoder, HttpClientPort};
use crate::cache::SnapshotCache;
use crate::common::error::Result;
use crate::common::types::Snapshot;
use crate::config::{Config, FeedKind};
use crate::infra::geocoder::PostcodesIoGeocoder;
use crate::infra::http_client::ReqwestHttp;
use crate::normalize::FeedNormalizer;
use crate::observability::metrics;
use crate::sources::{FeedSource, HtmlTableSource, JsonFeedSource, PayloadOrigin};

/// One fetch cycle: pull records from a source and normalize them into a
/// snapshot
pub struct FeedPipeline {
    source: Box<dyn FeedSource>,
    normalizer: FeedNormalizer,
}

impl FeedPipeline {
    pub fn new(source: Box<dyn FeedSource>, normalizer: FeedNormalizer) -> Self {
        Self { source, normalizer }
    }

    /// Wire up the source and geocoder described by `config`. `origin`
    /// overrides the configured feed URL (e.g. a local file).
    pub fn from_config(config: &Config, origin: Option<PayloadOrigin>) -> Result<Self> {
        let feed_http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::with_timeout(config.feed.timeout_seconds)?);
        let origin = origin.unwrap_or_else(|| PayloadOrigin::Url(config.feed.url.clone()));

        let source: Box<dyn FeedSource> = match config.feed.kind {
            FeedKind::Json => Box::new(JsonFeedSource::new(feed_http, origin)),
            FeedKind::Html => Box::new(HtmlTableSource::new(feed_http, origin, config.feed.table_selector.clone())),
        };

        let geocoder: Option<Arc<dyn Geocoder>> = if config.geocoder.enabled {
            let geocoder_http: Arc<dyn HttpClientPort> =
                Arc::new(ReqwestHttp::with_timeout(config.geocoder.timeout_seconds)?);
            Some(Arc::new(PostcodesIoGeocoder::new(geocoder_http, config.geocoder.base_url.clone())))
        } else {
            None
        };

        Ok(Self::new(source, FeedNormalizer::new(geocoder)))
    }

    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    /// Run a fetch cycle. A total fetch failure becomes an empty snapshot
    /// marked failed; nothing is returned as an error.
    pub async fn run(&self) -> Snapshot {
        self.run_at(Utc::now()).await
    }

    #[instrument(skip(self), fields(source = self.source.source_name()))]
    pub async fn run_at(&self, fetched_at: DateTime<Utc>) -> Snapshot {
        let source = self.source.source_name();
        match self.source.fetch_records().await {
            Ok(records) => {
                let incidents = self.normalizer.normalize(&records).await;
                metrics::pipeline::fetch_success(source);
                info!("Fetch cycle produced {} incidents", incidents.len());
                Snapshot::live(incidents, fetched_at)
            }
            Err(e) => {
                metrics::pipeline::fetch_failure(source);
                error!("Fetch cycle failed: {}", e);
                Snapshot::failed(e.to_string(), fetched_at)
            }
        }
    }

    /// Serve from `cache` while it's fresh, otherwise run exactly one cycle.
    pub async fn fetch(&self, cache: &SnapshotCache) -> Arc<Snapshot> {
        self.fetch_at(cache, Utc::now()).await
    }

    pub async fn fetch_at(&self, cache: &SnapshotCache, now: DateTime<Utc>) -> Arc<Snapshot> {
        cache.get_or_refresh_at(now, || self.run_at(now)).await
    }
}
