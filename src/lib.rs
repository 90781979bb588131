pub mod app;
pub mod cache;
pub mod common;
pub mod config;
pub mod infra;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod summary;

pub use cache::SnapshotCache;
pub use common::error::{FeedError, Result};
pub use common::types::{classify_severity, FetchStatus, Incident, RawRecord, Severity, Snapshot};
pub use normalize::{extract_area_code, FeedNormalizer};
pub use pipeline::FeedPipeline;
pub use summary::SnapshotSummary;
