use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{load_payload, FeedSource, PayloadOrigin};
use crate::app::ports::HttpClientPort;
use crate::common::constants::{JSON_FEED_SOURCE, WRAPPER_KEYS};
use crate::common::error::Result;
use crate::common::types::RawRecord;

/// A JSON document that is either a list of incident objects or a dictionary
/// wrapping that list under one of the known keys
pub struct JsonFeedSource {
    http: Arc<dyn HttpClientPort>,
    origin: PayloadOrigin,
}

impl JsonFeedSource {
    pub fn new(http: Arc<dyn HttpClientPort>, origin: PayloadOrigin) -> Self {
        Self { http, origin }
    }
}

#[async_trait]
impl FeedSource for JsonFeedSource {
    fn source_name(&self) -> &'static str {
        JSON_FEED_SOURCE
    }

    #[instrument(skip(self), fields(origin = %self.origin))]
    async fn fetch_records(&self) -> Result<Vec<RawRecord>> {
        let payload = load_payload(&self.http, &self.origin).await?;
        let records = extract_records(&payload)?;
        info!("Extracted {} records from JSON feed", records.len());
        Ok(records)
    }
}

/// Parse `payload` and pull out the incident objects.
///
/// A dictionary is only ever unwrapped through [`WRAPPER_KEYS`]; its other
/// values are never mistaken for records. Blank input is an empty feed, not
/// an error.
pub fn extract_records(payload: &str) -> Result<Vec<RawRecord>> {
    if payload.trim().is_empty() {
        debug!("Empty JSON payload");
        return Ok(Vec::new());
    }

    let document: Value = serde_json::from_str(payload)?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let wrapped = WRAPPER_KEYS
                .iter()
                .find(|key| map.get(**key).map_or(false, Value::is_array))
                .and_then(|key| map.remove(*key));
            match wrapped {
                Some(Value::Array(items)) => items,
                _ => {
                    warn!(
                        "JSON object has no known list key (tried {:?}); treating as empty feed",
                        WRAPPER_KEYS
                    );
                    return Ok(Vec::new());
                }
            }
        }
        other => {
            warn!("Unexpected top-level JSON value: {}", json_kind(&other));
            return Ok(Vec::new());
        }
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();

    if records.len() < total {
        debug!("Skipped {} non-object list entries", total - records.len());
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
