use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::app::ports::{Geocoder, HttpClientPort};
use crate::observability::metrics;

/// Outcode lookups against a postcodes.io-compatible service
pub struct PostcodesIoGeocoder {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OutcodeResponse {
    status: u16,
    result: Option<OutcodeResult>,
}

#[derive(Debug, Deserialize)]
struct OutcodeResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl PostcodesIoGeocoder {
    pub fn new(http: Arc<dyn HttpClientPort>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn outcode_url(&self, area_code: &str) -> String {
        format!(
            "{}/outcodes/{}",
            self.base_url.trim_end_matches('/'),
            area_code.trim()
        )
    }
}

/// Pull coordinates out of a lookup response body, if it carries any.
fn parse_outcode_body(body: &[u8]) -> Option<(f64, f64)> {
    let parsed: OutcodeResponse = serde_json::from_slice(body).ok()?;
    if !(200..300).contains(&parsed.status) {
        return None;
    }
    let result = parsed.result?;
    Some((result.latitude?, result.longitude?))
}

#[async_trait]
impl Geocoder for PostcodesIoGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, area_code: &str) -> Option<(f64, f64)> {
        metrics::geocoder::lookup();
        let url = self.outcode_url(area_code);

        let resp = match self.http.get(&url).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Geocoder request failed: {}", e);
                metrics::geocoder::lookup_failure();
                return None;
            }
        };
        if !resp.is_success() {
            debug!("Geocoder returned status {}", resp.status);
            metrics::geocoder::lookup_failure();
            return None;
        }

        let coords = parse_outcode_body(&resp.bytes);
        if coords.is_none() {
            debug!("Geocoder response had no usable coordinates");
            metrics::geocoder::lookup_failure();
        }
        coords
    }
}
