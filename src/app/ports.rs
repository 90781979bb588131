use async_trait::async_trait;

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub content_length: u64,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Resolves an area code (outcode) to a latitude/longitude pair.
///
/// Any failure is reported as `None`; callers drop the record rather than
/// retrying.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, area_code: &str) -> Option<(f64, f64)>;
}
