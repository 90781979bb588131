/// Source name constants shared by the CLI, config and feed sources

// User-facing source kinds (used in CLI and config)
pub const JSON_FEED_SOURCE: &str = "json";
pub const HTML_TABLE_SOURCE: &str = "html";

// Upstream defaults
pub const DEFAULT_JSON_FEED_URL: &str = "https://powercheck.nienetworks.co.uk/data/incidents.json";
pub const DEFAULT_GEOCODER_URL: &str = "https://api.postcodes.io";
pub const DEFAULT_TABLE_SELECTOR: &str = "table";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

// Matches the dashboard's five-minute refresh period
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 5;

// Keys a JSON document may wrap its incident list under, tried in order
pub const WRAPPER_KEYS: &[&str] = &["incidents", "faults", "outages", "data", "items", "results"];

// Case-insensitive substrings that mark an incident kind as urgent
pub const URGENT_KEYWORDS: &[&str] = &["unplanned", "fault", "hv"];

// Display fallbacks for fields the upstream left out
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const UNKNOWN_KIND: &str = "Unknown";
pub const UNKNOWN_STATUS: &str = "Unknown";
pub const UNKNOWN_TIME: &str = "N/A";
pub const INCIDENT_ID_PREFIX: &str = "INC-";

/// Get all supported source kinds
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![JSON_FEED_SOURCE, HTML_TABLE_SOURCE]
}
