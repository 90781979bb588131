use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::constants::URGENT_KEYWORDS;

/// One upstream record as handed over by a feed source: a JSON object whose
/// keys and value shapes vary by source
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Two-bucket classification used to color incidents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Urgent,
    Informational,
}

/// Classify an incident kind by case-insensitive substring match against the
/// urgent keyword set. Anything that matches nothing is informational.
pub fn classify_severity(kind: &str) -> Severity {
    let kind_lower = kind.to_lowercase();
    if URGENT_KEYWORDS.iter().any(|kw| kind_lower.contains(kw)) {
        Severity::Urgent
    } else {
        Severity::Informational
    }
}

/// A normalized outage/work record with a fixed field set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub kind: String,
    pub location_label: String,
    pub postcode_or_area: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub reported_at: String,
    pub estimated_restoration: String,
    pub status: String,
    pub customers_affected: Option<u32>,
    pub message: Option<String>,
}

impl Incident {
    pub fn severity(&self) -> Severity {
        classify_severity(&self.kind)
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Outcome of the fetch cycle that produced a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FetchStatus {
    Live,
    Failed { reason: String },
}

/// The complete set of incidents produced by one fetch cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub incidents: Vec<Incident>,
    pub fetched_at: DateTime<Utc>,
    pub status: FetchStatus,
}

impl Snapshot {
    pub fn live(incidents: Vec<Incident>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            incidents,
            fetched_at,
            status: FetchStatus::Live,
        }
    }

    /// A failed cycle never carries incidents.
    pub fn failed(reason: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            incidents: Vec::new(),
            fetched_at,
            status: FetchStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FetchStatus::Failed { .. })
    }
}
