//! Feed normalizer: heterogeneous upstream records in, uniform incidents out.
//!
//! Per-record problems never escape this module. A record that can't be
//! placed on a map is dropped and counted; every other missing field falls
//! back to a display default independently.

pub mod remap;

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::Geocoder;
use crate::common::constants::{
    INCIDENT_ID_PREFIX, UNKNOWN_KIND, UNKNOWN_LOCATION, UNKNOWN_STATUS, UNKNOWN_TIME,
};
use crate::common::types::{Incident, RawRecord};
use crate::observability::metrics;
use crate::sources::json_feed::extract_records;

pub use crate::common::types::{classify_severity, Severity};
use remap::{remap, value_as_coordinates, value_as_f64, value_as_u32, CanonicalField, RemappedRecord};

static AREA_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}[A-Z]*[0-9]+").expect("area code pattern is valid"));

/// First outcode-shaped token in `raw` (e.g. "BT12" from "BT12 3; BT9 4").
///
/// The match must start on a word boundary, so a code glued onto preceding
/// letters or digits ("Area1BT12") is not found. `None` tells the caller to
/// skip geocoding for the record.
pub fn extract_area_code(raw: &str) -> Option<String> {
    AREA_CODE.find(raw).map(|m| m.as_str().to_string())
}

/// Finite and inside WGS84 bounds
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Why a record didn't make it into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoAreaCode,
    GeocodingSkipped,
    GeocodingFailed,
    InvalidCoordinates,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NoAreaCode => "no_area_code",
            DropReason::GeocodingSkipped => "geocoding_skipped",
            DropReason::GeocodingFailed => "geocoding_failed",
            DropReason::InvalidCoordinates => "invalid_coordinates",
        }
    }
}

#[derive(Default)]
pub struct FeedNormalizer {
    /// Lookup collaborator for records without coordinates; `None` skips geocoding
    pub geocoder: Option<Arc<dyn Geocoder>>,
}

impl FeedNormalizer {
    pub fn new(geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self { geocoder }
    }

    /// Normalize `records` in input order, dropping any without resolvable
    /// coordinates. Geocoding requests are made one at a time.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn normalize(&self, records: &[RawRecord]) -> Vec<Incident> {
        metrics::normalizer::records_received(records.len() as u64);

        let mut incidents = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.normalize_record(index, record).await {
                Ok(incident) => incidents.push(incident),
                Err(reason) => {
                    debug!(index, reason = reason.as_str(), "Dropping record");
                    metrics::normalizer::record_dropped(reason.as_str());
                }
            }
        }

        metrics::normalizer::incidents_emitted(incidents.len() as u64);
        info!(
            "Normalized {} of {} records into incidents",
            incidents.len(),
            records.len()
        );
        incidents
    }

    /// Normalize a raw JSON payload. Empty or unparsable input yields no
    /// incidents.
    pub async fn normalize_json(&self, payload: &str) -> Vec<Incident> {
        match extract_records(payload) {
            Ok(records) => self.normalize(&records).await,
            Err(e) => {
                warn!("Unparsable JSON payload: {}", e);
                Vec::new()
            }
        }
    }

    /// Look `area_code` up once. Any failure, including out-of-range results,
    /// is `None`.
    pub async fn resolve_coordinates(&self, area_code: &str) -> Option<(f64, f64)> {
        let geocoder = self.geocoder.as_ref()?;
        geocoder
            .geocode(area_code)
            .await
            .filter(|(lat, lng)| valid_coordinates(*lat, *lng))
    }

    async fn normalize_record(&self, index: usize, record: &RawRecord) -> Result<Incident, DropReason> {
        let fields = remap(record);

        let postcode_or_area = fields.text(CanonicalField::PostcodeOrArea);
        let location = fields.text(CanonicalField::Location);
        let (latitude, longitude) = self
            .locate(&fields, postcode_or_area.as_deref(), location.as_deref())
            .await?;

        let location_label = location
            .or_else(|| postcode_or_area.clone())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        Ok(Incident {
            id: fields
                .text(CanonicalField::Id)
                .unwrap_or_else(|| format!("{}{}", INCIDENT_ID_PREFIX, index)),
            kind: text_or(&fields, CanonicalField::Kind, UNKNOWN_KIND),
            location_label,
            postcode_or_area,
            latitude,
            longitude,
            reported_at: text_or(&fields, CanonicalField::ReportedAt, UNKNOWN_TIME),
            estimated_restoration: text_or(&fields, CanonicalField::EstimatedRestoration, UNKNOWN_TIME),
            status: text_or(&fields, CanonicalField::Status, UNKNOWN_STATUS),
            customers_affected: fields.get(CanonicalField::CustomersAffected).and_then(value_as_u32),
            message: fields.text(CanonicalField::Message),
        })
    }

    /// Explicit lat/lng fields, then a coordinate pair, then geocoding.
    async fn locate(
        &self,
        fields: &RemappedRecord,
        postcode_or_area: Option<&str>,
        location: Option<&str>,
    ) -> Result<(f64, f64), DropReason> {
        let explicit = match (
            fields.get(CanonicalField::Latitude).and_then(value_as_f64),
            fields.get(CanonicalField::Longitude).and_then(value_as_f64),
        ) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => fields.get(CanonicalField::Coordinates).and_then(value_as_coordinates),
        };

        if let Some((lat, lng)) = explicit {
            return if valid_coordinates(lat, lng) {
                Ok((lat, lng))
            } else {
                Err(DropReason::InvalidCoordinates)
            };
        }

        let area_code = postcode_or_area
            .and_then(extract_area_code)
            .or_else(|| location.and_then(extract_area_code))
            .ok_or(DropReason::NoAreaCode)?;

        if self.geocoder.is_none() {
            return Err(DropReason::GeocodingSkipped);
        }
        self.resolve_coordinates(&area_code)
            .await
            .ok_or(DropReason::GeocodingFailed)
    }
}

fn text_or(fields: &RemappedRecord, field: CanonicalField, default: &str) -> String {
    fields.text(field).unwrap_or_else(|| default.to_string())
}
