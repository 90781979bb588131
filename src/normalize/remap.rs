//! Field-name remapping from upstream synonyms to canonical incident fields.
//!
//! Upstream feeds disagree on naming ("Postcode" vs "postcode" vs
//! "Postcodes Affected", "startTime" vs "Time Reported"). Keys are folded
//! (lowercased, non-alphanumerics stripped) before lookup, so one table entry
//! covers every casing and spacing variant of a name.

use serde_json::Value;
use std::collections::HashMap;

use crate::common::types::RawRecord;

/// The fixed set of fields an incident is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Id,
    Kind,
    Location,
    PostcodeOrArea,
    Latitude,
    Longitude,
    /// `[lat, lng]` pair or `{lat, lng}` object carried in a single field
    Coordinates,
    ReportedAt,
    EstimatedRestoration,
    Status,
    CustomersAffected,
    Message,
}

/// Ordered synonym table. For each canonical field the first synonym (in
/// table order) present with a usable value wins.
pub const REMAP_TABLE: &[(&str, CanonicalField)] = &[
    ("id", CanonicalField::Id),
    ("incidentid", CanonicalField::Id),
    ("incidentref", CanonicalField::Id),
    ("reference", CanonicalField::Id),
    ("faultid", CanonicalField::Id),
    ("ref", CanonicalField::Id),
    ("type", CanonicalField::Kind),
    ("kind", CanonicalField::Kind),
    ("incidenttype", CanonicalField::Kind),
    ("faulttype", CanonicalField::Kind),
    ("outagetype", CanonicalField::Kind),
    ("category", CanonicalField::Kind),
    ("location", CanonicalField::Location),
    ("town", CanonicalField::Location),
    ("locationname", CanonicalField::Location),
    ("placename", CanonicalField::Location),
    ("cluster", CanonicalField::Location),
    ("name", CanonicalField::Location),
    ("postcode", CanonicalField::PostcodeOrArea),
    ("outcode", CanonicalField::PostcodeOrArea),
    ("postcodes", CanonicalField::PostcodeOrArea),
    ("postcodesaffected", CanonicalField::PostcodeOrArea),
    ("postcodearea", CanonicalField::PostcodeOrArea),
    ("postalcode", CanonicalField::PostcodeOrArea),
    ("area", CanonicalField::PostcodeOrArea),
    ("latitude", CanonicalField::Latitude),
    ("lat", CanonicalField::Latitude),
    ("longitude", CanonicalField::Longitude),
    ("lng", CanonicalField::Longitude),
    ("lon", CanonicalField::Longitude),
    ("long", CanonicalField::Longitude),
    ("coordinates", CanonicalField::Coordinates),
    ("coords", CanonicalField::Coordinates),
    ("latlng", CanonicalField::Coordinates),
    ("position", CanonicalField::Coordinates),
    ("starttime", CanonicalField::ReportedAt),
    ("reportedat", CanonicalField::ReportedAt),
    ("timereported", CanonicalField::ReportedAt),
    ("datereported", CanonicalField::ReportedAt),
    ("reported", CanonicalField::ReportedAt),
    ("loggedat", CanonicalField::ReportedAt),
    ("estrestoration", CanonicalField::EstimatedRestoration),
    ("estimatedrestoration", CanonicalField::EstimatedRestoration),
    ("estimatedrestorationtime", CanonicalField::EstimatedRestoration),
    ("restorationtime", CanonicalField::EstimatedRestoration),
    ("restoretime", CanonicalField::EstimatedRestoration),
    ("etr", CanonicalField::EstimatedRestoration),
    ("status", CanonicalField::Status),
    ("currentstatus", CanonicalField::Status),
    ("state", CanonicalField::Status),
    ("customersaffected", CanonicalField::CustomersAffected),
    ("affectedcustomers", CanonicalField::CustomersAffected),
    ("premisesaffected", CanonicalField::CustomersAffected),
    ("customers", CanonicalField::CustomersAffected),
    ("message", CanonicalField::Message),
    ("description", CanonicalField::Message),
    ("details", CanonicalField::Message),
    ("update", CanonicalField::Message),
];

/// A record split into the canonical fields it provided and everything else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemappedRecord {
    pub canonical: HashMap<CanonicalField, Value>,
    pub leftover: RawRecord,
}

impl RemappedRecord {
    pub fn get(&self, field: CanonicalField) -> Option<&Value> {
        self.canonical.get(&field)
    }

    pub fn text(&self, field: CanonicalField) -> Option<String> {
        self.get(field).and_then(value_as_text)
    }
}

/// Lowercase and drop everything that isn't a letter or digit.
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Split `record` using [`REMAP_TABLE`].
pub fn remap(record: &RawRecord) -> RemappedRecord {
    // Several raw keys can fold to the same name; each is tried in record order
    let mut folded: HashMap<String, Vec<&str>> = HashMap::new();
    for key in record.keys() {
        folded.entry(fold_key(key)).or_default().push(key.as_str());
    }

    let mut canonical = HashMap::new();
    let mut consumed: Vec<&str> = Vec::new();

    for (synonym, field) in REMAP_TABLE {
        if canonical.contains_key(field) {
            continue;
        }
        let Some(raw_keys) = folded.get(*synonym) else {
            continue;
        };
        let usable = raw_keys
            .iter()
            .find_map(|raw_key| record.get(*raw_key).filter(|v| is_usable(v)).map(|v| (*raw_key, v)));
        if let Some((raw_key, value)) = usable {
            canonical.insert(*field, value.clone());
            consumed.push(raw_key);
        }
    }

    let leftover = record
        .iter()
        .filter(|(key, _)| !consumed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    RemappedRecord { canonical, leftover }
}

fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// Display text for a scalar value; numbers are rendered as written.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whole, non-negative counts; accepts "1,200" style strings.
pub fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Read a coordinate pair from `[lat, lng]`, `{lat, lng}` or `"lat,lng"`.
pub fn value_as_coordinates(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some((value_as_f64(&items[0])?, value_as_f64(&items[1])?))
        }
        Value::Object(map) => {
            let lat = ["lat", "latitude"].iter().find_map(|k| map.get(*k))?;
            let lng = ["lng", "lon", "long", "longitude"].iter().find_map(|k| map.get(*k))?;
            Some((value_as_f64(lat)?, value_as_f64(lng)?))
        }
        Value::String(s) => {
            let (lat, lng) = s.split_once(',')?;
            Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
        }
        _ => None,
    }
}
