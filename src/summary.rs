use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::types::{FetchStatus, Severity, Snapshot};

/// Incident count for one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindCount {
    pub kind: String,
    pub count: usize,
}

/// Headline counters for a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total: usize,
    pub urgent: usize,
    pub customers_affected: u64,
    /// Ordered by first appearance in the snapshot
    pub by_kind: Vec<KindCount>,
    pub fetched_at: DateTime<Utc>,
    pub status: FetchStatus,
}

impl SnapshotSummary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut by_kind: Vec<KindCount> = Vec::new();
        for incident in &snapshot.incidents {
            match by_kind.iter_mut().find(|k| k.kind == incident.kind) {
                Some(entry) => entry.count += 1,
                None => by_kind.push(KindCount {
                    kind: incident.kind.clone(),
                    count: 1,
                }),
            }
        }

        Self {
            total: snapshot.incidents.len(),
            urgent: snapshot
                .incidents
                .iter()
                .filter(|i| i.severity() == Severity::Urgent)
                .count(),
            customers_affected: snapshot
                .incidents
                .iter()
                .filter_map(|i| i.customers_affected)
                .map(u64::from)
                .sum(),
            by_kind,
            fetched_at: snapshot.fetched_at,
            status: snapshot.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Incident;

    fn incident(kind: &str, customers: Option<u32>) -> Incident {
        Incident {
            id: "INC".to_string(),
            kind: kind.to_string(),
            location_label: "Lisburn".to_string(),
            postcode_or_area: Some("BT27".to_string()),
            latitude: 54.51,
            longitude: -6.04,
            reported_at: "10:00".to_string(),
            estimated_restoration: "12:00".to_string(),
            status: "Investigating".to_string(),
            customers_affected: customers,
            message: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let snapshot = Snapshot::live(
            vec![
                incident("Planned Work", Some(30)),
                incident("Unplanned Outage", Some(120)),
                incident("Planned Work", None),
                incident("Storm Damage", Some(15)),
            ],
            Utc::now(),
        );

        let summary = SnapshotSummary::from_snapshot(&snapshot);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.urgent, 1);
        assert_eq!(summary.customers_affected, 165);
        assert_eq!(
            summary.by_kind,
            vec![
                KindCount { kind: "Planned Work".into(), count: 2 },
                KindCount { kind: "Unplanned Outage".into(), count: 1 },
                KindCount { kind: "Storm Damage".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_failed_snapshot_summary() {
        let summary = SnapshotSummary::from_snapshot(&Snapshot::failed("timeout", Utc::now()));
        assert_eq!(summary.total, 0);
        assert!(matches!(summary.status, FetchStatus::Failed { .. }));
    }
}
