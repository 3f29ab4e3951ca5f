//! Inspection log model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SyncRecord;

/// Lifecycle of an inspection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    #[default]
    Completed,
    Draft,
}

/// Recorded response to one inspection point.
///
/// Point, question and area names are snapshots so the answer stays readable
/// after the site configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub point_id: String,
    pub point_name: String,
    pub question: String,
    pub area_name: String,
    pub is_ok: bool,
    /// Inline-encoded photo evidence (data URI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Capture timestamp (Unix ms)
    pub timestamp: i64,
}

/// One completed (or draft) run of a site's checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionLog {
    pub id: String,
    pub site_id: String,
    /// Site name at inspection time, never live-joined
    pub site_name: String,
    /// Inspection date/time as recorded by the runner (RFC 3339)
    pub date: String,
    pub inspector_name: String,
    pub inspector_dni: String,
    pub inspector_email: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub status: InspectionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<bool>,
}

impl InspectionLog {
    /// Generate a fresh, time-sortable log identifier.
    #[must_use]
    pub fn new_id() -> String {
        Uuid::now_v7().to_string()
    }

    /// Number of answers marked as passing.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.answers.iter().filter(|answer| answer.is_ok).count()
    }

    /// Answers that flagged a problem, in walk order.
    pub fn failed_answers(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter().filter(|answer| !answer.is_ok)
    }

    /// Number of answers carrying photo evidence.
    #[must_use]
    pub fn photo_count(&self) -> usize {
        self.answers
            .iter()
            .filter(|answer| answer.photo_url.is_some())
            .count()
    }

    /// Parsed inspection date as Unix ms, when the stored value is RFC 3339.
    #[must_use]
    pub fn date_millis(&self) -> Option<i64> {
        chrono::DateTime::parse_from_rfc3339(&self.date)
            .ok()
            .map(|date| date.timestamp_millis())
    }
}

impl SyncRecord for InspectionLog {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn synced_flag(&self) -> Option<bool> {
        self.synced
    }

    fn set_synced(&mut self, synced: bool) {
        self.synced = Some(synced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn answer(point_id: &str, is_ok: bool) -> Answer {
        Answer {
            point_id: point_id.to_string(),
            point_name: format!("Punto {point_id}"),
            question: "¿Correcto?".to_string(),
            area_name: "Caseta de Control".to_string(),
            is_ok,
            photo_url: None,
            timestamp: 1_700_000_000_000,
        }
    }

    fn log() -> InspectionLog {
        InspectionLog {
            id: InspectionLog::new_id(),
            site_id: "site-1".to_string(),
            site_name: "Cantera Los Álamos (Demo)".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            inspector_name: "Ana".to_string(),
            inspector_dni: "12345678A".to_string(),
            inspector_email: "ana@example.com".to_string(),
            answers: vec![answer("pt-1", true), answer("pt-2", false)],
            status: InspectionStatus::Completed,
            synced: None,
        }
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(InspectionLog::new_id(), InspectionLog::new_id());
    }

    #[test]
    fn counts_passed_and_failed_answers() {
        let log = log();
        assert_eq!(log.passed_count(), 1);
        let failed = log.failed_answers().map(|a| a.point_id.as_str()).collect::<Vec<_>>();
        assert_eq!(failed, vec!["pt-2"]);
        assert_eq!(log.photo_count(), 0);
    }

    #[test]
    fn serializes_with_camel_case_field_names() {
        let json = serde_json::to_value(log()).unwrap();
        assert!(json.get("siteId").is_some());
        assert!(json.get("inspectorDni").is_some());
        assert_eq!(json["status"], serde_json::json!("completed"));
        assert_eq!(json["answers"][0]["isOk"], serde_json::json!(true));
        assert!(json.get("synced").is_none());
    }

    #[test]
    fn parses_date_millis() {
        assert_eq!(log().date_millis(), Some(1_714_557_600_000));
        let mut undated = log();
        undated.date = "yesterday".to_string();
        assert_eq!(undated.date_millis(), None);
    }

    #[test]
    fn draft_status_roundtrips() {
        let mut draft = log();
        draft.status = InspectionStatus::Draft;
        let raw = serde_json::to_string(&draft).unwrap();
        assert!(raw.contains("\"draft\""));
        let parsed: InspectionLog = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, draft);
    }
}
