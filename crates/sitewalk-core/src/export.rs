//! Inspection history export shared by every client.

use std::cmp::Reverse;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{InspectionLog, InspectionStatus};

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Flattened log representation used in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInspection {
    pub id: String,
    pub site_name: String,
    pub date: String,
    pub inspector_name: String,
    pub inspector_email: String,
    pub status: InspectionStatus,
    pub total: usize,
    pub passed: usize,
    pub failed: Vec<ExportFinding>,
    pub photos: usize,
    pub synced: bool,
}

/// A failed answer as it appears in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFinding {
    pub area_name: String,
    pub point_name: String,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[must_use]
pub fn inspection_to_export_item(log: &InspectionLog) -> ExportInspection {
    ExportInspection {
        id: log.id.clone(),
        site_name: log.site_name.clone(),
        date: log.date.clone(),
        inspector_name: log.inspector_name.clone(),
        inspector_email: log.inspector_email.clone(),
        status: log.status,
        total: log.answers.len(),
        passed: log.passed_count(),
        failed: log
            .failed_answers()
            .map(|answer| ExportFinding {
                area_name: answer.area_name.clone(),
                point_name: answer.point_name.clone(),
                question: answer.question.clone(),
                photo_url: answer.photo_url.clone(),
            })
            .collect(),
        photos: log.photo_count(),
        synced: log.synced.unwrap_or(false),
    }
}

/// Logs ordered newest first. Unparseable dates sort last, in input order.
#[must_use]
pub fn newest_first(logs: &[InspectionLog]) -> Vec<&InspectionLog> {
    let mut ordered = logs.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|log| Reverse(log.date_millis().unwrap_or(i64::MIN)));
    ordered
}

/// Render logs as pretty-printed JSON.
pub fn render_json_export(logs: &[InspectionLog]) -> serde_json::Result<String> {
    let items = newest_first(logs)
        .into_iter()
        .map(inspection_to_export_item)
        .collect::<Vec<ExportInspection>>();
    serde_json::to_string_pretty(&items)
}

/// Render logs as a Markdown report, one section per log.
#[must_use]
pub fn render_markdown_export(logs: &[InspectionLog]) -> String {
    let mut output = String::from("# Inspection history\n");

    for log in newest_first(logs) {
        let item = inspection_to_export_item(log);
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} ({})", item.site_name, item.date);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "- Inspector: {} <{}>",
            item.inspector_name, item.inspector_email
        );
        let _ = writeln!(output, "- Status: {}", status_label(item.status));
        let _ = writeln!(output, "- Result: {}/{} OK", item.passed, item.total);
        let _ = writeln!(output, "- Photos: {}", item.photos);
        if !item.synced {
            let _ = writeln!(output, "- Pending upload");
        }

        if item.failed.is_empty() {
            continue;
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "### Findings");
        for finding in &item.failed {
            let _ = write!(
                output,
                "- [{}] {}: {}",
                finding.area_name, finding.point_name, finding.question
            );
            if finding.photo_url.is_some() {
                output.push_str(" (photo attached)");
            }
            output.push('\n');
        }
    }

    output
}

/// Render logs based on selected export format.
pub fn render_inspections_export(
    logs: &[InspectionLog],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(logs),
        ExportFormat::Markdown => Ok(render_markdown_export(logs)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("sitewalk-export-{timestamp_ms}.{}", format.extension())
}

const fn status_label(status: InspectionStatus) -> &'static str {
    match status {
        InspectionStatus::Completed => "completed",
        InspectionStatus::Draft => "draft",
    }
}
