use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use sitewalk_core::connectivity::NetworkSignal;
use sitewalk_core::export::{
    newest_first, render_inspections_export, suggested_export_file_name,
};
use sitewalk_core::util::unix_timestamp_millis;
use sitewalk_core::InspectionLog;

use crate::cli::ExportFormat;
use crate::commands::common::{
    format_inspection_lines, inspection_to_list_item, read_json_input, write_output, CliContext,
    InspectionListItem,
};
use crate::error::CliError;

/// Parse a log produced by a runner, filling `id` and `date` when absent.
pub fn parse_inspection_input(raw: &str) -> Result<InspectionLog, CliError> {
    let mut value = serde_json::from_str::<Value>(raw)?;
    let Some(object) = value.as_object_mut() else {
        return Err(CliError::InvalidInput(
            "inspection log must be a JSON object".to_string(),
        ));
    };

    let missing = |field: Option<&Value>| {
        field
            .and_then(Value::as_str)
            .is_none_or(|text| text.trim().is_empty())
    };
    if missing(object.get("id")) {
        object.insert("id".to_string(), Value::String(InspectionLog::new_id()));
    }
    if missing(object.get("date")) {
        object.insert(
            "date".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }

    let log = serde_json::from_value::<InspectionLog>(value)
        .map_err(|error| CliError::InvalidInput(format!("invalid inspection log: {error}")))?;
    if log.site_id.trim().is_empty() {
        return Err(CliError::InvalidInput("siteId cannot be empty".to_string()));
    }
    Ok(log)
}

pub async fn run_inspections_list(
    pending_only: bool,
    as_json: bool,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let engine = ctx.open_engine(NetworkSignal::offline()).await?;
    let logs = if pending_only {
        engine.store().pending_inspections().await?
    } else {
        engine.get_inspections().await?
    };
    let ordered = newest_first(&logs);
    let now_ms = unix_timestamp_millis();

    if as_json {
        let json_items = ordered
            .iter()
            .map(|log| inspection_to_list_item(log, now_ms))
            .collect::<Vec<InspectionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if ordered.is_empty() {
        println!("No inspections recorded.");
    } else {
        for line in format_inspection_lines(&ordered, now_ms) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_inspections_record(file: &Path, ctx: &CliContext) -> Result<(), CliError> {
    let log = parse_inspection_input(&read_json_input(file)?)?;
    let id = log.id.clone();

    let engine = ctx.open_engine(NetworkSignal::default()).await?;
    if engine.save_inspection(log).await? {
        println!("Recorded inspection {id}");
    } else {
        println!("Recorded inspection {id} (pending upload)");
    }
    Ok(())
}

pub async fn run_inspections_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    ctx: &CliContext,
) -> Result<(), CliError> {
    let engine = ctx.open_engine(NetworkSignal::offline()).await?;
    let logs = engine.get_inspections().await?;
    let rendered = render_inspections_export(&logs, format.into())?;

    // A directory gets a generated file name.
    let output_path = output_path.map(|path| {
        if path.is_dir() {
            path.join(suggested_export_file_name(
                format.into(),
                unix_timestamp_millis(),
            ))
        } else {
            path.to_path_buf()
        }
    });
    write_output(&rendered, output_path.as_deref())
}
