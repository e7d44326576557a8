//! Renders a `ProcessorReport` as either the §6.4 textual report or the
//! `--output=json` structured mode (SUPPLEMENT 1), including the inline
//! partial-failure blocks of SUPPLEMENT 2.

use console::Style;
use serde::Serialize;

use xdiff_core::ValidationIssue;
use xdiff_pipeline::{ProcessorReport, SchemaValidationError};

#[derive(Serialize)]
struct JsonSchemaError<'a> {
    gvk: String,
    namespace: &'a Option<String>,
    name: &'a str,
    issues: &'a [ValidationIssue],
}

#[derive(Serialize)]
struct JsonReport<'a> {
    diffs: &'a [xdiff_core::ResourceDiff],
    schema_errors: Vec<JsonSchemaError<'a>>,
    tool_errors: Vec<String>,
}

pub fn render_text(report: &ProcessorReport, use_color: bool) -> String {
    let mut out = xdiff_pipeline::report::render(&report.diffs, use_color);

    for error in &report.schema_errors {
        out.push_str(&format!("\n---\n{}\n", schema_error_block(error, use_color)));
    }
    for error in &report.tool_errors {
        out.push_str(&format!("\n---\n{}\n", tool_error_block(error, use_color)));
    }

    out
}

fn schema_error_block(error: &SchemaValidationError, use_color: bool) -> String {
    let header = format!(
        "--- {} {}/{} FAILED: SchemaValidationError",
        error.gvk,
        error.namespace.as_deref().unwrap_or(""),
        error.name
    );
    let header = if use_color {
        Style::new().red().bold().apply_to(&header).to_string()
    } else {
        header
    };
    let mut lines = vec![header];
    for issue in &error.issues {
        lines.push(format!("  {}: {}", issue.path, issue.message));
    }
    lines.join("\n")
}

fn tool_error_block(error: &xdiff_pipeline::PipelineError, use_color: bool) -> String {
    let header = format!("--- FAILED: {error}");
    if use_color {
        Style::new().red().bold().apply_to(&header).to_string()
    } else {
        header
    }
}

pub fn render_json(report: &ProcessorReport) -> serde_json::Result<String> {
    let json = JsonReport {
        diffs: &report.diffs,
        schema_errors: report
            .schema_errors
            .iter()
            .map(|e| JsonSchemaError {
                gvk: e.gvk.to_string(),
                namespace: &e.namespace,
                name: &e.name,
                issues: &e.issues,
            })
            .collect(),
        tool_errors: report.tool_errors.iter().map(ToString::to_string).collect(),
    };
    serde_json::to_string_pretty(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdiff_core::{ChangeType, Gvk, ResourceDiff};

    #[test]
    fn text_report_includes_schema_error_block() {
        let report = ProcessorReport {
            diffs: vec![],
            schema_errors: vec![SchemaValidationError {
                gvk: Gvk::new("example.org", "v1alpha1", "XDatabase"),
                namespace: None,
                name: "bad-xr".to_string(),
                issues: vec![ValidationIssue {
                    path: "spec.size".to_string(),
                    message: "is a required property".to_string(),
                }],
            }],
            tool_errors: vec![],
        };
        let output = render_text(&report, false);
        assert!(output.contains("FAILED: SchemaValidationError"));
        assert!(output.contains("bad-xr"));
        assert!(output.contains("spec.size"));
    }

    #[test]
    fn json_report_round_trips_diff_fields() {
        let report = ProcessorReport {
            diffs: vec![ResourceDiff {
                kind: "ConfigMap".to_string(),
                namespace: Some("default".to_string()),
                name: "a".to_string(),
                change_type: ChangeType::Added,
                unified_diff_text: "+field: value".to_string(),
            }],
            schema_errors: vec![],
            tool_errors: vec![],
        };
        let json = render_json(&report).unwrap();
        assert!(json.contains("\"kind\": \"ConfigMap\""));
        assert!(json.contains("\"change_type\": \"Added\""));
    }
}
