//! Report export for the audit engine.
//!
//! The engine keeps no persisted state on disk between runs beyond exported
//! report files. [`export_json`], [`export_csv`], and [`export_text`] each
//! write one independent representation of a [`Report`]; JSON is the ground
//! truth, the others are projections of it.

#![forbid(unsafe_code)]

use audit_proto::Report;
use std::path::Path;
use tracing::debug;

/// Render the report as canonical, pretty-printed JSON.
pub fn render_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Render findings only, as CSV: severity, kind, resource_id, finding, recommendation, estimated_savings.
pub fn render_csv(report: &Report) -> String {
    let mut out = String::from("severity,kind,resource_id,finding,recommendation,estimated_savings\n");
    for f in &report.findings {
        out.push_str(&format!(
            "{},{},{},{},{},{:.2}\n",
            csv_escape(&format!("{:?}", f.severity)),
            csv_escape(&f.kind.to_string()),
            csv_escape(&f.resource_id),
            csv_escape(&f.finding_code),
            csv_escape(&f.recommendation),
            f.estimated_monthly_savings,
        ));
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a short plain-text summary of the report.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Audit report for account {} ({})\n",
        report.metadata.account_id, report.metadata.region
    ));
    out.push_str(&format!("mode: {:?}\n", report.metadata.mode));
    out.push_str(&format!(
        "resources audited: {}\n",
        report.summary.total_resources
    ));
    out.push_str(&format!("findings: {}\n", report.summary.total_findings));
    out.push_str(&format!(
        "critical/high findings: {}\n",
        report.summary.critical_findings
    ));
    out.push_str(&format!(
        "estimated monthly savings: ${:.2}\n",
        report.summary.estimated_monthly_savings
    ));
    if !report.warnings.is_empty() {
        out.push_str(&format!("warnings: {}\n", report.warnings.join("; ")));
    }
    out
}

/// Write the report as canonical JSON to `path`.
pub fn export_json(report: &Report, path: &Path) -> std::io::Result<()> {
    let content = render_json(report).map_err(std::io::Error::other)?;
    write_with_parents(path, &content)
}

/// Write the findings-only CSV projection to `path`.
pub fn export_csv(report: &Report, path: &Path) -> std::io::Result<()> {
    write_with_parents(path, &render_csv(report))
}

/// Write the plain-text summary to `path`.
pub fn export_text(report: &Report, path: &Path) -> std::io::Result<()> {
    write_with_parents(path, &render_text(report))
}

pub fn write_with_parents(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), bytes = content.len(), "writing report export");
    std::fs::write(path, content)
}
