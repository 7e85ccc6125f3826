//! Report rendering for the headless host.

use clap::ValueEnum;
use linter_lint::DiagnosticsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Both tabs as plain text.
    Text,
    /// The snapshot as JSON.
    Json,
}

pub fn render(snapshot: &DiagnosticsSnapshot, format: Format) -> String {
    match format {
        Format::Text => render_text(snapshot),
        Format::Json => render_json(snapshot),
    }
}

pub fn render_text(snapshot: &DiagnosticsSnapshot) -> String {
    let target = snapshot
        .target()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut out = String::new();
    out.push_str(&snapshot.lint_tab_title());
    out.push('\n');
    for diagnostic in snapshot.lint_errors() {
        out.push_str(&format!("  {target}:{}\n", diagnostic.display_line()));
    }

    out.push_str(&snapshot.system_tab_title());
    out.push('\n');
    for diagnostic in snapshot.system_errors() {
        out.push_str(&format!("  {target}:{}\n", diagnostic.display_line()));
        if !diagnostic.command().is_empty() {
            out.push_str(&format!("    command: {}\n", diagnostic.command()));
        }
        for line in diagnostic.stderr().lines() {
            out.push_str(&format!("    | {line}\n"));
        }
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn render_json(snapshot: &DiagnosticsSnapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize report: {e}");
        String::from("{}")
    })
}
