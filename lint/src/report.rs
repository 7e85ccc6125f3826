//! The published result of one lint cycle, split the way the results panel
//! shows it: tool diagnostics on "Lint Errors", everything the engine
//! synthesized on "System Errors".

use std::path::{Path, PathBuf};

use linter_types::Diagnostic;
use serde::Serialize;

/// Immutable view of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsSnapshot {
    target: Option<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsSnapshot {
    #[must_use]
    pub fn new(target: Option<PathBuf>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            target,
            diagnostics,
        }
    }

    /// File the cycle linted; `None` before the first cycle.
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// All diagnostics in rule order, then document order within a rule.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn lint_errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_system())
    }

    pub fn system_errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_system())
    }

    #[must_use]
    pub fn lint_count(&self) -> usize {
        self.lint_errors().count()
    }

    #[must_use]
    pub fn system_count(&self) -> usize {
        self.system_errors().count()
    }

    #[must_use]
    pub fn lint_tab_title(&self) -> String {
        format!("Lint Errors ({})", self.lint_count())
    }

    #[must_use]
    pub fn system_tab_title(&self) -> String {
        format!("System Errors ({})", self.system_count())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Any error-severity tool diagnostic or any system diagnostic.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Format a compact status string like "E:3 W:5".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let warnings = self
            .lint_errors()
            .filter(|d| d.severity().eq_ignore_ascii_case("warning"))
            .count();
        let errors = self.diagnostics.iter().filter(|d| d.is_error()).count();
        format!("E:{errors} W:{warnings}")
    }
}

#[cfg(test)]
mod tests {
    use linter_types::ErrorMode;

    use super::*;

    fn sample() -> DiagnosticsSnapshot {
        DiagnosticsSnapshot::new(
            Some(PathBuf::from("src/app.js")),
            vec![
                Diagnostic::standard(1, 5, "warning", "no-var", "eslint"),
                Diagnostic::failure(ErrorMode::StderrFound, "jshint failed"),
                Diagnostic::standard(3, 1, "error", "semi", "eslint"),
            ],
        )
    }

    #[test]
    fn test_tabs_split_by_mode() {
        let snap = sample();
        assert_eq!(snap.lint_tab_title(), "Lint Errors (2)");
        assert_eq!(snap.system_tab_title(), "System Errors (1)");
        assert_eq!(
            snap.system_errors().next().unwrap().message(),
            "jshint failed"
        );
    }

    #[test]
    fn test_status_string() {
        assert_eq!(sample().status_string(), "E:2 W:1");
        assert_eq!(DiagnosticsSnapshot::default().status_string(), "");
    }

    #[test]
    fn test_has_errors() {
        assert!(sample().has_errors());
        let warnings_only = DiagnosticsSnapshot::new(
            None,
            vec![Diagnostic::standard(1, 1, "warning", "w", "eslint")],
        );
        assert!(!warnings_only.has_errors());
    }

    #[test]
    fn test_serializes_mode_and_target() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["target"], "src/app.js");
        assert_eq!(json["diagnostics"][1]["mode"], "stderr_found");
        assert_eq!(json["diagnostics"][0]["tool"], "eslint");
    }
}
