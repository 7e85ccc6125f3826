//! Diagnostics produced by a lint cycle.

use serde::Serialize;

/// Severity assumed when a checkstyle `error` element carries none.
pub const DEFAULT_SEVERITY: &str = "error";

/// Where a diagnostic came from.
///
/// `Standard` diagnostics are reported by a linter tool. Every other mode is
/// synthesized by the engine when something went wrong around the tool and
/// belongs on the "System Errors" tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// A diagnostic reported by a linter in its checkstyle output.
    Standard,
    /// The linter configuration file could not be parsed.
    BadLinterXml,
    /// A linter's stdout was not well-formed checkstyle XML.
    BadOutput,
    /// A linter wrote nothing to stdout but something to stderr.
    StderrFound,
    /// Orchestration itself failed (spawn failure, variable resolution, ...).
    Exception,
    /// Anything else.
    Other,
}

impl ErrorMode {
    /// Whether diagnostics of this mode belong on the "System Errors" tab.
    #[must_use]
    pub fn is_system(self) -> bool {
        self != Self::Standard
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Standard => "lint",
            Self::BadLinterXml => "bad config",
            Self::BadOutput => "bad output",
            Self::StderrFound => "stderr",
            Self::Exception => "exception",
            Self::Other => "other",
        }
    }
}

/// A single diagnostic, either reported by a tool or synthesized on failure.
///
/// Positions are 1-based, as checkstyle reports them. Fields are private;
/// construction goes through [`Diagnostic::standard`] or
/// [`Diagnostic::failure`] so a standard diagnostic never carries raw process
/// output and a failure never pretends to come from a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    mode: ErrorMode,
    line: u32,
    column: u32,
    message: String,
    severity: String,
    tool: String,
    command: String,
    stdout: String,
    stderr: String,
}

impl Diagnostic {
    /// A diagnostic reported by a linter tool.
    #[must_use]
    pub fn standard(
        line: u32,
        column: u32,
        severity: impl Into<String>,
        message: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self {
            mode: ErrorMode::Standard,
            line,
            column,
            message: message.into(),
            severity: severity.into(),
            tool: tool.into(),
            command: String::new(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// A synthetic diagnostic describing a failure around a tool.
    ///
    /// Position defaults to 1:1 and severity to [`DEFAULT_SEVERITY`]; use the
    /// `with_*` builders to attach the command and its raw output.
    #[must_use]
    pub fn failure(mode: ErrorMode, message: impl Into<String>) -> Self {
        Self {
            mode,
            line: 1,
            column: 1,
            message: message.into(),
            severity: DEFAULT_SEVERITY.to_string(),
            tool: String::new(),
            command: String::new(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Attach the command line that produced this failure.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Attach the raw output captured from the failing process.
    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }

    /// Override the position, e.g. with the XML parser's error location.
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    #[must_use]
    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// 1-based line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column, counted in characters.
    #[must_use]
    pub fn column(&self) -> u32 {
        self.column
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Severity as the tool spelled it ("error", "warning", "info", ...).
    #[must_use]
    pub fn severity(&self) -> &str {
        &self.severity
    }

    /// Short tool name, e.g. "eslint".
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.mode.is_system()
    }

    /// Whether this diagnostic should fail a build-style check.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_system() || self.severity.eq_ignore_ascii_case(DEFAULT_SEVERITY)
    }

    /// Format as `line:column: severity: [tool] message`.
    #[must_use]
    pub fn display_line(&self) -> String {
        if self.is_system() {
            return format!(
                "{}:{}: {}: {}",
                self.line,
                self.column,
                self.mode.label(),
                self.message
            );
        }
        format!(
            "{}:{}: {}: [{}] {}",
            self.line, self.column, self.severity, self.tool, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_is_not_system() {
        let diag = Diagnostic::standard(1, 5, "warning", "no-var", "eslint");
        assert_eq!(diag.mode(), ErrorMode::Standard);
        assert!(!diag.is_system());
        assert!(!diag.is_error());
        assert!(diag.command().is_empty());
    }

    #[test]
    fn test_failure_defaults() {
        let diag = Diagnostic::failure(ErrorMode::StderrFound, "linter failed")
            .with_command("eslint --stdin")
            .with_output("", "boom\n");
        assert!(diag.is_system());
        assert!(diag.is_error());
        assert_eq!(diag.line(), 1);
        assert_eq!(diag.column(), 1);
        assert_eq!(diag.severity(), DEFAULT_SEVERITY);
        assert_eq!(diag.command(), "eslint --stdin");
        assert_eq!(diag.stderr(), "boom\n");
    }

    #[test]
    fn test_failure_position_override() {
        let diag = Diagnostic::failure(ErrorMode::BadOutput, "unexpected end").at(3, 17);
        assert_eq!((diag.line(), diag.column()), (3, 17));
    }

    #[test]
    fn test_severity_error_is_case_insensitive() {
        let diag = Diagnostic::standard(1, 1, "Error", "x", "t");
        assert!(diag.is_error());
    }

    #[test]
    fn test_display_line() {
        let diag = Diagnostic::standard(1, 5, "warning", "no-var", "eslint");
        assert_eq!(diag.display_line(), "1:5: warning: [eslint] no-var");

        let failure = Diagnostic::failure(ErrorMode::BadLinterXml, "bad config");
        assert_eq!(failure.display_line(), "1:1: bad config: bad config");
    }

    #[test]
    fn test_serializes_mode_in_snake_case() {
        let diag = Diagnostic::failure(ErrorMode::BadLinterXml, "x");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["mode"], "bad_linter_xml");
        assert_eq!(json["line"], 1);
    }
}
