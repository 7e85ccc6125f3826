//! Linter settings: which linters to run for which extensions, and how to
//! paint their squiggles.
//!
//! The settings file is XML:
//!
//! ```xml
//! <LinterConfig>
//!   <style alpha="100" color="FF0000"/>
//!   <variable name="NODE_HOME" command="npm root -g"/>
//!   <linter extension="js" command="eslint --format checkstyle --stdin" stdin="true"/>
//!   <linter extension="js" command="jshint --reporter=checkstyle"/>
//! </LinterConfig>
//! ```
//!
//! [`Settings::new`] only records the path. [`Settings::refresh`] re-parses
//! when the file's modification time differs from the last one seen, and
//! swaps the whole rule set in one assignment; a failed parse leaves the
//! previous state untouched.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use linter_types::{LinterRule, Rgb, SquiggleStyle, VariableDefinition};
use roxmltree::{Document, Node};
use thiserror::Error;

/// Directory name under the platform config dir.
const CONFIG_DIR_NAME: &str = "linter";

/// Settings file name inside [`config_dir`].
const CONFIG_FILE_NAME: &str = "linter.xml";

/// Platform config directory for the linter (e.g. `~/.config/linter`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
}

/// Default settings file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read linter settings {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("bad linter settings {}:{line}:{column}: {message}", path.display())]
    BadConfig {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
}

impl SettingsError {
    /// The settings file the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::BadConfig { path, .. } => path,
        }
    }

    /// 1-based position inside the settings file, when known.
    #[must_use]
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            Self::BadConfig { line, column, .. } => Some((*line, *column)),
            Self::Io { .. } => None,
        }
    }
}

/// Everything one parse of the settings file yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSettings {
    pub rules: Vec<LinterRule>,
    pub variables: Vec<VariableDefinition>,
    pub style: SquiggleStyle,
}

/// Parse settings XML. `path` is only used for error reporting.
pub fn parse_settings(text: &str, path: &Path) -> Result<ParsedSettings, SettingsError> {
    let doc = Document::parse(text).map_err(|e| {
        let pos = e.pos();
        SettingsError::BadConfig {
            path: path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message: e.to_string(),
        }
    })?;

    let bad = |node: Node<'_, '_>, message: String| {
        let pos = doc.text_pos_at(node.range().start);
        SettingsError::BadConfig {
            path: path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message,
        }
    };

    let mut parsed = ParsedSettings::default();
    let mut seen_style = false;

    for node in doc.descendants().filter(Node::is_element) {
        match node.tag_name().name() {
            "style" => {
                if seen_style {
                    tracing::warn!(
                        path = %path.display(),
                        "Ignoring extra <style> element; only the first one is used"
                    );
                    continue;
                }
                seen_style = true;
                if let Some(alpha) = node.attribute("alpha") {
                    let alpha = alpha.trim().parse::<u8>().map_err(|_| {
                        bad(node, format!("alpha must be between 0 and 255, got '{alpha}'"))
                    })?;
                    parsed.style.alpha = Some(alpha);
                }
                if let Some(color) = node.attribute("color") {
                    let color = Rgb::from_hex(color).map_err(|e| bad(node, e.to_string()))?;
                    parsed.style.color = Some(color);
                }
            }
            "linter" => {
                let extension = required(node, "extension").map_err(|m| bad(node, m))?;
                let command = required(node, "command").map_err(|m| bad(node, m))?;
                let use_stdin = match node.attribute("stdin") {
                    None => false,
                    Some(value) => parse_bool(value).ok_or_else(|| {
                        bad(node, format!("stdin must be 'true' or 'false', got '{value}'"))
                    })?,
                };
                parsed
                    .rules
                    .push(LinterRule::new(extension, command, use_stdin));
            }
            "variable" => {
                let name = required(node, "name").map_err(|m| bad(node, m))?;
                let command = required(node, "command").map_err(|m| bad(node, m))?;
                parsed
                    .variables
                    .push(VariableDefinition::new(name, command));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn required<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, String> {
    match node.attribute(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(format!(
            "<{}> is missing required attribute '{name}'",
            node.tag_name().name()
        )),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Linter settings backed by a file, reloaded when it changes.
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    parsed: ParsedSettings,
    last_modified: Option<SystemTime>,
    generation: u64,
}

impl Settings {
    /// Record the settings path. Nothing is read until [`Self::refresh`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            parsed: ParsedSettings::default(),
            last_modified: None,
            generation: 0,
        }
    }

    /// Re-parse if the file's modification time changed since the last
    /// successful parse. Returns whether a parse happened.
    pub fn refresh(&mut self) -> Result<bool, SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(io_err)?;

        if self.last_modified == Some(modified) {
            return Ok(false);
        }

        let text = std::fs::read_to_string(&self.path).map_err(io_err)?;
        let parsed = parse_settings(&text, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            rules = parsed.rules.len(),
            variables = parsed.variables.len(),
            "Linter settings loaded"
        );
        self.parsed = parsed;
        self.last_modified = Some(modified);
        self.generation += 1;
        Ok(true)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rules, in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[LinterRule] {
        &self.parsed.rules
    }

    /// Rules that apply to `extension`, in declaration order.
    pub fn rules_for<'a>(&'a self, extension: &'a str) -> impl Iterator<Item = &'a LinterRule> {
        self.parsed.rules.iter().filter(move |r| r.matches(extension))
    }

    #[must_use]
    pub fn variables(&self) -> &[VariableDefinition] {
        &self.parsed.variables
    }

    #[must_use]
    pub fn style(&self) -> SquiggleStyle {
        self.parsed.style
    }

    /// Number of successful parses so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<LinterConfig>
  <style alpha="100" color="FF8000"/>
  <variable name="NODE_PATH" command="npm root -g"/>
  <linter extension="js" command="eslint --format checkstyle --stdin" stdin="true"/>
  <linter extension=".JS" command="jshint --reporter=checkstyle"/>
  <linter extension="py" command="flake8 --format=checkstyle" stdin="false"/>
</LinterConfig>
"#;

    fn write_config(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("linter.xml");
        fs::write(&path, text).unwrap();
        path
    }

    fn bump_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_parse_sample() {
        let parsed = parse_settings(SAMPLE, Path::new("linter.xml")).unwrap();
        assert_eq!(parsed.rules.len(), 3);
        assert_eq!(parsed.rules[0].extension(), "js");
        assert!(parsed.rules[0].use_stdin());
        assert_eq!(parsed.rules[1].extension(), "js");
        assert!(!parsed.rules[1].use_stdin());
        assert!(!parsed.rules[2].use_stdin());
        assert_eq!(parsed.variables.len(), 1);
        assert_eq!(parsed.variables[0].name(), "NODE_PATH");
        assert_eq!(parsed.style.alpha, Some(100));
        assert_eq!(parsed.style.color.unwrap().to_bgr(), 0x0000_80FF);
    }

    #[test]
    fn test_parse_empty_root() {
        let parsed = parse_settings("<LinterConfig/>", Path::new("x.xml")).unwrap();
        assert!(parsed.rules.is_empty());
        assert_eq!(parsed.style, SquiggleStyle::default());
    }

    #[test]
    fn test_malformed_xml_is_bad_config_with_position() {
        let err = parse_settings(
            "<LinterConfig>\n  <linter></style>\n</LinterConfig>",
            Path::new("x.xml"),
        )
        .unwrap_err();
        match err {
            SettingsError::BadConfig { line, .. } => assert_eq!(line, 2),
            SettingsError::Io { .. } => panic!("expected BadConfig"),
        }
    }

    #[test]
    fn test_missing_command_is_bad_config() {
        let text = "<c>\n<linter extension=\"js\"/>\n</c>";
        let err = parse_settings(text, Path::new("x.xml")).unwrap_err();
        assert_eq!(err.position(), Some((2, 1)));
        assert!(err.to_string().contains("command"));
    }

    #[test]
    fn test_invalid_stdin_and_alpha_rejected() {
        let text = r#"<c><linter extension="js" command="x" stdin="maybe"/></c>"#;
        assert!(parse_settings(text, Path::new("x.xml")).is_err());
        let text = r#"<c><style alpha="300"/></c>"#;
        assert!(parse_settings(text, Path::new("x.xml")).is_err());
        let text = r#"<c><style color="red"/></c>"#;
        assert!(parse_settings(text, Path::new("x.xml")).is_err());
    }

    #[test]
    fn test_new_does_not_read() {
        let settings = Settings::new("/nonexistent/linter.xml");
        assert_eq!(settings.generation(), 0);
        assert!(settings.rules().is_empty());
    }

    #[test]
    fn test_refresh_twice_parses_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), SAMPLE);
        let mut settings = Settings::new(&path);

        assert!(settings.refresh().unwrap());
        assert!(!settings.refresh().unwrap());
        assert_eq!(settings.generation(), 1);
        assert_eq!(settings.rules_for("js").count(), 2);
        assert_eq!(settings.rules_for("py").count(), 1);
        assert_eq!(settings.rules_for("rs").count(), 0);
    }

    #[test]
    fn test_refresh_reparses_on_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), SAMPLE);
        bump_mtime(&path, 1_000);
        let mut settings = Settings::new(&path);
        settings.refresh().unwrap();

        fs::write(&path, "<c><linter extension=\"rs\" command=\"x\"/></c>").unwrap();
        bump_mtime(&path, 2_000);
        assert!(settings.refresh().unwrap());
        assert_eq!(settings.generation(), 2);
        assert_eq!(settings.rules().len(), 1);
        assert_eq!(settings.rules()[0].extension(), "rs");
    }

    #[test]
    fn test_failed_refresh_keeps_previous_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), SAMPLE);
        bump_mtime(&path, 1_000);
        let mut settings = Settings::new(&path);
        settings.refresh().unwrap();

        fs::write(&path, "<c><linter extension=\"rs\"").unwrap();
        bump_mtime(&path, 2_000);
        assert!(matches!(
            settings.refresh(),
            Err(SettingsError::BadConfig { .. })
        ));
        assert_eq!(settings.rules().len(), 3);
        assert_eq!(settings.generation(), 1);

        // Still broken: keeps failing rather than silently caching the bad file.
        assert!(settings.refresh().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::new(dir.path().join("absent.xml"));
        let err = settings.refresh().unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
        assert_eq!(err.position(), None);
    }
}
