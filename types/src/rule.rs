//! Linter rules and user-defined variables, as loaded from the settings file.

/// Strip a leading dot and lowercase an extension so `.JS` and `js` compare equal.
#[must_use]
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// How to invoke one linter for files with a given extension.
///
/// Several rules may share an extension; all of them run, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinterRule {
    extension: String,
    command: String,
    use_stdin: bool,
}

impl LinterRule {
    #[must_use]
    pub fn new(extension: &str, command: impl Into<String>, use_stdin: bool) -> Self {
        Self {
            extension: normalize_extension(extension),
            command: command.into(),
            use_stdin,
        }
    }

    /// Extension without a leading dot, lowercased.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Command line template; may contain `%VAR%` placeholders.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Feed the buffer on stdin instead of passing a file path.
    #[must_use]
    pub fn use_stdin(&self) -> bool {
        self.use_stdin
    }

    /// Whether this rule applies to files with `extension` (dot optional).
    #[must_use]
    pub fn matches(&self, extension: &str) -> bool {
        self.extension == normalize_extension(extension)
    }
}

/// An environment variable whose value is the trimmed stdout of `command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    name: String,
    command: String,
}

impl VariableDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_normalized() {
        let rule = LinterRule::new(".JS", "eslint", true);
        assert_eq!(rule.extension(), "js");
        assert!(rule.matches("js"));
        assert!(rule.matches(".js"));
        assert!(rule.matches("Js"));
        assert!(!rule.matches("jsx"));
    }

    #[test]
    fn test_empty_extension_matches_nothing_else() {
        let rule = LinterRule::new("py", "flake8", false);
        assert!(!rule.matches(""));
    }
}
