//! Per-cycle environment overlay and `%NAME%` expansion.
//!
//! Nothing here touches the real process environment. The overlay is handed
//! to each spawned linter through [`RunRequest::env`], so it only exists for
//! the duration of one call and there is nothing to restore afterwards.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use linter_types::VariableDefinition;
use thiserror::Error;

use crate::process::{CancelToken, Launcher, RunError, RunRequest};

pub const LINTER_TARGET: &str = "LINTER_TARGET";
pub const LINTER_PLUGIN_DIR: &str = "LINTER_PLUGIN_DIR";
pub const LINTER_CONFIG_DIR: &str = "LINTER_CONFIG_DIR";
pub const TARGET: &str = "TARGET";
pub const TARGET_DIR: &str = "TARGET_DIR";
pub const TARGET_EXT: &str = "TARGET_EXT";
pub const TARGET_FILENAME: &str = "TARGET_FILENAME";

#[derive(Debug, Error)]
pub enum VariableError {
    #[error("cannot resolve variable {name}: {source}")]
    Run {
        name: String,
        #[source]
        source: RunError,
    },
}

/// Variables layered over the inherited process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay describing the file being linted.
    ///
    /// `scratch` is the on-disk copy handed to file-based linters, if one
    /// was written this cycle.
    #[must_use]
    pub fn for_target(
        target: &Path,
        scratch: Option<&Path>,
        plugin_dir: Option<&Path>,
        config_dir: Option<&Path>,
    ) -> Self {
        let mut env = Self::new();
        env.set(TARGET, target.to_string_lossy());
        env.set(
            TARGET_DIR,
            target
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        env.set(
            TARGET_EXT,
            target
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        );
        env.set(
            TARGET_FILENAME,
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        if let Some(scratch) = scratch {
            env.set(LINTER_TARGET, scratch.to_string_lossy());
        }
        if let Some(dir) = plugin_dir {
            env.set(LINTER_PLUGIN_DIR, dir.to_string_lossy());
        }
        if let Some(dir) = config_dir {
            env.set(LINTER_CONFIG_DIR, dir.to_string_lossy());
        }
        env
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// The overlay only, as passed to child processes.
    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Look a name up in the overlay, then in the inherited environment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.clone());
        }
        // Windows variable names are case-insensitive.
        if cfg!(windows)
            && let Some((_, value)) = self
                .vars
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            return Some(value.clone());
        }
        std::env::var(name).ok()
    }

    /// Replace every `%NAME%` whose name resolves.
    ///
    /// Unknown names are left verbatim and scanning resumes at their closing
    /// `%`, so `%NOPE%TARGET%` still expands the second placeholder.
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('%') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('%') else {
                out.push('%');
                rest = after;
                break;
            };
            let name = &after[..close];
            match (!name.is_empty()).then(|| self.get(name)).flatten() {
                Some(value) => {
                    out.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('%');
                    out.push_str(name);
                    rest = &after[close..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Run each definition's command in order and bind its output.
    ///
    /// Commands are expanded first and see every variable bound so far. One
    /// trailing newline is trimmed from the output. A non-zero exit status or
    /// stderr output is only logged; failing to run the command at all is an
    /// error.
    pub fn resolve_variables(
        &mut self,
        definitions: &[VariableDefinition],
        launcher: &dyn Launcher,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<(), VariableError> {
        for def in definitions {
            let command_line = self.expand(def.command());
            let output = launcher
                .run(&RunRequest {
                    command_line,
                    file: None,
                    stdin: None,
                    env: &self.vars,
                    timeout,
                    cancel,
                })
                .map_err(|source| VariableError::Run {
                    name: def.name().to_string(),
                    source,
                })?;

            if !output.success() {
                tracing::warn!(
                    variable = def.name(),
                    exit_code = ?output.exit_code,
                    "Variable command exited unsuccessfully"
                );
            }
            if !output.stderr.is_empty() {
                tracing::warn!(
                    variable = def.name(),
                    stderr = %output.stderr_text().trim_end(),
                    "Variable command wrote to stderr"
                );
            }

            let value = trim_one_newline(&output.stdout_text()).to_string();
            tracing::debug!(variable = def.name(), %value, "Resolved variable");
            self.set(def.name(), value);
        }
        Ok(())
    }
}

fn trim_one_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::process::ProcessOutput;

    /// Answers each command line with canned stdout and records the overlay it saw.
    struct EchoLauncher {
        seen: Mutex<Vec<(String, BTreeMap<String, String>)>>,
        exit_code: i32,
    }

    impl EchoLauncher {
        fn new(exit_code: i32) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                exit_code,
            }
        }
    }

    impl Launcher for EchoLauncher {
        fn run(&self, request: &RunRequest<'_>) -> Result<ProcessOutput, RunError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.command_line.clone(), request.env.clone()));
            let reply = request
                .command_line
                .strip_prefix("echo ")
                .unwrap_or_default();
            Ok(ProcessOutput {
                exit_code: Some(self.exit_code),
                stdout: format!("{reply}\n").into_bytes(),
                stderr: Vec::new(),
            })
        }
    }

    struct FailingLauncher;

    impl Launcher for FailingLauncher {
        fn run(&self, _request: &RunRequest<'_>) -> Result<ProcessOutput, RunError> {
            Err(RunError::EmptyCommand)
        }
    }

    #[test]
    fn test_target_variables() {
        let env = Environment::for_target(
            Path::new("/work/src/app.js"),
            Some(Path::new("/work/src/.app.linter-x.js")),
            Some(Path::new("/plugins/linter")),
            None,
        );
        assert_eq!(env.vars()[TARGET], "/work/src/app.js");
        assert_eq!(env.vars()[TARGET_DIR], "/work/src");
        assert_eq!(env.vars()[TARGET_EXT], ".js");
        assert_eq!(env.vars()[TARGET_FILENAME], "app.js");
        assert_eq!(env.vars()[LINTER_TARGET], "/work/src/.app.linter-x.js");
        assert_eq!(env.vars()[LINTER_PLUGIN_DIR], "/plugins/linter");
        assert!(!env.vars().contains_key(LINTER_CONFIG_DIR));
    }

    #[test]
    fn test_target_without_extension() {
        let env = Environment::for_target(Path::new("/work/Makefile"), None, None, None);
        assert_eq!(env.vars()[TARGET_EXT], "");
        assert!(!env.vars().contains_key(LINTER_TARGET));
    }

    #[test]
    fn test_expand_known_and_unknown() {
        let mut env = Environment::new();
        env.set("LINTER_TEST_A", "alpha");
        assert_eq!(
            env.expand("run %LINTER_TEST_A% --x"),
            "run alpha --x".to_string()
        );
        assert_eq!(
            env.expand("%LINTER_TEST_MISSING% stays"),
            "%LINTER_TEST_MISSING% stays"
        );
    }

    #[test]
    fn test_expand_rescans_after_unknown_name() {
        let mut env = Environment::new();
        env.set("LINTER_TEST_B", "beta");
        assert_eq!(
            env.expand("%LINTER_TEST_NOPE%LINTER_TEST_B%"),
            "%LINTER_TEST_NOPEbeta"
        );
    }

    #[test]
    fn test_expand_stray_percents() {
        let env = Environment::new();
        assert_eq!(env.expand("100%% done"), "100%% done");
        assert_eq!(env.expand("50% off"), "50% off");
        assert_eq!(env.expand("%"), "%");
        assert_eq!(env.expand(""), "");
    }

    #[test]
    fn test_expand_falls_back_to_process_environment() {
        let path = std::env::var("PATH").unwrap();
        assert_eq!(Environment::new().expand("%PATH%"), path);
    }

    #[test]
    fn test_resolve_variables_in_order_with_trimmed_output() {
        let mut env = Environment::for_target(Path::new("/w/a.js"), None, None, None);
        let defs = vec![
            VariableDefinition::new("LINTER_TEST_NODE", "echo /opt/node"),
            VariableDefinition::new("LINTER_TEST_ESLINT", "echo %LINTER_TEST_NODE%/eslint"),
        ];
        let launcher = EchoLauncher::new(0);
        env.resolve_variables(&defs, &launcher, None, &CancelToken::new())
            .unwrap();

        assert_eq!(env.vars()["LINTER_TEST_NODE"], "/opt/node");
        assert_eq!(env.vars()["LINTER_TEST_ESLINT"], "/opt/node/eslint");

        let seen = launcher.seen.lock().unwrap();
        assert_eq!(seen[1].0, "echo /opt/node/eslint");
        assert_eq!(seen[1].1["LINTER_TEST_NODE"], "/opt/node");
        assert_eq!(seen[0].1[TARGET], "/w/a.js");
    }

    #[test]
    fn test_non_zero_exit_still_binds() {
        let mut env = Environment::new();
        let defs = vec![VariableDefinition::new("LINTER_TEST_V", "echo value")];
        env.resolve_variables(&defs, &EchoLauncher::new(2), None, &CancelToken::new())
            .unwrap();
        assert_eq!(env.vars()["LINTER_TEST_V"], "value");
    }

    #[test]
    fn test_launch_failure_names_variable() {
        let mut env = Environment::new();
        let defs = vec![VariableDefinition::new("LINTER_TEST_BROKEN", "nothing")];
        let err = env
            .resolve_variables(&defs, &FailingLauncher, None, &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("LINTER_TEST_BROKEN"));
    }

    #[test]
    fn test_trim_one_newline() {
        assert_eq!(trim_one_newline("a\n\n"), "a\n");
        assert_eq!(trim_one_newline("a\r\n"), "a");
        assert_eq!(trim_one_newline("a"), "a");
    }
}
