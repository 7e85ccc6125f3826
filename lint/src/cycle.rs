//! One lint cycle: refresh settings, run every matching rule, collect
//! diagnostics. Runs on the worker thread and never touches the editor.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use linter_config::{Settings, SettingsError};
use linter_types::{Diagnostic, ErrorMode, LinterRule, SquiggleStyle, normalize_extension};
use linter_utils::ScratchCopy;
use thiserror::Error;

use crate::checkstyle::parse_checkstyle;
use crate::environment::{Environment, VariableError};
use crate::process::{CancelToken, Launcher, RunRequest};

/// Failures that end a cycle before or between rules.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("cannot write scratch copy of {}: {source}", target.display())]
    Scratch {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Variable(#[from] VariableError),
}

impl CycleError {
    /// The single diagnostic that reports this failure.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Settings(err) => {
                let (line, column) = err.position().unwrap_or((1, 1));
                Diagnostic::failure(ErrorMode::BadLinterXml, err.to_string())
                    .with_command(err.path().display().to_string())
                    .at(line, column)
            }
            Self::Scratch { .. } | Self::Variable(_) => {
                Diagnostic::failure(ErrorMode::Exception, self.to_string())
            }
        }
    }
}

/// Everything the worker needs, captured on the UI thread.
#[derive(Clone)]
pub struct LintJob {
    pub target: PathBuf,
    pub text: String,
    pub plugin_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
    pub launcher: Arc<dyn Launcher>,
}

impl std::fmt::Debug for LintJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LintJob")
            .field("target", &self.target)
            .field("text_bytes", &self.text.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Result of one cycle, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub target: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    pub style: SquiggleStyle,
    /// Rules that matched the target's extension.
    pub rules_run: usize,
}

/// Run one cycle. Failures become diagnostics; nothing here returns an error.
pub fn run_cycle(job: &LintJob, settings: &mut Settings) -> CycleReport {
    let mut diagnostics = Vec::new();
    let rules_run = match lint_target(job, settings, &mut diagnostics) {
        Ok(n) => n,
        Err(err) => {
            tracing::warn!(file = %job.target.display(), "Lint cycle failed: {err}");
            diagnostics.push(err.to_diagnostic());
            0
        }
    };
    tracing::info!(
        file = %job.target.display(),
        rules = rules_run,
        count = diagnostics.len(),
        "Lint cycle finished"
    );
    CycleReport {
        target: job.target.clone(),
        diagnostics,
        style: settings.style(),
        rules_run,
    }
}

fn lint_target(
    job: &LintJob,
    settings: &mut Settings,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize, CycleError> {
    settings.refresh()?;

    let extension = job
        .target
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default();
    let rules: Vec<LinterRule> = settings.rules_for(&extension).cloned().collect();
    if rules.is_empty() {
        tracing::debug!(file = %job.target.display(), "No linter configured for this file");
        return Ok(0);
    }

    // One copy per cycle, shared by every file-based rule.
    let scratch = if rules.iter().any(|r| !r.use_stdin()) {
        Some(
            ScratchCopy::create(&job.target, job.text.as_bytes()).map_err(|source| {
                CycleError::Scratch {
                    target: job.target.clone(),
                    source,
                }
            })?,
        )
    } else {
        None
    };
    let scratch_path = scratch.as_ref().map(ScratchCopy::path);

    let mut env = Environment::for_target(
        &job.target,
        scratch_path,
        job.plugin_dir.as_deref(),
        job.config_dir.as_deref(),
    );
    env.resolve_variables(
        settings.variables(),
        job.launcher.as_ref(),
        job.timeout,
        &job.cancel,
    )?;

    for rule in &rules {
        if job.cancel.is_cancelled() {
            tracing::debug!("Lint cycle cancelled");
            break;
        }
        diagnostics.extend(run_rule(job, &env, rule, scratch_path));
    }
    Ok(rules.len())
}

/// Run one rule. A failing rule yields exactly one system diagnostic.
fn run_rule(
    job: &LintJob,
    env: &Environment,
    rule: &LinterRule,
    scratch: Option<&Path>,
) -> Vec<Diagnostic> {
    let (stdin, file) = if rule.use_stdin() {
        (Some(job.text.as_bytes()), None)
    } else {
        (None, scratch)
    };
    let request = RunRequest {
        command_line: env.expand(rule.command()),
        file,
        stdin,
        env: env.vars(),
        timeout: job.timeout,
        cancel: &job.cancel,
    };
    let command_line = request.display_line();

    let output = match job.launcher.run(&request) {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(command = %command_line, "Linter failed to run: {err}");
            return vec![
                Diagnostic::failure(ErrorMode::Exception, err.to_string())
                    .with_command(command_line),
            ];
        }
    };

    let stdout = output.stdout_text();
    let stderr = output.stderr_text();
    if stdout.trim().is_empty() {
        if stderr.trim().is_empty() {
            return Vec::new();
        }
        tracing::warn!(command = %command_line, "Linter wrote only to stderr");
        return vec![
            Diagnostic::failure(ErrorMode::StderrFound, stderr.trim_end())
                .with_command(command_line)
                .with_output(stdout, stderr),
        ];
    }

    match parse_checkstyle(&stdout) {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(command = %command_line, "Linter output is not checkstyle: {err}");
            let (line, column) = err.position();
            vec![
                Diagnostic::failure(ErrorMode::BadOutput, err.to_string())
                    .with_command(command_line)
                    .with_output(stdout, stderr)
                    .at(line, column),
            ]
        }
    }
}
