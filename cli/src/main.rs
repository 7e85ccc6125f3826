//! Linter CLI - a headless host for the lint engine.
//!
//! Stands in for the editor: the file on disk is the buffer, stdout is the
//! results panel.
//!
//! ```text
//! linter check <file>   one cycle, print the report, exit 1 on errors
//! linter watch <file>   re-lint whenever the file's modification time changes
//! ```

mod console;
mod render;

use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use linter_config::{Settings, default_config_path};
use linter_lint::{Notification, Orchestrator, OrchestratorConfig};

use crate::console::{ConsolePanel, FileEditor};
use crate::render::Format;

/// How often `watch` polls the file and the worker.
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "linter")]
#[command(about = "Run configured linters on a file and report their checkstyle diagnostics")]
struct Cli {
    /// Linter settings file (defaults to <config dir>/linter/linter.xml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-linter timeout in seconds; 0 waits forever
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,
    /// Quiet period in milliseconds before a change is linted
    #[arg(long, global = true, default_value_t = 300)]
    debounce: u64,
    /// Report format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint once and exit (1 if any error-level or system diagnostic)
    Check {
        /// File to lint
        file: PathBuf,
    },
    /// Lint on every change until interrupted
    Watch {
        /// File to watch
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries the report.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn orchestrator_config(cli: &Cli, config_path: &Path) -> OrchestratorConfig {
    OrchestratorConfig {
        debounce: Duration::from_millis(cli.debounce),
        timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
        plugin_dir: std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf)),
        config_dir: config_path.parent().map(Path::to_path_buf),
    }
}

fn resolve_config_path(cli: &Cli) -> Result<PathBuf> {
    cli.config
        .clone()
        .or_else(default_config_path)
        .context("no --config given and no platform config directory found")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = resolve_config_path(&cli)?;
    tracing::debug!(path = %config_path.display(), "Using linter settings");
    let settings = Settings::new(&config_path);
    let config = orchestrator_config(&cli, &config_path);

    match &cli.command {
        Commands::Check { file } => check(file, settings, config, cli.format),
        Commands::Watch { file } => watch(file, settings, config, cli.format).await,
    }
}

fn check(
    file: &Path,
    settings: Settings,
    config: OrchestratorConfig,
    format: Format,
) -> Result<ExitCode> {
    let mut editor =
        FileEditor::open(file).with_context(|| format!("cannot read {}", file.display()))?;
    let mut panel = ConsolePanel::new(stdout().lock(), format);
    let mut orchestrator = Orchestrator::new(
        settings,
        OrchestratorConfig {
            debounce: Duration::ZERO,
            ..config
        },
    );

    orchestrator.notify(Notification::Ready, &mut editor, &mut panel);
    orchestrator.drain(&mut editor, &mut panel);
    tracing::debug!(
        squiggles = editor.squiggles().len(),
        indicator = ?editor.indicator(),
        status = %orchestrator.snapshot().status_string(),
        file = %editor.path().display(),
        "Check finished"
    );

    if orchestrator.snapshot().has_errors() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn watch(
    file: &Path,
    settings: Settings,
    config: OrchestratorConfig,
    format: Format,
) -> Result<ExitCode> {
    let mut editor =
        FileEditor::open(file).with_context(|| format!("cannot read {}", file.display()))?;
    let mut panel = ConsolePanel::new(stdout(), format);
    let mut orchestrator = Orchestrator::new(settings, config);
    let mut last_modified = modified_time(file).await;

    orchestrator.notify(Notification::Ready, &mut editor, &mut panel);

    let mut polls = tokio::time::interval(WATCH_POLL_INTERVAL);
    polls.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::warn!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
            _ = polls.tick() => {
                let modified = modified_time(file).await;
                if modified.is_some() && modified != last_modified {
                    last_modified = modified;
                    match editor.reload() {
                        Ok(()) => {
                            orchestrator.notify(Notification::FileSaved, &mut editor, &mut panel);
                        }
                        Err(e) => tracing::warn!(file = %file.display(), "Cannot reload: {e}"),
                    }
                }
                orchestrator.tick(&mut editor, &mut panel);
            }
        }
    }

    orchestrator.notify(Notification::Shutdown, &mut editor, &mut panel);
    tracing::debug!(reports = panel.shown(), "Watch stopped");
    Ok(ExitCode::SUCCESS)
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["linter", "check", "a.js"]).unwrap();
        assert_eq!(cli.timeout, 60);
        assert_eq!(cli.debounce, 300);
        assert_eq!(cli.format, Format::Text);
        assert!(matches!(cli.command, Commands::Check { ref file } if file == Path::new("a.js")));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "linter", "watch", "a.js", "--config", "/tmp/l.xml", "--timeout", "0", "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/l.xml")));
        assert_eq!(cli.format, Format::Json);

        let config = orchestrator_config(&cli, Path::new("/tmp/l.xml"));
        assert_eq!(config.timeout, None);
        assert_eq!(config.config_dir.as_deref(), Some(Path::new("/tmp")));
    }

    #[cfg(unix)]
    #[test]
    fn test_check_exit_code_follows_severity() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.js");
        std::fs::write(&target, "var x = 1\n").unwrap();
        let config_path = dir.path().join("linter.xml");
        let report = r#"<checkstyle><file name="a"><error line="1" column="5" severity="SEVERITY" message="m" source="eslint.x"/></file></checkstyle>"#;

        for (severity, expected) in [("warning", ExitCode::SUCCESS), ("error", ExitCode::FAILURE)] {
            let script = dir.path().join("lint.sh");
            std::fs::write(
                &script,
                format!("cat >/dev/null\nprintf '%s' '{}'\n", report.replace("SEVERITY", severity)),
            )
            .unwrap();
            std::fs::write(
                &config_path,
                format!(
                    r#"<config><linter extension="js" command="sh {}" stdin="true"/></config>"#,
                    script.display()
                ),
            )
            .unwrap();

            let settings = Settings::new(&config_path);
            let config = OrchestratorConfig {
                config_dir: Some(dir.path().to_path_buf()),
                ..OrchestratorConfig::default()
            };
            let code = check(&target, settings, config, Format::Text).unwrap();
            assert_eq!(code, expected, "severity {severity}");
        }
    }
}
