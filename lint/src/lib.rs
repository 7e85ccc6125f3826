//! Lint engine: runs the configured linters for the active file and turns
//! their checkstyle output into diagnostics positioned in the editor buffer.
//!
//! The host drives an [`Orchestrator`] from its UI thread through
//! [`Orchestrator::notify`] and [`Orchestrator::tick`], and implements
//! [`Editor`] and [`Panel`] so results can be painted.

mod checkstyle;
mod command_line;
mod cycle;
mod environment;
mod host;
mod orchestrator;
mod process;
mod reconcile;
mod report;
mod scheduler;

pub use checkstyle::{CheckstyleError, parse_checkstyle};
pub use command_line::{FILE_ARG_VAR, Invocation, quote_arg, split_command_line};
pub use cycle::{CycleError, CycleReport, LintJob, run_cycle};
pub use environment::{Environment, VariableError};
pub use host::{Editor, Notification, Panel};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use process::{CancelToken, Launcher, ProcessOutput, ProcessRunner, RunError, RunRequest};
pub use reconcile::{
    DiagnosticIndex, LineSource, Squiggle, TextBuffer, position_to_offset, utf8_offset,
};
pub use report::DiagnosticsSnapshot;
pub use scheduler::{Effect, Event, LintState, Scheduler, step};
