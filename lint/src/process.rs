//! Process runner: spawns one linter with piped stdio and collects its output.
//!
//! Each of stdin, stdout and stderr gets its own [`ChildPipe`]. The child's
//! ends are moved into the [`Command`], and the command is dropped right after
//! `spawn()` so the parent holds no copy of them; otherwise the readers below
//! would never see end-of-file. Stdin is written and closed on its own thread
//! while stdout and stderr drain concurrently, so a chatty child can never
//! deadlock against a full pipe.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use linter_utils::{HandleError, create_input_pipe, create_output_pipe};
use thiserror::Error;

use crate::command_line::{Invocation, quote_arg};

/// How often the runner checks for exit, timeout and cancellation.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("cannot create pipe for `{command}`: {source}")]
    Pipe {
        command: String,
        #[source]
        source: HandleError,
    },
    #[error("cannot start `{command}`: {source}")]
    Spawn {
        command: String,
        code: Option<i32>,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error talking to `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: HandleError,
    },
    #[error("`{command}` did not finish within {}s and was killed", .timeout.as_secs_f64())]
    TimedOut { command: String, timeout: Duration },
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
}

/// Shared flag that aborts in-flight processes when set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One process invocation.
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    /// Fully expanded command line.
    pub command_line: String,
    /// Passed as the final argument, outside the command line.
    pub file: Option<&'a Path>,
    /// Bytes to write to the child's stdin; `None` closes stdin immediately.
    pub stdin: Option<&'a [u8]>,
    /// Variables added to the inherited environment for this call only.
    pub env: &'a BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub cancel: &'a CancelToken,
}

impl RunRequest<'_> {
    /// The command line as a user would type it, for logs and reports.
    #[must_use]
    pub fn display_line(&self) -> String {
        match self.file {
            Some(file) => format!(
                "{} {}",
                self.command_line.trim(),
                quote_arg(&file.to_string_lossy())
            ),
            None => self.command_line.trim().to_string(),
        }
    }
}

/// What a finished process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Something that can run a command line to completion.
///
/// [`ProcessRunner`] is the real implementation; tests substitute recorders.
pub trait Launcher: Send + Sync {
    fn run(&self, request: &RunRequest<'_>) -> Result<ProcessOutput, RunError>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl Launcher for ProcessRunner {
    fn run(&self, request: &RunRequest<'_>) -> Result<ProcessOutput, RunError> {
        let invocation = Invocation::parse(&request.command_line).ok_or(RunError::EmptyCommand)?;
        let command_line = &request.display_line();
        let pipe_err = |source| RunError::Pipe {
            command: command_line.clone(),
            source,
        };

        let (child_stdin, mut stdin_writer) = create_input_pipe().map_err(pipe_err)?.into_parts();
        let (mut stdout_reader, child_stdout) =
            create_output_pipe().map_err(pipe_err)?.into_parts();
        let (mut stderr_reader, child_stderr) =
            create_output_pipe().map_err(pipe_err)?.into_parts();

        let mut command = invocation.to_command(request.file);
        command
            .envs(request.env)
            .stdin(child_stdin.into_stdio().map_err(pipe_err)?)
            .stdout(child_stdout.into_stdio().map_err(pipe_err)?)
            .stderr(child_stderr.into_stdio().map_err(pipe_err)?);
        configure_platform(&mut command);

        let spawned = command.spawn();
        // Closes the parent's copies of the child's pipe ends.
        drop(command);
        let child = spawned.map_err(|source| RunError::Spawn {
            command: command_line.clone(),
            code: source.raw_os_error(),
            source,
        })?;
        let mut guard = ChildGuard::new(child);
        tracing::debug!(command = %command_line, pid = guard.id(), "Spawned linter process");

        let stdin = request.stdin;
        let (status, stdout, stderr) = thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let result = match stdin {
                    Some(bytes) => stdin_writer.write_file(bytes),
                    None => Ok(()),
                };
                stdin_writer.close();
                result
            });
            let out = scope.spawn(move || stdout_reader.read_file());
            let err = scope.spawn(move || stderr_reader.read_file());

            // Anything left in the process group can hold the pipes open after
            // the child exits, so the deadline covers the readers too.
            let status = supervise(&mut guard, command_line, request, || {
                out.is_finished() && err.is_finished()
            });

            let write_result = writer.join().unwrap_or(Ok(()));
            if let Err(e) = write_result {
                // A linter that exits without reading stdin is not an error in itself.
                tracing::debug!(command = %command_line, "Writing linter stdin failed: {e}");
            }
            let stdout = out.join().unwrap_or(Err(HandleError::Closed));
            let stderr = err.join().unwrap_or(Err(HandleError::Closed));
            (status, stdout, stderr)
        });

        let status = status?;
        let io_err = |source| RunError::Io {
            command: command_line.clone(),
            source,
        };
        let output = ProcessOutput {
            exit_code: status.code(),
            stdout: stdout.map_err(io_err)?,
            stderr: stderr.map_err(io_err)?,
        };
        tracing::debug!(
            command = %command_line,
            exit_code = ?output.exit_code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Linter process finished"
        );
        Ok(output)
    }
}

/// Wait until the child has exited and `drained()` reports its output
/// closed, killing the process group on timeout or cancellation.
fn supervise(
    guard: &mut ChildGuard,
    command_line: &str,
    request: &RunRequest<'_>,
    drained: impl Fn() -> bool,
) -> Result<ExitStatus, RunError> {
    let deadline = request.timeout.map(|t| Instant::now() + t);
    let mut exited = None;
    loop {
        if exited.is_none() {
            match guard.try_wait() {
                Ok(status) => exited = status,
                Err(source) => {
                    guard.kill();
                    return Err(RunError::Io {
                        command: command_line.to_string(),
                        source: HandleError::Os {
                            op: "wait",
                            source,
                        },
                    });
                }
            }
        }
        if let Some(status) = exited
            && drained()
        {
            guard.disarm();
            return Ok(status);
        }
        if request.cancel.is_cancelled() {
            guard.kill();
            return Err(RunError::Cancelled {
                command: command_line.to_string(),
            });
        }
        if let (Some(deadline), Some(timeout)) = (deadline, request.timeout)
            && Instant::now() >= deadline
        {
            tracing::warn!(
                command = %command_line,
                exited = exited.is_some(),
                "Linter timed out; killing it"
            );
            guard.kill();
            return Err(RunError::TimedOut {
                command: command_line.to_string(),
                timeout,
            });
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn configure_platform(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    // Own process group so a kill also reaches anything the linter spawned
    // (which would otherwise keep our pipes open).
    command.process_group(0);
}

#[cfg(windows)]
fn configure_platform(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn configure_platform(_command: &mut Command) {}

/// Kills the child (and its process group on unix) on drop unless disarmed.
///
/// Stays armed after the child has been reaped: the group id outlives the
/// leader while any member is still running.
struct ChildGuard {
    child: Child,
    pid: u32,
    armed: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            armed: true,
        }
    }

    fn id(&self) -> u32 {
        self.pid
    }

    /// Keeps returning the exit status once the child has been reaped.
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn kill(&mut self) {
        if !std::mem::replace(&mut self.armed, false) {
            return;
        }
        #[cfg(unix)]
        {
            // SAFETY: plain syscall; the group id is the child's pid because
            // it was spawned with `process_group(0)`.
            let rc = libc::pid_t::try_from(self.pid)
                .map_or(-1, |pgid| unsafe { libc::killpg(pgid, libc::SIGKILL) });
            if rc == -1 {
                let _ = self.child.kill();
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}
