//! Orchestrator: owns the debounce state, the settings, the in-flight worker
//! and the last published diagnostics.
//!
//! All methods run on the host's UI thread. A cycle runs on a fresh worker
//! thread that owns the [`Settings`] while it runs and hands them back when
//! joined; completion is detected by polling at the top of every entry
//! point, and publishing (squiggles, panel, status) happens only here.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use linter_config::Settings;
use linter_types::{Diagnostic, ErrorMode, SquiggleStyle};

use crate::cycle::{CycleReport, LintJob, run_cycle};
use crate::host::{Editor, Notification, Panel};
use crate::process::{CancelToken, Launcher, ProcessRunner};
use crate::reconcile::DiagnosticIndex;
use crate::report::DiagnosticsSnapshot;
use crate::scheduler::{Effect, Event, LintState, Scheduler};

/// Delay between polls in [`Orchestrator::drain`].
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Quiet period after the last change before a cycle starts.
    pub debounce: Duration,
    /// Per-process limit; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Exported to linters as `LINTER_PLUGIN_DIR`.
    pub plugin_dir: Option<PathBuf>,
    /// Exported to linters as `LINTER_CONFIG_DIR`.
    pub config_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            timeout: Some(Duration::from_secs(60)),
            plugin_dir: None,
            config_dir: None,
        }
    }
}

/// Where the settings currently live.
enum Work {
    Idle(Box<Settings>),
    Running(Worker),
}

struct Worker {
    handle: JoinHandle<(Box<Settings>, CycleReport)>,
    cancel: CancelToken,
    target: PathBuf,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    launcher: Arc<dyn Launcher>,
    scheduler: Scheduler,
    /// Kept so settings can be rebuilt if a worker is lost.
    settings_path: PathBuf,
    work: Option<Work>,
    snapshot: DiagnosticsSnapshot,
    index: DiagnosticIndex,
    style: SquiggleStyle,
    /// Whether the status bar currently shows a diagnostic tooltip.
    showing_tooltip: bool,
    cycles_started: u64,
    cycles_published: u64,
}

impl Orchestrator {
    /// An orchestrator that runs real processes.
    #[must_use]
    pub fn new(settings: Settings, config: OrchestratorConfig) -> Self {
        Self::with_launcher(settings, config, Arc::new(ProcessRunner))
    }

    #[must_use]
    pub fn with_launcher(
        settings: Settings,
        config: OrchestratorConfig,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(config.debounce),
            settings_path: settings.path().to_path_buf(),
            work: Some(Work::Idle(Box::new(settings))),
            config,
            launcher,
            snapshot: DiagnosticsSnapshot::default(),
            index: DiagnosticIndex::default(),
            style: SquiggleStyle::default(),
            showing_tooltip: false,
            cycles_started: 0,
            cycles_published: 0,
        }
    }

    /// Host notification entry point.
    pub fn notify(
        &mut self,
        notification: Notification,
        editor: &mut dyn Editor,
        panel: &mut dyn Panel,
    ) {
        self.notify_at(notification, Instant::now(), editor, panel);
    }

    /// [`Self::notify`] with an explicit clock.
    pub fn notify_at(
        &mut self,
        notification: Notification,
        now: Instant,
        editor: &mut dyn Editor,
        panel: &mut dyn Panel,
    ) {
        self.poll_worker(now, editor, panel);
        match notification {
            Notification::Shutdown => self.shutdown(),
            Notification::UpdateUi => {
                self.update_tooltip(editor);
                self.advance(now, editor);
            }
            n if n.is_change() => {
                self.scheduler.handle(Event::Changed { now });
                editor.request_tick(self.scheduler.debounce());
            }
            _ => {}
        }
    }

    /// Timer entry point: publish a finished cycle, start a due one.
    pub fn tick(&mut self, editor: &mut dyn Editor, panel: &mut dyn Panel) {
        self.tick_at(Instant::now(), editor, panel);
    }

    pub fn tick_at(&mut self, now: Instant, editor: &mut dyn Editor, panel: &mut dyn Panel) {
        self.poll_worker(now, editor, panel);
        self.advance(now, editor);
    }

    /// Block until nothing is pending or running, publishing as cycles end.
    ///
    /// For headless hosts without a message loop.
    pub fn drain(&mut self, editor: &mut dyn Editor, panel: &mut dyn Panel) {
        loop {
            self.tick(editor, panel);
            let wait = match self.scheduler.state() {
                LintState::Idle => return,
                LintState::Pending { deadline } => deadline
                    .saturating_duration_since(Instant::now())
                    .min(DRAIN_POLL_INTERVAL),
                LintState::Running | LintState::PendingRunning => DRAIN_POLL_INTERVAL,
            };
            thread::sleep(wait);
        }
    }

    /// Cancel any running cycle, kill its processes and wait for the worker.
    /// Nothing is published.
    pub fn shutdown(&mut self) {
        self.scheduler.reset();
        match self.work.take() {
            Some(Work::Running(worker)) => {
                tracing::debug!(file = %worker.target.display(), "Cancelling lint cycle");
                worker.cancel.cancel();
                let settings = match worker.handle.join() {
                    Ok((settings, _)) => settings,
                    Err(_) => Box::new(Settings::new(self.settings_path.clone())),
                };
                self.work = Some(Work::Idle(settings));
            }
            other => self.work = other,
        }
    }

    #[must_use]
    pub fn state(&self) -> LintState {
        self.scheduler.state()
    }

    /// The last published diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> &DiagnosticsSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn index(&self) -> &DiagnosticIndex {
        &self.index
    }

    #[must_use]
    pub fn style(&self) -> SquiggleStyle {
        self.style
    }

    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.cycles_started
    }

    #[must_use]
    pub fn cycles_published(&self) -> u64 {
        self.cycles_published
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    fn advance(&mut self, now: Instant, editor: &mut dyn Editor) {
        if self
            .scheduler
            .handle(Event::Tick { now })
            .contains(&Effect::StartCycle)
        {
            self.start_cycle(editor);
        }
    }

    fn start_cycle(&mut self, editor: &mut dyn Editor) {
        let settings = match self.work.take() {
            Some(Work::Idle(settings)) => settings,
            Some(running @ Work::Running(_)) => {
                tracing::error!("Lint cycle requested while one is running");
                self.work = Some(running);
                return;
            }
            None => Box::new(Settings::new(self.settings_path.clone())),
        };

        let cancel = CancelToken::new();
        let job = LintJob {
            target: editor.file_path(),
            text: editor.text(),
            plugin_dir: self.config.plugin_dir.clone(),
            config_dir: self.config.config_dir.clone(),
            timeout: self.config.timeout,
            cancel: cancel.clone(),
            launcher: Arc::clone(&self.launcher),
        };
        let target = job.target.clone();
        tracing::debug!(?job, "Starting lint cycle");

        let spawned = thread::Builder::new()
            .name("linter-cycle".to_string())
            .spawn(move || {
                let mut settings = settings;
                let report = run_cycle(&job, &mut settings);
                (settings, report)
            });
        self.cycles_started += 1;
        match spawned {
            Ok(handle) => {
                self.work = Some(Work::Running(Worker {
                    handle,
                    cancel,
                    target,
                }));
            }
            Err(e) => {
                tracing::error!("Cannot start lint worker: {e}");
                self.work = Some(Work::Idle(Box::new(Settings::new(
                    self.settings_path.clone(),
                ))));
                // Finish the cycle immediately with the failure on the board.
                self.scheduler.handle(Event::CycleFinished {
                    now: Instant::now(),
                });
                self.stash(CycleReport {
                    target,
                    diagnostics: vec![Diagnostic::failure(
                        ErrorMode::Exception,
                        format!("cannot start lint worker: {e}"),
                    )],
                    style: self.style,
                    rules_run: 0,
                });
            }
        }
    }

    /// Non-blocking join of the worker.
    fn poll_worker(&mut self, now: Instant, editor: &mut dyn Editor, panel: &mut dyn Panel) {
        let finished = matches!(&self.work, Some(Work::Running(w)) if w.handle.is_finished());
        if !finished {
            return;
        }
        let Some(Work::Running(worker)) = self.work.take() else {
            return;
        };

        let report = match worker.handle.join() {
            Ok((settings, report)) => {
                self.work = Some(Work::Idle(settings));
                report
            }
            Err(_) => {
                tracing::error!(file = %worker.target.display(), "Lint worker panicked");
                self.work = Some(Work::Idle(Box::new(Settings::new(
                    self.settings_path.clone(),
                ))));
                CycleReport {
                    target: worker.target,
                    diagnostics: vec![Diagnostic::failure(
                        ErrorMode::Exception,
                        "lint worker panicked",
                    )],
                    style: self.style,
                    rules_run: 0,
                }
            }
        };

        if self
            .scheduler
            .handle(Event::CycleFinished { now })
            .contains(&Effect::Publish)
        {
            self.publish(report, editor, panel);
        }
        if let Some(deadline) = self.scheduler.next_deadline() {
            editor.request_tick(deadline.saturating_duration_since(now));
        }
    }

    /// Record a report without touching the editor.
    fn stash(&mut self, report: CycleReport) {
        self.style = report.style;
        self.snapshot = DiagnosticsSnapshot::new(Some(report.target), report.diagnostics);
        self.index = DiagnosticIndex::default();
        self.cycles_published += 1;
    }

    /// Replace everything shown with `report`. Runs on the UI thread only.
    fn publish(&mut self, report: CycleReport, editor: &mut dyn Editor, panel: &mut dyn Panel) {
        let same_file = editor.file_path() == report.target;
        self.stash(report);

        editor.clear_squiggles();
        if same_file {
            self.index = DiagnosticIndex::build(self.snapshot.diagnostics(), &*editor);
            for squiggle in self.index.squiggles() {
                editor.add_squiggle(squiggle.range.clone(), self.style);
            }
        } else {
            // The user switched buffers mid-run; the queued re-run covers the new one.
            tracing::debug!("Active buffer changed during the cycle; squiggles skipped");
        }
        panel.show(&self.snapshot);
        self.showing_tooltip = false;
        self.update_tooltip(editor);

        tracing::debug!(
            lint = self.snapshot.lint_count(),
            system = self.snapshot.system_count(),
            status = %self.snapshot.status_string(),
            "Published diagnostics"
        );
    }

    fn update_tooltip(&mut self, editor: &mut dyn Editor) {
        match self.index.hover(editor.caret()) {
            Some(message) => {
                editor.set_status(message);
                self.showing_tooltip = true;
            }
            None if self.showing_tooltip => {
                editor.set_status("");
                self.showing_tooltip = false;
            }
            None => {}
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
