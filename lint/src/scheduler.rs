//! Debounce state machine.
//!
//! [`step`] is a pure transition function; the orchestrator feeds it events
//! and carries out the effects it returns. At most one cycle is ever running:
//! a change during a run only marks the run as pending.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintState {
    Idle,
    /// A change arrived; a cycle starts once `deadline` passes.
    Pending { deadline: Instant },
    Running,
    /// A change arrived during the run; re-arm when it finishes.
    PendingRunning,
}

impl LintState {
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::PendingRunning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Changed { now: Instant },
    Tick { now: Instant },
    CycleFinished { now: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StartCycle,
    /// Publish the finished cycle's diagnostics.
    Publish,
}

#[must_use]
pub fn step(state: LintState, event: Event, debounce: Duration) -> (LintState, Vec<Effect>) {
    use LintState::{Idle, Pending, PendingRunning, Running};

    match (state, event) {
        // Each change restarts the delay rather than adding to it.
        (Idle | Pending { .. }, Event::Changed { now }) => (
            Pending {
                deadline: now + debounce,
            },
            vec![],
        ),
        (Running | PendingRunning, Event::Changed { .. }) => (PendingRunning, vec![]),

        (Pending { deadline }, Event::Tick { now }) if now >= deadline => {
            (Running, vec![Effect::StartCycle])
        }

        (Running, Event::CycleFinished { .. }) => (Idle, vec![Effect::Publish]),
        (PendingRunning, Event::CycleFinished { now }) => (
            Pending {
                deadline: now + debounce,
            },
            vec![Effect::Publish],
        ),

        (state, _) => (state, vec![]),
    }
}

/// [`step`] with its state and delay attached.
#[derive(Debug, Clone)]
pub struct Scheduler {
    state: LintState,
    debounce: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: LintState::Idle,
            debounce,
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let (next, effects) = step(self.state, event, self.debounce);
        if next != self.state {
            tracing::trace!(from = ?self.state, to = ?next, "Lint state change");
        }
        self.state = next;
        effects
    }

    #[must_use]
    pub fn state(&self) -> LintState {
        self.state
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// When the pending cycle is due, if one is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            LintState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Drop any queued cycle. Used at shutdown.
    pub fn reset(&mut self) {
        self.state = LintState::Idle;
    }
}
