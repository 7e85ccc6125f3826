//! The narrow surface the orchestrator needs from the editor and the results
//! panel. Everything here is called on the host's UI thread only.

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

use linter_types::SquiggleStyle;

use crate::reconcile::LineSource;
use crate::report::DiagnosticsSnapshot;

/// Host events the orchestrator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The host finished loading; lint whatever is open.
    Ready,
    BufferActivated,
    BufferModified,
    FileSaved,
    /// Caret moved or the view repainted.
    UpdateUi,
    Shutdown,
}

impl Notification {
    /// Whether this event means the text to lint may have changed.
    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::BufferActivated | Self::BufferModified | Self::FileSaved
        )
    }
}

/// The active document and its view.
pub trait Editor: LineSource {
    /// Full path of the active document. Unsaved buffers return their tab name.
    fn file_path(&self) -> PathBuf;

    /// Current buffer text.
    fn text(&self) -> String;

    /// Caret position as a byte offset.
    fn caret(&self) -> usize;

    fn clear_squiggles(&mut self);

    fn add_squiggle(&mut self, range: Range<usize>, style: SquiggleStyle);

    /// Show `text` in the status bar; empty clears it.
    fn set_status(&mut self, text: &str);

    /// Ask the host to call [`crate::Orchestrator::tick`] after `delay`.
    fn request_tick(&mut self, _delay: Duration) {}
}

/// The results panel ("Lint Errors" / "System Errors" tabs).
pub trait Panel {
    fn show(&mut self, snapshot: &DiagnosticsSnapshot);
}
