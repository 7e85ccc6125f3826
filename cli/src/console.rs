//! Headless stand-ins for the editor and the results panel.

use std::borrow::Cow;
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use linter_lint::{DiagnosticsSnapshot, Editor, LineSource, Panel, TextBuffer};
use linter_types::{Rgb, SquiggleStyle};

use crate::render::{Format, render};

/// A file on disk playing the part of the editor buffer.
#[derive(Debug)]
pub struct FileEditor {
    path: PathBuf,
    buffer: TextBuffer,
    squiggles: Vec<Range<usize>>,
    /// Last indicator style as `(0x00BBGGRR color, alpha or -1)`.
    indicator: Option<(Option<u32>, i32)>,
}

impl FileEditor {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut editor = Self {
            path: path.to_path_buf(),
            buffer: TextBuffer::default(),
            squiggles: Vec::new(),
            indicator: None,
        };
        editor.reload()?;
        Ok(editor)
    }

    /// Re-read the file from disk.
    pub fn reload(&mut self) -> io::Result<()> {
        let bytes = std::fs::read(&self.path)?;
        self.buffer = TextBuffer::new(String::from_utf8_lossy(&bytes).into_owned());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn squiggles(&self) -> &[Range<usize>] {
        &self.squiggles
    }

    pub fn indicator(&self) -> Option<(Option<u32>, i32)> {
        self.indicator
    }
}

impl LineSource for FileEditor {
    fn line_start(&self, line: usize) -> Option<usize> {
        self.buffer.line_start(line)
    }

    fn line_text(&self, line: usize) -> Option<Cow<'_, str>> {
        self.buffer.line_text(line)
    }
}

impl Editor for FileEditor {
    fn file_path(&self) -> PathBuf {
        self.path.clone()
    }

    fn text(&self) -> String {
        self.buffer.text().to_string()
    }

    fn caret(&self) -> usize {
        0
    }

    fn clear_squiggles(&mut self) {
        self.squiggles.clear();
    }

    fn add_squiggle(&mut self, range: Range<usize>, style: SquiggleStyle) {
        self.indicator = Some((style.color.map(Rgb::to_bgr), style.alpha_or_unset()));
        self.squiggles.push(range);
    }

    fn set_status(&mut self, text: &str) {
        if !text.is_empty() {
            tracing::debug!(status = text, "Status bar");
        }
    }
}

/// Prints every published snapshot to a writer.
pub struct ConsolePanel<W: Write> {
    out: W,
    format: Format,
    shown: usize,
}

impl<W: Write> ConsolePanel<W> {
    pub fn new(out: W, format: Format) -> Self {
        Self {
            out,
            format,
            shown: 0,
        }
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Panel for ConsolePanel<W> {
    fn show(&mut self, snapshot: &DiagnosticsSnapshot) {
        self.shown += 1;
        let text = render(snapshot, self.format);
        if let Err(e) = writeln!(self.out, "{text}").and_then(|()| self.out.flush()) {
            tracing::warn!("Failed to write report: {e}");
        }
    }
}
