//! Mapping diagnostic positions onto buffer byte offsets.
//!
//! Linters report 1-based line and column numbers where a column counts
//! characters (code points). The editor addresses text by byte offset into
//! its UTF-8 buffer. [`utf8_offset`] converts within one line;
//! [`DiagnosticIndex`] does it for a whole cycle's diagnostics and keeps the
//! offset → message map used for squiggles and the caret tooltip.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;

use linter_types::Diagnostic;

/// Byte offset within `line` of 1-based character `column`.
///
/// Walks `column - 1` code points from the start of the line, never
/// splitting a multi-byte sequence and never crossing a `\r` or `\n`.
/// Column 0 is treated as column 1.
#[must_use]
pub fn utf8_offset(line: &str, column: u32) -> usize {
    let skip = column.saturating_sub(1) as usize;
    let mut offset = 0;
    for (taken, (idx, ch)) in line.char_indices().enumerate() {
        if taken == skip || ch == '\r' || ch == '\n' {
            return idx;
        }
        offset = idx + ch.len_utf8();
    }
    offset
}

/// Read access to the buffer, line by line.
pub trait LineSource {
    /// Byte offset where 0-based `line` starts, `None` past the last line.
    fn line_start(&self, line: usize) -> Option<usize>;

    /// Text of 0-based `line`. A trailing line ending may or may not be included.
    fn line_text(&self, line: usize) -> Option<Cow<'_, str>>;
}

/// An owned buffer snapshot with precomputed line starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    line_starts: Vec<usize>,
}

impl TextBuffer {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 0-based line containing byte `offset`.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }
}

impl LineSource for TextBuffer {
    fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    fn line_text(&self, line: usize) -> Option<Cow<'_, str>> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        let text = &self.text[start..end];
        Some(Cow::Borrowed(text.strip_suffix('\r').unwrap_or(text)))
    }
}

/// Byte offset of a diagnostic's 1-based position, `None` past the last line.
pub fn position_to_offset<S: LineSource + ?Sized>(
    source: &S,
    line: u32,
    column: u32,
) -> Option<usize> {
    let line = line.saturating_sub(1) as usize;
    let start = source.line_start(line)?;
    let text = source.line_text(line)?;
    Some(start + utf8_offset(&text, column))
}

/// Range covering the identifier at byte `at` of `line`.
///
/// At least one character wide, never past the end of the line. A position
/// at the end of a non-empty line marks its last character.
fn squiggle_range(line: &str, at: usize) -> Range<usize> {
    let line_end = line.find(['\r', '\n']).unwrap_or(line.len());
    let at = at.min(line_end);
    let rest = &line[at..line_end];
    let ident_len: usize = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    if ident_len > 0 {
        return at..at + ident_len;
    }
    if let Some(ch) = rest.chars().next() {
        return at..at + ch.len_utf8();
    }
    match line[..line_end].chars().next_back() {
        Some(ch) => line_end - ch.len_utf8()..line_end,
        None => at..at,
    }
}

/// One highlighted range in buffer byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Squiggle {
    /// Where the diagnostic's line and column translate to.
    pub offset: usize,
    /// Painted range; can start before `offset` at the end of a line.
    pub range: Range<usize>,
    pub message: String,
}

/// Offsets of one cycle's tool diagnostics, rebuilt from scratch every cycle.
///
/// Only [`linter_types::ErrorMode::Standard`] diagnostics are placed; system
/// diagnostics have no meaningful position in the buffer. When two
/// diagnostics start at the same offset the later one owns the tooltip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticIndex {
    squiggles: Vec<Squiggle>,
    by_offset: BTreeMap<usize, usize>,
}

impl DiagnosticIndex {
    #[must_use]
    pub fn build<S: LineSource + ?Sized>(diagnostics: &[Diagnostic], source: &S) -> Self {
        let mut index = Self::default();
        for diagnostic in diagnostics.iter().filter(|d| !d.is_system()) {
            let line_no = diagnostic.line().saturating_sub(1) as usize;
            let (Some(offset), Some(start), Some(text)) = (
                position_to_offset(source, diagnostic.line(), diagnostic.column()),
                source.line_start(line_no),
                source.line_text(line_no),
            ) else {
                tracing::debug!(
                    line = diagnostic.line(),
                    "Diagnostic is past the end of the buffer; not placed"
                );
                continue;
            };
            let within = squiggle_range(&text, offset - start);
            index.by_offset.insert(offset, index.squiggles.len());
            index.squiggles.push(Squiggle {
                offset,
                range: start + within.start..start + within.end,
                message: diagnostic.message().to_string(),
            });
        }
        index
    }

    /// Squiggles in diagnostic order.
    #[must_use]
    pub fn squiggles(&self) -> &[Squiggle] {
        &self.squiggles
    }

    /// Message of the diagnostic starting exactly at `offset`.
    #[must_use]
    pub fn message_at(&self, offset: usize) -> Option<&str> {
        let &i = self.by_offset.get(&offset)?;
        Some(&self.squiggles[i].message)
    }

    /// Message of the nearest squiggle covering `offset`, for tooltips.
    ///
    /// The squiggle starting closest before `offset` wins, then the later one.
    #[must_use]
    pub fn hover(&self, offset: usize) -> Option<&str> {
        self.squiggles
            .iter()
            .enumerate()
            .filter(|(_, s)| s.range.contains(&offset) || s.offset == offset)
            .max_by_key(|&(i, s)| (s.range.start, i))
            .map(|(_, s)| s.message.as_str())
    }

    /// Sorted distinct translated offsets.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_offset.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.squiggles.is_empty()
    }
}
