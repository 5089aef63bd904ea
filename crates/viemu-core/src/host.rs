//! Host seams: what the engine needs from the editor that embeds it.
//!
//! The engine consumes a [`TextBuffer`] (line/column addressable text with
//! atomic edit groups and a regex search primitive), a [`Bookmarks`] facility
//! for showing marks, and a [`Clipboard`] for the `+`/`*` registers. It needs
//! nothing else: no view, no window, no terminal.
//!
//! [`crate::buffer::Buffer`] is the in-crate rope implementation of
//! `TextBuffer`; hosts with their own storage implement the trait directly.

use std::collections::BTreeSet;

use regex::Regex;

use crate::position::{Position, Range};

// ---------------------------------------------------------------------------
// Text buffer
// ---------------------------------------------------------------------------

/// A regex match reported by [`TextBuffer::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// The whole match.
    pub range: Range,
    /// Capture groups 1..; `None` for groups that did not participate.
    pub groups: Vec<Option<Range>>,
}

impl SearchHit {
    /// Range of capture `n`, where group 0 is the whole match.
    #[must_use]
    pub fn group(&self, n: usize) -> Option<Range> {
        if n == 0 {
            Some(self.range)
        } else {
            self.groups.get(n - 1).copied().flatten()
        }
    }
}

/// Line/column addressable text as seen by the engine.
///
/// Lines never include their terminator. Text crossing lines always uses
/// `\n`, whatever the storage does on disk. A buffer always has at least one
/// (possibly empty) line.
///
/// Besides the line view there is a flat char-index view over the whole text
/// (line breaks count as one char each), which word motions and text objects
/// walk.
pub trait TextBuffer {
    /// Number of lines, at least 1.
    fn line_count(&self) -> usize;

    /// Chars on `line`, excluding the terminator. 0 for lines past the end.
    fn line_len(&self, line: usize) -> usize;

    /// Content of `line` without its terminator. Empty past the end.
    fn line_text(&self, line: usize) -> String;

    /// Total chars, line breaks included.
    fn len_chars(&self) -> usize;

    /// Char at a flat index; `'\n'` for line breaks.
    fn char_at_index(&self, idx: usize) -> Option<char>;

    /// Flat index of `pos`. `None` if the line does not exist or the column
    /// is beyond the line break.
    fn pos_to_index(&self, pos: Position) -> Option<usize>;

    /// Position of a flat index. `idx == len_chars()` maps to the end of the
    /// last line.
    fn index_to_pos(&self, idx: usize) -> Option<Position>;

    /// Text in a half-open range.
    fn text(&self, range: Range) -> String;

    /// Insert `text` at `pos`. Out-of-range positions are clamped.
    fn insert(&mut self, pos: Position, text: &str);

    /// Remove the text in `range`.
    fn remove(&mut self, range: Range);

    /// Open an atomic edit group. Groups nest; only the outermost
    /// `begin_edit`/`end_edit` pair produces an undo step.
    fn begin_edit(&mut self, cursor: Position);

    /// Close the innermost edit group.
    fn end_edit(&mut self, cursor: Position);

    /// Undo one step. Returns where the cursor should go.
    fn undo(&mut self) -> Option<Position>;

    /// Redo one step. Returns where the cursor should go.
    fn redo(&mut self) -> Option<Position>;

    /// First match of `re` starting at or after `from` and before `limit`
    /// (a match may start exactly at `limit` only when `limit` is the end of
    /// the text). Matching sees the whole text, so anchors and look-around
    /// behave as they would on the full document.
    fn find(&self, re: &Regex, from: Position, limit: Position) -> Option<SearchHit>;

    // -- Provided -----------------------------------------------------------

    /// Char at a position; `None` at or past the end of the line.
    fn char_at(&self, pos: Position) -> Option<char> {
        if pos.col >= self.line_len(pos.line) {
            return None;
        }
        self.pos_to_index(pos).and_then(|idx| self.char_at_index(idx))
    }

    /// Index of the last line.
    fn last_line(&self) -> usize {
        self.line_count().saturating_sub(1)
    }

    /// Position just past the last char.
    fn end_position(&self) -> Position {
        let last = self.last_line();
        Position::new(last, self.line_len(last))
    }

    /// True when the buffer holds no text at all.
    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Whole text joined with `\n`.
    fn contents(&self) -> String {
        self.text(Range::new(Position::ZERO, self.end_position()))
    }

    /// Clamp a position to the text, allowing the column just past the
    /// last char of a line.
    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.last_line());
        Position::new(line, pos.col.min(self.line_len(line)))
    }
}

// ---------------------------------------------------------------------------
// Bookmarks
// ---------------------------------------------------------------------------

/// Per-line visual markers owned by the host (gutter signs, bookmarks).
pub trait Bookmarks {
    fn add(&mut self, line: usize);
    fn remove(&mut self, line: usize);
    fn contains(&self, line: usize) -> bool;
    /// Every bookmarked line, ascending.
    fn lines(&self) -> Vec<usize>;
}

/// Plain in-memory bookmark set, the default when the host has none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBookmarks {
    lines: BTreeSet<usize>,
}

impl LineBookmarks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Bookmarks for LineBookmarks {
    fn add(&mut self, line: usize) {
        self.lines.insert(line);
    }

    fn remove(&mut self, line: usize) {
        self.lines.remove(&line);
    }

    fn contains(&self, line: usize) -> bool {
        self.lines.contains(&line)
    }

    fn lines(&self) -> Vec<usize> {
        self.lines.iter().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

/// Which system buffer a clipboard register talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipboardKind {
    /// `+`: the clipboard proper.
    Clipboard,
    /// `*`: the primary selection.
    Selection,
}

/// System clipboard access for the `+` and `*` registers.
///
/// Reads happen every time a register is read; nothing is cached locally.
pub trait Clipboard {
    fn get(&mut self, kind: ClipboardKind) -> Option<String>;
    fn set(&mut self, kind: ClipboardKind, text: &str);
}

/// Process-local clipboard. Used headless and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    clipboard: Option<String>,
    selection: Option<String>,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn get(&mut self, kind: ClipboardKind) -> Option<String> {
        match kind {
            ClipboardKind::Clipboard => self.clipboard.clone(),
            ClipboardKind::Selection => self.selection.clone(),
        }
    }

    fn set(&mut self, kind: ClipboardKind, text: &str) {
        let slot = match kind {
            ClipboardKind::Clipboard => &mut self.clipboard,
            ClipboardKind::Selection => &mut self.selection,
        };
        *slot = Some(text.to_string());
    }
}

/// The desktop clipboard through `arboard`.
///
/// Best effort: when the platform clipboard is unavailable (headless, no
/// display server) reads return `None` and writes are dropped.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(cb) => Some(cb),
            Err(err) => {
                tracing::warn!(%err, "system clipboard unavailable");
                None
            }
        };
        Self { inner }
    }
}

#[cfg(feature = "clipboard")]
impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    // arboard has no portable primary-selection API, so `*` shares `+`.
    fn get(&mut self, _kind: ClipboardKind) -> Option<String> {
        self.inner.as_mut()?.get_text().ok()
    }

    fn set(&mut self, _kind: ClipboardKind, text: &str) {
        if let Some(cb) = self.inner.as_mut()
            && let Err(err) = cb.set_text(text.to_string())
        {
            tracing::warn!(%err, "clipboard write failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_bookmarks_track_lines() {
        let mut b = LineBookmarks::new();
        b.add(4);
        b.add(1);
        b.add(4);
        assert!(b.contains(4));
        assert_eq!(b.lines(), vec![1, 4]);
        b.remove(4);
        assert!(!b.contains(4));
        assert_eq!(b.lines(), vec![1]);
    }

    #[test]
    fn memory_clipboard_keeps_kinds_apart() {
        let mut cb = MemoryClipboard::new();
        assert_eq!(cb.get(ClipboardKind::Clipboard), None);
        cb.set(ClipboardKind::Clipboard, "plus");
        cb.set(ClipboardKind::Selection, "star");
        assert_eq!(cb.get(ClipboardKind::Clipboard).as_deref(), Some("plus"));
        assert_eq!(cb.get(ClipboardKind::Selection).as_deref(), Some("star"));
    }

    #[test]
    fn search_hit_group_zero_is_whole_match() {
        let whole = Range::new(Position::ZERO, Position::new(0, 3));
        let g1 = Range::new(Position::new(0, 1), Position::new(0, 2));
        let hit = SearchHit {
            range: whole,
            groups: vec![Some(g1), None],
        };
        assert_eq!(hit.group(0), Some(whole));
        assert_eq!(hit.group(1), Some(g1));
        assert_eq!(hit.group(2), None);
        assert_eq!(hit.group(9), None);
    }
}
