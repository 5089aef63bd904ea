//! Text buffer: the in-crate [`TextBuffer`] implementation.
//!
//! A `Buffer` wraps a [`ropey::Rope`] with coordinate conversion between
//! [`Position`] and rope char indices, file I/O, undo history, and metadata
//! (path, modified flag, line endings).
//!
//! # Design choices
//!
//! - **Columns are char offsets**, not byte offsets. Byte offsets never leak
//!   into the public API; the regex search converts at the boundary.
//!
//! - **Line endings are normalized to `\n` on load** and restored on save.
//!   The detected style is kept in [`LineEnding`]. A single trailing line
//!   break is remembered separately, so `"a\nb\n"` is a two-line buffer like
//!   every Vi shows it, and saving writes the break back.
//!
//! - **History lives here.** Every insert and remove is recorded in the
//!   buffer's [`History`]; `begin_edit`/`end_edit` group them.

use std::cell::OnceCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use ropey::Rope;

use crate::history::{Edit, History};
use crate::host::{SearchHit, TextBuffer};
use crate::position::{Position, Range};

// ---------------------------------------------------------------------------
// Line ending detection
// ---------------------------------------------------------------------------

/// Line ending style of a file.
///
/// Detected on load from the first occurrence. Defaults to `Lf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Detect the line ending of `text` from its first line break.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        for (i, &byte) in bytes.iter().enumerate() {
            match byte {
                b'\n' => return Self::Lf,
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => return Self::CrLf,
                b'\r' => return Self::Cr,
                _ => {}
            }
        }
        Self::Lf
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lf => f.write_str("LF"),
            Self::CrLf => f.write_str("CRLF"),
            Self::Cr => f.write_str("CR"),
        }
    }
}

/// Rewrite every `\r\n` and lone `\r` in `text` as `\n`.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        } else {
            out.push(ch);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// A rope-backed text buffer with undo history.
pub struct Buffer {
    rope: Rope,
    history: History,
    path: Option<PathBuf>,
    modified: bool,
    line_ending: LineEnding,
    /// Whether the text on disk ended with a line break.
    trailing_newline: bool,
    /// Flattened text for regex searches, rebuilt lazily after edits.
    search_text: OnceCell<String>,
}

impl Buffer {
    // -- Construction -------------------------------------------------------

    #[must_use]
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Create a buffer from a string. Line endings are normalized.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let line_ending = LineEnding::detect(text);
        let mut normalized = normalize_line_endings(text);
        let trailing_newline = normalized.ends_with('\n');
        if trailing_newline {
            normalized.pop();
        }
        Self {
            rope: Rope::from_str(&normalized),
            history: History::new(),
            path: None,
            modified: false,
            line_ending,
            trailing_newline,
            search_text: OnceCell::new(),
        }
    }

    /// Load a buffer from a file. A missing file gives an empty buffer bound
    /// to `path`, the way `vi newfile` does.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read as UTF-8.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err),
        };
        let mut buf = Self::from_text(&text);
        buf.path = Some(path.to_path_buf());
        Ok(buf)
    }

    // -- Metadata -----------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    #[inline]
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    #[inline]
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    // -- File I/O -----------------------------------------------------------

    /// Save to the associated path.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is set or the write fails.
    pub fn save(&mut self) -> io::Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "buffer has no file path"))?;
        self.save_as(&path)
    }

    /// Save to `path` and bind the buffer to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_as(&mut self, path: &Path) -> io::Result<()> {
        fs::write(path, self.disk_text())?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    /// Text as it would be written to disk, with the original line endings.
    #[must_use]
    pub fn disk_text(&self) -> String {
        let mut text = self.rope.to_string();
        if self.trailing_newline || !text.is_empty() {
            text.push('\n');
        }
        match self.line_ending {
            LineEnding::Lf => text,
            other => text.replace('\n', other.as_str()),
        }
    }

    // -- Internals ----------------------------------------------------------

    fn search_text(&self) -> &str {
        self.search_text.get_or_init(|| self.rope.to_string())
    }

    fn touch(&mut self) {
        self.modified = true;
        self.search_text = OnceCell::new();
    }

    fn raw_insert(&mut self, pos: Position, text: &str) -> Option<Position> {
        let idx = self.pos_to_index(self.clamp(pos))?;
        self.rope.insert(idx, text);
        self.touch();
        self.index_to_pos(idx)
    }

    fn raw_remove(&mut self, start: Position, len_chars: usize) {
        if let Some(idx) = self.pos_to_index(self.clamp(start)) {
            let end = (idx + len_chars).min(self.rope.len_chars());
            self.rope.remove(idx..end);
            self.touch();
        }
    }

    fn apply(&mut self, edits: &[Edit]) {
        for edit in edits {
            match edit {
                Edit::Insert { pos, text } => {
                    self.raw_insert(*pos, text);
                }
                Edit::Delete { pos, text } => self.raw_remove(*pos, text.chars().count()),
            }
        }
    }

    fn byte_to_pos(&self, byte: usize) -> Position {
        let idx = self.rope.byte_to_char(byte);
        self.index_to_pos(idx).unwrap_or_else(|| self.end_position())
    }
}

impl TextBuffer for Buffer {
    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_len(&self, line: usize) -> usize {
        if line >= self.rope.len_lines() {
            return 0;
        }
        let slice = self.rope.line(line);
        let len = slice.len_chars();
        if len > 0 && slice.char(len - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    fn line_text(&self, line: usize) -> String {
        if line >= self.rope.len_lines() {
            return String::new();
        }
        let mut text = self.rope.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        text
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn char_at_index(&self, idx: usize) -> Option<char> {
        self.rope.get_char(idx)
    }

    fn pos_to_index(&self, pos: Position) -> Option<usize> {
        if pos.line >= self.rope.len_lines() {
            return None;
        }
        if pos.col > self.rope.line(pos.line).len_chars() {
            return None;
        }
        Some(self.rope.line_to_char(pos.line) + pos.col)
    }

    fn index_to_pos(&self, idx: usize) -> Option<Position> {
        if idx > self.rope.len_chars() {
            return None;
        }
        let line = self.rope.char_to_line(idx);
        Some(Position::new(line, idx - self.rope.line_to_char(line)))
    }

    fn text(&self, range: Range) -> String {
        let start = self.pos_to_index(self.clamp(range.start));
        let end = self.pos_to_index(self.clamp(range.end));
        match (start, end) {
            (Some(s), Some(e)) if s < e => self.rope.slice(s..e).to_string(),
            _ => String::new(),
        }
    }

    fn insert(&mut self, pos: Position, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = normalize_line_endings(text);
        if let Some(at) = self.raw_insert(pos, &text) {
            self.history.record_insert(at, &text);
        }
    }

    fn remove(&mut self, range: Range) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end);
        let removed = self.text(Range::ordered(start, end));
        if removed.is_empty() {
            return;
        }
        let start = start.min(end);
        self.history.record_delete(start, &removed);
        self.raw_remove(start, removed.chars().count());
    }

    fn begin_edit(&mut self, cursor: Position) {
        self.history.begin(cursor);
    }

    fn end_edit(&mut self, cursor: Position) {
        self.history.commit(cursor);
    }

    fn undo(&mut self) -> Option<Position> {
        let step = self.history.undo()?;
        self.apply(&step.edits);
        Some(self.clamp(step.cursor))
    }

    fn redo(&mut self) -> Option<Position> {
        let step = self.history.redo()?;
        self.apply(&step.edits);
        Some(self.clamp(step.cursor))
    }

    fn find(&self, re: &Regex, from: Position, limit: Position) -> Option<SearchHit> {
        let from_idx = self.pos_to_index(self.clamp(from))?;
        let limit_idx = self.pos_to_index(self.clamp(limit))?;
        if from_idx > limit_idx {
            return None;
        }
        let text = self.search_text();
        let from_byte = self.rope.char_to_byte(from_idx);
        let limit_byte = self.rope.char_to_byte(limit_idx);
        let caps = re.captures_at(text, from_byte)?;
        let whole = caps.get(0)?;
        let at_end = limit_byte == text.len();
        if whole.start() > limit_byte || (whole.start() == limit_byte && !at_end) {
            return None;
        }
        let span = |m: regex::Match<'_>| {
            Range::new(self.byte_to_pos(m.start()), self.byte_to_pos(m.end()))
        };
        Some(SearchHit {
            range: span(whole),
            groups: caps.iter().skip(1).map(|g| g.map(span)).collect(),
        })
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("chars", &self.len_chars())
            .field("modified", &self.modified)
            .field("line_ending", &self.line_ending)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn re(p: &str) -> Regex {
        Regex::new(&format!("(?m){p}")).unwrap()
    }

    // -- LineEnding ---------------------------------------------------------

    #[test]
    fn line_ending_detection() {
        assert_eq!(LineEnding::detect("a\nb"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("a\r\nb"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\rb"), LineEnding::Cr);
        assert_eq!(LineEnding::detect("plain"), LineEnding::Lf);
    }

    #[test]
    fn crlf_is_normalized_and_restored() {
        let buf = Buffer::from_text("one\r\ntwo\r\n");
        assert_eq!(buf.contents(), "one\ntwo");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.disk_text(), "one\r\ntwo\r\n");
    }

    // -- Line access ----------------------------------------------------------

    #[test]
    fn lines_exclude_terminators() {
        let buf = Buffer::from_text("hello\nworld\n");
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.line_len(0), 5);
        assert_eq!(buf.line_text(1), "world");
        assert_eq!(buf.line_text(7), "");
        assert_eq!(buf.char_at(Position::new(1, 0)), Some('w'));
        assert_eq!(buf.char_at(Position::new(0, 5)), None);
    }

    #[test]
    fn empty_buffer_has_one_line() {
        let buf = Buffer::new();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_len(0), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn index_conversion_round_trips() {
        let buf = Buffer::from_text("ab\ncd");
        assert_eq!(buf.pos_to_index(Position::new(1, 1)), Some(4));
        assert_eq!(buf.index_to_pos(4), Some(Position::new(1, 1)));
        assert_eq!(buf.index_to_pos(5), Some(Position::new(1, 2)));
        assert_eq!(buf.index_to_pos(6), None);
        assert_eq!(buf.char_at_index(2), Some('\n'));
    }

    // -- Editing --------------------------------------------------------------

    #[test]
    fn insert_and_remove() {
        let mut buf = Buffer::from_text("hello");
        buf.insert(Position::new(0, 5), " world");
        assert_eq!(buf.contents(), "hello world");
        buf.remove(Range::new(Position::new(0, 0), Position::new(0, 6)));
        assert_eq!(buf.contents(), "world");
        assert!(buf.is_modified());
    }

    #[test]
    fn insert_past_end_is_clamped() {
        let mut buf = Buffer::from_text("ab");
        buf.insert(Position::new(9, 9), "!");
        assert_eq!(buf.contents(), "ab!");
    }

    #[test]
    fn multi_line_remove() {
        let mut buf = Buffer::from_text("first\nsecond\nthird");
        buf.remove(Range::new(Position::new(0, 3), Position::new(2, 2)));
        assert_eq!(buf.contents(), "firird");
    }

    // -- Undo -----------------------------------------------------------------

    #[test]
    fn grouped_edits_undo_together() {
        let mut buf = Buffer::from_text("abc");
        buf.begin_edit(Position::ZERO);
        buf.remove(Range::new(Position::ZERO, Position::new(0, 1)));
        buf.insert(Position::ZERO, "XY");
        buf.end_edit(Position::new(0, 1));
        assert_eq!(buf.contents(), "XYbc");

        assert_eq!(buf.undo(), Some(Position::ZERO));
        assert_eq!(buf.contents(), "abc");
        assert_eq!(buf.redo(), Some(Position::new(0, 1)));
        assert_eq!(buf.contents(), "XYbc");
    }

    #[test]
    fn undo_restores_multi_line_text() {
        let mut buf = Buffer::from_text("a\nb\nc");
        buf.remove(Range::new(Position::new(1, 0), Position::new(2, 0)));
        assert_eq!(buf.contents(), "a\nc");
        buf.undo();
        assert_eq!(buf.contents(), "a\nb\nc");
    }

    // -- Search -------------------------------------------------------------

    #[test]
    fn find_reports_positions_and_groups() {
        let buf = Buffer::from_text("foo bar\nbaz bar");
        let hit = buf
            .find(&re("b(a)(r)?"), Position::new(0, 1), buf.end_position())
            .unwrap();
        assert_eq!(hit.range, Range::new(Position::new(0, 4), Position::new(0, 7)));
        assert_eq!(
            hit.groups[0],
            Some(Range::new(Position::new(0, 5), Position::new(0, 6)))
        );
    }

    #[test]
    fn find_respects_limit() {
        let buf = Buffer::from_text("xx ab");
        assert!(buf.find(&re("ab"), Position::ZERO, Position::new(0, 3)).is_none());
        assert!(buf.find(&re("ab"), Position::ZERO, Position::new(0, 4)).is_some());
    }

    #[test]
    fn find_sees_anchors_of_whole_text() {
        let buf = Buffer::from_text("ab\nab");
        let hit = buf
            .find(&re("^ab"), Position::new(0, 1), buf.end_position())
            .unwrap();
        assert_eq!(hit.range.start, Position::new(1, 0));
    }

    #[test]
    fn find_handles_multibyte_text() {
        let buf = Buffer::from_text("héllo wörld");
        let hit = buf.find(&re("w"), Position::ZERO, buf.end_position()).unwrap();
        assert_eq!(hit.range.start, Position::new(0, 6));
    }

    #[test]
    fn search_cache_refreshes_after_edit() {
        let mut buf = Buffer::from_text("abc");
        assert!(buf.find(&re("z"), Position::ZERO, buf.end_position()).is_none());
        buf.insert(Position::new(0, 1), "z");
        let hit = buf.find(&re("z"), Position::ZERO, buf.end_position()).unwrap();
        assert_eq!(hit.range.start, Position::new(0, 1));
    }

    // -- Files --------------------------------------------------------------

    #[test]
    fn save_and_reload() {
        let dir = std::env::temp_dir().join(format!("viemu-buffer-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("save.txt");
        let mut buf = Buffer::from_text("one\ntwo\n");
        buf.insert(Position::new(1, 3), "!");
        buf.save_as(&path).unwrap();
        assert!(!buf.is_modified());
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo!\n");
        let again = Buffer::from_file(&path).unwrap();
        assert_eq!(again.contents(), "one\ntwo!");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_opens_empty() {
        let path = std::env::temp_dir().join("viemu-definitely-missing-file.txt");
        let buf = Buffer::from_file(&path).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.path(), Some(path.as_path()));
    }
}
