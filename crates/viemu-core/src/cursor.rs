//! Cursor: position tracking with movement and selection.
//!
//! The `Cursor` tracks a position, a sticky column for vertical movement,
//! and an optional selection anchor. Movement primitives respect buffer
//! boundaries and the mode's column limit.
//!
//! # Column limit
//!
//! Movement methods take `past_end: bool` instead of a mode:
//!
//! - **Normal / Visual**: `past_end = false`, the cursor sits ON a char.
//! - **Insert / Replace**: `past_end = true`, it may sit after the last char.
//!
//! # Sticky column
//!
//! Vertical movement remembers the column it started from and snaps back to
//! it on longer lines. `$` sets the sticky column to "end of line", so `$j`
//! keeps hugging line ends. Horizontal movement resets it.

use crate::host::TextBuffer;
use crate::position::{Position, Range};

/// Sticky column value meaning "always the end of the line".
const STICKY_EOL: usize = usize::MAX;

/// Signature shared by the functions in [`crate::word`].
pub type WordMotion = fn(&dyn TextBuffer, Position) -> Position;

/// A cursor in a text buffer.
///
/// Does not reference the buffer; the buffer is passed to each movement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor {
    pos: Position,
    sticky_col: usize,
    anchor: Option<Position>,
}

impl Cursor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pos: Position::ZERO,
            sticky_col: 0,
            anchor: None,
        }
    }

    #[must_use]
    pub const fn at(pos: Position) -> Self {
        Self {
            pos,
            sticky_col: pos.col,
            anchor: None,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[inline]
    #[must_use]
    pub const fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    #[must_use]
    pub const fn line(&self) -> usize {
        self.pos.line
    }

    #[inline]
    #[must_use]
    pub const fn col(&self) -> usize {
        self.pos.col
    }

    #[inline]
    #[must_use]
    pub const fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    /// The ordered selection between anchor and cursor, if any.
    #[must_use]
    pub fn selection(&self) -> Option<Range> {
        self.anchor.map(|anchor| Range::ordered(anchor, self.pos))
    }

    // -- Selection control --------------------------------------------------

    pub const fn set_anchor(&mut self) {
        self.anchor = Some(self.pos);
    }

    pub const fn set_anchor_at(&mut self, pos: Position) {
        self.anchor = Some(pos);
    }

    pub const fn clear_anchor(&mut self) {
        self.anchor = None;
    }

    /// Exchange cursor and anchor (`o` in Visual mode).
    pub fn swap_anchor(&mut self) {
        if let Some(anchor) = self.anchor.replace(self.pos) {
            self.pos = anchor;
            self.sticky_col = anchor.col;
        }
    }

    // -- Direct positioning -------------------------------------------------

    /// Move to `pos`, clamped. Resets the sticky column.
    pub fn set_position(&mut self, pos: Position, buf: &dyn TextBuffer, past_end: bool) {
        self.pos = clamp(pos, buf, past_end);
        self.sticky_col = self.pos.col;
    }

    /// Move to `line`, keeping the sticky column.
    pub fn goto_line(&mut self, line: usize, buf: &dyn TextBuffer, past_end: bool) {
        self.pos.line = line.min(buf.last_line());
        self.pos.col = self.sticky_col.min(max_col_for_line(buf, self.pos.line, past_end));
    }

    // -- Horizontal movement ------------------------------------------------

    /// `h`: no line wrapping.
    pub fn move_left(&mut self, count: usize, buf: &dyn TextBuffer, past_end: bool) {
        let col = self.pos.col.min(max_col_for_line(buf, self.pos.line, past_end));
        self.pos.col = col.saturating_sub(count);
        self.sticky_col = self.pos.col;
    }

    /// `l`: no line wrapping.
    pub fn move_right(&mut self, count: usize, buf: &dyn TextBuffer, past_end: bool) {
        let max_col = max_col_for_line(buf, self.pos.line, past_end);
        self.pos.col = (self.pos.col + count).min(max_col);
        self.sticky_col = self.pos.col;
    }

    /// `0`
    pub const fn move_to_line_start(&mut self) {
        self.pos.col = 0;
        self.sticky_col = 0;
    }

    /// `^`
    pub fn move_to_first_non_blank(&mut self, buf: &dyn TextBuffer, past_end: bool) {
        let col = first_non_blank_col(buf, self.pos.line);
        self.pos.col = col.min(max_col_for_line(buf, self.pos.line, past_end));
        self.sticky_col = self.pos.col;
    }

    /// `$`: also makes vertical movement stick to line ends.
    pub fn move_to_line_end(&mut self, buf: &dyn TextBuffer, past_end: bool) {
        self.pos.col = max_col_for_line(buf, self.pos.line, past_end);
        self.sticky_col = STICKY_EOL;
    }

    /// `|`: 1-based screen column; tabs count as one column.
    pub fn move_to_column(&mut self, column: usize, buf: &dyn TextBuffer, past_end: bool) {
        let max_col = max_col_for_line(buf, self.pos.line, past_end);
        self.pos.col = column.saturating_sub(1).min(max_col);
        self.sticky_col = self.pos.col;
    }

    // -- Vertical movement --------------------------------------------------

    pub fn move_up(&mut self, count: usize, buf: &dyn TextBuffer, past_end: bool) {
        self.goto_line(self.pos.line.saturating_sub(count), buf, past_end);
    }

    pub fn move_down(&mut self, count: usize, buf: &dyn TextBuffer, past_end: bool) {
        self.goto_line(self.pos.line.saturating_add(count), buf, past_end);
    }

    // -- Word motions -------------------------------------------------------

    /// Apply a word motion `count` times. Resets the sticky column.
    pub fn word_motion(
        &mut self,
        motion: WordMotion,
        count: usize,
        buf: &dyn TextBuffer,
        past_end: bool,
    ) {
        for _ in 0..count {
            let next = motion(buf, self.pos);
            if next == self.pos {
                break;
            }
            self.pos = next;
        }
        self.pos.col = self.pos.col.min(max_col_for_line(buf, self.pos.line, past_end));
        self.sticky_col = self.pos.col;
    }

    // -- Character find motions ---------------------------------------------

    /// `f{ch}`. Returns `true` if the cursor moved.
    pub fn char_find_forward(&mut self, buf: &dyn TextBuffer, ch: char, count: usize) -> bool {
        match find_on_line_forward(buf, self.pos.line, self.pos.col, ch, count) {
            Some(col) => {
                self.pos.col = col;
                self.sticky_col = col;
                true
            }
            None => false,
        }
    }

    /// `t{ch}`. Returns `true` if the cursor moved.
    pub fn char_till_forward(&mut self, buf: &dyn TextBuffer, ch: char, count: usize) -> bool {
        match find_on_line_forward(buf, self.pos.line, self.pos.col, ch, count) {
            Some(col) if col - 1 > self.pos.col => {
                self.pos.col = col - 1;
                self.sticky_col = self.pos.col;
                true
            }
            _ => false,
        }
    }

    /// `F{ch}`. Returns `true` if the cursor moved.
    pub fn char_find_backward(&mut self, buf: &dyn TextBuffer, ch: char, count: usize) -> bool {
        match find_on_line_backward(buf, self.pos.line, self.pos.col, ch, count) {
            Some(col) => {
                self.pos.col = col;
                self.sticky_col = col;
                true
            }
            None => false,
        }
    }

    /// `T{ch}`. Returns `true` if the cursor moved.
    pub fn char_till_backward(&mut self, buf: &dyn TextBuffer, ch: char, count: usize) -> bool {
        match find_on_line_backward(buf, self.pos.line, self.pos.col, ch, count) {
            Some(col) if col + 1 < self.pos.col => {
                self.pos.col = col + 1;
                self.sticky_col = self.pos.col;
                true
            }
            _ => false,
        }
    }

    // -- Paragraph motions --------------------------------------------------

    /// `}`: next empty line, or the end of the last line.
    pub fn paragraph_forward(&mut self, count: usize, buf: &dyn TextBuffer) {
        let line_count = buf.line_count();
        for _ in 0..count {
            let mut i = self.pos.line + 1;
            if buf.line_len(self.pos.line) == 0 {
                while i < line_count && buf.line_len(i) == 0 {
                    i += 1;
                }
            }
            while i < line_count && buf.line_len(i) != 0 {
                i += 1;
            }
            if i >= line_count {
                self.pos = Position::new(buf.last_line(), buf.line_len(buf.last_line()));
                self.sticky_col = self.pos.col;
                return;
            }
            self.pos.line = i;
        }
        self.pos.col = 0;
        self.sticky_col = 0;
    }

    /// `{`: previous empty line, or the start of the buffer.
    pub fn paragraph_backward(&mut self, count: usize, buf: &dyn TextBuffer) {
        for _ in 0..count {
            if self.pos.line == 0 {
                break;
            }
            let mut i = self.pos.line - 1;
            if buf.line_len(self.pos.line) == 0 {
                while i > 0 && buf.line_len(i) == 0 {
                    i -= 1;
                }
            }
            while i > 0 && buf.line_len(i) != 0 {
                i -= 1;
            }
            self.pos.line = i;
        }
        self.pos.col = 0;
        self.sticky_col = 0;
    }

    // -- Clamping -----------------------------------------------------------

    /// Pull cursor and anchor back inside the buffer after an edit.
    pub fn clamp(&mut self, buf: &dyn TextBuffer, past_end: bool) {
        self.pos = clamp(self.pos, buf, past_end);
        if let Some(anchor) = &mut self.anchor {
            *anchor = clamp(*anchor, buf, true);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Highest column the cursor may take on `line`.
#[must_use]
pub fn max_col_for_line(buf: &dyn TextBuffer, line: usize, past_end: bool) -> usize {
    let len = buf.line_len(line);
    if past_end { len } else { len.saturating_sub(1) }
}

/// Column of the first non-blank on `line`; the line length when all blank.
#[must_use]
pub fn first_non_blank_col(buf: &dyn TextBuffer, line: usize) -> usize {
    buf.line_text(line)
        .chars()
        .take_while(|ch| *ch == ' ' || *ch == '\t')
        .count()
}

/// Column of the `count`th `ch` after `from_col` on `line`.
#[must_use]
pub fn find_on_line_forward(
    buf: &dyn TextBuffer,
    line: usize,
    from_col: usize,
    ch: char,
    count: usize,
) -> Option<usize> {
    buf.line_text(line)
        .chars()
        .enumerate()
        .skip(from_col + 1)
        .filter(|&(_, c)| c == ch)
        .nth(count.max(1) - 1)
        .map(|(i, _)| i)
}

/// Column of the `count`th `ch` before `from_col` on `line`.
#[must_use]
pub fn find_on_line_backward(
    buf: &dyn TextBuffer,
    line: usize,
    from_col: usize,
    ch: char,
    count: usize,
) -> Option<usize> {
    let chars: Vec<char> = buf.line_text(line).chars().collect();
    (0..from_col.min(chars.len()))
        .rev()
        .filter(|&i| chars[i] == ch)
        .nth(count.max(1) - 1)
}

/// Clamp a position to the buffer for the given column limit.
#[must_use]
pub fn clamp(pos: Position, buf: &dyn TextBuffer, past_end: bool) -> Position {
    let line = pos.line.min(buf.last_line());
    Position::new(line, pos.col.min(max_col_for_line(buf, line, past_end)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
