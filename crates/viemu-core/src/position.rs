//! Text position and range types.
//!
//! All coordinates are **0-indexed**. Line 0 is the first line, column 0 is the
//! first character. Columns count Unicode scalar values (chars), not bytes.
//!
//! Two range flavours exist:
//!
//! - [`Range`] is a plain half-open `[start, end)` span of buffer text. This is
//!   what the buffer edits and what registers are filled from.
//! - [`MotionRange`] is what a motion produces: two cursors plus a
//!   [`MotionKind`] tag that decides whether the far character is included and
//!   whether whole lines are affected. Operators normalize it and then resolve
//!   it against the buffer into a `Range`.

use std::fmt;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A position in a text buffer: (line, column), both 0-indexed.
///
/// `col` is the char offset from the start of the line. A column equal to the
/// line's content length addresses the line break (or the end of the last
/// line), which is where insert-mode cursors and exclusive range ends sit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    /// The origin: line 0, column 0.
    pub const ZERO: Self = Self { line: 0, col: 0 };

    /// Create a new position.
    #[inline]
    #[must_use]
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    /// Position just past `text` when it is inserted at `self`.
    ///
    /// `Pos(2:4)` + `"ab\ncd"` lands on `Pos(3:2)`.
    #[must_use]
    pub fn after_text(self, text: &str) -> Self {
        let newlines = text.matches('\n').count();
        if newlines == 0 {
            Self::new(self.line, self.col + text.chars().count())
        } else {
            let tail = text.rsplit('\n').next().unwrap_or("");
            Self::new(self.line + newlines, tail.chars().count())
        }
    }
}

impl Ord for Position {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.line
            .cmp(&other.line)
            .then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Position {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({}:{})", self.line, self.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-indexed, matching Vim's `line:col` status.
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

/// A half-open range in a text buffer: `[start, end)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a range. Panics in debug if `start > end`.
    #[inline]
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        debug_assert!(
            start.line < end.line || (start.line == end.line && start.col <= end.col),
            "Range::new requires start <= end"
        );
        Self { start, end }
    }

    /// Build a range from two arbitrary positions, swapping if needed.
    #[inline]
    #[must_use]
    pub fn ordered(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// A zero-width range at `pos`.
    #[inline]
    #[must_use]
    pub const fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.line == self.end.line && self.start.col == self.end.col
    }

    /// True when `pos` falls within `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(self, pos: Position) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Number of lines this range touches. An empty range returns 1.
    #[inline]
    #[must_use]
    pub const fn line_span(self) -> usize {
        self.end.line - self.start.line + 1
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range({}:{} .. {}:{})",
            self.start.line, self.start.col, self.end.line, self.end.col
        )
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Motion ranges
// ---------------------------------------------------------------------------

/// How a motion's end cursor is interpreted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionKind {
    /// The character under the far cursor is part of the range (`e`, `$`, `f`).
    Inclusive,
    /// The far cursor is the first character *not* affected (`w`, `b`, `h`).
    Exclusive,
    /// Whole lines from the first to the last cursor line (`j`, `G`, `dd`).
    LineWise,
}

/// Result of a motion: the cursor it started from, where it landed, and how
/// the pair should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionRange {
    pub start: Position,
    pub end: Position,
    pub kind: MotionKind,
}

impl MotionRange {
    #[must_use]
    pub const fn new(start: Position, end: Position, kind: MotionKind) -> Self {
        Self { start, end, kind }
    }

    /// Swap the ends if the motion went backwards.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.start <= self.end {
            self
        } else {
            Self {
                start: self.end,
                end: self.start,
                kind: self.kind,
            }
        }
    }

    #[must_use]
    pub const fn is_linewise(&self) -> bool {
        matches!(self.kind, MotionKind::LineWise)
    }

    /// First and last line touched (after normalization).
    #[must_use]
    pub fn lines(&self) -> (usize, usize) {
        let n = self.normalized();
        (n.start.line, n.end.line)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
