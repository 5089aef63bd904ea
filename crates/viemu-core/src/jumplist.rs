//! Jump list: position history for `Ctrl+O` / `Ctrl+I`.
//!
//! Jump motions (`gg`, `G`, `/`, `?`, `n`, `N`, `*`, `#`, `%`, `'x`,
//! `` `x ``, `:N`) record the cursor position they leave from. Each line
//! appears at most once: recording a line again moves its entry to the end.

use crate::position::Position;

/// Maximum number of entries kept.
pub const JUMPLIST_MAX: usize = 100;

/// Ordered jump history with a navigation pointer.
///
/// After [`add`](Self::add) the pointer sits on the newest entry. `prev`
/// walks toward older entries and `next` toward newer ones; both clamp at
/// the ends and keep returning the boundary entry.
#[derive(Debug, Default, Clone)]
pub struct JumpList {
    entries: Vec<Position>,
    current: usize,
}

impl JumpList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: 0,
        }
    }

    /// Record a jump. An older entry on the same line is dropped first.
    pub fn add(&mut self, pos: Position) {
        self.entries.retain(|e| e.line != pos.line);
        self.entries.push(pos);
        if self.entries.len() > JUMPLIST_MAX {
            self.entries.remove(0);
        }
        self.current = self.entries.len() - 1;
    }

    /// Step back (`Ctrl+O`).
    ///
    /// `here` is the cursor position. When the pointer is on the newest
    /// entry and the cursor has moved off its line, `here` is recorded
    /// first so `next` can return to it. An empty list records `here` and
    /// hands it back.
    pub fn prev(&mut self, here: Position) -> Option<Position> {
        let at_newest = self.current + 1 >= self.entries.len();
        if self.entries.is_empty()
            || (at_newest && self.entries.last().is_some_and(|e| e.line != here.line))
        {
            self.add(here);
        }
        self.current = self.current.saturating_sub(1);
        self.entries.get(self.current).copied()
    }

    /// Step forward (`Ctrl+I`).
    pub fn next(&mut self) -> Option<Position> {
        if self.current + 1 < self.entries.len() {
            self.current += 1;
        }
        self.entries.get(self.current).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first, for `:jumps` and persistence.
    #[must_use]
    pub fn entries(&self) -> &[Position] {
        &self.entries
    }

    /// Index of the entry the pointer is on.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Replace the history (session restore). The pointer goes to the end.
    pub fn restore(&mut self, entries: impl IntoIterator<Item = Position>) {
        self.entries.clear();
        for pos in entries {
            self.add(pos);
        }
    }

    /// Move entries on or below `first` by `delta` lines after lines were
    /// inserted (positive) or deleted (negative). Never moves above `first`.
    pub fn shift_lines(&mut self, first: usize, delta: isize) {
        for pos in &mut self.entries {
            if pos.line >= first {
                pos.line = pos.line.saturating_add_signed(delta).max(first.min(pos.line));
            }
        }
    }
}
