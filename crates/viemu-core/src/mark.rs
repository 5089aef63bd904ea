//! Marks: named positions that follow the text they were set on.
//!
//! User marks are `a`-`z`. The engine maintains the special marks itself:
//!
//! | Mark | Set when |
//! |------|----------|
//! | `.` | a change was made |
//! | `^` | Insert mode was left |
//! | `[` `]` | first and last char of the last yank, change or paste |
//! | `<` `>` | a Visual selection ended |
//! | `'` / `` ` `` | a jump was made (position before it) |
//!
//! User marks are mirrored into the host's [`Bookmarks`], one indicator per
//! marked line. Bookmarks the host adds on its own get adopted as the next
//! free letter; bookmarks the host removes take their marks with them.

use std::collections::BTreeMap;

use crate::host::Bookmarks;
use crate::position::{Position, Range};

/// Marks for one buffer.
#[derive(Debug, Default, Clone)]
pub struct Marks {
    marks: BTreeMap<char, Position>,
}

impl Marks {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            marks: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn is_user(ch: char) -> bool {
        ch.is_ascii_lowercase()
    }

    /// Names a user may set with `m` or `:mark`.
    #[must_use]
    pub const fn is_settable(ch: char) -> bool {
        matches!(ch, 'a'..='z' | '\'' | '`' | '[' | ']' | '<' | '>')
    }

    /// Names `'x` and `` `x `` accept.
    #[must_use]
    pub const fn is_readable(ch: char) -> bool {
        matches!(ch, 'a'..='z' | '\'' | '`' | '[' | ']' | '<' | '>' | '.' | '^')
    }

    /// Set (or move) mark `ch`. `'` and `` ` `` are the same mark.
    pub fn set(&mut self, ch: char, pos: Position, bookmarks: &mut dyn Bookmarks) {
        let ch = canonical(ch);
        let old = self.marks.insert(ch, pos);
        if Self::is_user(ch) {
            if let Some(old) = old
                && old.line != pos.line
            {
                self.release_line(old.line, bookmarks);
            }
            bookmarks.add(pos.line);
        }
    }

    #[must_use]
    pub fn get(&self, ch: char) -> Option<Position> {
        self.marks.get(&canonical(ch)).copied()
    }

    /// Delete mark `ch`. Returns whether it existed.
    pub fn remove(&mut self, ch: char, bookmarks: &mut dyn Bookmarks) -> bool {
        let ch = canonical(ch);
        match self.marks.remove(&ch) {
            Some(pos) => {
                if Self::is_user(ch) {
                    self.release_line(pos.line, bookmarks);
                }
                true
            }
            None => false,
        }
    }

    /// Delete every user mark (`:delmarks!`).
    pub fn clear_user(&mut self, bookmarks: &mut dyn Bookmarks) {
        let names: Vec<char> = self.marks.keys().copied().filter(|c| Self::is_user(*c)).collect();
        for ch in names {
            self.remove(ch, bookmarks);
        }
    }

    /// All marks in name order.
    pub fn iter(&self) -> impl Iterator<Item = (char, Position)> + '_ {
        self.marks.iter().map(|(c, p)| (*c, *p))
    }

    /// User mark on `line`, if any.
    #[must_use]
    pub fn user_mark_on(&self, line: usize) -> Option<char> {
        self.marks
            .iter()
            .find(|(c, p)| Self::is_user(**c) && p.line == line)
            .map(|(c, _)| *c)
    }

    /// Drop the bookmark on `line` unless another user mark still lives there.
    fn release_line(&self, line: usize, bookmarks: &mut dyn Bookmarks) {
        if self.user_mark_on(line).is_none() {
            bookmarks.remove(line);
        }
    }

    // -- Host bookmark sync -------------------------------------------------

    /// Bring marks in line with bookmarks the host changed on its own.
    pub fn sync_from_bookmarks(&mut self, bookmarks: &dyn Bookmarks) {
        let lines = bookmarks.lines();
        self.marks
            .retain(|c, p| !Self::is_user(*c) || lines.contains(&p.line));
        for line in lines {
            if self.user_mark_on(line).is_some() {
                continue;
            }
            let Some(free) = ('a'..='z').find(|c| !self.marks.contains_key(c)) else {
                tracing::debug!(line, "no free mark letter for bookmark");
                break;
            };
            self.marks.insert(free, Position::new(line, 0));
        }
    }

    /// Rewrite the bookmark set to exactly the lines holding user marks.
    pub fn sync_to_bookmarks(&self, bookmarks: &mut dyn Bookmarks) {
        let wanted: Vec<usize> = self
            .marks
            .iter()
            .filter(|(c, _)| Self::is_user(**c))
            .map(|(_, p)| p.line)
            .collect();
        for line in bookmarks.lines() {
            if !wanted.contains(&line) {
                bookmarks.remove(line);
            }
        }
        for line in wanted {
            bookmarks.add(line);
        }
    }

    // -- Edit tracking ------------------------------------------------------

    /// `text` was inserted at `at`: marks at or after it move along.
    pub fn adjust_insert(&mut self, at: Position, text: &str) {
        let end = at.after_text(text);
        for pos in self.marks.values_mut() {
            if *pos < at {
                continue;
            }
            if pos.line == at.line {
                *pos = Position::new(end.line, end.col + (pos.col - at.col));
            } else {
                pos.line += end.line - at.line;
            }
        }
    }

    /// `range` was removed: marks inside collapse onto its start, marks
    /// after it move back.
    pub fn adjust_delete(&mut self, range: Range) {
        let (start, end) = (range.start, range.end);
        for pos in self.marks.values_mut() {
            if *pos < start {
                continue;
            }
            if *pos < end {
                *pos = start;
            } else if pos.line == end.line {
                *pos = Position::new(start.line, start.col + (pos.col - end.col));
            } else {
                pos.line -= end.line - start.line;
            }
        }
    }

    /// Whole lines `first..=last` are about to be deleted: user marks on
    /// them go away. Call before [`adjust_delete`](Self::adjust_delete).
    pub fn remove_lines(&mut self, first: usize, last: usize, bookmarks: &mut dyn Bookmarks) {
        let doomed: Vec<char> = self
            .marks
            .iter()
            .filter(|(c, p)| Self::is_user(**c) && (first..=last).contains(&p.line))
            .map(|(c, _)| *c)
            .collect();
        for ch in doomed {
            self.remove(ch, bookmarks);
        }
    }

    /// Replace all marks, e.g. from persisted session data.
    pub fn restore(&mut self, marks: impl IntoIterator<Item = (char, Position)>) {
        self.marks = marks
            .into_iter()
            .filter(|(c, _)| Self::is_readable(*c))
            .map(|(c, p)| (canonical(c), p))
            .collect();
    }
}

const fn canonical(ch: char) -> char {
    if ch == '`' { '\'' } else { ch }
}
