//! Normal mode: counts, registers, operators, motions and the one-key
//! commands.
//!
//! A command is assembled key by key. Prefix keys (`"x`, `d`, `g`, `f`,
//! `'`, `m`, `q`, `@`, `r`, `i`/`a` after an operator) park a [`Pending`]
//! state that the next key completes. Visual mode shares the pending
//! states and the motion evaluator.

use tracing::{debug, trace, warn};

use super::Editor;
use super::insert::InsertKind;
use super::operator::{Operator, Region};
use crate::cursor::{self, Cursor};
use crate::error::{Result, ViError};
use crate::host::TextBuffer;
use crate::key::{KeyCode, KeyEvent, parse_keys};
use crate::keymap::KeyOrigin;
use crate::mark::Marks;
use crate::mode::{Mode, VisualKind};
use crate::pattern;
use crate::position::{MotionKind, MotionRange, Position, Range};
use crate::recorder::merge_counts;
use crate::register::{OperationMode, RegisterFile};
use crate::search::{self, SearchDirection, SearchParams};
use crate::text_object::{self, ObjectKind};
use crate::word;

/// Counts beyond this are clamped.
const COUNT_MAX: usize = 999_999;

// ---------------------------------------------------------------------------
// Pending state
// ---------------------------------------------------------------------------

/// Which of `f`, `F`, `t`, `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CharFind {
    forward: bool,
    till: bool,
}

impl CharFind {
    pub(super) const fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'f' => Self { forward: true, till: false },
            'F' => Self { forward: false, till: false },
            't' => Self { forward: true, till: true },
            'T' => Self { forward: false, till: true },
            _ => return None,
        })
    }

    const fn reversed(self) -> Self {
        Self {
            forward: !self.forward,
            till: self.till,
        }
    }
}

/// An operator waiting for its motion, with the count typed before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct OpPending {
    pub op: Operator,
    pub count: Option<usize>,
}

/// A prefix key waiting for the rest of its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Pending {
    /// `"`: register name next.
    Register,
    Operator(OpPending),
    /// `g`: second key next, possibly after an operator.
    G(Option<OpPending>),
    CharFind(CharFind, Option<OpPending>),
    /// `'` (line) or `` ` `` (exact).
    Mark { exact: bool, op: Option<OpPending> },
    /// `i`/`a` after an operator or in Visual mode.
    TextObject { around: bool, op: Option<OpPending> },
    /// `r`: replacement char next.
    Replace,
    /// `m`
    SetMark,
    /// `q`: register to record into.
    MacroRecord,
    /// `@`
    MacroRun,
}

impl Pending {
    /// The next key is an argument, never a mapping trigger.
    pub(super) const fn wants_literal(self) -> bool {
        matches!(
            self,
            Self::Register
                | Self::CharFind(..)
                | Self::Mark { .. }
                | Self::Replace
                | Self::SetMark
                | Self::MacroRecord
                | Self::MacroRun
        )
    }
}

// ---------------------------------------------------------------------------
// Motions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Motion {
    Left,
    Right,
    /// `<BS>`: `h` that wraps to the previous line.
    WrapLeft,
    /// `<Space>`: `l` that wraps to the next line.
    WrapRight,
    Up,
    Down,
    LineStart,
    FirstNonBlank,
    LineEnd,
    LastNonBlank,
    Column,
    WordForward { big: bool },
    WordBackward { big: bool },
    WordEnd { big: bool },
    WordEndBackward { big: bool },
    GotoLine,
    FirstLine,
    ParagraphForward,
    ParagraphBackward,
    MatchPair,
    FindChar(char, CharFind),
    RepeatFind { reverse: bool },
    NextLineStart,
    PrevLineStart,
    CurrentLineStart,
    SearchNext { reverse: bool },
    SearchWord { forward: bool },
    Mark { name: char, exact: bool },
}

impl Motion {
    pub(super) const fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'h' => Self::Left,
            'l' => Self::Right,
            ' ' => Self::WrapRight,
            'j' => Self::Down,
            'k' => Self::Up,
            '0' => Self::LineStart,
            '^' => Self::FirstNonBlank,
            '$' => Self::LineEnd,
            '|' => Self::Column,
            'w' => Self::WordForward { big: false },
            'W' => Self::WordForward { big: true },
            'b' => Self::WordBackward { big: false },
            'B' => Self::WordBackward { big: true },
            'e' => Self::WordEnd { big: false },
            'E' => Self::WordEnd { big: true },
            'G' => Self::GotoLine,
            '}' => Self::ParagraphForward,
            '{' => Self::ParagraphBackward,
            '%' => Self::MatchPair,
            ';' => Self::RepeatFind { reverse: false },
            ',' => Self::RepeatFind { reverse: true },
            '+' => Self::NextLineStart,
            '-' => Self::PrevLineStart,
            '_' => Self::CurrentLineStart,
            'n' => Self::SearchNext { reverse: false },
            'N' => Self::SearchNext { reverse: true },
            '*' => Self::SearchWord { forward: true },
            '#' => Self::SearchWord { forward: false },
            _ => return None,
        })
    }

    /// Motions on named keys.
    pub(super) fn from_key(key: KeyEvent) -> Option<Self> {
        if let Some(ch) = key.as_char() {
            return Self::from_char(ch);
        }
        if key.is_ctrl('n') || key.is_ctrl('j') {
            return Some(Self::Down);
        }
        if key.is_ctrl('p') {
            return Some(Self::Up);
        }
        Some(match key.code {
            KeyCode::Left => Self::Left,
            KeyCode::Right => Self::Right,
            KeyCode::Up => Self::Up,
            KeyCode::Down => Self::Down,
            KeyCode::Home => Self::LineStart,
            KeyCode::End => Self::LineEnd,
            KeyCode::Backspace => Self::WrapLeft,
            KeyCode::Enter => Self::NextLineStart,
            _ => return None,
        })
    }

    /// Motions behind `g`.
    const fn from_g(ch: char) -> Option<Self> {
        Some(match ch {
            'g' => Self::FirstLine,
            'e' => Self::WordEndBackward { big: false },
            'E' => Self::WordEndBackward { big: true },
            '_' => Self::LastNonBlank,
            _ => return None,
        })
    }
}

/// Where a motion lands and how an operator reads it.
#[derive(Debug, Clone)]
pub(super) struct Target {
    pub cursor: Cursor,
    pub kind: MotionKind,
    /// The motion is a jump (`G`, `/`, `'a`...).
    pub jump: bool,
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

impl<B: TextBuffer> Editor<B> {
    pub(super) fn normal_key(&mut self, key: KeyEvent) {
        if let Some(pending) = self.pending.take() {
            self.pending_key(pending, key);
            return;
        }
        if self.count_digit(key) {
            return;
        }
        match key.as_char() {
            Some(ch) => self.normal_char(ch, key),
            None => self.normal_special(key),
        }
    }

    /// Accumulate a count digit. `0` only continues a count.
    pub(super) fn count_digit(&mut self, key: KeyEvent) -> bool {
        let Some(digit) = key.as_char().and_then(|ch| ch.to_digit(10)) else {
            return false;
        };
        if digit == 0 && self.count.is_none() {
            return false;
        }
        let digit = usize::try_from(digit).unwrap_or_default();
        let count = self.count.unwrap_or(0).saturating_mul(10).saturating_add(digit);
        self.count = Some(count.min(COUNT_MAX));
        true
    }

    fn normal_char(&mut self, ch: char, key: KeyEvent) {
        if let Some(op) = Operator::from_char(ch) {
            self.begin_operator(op, key, true);
            return;
        }
        if let Some(find) = CharFind::from_char(ch) {
            self.pending = Some(Pending::CharFind(find, None));
            return;
        }
        match ch {
            '"' => self.pending = Some(Pending::Register),
            'g' => {
                // Recorded speculatively: `g~`, `gJ`, `gp` are changes.
                self.change.start(key, self.count, self.register);
                self.pending = Some(Pending::G(None));
            }
            '\'' | '`' => self.pending = Some(Pending::Mark { exact: ch == '`', op: None }),
            'm' => self.pending = Some(Pending::SetMark),
            'r' => {
                self.change.start(key, self.count, self.register);
                self.pending = Some(Pending::Replace);
            }
            'q' => {
                if self.macro_recorder.recording().is_some() {
                    self.stop_macro();
                } else {
                    self.pending = Some(Pending::MacroRecord);
                }
            }
            '@' => self.pending = Some(Pending::MacroRun),
            'i' | 'a' | 'I' | 'A' | 'o' | 'O' | 'R' => self.insert_command(ch, key),
            'v' => self.enter_visual(VisualKind::Char),
            'V' => self.enter_visual(VisualKind::Line),
            'x' => self.delete_chars(key, true),
            'X' => self.delete_chars(key, false),
            'D' | 'C' => self.to_line_end(key, ch == 'C'),
            's' => self.substitute_chars(key),
            'S' => self.substitute_lines(key),
            'Y' => {
                let n = self.take_count().unwrap_or(1);
                let first = self.cursor.line();
                let last = (first + n - 1).min(self.buffer.last_line());
                self.apply_operator(Operator::Yank, Region::Lines { first, last }, 1);
                self.register = None;
            }
            'J' => {
                let count = self.take_count();
                if self.join_lines(self.cursor.line(), count.unwrap_or(2).max(2), true) {
                    self.immediate_change(key, count);
                }
                self.register = None;
            }
            '~' => self.toggle_case_chars(key),
            'p' | 'P' => {
                let count = self.take_count();
                let register = self.register;
                if self.paste(ch == 'p', count.unwrap_or(1), false) {
                    if let Some(change) = self.change.immediate(key, count, register) {
                        self.session.borrow_mut().last_change = Some(change);
                    }
                }
            }
            '.' => self.repeat_change(),
            'u' => {
                let n = self.take_count().unwrap_or(1);
                self.undo(n);
            }
            ':' => {
                let prefill = match self.take_count() {
                    Some(1) => ".".to_string(),
                    Some(n) => format!(".,.+{}", n - 1),
                    None => String::new(),
                };
                self.open_ex(&prefill);
            }
            '/' => self.open_search(SearchDirection::Forward, None),
            '?' => self.open_search(SearchDirection::Backward, None),
            '&' => {
                self.execute("s");
            }
            _ => match Motion::from_char(ch) {
                Some(motion) => self.run_motion(motion),
                None => self.cancel_pending(),
            },
        }
    }

    fn normal_special(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Escape || key.is_ctrl('c') {
            self.cancel_pending();
        } else if key.is_ctrl('r') {
            let n = self.take_count().unwrap_or(1);
            self.redo(n);
        } else if key.is_ctrl('o') {
            let n = self.take_count().unwrap_or(1);
            self.jump_older(n);
        } else if key.code == KeyCode::Tab || key.is_ctrl('i') {
            let n = self.take_count().unwrap_or(1);
            self.jump_newer(n);
        } else if key.is_ctrl('v') {
            self.enter_visual(VisualKind::Block);
        } else if key.code == KeyCode::Delete {
            self.delete_chars(key, true);
        } else if key.code == KeyCode::Insert {
            self.insert_command('i', key);
        } else if let Some(motion) = Motion::from_key(key) {
            self.run_motion(motion);
        } else {
            self.cancel_pending();
        }
    }

    /// Drop a half-typed command.
    pub(super) fn cancel_pending(&mut self) {
        self.pending = None;
        self.count = None;
        self.register = None;
        self.change.cancel();
    }

    /// Complete a parked prefix. Shared with Visual mode.
    pub(super) fn pending_key(&mut self, pending: Pending, key: KeyEvent) {
        if key.code == KeyCode::Escape || key.is_ctrl('c') {
            self.cancel_pending();
            return;
        }
        match pending {
            Pending::Register => match key.as_char() {
                Some(ch) if RegisterFile::is_valid(ch) => self.register = Some(ch),
                Some(ch) => {
                    self.cancel_pending();
                    self.error(&ViError::InvalidRegister(ch));
                }
                None => self.cancel_pending(),
            },
            Pending::Operator(op) => self.operator_key(op, key),
            Pending::G(op) => self.g_key(op, key),
            Pending::CharFind(find, op) => match literal_char(key) {
                Some(ch) => self.motion_or_operator(Motion::FindChar(ch, find), op),
                None => self.cancel_pending(),
            },
            Pending::Mark { exact, op } => match key.as_char() {
                Some(name) => self.motion_or_operator(Motion::Mark { name, exact }, op),
                None => self.cancel_pending(),
            },
            Pending::TextObject { around, op } => self.text_object_key(around, op, key),
            Pending::Replace => {
                if self.mode.is_visual() {
                    self.visual_replace(key);
                } else {
                    self.replace_chars(key);
                }
            }
            Pending::SetMark => match key.as_char() {
                Some(ch) if Marks::is_settable(ch) => {
                    let here = self.cursor.position();
                    self.set_mark(ch, here);
                }
                _ => self.error(&ViError::InvalidMark),
            },
            Pending::MacroRecord => match key.as_char() {
                Some(ch) if ch.is_ascii_alphanumeric() || ch == '"' => {
                    self.macro_recorder.start(ch);
                    self.info(format!("recording @{ch}"));
                }
                _ => self.cancel_pending(),
            },
            Pending::MacroRun => match key.as_char() {
                Some(ch) => self.run_macro(ch),
                None => self.cancel_pending(),
            },
        }
    }

    // -- Motions ------------------------------------------------------------

    /// Move the cursor by a motion (Normal and Visual).
    pub(super) fn run_motion(&mut self, motion: Motion) {
        let count = self.take_count();
        if self.mode.is_visual() {
            self.block_eol = motion == Motion::LineEnd;
        } else {
            self.register = None;
        }
        match self.eval_motion(motion, count, false) {
            Ok(Some(target)) => self.goto_target(target),
            Ok(None) => self.motion_failed(),
            Err(err) => self.error(&err),
        }
    }

    /// A motion that cannot move aborts macro and `:normal` playback.
    pub(super) fn motion_failed(&mut self) {
        trace!("motion failed");
        self.mapper.discard(KeyOrigin::Replay);
    }

    pub(super) fn goto_target(&mut self, target: Target) {
        if target.jump {
            self.record_jump();
        }
        self.cursor = target.cursor;
        self.clamp_cursor();
    }

    fn motion_or_operator(&mut self, motion: Motion, op: Option<OpPending>) {
        match op {
            Some(op) => self.apply_motion_operator(op, motion),
            None => self.run_motion(motion),
        }
    }

    /// Where `motion` goes from the cursor. `Ok(None)` when it cannot move
    /// (no matching bracket, char not found on the line).
    ///
    /// Operators may put the far end just past a line's last char.
    pub(super) fn eval_motion(
        &mut self,
        motion: Motion,
        count: Option<usize>,
        for_operator: bool,
    ) -> Result<Option<Target>> {
        let n = count.unwrap_or(1).max(1);
        match motion {
            Motion::SearchNext { reverse } => return self.search_next(reverse, n).map(Some),
            Motion::SearchWord { forward } => return self.search_word(forward, n).map(Some),
            Motion::Mark { name, exact } => return self.mark_target(name, exact).map(Some),
            Motion::FindChar(ch, find) => {
                self.last_char_find = Some((ch, find));
                return Ok(self.char_find_target(ch, find, n, false));
            }
            Motion::RepeatFind { reverse } => {
                let Some((ch, find)) = self.last_char_find else {
                    return Ok(None);
                };
                let find = if reverse { find.reversed() } else { find };
                return Ok(self.char_find_target(ch, find, n, true));
            }
            _ => {}
        }

        let pe = for_operator;
        let buf: &dyn TextBuffer = &self.buffer;
        let mut c = self.cursor.clone();
        let mut jump = false;
        let kind = match motion {
            Motion::Left => {
                c.move_left(n, buf, pe);
                MotionKind::Exclusive
            }
            Motion::Right => {
                c.move_right(n, buf, pe);
                MotionKind::Exclusive
            }
            Motion::WrapLeft => {
                let mut pos = c.position();
                for _ in 0..n {
                    if pos.col > 0 {
                        pos.col -= 1;
                    } else if pos.line > 0 {
                        pos = Position::new(pos.line - 1, cursor::max_col_for_line(buf, pos.line - 1, pe));
                    }
                }
                c.set_position(pos, buf, pe);
                MotionKind::Exclusive
            }
            Motion::WrapRight => {
                let mut pos = c.position();
                for _ in 0..n {
                    if pos.col < cursor::max_col_for_line(buf, pos.line, pe) {
                        pos.col += 1;
                    } else if pos.line < buf.last_line() {
                        pos = Position::new(pos.line + 1, 0);
                    }
                }
                c.set_position(pos, buf, pe);
                MotionKind::Exclusive
            }
            Motion::Up => {
                if c.line() == 0 {
                    return Ok(None);
                }
                c.move_up(n, buf, pe);
                MotionKind::LineWise
            }
            Motion::Down => {
                if c.line() == buf.last_line() {
                    return Ok(None);
                }
                c.move_down(n, buf, pe);
                MotionKind::LineWise
            }
            Motion::LineStart => {
                c.move_to_line_start();
                MotionKind::Exclusive
            }
            Motion::FirstNonBlank => {
                c.move_to_first_non_blank(buf, pe);
                MotionKind::Exclusive
            }
            Motion::LineEnd => {
                c.move_down(n - 1, buf, false);
                c.move_to_line_end(buf, false);
                MotionKind::Inclusive
            }
            Motion::LastNonBlank => {
                c.move_down(n - 1, buf, false);
                let text = buf.line_text(c.line());
                let col = text.trim_end().chars().count().saturating_sub(1);
                c.set_position(Position::new(c.line(), col), buf, false);
                MotionKind::Inclusive
            }
            Motion::Column => {
                c.move_to_column(n, buf, pe);
                MotionKind::Exclusive
            }
            Motion::WordForward { big } => {
                let f = if big { word::big_word_forward } else { word::word_forward };
                c.word_motion(f, n, buf, pe);
                MotionKind::Exclusive
            }
            Motion::WordBackward { big } => {
                let f = if big { word::big_word_backward } else { word::word_backward };
                c.word_motion(f, n, buf, pe);
                MotionKind::Exclusive
            }
            Motion::WordEnd { big } => {
                let f = if big { word::big_word_end_forward } else { word::word_end_forward };
                c.word_motion(f, n, buf, pe);
                MotionKind::Inclusive
            }
            Motion::WordEndBackward { big } => {
                let f = if big { word::big_word_end_backward } else { word::word_end_backward };
                c.word_motion(f, n, buf, pe);
                MotionKind::Inclusive
            }
            Motion::GotoLine | Motion::FirstLine => {
                let default = if motion == Motion::GotoLine { buf.last_line() } else { 0 };
                let line = count.map_or(default, |n| n.saturating_sub(1)).min(buf.last_line());
                c.set_position(Position::new(line, 0), buf, pe);
                c.move_to_first_non_blank(buf, pe);
                jump = true;
                MotionKind::LineWise
            }
            Motion::ParagraphForward => {
                c.paragraph_forward(n, buf);
                jump = true;
                MotionKind::Exclusive
            }
            Motion::ParagraphBackward => {
                c.paragraph_backward(n, buf);
                jump = true;
                MotionKind::Exclusive
            }
            Motion::MatchPair => {
                jump = true;
                if let Some(percent) = count {
                    // `N%`: line at N percent of the file.
                    let line = (percent.min(100) * buf.line_count()).div_ceil(100);
                    c.set_position(Position::new(line.saturating_sub(1), 0), buf, pe);
                    c.move_to_first_non_blank(buf, pe);
                    MotionKind::LineWise
                } else {
                    let Some(pos) = text_object::matching_bracket(buf, c.position()) else {
                        return Ok(None);
                    };
                    c.set_position(pos, buf, pe);
                    MotionKind::Inclusive
                }
            }
            Motion::NextLineStart | Motion::PrevLineStart | Motion::CurrentLineStart => {
                match motion {
                    Motion::NextLineStart => c.move_down(n, buf, pe),
                    Motion::PrevLineStart => c.move_up(n, buf, pe),
                    _ => c.move_down(n - 1, buf, pe),
                }
                c.move_to_first_non_blank(buf, pe);
                MotionKind::LineWise
            }
            Motion::SearchNext { .. }
            | Motion::SearchWord { .. }
            | Motion::Mark { .. }
            | Motion::FindChar(..)
            | Motion::RepeatFind { .. } => return Ok(None),
        };
        Ok(Some(Target { cursor: c, kind, jump }))
    }

    fn char_find_target(&self, ch: char, find: CharFind, n: usize, repeat: bool) -> Option<Target> {
        let buf: &dyn TextBuffer = &self.buffer;
        let mut c = self.cursor.clone();
        let kind = if find.forward { MotionKind::Inclusive } else { MotionKind::Exclusive };
        // A repeated `t`/`T` looks past the char it already stopped at.
        if repeat && find.till {
            let pos = c.position();
            let col = if find.forward {
                cursor::find_on_line_forward(buf, pos.line, pos.col + 1, ch, n)
                    .map(|col| col - 1)
                    .filter(|&col| col > pos.col)
            } else {
                cursor::find_on_line_backward(buf, pos.line, pos.col.saturating_sub(1), ch, n)
                    .map(|col| col + 1)
                    .filter(|&col| col < pos.col)
            };
            return col.map(|col| {
                c.set_position(Position::new(pos.line, col), buf, true);
                Target { cursor: c, kind, jump: false }
            });
        }
        let found = match (find.forward, find.till) {
            (true, false) => c.char_find_forward(buf, ch, n),
            (true, true) => c.char_till_forward(buf, ch, n),
            (false, false) => c.char_find_backward(buf, ch, n),
            (false, true) => c.char_till_backward(buf, ch, n),
        };
        found.then(|| Target { cursor: c, kind, jump: false })
    }

    fn mark_target(&self, name: char, exact: bool) -> Result<Target> {
        if !Marks::is_readable(name) {
            return Err(ViError::InvalidMark);
        }
        let pos = self.marks.get(name).ok_or(ViError::MarkNotSet)?;
        let mut c = self.cursor.clone();
        c.set_position(pos, &self.buffer, false);
        if !exact {
            c.move_to_first_non_blank(&self.buffer, false);
        }
        Ok(Target {
            cursor: c,
            kind: if exact { MotionKind::Exclusive } else { MotionKind::LineWise },
            jump: true,
        })
    }

    // -- Searching ----------------------------------------------------------

    fn search_next(&mut self, reverse: bool, n: usize) -> Result<Target> {
        let params = self
            .session
            .borrow()
            .last_search
            .clone()
            .ok_or(ViError::NoPreviousPattern)?;
        let direction = if reverse { params.direction.opposite() } else { params.direction };
        self.hlsearch_active = true;
        self.search_target(&params, direction, n)
    }

    /// `*` and `#`: whole-word search for the keyword under the cursor.
    fn search_word(&mut self, forward: bool, n: usize) -> Result<Target> {
        let (word, col) =
            word::keyword_at(&self.buffer, self.cursor.position()).ok_or(ViError::NoStringUnderCursor)?;
        let pat = format!("\\<{}\\>", pattern::escape_literal(&word));
        let direction = if forward { SearchDirection::Forward } else { SearchDirection::Backward };
        let ignorecase = self.session.borrow().options.ignorecase;
        let params = SearchParams::new(&pat, direction, ignorecase, false)?;
        self.session.borrow_mut().record_search(params.clone(), &pat);
        self.hlsearch_active = true;

        // Search from the word's start so `#` skips the word itself.
        let saved = self.cursor.clone();
        let start = Position::new(self.cursor.line(), col);
        self.cursor.set_position(start, &self.buffer, false);
        let target = self.search_target(&params, direction, n);
        self.cursor = saved;
        target
    }

    /// Run `params` from the cursor.
    pub(super) fn search_target(
        &mut self,
        params: &SearchParams,
        direction: SearchDirection,
        n: usize,
    ) -> Result<Target> {
        let re = params.regex()?;
        let wrapscan = self.session.borrow().options.wrapscan;
        let found = search::find_pattern(
            &self.buffer,
            &re,
            &params.pattern,
            self.cursor.position(),
            direction,
            n,
            wrapscan,
        )?;
        if found.wrapped {
            self.info(match direction {
                SearchDirection::Forward => "search hit BOTTOM, continuing at TOP",
                SearchDirection::Backward => "search hit TOP, continuing at BOTTOM",
            });
        }
        let mut c = self.cursor.clone();
        c.set_position(found.cursor(&self.buffer, params.to_end), &self.buffer, true);
        Ok(Target {
            cursor: c,
            kind: if params.to_end { MotionKind::Inclusive } else { MotionKind::Exclusive },
            jump: true,
        })
    }

    // -- Operators ----------------------------------------------------------

    pub(super) fn begin_operator(&mut self, op: Operator, key: KeyEvent, record: bool) {
        let count = self.take_count();
        if record && op != Operator::Yank {
            self.change.start(key, count, self.register);
        }
        self.pending = Some(Pending::Operator(OpPending { op, count }));
    }

    fn operator_key(&mut self, op: OpPending, key: KeyEvent) {
        if self.count_digit(key) {
            self.pending = Some(Pending::Operator(op));
            return;
        }
        let Some(ch) = key.as_char() else {
            match Motion::from_key(key) {
                Some(motion) => self.apply_motion_operator(op, motion),
                None => self.cancel_pending(),
            }
            return;
        };
        if ch == op.op.doubling_key() {
            self.apply_linewise_operator(op);
            return;
        }
        if let Some(find) = CharFind::from_char(ch) {
            self.pending = Some(Pending::CharFind(find, Some(op)));
            return;
        }
        match ch {
            'i' | 'a' => {
                self.pending = Some(Pending::TextObject { around: ch == 'a', op: Some(op) });
            }
            'g' => self.pending = Some(Pending::G(Some(op))),
            '\'' | '`' => self.pending = Some(Pending::Mark { exact: ch == '`', op: Some(op) }),
            '/' => self.open_search(SearchDirection::Forward, Some(op)),
            '?' => self.open_search(SearchDirection::Backward, Some(op)),
            _ => match Motion::from_char(ch) {
                Some(motion) => self.apply_motion_operator(op, motion),
                None => self.cancel_pending(),
            },
        }
    }

    /// The motion count, folded into the operator count.
    pub(super) fn operator_count(&mut self, op: OpPending) -> Option<usize> {
        let motion_count = self.take_count();
        self.change.merge_count(motion_count);
        merge_counts(op.count, motion_count)
    }

    /// `dd`, `3yy`, `>>`, `g~~`.
    fn apply_linewise_operator(&mut self, op: OpPending) {
        let n = self.operator_count(op).unwrap_or(1);
        let first = self.cursor.line();
        let last = (first + n - 1).min(self.buffer.last_line());
        self.finish_operator(op.op, Region::Lines { first, last });
    }

    fn apply_motion_operator(&mut self, op: OpPending, motion: Motion) {
        let count = self.operator_count(op);
        let start = self.cursor.position();
        let target = match motion {
            Motion::WordForward { big } if op.op == Operator::Change => {
                match self.change_word_target(big, count) {
                    Some(target) => Ok(Some(target)),
                    None => self.eval_motion(motion, count, true),
                }
            }
            _ => self.eval_motion(motion, count, true),
        };
        match target {
            Ok(Some(target)) => {
                let word_forward = matches!(motion, Motion::WordForward { .. });
                self.operate_on_target(op.op, start, target, word_forward);
            }
            Ok(None) => {
                self.cancel_pending();
                self.motion_failed();
            }
            Err(err) => {
                self.cancel_pending();
                self.error(&err);
            }
        }
    }

    /// Apply `op` from `start` to where a motion landed.
    pub(super) fn operate_on_target(&mut self, op: Operator, start: Position, target: Target, word_forward: bool) {
        let end = target.cursor.position();
        let range = MotionRange::new(start, end, target.kind).normalized();
        let region = self.motion_region(range, word_forward);
        self.finish_operator(op, region);
    }

    pub(super) fn finish_operator(&mut self, op: Operator, region: Region) {
        self.apply_operator(op, region, 1);
        self.register = None;
        if !matches!(self.mode, Mode::Insert | Mode::Replace) {
            self.finish_change();
        }
    }

    /// Turn a motion range into the text an operator acts on, with Vi's
    /// exclusive-motion adjustments.
    fn motion_region(&self, range: MotionRange, word_forward: bool) -> Region {
        let MotionRange { start, mut end, kind } = range;
        let buf: &dyn TextBuffer = &self.buffer;
        match kind {
            MotionKind::LineWise => Region::Lines { first: start.line, last: end.line },
            MotionKind::Inclusive => {
                let len = buf.line_len(end.line);
                Region::Chars(Range::new(start, Position::new(end.line, (end.col + 1).min(len))))
            }
            MotionKind::Exclusive => {
                if word_forward {
                    if end == start {
                        // `dw` on the last word of the buffer.
                        end = Position::new(start.line, buf.line_len(start.line));
                    } else if end.line > start.line && end.col <= cursor::first_non_blank_col(buf, end.line) {
                        // `w` stops at the end of the line it leaves.
                        let prev = end.line - 1;
                        end = Position::new(prev, buf.line_len(prev));
                    }
                }
                if end.line > start.line && end.col == 0 {
                    let prev = end.line - 1;
                    if start.col <= cursor::first_non_blank_col(buf, start.line) {
                        return Region::Lines { first: start.line, last: prev };
                    }
                    end = Position::new(prev, buf.line_len(prev));
                }
                Region::Chars(Range::new(start, end))
            }
        }
    }

    /// `cw` acts like `ce`, and stays on a word's last char.
    fn change_word_target(&self, big: bool, count: Option<usize>) -> Option<Target> {
        let buf: &dyn TextBuffer = &self.buffer;
        let pos = self.cursor.position();
        let ch = buf.char_at(pos)?;
        if ch.is_whitespace() {
            return None;
        }
        let class = if big { word::classify_big } else { word::classify };
        let end_fn = if big { word::big_word_end_forward } else { word::word_end_forward };
        let at_word_end = |p: Position| {
            let here = buf.char_at(p).map(class);
            let next = buf.char_at(Position::new(p.line, p.col + 1)).map(class);
            here.is_some() && next != here
        };
        let mut end = pos;
        for i in 0..count.unwrap_or(1).max(1) {
            if i == 0 && at_word_end(end) {
                continue;
            }
            end = end_fn(buf, end);
        }
        let mut c = self.cursor.clone();
        c.set_position(end, buf, true);
        Some(Target { cursor: c, kind: MotionKind::Inclusive, jump: false })
    }

    fn text_object_key(&mut self, around: bool, op: Option<OpPending>, key: KeyEvent) {
        let Some(kind) = key.as_char().and_then(ObjectKind::from_char) else {
            self.cancel_pending();
            return;
        };
        let count = match op {
            Some(op) => self.operator_count(op),
            None => self.take_count(),
        };
        let here = self.cursor.position();
        let Some(range) = text_object::select(&self.buffer, here, kind, around, count.unwrap_or(1)) else {
            self.cancel_pending();
            return;
        };
        match op {
            Some(op) => self.finish_operator(op.op, Region::Chars(range)),
            None => {
                if range.is_empty() {
                    return;
                }
                let last = self
                    .buffer
                    .pos_to_index(range.end)
                    .and_then(|idx| idx.checked_sub(1))
                    .and_then(|idx| self.buffer.index_to_pos(idx))
                    .unwrap_or(range.start);
                self.cursor.set_anchor_at(range.start);
                self.cursor.set_position(last, &self.buffer, false);
            }
        }
    }

    fn g_key(&mut self, op: Option<OpPending>, key: KeyEvent) {
        let Some(ch) = key.as_char() else {
            self.cancel_pending();
            return;
        };
        if let Some(motion) = Motion::from_g(ch) {
            if op.is_none() && self.mode == Mode::Normal {
                self.change.cancel();
            }
            self.motion_or_operator(motion, op);
            return;
        }
        if let Some(op) = op {
            // `g~g~`, `gugu`, `gUgU`.
            if Operator::from_g_char(ch) == Some(op.op) {
                self.apply_linewise_operator(op);
            } else {
                self.cancel_pending();
            }
            return;
        }
        if self.mode.is_visual() {
            self.visual_g(ch);
            return;
        }
        match ch {
            '~' | 'u' | 'U' => {
                if let Some(op) = Operator::from_g_char(ch) {
                    self.begin_operator(op, key, false);
                }
            }
            'J' => {
                let n = self.take_count().unwrap_or(2).max(2);
                if self.join_lines(self.cursor.line(), n, false) {
                    self.finish_change();
                } else {
                    self.change.cancel();
                }
            }
            'p' | 'P' => {
                let n = self.take_count().unwrap_or(1);
                if self.paste(ch == 'p', n, true) {
                    self.finish_change();
                } else {
                    self.change.cancel();
                }
            }
            'v' => {
                self.change.cancel();
                self.reselect();
            }
            'i' => {
                let count = self.take_count();
                self.change.start(KeyEvent::char('g'), count, None);
                self.change.push(key);
                let at = self.marks.get('^').unwrap_or_else(|| self.cursor.position());
                self.start_insert(at, count.unwrap_or(1), InsertKind::Plain);
            }
            _ => self.cancel_pending(),
        }
    }

    // -- One-key changes ----------------------------------------------------

    fn insert_command(&mut self, ch: char, key: KeyEvent) {
        let count = self.take_count();
        self.change.start(key, count, self.register);
        self.register = None;
        let n = count.unwrap_or(1);
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        match ch {
            'a' => self.start_insert(Position::new(pos.line, (pos.col + 1).min(len)), n, InsertKind::Plain),
            'I' => {
                let col = cursor::first_non_blank_col(&self.buffer, pos.line);
                self.start_insert(Position::new(pos.line, col), n, InsertKind::Plain);
            }
            'A' => self.start_insert(Position::new(pos.line, len), n, InsertKind::Plain),
            'o' => {
                self.begin_edit();
                self.insert_text(Position::new(pos.line, len), "\n");
                self.start_insert(Position::new(pos.line + 1, 0), n, InsertKind::OpenLine);
                self.end_edit();
            }
            'O' => {
                self.begin_edit();
                self.insert_text(Position::new(pos.line, 0), "\n");
                self.start_insert(Position::new(pos.line, 0), n, InsertKind::OpenLine);
                self.end_edit();
            }
            'R' => self.start_replace(pos),
            _ => self.start_insert(pos, n, InsertKind::Plain),
        }
    }

    /// `x` and `X`.
    fn delete_chars(&mut self, key: KeyEvent, forward: bool) {
        let count = self.take_count();
        let n = count.unwrap_or(1);
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        let range = if forward {
            if len == 0 {
                self.register = None;
                return;
            }
            Range::new(pos, Position::new(pos.line, (pos.col + n).min(len)))
        } else {
            if pos.col == 0 {
                self.register = None;
                return;
            }
            Range::new(Position::new(pos.line, pos.col.saturating_sub(n)), pos)
        };
        let register = self.register;
        self.apply_operator(Operator::Delete, Region::Chars(range), 1);
        if let Some(change) = self.change.immediate(key, count, register) {
            self.session.borrow_mut().last_change = Some(change);
        }
    }

    /// `D` and `C`: to the end of the line, plus count-1 more lines.
    fn to_line_end(&mut self, key: KeyEvent, change: bool) {
        let count = self.take_count();
        let pos = self.cursor.position();
        let last = (pos.line + count.unwrap_or(1) - 1).min(self.buffer.last_line());
        let end = Position::new(last, self.buffer.line_len(last));
        let op = if change { Operator::Change } else { Operator::Delete };
        self.change.start(key, count, self.register);
        self.finish_operator(op, Region::Chars(Range::new(pos, end)));
    }

    /// `s`: change count chars.
    fn substitute_chars(&mut self, key: KeyEvent) {
        let count = self.take_count();
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        let end = Position::new(pos.line, (pos.col + count.unwrap_or(1)).min(len));
        self.change.start(key, count, self.register);
        self.finish_operator(Operator::Change, Region::Chars(Range::new(pos, end)));
    }

    /// `S`: change whole lines.
    fn substitute_lines(&mut self, key: KeyEvent) {
        let count = self.take_count();
        let first = self.cursor.line();
        let last = (first + count.unwrap_or(1) - 1).min(self.buffer.last_line());
        self.change.start(key, count, self.register);
        self.finish_operator(Operator::Change, Region::Lines { first, last });
    }

    /// `~`: toggle case and move right.
    fn toggle_case_chars(&mut self, key: KeyEvent) {
        let count = self.take_count();
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        if len == 0 {
            return;
        }
        let end = (pos.col + count.unwrap_or(1)).min(len);
        let range = Range::new(pos, Position::new(pos.line, end));
        self.apply_operator(Operator::ToggleCase, Region::Chars(range), 1);
        self.move_cursor(Position::new(pos.line, end));
        self.immediate_change(key, count);
    }

    /// `r{c}`: replace count chars; `r<CR>` splits the line.
    fn replace_chars(&mut self, key: KeyEvent) {
        let n = self.take_count().unwrap_or(1);
        let ch = match key.code {
            KeyCode::Enter => '\n',
            _ => match literal_char(key) {
                Some(ch) => ch,
                None => {
                    self.cancel_pending();
                    return;
                }
            },
        };
        let pos = self.cursor.position();
        if pos.col + n > self.buffer.line_len(pos.line) {
            self.cancel_pending();
            return;
        }
        self.begin_edit();
        self.remove_text(Range::new(pos, Position::new(pos.line, pos.col + n)));
        if ch == '\n' {
            self.insert_text(pos, "\n");
            self.move_cursor(Position::new(pos.line + 1, 0));
        } else {
            let text: String = std::iter::repeat_n(ch, n).collect();
            self.insert_text(pos, &text);
            self.move_cursor(Position::new(pos.line, pos.col + n - 1));
        }
        self.end_edit();
        let here = self.cursor.position();
        self.set_change_marks(pos, here);
        self.register = None;
        self.finish_change();
    }

    // -- Repeat, undo, jumps ------------------------------------------------

    /// `.`: replay the last change. A new count replaces the stored one.
    fn repeat_change(&mut self) {
        let Some(change) = self.session.borrow().last_change.clone() else {
            return;
        };
        let count = self.take_count();
        if count.is_some()
            && let Some(last) = self.session.borrow_mut().last_change.as_mut()
        {
            last.count = count;
        }
        debug!(keys = change.keys.len(), ?count, "repeat");
        self.count = count.or(change.count);
        self.register = self.register.or(change.register);
        self.change.set_replaying(true);
        for key in &change.keys {
            self.dispatch(*key);
        }
        self.change.set_replaying(false);
    }

    pub(super) fn undo(&mut self, n: usize) {
        for i in 0..n {
            match self.buffer.undo() {
                Some(pos) => self.move_cursor(pos),
                None => {
                    if i == 0 {
                        self.info("Already at oldest change");
                    }
                    break;
                }
            }
        }
        self.clamp_cursor();
    }

    pub(super) fn redo(&mut self, n: usize) {
        for i in 0..n {
            match self.buffer.redo() {
                Some(pos) => self.move_cursor(pos),
                None => {
                    if i == 0 {
                        self.info("Already at newest change");
                    }
                    break;
                }
            }
        }
        self.clamp_cursor();
    }

    fn jump_older(&mut self, n: usize) {
        let mut here = self.cursor.position();
        let mut moved = false;
        for _ in 0..n {
            match self.jumps.prev(here) {
                Some(pos) => {
                    here = pos;
                    moved = true;
                }
                None => break,
            }
        }
        if moved {
            self.move_cursor(here);
        }
    }

    fn jump_newer(&mut self, n: usize) {
        let mut target = None;
        for _ in 0..n {
            match self.jumps.next() {
                Some(pos) => target = Some(pos),
                None => break,
            }
        }
        if let Some(pos) = target {
            self.move_cursor(pos);
        }
    }

    // -- Macros -------------------------------------------------------------

    fn stop_macro(&mut self) {
        let Some((register, keys)) = self.macro_recorder.stop() else {
            return;
        };
        debug!(%register, keys = %keys, "macro recorded");
        let result = self
            .session
            .borrow_mut()
            .registers
            .set(register, &keys, OperationMode::CharWise, false);
        if let Err(err) = result {
            self.error(&err);
        }
    }

    /// `@x`, `@@`, `@:`. The register's keys go to the front of the input
    /// queue, count times.
    fn run_macro(&mut self, ch: char) {
        let count = self.take_count().unwrap_or(1);
        let name = if ch == '@' {
            let last = self.session.borrow().last_macro;
            match last {
                Some(name) => name,
                None => {
                    self.cancel_pending();
                    self.error(&ViError::EmptyRegister('@'));
                    return;
                }
            }
        } else {
            ch
        };
        self.session.borrow_mut().last_macro = Some(name);

        if name == ':' {
            let line = self.session.borrow_mut().registers.get(':').map(|r| r.content().to_string());
            match line {
                Ok(line) if !line.is_empty() => {
                    for _ in 0..count {
                        self.execute(&line);
                    }
                }
                Ok(_) => self.error(&ViError::EmptyRegister(':')),
                Err(err) => self.error(&err),
            }
            return;
        }

        self.macro_runs += 1;
        let limit = self.session.borrow().options.maxmapdepth;
        if self.macro_runs > limit {
            warn!(register = %name, limit, "macro recursion too deep");
            self.mapper.discard(KeyOrigin::Replay);
            return;
        }
        let content = self.session.borrow_mut().registers.get_nonempty(name);
        let content = match content {
            Ok(register) => register.content().to_string(),
            Err(err) => {
                self.error(&err);
                return;
            }
        };
        let keys: Vec<KeyEvent> = parse_keys(&content)
            .into_iter()
            .map(|key| if key.is_char('\n') { KeyEvent::enter() } else { key })
            .collect();
        let all: Vec<KeyEvent> = std::iter::repeat_n(keys, count).flatten().collect();
        debug!(register = %name, keys = all.len(), "run macro");
        self.mapper.push_front(&all, KeyOrigin::Replay, true);
    }
}

/// The char a literal-argument key stands for (`f<Tab>`, `r<Space>`).
pub(super) fn literal_char(key: KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Tab => Some('\t'),
        _ => key.as_char(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::{p, run};
    use crate::editor::Status;
    use crate::mode::Mode;
    use pretty_assertions::assert_eq;

    // -- Motions ------------------------------------------------------------

    #[test]
    fn counted_motions() {
        let (_, ed) = run("one two three four", "2w");
        assert_eq!(ed.cursor(), p(0, 8));
        let (_, ed) = run("a\nb\nc\nd", "2jk");
        assert_eq!(ed.cursor(), p(1, 0));
    }

    #[test]
    fn zero_is_a_motion_unless_counting() {
        let (_, ed) = run("abcdef", "$0");
        assert_eq!(ed.cursor(), p(0, 0));
        let (_, ed) = run(&"x\n".repeat(12), "10G");
        assert_eq!(ed.cursor(), p(9, 0));
    }

    #[test]
    fn dollar_sticks_to_line_end() {
        let (_, ed) = run("short\nmuch longer line\nab", "$jj");
        assert_eq!(ed.cursor(), p(2, 1));
    }

    #[test]
    fn find_and_repeat() {
        let (_, ed) = run("a,b,c,d", "f,;");
        assert_eq!(ed.cursor(), p(0, 3));
        let (_, ed) = run("a,b,c,d", "$F,;,");
        assert_eq!(ed.cursor(), p(0, 5));
    }

    #[test]
    fn till_repeat_skips_adjacent_target() {
        let (_, ed) = run("ab,cd,ef", "t,;");
        assert_eq!(ed.cursor(), p(0, 4));
        let (_, ed) = run("ab,,c", "t,;");
        assert_eq!(ed.cursor(), p(0, 2));
    }

    #[test]
    fn percent_jumps_to_match() {
        let (_, ed) = run("if (a (b)) x", "%");
        assert_eq!(ed.cursor(), p(0, 9));
        assert_eq!(ed.jumps().entries(), &[p(0, 0)]);
    }

    #[test]
    fn star_searches_whole_word() {
        let (_, ed) = run("foo food foo", "*");
        assert_eq!(ed.cursor(), p(0, 9));
        let session = ed.session();
        let last = session.borrow().last_search.clone().unwrap();
        assert_eq!(last.pattern, "\\<foo\\>");
    }

    #[test]
    fn mark_jump_and_back() {
        let (_, ed) = run("one\n  two\nthree", "jmaG'a");
        assert_eq!(ed.cursor(), p(1, 2));
        let (_, ed) = run("one\n  two\nthree", "jllmaG`a");
        assert_eq!(ed.cursor(), p(1, 2));
        let (_, ed) = run("one\ntwo\nthree", "G''");
        assert_eq!(ed.cursor(), p(0, 0));
    }

    #[test]
    fn unset_mark_is_an_error() {
        let (_, ed) = run("one", "'z");
        assert!(ed.status().is_some_and(Status::is_error));
    }

    // -- Operators ----------------------------------------------------------

    #[test]
    fn delete_word_and_line() {
        assert_eq!(run("one two three", "dw").0, "two three");
        assert_eq!(run("one\ntwo\nthree", "jdd").0, "one\nthree");
        assert_eq!(run("one\ntwo\nthree", "2dd").0, "three");
        assert_eq!(run("a\nb\nc\nd", "d2j").0, "d");
    }

    #[test]
    fn counts_multiply() {
        assert_eq!(run("1 2 3 4 5 6 7", "2d3w").0, "7");
    }

    #[test]
    fn dw_stops_at_line_end() {
        assert_eq!(run("foo bar\nbaz", "wdw").0, "foo \nbaz");
        assert_eq!(run("last", "dw").0, "");
    }

    #[test]
    fn change_word_keeps_trailing_space() {
        let (text, ed) = run("foo bar", "cwxy<Esc>");
        assert_eq!(text, "xy bar");
        assert_eq!(ed.mode(), Mode::Normal);
        assert_eq!(run("a b c", "c2wX<Esc>").0, "X c");
    }

    #[test]
    fn delete_to_char() {
        assert_eq!(run("abc(def)", "dt(").0, "(def)");
        assert_eq!(run("abc(def)", "df(").0, "def)");
        assert_eq!(run("abc(def)", "$dF(").0, "abc)");
    }

    #[test]
    fn text_object_operators() {
        assert_eq!(run("say \"hello there\" ok", "fhci\"bye<Esc>").0, "say \"bye\" ok");
        assert_eq!(run("f(a, (b))", "fadi(").0, "f()");
        assert_eq!(run("one two three", "wdaw").0, "one three");
    }

    #[test]
    fn yank_and_put() {
        assert_eq!(run("one\ntwo", "yyp").0, "one\none\ntwo");
        assert_eq!(run("one\ntwo", "jyyP").0, "one\ntwo\ntwo");
        assert_eq!(run("abc", "ylp").0, "aabc");
        assert_eq!(run("abc", "x$p").0, "bca");
    }

    #[test]
    fn named_registers() {
        let (text, ed) = run("one\ntwo\nthree", "\"ayyj\"Ayyj\"ap");
        assert_eq!(text, "one\ntwo\nthree\none\ntwo");
        let session = ed.session();
        assert_eq!(session.borrow_mut().registers.get('a').unwrap().content(), "one\ntwo\n");
    }

    #[test]
    fn deletes_feed_numbered_registers() {
        let (_, ed) = run("a\nb\nc", "dddd");
        let session = ed.session();
        let mut session = session.borrow_mut();
        assert_eq!(session.registers.get('0').unwrap().content(), "b\n");
        assert_eq!(session.registers.get('1').unwrap().content(), "a\n");
    }

    #[test]
    fn black_hole_keeps_unnamed() {
        assert_eq!(run("one\ntwo", "yyj\"_ddp").0, "one\none");
    }

    #[test]
    fn shift_and_case_operators() {
        assert_eq!(run("a\nb", ">j").0, "    a\n    b");
        assert_eq!(run("    a", "<<").0, "a");
        assert_eq!(run("hello world", "gUiw").0, "HELLO world");
        assert_eq!(run("Hello", "g~~").0, "hELLO");
        assert_eq!(run("ABC", "guu").0, "abc");
    }

    #[test]
    fn exclusive_motion_to_column_zero_is_linewise() {
        assert_eq!(run("one\ntwo\n\nfour", "d}").0, "\nfour");
    }

    // -- One-key commands ---------------------------------------------------

    #[test]
    fn x_and_friends() {
        assert_eq!(run("abcdef", "3x").0, "def");
        assert_eq!(run("abcdef", "$2X").0, "abcf");
        assert_eq!(run("abc def", "wD").0, "abc ");
        assert_eq!(run("abc def", "wCxyz<Esc>").0, "abc xyz");
        assert_eq!(run("abc", "2sX<Esc>").0, "Xc");
        assert_eq!(run("  abc\nd", "Sxy<Esc>").0, "xy\nd");
    }

    #[test]
    fn join_lines() {
        assert_eq!(run("a\n  b\nc", "J").0, "a b\nc");
        assert_eq!(run("a\nb\nc", "3J").0, "a b c");
        assert_eq!(run("a\n  b", "gJ").0, "a  b");
        assert_eq!(run("a", "J").0, "a");
    }

    #[test]
    fn replace_chars() {
        assert_eq!(run("abcd", "2rx").0, "xxcd");
        assert_eq!(run("ab cd", "llr<CR>").0, "ab\ncd");
        assert_eq!(run("ab", "5rx").0, "ab");
    }

    #[test]
    fn tilde_toggles_and_moves() {
        let (text, ed) = run("abc", "~~");
        assert_eq!(text, "ABc");
        assert_eq!(ed.cursor(), p(0, 2));
    }

    #[test]
    fn undo_and_redo() {
        let (text, ed) = run("one two", "dwdwuu");
        assert_eq!(text, "one two");
        assert_eq!(ed.cursor(), p(0, 0));
        assert_eq!(run("one two", "dwu<C-r>").0, "two");
    }

    #[test]
    fn undo_on_fresh_buffer_reports() {
        let (_, ed) = run("a", "u");
        assert_eq!(ed.status().map(Status::text), Some("Already at oldest change"));
    }

    #[test]
    fn jumplist_back_and_forth() {
        let (_, mut ed) = run("a\nb\nc\nd", "2G4Ggg");
        ed.feed_keys("<C-o>");
        assert_eq!(ed.cursor(), p(3, 0));
        ed.feed_keys("<C-o>");
        assert_eq!(ed.cursor(), p(1, 0));
        ed.feed_keys("<Tab>");
        assert_eq!(ed.cursor(), p(3, 0));
    }

    // -- Dot repeat ---------------------------------------------------------

    #[test]
    fn dot_repeats_last_change() {
        assert_eq!(run("a b c d", "dw.").0, "c d");
        assert_eq!(run("one\ntwo\nthree", "Ax<Esc>j.").0, "onex\ntwox\nthree");
        assert_eq!(run("abcdef", "x..").0, "def");
    }

    #[test]
    fn dot_with_new_count_replaces_old() {
        let (text, mut ed) = run("a b c d e f g", "2dw3.");
        assert_eq!(text, "f g");
        ed.feed_keys("u.");
        assert_eq!(ed.text(), "f g");
    }

    #[test]
    fn dot_keeps_operator_count() {
        assert_eq!(run("1\n2\n3\n4\n5", "2dd.").0, "5");
    }

    #[test]
    fn dot_repeats_counted_insert() {
        assert_eq!(run("", "3ia<Esc>.").0, "aaaaaa");
    }

    #[test]
    fn yank_is_not_a_change() {
        assert_eq!(run("a b c", "dwyw.").0, "c");
    }

    #[test]
    fn dot_repeats_replace_and_join() {
        assert_eq!(run("abcd", "rxl.").0, "xxcd");
        assert_eq!(run("a\nb\nc\nd", "J.").0, "a b c\nd");
        assert_eq!(run("a\nb\nc", "gJ.").0, "abc");
    }

    #[test]
    fn dot_repeats_paste() {
        assert_eq!(run("x", "yl2p.").0, "xxxxx");
    }

    #[test]
    fn motions_do_not_replace_the_change() {
        assert_eq!(run("a b c d", "dwgg.").0, "c d");
    }

    // -- Macros -------------------------------------------------------------

    #[test]
    fn macro_replays_like_typing() {
        let text = "1\n2\n3\n4\n5\n6\n7\n8\n9";
        let (typed, _) = run(text, "3dd3dd");
        let (replayed, ed) = run(text, "qa3ddq@a");
        assert_eq!(replayed, typed);
        let session = ed.session();
        assert_eq!(session.borrow_mut().registers.get('a').unwrap().content(), "3dd");
    }

    #[test]
    fn macro_count_and_repeat_last() {
        let (text, _) = run("a\nb\nc\nd\ne\nf", "qqddq2@q@@");
        assert_eq!(text, "e\nf");
    }

    #[test]
    fn repeat_last_macro_before_any_is_an_error() {
        let (text, ed) = run("a\nb", "@@j");
        assert_eq!(text, "a\nb");
        assert_eq!(ed.cursor().line, 1);
        assert!(ed.status().is_none());
        let (_, ed) = run("a", "@@");
        assert!(ed.status().is_some_and(Status::is_error));
    }

    #[test]
    fn macro_with_insert() {
        let (text, _) = run("a\nb\nc", "qwA!<Esc>jq2@w");
        assert_eq!(text, "a!\nb!\nc!");
    }

    #[test]
    fn recursive_macro_stops_at_last_line() {
        // `qaq` empties `a` so the recording's own `@a` does nothing yet.
        let (text, _) = run("1\n2\n3\n4", "qaqqaA.<Esc>j@aq@a");
        assert_eq!(text, "1.\n2.\n3.\n4.");
    }

    #[test]
    fn failed_motion_ends_macro() {
        // Replayed on the last line, the `j` fails before `A!` runs.
        let (text, _) = run("a\nb", "jqxjA!<Esc>q@x");
        assert_eq!(text, "a\nb!");
    }

    #[test]
    fn recording_shows_status() {
        let (_, ed) = run("a", "qz");
        assert_eq!(ed.recording(), Some('z'));
        assert_eq!(ed.status().map(Status::text), Some("recording @z"));
    }

    #[test]
    fn repeat_last_ex_command() {
        let (text, _) = run("a\nb\nc\nd", ":d<CR>@:");
        assert_eq!(text, "c\nd");
    }
}
