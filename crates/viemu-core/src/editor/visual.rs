//! Visual mode: the selection is the anchor plus the cursor, and
//! operators act on it directly.

use super::insert::InsertKind;
use super::normal::{CharFind, Motion, Pending, literal_char};
use super::operator::{Operator, Region};
use super::{Editor, VisualSnapshot};
use crate::cursor;
use crate::error::ViError;
use crate::host::TextBuffer;
use crate::key::{KeyCode, KeyEvent};
use crate::mode::{Mode, VisualKind};
use crate::position::{Position, Range};
use crate::register::{OperationMode, Register};
use crate::search::SearchDirection;

impl<B: TextBuffer> Editor<B> {
    /// `v`, `V`, `<C-v>` from Normal mode.
    pub(super) fn enter_visual(&mut self, kind: VisualKind) {
        self.count = None;
        self.cursor.set_anchor();
        self.block_eol = false;
        self.set_mode(Mode::Visual(kind));
    }

    /// Back to Normal, remembering the selection for `gv` and `'<`/`'>`.
    pub(super) fn leave_visual(&mut self) {
        let Mode::Visual(kind) = self.mode else { return };
        let pos = self.cursor.position();
        let anchor = self.cursor.anchor().unwrap_or(pos);
        self.last_visual = Some(VisualSnapshot { kind, anchor, cursor: pos, block_eol: self.block_eol });
        let Range { start, end } = Range::ordered(anchor, pos);
        let (first, last) = match kind {
            VisualKind::Char => (start, end),
            VisualKind::Line => {
                let len = self.buffer.line_len(end.line);
                (Position::new(start.line, 0), Position::new(end.line, len.saturating_sub(1)))
            }
            VisualKind::Block => (
                Position::new(start.line, anchor.col.min(pos.col)),
                Position::new(end.line, anchor.col.max(pos.col)),
            ),
        };
        self.set_mark('<', first);
        self.set_mark('>', last);
        self.cursor.clear_anchor();
        self.set_mode(Mode::Normal);
        self.clamp_cursor();
    }

    /// `gv`.
    pub(super) fn reselect(&mut self) {
        let Some(snapshot) = self.last_visual else {
            self.error(&ViError::MarkNotSet);
            return;
        };
        let anchor = cursor::clamp(snapshot.anchor, &self.buffer, false);
        self.cursor.set_anchor_at(anchor);
        self.cursor.set_position(snapshot.cursor, &self.buffer, false);
        self.block_eol = snapshot.block_eol;
        self.set_mode(Mode::Visual(snapshot.kind));
    }

    /// `v` in `V` switches kind; `v` in `v` leaves.
    fn toggle_visual(&mut self, kind: VisualKind) {
        if self.mode == Mode::Visual(kind) {
            self.leave_visual();
        } else {
            self.set_mode(Mode::Visual(kind));
        }
    }

    pub(super) fn visual_key(&mut self, kind: VisualKind, key: KeyEvent) {
        if let Some(pending) = self.pending.take() {
            self.pending_key(pending, key);
            return;
        }
        if self.count_digit(key) {
            return;
        }
        if key.code == KeyCode::Escape || key.is_ctrl('c') {
            self.count = None;
            self.register = None;
            self.leave_visual();
            return;
        }
        let Some(ch) = key.as_char() else {
            if key.is_ctrl('v') {
                self.toggle_visual(VisualKind::Block);
            } else if key.code == KeyCode::Delete {
                self.visual_operator(Operator::Delete);
            } else if let Some(motion) = Motion::from_key(key) {
                self.run_motion(motion);
            }
            return;
        };
        if let Some(find) = CharFind::from_char(ch) {
            self.pending = Some(Pending::CharFind(find, None));
            return;
        }
        match ch {
            'd' | 'x' => self.visual_operator(Operator::Delete),
            'c' | 's' => self.visual_operator(Operator::Change),
            'y' => self.visual_operator(Operator::Yank),
            '>' => self.visual_operator(Operator::ShiftRight),
            '<' => self.visual_operator(Operator::ShiftLeft),
            '~' => self.visual_operator(Operator::ToggleCase),
            'u' => self.visual_operator(Operator::Lower),
            'U' => self.visual_operator(Operator::Upper),
            'D' | 'X' | 'C' | 'S' | 'R' | 'Y' => self.visual_line_operator(kind, ch),
            'J' => self.visual_join(true),
            'r' => self.pending = Some(Pending::Replace),
            'p' | 'P' => self.visual_paste(ch == 'P'),
            ':' => {
                self.count = None;
                self.leave_visual();
                self.open_ex("'<,'>");
            }
            'o' => self.cursor.swap_anchor(),
            'O' => self.swap_block_corner(kind),
            'I' | 'A' => self.visual_insert(kind, ch == 'A'),
            'i' | 'a' => self.pending = Some(Pending::TextObject { around: ch == 'a', op: None }),
            'g' => self.pending = Some(Pending::G(None)),
            '\'' | '`' => self.pending = Some(Pending::Mark { exact: ch == '`', op: None }),
            '"' => self.pending = Some(Pending::Register),
            'v' => self.toggle_visual(VisualKind::Char),
            'V' => self.toggle_visual(VisualKind::Line),
            '/' => self.open_search(SearchDirection::Forward, None),
            '?' => self.open_search(SearchDirection::Backward, None),
            _ => {
                if let Some(motion) = Motion::from_char(ch) {
                    self.run_motion(motion);
                }
            }
        }
    }

    // -- Selection ----------------------------------------------------------

    /// The text the selection covers.
    pub(super) fn visual_region(&self) -> Region {
        let pos = self.cursor.position();
        let anchor = self.cursor.anchor().unwrap_or(pos);
        let Range { start, end } = Range::ordered(anchor, pos);
        match self.mode {
            Mode::Visual(VisualKind::Line) => Region::Lines { first: start.line, last: end.line },
            Mode::Visual(VisualKind::Block) => Region::Block {
                top: start.line,
                bottom: end.line,
                left: anchor.col.min(pos.col),
                right: (!self.block_eol).then(|| anchor.col.max(pos.col) + 1),
            },
            _ => Region::Chars(Range::new(start, self.char_after(end))),
        }
    }

    /// The position after the char at `pos`; the line break counts as a
    /// char.
    fn char_after(&self, pos: Position) -> Position {
        if pos.col < self.buffer.line_len(pos.line) {
            Position::new(pos.line, pos.col + 1)
        } else if pos.line < self.buffer.last_line() {
            Position::new(pos.line + 1, 0)
        } else {
            pos
        }
    }

    /// `O`: in a block, the other corner on the same line.
    fn swap_block_corner(&mut self, kind: VisualKind) {
        let pos = self.cursor.position();
        let Some(anchor) = self.cursor.anchor() else { return };
        if kind == VisualKind::Block {
            self.cursor.set_anchor_at(Position::new(anchor.line, pos.col));
            self.cursor.set_position(Position::new(pos.line, anchor.col), &self.buffer, false);
        } else {
            self.cursor.swap_anchor();
        }
    }

    // -- Operators ----------------------------------------------------------

    fn visual_operator(&mut self, op: Operator) {
        let amount = self.take_count().unwrap_or(1);
        let region = self.visual_region();
        self.leave_visual();
        self.apply_operator(op, region, amount);
        self.register = None;
    }

    /// `D`, `X`, `C`, `S`, `R`, `Y` act on whole lines, except `D` and `C`
    /// in a block, which run to the line ends.
    fn visual_line_operator(&mut self, kind: VisualKind, ch: char) {
        let op = match ch {
            'D' | 'X' => Operator::Delete,
            'Y' => Operator::Yank,
            _ => Operator::Change,
        };
        if kind == VisualKind::Block && matches!(ch, 'D' | 'C') {
            self.block_eol = true;
        } else {
            self.set_mode(Mode::Visual(VisualKind::Line));
        }
        self.visual_operator(op);
    }

    /// `g` commands that only exist in Visual mode.
    pub(super) fn visual_g(&mut self, ch: char) {
        match ch {
            '~' => self.visual_operator(Operator::ToggleCase),
            'u' => self.visual_operator(Operator::Lower),
            'U' => self.visual_operator(Operator::Upper),
            'J' => self.visual_join(false),
            'v' => self.reselect(),
            _ => self.cancel_pending(),
        }
    }

    /// `r{char}` over the whole selection.
    pub(super) fn visual_replace(&mut self, key: KeyEvent) {
        let Some(ch) = literal_char(key) else {
            self.cancel_pending();
            return;
        };
        let region = self.visual_region();
        self.leave_visual();
        self.transform_region(region, move |_| ch.to_string());
    }

    fn visual_join(&mut self, spaces: bool) {
        let pos = self.cursor.position();
        let anchor = self.cursor.anchor().unwrap_or(pos);
        let (first, last) = (anchor.line.min(pos.line), anchor.line.max(pos.line));
        self.count = None;
        self.leave_visual();
        if !self.join_lines(first, last - first + 1, spaces) {
            self.info("Cannot join the last line");
        }
    }

    /// `p`/`P`: the register replaces the selection. `p` leaves the
    /// replaced text in the unnamed register; `P` keeps registers as they
    /// were.
    fn visual_paste(&mut self, keep_registers: bool) {
        let name = self.register.take().unwrap_or('"');
        let count = self.take_count().unwrap_or(1);
        let register = self.session.borrow_mut().registers.get_nonempty(name);
        let register = match register {
            Ok(register) => register,
            Err(err) => {
                self.leave_visual();
                self.error(&err);
                return;
            }
        };
        let region = self.visual_region();
        self.leave_visual();
        self.begin_edit();
        self.register = keep_registers.then_some('_');
        self.delete_region(region);
        match (region, register.mode()) {
            (Region::Lines { first, .. }, mode) => {
                let register = if mode == OperationMode::LineWise {
                    register
                } else {
                    Register::new(register.content(), OperationMode::LineWise)
                };
                self.cursor.set_position(Position::new(first, 0), &self.buffer, true);
                self.put(&register, first > self.buffer.last_line(), count, false);
            }
            (Region::Chars(range), OperationMode::LineWise) => {
                self.insert_text(range.start, "\n");
                let line = range.start.line + 1;
                self.cursor.set_position(Position::new(line, 0), &self.buffer, true);
                self.put(&register, false, count, false);
            }
            (Region::Chars(range), _) => {
                self.cursor.set_position(range.start, &self.buffer, true);
                self.put(&register, false, count, false);
            }
            (Region::Block { top, left, .. }, _) => {
                self.cursor.set_position(Position::new(top, left), &self.buffer, true);
                self.put(&register, false, count, false);
            }
        }
        self.end_edit();
    }

    /// `I`/`A`: in a block, type on every line; otherwise insert before or
    /// after the selection.
    fn visual_insert(&mut self, kind: VisualKind, append: bool) {
        let region = self.visual_region();
        self.count = None;
        self.leave_visual();
        match region {
            Region::Block { top, bottom, left, right } if kind == VisualKind::Block => {
                let (col, eol, pad) = match (append, right) {
                    (false, _) => (left, false, false),
                    (true, None) => (self.buffer.line_len(top), true, false),
                    (true, Some(right)) => (right, false, true),
                };
                self.begin_edit();
                let len = self.buffer.line_len(top);
                if len < col {
                    self.insert_text(Position::new(top, len), &" ".repeat(col - len));
                }
                let kind = InsertKind::Block { top, bottom, col, eol, pad };
                self.start_insert(Position::new(top, col), 1, kind);
                self.end_edit();
            }
            Region::Lines { first, last } => {
                let pos = if append {
                    Position::new(last, self.buffer.line_len(last))
                } else {
                    Position::new(first, cursor::first_non_blank_col(&self.buffer, first))
                };
                self.start_insert(pos, 1, InsertKind::Plain);
            }
            Region::Chars(range) => {
                let pos = if append { range.end } else { range.start };
                self.start_insert(pos, 1, InsertKind::Plain);
            }
            Region::Block { top, left, .. } => self.start_insert(Position::new(top, left), 1, InsertKind::Plain),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::{p, run};
    use crate::editor::Status;
    use crate::mode::{Mode, VisualKind};
    use pretty_assertions::assert_eq;

    // -- Charwise -----------------------------------------------------------

    #[test]
    fn charwise_delete_is_inclusive() {
        let (text, ed) = run("hello world", "wvlld");
        assert_eq!(text, "hello ld");
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn charwise_selection_spans_lines() {
        assert_eq!(run("ab\ncd", "lvjd").0, "a");
        assert_eq!(run("ab\ncd", "lvjhd").0, "ad");
    }

    #[test]
    fn swap_ends_with_o() {
        let (_, ed) = run("abcdef", "llvlloh");
        assert_eq!(ed.cursor(), p(0, 1));
        assert_eq!(ed.selection().map(|r| (r.start, r.end)), Some((p(0, 1), p(0, 4))));
    }

    #[test]
    fn change_selection_enters_insert() {
        let (text, ed) = run("one two", "vecXY<Esc>");
        assert_eq!(text, "XY two");
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn text_object_extends_selection() {
        assert_eq!(run("a (b c) d", "fbvi(d").0, "a () d");
    }

    // -- Linewise -----------------------------------------------------------

    #[test]
    fn linewise_yank_and_put() {
        let (text, ed) = run("a\nb\nc", "Vjy");
        assert_eq!(text, "a\nb\nc");
        assert_eq!(ed.cursor(), p(0, 0));
        let (text, _) = run("a\nb\nc", "VjyGp");
        assert_eq!(text, "a\nb\nc\na\nb");
    }

    #[test]
    fn counted_shift_in_visual() {
        assert_eq!(run("a\nb", "Vj2>").0, "        a\n        b");
    }

    #[test]
    fn visual_join_and_case() {
        assert_eq!(run("a\nb\nc", "VjjJ").0, "a b c");
        assert_eq!(run("abc", "vlU").0, "ABc");
        assert_eq!(run("aBc", "v$~").0, "AbC");
    }

    #[test]
    fn colon_prefills_visual_range() {
        let mut ed = crate::editor::tests::editor_with("a\nb\nc");
        ed.feed_keys("jVj:");
        assert_eq!(ed.command_line().map(|c| c.input().to_string()), Some("'<,'>".into()));
        ed.feed_keys("d<CR>");
        assert_eq!(ed.text(), "a");
    }

    // -- Blockwise ----------------------------------------------------------

    #[test]
    fn block_delete_removes_columns() {
        assert_eq!(run("abcd\nefgh\nijkl", "l<C-v>jld").0, "ad\neh\nijkl");
    }

    #[test]
    fn block_insert_copies_to_each_line() {
        assert_eq!(run("abc\ndef\nghi", "l<C-v>jjI-<Esc>").0, "a-bc\nd-ef\ng-hi");
    }

    #[test]
    fn block_append_at_line_ends() {
        assert_eq!(run("ab\nabcd", "<C-v>j$A;<Esc>").0, "ab;\nabcd;");
    }

    #[test]
    fn block_yank_puts_as_block() {
        assert_eq!(run("ab\ncd", "<C-v>jy$p").0, "aba\ncdc");
    }

    #[test]
    fn block_change_types_on_each_line() {
        assert_eq!(run("abc\ndef", "l<C-v>jcX<Esc>").0, "aXc\ndXf");
    }

    // -- Replace and paste --------------------------------------------------

    #[test]
    fn replace_fills_selection() {
        assert_eq!(run("abc\ndef", "lvjrx").0, "axx\nxxf");
    }

    #[test]
    fn paste_replaces_selection_and_swaps_register() {
        let (text, mut ed) = run("one two", "yiwwviwp");
        assert_eq!(text, "one one");
        ed.feed_keys("0viwp");
        assert_eq!(ed.text(), "two one");
    }

    #[test]
    fn shift_paste_keeps_register() {
        let (text, mut ed) = run("one two", "yiwwviwP");
        assert_eq!(text, "one one");
        ed.feed_keys("0viwP");
        assert_eq!(ed.text(), "one one");
    }

    #[test]
    fn linewise_paste_over_chars_splits() {
        assert_eq!(run("X\nabc", "yyjlvp").0, "X\na\nX\nc");
    }

    // -- Reselect -----------------------------------------------------------

    #[test]
    fn gv_restores_last_selection() {
        let (_, ed) = run("abcdef", "lvll<Esc>0gv");
        assert_eq!(ed.mode(), Mode::Visual(VisualKind::Char));
        assert_eq!(ed.selection().map(|r| (r.start, r.end)), Some((p(0, 1), p(0, 3))));
    }

    #[test]
    fn gv_without_selection_fails() {
        let (_, ed) = run("abc", "gv");
        assert!(ed.status().is_some_and(Status::is_error));
    }

    #[test]
    fn marks_follow_selection() {
        let (_, ed) = run("a\nbc\nd", "jVj<Esc>");
        assert_eq!(ed.marks().get('<'), Some(p(1, 0)));
        assert_eq!(ed.marks().get('>'), Some(p(2, 0)));
    }
}
