//! Insert and Replace mode.
//!
//! An Insert session is one undo step from the key that opened it to
//! `<Esc>`. The text typed since the session started (or since the cursor
//! was last moved with an arrow key) is kept so a count can repeat it and a
//! Visual-block insert can copy it to the other lines of the block.

use tracing::debug;

use super::Editor;
use crate::host::TextBuffer;
use crate::key::{KeyCode, KeyEvent};
use crate::mode::Mode;
use crate::position::{Position, Range};
use crate::word::{self, CharClass};

/// What opened the session, which decides how `<Esc>` finishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InsertKind {
    Plain,
    /// `o`/`O`: each repeat opens a new line.
    OpenLine,
    /// Block `I`, `A` or `c`: the text goes to every line of the block at
    /// `col`, or at each line's end with `eol`. `pad` extends short lines
    /// with spaces instead of skipping them.
    Block {
        top: usize,
        bottom: usize,
        col: usize,
        eol: bool,
        pad: bool,
    },
}

pub(super) struct InsertSession {
    kind: InsertKind,
    count: usize,
    start: Position,
    typed: String,
    /// Replace mode: the char each typed char overwrote, `None` where the
    /// line was extended.
    replaced: Vec<Option<char>>,
    /// `<C-r>` waits for a register name.
    pub(super) register_pending: bool,
}

impl<B: TextBuffer> Editor<B> {
    /// Enter Insert mode at `pos`. The typed text is repeated `count` times
    /// on `<Esc>`.
    pub(super) fn start_insert(&mut self, pos: Position, count: usize, kind: InsertKind) {
        self.start_session(pos, count, kind, Mode::Insert);
    }

    /// Enter Replace mode at `pos`.
    pub(super) fn start_replace(&mut self, pos: Position) {
        self.start_session(pos, 1, InsertKind::Plain, Mode::Replace);
    }

    fn start_session(&mut self, pos: Position, count: usize, kind: InsertKind, mode: Mode) {
        self.begin_edit();
        self.set_mode(mode);
        self.move_cursor(pos);
        self.resume_insert = false;
        debug!(?kind, count, "insert session");
        self.insert = Some(InsertSession {
            kind,
            count: count.max(1),
            start: self.cursor.position(),
            typed: String::new(),
            replaced: Vec::new(),
            register_pending: false,
        });
    }

    pub(super) fn insert_key(&mut self, key: KeyEvent) {
        let Some(session) = self.insert.as_mut() else {
            self.set_mode(Mode::Normal);
            return;
        };
        if session.register_pending {
            session.register_pending = false;
            self.insert_register(key);
            return;
        }
        if key.code == KeyCode::Escape || key.is_ctrl('c') || key.is_ctrl('[') {
            self.finish_insert(true);
            return;
        }
        if key.is_ctrl('o') {
            // One Normal command, then back to Insert.
            self.finish_insert(false);
            self.resume_insert = true;
            return;
        }
        if let Some(ch) = key.as_char() {
            self.type_text(&ch.to_string());
            return;
        }
        match key.code {
            KeyCode::Enter => self.type_text("\n"),
            KeyCode::Tab => self.insert_tab(),
            KeyCode::Backspace => self.insert_backspace(),
            KeyCode::Delete => self.insert_delete(),
            KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down | KeyCode::Home | KeyCode::End => {
                self.insert_move(key.code);
            }
            _ if key.is_ctrl('h') => self.insert_backspace(),
            _ if key.is_ctrl('j') || key.is_ctrl('m') => self.type_text("\n"),
            _ if key.is_ctrl('i') => self.insert_tab(),
            _ if key.is_ctrl('w') => self.delete_word_before(),
            _ if key.is_ctrl('u') => self.delete_line_before(),
            _ if key.is_ctrl('r') => {
                if let Some(session) = self.insert.as_mut() {
                    session.register_pending = true;
                }
            }
            _ => {}
        }
    }

    // -- Typing -------------------------------------------------------------

    fn type_text(&mut self, text: &str) {
        if self.mode == Mode::Replace {
            for ch in text.chars() {
                self.overwrite_char(ch);
            }
        } else {
            let pos = self.cursor.position();
            self.insert_text(pos, text);
            self.move_cursor(pos.after_text(text));
        }
        if let Some(session) = self.insert.as_mut() {
            session.typed.push_str(text);
        }
    }

    fn overwrite_char(&mut self, ch: char) {
        let pos = self.cursor.position();
        let old = if ch == '\n' { None } else { self.buffer.char_at(pos) };
        if old.is_some() {
            self.remove_text(Range::new(pos, Position::new(pos.line, pos.col + 1)));
        }
        let text = ch.to_string();
        self.insert_text(pos, &text);
        self.move_cursor(pos.after_text(&text));
        if let Some(session) = self.insert.as_mut() {
            session.replaced.push(old);
        }
    }

    fn insert_tab(&mut self) {
        let options = self.options();
        if options.expandtab {
            let width = options.tabstop.max(1);
            let col = self.cursor.col();
            self.type_text(&" ".repeat(width - col % width));
        } else {
            self.type_text("\t");
        }
    }

    /// `<C-r>{reg}`.
    fn insert_register(&mut self, key: KeyEvent) {
        let Some(name) = key.as_char() else { return };
        let register = self.session.borrow_mut().registers.get(name);
        match register {
            Ok(register) => self.type_text(register.content()),
            Err(err) => self.error(&err),
        }
    }

    // -- Deleting -----------------------------------------------------------

    fn insert_backspace(&mut self) {
        let pos = self.cursor.position();
        if self.mode == Mode::Replace {
            self.replace_backspace(pos);
            return;
        }
        let prev = if pos.col > 0 {
            Position::new(pos.line, pos.col - 1)
        } else if pos.line > 0 {
            Position::new(pos.line - 1, self.buffer.line_len(pos.line - 1))
        } else {
            return;
        };
        self.remove_text(Range::new(prev, pos));
        self.move_cursor(prev);
        if let Some(session) = self.insert.as_mut() {
            session.typed.pop();
        }
    }

    /// Undo one overwritten char; past the replaced text, just move left.
    fn replace_backspace(&mut self, pos: Position) {
        let Some(prev) = self
            .buffer
            .pos_to_index(pos)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| self.buffer.index_to_pos(idx))
        else {
            return;
        };
        let Some(original) = self.insert.as_mut().and_then(|s| s.replaced.pop()) else {
            if prev.line == pos.line {
                self.move_cursor(prev);
            }
            return;
        };
        self.remove_text(Range::new(prev, pos));
        if let Some(ch) = original {
            self.insert_text(prev, &ch.to_string());
        }
        self.move_cursor(prev);
        if let Some(session) = self.insert.as_mut() {
            session.typed.pop();
        }
    }

    fn insert_delete(&mut self) {
        let pos = self.cursor.position();
        let len = self.buffer.line_len(pos.line);
        let end = if pos.col < len {
            Position::new(pos.line, pos.col + 1)
        } else if pos.line < self.buffer.last_line() {
            Position::new(pos.line + 1, 0)
        } else {
            return;
        };
        self.remove_text(Range::new(pos, end));
    }

    /// `<C-w>`: blanks, then one word or punctuation run, on this line.
    fn delete_word_before(&mut self) {
        let pos = self.cursor.position();
        if pos.col == 0 {
            self.insert_backspace();
            return;
        }
        let line: Vec<char> = self.buffer.line_text(pos.line).chars().take(pos.col).collect();
        let mut col = line.len();
        while col > 0 && word::classify(line[col - 1]) == CharClass::Blank {
            col -= 1;
        }
        if col > 0 {
            let class = word::classify(line[col - 1]);
            while col > 0 && word::classify(line[col - 1]) == class {
                col -= 1;
            }
        }
        self.delete_before(pos, col);
    }

    /// `<C-u>`: back to the indent, or to column 0 from inside it.
    fn delete_line_before(&mut self) {
        let pos = self.cursor.position();
        let indent = crate::cursor::first_non_blank_col(&self.buffer, pos.line);
        let col = if pos.col > indent { indent } else { 0 };
        self.delete_before(pos, col);
    }

    fn delete_before(&mut self, pos: Position, col: usize) {
        let start = Position::new(pos.line, col);
        self.remove_text(Range::new(start, pos));
        self.move_cursor(start);
        if let Some(session) = self.insert.as_mut() {
            for _ in col..pos.col {
                session.typed.pop();
            }
        }
    }

    // -- Moving -------------------------------------------------------------

    /// Arrow keys: the typed text so far is no longer repeated.
    fn insert_move(&mut self, code: KeyCode) {
        let buf: &dyn TextBuffer = &self.buffer;
        match code {
            KeyCode::Left => self.cursor.move_left(1, buf, true),
            KeyCode::Right => self.cursor.move_right(1, buf, true),
            KeyCode::Up => self.cursor.move_up(1, buf, true),
            KeyCode::Down => self.cursor.move_down(1, buf, true),
            KeyCode::Home => self.cursor.move_to_line_start(),
            _ => self.cursor.move_to_line_end(buf, true),
        }
        let here = self.cursor.position();
        if let Some(session) = self.insert.as_mut() {
            session.kind = InsertKind::Plain;
            session.count = 1;
            session.start = here;
            session.typed.clear();
            session.replaced.clear();
        }
    }

    // -- Leaving ------------------------------------------------------------

    /// `<Esc>`: apply the count and the block copy, then back to Normal.
    /// `step_back` puts the cursor on the last typed char.
    fn finish_insert(&mut self, step_back: bool) {
        let Some(session) = self.insert.take() else { return };
        let mut end = self.cursor.position();
        let typed = session.typed;

        if session.count > 1 && !typed.is_empty() {
            if session.kind == InsertKind::OpenLine {
                for _ in 1..session.count {
                    let at = Position::new(end.line, self.buffer.line_len(end.line));
                    let text = format!("\n{typed}");
                    self.insert_text(at, &text);
                    end = at.after_text(&text);
                }
            } else {
                let text = typed.repeat(session.count - 1);
                self.insert_text(end, &text);
                end = end.after_text(&text);
            }
        }

        if let InsertKind::Block { top, bottom, col, eol, pad } = session.kind
            && !typed.is_empty()
            && !typed.contains('\n')
        {
            for line in top + 1..=bottom.min(self.buffer.last_line()) {
                let len = self.buffer.line_len(line);
                let at = if eol { len } else { col };
                if len < at {
                    if !pad {
                        continue;
                    }
                    self.insert_text(Position::new(line, len), &" ".repeat(at - len));
                }
                self.insert_text(Position::new(line, at), &typed);
            }
        }

        self.session.borrow_mut().registers.set_last_insert(&typed);
        self.set_mark('^', end);
        self.set_change_marks(session.start, end);
        self.set_mode(Mode::Normal);
        self.end_edit();
        self.finish_change();

        match session.kind {
            InsertKind::Block { top, col, eol: false, .. } => self.move_cursor(Position::new(top, col)),
            _ if step_back => self.move_cursor(Position::new(end.line, end.col.saturating_sub(1))),
            _ => self.cursor.set_position(end, &self.buffer, true),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::tests::{p, run};
    use crate::mode::Mode;
    use pretty_assertions::assert_eq;

    // -- Typing -------------------------------------------------------------

    #[test]
    fn escape_steps_back() {
        let (text, ed) = run("", "ihello<Esc>");
        assert_eq!(text, "hello");
        assert_eq!(ed.cursor(), p(0, 4));
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn enter_splits_line() {
        assert_eq!(run("ab", "a<CR><Esc>").0, "a\nb");
    }

    #[test]
    fn counted_insert_repeats_text() {
        let (text, ed) = run("", "3ix<Esc>");
        assert_eq!(text, "xxx");
        assert_eq!(ed.cursor(), p(0, 2));
    }

    #[test]
    fn counted_open_line_repeats_lines() {
        let (text, ed) = run("1", "3oab<Esc>");
        assert_eq!(text, "1\nab\nab\nab");
        assert_eq!(ed.cursor(), p(3, 1));
    }

    #[test]
    fn tab_expands_to_tabstop() {
        assert_eq!(run("", "i<Tab>x<Esc>").0, "    x");
        assert_eq!(run("", "ia<Tab>x<Esc>").0, "a   x");
    }

    #[test]
    fn insert_is_one_undo_step() {
        assert_eq!(run("x", "oone<CR>two<Esc>u").0, "x");
    }

    // -- Deleting -----------------------------------------------------------

    #[test]
    fn backspace_joins_lines() {
        assert_eq!(run("a\nb", "ji<BS><Esc>").0, "ab");
    }

    #[test]
    fn ctrl_w_deletes_word_before() {
        assert_eq!(run("foo bar", "A<C-w><Esc>").0, "foo ");
        assert_eq!(run("foo bar  ", "A<C-w><Esc>").0, "foo ");
    }

    #[test]
    fn ctrl_u_deletes_to_indent() {
        assert_eq!(run("  foo", "A<C-u><Esc>").0, "  ");
    }

    // -- Replace mode -------------------------------------------------------

    #[test]
    fn replace_overwrites_and_extends() {
        assert_eq!(run("abc", "Rxyzw<Esc>").0, "xyzw");
        assert_eq!(run("abc", "lRX<Esc>").0, "aXc");
    }

    #[test]
    fn replace_backspace_restores_original() {
        assert_eq!(run("abc", "Rxyzw<BS><BS><Esc>").0, "xyc");
    }

    // -- Registers and Ctrl-O -----------------------------------------------

    #[test]
    fn ctrl_r_inserts_register() {
        assert_eq!(run("abc", "yiwA <C-r>\"<Esc>").0, "abc abc");
    }

    #[test]
    fn last_insert_register_and_gi() {
        let (text, ed) = run("abc\ndef", "Ax<Esc>jgiy<Esc>");
        assert_eq!(text, "abcxy\ndef");
        let reg = ed.session().borrow_mut().registers.get('.').unwrap();
        assert_eq!(reg.content(), "y");
    }

    #[test]
    fn ctrl_o_runs_one_command() {
        let (text, ed) = run("abc", "A<C-o>0X<Esc>");
        assert_eq!(text, "Xabc");
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn ctrl_o_keeps_end_of_line() {
        assert_eq!(run("abc", "A<C-o>mzX<Esc>").0, "abcX");
    }
}
