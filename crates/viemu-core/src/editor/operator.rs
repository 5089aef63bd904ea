//! Operators and the edits behind them: delete, change, yank, shift, case,
//! join and put.

use tracing::debug;

use super::Editor;
use super::insert::InsertKind;
use crate::host::TextBuffer;
use crate::position::{Position, Range};
use crate::register::{OperationMode, Register};

/// An operator key (`d`, `c`, `y`, `>`, `<`, `gu`, `gU`, `g~`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operator {
    Delete,
    Change,
    Yank,
    ShiftRight,
    ShiftLeft,
    Lower,
    Upper,
    ToggleCase,
}

impl Operator {
    pub(super) const fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'd' => Self::Delete,
            'c' => Self::Change,
            'y' => Self::Yank,
            '>' => Self::ShiftRight,
            '<' => Self::ShiftLeft,
            _ => return None,
        })
    }

    /// The operator after `g`.
    pub(super) const fn from_g_char(ch: char) -> Option<Self> {
        Some(match ch {
            'u' => Self::Lower,
            'U' => Self::Upper,
            '~' => Self::ToggleCase,
            _ => return None,
        })
    }

    /// The key that, typed again, makes the operator linewise (`dd`, `>>`).
    pub(super) const fn doubling_key(self) -> char {
        match self {
            Self::Delete => 'd',
            Self::Change => 'c',
            Self::Yank => 'y',
            Self::ShiftRight => '>',
            Self::ShiftLeft => '<',
            Self::Lower => 'u',
            Self::Upper => 'U',
            Self::ToggleCase => '~',
        }
    }
}

/// The text an operator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Region {
    /// Half-open char range.
    Chars(Range),
    /// Whole lines, inclusive.
    Lines { first: usize, last: usize },
    /// Columns `left..right` on lines `top..=bottom`; `right: None` runs
    /// to each line's end.
    Block {
        top: usize,
        bottom: usize,
        left: usize,
        right: Option<usize>,
    },
}

impl<B: TextBuffer> Editor<B> {
    /// Run `op` over `region`. `amount` is the shift repeat count.
    pub(super) fn apply_operator(&mut self, op: Operator, region: Region, amount: usize) {
        debug!(?op, ?region, "operator");
        match op {
            Operator::Delete => self.delete_region(region),
            Operator::Change => self.change_region(region),
            Operator::Yank => self.yank_region(region),
            Operator::ShiftRight | Operator::ShiftLeft => {
                let (first, last) = region_lines(region);
                self.shift_lines(first, last, amount.max(1), op == Operator::ShiftRight);
            }
            Operator::Lower => self.transform_region(region, |c| c.to_lowercase().collect()),
            Operator::Upper => self.transform_region(region, |c| c.to_uppercase().collect()),
            Operator::ToggleCase => self.transform_region(region, toggle_case),
        }
    }

    // -- Region text --------------------------------------------------------

    fn region_text(&self, region: Region) -> (String, OperationMode) {
        match region {
            Region::Chars(range) => (self.buffer.text(range), OperationMode::CharWise),
            Region::Lines { first, last } => {
                let end = Position::new(last, self.buffer.line_len(last));
                let mut text = self.buffer.text(Range::new(Position::new(first, 0), end));
                text.push('\n');
                (text, OperationMode::LineWise)
            }
            Region::Block { .. } => {
                let rows: Vec<String> =
                    self.block_segments(region).into_iter().map(|r| self.buffer.text(r)).collect();
                (rows.join("\n"), OperationMode::Block)
            }
        }
    }

    /// One range per line of a block, clipped to each line.
    pub(super) fn block_segments(&self, region: Region) -> Vec<Range> {
        let Region::Block { top, bottom, left, right } = region else {
            return Vec::new();
        };
        (top..=bottom.min(self.buffer.last_line()))
            .map(|line| {
                let len = self.buffer.line_len(line);
                let start = left.min(len);
                let end = right.map_or(len, |r| r.min(len)).max(start);
                Range::new(Position::new(line, start), Position::new(line, end))
            })
            .collect()
    }

    /// The range that removes lines `first..=last` with their breaks.
    pub(super) fn linewise_removal(&self, first: usize, last: usize) -> Range {
        let buf = &self.buffer;
        if last < buf.last_line() {
            Range::new(Position::new(first, 0), Position::new(last + 1, 0))
        } else if first > 0 {
            Range::new(Position::new(first - 1, buf.line_len(first - 1)), buf.end_position())
        } else {
            Range::new(Position::ZERO, buf.end_position())
        }
    }

    // -- Delete, change, yank -----------------------------------------------

    pub(super) fn delete_region(&mut self, region: Region) {
        let (text, mode) = self.region_text(region);
        let register = self.register.take();
        self.session.borrow_mut().registers.delete(register, &text, mode);
        self.begin_edit();
        match region {
            Region::Chars(range) => {
                self.remove_text(range);
                self.move_cursor(range.start);
            }
            Region::Lines { first, last } => {
                self.marks.remove_lines(first, last, self.bookmarks.as_mut());
                let range = self.linewise_removal(first, last);
                self.remove_text(range);
                self.goto_first_non_blank(first.min(self.buffer.last_line()));
                let n = last - first + 1;
                if n > 2 {
                    self.info(format!("{n} fewer lines"));
                }
            }
            Region::Block { top, left, .. } => {
                for segment in self.block_segments(region).into_iter().rev() {
                    self.remove_text(segment);
                }
                self.move_cursor(Position::new(top, left));
            }
        }
        self.end_edit();
        let here = self.cursor.position();
        self.set_change_marks(here, here);
    }

    /// Delete, then Insert where the text was. Linewise changes leave one
    /// empty line.
    fn change_region(&mut self, region: Region) {
        let (text, mode) = self.region_text(region);
        let register = self.register.take();
        self.session.borrow_mut().registers.delete(register, &text, mode);
        self.begin_edit();
        match region {
            Region::Chars(range) => {
                self.remove_text(range);
                self.start_insert(range.start, 1, InsertKind::Plain);
            }
            Region::Lines { first, last } => {
                let end = Position::new(last, self.buffer.line_len(last));
                self.remove_text(Range::new(Position::new(first, 0), end));
                self.start_insert(Position::new(first, 0), 1, InsertKind::Plain);
            }
            Region::Block { top, bottom, left, .. } => {
                for segment in self.block_segments(region).into_iter().rev() {
                    self.remove_text(segment);
                }
                let kind = InsertKind::Block { top, bottom, col: left, eol: false, pad: false };
                self.start_insert(Position::new(top, left), 1, kind);
            }
        }
        // The insert session keeps its own edit group open until <Esc>.
        self.end_edit();
    }

    pub(super) fn yank_region(&mut self, region: Region) {
        let (text, mode) = self.region_text(region);
        let register = self.register.take();
        self.session.borrow_mut().registers.yank(register, &text, mode);
        let (start, end) = match region {
            Region::Chars(range) => (range.start, range.end),
            Region::Lines { first, last } => (Position::new(first, 0), Position::new(last, 0)),
            Region::Block { top, bottom, left, .. } => (Position::new(top, left), Position::new(bottom, left)),
        };
        self.set_mark('[', start);
        self.set_mark(']', end);
        match region {
            Region::Chars(range) => self.move_cursor(range.start),
            Region::Lines { first, last } => {
                if self.cursor.line() > first {
                    self.cursor.goto_line(first, &self.buffer, false);
                }
                let n = last - first + 1;
                if n > 2 {
                    self.info(format!("{n} lines yanked"));
                }
            }
            Region::Block { top, bottom, left, .. } => {
                self.move_cursor(Position::new(top, left));
                let n = bottom - top + 1;
                if n > 2 {
                    self.info(format!("block of {n} lines yanked"));
                }
            }
        }
    }

    // -- Shift and case -----------------------------------------------------

    pub(super) fn shift_lines(&mut self, first: usize, last: usize, amount: usize, right: bool) {
        let options = self.options();
        let width = options.shiftwidth * amount;
        self.begin_edit();
        for line in first..=last.min(self.buffer.last_line()) {
            let text = self.buffer.line_text(line);
            if text.is_empty() {
                continue;
            }
            let lead: String = text.chars().take_while(|c| matches!(c, ' ' | '\t')).collect();
            let current = indent_width(&lead, options.tabstop);
            let target = if right { current + width } else { current.saturating_sub(width) };
            let indent = build_indent(target, options.expandtab, options.tabstop);
            if indent != lead {
                let lead_end = Position::new(line, lead.chars().count());
                self.remove_text(Range::new(Position::new(line, 0), lead_end));
                self.insert_text(Position::new(line, 0), &indent);
            }
        }
        self.end_edit();
        self.goto_first_non_blank(first);
        self.set_change_marks(Position::new(first, 0), Position::new(last, 0));
        let n = last - first + 1;
        if n > 2 {
            let dir = if right { '>' } else { '<' };
            let times = if amount == 1 { "time" } else { "times" };
            self.info(format!("{n} lines {dir}ed {amount} {times}"));
        }
    }

    /// Rewrite every char of `region` through `f`, segment by segment.
    pub(super) fn transform_region(&mut self, region: Region, f: impl Fn(char) -> String) {
        let segments = match region {
            Region::Chars(range) => vec![range],
            Region::Lines { first, last } => (first..=last)
                .map(|line| {
                    Range::new(Position::new(line, 0), Position::new(line, self.buffer.line_len(line)))
                })
                .collect(),
            Region::Block { .. } => self.block_segments(region),
        };
        self.begin_edit();
        for segment in segments {
            let old = self.buffer.text(segment);
            let new: String =
                old.chars().map(|c| if c == '\n' { "\n".to_string() } else { f(c) }).collect();
            if new != old {
                self.remove_text(segment);
                self.insert_text(segment.start, &new);
            }
        }
        self.end_edit();
        match region {
            Region::Chars(range) => self.move_cursor(range.start),
            Region::Lines { first, .. } => {
                if self.cursor.line() != first {
                    self.goto_first_non_blank(first);
                }
                self.clamp_cursor();
            }
            Region::Block { top, left, .. } => self.move_cursor(Position::new(top, left)),
        }
    }

    // -- Join and put -------------------------------------------------------

    /// Join `count` lines starting at `line` (at least two). With `spaces`,
    /// leading blanks of each joined line become one space. Returns `false`
    /// when there is no line to join.
    pub(super) fn join_lines(&mut self, line: usize, count: usize, spaces: bool) -> bool {
        let last = (line + count.max(2) - 1).min(self.buffer.last_line());
        if last <= line {
            return false;
        }
        self.begin_edit();
        let mut join_col = 0;
        for _ in line..last {
            let current = self.buffer.line_text(line);
            let current_len = current.chars().count();
            let next = self.buffer.line_text(line + 1);
            let lead = if spaces {
                next.chars().take_while(|c| matches!(c, ' ' | '\t')).count()
            } else {
                0
            };
            let rest = next.chars().nth(lead);
            let sep = if !spaces
                || rest.is_none()
                || rest == Some(')')
                || current_len == 0
                || current.ends_with([' ', '\t'])
            {
                ""
            } else {
                " "
            };
            let at = Position::new(line, current_len);
            self.remove_text(Range::new(at, Position::new(line + 1, lead)));
            self.insert_text(at, sep);
            join_col = current_len;
        }
        self.end_edit();
        self.move_cursor(Position::new(line, join_col));
        true
    }

    /// `p`, `P`, `gp`, `gP` from the selected register. Returns `false`
    /// when there was nothing to put.
    pub(super) fn paste(&mut self, after: bool, count: usize, cursor_after: bool) -> bool {
        let name = self.register.take().unwrap_or('"');
        let register = self.session.borrow_mut().registers.get_nonempty(name);
        let register = match register {
            Ok(register) => register,
            Err(err) => {
                self.error(&err);
                return false;
            }
        };
        self.put(&register, after, count, cursor_after);
        true
    }

    /// Put `register` at the cursor.
    pub(super) fn put(&mut self, register: &Register, after: bool, count: usize, cursor_after: bool) {
        let count = count.max(1);
        let pos = self.cursor.position();
        self.begin_edit();
        let cursor = match register.mode() {
            OperationMode::CharWise => {
                let text = register.content().repeat(count);
                let at = if after && self.buffer.line_len(pos.line) > 0 {
                    Position::new(pos.line, pos.col + 1)
                } else {
                    pos
                };
                self.insert_text(at, &text);
                let end = at.after_text(&text);
                let last = Position::new(end.line, end.col.saturating_sub(1));
                self.set_change_marks(at, last);
                if cursor_after {
                    end
                } else if text.contains('\n') {
                    at
                } else {
                    last
                }
            }
            OperationMode::LineWise => {
                let text = register.content().repeat(count);
                let line = if after { pos.line + 1 } else { pos.line };
                let added = text.matches('\n').count();
                if line > self.buffer.last_line() {
                    let end = self.buffer.end_position();
                    let body = text.strip_suffix('\n').unwrap_or(&text);
                    self.insert_text(end, &format!("\n{body}"));
                } else {
                    self.insert_text(Position::new(line, 0), &text);
                }
                self.set_change_marks(Position::new(line, 0), Position::new(line + added - 1, 0));
                if cursor_after {
                    Position::new(line + added, 0)
                } else {
                    let col = crate::cursor::first_non_blank_col(&self.buffer, line);
                    Position::new(line, col)
                }
            }
            OperationMode::Block => {
                let col = if after && self.buffer.line_len(pos.line) > 0 { pos.col + 1 } else { pos.col };
                self.put_block(register.content(), pos.line, col, count);
                Position::new(pos.line, col)
            }
        };
        self.end_edit();
        self.move_cursor(cursor);
    }

    /// Put block rows at `col` on consecutive lines from `line`, padding
    /// short lines and adding lines past the end.
    pub(super) fn put_block(&mut self, content: &str, line: usize, col: usize, count: usize) {
        let rows: Vec<&str> = content.split('\n').collect();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        for (i, row) in rows.iter().enumerate() {
            let target = line + i;
            if target > self.buffer.last_line() {
                let end = self.buffer.end_position();
                self.insert_text(end, "\n");
            }
            let len = self.buffer.line_len(target);
            if len < col {
                self.insert_text(Position::new(target, len), &" ".repeat(col - len));
            }
            let padded = format!("{row}{}", " ".repeat(width - row.chars().count()));
            let mut piece = padded.repeat(count);
            if col >= len {
                piece.truncate(piece.trim_end_matches(' ').len());
            }
            self.insert_text(Position::new(target, col), &piece);
        }
    }
}

fn region_lines(region: Region) -> (usize, usize) {
    match region {
        Region::Chars(range) => (range.start.line, range.end.line),
        Region::Lines { first, last } => (first, last),
        Region::Block { top, bottom, .. } => (top, bottom),
    }
}

fn toggle_case(c: char) -> String {
    if c.is_uppercase() {
        c.to_lowercase().collect()
    } else if c.is_lowercase() {
        c.to_uppercase().collect()
    } else {
        c.to_string()
    }
}

/// Display width of leading blanks.
fn indent_width(lead: &str, tabstop: usize) -> usize {
    lead.chars().fold(0, |width, c| {
        if c == '\t' {
            width + tabstop - width % tabstop
        } else {
            width + 1
        }
    })
}

fn build_indent(width: usize, expandtab: bool, tabstop: usize) -> String {
    if expandtab {
        " ".repeat(width)
    } else {
        format!("{}{}", "\t".repeat(width / tabstop), " ".repeat(width % tabstop))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Status;
    use crate::editor::tests::{editor_with, p, run};
    use pretty_assertions::assert_eq;

    // -- Helpers ------------------------------------------------------------

    #[test]
    fn indent_width_counts_tabs_to_stops() {
        assert_eq!(indent_width("\t  ", 4), 6);
        assert_eq!(indent_width("  \t", 4), 4);
        assert_eq!(build_indent(6, false, 4), "\t  ");
        assert_eq!(build_indent(6, true, 4), "      ");
    }

    #[test]
    fn toggle_case_leaves_symbols() {
        assert_eq!("aB1-".chars().map(toggle_case).collect::<String>(), "Ab1-");
    }

    // -- Linewise edits -----------------------------------------------------

    #[test]
    fn deleting_last_lines_takes_preceding_break() {
        assert_eq!(run("a\nb\nc", "jdG").0, "a");
        assert_eq!(run("a\nb", "dG").0, "");
    }

    #[test]
    fn big_delete_reports_lines() {
        let (_, ed) = run("a\nb\nc\nd", "3dd");
        assert_eq!(ed.status().map(Status::text), Some("3 fewer lines"));
    }

    #[test]
    fn yanking_empty_line_is_puttable() {
        assert_eq!(run("\nx", "yyjp").0, "\nx\n");
    }

    #[test]
    fn yank_up_moves_cursor() {
        let (_, ed) = run("a\nb\nc", "Gyk");
        assert_eq!(ed.cursor(), p(1, 0));
        let (_, ed) = run("a\nb\nc", "yj");
        assert_eq!(ed.cursor(), p(0, 0));
    }

    #[test]
    fn shift_uses_tabs_without_expandtab() {
        let mut ed = editor_with("x");
        ed.execute("set noet sw=8 ts=8");
        ed.feed_keys(">>");
        assert_eq!(ed.text(), "\tx");
    }

    #[test]
    fn shift_skips_empty_lines() {
        assert_eq!(run("a\n\nb", ">2j").0, "    a\n\n    b");
    }

    #[test]
    fn counted_shift_repeats() {
        let mut ed = editor_with("a\nb\nc");
        ed.execute("%>>");
        assert_eq!(ed.text(), "        a\n        b\n        c");
        assert_eq!(ed.status().map(Status::text), Some("3 lines >ed 2 times"));
    }

    // -- Put ----------------------------------------------------------------

    #[test]
    fn put_linewise_at_end_and_start() {
        assert_eq!(run("a\nb", "yyGp").0, "a\nb\na");
        assert_eq!(run("a\nb", "jyyggP").0, "b\na\nb");
    }

    #[test]
    fn gp_leaves_cursor_after_text() {
        let (_, ed) = run("a\nb\nc", "yyjgp");
        assert_eq!(ed.cursor(), p(3, 0));
        let (_, ed) = run("a\nb", "yyP");
        assert_eq!(ed.cursor(), p(0, 0));
    }

    #[test]
    fn put_counted_charwise() {
        assert_eq!(run("ab", "yl3p").0, "aaaab");
    }

    #[test]
    fn put_empty_register_is_an_error() {
        let (text, ed) = run("abc", "\"zp");
        assert_eq!(text, "abc");
        assert!(ed.status().is_some_and(Status::is_error));
    }

    #[test]
    fn block_put_pads_short_lines() {
        let mut ed = editor_with("ab\ncd\n");
        ed.session().borrow_mut().registers.set('a', "XY\nZ", OperationMode::Block, false).unwrap();
        ed.feed_keys("\"ap");
        assert_eq!(ed.text(), "aXYb\ncZ d");
    }
}
