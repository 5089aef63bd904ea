//! Text objects: selection by structure rather than by motion.
//!
//! ```text
//! operator + text-object = action
//! d        + iw          = delete inner word
//! c        + i"          = change inside quotes
//! y        + 2a(         = yank the second enclosing parenthesized block
//! ```
//!
//! | Inner      | Around     | Object                          |
//! |------------|------------|---------------------------------|
//! | `iw`       | `aw`       | word                            |
//! | `iW`       | `aW`       | WORD                            |
//! | `i"`       | `a"`       | double-quoted string            |
//! | `i'`       | `a'`       | single-quoted string            |
//! | `` i` ``   | `` a` ``   | backtick-quoted string          |
//! | `i(` `ib`  | `a(` `ab`  | parenthesized block             |
//! | `i[`       | `a[`       | square-bracketed block          |
//! | `i{` `iB`  | `a{` `aB`  | curly-braced block              |
//! | `i<`       | `a<`       | angle-bracketed block           |
//!
//! [`select`] returns the half-open `[start, end)` range, or `None` when the
//! object does not exist around the cursor. Matching-bracket lookup for `%`
//! lives here too since it shares the nesting scan.

use crate::host::TextBuffer;
use crate::position::{Position, Range};
use crate::word::{CharClass, classify, classify_big};

/// What structure a text object selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Word,
    BigWord,
    Quote(char),
    Bracket { open: char, close: char },
}

impl ObjectKind {
    /// The object named by the key after `i`/`a`.
    #[must_use]
    pub const fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'w' => Self::Word,
            'W' => Self::BigWord,
            '"' | '\'' | '`' => Self::Quote(ch),
            '(' | ')' | 'b' => Self::Bracket { open: '(', close: ')' },
            '[' | ']' => Self::Bracket { open: '[', close: ']' },
            '{' | '}' | 'B' => Self::Bracket { open: '{', close: '}' },
            '<' | '>' => Self::Bracket { open: '<', close: '>' },
            _ => return None,
        })
    }
}

/// Select `count` objects of `kind` at `pos`. `around` picks the `a`
/// variant (surrounding blanks, quotes or brackets included).
#[must_use]
pub fn select(
    buf: &dyn TextBuffer,
    pos: Position,
    kind: ObjectKind,
    around: bool,
    count: usize,
) -> Option<Range> {
    let count = count.max(1);
    match kind {
        ObjectKind::Word => word_object(buf, pos, around, count, classify),
        ObjectKind::BigWord => word_object(buf, pos, around, count, classify_big),
        ObjectKind::Quote(q) => quote_object(buf, pos, q, around),
        ObjectKind::Bracket { open, close } => bracket_object(buf, pos, open, close, around, count),
    }
}

/// `%`: the bracket matching the first bracket at or after the cursor on
/// its line.
#[must_use]
pub fn matching_bracket(buf: &dyn TextBuffer, pos: Position) -> Option<Position> {
    const PAIRS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];
    let text = buf.line_text(pos.line);
    let (col, ch) = text
        .chars()
        .enumerate()
        .skip(pos.col)
        .find(|(_, c)| PAIRS.iter().any(|&(o, cl)| *c == o || *c == cl))?;
    let idx = buf.pos_to_index(Position::new(pos.line, col))?;
    let target = PAIRS.iter().find_map(|&(open, close)| {
        if ch == open {
            find_closing(buf, idx, open, close)
        } else if ch == close {
            find_opening(buf, idx, open, close)
        } else {
            None
        }
    })?;
    buf.index_to_pos(target)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn idx_to_pos(buf: &dyn TextBuffer, idx: usize) -> Position {
    buf.index_to_pos(idx.min(buf.len_chars()))
        .unwrap_or_else(|| buf.end_position())
}

fn char_class(buf: &dyn TextBuffer, idx: usize, classify_fn: fn(char) -> CharClass) -> CharClass {
    buf.char_at_index(idx).map_or(CharClass::Newline, classify_fn)
}

// ---------------------------------------------------------------------------
// Word objects
// ---------------------------------------------------------------------------

/// The run of same-class chars around `idx`, as char indices.
fn run_at(buf: &dyn TextBuffer, idx: usize, classify_fn: fn(char) -> CharClass) -> (usize, usize) {
    let total = buf.len_chars();
    let class = char_class(buf, idx, classify_fn);
    if class == CharClass::Newline {
        return (idx, idx + 1);
    }
    let mut s = idx;
    while s > 0 && char_class(buf, s - 1, classify_fn) == class {
        s -= 1;
    }
    let mut e = idx + 1;
    while e < total && char_class(buf, e, classify_fn) == class {
        e += 1;
    }
    (s, e)
}

fn skip_blanks(buf: &dyn TextBuffer, mut idx: usize, classify_fn: fn(char) -> CharClass) -> usize {
    while idx < buf.len_chars() && char_class(buf, idx, classify_fn) == CharClass::Blank {
        idx += 1;
    }
    idx
}

fn word_object(
    buf: &dyn TextBuffer,
    pos: Position,
    around: bool,
    count: usize,
    classify_fn: fn(char) -> CharClass,
) -> Option<Range> {
    let total = buf.len_chars();
    let idx = buf.pos_to_index(pos)?;
    if total == 0 || idx >= total {
        return None;
    }
    let on_blank = char_class(buf, idx, classify_fn) == CharClass::Blank;
    let (mut start, mut end) = run_at(buf, idx, classify_fn);

    if around {
        if on_blank {
            // Blank run plus the word after it.
            if end < total && char_class(buf, end, classify_fn) != CharClass::Newline {
                end = run_at(buf, end, classify_fn).1;
            }
        } else {
            let trailing = skip_blanks(buf, end, classify_fn);
            if trailing > end {
                end = trailing;
            } else {
                while start > 0 && char_class(buf, start - 1, classify_fn) == CharClass::Blank {
                    start -= 1;
                }
            }
        }
    }

    // Each extra count takes the next run (inner) or word-plus-blanks (around).
    for _ in 1..count {
        if end >= total || char_class(buf, end, classify_fn) == CharClass::Newline {
            break;
        }
        end = run_at(buf, end, classify_fn).1;
        if around {
            end = skip_blanks(buf, end, classify_fn);
        }
    }

    Some(Range::new(idx_to_pos(buf, start), idx_to_pos(buf, end)))
}

// ---------------------------------------------------------------------------
// Quote objects
// ---------------------------------------------------------------------------

fn quote_object(buf: &dyn TextBuffer, pos: Position, quote: char, around: bool) -> Option<Range> {
    let (open, close) = find_quote_pair(buf, pos, quote)?;
    let line = pos.line;
    if around {
        // `a"` takes trailing blanks, or leading ones when there are none.
        let chars: Vec<char> = buf.line_text(line).chars().collect();
        let mut end = close + 1;
        while end < chars.len() && matches!(chars[end], ' ' | '\t') {
            end += 1;
        }
        let mut start = open;
        if end == close + 1 {
            while start > 0 && matches!(chars[start - 1], ' ' | '\t') {
                start -= 1;
            }
        }
        Some(Range::new(Position::new(line, start), Position::new(line, end)))
    } else {
        Some(Range::new(
            Position::new(line, open + 1),
            Position::new(line, close),
        ))
    }
}

/// Quotes pair left to right on the cursor line. The pair containing the
/// cursor wins; otherwise the first pair after it.
fn find_quote_pair(buf: &dyn TextBuffer, pos: Position, quote: char) -> Option<(usize, usize)> {
    let mut quotes = Vec::new();
    let mut escaped = false;
    for (i, ch) in buf.line_text(pos.line).chars().enumerate() {
        if ch == quote && !escaped {
            quotes.push(i);
        }
        escaped = ch == '\\' && !escaped;
    }
    let pairs: Vec<(usize, usize)> = quotes
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    pairs
        .iter()
        .copied()
        .find(|&(open, close)| pos.col >= open && pos.col <= close)
        .or_else(|| pairs.iter().copied().find(|&(open, _)| open > pos.col))
}

// ---------------------------------------------------------------------------
// Bracket objects
// ---------------------------------------------------------------------------

fn bracket_object(
    buf: &dyn TextBuffer,
    pos: Position,
    open: char,
    close: char,
    around: bool,
    count: usize,
) -> Option<Range> {
    let (mut open_idx, mut close_idx) = find_bracket_pair(buf, pos, open, close)?;
    for _ in 1..count {
        let outer_open = find_opening(buf, open_idx, open, close)?;
        let outer_close = find_closing(buf, outer_open, open, close)?;
        open_idx = outer_open;
        close_idx = outer_close;
    }
    if around {
        return Some(Range::new(
            idx_to_pos(buf, open_idx),
            idx_to_pos(buf, close_idx + 1),
        ));
    }
    let start = idx_to_pos(buf, open_idx + 1);
    let end = idx_to_pos(buf, close_idx);
    // `i{` on a block whose brackets sit on their own lines selects the
    // lines between them, leaving the closing line's indent alone.
    if end.line > start.line && start.col == buf.line_len(start.line) {
        let inner_start = Position::new(start.line + 1, 0);
        let indent_only = buf
            .line_text(end.line)
            .chars()
            .take(end.col)
            .all(|c| c == ' ' || c == '\t');
        let inner_end = if indent_only { Position::new(end.line, 0) } else { end };
        if inner_start <= inner_end {
            return Some(Range::new(inner_start, inner_end));
        }
    }
    Some(Range::new(start, end))
}

/// Char indices of the innermost `open`/`close` pair around the cursor.
/// A cursor on either bracket selects that bracket's pair.
fn find_bracket_pair(
    buf: &dyn TextBuffer,
    pos: Position,
    open: char,
    close: char,
) -> Option<(usize, usize)> {
    let cursor = buf.pos_to_index(pos)?;
    if cursor >= buf.len_chars() {
        return None;
    }
    match buf.char_at_index(cursor) {
        Some(c) if c == open => Some((cursor, find_closing(buf, cursor, open, close)?)),
        Some(c) if c == close => Some((find_opening(buf, cursor, open, close)?, cursor)),
        _ => {
            let open_idx = find_opening(buf, cursor, open, close)?;
            let close_idx = find_closing(buf, open_idx, open, close)?;
            (cursor < close_idx).then_some((open_idx, close_idx))
        }
    }
}

/// Unmatched `open` before `start`, honouring nesting.
fn find_opening(buf: &dyn TextBuffer, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..start).rev() {
        match buf.char_at_index(i) {
            Some(c) if c == close => depth += 1,
            Some(c) if c == open => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Matching `close` after the `open` at `start`, honouring nesting.
fn find_closing(buf: &dyn TextBuffer, start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for i in (start + 1)..buf.len_chars() {
        match buf.char_at_index(i) {
            Some(c) if c == open => depth += 1,
            Some(c) if c == close => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn r(sl: usize, sc: usize, el: usize, ec: usize) -> Range {
        Range::new(p(sl, sc), p(el, ec))
    }

    fn sel(text: &str, pos: Position, obj: char, around: bool) -> Option<Range> {
        let buf = Buffer::from_text(text);
        select(&buf, pos, ObjectKind::from_char(obj).unwrap(), around, 1)
    }

    // -- Words --------------------------------------------------------------

    #[test]
    fn iw_selects_word() {
        assert_eq!(sel("hello world", p(0, 8), 'w', false), Some(r(0, 6, 0, 11)));
    }

    #[test]
    fn iw_on_blank_selects_blanks() {
        assert_eq!(sel("a   b", p(0, 2), 'w', false), Some(r(0, 1, 0, 4)));
    }

    #[test]
    fn aw_takes_trailing_blanks() {
        assert_eq!(sel("one two three", p(0, 5), 'w', true), Some(r(0, 4, 0, 8)));
    }

    #[test]
    fn aw_at_line_end_takes_leading_blanks() {
        assert_eq!(sel("one two", p(0, 5), 'w', true), Some(r(0, 3, 0, 7)));
    }

    #[test]
    fn aw_on_blank_takes_next_word() {
        assert_eq!(sel("a  bc d", p(0, 1), 'w', true), Some(r(0, 1, 0, 5)));
    }

    #[test]
    fn iw_punctuation_run() {
        assert_eq!(sel("foo->bar", p(0, 3), 'w', false), Some(r(0, 3, 0, 5)));
        assert_eq!(sel("foo->bar", p(0, 3), 'W', false), Some(r(0, 0, 0, 8)));
    }

    #[test]
    fn counted_aw_spans_words() {
        let buf = Buffer::from_text("a b c d");
        assert_eq!(select(&buf, p(0, 0), ObjectKind::Word, true, 2), Some(r(0, 0, 0, 4)));
    }

    // -- Quotes -------------------------------------------------------------

    #[test]
    fn inner_and_around_quotes() {
        let text = r#"say "hi there" now"#;
        assert_eq!(sel(text, p(0, 6), '"', false), Some(r(0, 5, 0, 13)));
        assert_eq!(sel(text, p(0, 6), '"', true), Some(r(0, 4, 0, 15)));
    }

    #[test]
    fn quote_before_cursor_finds_next_pair() {
        assert_eq!(sel("x = 'ab'", p(0, 0), '\'', false), Some(r(0, 5, 0, 7)));
    }

    #[test]
    fn escaped_quote_is_skipped() {
        let text = r#""a\"b""#;
        assert_eq!(sel(text, p(0, 1), '"', false), Some(r(0, 1, 0, 5)));
    }

    #[test]
    fn empty_quotes_give_empty_inner() {
        assert_eq!(sel(r#"x = """#, p(0, 4), '"', false), Some(r(0, 5, 0, 5)));
    }

    #[test]
    fn missing_quotes() {
        assert_eq!(sel("nothing", p(0, 2), '"', false), None);
    }

    // -- Brackets -----------------------------------------------------------

    #[test]
    fn inner_and_around_parens() {
        let text = "f(a, (b), c)";
        assert_eq!(sel(text, p(0, 3), '(', false), Some(r(0, 2, 0, 11)));
        assert_eq!(sel(text, p(0, 3), 'b', true), Some(r(0, 1, 0, 12)));
        assert_eq!(sel(text, p(0, 6), ')', false), Some(r(0, 6, 0, 7)));
    }

    #[test]
    fn counted_bracket_object_goes_outward() {
        let buf = Buffer::from_text("f(a, (b), c)");
        let kind = ObjectKind::from_char('(').unwrap();
        assert_eq!(select(&buf, p(0, 6), kind, false, 2), Some(r(0, 2, 0, 11)));
    }

    #[test]
    fn curly_block_on_own_lines_is_line_shaped() {
        let text = "fn x() {\n    body;\n}";
        assert_eq!(sel(text, p(1, 4), 'B', false), Some(r(1, 0, 2, 0)));
        assert_eq!(sel(text, p(1, 4), '{', true), Some(r(0, 7, 2, 1)));
    }

    #[test]
    fn cursor_outside_brackets() {
        assert_eq!(sel("(a) b", p(0, 4), '(', false), None);
    }

    // -- Matching bracket ---------------------------------------------------

    #[test]
    fn percent_jumps_between_pairs() {
        let buf = Buffer::from_text("if (a[0]) {\n}");
        assert_eq!(matching_bracket(&buf, p(0, 0)), Some(p(0, 8)));
        assert_eq!(matching_bracket(&buf, p(0, 8)), Some(p(0, 3)));
        assert_eq!(matching_bracket(&buf, p(0, 5)), Some(p(0, 7)));
        assert_eq!(matching_bracket(&buf, p(0, 10)), Some(p(1, 0)));
    }

    #[test]
    fn percent_without_bracket() {
        let buf = Buffer::from_text("plain");
        assert_eq!(matching_bracket(&buf, p(0, 0)), None);
    }
}
