//! Word motions: Vi-style word and WORD navigation.
//!
//! | Motion | Key | Description |
//! |--------|-----|-------------|
//! | [`word_forward`] | `w` | Forward to start of next word |
//! | [`word_backward`] | `b` | Backward to start of previous word |
//! | [`word_end_forward`] | `e` | Forward to end of current/next word |
//! | [`word_end_backward`] | `ge` | Backward to end of previous word |
//! | [`big_word_forward`] | `W` | Forward to start of next WORD |
//! | [`big_word_backward`] | `B` | Backward to start of previous WORD |
//! | [`big_word_end_forward`] | `E` | Forward to end of current/next WORD |
//! | [`big_word_end_backward`] | `gE` | Backward to end of previous WORD |
//!
//! A **word** is a run of word characters (letters, digits, underscore) or a
//! run of other non-blank characters. A **WORD** is a run of non-blanks.
//! An empty line counts as a word for `w`, `b` and `ge`.
//!
//! All functions walk the flat char-index view of a [`TextBuffer`] and return
//! the starting position unchanged when there is nowhere to go.

use crate::host::TextBuffer;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Character classification
// ---------------------------------------------------------------------------

/// Character class for word boundary detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// Letters, digits, underscore.
    Word,
    /// Non-blank, non-word characters.
    Punctuation,
    /// Whitespace within a line.
    Blank,
    Newline,
}

/// Classify a character for word motions.
#[must_use]
pub fn classify(ch: char) -> CharClass {
    if ch == '\n' {
        CharClass::Newline
    } else if ch.is_whitespace() {
        CharClass::Blank
    } else if is_word_char(ch) {
        CharClass::Word
    } else {
        CharClass::Punctuation
    }
}

/// Classify a character for WORD motions.
#[must_use]
pub fn classify_big(ch: char) -> CharClass {
    if ch == '\n' {
        CharClass::Newline
    } else if ch.is_whitespace() {
        CharClass::Blank
    } else {
        CharClass::Word
    }
}

/// Letters, digits and underscore.
#[inline]
#[must_use]
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

type Classifier = fn(char) -> CharClass;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[must_use]
pub fn word_forward(buf: &dyn TextBuffer, pos: Position) -> Position {
    forward_start(buf, pos, classify)
}

#[must_use]
pub fn word_backward(buf: &dyn TextBuffer, pos: Position) -> Position {
    backward_start(buf, pos, classify)
}

#[must_use]
pub fn word_end_forward(buf: &dyn TextBuffer, pos: Position) -> Position {
    forward_end(buf, pos, classify)
}

#[must_use]
pub fn word_end_backward(buf: &dyn TextBuffer, pos: Position) -> Position {
    backward_end(buf, pos, classify)
}

#[must_use]
pub fn big_word_forward(buf: &dyn TextBuffer, pos: Position) -> Position {
    forward_start(buf, pos, classify_big)
}

#[must_use]
pub fn big_word_backward(buf: &dyn TextBuffer, pos: Position) -> Position {
    backward_start(buf, pos, classify_big)
}

#[must_use]
pub fn big_word_end_forward(buf: &dyn TextBuffer, pos: Position) -> Position {
    forward_end(buf, pos, classify_big)
}

#[must_use]
pub fn big_word_end_backward(buf: &dyn TextBuffer, pos: Position) -> Position {
    backward_end(buf, pos, classify_big)
}

/// The keyword under or after the cursor on its line, as `*` and `#` pick it.
///
/// Returns the word and its starting column. A cursor on blanks or
/// punctuation uses the first keyword to its right.
#[must_use]
pub fn keyword_at(buf: &dyn TextBuffer, pos: Position) -> Option<(String, usize)> {
    let chars: Vec<char> = buf.line_text(pos.line).chars().collect();
    let mut col = pos.col.min(chars.len());
    while col < chars.len() && !is_word_char(chars[col]) {
        col += 1;
    }
    if col >= chars.len() {
        return None;
    }
    let mut start = col;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    Some((chars[start..end].iter().collect(), start))
}

// ---------------------------------------------------------------------------
// Core algorithms
// ---------------------------------------------------------------------------

fn class_at(buf: &dyn TextBuffer, idx: usize, classify_fn: Classifier) -> CharClass {
    buf.char_at_index(idx).map_or(CharClass::Newline, classify_fn)
}

/// A newline at `idx` that is the whole of its line.
fn is_empty_line_at(buf: &dyn TextBuffer, idx: usize) -> bool {
    buf.char_at_index(idx) == Some('\n') && (idx == 0 || buf.char_at_index(idx - 1) == Some('\n'))
}

fn to_pos(buf: &dyn TextBuffer, idx: usize, fallback: Position) -> Position {
    buf.index_to_pos(idx).unwrap_or(fallback)
}

/// 1. Skip the current token.
/// 2. Skip blanks and newlines, stopping at an empty line.
/// 3. Land on the first char of the next token.
fn forward_start(buf: &dyn TextBuffer, pos: Position, classify_fn: Classifier) -> Position {
    let total = buf.len_chars();
    let Some(start) = buf.pos_to_index(pos) else {
        return pos;
    };
    if total == 0 || start >= total.saturating_sub(1) {
        return pos;
    }

    let mut idx = start;
    let start_class = class_at(buf, idx, classify_fn);
    if matches!(start_class, CharClass::Word | CharClass::Punctuation) {
        while idx < total && class_at(buf, idx, classify_fn) == start_class {
            idx += 1;
        }
    }

    while idx < total {
        match class_at(buf, idx, classify_fn) {
            CharClass::Word | CharClass::Punctuation => break,
            CharClass::Blank => idx += 1,
            CharClass::Newline => {
                idx += 1;
                if idx < total && class_at(buf, idx, classify_fn) == CharClass::Newline {
                    break;
                }
            }
        }
    }

    if idx >= total {
        return pos;
    }
    to_pos(buf, idx, pos)
}

/// 1. Step back one char.
/// 2. Skip blanks and newlines backward, stopping at an empty line.
/// 3. Walk back to the start of the token.
fn backward_start(buf: &dyn TextBuffer, pos: Position, classify_fn: Classifier) -> Position {
    let Some(start) = buf.pos_to_index(pos) else {
        return pos;
    };
    if start == 0 || buf.is_empty() {
        return pos;
    }

    let mut idx = start - 1;
    loop {
        match class_at(buf, idx, classify_fn) {
            CharClass::Word | CharClass::Punctuation => break,
            CharClass::Newline if is_empty_line_at(buf, idx) => return to_pos(buf, idx, pos),
            CharClass::Newline | CharClass::Blank => {
                if idx == 0 {
                    return to_pos(buf, 0, pos);
                }
                idx -= 1;
            }
        }
    }

    let class = class_at(buf, idx, classify_fn);
    while idx > 0 && class_at(buf, idx - 1, classify_fn) == class {
        idx -= 1;
    }
    to_pos(buf, idx, pos)
}

/// 1. Advance one char.
/// 2. Skip blanks and newlines (no empty-line stop).
/// 3. Advance to the last char of the token.
fn forward_end(buf: &dyn TextBuffer, pos: Position, classify_fn: Classifier) -> Position {
    let total = buf.len_chars();
    let Some(start) = buf.pos_to_index(pos) else {
        return pos;
    };
    let last = total.saturating_sub(1);
    if total == 0 || start >= last {
        return pos;
    }

    let mut idx = start + 1;
    while idx < total
        && !matches!(class_at(buf, idx, classify_fn), CharClass::Word | CharClass::Punctuation)
    {
        idx += 1;
    }
    if idx >= total {
        return pos;
    }

    let class = class_at(buf, idx, classify_fn);
    while idx < last && class_at(buf, idx + 1, classify_fn) == class {
        idx += 1;
    }
    to_pos(buf, idx, pos)
}

/// 1. Walk back to the start of the current token.
/// 2. Step back over blanks and newlines, stopping at an empty line.
/// 3. Land on the last char of the previous token.
fn backward_end(buf: &dyn TextBuffer, pos: Position, classify_fn: Classifier) -> Position {
    let Some(mut idx) = buf.pos_to_index(pos) else {
        return pos;
    };
    if buf.is_empty() {
        return pos;
    }
    idx = idx.min(buf.len_chars() - 1);

    let class = class_at(buf, idx, classify_fn);
    if matches!(class, CharClass::Word | CharClass::Punctuation) {
        while idx > 0 && class_at(buf, idx - 1, classify_fn) == class {
            idx -= 1;
        }
    }
    if idx == 0 {
        return to_pos(buf, 0, pos);
    }
    idx -= 1;

    loop {
        match class_at(buf, idx, classify_fn) {
            CharClass::Word | CharClass::Punctuation => return to_pos(buf, idx, pos),
            CharClass::Newline if is_empty_line_at(buf, idx) => return to_pos(buf, idx, pos),
            CharClass::Newline | CharClass::Blank => {
                if idx == 0 {
                    return to_pos(buf, 0, pos);
                }
                idx -= 1;
            }
        }
    }
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

    // -- Classification -----------------------------------------------------

    #[test]
    fn classify_chars() {
        assert_eq!(classify('a'), CharClass::Word);
        assert_eq!(classify('_'), CharClass::Word);
        assert_eq!(classify('é'), CharClass::Word);
        assert_eq!(classify('.'), CharClass::Punctuation);
        assert_eq!(classify('\t'), CharClass::Blank);
        assert_eq!(classify('\n'), CharClass::Newline);
        assert_eq!(classify_big('.'), CharClass::Word);
    }

    // -- w / W --------------------------------------------------------------

    #[test]
    fn w_moves_between_words() {
        let buf = Buffer::from_text("hello   world");
        assert_eq!(word_forward(&buf, p(0, 2)), p(0, 8));
    }

    #[test]
    fn w_punctuation_is_its_own_word() {
        let buf = Buffer::from_text("x=y+z");
        assert_eq!(word_forward(&buf, p(0, 0)), p(0, 1));
        assert_eq!(word_forward(&buf, p(0, 1)), p(0, 2));
    }

    #[test]
    fn w_stops_on_empty_line() {
        let buf = Buffer::from_text("hello\n\nworld");
        assert_eq!(word_forward(&buf, p(0, 0)), p(1, 0));
        assert_eq!(word_forward(&buf, p(1, 0)), p(2, 0));
    }

    #[test]
    fn w_skips_whitespace_only_line() {
        let buf = Buffer::from_text("hello\n   \nworld");
        assert_eq!(word_forward(&buf, p(0, 0)), p(2, 0));
    }

    #[test]
    fn w_on_last_word_stays() {
        let buf = Buffer::from_text("hello world");
        assert_eq!(word_forward(&buf, p(0, 6)), p(0, 6));
    }

    #[test]
    fn big_w_treats_punctuation_as_word() {
        let buf = Buffer::from_text("foo.bar baz");
        assert_eq!(big_word_forward(&buf, p(0, 0)), p(0, 8));
    }

    // -- b / B --------------------------------------------------------------

    #[test]
    fn b_moves_to_previous_start() {
        let buf = Buffer::from_text("one two three");
        assert_eq!(word_backward(&buf, p(0, 8)), p(0, 4));
        assert_eq!(word_backward(&buf, p(0, 5)), p(0, 4));
    }

    #[test]
    fn b_crosses_lines_and_stops_on_empty() {
        let buf = Buffer::from_text("hello\n\nworld");
        assert_eq!(word_backward(&buf, p(2, 0)), p(1, 0));
        assert_eq!(word_backward(&buf, p(1, 0)), p(0, 0));
    }

    #[test]
    fn big_b_skips_punctuation() {
        let buf = Buffer::from_text("a foo.bar");
        assert_eq!(big_word_backward(&buf, p(0, 8)), p(0, 2));
    }

    // -- e / E --------------------------------------------------------------

    #[test]
    fn e_moves_to_word_end() {
        let buf = Buffer::from_text("hello world");
        assert_eq!(word_end_forward(&buf, p(0, 0)), p(0, 4));
        assert_eq!(word_end_forward(&buf, p(0, 4)), p(0, 10));
    }

    #[test]
    fn e_crosses_lines() {
        let buf = Buffer::from_text("ab\n\n  cd");
        assert_eq!(word_end_forward(&buf, p(0, 1)), p(2, 3));
    }

    #[test]
    fn big_e_spans_punctuation() {
        let buf = Buffer::from_text("foo.bar baz");
        assert_eq!(big_word_end_forward(&buf, p(0, 0)), p(0, 6));
    }

    // -- ge / gE ------------------------------------------------------------

    #[test]
    fn ge_moves_to_previous_end() {
        let buf = Buffer::from_text("one two three");
        assert_eq!(word_end_backward(&buf, p(0, 9)), p(0, 6));
        assert_eq!(word_end_backward(&buf, p(0, 6)), p(0, 2));
    }

    #[test]
    fn ge_punctuation_boundary() {
        let buf = Buffer::from_text("foo.bar");
        assert_eq!(word_end_backward(&buf, p(0, 5)), p(0, 3));
        assert_eq!(big_word_end_backward(&buf, p(0, 5)), p(0, 0));
    }

    #[test]
    fn ge_crosses_lines_and_stops_on_empty() {
        let buf = Buffer::from_text("abc\n\nxyz");
        assert_eq!(word_end_backward(&buf, p(2, 1)), p(1, 0));
        assert_eq!(word_end_backward(&buf, p(1, 0)), p(0, 2));
    }

    #[test]
    fn ge_at_start_stays() {
        let buf = Buffer::from_text("abc");
        assert_eq!(word_end_backward(&buf, p(0, 1)), p(0, 0));
    }

    // -- keyword_at ---------------------------------------------------------

    #[test]
    fn keyword_under_cursor() {
        let buf = Buffer::from_text("let foo_bar = 1;");
        assert_eq!(keyword_at(&buf, p(0, 6)), Some(("foo_bar".into(), 4)));
    }

    #[test]
    fn keyword_right_of_cursor() {
        let buf = Buffer::from_text("  = value");
        assert_eq!(keyword_at(&buf, p(0, 0)), Some(("value".into(), 4)));
        let buf = Buffer::from_text("x = ;");
        assert_eq!(keyword_at(&buf, p(0, 2)), None);
    }
}
