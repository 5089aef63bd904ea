//! Search: directional, counted, wrapping pattern search.
//!
//! Patterns are written in Vi syntax and go through [`crate::pattern`]
//! before reaching the buffer's regex primitive.
//!
//! # Directions
//!
//! A forward search starts one char *after* the cursor, so repeating it
//! moves on to the next match. A backward search wants the *last* match
//! starting strictly before the cursor. The buffer primitive only finds the
//! first match after a point, so backward search walks lines upward and
//! re-queries each line until it runs out of matches before the bound.
//!
//! On a miss either direction wraps around the document (`wrapscan`), or
//! fails with `E384`/`E385`.

use regex::Regex;

use crate::error::{Result, ViError};
use crate::host::{SearchHit, TextBuffer};
use crate::pattern::{self, Translation};
use crate::position::Position;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Search direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

impl SearchDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    /// Prompt char for the command line.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Forward => '/',
            Self::Backward => '?',
        }
    }
}

// ---------------------------------------------------------------------------
// SearchParams
// ---------------------------------------------------------------------------

/// A search as typed: pattern plus how to run it.
///
/// The last completed search is kept in the session and reused by `n`,
/// `N`, `/<CR>` and `:s//`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Pattern in Vi syntax, before translation.
    pub pattern: String,
    pub direction: SearchDirection,
    /// Match case exactly. Resolved from the pattern and options when the
    /// search was made.
    pub case_sensitive: bool,
    /// Put the cursor on the last char of the match (`/pat/e`).
    pub to_end: bool,
}

impl SearchParams {
    /// Build params for `pattern`, deciding case sensitivity now.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` for patterns the translator rejects.
    pub fn new(
        pattern: &str,
        direction: SearchDirection,
        ignorecase: bool,
        smartcase: bool,
    ) -> Result<Self> {
        let t = pattern::translate(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            direction,
            case_sensitive: t.case_sensitive(ignorecase, smartcase),
            to_end: false,
        })
    }

    /// Compile the pattern.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` when the translated regex does not compile.
    pub fn regex(&self) -> Result<Regex> {
        let t: Translation = pattern::translate(&self.pattern)?;
        pattern::build(&t, self.case_sensitive)
    }
}

/// Split command-line search input at the first unescaped `delim`.
///
/// `pat/e` returns `("pat", true)`: the cursor goes to the match end. Any
/// other offset text is ignored.
#[must_use]
pub fn split_offset(input: &str, delim: char) -> (String, bool) {
    let mut pat = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) if next == delim => pat.push(next),
                Some(next) => {
                    pat.push('\\');
                    pat.push(next);
                }
                None => pat.push('\\'),
            }
        } else if ch == delim {
            let offset: String = chars.collect();
            return (pat, offset.trim_start().starts_with('e'));
        } else {
            pat.push(ch);
        }
    }
    (pat, false)
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// A successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub hit: SearchHit,
    /// The search passed the end (or start) of the document.
    pub wrapped: bool,
}

impl Found {
    /// Where the cursor should land.
    #[must_use]
    pub fn cursor(&self, buf: &dyn TextBuffer, to_end: bool) -> Position {
        let range = self.hit.range;
        if !to_end || range.is_empty() {
            return range.start;
        }
        buf.pos_to_index(range.end)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| buf.index_to_pos(idx))
            .unwrap_or(range.start)
    }
}

/// Run a counted search from `from`.
///
/// # Errors
///
/// `PatternNotFound` when nothing matches, `HitBottom`/`HitTop` when the
/// next match needs a wrap and `wrapscan` is off.
pub fn find_pattern(
    buf: &dyn TextBuffer,
    re: &Regex,
    pattern: &str,
    from: Position,
    direction: SearchDirection,
    count: usize,
    wrapscan: bool,
) -> Result<Found> {
    let mut at = from;
    let mut wrapped = false;
    let mut last = None;
    for _ in 0..count.max(1) {
        let step = match direction {
            SearchDirection::Forward => step_forward(buf, re, at),
            SearchDirection::Backward => step_backward(buf, re, at),
        };
        let (hit, did_wrap) = step.ok_or_else(|| ViError::PatternNotFound(pattern.to_string()))?;
        if did_wrap && !wrapscan {
            return Err(match direction {
                SearchDirection::Forward => ViError::HitBottom(pattern.to_string()),
                SearchDirection::Backward => ViError::HitTop(pattern.to_string()),
            });
        }
        wrapped |= did_wrap;
        at = hit.range.start;
        last = Some(hit);
    }
    if wrapped {
        tracing::debug!(pattern, ?direction, "search wrapped");
    }
    last.map(|hit| Found { hit, wrapped })
        .ok_or_else(|| ViError::PatternNotFound(pattern.to_string()))
}

/// First match starting after `from`, wrapping to the top on a miss.
fn step_forward(buf: &dyn TextBuffer, re: &Regex, from: Position) -> Option<(SearchHit, bool)> {
    let end = buf.end_position();
    let start = buf
        .pos_to_index(buf.clamp(from))
        .and_then(|idx| buf.index_to_pos(idx + 1));
    if let Some(start) = start
        && let Some(hit) = buf.find(re, start, end)
    {
        return Some((hit, false));
    }
    buf.find(re, Position::ZERO, end).map(|hit| (hit, true))
}

/// Last match starting before `from`, wrapping to the bottom on a miss.
fn step_backward(buf: &dyn TextBuffer, re: &Regex, from: Position) -> Option<(SearchHit, bool)> {
    let from = buf.clamp(from);
    if let Some(hit) = last_before(buf, re, from, false) {
        return Some((hit, false));
    }
    last_before(buf, re, buf.end_position(), true).map(|hit| (hit, true))
}

/// Last match whose start is before `bound` (or at it, when `inclusive`).
fn last_before(
    buf: &dyn TextBuffer,
    re: &Regex,
    bound: Position,
    inclusive: bool,
) -> Option<SearchHit> {
    for line in (0..=bound.line).rev() {
        let limit = if line == bound.line {
            bound
        } else if line < buf.last_line() {
            Position::new(line + 1, 0)
        } else {
            buf.end_position()
        };
        let mut best = None;
        let mut from = Position::new(line, 0);
        while let Some(hit) = buf.find(re, from, limit) {
            let start = hit.range.start;
            if start > limit || (start == limit && !inclusive && line == bound.line) {
                break;
            }
            best = Some(hit);
            let Some(next) = buf
                .pos_to_index(start)
                .and_then(|idx| buf.index_to_pos(idx + 1))
            else {
                break;
            };
            if next <= from || next > limit {
                break;
            }
            from = next;
        }
        if best.is_some() {
            return best;
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

    fn search(
        text: &str,
        pat: &str,
        from: Position,
        dir: SearchDirection,
        count: usize,
    ) -> Result<Found> {
        let buf = Buffer::from_text(text);
        let re = pattern::compile(pat, true, true)?;
        find_pattern(&buf, &re, pat, from, dir, count, true)
    }

    fn start(found: &Result<Found>) -> Position {
        found.as_ref().unwrap().hit.range.start
    }

    // -- Direction ----------------------------------------------------------

    #[test]
    fn direction_opposite_and_prefix() {
        assert_eq!(SearchDirection::Forward.opposite(), SearchDirection::Backward);
        assert_eq!(SearchDirection::Backward.prefix(), '?');
    }

    // -- Forward ------------------------------------------------------------

    #[test]
    fn forward_skips_match_under_cursor() {
        let r = search("foo foo", "foo", p(0, 0), SearchDirection::Forward, 1);
        assert_eq!(start(&r), p(0, 4));
    }

    #[test]
    fn forward_counts() {
        let r = search("a x a x a x a", "a", p(0, 0), SearchDirection::Forward, 3);
        assert_eq!(start(&r), p(0, 12));
    }

    #[test]
    fn forward_wraps_to_top() {
        let r = search("foo\nbar\nbaz", "foo", p(1, 0), SearchDirection::Forward, 1);
        let found = r.unwrap();
        assert_eq!(found.hit.range.start, p(0, 0));
        assert!(found.wrapped);
    }

    #[test]
    fn forward_no_wrapscan_reports_bottom() {
        let buf = Buffer::from_text("foo\nbar");
        let re = pattern::compile("foo", true, true).unwrap();
        let r = find_pattern(&buf, &re, "foo", p(1, 0), SearchDirection::Forward, 1, false);
        assert_eq!(r, Err(ViError::HitBottom("foo".into())));
    }

    #[test]
    fn missing_pattern_is_not_found() {
        let r = search("abc", "zzz", p(0, 0), SearchDirection::Forward, 1);
        assert_eq!(r, Err(ViError::PatternNotFound("zzz".into())));
    }

    #[test]
    fn sole_match_under_cursor_is_found_after_wrap() {
        let r = search("xx foo", "foo", p(0, 3), SearchDirection::Forward, 1);
        assert_eq!(start(&r), p(0, 3));
    }

    // -- Backward -----------------------------------------------------------

    #[test]
    fn backward_finds_last_match_before_cursor() {
        let r = search("ab ab ab ab", "ab", p(0, 7), SearchDirection::Backward, 1);
        assert_eq!(start(&r), p(0, 6));
    }

    #[test]
    fn backward_from_match_start_goes_to_previous() {
        let r = search("ab ab", "ab", p(0, 3), SearchDirection::Backward, 1);
        assert_eq!(start(&r), p(0, 0));
    }

    #[test]
    fn backward_crosses_lines() {
        let r = search("foo x\nbar\nfoo", "foo", p(2, 0), SearchDirection::Backward, 1);
        assert_eq!(start(&r), p(0, 0));
    }

    #[test]
    fn backward_counts() {
        let r = search("a\na\na\na", "a", p(3, 0), SearchDirection::Backward, 2);
        assert_eq!(start(&r), p(1, 0));
    }

    #[test]
    fn backward_wraps_to_bottom() {
        let r = search("x\nfoo y foo", "foo", p(0, 0), SearchDirection::Backward, 1);
        let found = r.unwrap();
        assert_eq!(found.hit.range.start, p(1, 6));
        assert!(found.wrapped);
    }

    #[test]
    fn backward_with_line_anchor() {
        let r = search("foo\nbar\nfoo", "^foo", p(2, 1), SearchDirection::Backward, 1);
        assert_eq!(start(&r), p(2, 0));
    }

    // -- Input parsing ------------------------------------------------------

    #[test]
    fn split_offset_recognises_end_flag() {
        assert_eq!(split_offset("foo/e", '/'), ("foo".to_string(), true));
        assert_eq!(split_offset("foo", '/'), ("foo".to_string(), false));
        assert_eq!(split_offset(r"a\/b/", '/'), ("a/b".to_string(), false));
        assert_eq!(split_offset(r"a\.b", '/'), (r"a\.b".to_string(), false));
    }

    #[test]
    fn cursor_at_match_end() {
        let buf = Buffer::from_text("xx foobar");
        let re = pattern::compile("foo", true, true).unwrap();
        let found = find_pattern(&buf, &re, "foo", p(0, 0), SearchDirection::Forward, 1, true).unwrap();
        assert_eq!(found.cursor(&buf, true), p(0, 5));
        assert_eq!(found.cursor(&buf, false), p(0, 3));
    }

    #[test]
    fn params_fix_case_at_creation() {
        let params = SearchParams::new("Foo", SearchDirection::Forward, true, true).unwrap();
        assert!(params.case_sensitive);
        assert!(!params.regex().unwrap().is_match("foo"));
    }
}
