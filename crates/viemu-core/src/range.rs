//! Command-line ranges: the address prefix of an ex command.
//!
//! ```text
//! range    := '%' | address ((',' | ';') address)?
//! address  := position? (('+' | '-') number?)*
//! position := number | '$' | '.' | "'" mark | '/' pat '/' | '?' pat '?'
//! ```
//!
//! Line numbers in the input are 1-indexed; [`LineRange`] is 0-indexed.
//! A range with nothing after it becomes a `goto` command, so `:42` is
//! `:goto 42`.

use crate::error::{Result, ViError};

/// What the parser needs to know about the buffer.
pub trait RangeContext {
    /// 0-indexed cursor line.
    fn current_line(&self) -> usize;
    /// 0-indexed last line.
    fn last_line(&self) -> usize;
    /// 0-indexed line of mark `mark`.
    fn mark_line(&self, mark: char) -> Option<usize>;
    /// 0-indexed line of the next match of `pattern` after `line` (before
    /// it when `backward`), wrapping around. An empty pattern means the
    /// last search.
    fn search_line(&self, pattern: &str, line: usize, backward: bool) -> Result<usize>;
}

/// Inclusive, 0-indexed line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    #[must_use]
    pub const fn single(line: usize) -> Self {
        Self { start: line, end: line }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start + 1
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        false
    }

    /// `E16` when the span runs past `last_line`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` when the end is beyond the buffer.
    pub const fn check(self, last_line: usize) -> Result<Self> {
        if self.end > last_line {
            Err(ViError::InvalidRange)
        } else {
            Ok(self)
        }
    }
}

/// A command line split into its range and the command that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRange {
    /// `None` when the command had no address.
    pub range: Option<LineRange>,
    /// Command text after the range, leading blanks removed.
    pub command: String,
}

/// Split the range off the front of `input`.
///
/// # Errors
///
/// `InvalidRange` for addresses that fall before line 1, `MarkNotSet` for
/// unset marks, `InvalidAddress` for unterminated searches, and whatever
/// the context's search reports.
pub fn parse_range(input: &str, ctx: &dyn RangeContext) -> Result<ParsedRange> {
    let input = input.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let mut scan = Scanner::new(input);

    let range = if scan.eat('%') {
        Some(LineRange::new(0, ctx.last_line()))
    } else {
        parse_pair(&mut scan, ctx)?
    };

    let command = scan.rest().trim_start().to_string();
    let command = match range {
        Some(r) if command.is_empty() => format!("goto {}", r.end + 1),
        _ => command,
    };
    Ok(ParsedRange { range, command })
}

fn parse_pair(scan: &mut Scanner, ctx: &dyn RangeContext) -> Result<Option<LineRange>> {
    let current = ctx.current_line();
    let first = parse_address_at(scan, ctx, current)?;
    let sep = match scan.peek() {
        Some(c @ (',' | ';')) => {
            scan.next();
            c
        }
        _ => return Ok(first.map(|a| LineRange::single(to_line(a)))),
    };
    // `,5` starts at the current line and `5,` ends there.
    let first_line = first.map_or(current, to_line);
    let base = if sep == ';' { first_line } else { current };
    let second = parse_address_at(scan, ctx, base)?.map_or(base, to_line);
    Ok(Some(LineRange::new(first_line, second)))
}

/// 1-indexed address to 0-indexed line. Address 0 means line 1.
const fn to_line(addr: usize) -> usize {
    addr.saturating_sub(1)
}

/// Parse one address at the front of `input` and return it (1-indexed, may
/// be 0) with the remaining text. Used for destinations like `:m 0`.
///
/// # Errors
///
/// As [`parse_range`].
pub fn parse_address<'a>(input: &'a str, ctx: &dyn RangeContext) -> Result<Option<(usize, &'a str)>> {
    let mut scan = Scanner::new(input.trim_start());
    let addr = parse_address_at(&mut scan, ctx, ctx.current_line())?;
    let consumed = scan.consumed_bytes();
    Ok(addr.map(|a| (a, &input.trim_start()[consumed..])))
}

/// One address. `base` is the 0-indexed line that `.`-relative parts and
/// searches start from. Returns a 1-indexed line number.
fn parse_address_at(
    scan: &mut Scanner,
    ctx: &dyn RangeContext,
    base: usize,
) -> Result<Option<usize>> {
    let mut value: Option<i64> = match scan.peek() {
        Some(c) if c.is_ascii_digit() => Some(scan.number()),
        Some('.') => {
            scan.next();
            Some(as_addr(base))
        }
        Some('$') => {
            scan.next();
            Some(as_addr(ctx.last_line()))
        }
        Some('\'') => {
            scan.next();
            let mark = scan.next().ok_or(ViError::InvalidAddress)?;
            let line = ctx.mark_line(mark).ok_or(ViError::MarkNotSet)?;
            Some(as_addr(line))
        }
        Some(delim @ ('/' | '?')) => {
            scan.next();
            let pattern = scan.until_unescaped(delim);
            let line = ctx.search_line(&pattern, base, delim == '?')?;
            Some(as_addr(line))
        }
        _ => None,
    };

    loop {
        let sign = match scan.peek() {
            Some('+') => 1,
            Some('-') => -1,
            _ => break,
        };
        scan.next();
        let amount = if scan.peek().is_some_and(|c| c.is_ascii_digit()) {
            scan.number()
        } else {
            1
        };
        value = Some(value.unwrap_or_else(|| as_addr(base)) + sign * amount);
    }

    match value {
        None => Ok(None),
        Some(v) if v < 0 => Err(ViError::InvalidRange),
        Some(v) => Ok(Some(usize::try_from(v).map_err(|_| ViError::InvalidRange)?)),
    }
}

fn as_addr(line: usize) -> i64 {
    i64::try_from(line).map_or(i64::MAX, |l| l + 1)
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> i64 {
        let mut n: i64 = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            n = n.saturating_mul(10).saturating_add(i64::from(d));
            self.pos += 1;
        }
        n
    }

    /// Text up to the next unescaped `delim`, which is consumed. `\delim`
    /// becomes `delim`. Runs to the end when there is no closing delimiter.
    fn until_unescaped(&mut self, delim: char) -> String {
        let mut out = String::new();
        while let Some(ch) = self.next() {
            if ch == delim {
                break;
            }
            if ch == '\\' {
                match self.next() {
                    Some(n) if n == delim => out.push(n),
                    Some(n) => {
                        out.push('\\');
                        out.push(n);
                    }
                    None => out.push('\\'),
                }
                continue;
            }
            out.push(ch);
        }
        out
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    const fn consumed_bytes(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        current: usize,
        lines: Vec<&'static str>,
    }

    impl RangeContext for Ctx {
        fn current_line(&self) -> usize {
            self.current
        }

        fn last_line(&self) -> usize {
            self.lines.len() - 1
        }

        fn mark_line(&self, mark: char) -> Option<usize> {
            match mark {
                'a' => Some(2),
                '<' => Some(1),
                '>' => Some(3),
                _ => None,
            }
        }

        fn search_line(&self, pattern: &str, line: usize, backward: bool) -> Result<usize> {
            let n = self.lines.len();
            (1..=n)
                .map(|i| if backward { (line + n * 2 - i) % n } else { (line + i) % n })
                .find(|l| self.lines[*l].contains(pattern))
                .ok_or_else(|| ViError::PatternNotFound(pattern.to_string()))
        }
    }

    fn ctx() -> Ctx {
        Ctx {
            current: 4,
            lines: vec!["zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine"],
        }
    }

    fn parse(input: &str) -> ParsedRange {
        parse_range(input, &ctx()).unwrap()
    }

    // -- Basic forms --------------------------------------------------------

    #[test]
    fn numeric_pair_with_command() {
        let r = parse("1,5d");
        assert_eq!(r.range, Some(LineRange::new(0, 4)));
        assert_eq!(r.command, "d");
    }

    #[test]
    fn percent_is_whole_document() {
        let r = parse("%s/a/b/");
        assert_eq!(r.range, Some(LineRange::new(0, 9)));
        assert_eq!(r.command, "s/a/b/");
    }

    #[test]
    fn bare_number_becomes_goto() {
        let r = parse("42");
        assert_eq!(r.command, "goto 42");
        assert_eq!(r.range, Some(LineRange::single(41)));
    }

    #[test]
    fn no_range_leaves_command_alone() {
        let r = parse("  write foo");
        assert_eq!(r.range, None);
        assert_eq!(r.command, "write foo");
    }

    // -- Positions ----------------------------------------------------------

    #[test]
    fn dot_and_dollar() {
        assert_eq!(parse(".,$").range, Some(LineRange::new(4, 9)));
        assert_eq!(parse("$").command, "goto 10");
    }

    #[test]
    fn offsets_accumulate() {
        assert_eq!(parse(".+2").range, Some(LineRange::single(6)));
        assert_eq!(parse(".-1,.+1d").range, Some(LineRange::new(3, 5)));
        assert_eq!(parse("+,++").range, Some(LineRange::new(5, 6)));
        assert_eq!(parse("$-2").range, Some(LineRange::single(7)));
    }

    #[test]
    fn marks() {
        assert_eq!(parse("'<,'>s/x/y/").range, Some(LineRange::new(1, 3)));
        assert_eq!(parse("'a").range, Some(LineRange::single(2)));
        assert_eq!(parse_range("'z", &ctx()), Err(ViError::MarkNotSet));
    }

    #[test]
    fn searches() {
        assert_eq!(parse("/six/d").range, Some(LineRange::single(6)));
        assert_eq!(parse("?one?").range, Some(LineRange::single(1)));
        assert_eq!(parse("/two/,/four/").range, Some(LineRange::new(2, 4)));
    }

    #[test]
    fn semicolon_moves_the_base() {
        assert_eq!(parse("2;+3").range, Some(LineRange::new(1, 4)));
        assert_eq!(parse("2,+3").range, Some(LineRange::new(1, 7)));
    }

    #[test]
    fn backwards_range_is_swapped() {
        assert_eq!(parse("5,2d").range, Some(LineRange::new(1, 4)));
    }

    #[test]
    fn before_first_line_is_invalid() {
        assert_eq!(parse_range(".-9", &ctx()), Err(ViError::InvalidRange));
    }

    #[test]
    fn destination_address_allows_zero() {
        let c = ctx();
        assert_eq!(parse_address("0", &c).unwrap(), Some((0, "")));
        assert_eq!(parse_address(" $ rest", &c).unwrap(), Some((10, " rest")));
        assert_eq!(parse_address("x", &c).unwrap(), None);
    }

    #[test]
    fn check_against_buffer() {
        assert_eq!(LineRange::new(0, 12).check(9), Err(ViError::InvalidRange));
        assert_eq!(LineRange::new(2, 3).len(), 2);
    }
}
