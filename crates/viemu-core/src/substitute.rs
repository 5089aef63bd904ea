//! `:s`: parse and run `s/find/replace/flags`.
//!
//! The delimiter is whatever char follows the `s`, as long as it is not a
//! letter, digit, blank, `\`, `"` or `|`. `_` works. `\<delim>` inside the
//! pattern or replacement is a literal delimiter.
//!
//! # Flags
//!
//! | Flag | Effect |
//! |------|--------|
//! | `g` | every match on a line, not just the first |
//! | `i` / `I` | ignore case / match case |
//! | `c` | confirm each match (`y n a q l`) |
//! | `n` | count matches, change nothing |
//! | `e` | no error when nothing matches |
//! | `&` | keep the flags of the previous substitution (must come first) |
//!
//! # Replacement escapes
//!
//! `&` and `\0` are the whole match, `\1`..`\9` groups, `\n`/`\r` a line
//! break, `\t` a tab, `\u`/`\l` change the case of the next char, `\U`/`\L`
//! of everything up to `\E`/`\e`.
//!
//! Running a substitution re-anchors after every replacement: the line span
//! still to search grows or shrinks by the number of line breaks the
//! replacement added or removed, and searching resumes just past the
//! inserted text (one char further for an empty match).

use regex::Regex;

use crate::error::{Result, ViError};
use crate::host::{SearchHit, TextBuffer};
use crate::position::Position;
use crate::range::LineRange;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Flags after the last delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubFlags {
    pub global: bool,
    /// `Some(true)` for `i`, `Some(false)` for `I`.
    pub ignore_case: Option<bool>,
    pub confirm: bool,
    pub count_only: bool,
    pub no_error: bool,
    /// `&`: merge with the previous substitution's flags.
    pub keep: bool,
}

impl SubFlags {
    /// Combine with the previous substitution's flags when `&` was given.
    #[must_use]
    pub fn merged_with(self, previous: Self) -> Self {
        if !self.keep {
            return self;
        }
        Self {
            global: self.global || previous.global,
            ignore_case: self.ignore_case.or(previous.ignore_case),
            confirm: self.confirm || previous.confirm,
            count_only: self.count_only || previous.count_only,
            no_error: self.no_error || previous.no_error,
            keep: false,
        }
    }
}

/// A parsed `:s` command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Substitution {
    /// Vi pattern. Empty means "last search pattern".
    pub pattern: String,
    pub replacement: String,
    pub flags: SubFlags,
    /// Trailing count: operate on this many lines from the range end.
    pub count: Option<usize>,
}

/// What `:s` asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubCommand {
    /// `s/pat/rep/flags`.
    Full(Substitution),
    /// `:s`, `:s g`, `:&&`: the previous substitution with new flags.
    Repeat { flags: SubFlags, count: Option<usize> },
}

/// Whether `delim` may separate the parts of an `s` command.
#[must_use]
pub fn is_valid_delimiter(delim: char) -> bool {
    !(delim.is_alphanumeric() || delim.is_whitespace() || matches!(delim, '\\' | '"' | '|'))
}

/// Parse what follows the `s` (or `&`).
///
/// # Errors
///
/// `InvalidDelimiter` when the first char cannot delimit,
/// `TrailingCharacters` for junk after the flags.
pub fn parse_substitute(body: &str) -> Result<SubCommand> {
    let Some(delim) = body.chars().next() else {
        return Ok(SubCommand::Repeat { flags: SubFlags::default(), count: None });
    };
    if delim == '&' || delim.is_whitespace() || delim.is_ascii_digit() || "gciIne".contains(delim) {
        // `&&` is the `:&` command spelled out, then its keep flag.
        let text = body.trim();
        let text = text.strip_prefix('&').filter(|r| r.starts_with('&')).unwrap_or(text);
        let (flags, count) = parse_flags(text)?;
        return Ok(SubCommand::Repeat { flags, count });
    }
    if !is_valid_delimiter(delim) {
        return Err(ViError::InvalidDelimiter);
    }
    let after = &body[delim.len_utf8()..];

    let Some((pattern, rest)) = split_at_unescaped(after, delim) else {
        return Ok(SubCommand::Full(Substitution {
            pattern: unescape_delim(after, delim),
            ..Substitution::default()
        }));
    };
    let Some((replacement, rest)) = split_at_unescaped(rest, delim) else {
        return Ok(SubCommand::Full(Substitution {
            pattern: unescape_delim(pattern, delim),
            replacement: unescape_delim(rest, delim),
            ..Substitution::default()
        }));
    };
    let (flags, count) = parse_flags(rest)?;
    Ok(SubCommand::Full(Substitution {
        pattern: unescape_delim(pattern, delim),
        replacement: unescape_delim(replacement, delim),
        flags,
        count,
    }))
}

/// Split `s` at the first unescaped `delim`.
fn split_at_unescaped(s: &str, delim: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (byte_idx, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == delim {
            return Some((&s[..byte_idx], &s[byte_idx + ch.len_utf8()..]));
        }
    }
    None
}

/// `\<delim>` becomes `<delim>`; every other escape stays for the next stage.
fn unescape_delim(s: &str, delim: char) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\'
            && let Some(&next) = chars.peek()
        {
            chars.next();
            if next != delim {
                result.push('\\');
            }
            result.push(next);
            continue;
        }
        result.push(ch);
    }
    result
}

/// Flags, then an optional count.
///
/// # Errors
///
/// `TrailingCharacters` when anything else follows.
pub fn parse_flags(s: &str) -> Result<(SubFlags, Option<usize>)> {
    let mut flags = SubFlags::default();
    let mut rest = s;
    if let Some(r) = rest.strip_prefix('&') {
        flags.keep = true;
        rest = r;
    }
    let mut consumed = 0;
    for ch in rest.chars() {
        match ch {
            'g' => flags.global = !flags.global,
            'i' => flags.ignore_case = Some(true),
            'I' => flags.ignore_case = Some(false),
            'c' => flags.confirm = true,
            'n' => flags.count_only = true,
            'e' => flags.no_error = true,
            _ => break,
        }
        consumed += ch.len_utf8();
    }
    let rest = rest[consumed..].trim();
    if rest.is_empty() {
        return Ok((flags, None));
    }
    match rest.parse::<usize>() {
        Ok(n) if n > 0 => Ok((flags, Some(n))),
        _ => Err(ViError::TrailingCharacters(rest.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Replacement text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Case {
    #[default]
    Keep,
    Upper,
    Lower,
}

/// `\u`/`\l` apply to one char, `\U`/`\L` until `\E`.
#[derive(Debug, Default)]
struct CaseState {
    next: Case,
    span: Case,
}

impl CaseState {
    fn push(&mut self, out: &mut String, text: &str) {
        for ch in text.chars() {
            let mode = match std::mem::take(&mut self.next) {
                Case::Keep => self.span,
                once => once,
            };
            match mode {
                Case::Upper => out.extend(ch.to_uppercase()),
                Case::Lower => out.extend(ch.to_lowercase()),
                Case::Keep => out.push(ch),
            }
        }
    }
}

/// Expand `template` for one match.
#[must_use]
pub fn expand_replacement(template: &str, hit: &SearchHit, buf: &dyn TextBuffer) -> String {
    let group = |n: usize| hit.group(n).map(|r| buf.text(r)).unwrap_or_default();
    let mut out = String::with_capacity(template.len());
    let mut case = CaseState::default();
    let mut buf4 = [0u8; 4];

    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '&' => case.push(&mut out, &group(0)),
            '\\' => match chars.next() {
                Some(d @ '0'..='9') => {
                    let n = d.to_digit(10).map_or(0, |n| n as usize);
                    case.push(&mut out, &group(n));
                }
                Some('n' | 'r') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('u') => case.next = Case::Upper,
                Some('l') => case.next = Case::Lower,
                Some('U') => case.span = Case::Upper,
                Some('L') => case.span = Case::Lower,
                Some('E' | 'e') => case.span = Case::Keep,
                Some(other) => case.push(&mut out, other.encode_utf8(&mut buf4)),
                None => out.push('\\'),
            },
            other => case.push(&mut out, other.encode_utf8(&mut buf4)),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Totals of a finished (or stopped) substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubStats {
    /// Replacements made (or matches counted with `n`).
    pub count: usize,
    /// Distinct lines touched.
    pub lines: usize,
    /// Just past the text of the final replacement.
    pub last_end: Option<Position>,
    /// Start of the final replacement.
    pub last_start: Option<Position>,
}

impl SubStats {
    /// Status line text, e.g. `3 substitutions on 2 lines`.
    #[must_use]
    pub fn message(&self, count_only: bool) -> String {
        let noun = if count_only { "match" } else { "substitution" };
        let plural = |n: usize, word: &str| {
            if n == 1 {
                format!("{n} {word}")
            } else if word.ends_with('h') {
                format!("{n} {word}es")
            } else {
                format!("{n} {word}s")
            }
        };
        format!("{} on {}", plural(self.count, noun), plural(self.lines, "line"))
    }
}

/// Walks the matches of one substitution over a line span.
///
/// The caller wraps the whole run in one edit transaction.
#[derive(Debug, Clone)]
pub struct Replacer {
    re: Regex,
    template: String,
    global: bool,
    count_only: bool,
    from: Position,
    end_line: usize,
    done: bool,
    /// End of the previous non-empty match: no empty match may start here.
    no_empty_at: Option<Position>,
    last_counted_line: Option<usize>,
    stats: SubStats,
}

impl Replacer {
    #[must_use]
    pub fn new(re: Regex, template: &str, flags: SubFlags, range: LineRange) -> Self {
        Self {
            re,
            template: template.to_string(),
            global: flags.global,
            count_only: flags.count_only,
            from: Position::new(range.start, 0),
            end_line: range.end,
            done: false,
            no_empty_at: None,
            last_counted_line: None,
            stats: SubStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> SubStats {
        self.stats
    }

    /// Next match still to act on.
    pub fn next_match(&mut self, buf: &dyn TextBuffer) -> Option<SearchHit> {
        loop {
            if self.done || self.from.line > self.end_line || self.from.line > buf.last_line() {
                return None;
            }
            let limit = if self.end_line < buf.last_line() {
                Position::new(self.end_line + 1, 0)
            } else {
                buf.end_position()
            };
            let hit = buf.find(&self.re, self.from, limit)?;
            if hit.range.start.line > self.end_line {
                return None;
            }
            if hit.range.is_empty() && self.no_empty_at == Some(hit.range.start) {
                self.advance(buf, hit.range.start, true);
                continue;
            }
            return Some(hit);
        }
    }

    /// Replace `hit` (from [`next_match`](Self::next_match)).
    pub fn replace(&mut self, buf: &mut dyn TextBuffer, hit: &SearchHit) {
        if self.count_only {
            self.count(hit.range.start.line);
            self.stats.last_start = Some(hit.range.start);
            self.stats.last_end = Some(hit.range.end);
            self.advance(buf, hit.range.end, hit.range.is_empty());
            return;
        }
        let text = expand_replacement(&self.template, hit, buf);
        let start = hit.range.start;
        let removed = hit.range.end.line - start.line;
        let added = text.matches('\n').count();
        buf.remove(hit.range);
        buf.insert(start, &text);

        let after = start.after_text(&text);
        self.end_line = (self.end_line + added).saturating_sub(removed).max(after.line);
        self.count(start.line);
        self.last_counted_line = Some(after.line);
        self.stats.last_start = Some(start);
        self.stats.last_end = Some(after);
        self.advance(buf, after, hit.range.is_empty());
    }

    /// Leave `hit` alone and move on.
    pub fn skip(&mut self, buf: &dyn TextBuffer, hit: &SearchHit) {
        self.advance(buf, hit.range.end, hit.range.is_empty());
    }

    /// Replace every remaining match.
    pub fn run_all(&mut self, buf: &mut dyn TextBuffer) -> SubStats {
        while let Some(hit) = self.next_match(buf) {
            self.replace(buf, &hit);
        }
        self.stats
    }

    /// Stop: `next_match` returns `None` from now on.
    pub const fn stop(&mut self) {
        self.done = true;
    }

    fn count(&mut self, line: usize) {
        self.stats.count += 1;
        if self.last_counted_line != Some(line) {
            self.stats.lines += 1;
        }
        self.last_counted_line = Some(line);
    }

    /// Continue after `at`. Empty matches step one more char so the same
    /// spot is not matched again; without `g` the rest of the line is
    /// skipped.
    fn advance(&mut self, buf: &dyn TextBuffer, at: Position, empty: bool) {
        self.no_empty_at = (!empty).then_some(at);
        if !self.global {
            self.from = Position::new(at.line + 1, 0);
            return;
        }
        if !empty {
            self.from = at;
            return;
        }
        match buf.pos_to_index(at).and_then(|idx| buf.index_to_pos(idx + 1)) {
            Some(next) => self.from = next,
            None => self.done = true,
        }
    }
}

/// Answer to a confirm prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// `y`: replace, go on.
    Yes,
    /// `n`: skip, go on.
    No,
    /// `a`: replace this and all the rest.
    All,
    /// `q` / `<Esc>`: stop.
    Quit,
    /// `l`: replace this one, then stop.
    Last,
}

impl Answer {
    #[must_use]
    pub const fn from_char(ch: char) -> Option<Self> {
        match ch {
            'y' => Some(Self::Yes),
            'n' => Some(Self::No),
            'a' => Some(Self::All),
            'q' | '\u{1b}' => Some(Self::Quit),
            'l' => Some(Self::Last),
            _ => None,
        }
    }
}

/// A `c`-flag substitution waiting for answers.
#[derive(Debug, Clone)]
pub struct Interactive {
    replacer: Replacer,
    current: Option<SearchHit>,
}

impl Interactive {
    /// Find the first match. Check [`current`](Self::current) for `None`
    /// to see whether there was anything to confirm.
    pub fn start(mut replacer: Replacer, buf: &dyn TextBuffer) -> Self {
        let current = replacer.next_match(buf);
        Self { replacer, current }
    }

    /// The match being asked about.
    #[must_use]
    pub const fn current(&self) -> Option<&SearchHit> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn stats(&self) -> SubStats {
        self.replacer.stats()
    }

    /// Apply one answer. Returns `false` once the pass is over.
    pub fn respond(&mut self, buf: &mut dyn TextBuffer, answer: Answer) -> bool {
        let Some(hit) = self.current.take() else {
            return false;
        };
        match answer {
            Answer::Yes => self.replacer.replace(buf, &hit),
            Answer::No => self.replacer.skip(buf, &hit),
            Answer::All => {
                self.replacer.replace(buf, &hit);
                self.replacer.run_all(buf);
            }
            Answer::Last => {
                self.replacer.replace(buf, &hit);
                self.replacer.stop();
            }
            Answer::Quit => self.replacer.stop(),
        }
        self.current = self.replacer.next_match(buf);
        self.current.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::pattern;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn full(body: &str) -> Substitution {
        match parse_substitute(body).unwrap() {
            SubCommand::Full(s) => s,
            SubCommand::Repeat { .. } => panic!("expected a full substitution"),
        }
    }

    fn run(text: &str, pat: &str, rep: &str, global: bool, range: LineRange) -> (String, SubStats) {
        let mut buf = Buffer::from_text(text);
        let re = pattern::compile(pat, false, false).unwrap();
        let flags = SubFlags { global, ..SubFlags::default() };
        let stats = Replacer::new(re, rep, flags, range).run_all(&mut buf);
        (buf.contents(), stats)
    }

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn parse_with_flags() {
        let s = full("/foo/bar/gi");
        assert_eq!(s.pattern, "foo");
        assert_eq!(s.replacement, "bar");
        assert!(s.flags.global);
        assert_eq!(s.flags.ignore_case, Some(true));
    }

    #[test]
    fn parse_custom_delimiter_keeps_slash_literal() {
        let s = full("#a/b#c#");
        assert_eq!(s.pattern, "a/b");
        assert_eq!(s.replacement, "c");
    }

    #[test]
    fn parse_underscore_delimiter() {
        let s = full("_x_y_");
        assert_eq!((s.pattern.as_str(), s.replacement.as_str()), ("x", "y"));
    }

    #[test]
    fn parse_escaped_delimiter() {
        let s = full(r"/a\/b/c\/d/");
        assert_eq!(s.pattern, "a/b");
        assert_eq!(s.replacement, "c/d");
        let s = full(r"/a\.b/x/");
        assert_eq!(s.pattern, r"a\.b");
    }

    #[test]
    fn parse_missing_parts() {
        let s = full("/foo");
        assert_eq!(s.replacement, "");
        let s = full("/foo/bar");
        assert_eq!(s.replacement, "bar");
        assert_eq!(s.flags, SubFlags::default());
    }

    #[test]
    fn parse_count_and_trailing() {
        assert_eq!(full("/a/b/g 3").count, Some(3));
        assert_eq!(
            parse_substitute("/a/b/gz"),
            Err(ViError::TrailingCharacters("z".into()))
        );
    }

    #[test]
    fn parse_rejects_letter_delimiters() {
        assert_eq!(parse_substitute("xaxbx"), Err(ViError::InvalidDelimiter));
    }

    #[test]
    fn parse_repeat_forms() {
        assert_eq!(
            parse_substitute("").unwrap(),
            SubCommand::Repeat { flags: SubFlags::default(), count: None }
        );
        let SubCommand::Repeat { flags, .. } = parse_substitute("&&").unwrap() else {
            panic!("expected repeat");
        };
        assert!(flags.keep);
        let SubCommand::Repeat { flags, .. } = parse_substitute(" g").unwrap() else {
            panic!("expected repeat");
        };
        assert!(flags.global);
    }

    #[test]
    fn keep_merges_previous_flags() {
        let prev = SubFlags { global: true, ..SubFlags::default() };
        let now = SubFlags { keep: true, ..SubFlags::default() };
        assert!(now.merged_with(prev).global);
        assert!(!SubFlags::default().merged_with(prev).global);
    }

    // -- Replacement --------------------------------------------------------

    #[test]
    fn replacement_escapes() {
        let (out, _) = run("john smith", r"\(\w\+\) \(\w\+\)", r"\u\2, \U\1\E!", false, LineRange::single(0));
        assert_eq!(out, "Smith, JOHN!");
        let (out, _) = run("a-b", "-", r"[&]\t\\", false, LineRange::single(0));
        assert_eq!(out, "a[-]\t\\b");
    }

    #[test]
    fn replacement_line_break() {
        let (out, stats) = run("a,b,c", ",", r"\r", true, LineRange::single(0));
        assert_eq!(out, "a\nb\nc");
        assert_eq!(stats.count, 2);
    }

    // -- Running ------------------------------------------------------------

    #[test]
    fn first_match_per_line_without_g() {
        let (out, stats) = run("aa\naa\naa", "a", "b", false, LineRange::new(0, 1));
        assert_eq!(out, "ba\nba\naa");
        assert_eq!((stats.count, stats.lines), (2, 2));
    }

    #[test]
    fn global_replaces_all() {
        let (out, stats) = run("aa\naa", "a", "bb", true, LineRange::new(0, 1));
        assert_eq!(out, "bbbb\nbbbb");
        assert_eq!(stats.message(false), "4 substitutions on 2 lines");
    }

    #[test]
    fn empty_matches_advance() {
        let (out, _) = run("abc", "x*", "-", true, LineRange::single(0));
        assert_eq!(out, "-a-b-c-");
        let (out, _) = run("a\na", "$", "!", true, LineRange::new(0, 1));
        assert_eq!(out, "a!\na!");
        let (out, _) = run("ab", "a*", "-", true, LineRange::single(0));
        assert_eq!(out, "-b-");
    }

    #[test]
    fn joining_lines_shrinks_span() {
        let (out, stats) = run("a\nb\nc\nd", r"\n", "", false, LineRange::new(0, 1));
        assert_eq!(out, "ab\nc\nd");
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn split_lines_grow_span() {
        let (out, _) = run("a b\nc d\ne f", " ", r"\r", true, LineRange::new(0, 1));
        assert_eq!(out, "a\nb\nc\nd\ne f");
    }

    #[test]
    fn count_only_leaves_text() {
        let mut buf = Buffer::from_text("a a\na");
        let re = pattern::compile("a", false, false).unwrap();
        let flags = SubFlags { global: true, count_only: true, ..SubFlags::default() };
        let stats = Replacer::new(re, "x", flags, LineRange::new(0, 1)).run_all(&mut buf);
        assert_eq!(buf.contents(), "a a\na");
        assert_eq!(stats.count, 3);
        assert_eq!(stats.message(true), "3 matches on 2 lines");
    }

    // -- Confirm ------------------------------------------------------------

    fn confirm(text: &str, answers: &str) -> (String, SubStats) {
        let mut buf = Buffer::from_text(text);
        let re = pattern::compile("a", false, false).unwrap();
        let flags = SubFlags { global: true, confirm: true, ..SubFlags::default() };
        let replacer = Replacer::new(re, "X", flags, LineRange::new(0, buf.last_line()));
        let mut session = Interactive::start(replacer, &buf);
        for ch in answers.chars() {
            if !session.respond(&mut buf, Answer::from_char(ch).unwrap()) {
                break;
            }
        }
        (buf.contents(), session.stats())
    }

    #[test]
    fn confirm_yes_no() {
        assert_eq!(confirm("a a a", "yny").0, "X a X");
    }

    #[test]
    fn confirm_all_and_last() {
        assert_eq!(confirm("a a a", "na").0, "a X X");
        assert_eq!(confirm("a a a", "l").0, "X a a");
    }

    #[test]
    fn confirm_quit_stops() {
        let (out, stats) = confirm("a a a", "yq");
        assert_eq!(out, "X a a");
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn answers_from_keys() {
        assert_eq!(Answer::from_char('\u{1b}'), Some(Answer::Quit));
        assert_eq!(Answer::from_char('z'), None);
    }

    proptest! {
        /// Saying `y` to every prompt ends exactly where a plain run ends.
        #[test]
        fn confirm_every_match_equals_plain_run(
            text in "[ab\n]{0,24}",
            pat in prop::sample::select(vec!["a", "a*", "b\\n", "$", "^"]),
            rep in prop::sample::select(vec!["", "x", "\\r", "&&"]),
        ) {
            let last = text.matches('\n').count();
            let range = LineRange::new(0, last);
            let flags = SubFlags { global: true, ..SubFlags::default() };
            let re = pattern::compile(pat, false, false).unwrap();

            let mut plain = Buffer::from_text(&text);
            let plain_stats = Replacer::new(re.clone(), rep, flags, range).run_all(&mut plain);

            let mut asked = Buffer::from_text(&text);
            let mut session = Interactive::start(Replacer::new(re, rep, flags, range), &asked);
            let mut guard = 0;
            while session.current().is_some() && guard < 200 {
                session.respond(&mut asked, Answer::Yes);
                guard += 1;
            }
            prop_assert_eq!(asked.contents(), plain.contents());
            prop_assert_eq!(session.stats().last_end, plain_stats.last_end);
            prop_assert_eq!(session.stats().count, plain_stats.count);
        }
    }
}
