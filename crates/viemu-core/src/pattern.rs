//! Pattern translation: Vi search syntax to `regex` crate syntax.
//!
//! Vi patterns are "magic": `.`, `*`, `^`, `$` and `[...]` are special as
//! usual, but `(`, `)`, `|`, `+`, `?`, `{` and `}` are literal until a
//! backslash turns them into operators. The translator rewrites a pattern
//! in one left-to-right pass:
//!
//! 1. Strip `\c`/`\C` case markers.
//! 2. Find the protected spans, i.e. genuine `[...]` classes and `\{n,m}`
//!    quantifiers, so later rules never look inside them.
//! 3. Walk the rest, flipping the escaped/unescaped meaning of `( ) | +`,
//!    forcing `?` literal, mapping `\?`/`\=` to the optional quantifier and
//!    `\<`/`\>` to word boundaries, expanding `\a \l \u \x \h`.
//!
//! Case sensitivity is decided from the pattern itself (smart case) unless a
//! marker forces it.

use regex::{Regex, RegexBuilder};

use crate::error::{Result, ViError};

/// Explicit case marker found in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMarker {
    /// `\c`: match ignoring case.
    Insensitive,
    /// `\C`: match case exactly.
    Sensitive,
}

/// A pattern rewritten for the `regex` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Regex source, without flags.
    pub regex: String,
    /// `\c`/`\C` found in the pattern.
    pub marker: Option<CaseMarker>,
    /// Whether the pattern has an uppercase letter outside escapes.
    pub has_upper: bool,
}

impl Translation {
    /// Resolve case sensitivity: marker first, then `ignorecase` with the
    /// `smartcase` override.
    #[must_use]
    pub const fn case_sensitive(&self, ignorecase: bool, smartcase: bool) -> bool {
        match self.marker {
            Some(CaseMarker::Sensitive) => true,
            Some(CaseMarker::Insensitive) => false,
            None => !ignorecase || (smartcase && self.has_upper),
        }
    }
}

/// Translate and compile `pattern` with the given case options.
///
/// # Errors
///
/// `InvalidPattern` when the translated regex does not compile.
pub fn compile(pattern: &str, ignorecase: bool, smartcase: bool) -> Result<Regex> {
    let t = translate(pattern)?;
    build(&t, t.case_sensitive(ignorecase, smartcase))
}

/// Compile a translation with case sensitivity already decided.
///
/// # Errors
///
/// `InvalidPattern` when the regex does not compile.
pub fn build(t: &Translation, case_sensitive: bool) -> Result<Regex> {
    RegexBuilder::new(&t.regex)
        .multi_line(true)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| {
            tracing::debug!(regex = %t.regex, "pattern failed to compile");
            let msg = e.to_string();
            ViError::InvalidPattern(error_summary(&msg).unwrap_or(&t.regex).to_string())
        })
}

fn error_summary(s: &str) -> Option<&str> {
    s.lines().rev().find(|l| l.starts_with("error:")).map(str::trim)
}

/// Escape `text` so it matches itself as a Vi pattern.
#[must_use]
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '.' | '*' | '[' | ']' | '~' | '^' | '$' | '/' | '?') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Rewrite a Vi pattern into `regex` crate syntax.
///
/// # Errors
///
/// `InvalidPattern` for constructs the regex engine cannot express
/// (backreferences, `\zs`/`\ze`).
pub fn translate(pattern: &str) -> Result<Translation> {
    let (chars, marker) = strip_case_markers(pattern);
    let has_upper = has_unescaped_upper(&chars);
    let spans = protected_spans(&chars);

    let mut out = String::with_capacity(pattern.len() + 8);
    // Whether the next token starts a branch: `^` anchors and `*` is literal.
    let mut at_branch_start = true;
    let mut i = 0;
    let mut spans = spans.iter().peekable();

    while i < chars.len() {
        if let Some(span) = spans.next_if(|s| s.start == i) {
            match span.kind {
                SpanKind::Class => out.push_str(&translate_class(&chars[span.start..=span.end])),
                SpanKind::Quantifier => {
                    out.push_str(&translate_quantifier(&chars[span.start + 2..span.end]));
                }
            }
            i = span.end + 1;
            at_branch_start = false;
            continue;
        }

        let ch = chars[i];
        if ch == '\\' {
            let Some(&next) = chars.get(i + 1) else {
                out.push_str(r"\\");
                break;
            };
            i += 2;
            at_branch_start = matches!(next, '(' | '|');
            match next {
                '(' | ')' | '|' | '+' => out.push(next),
                '?' | '=' => out.push('?'),
                '<' | '>' => out.push_str(r"\b"),
                'a' => out.push_str("[A-Za-z]"),
                'A' => out.push_str("[^A-Za-z]"),
                'l' => out.push_str("[a-z]"),
                'L' => out.push_str("[^a-z]"),
                'u' => out.push_str("[A-Z]"),
                'U' => out.push_str("[^A-Z]"),
                'x' => out.push_str("[0-9A-Fa-f]"),
                'X' => out.push_str("[^0-9A-Fa-f]"),
                'h' => out.push_str("[A-Za-z_]"),
                'H' => out.push_str("[^A-Za-z_]"),
                'd' | 'D' | 's' | 'S' | 'w' | 'W' | 'n' | 't' | 'r' => {
                    out.push('\\');
                    out.push(next);
                }
                'e' => out.push_str(r"\x1b"),
                '1'..='9' => {
                    return Err(ViError::InvalidPattern(format!(
                        "back references are not supported: \\{next}"
                    )));
                }
                'z' => {
                    return Err(ViError::InvalidPattern(format!(
                        "\\z{} is not supported",
                        chars.get(i).copied().unwrap_or(' ')
                    )));
                }
                other => push_literal(&mut out, other),
            }
            continue;
        }

        match ch {
            '^' if at_branch_start => out.push('^'),
            '$' if at_line_end(&chars, i + 1) => out.push('$'),
            '*' if at_branch_start => out.push_str(r"\*"),
            '.' | '*' => out.push(ch),
            other => push_literal(&mut out, other),
        }
        at_branch_start = ch == '^' && at_branch_start;
        i += 1;
    }

    Ok(Translation {
        regex: out,
        marker,
        has_upper,
    })
}

fn push_literal(out: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
}

/// `$` is an anchor only at the end of the pattern or of a branch.
fn at_line_end(chars: &[char], next: usize) -> bool {
    match chars.get(next) {
        None => true,
        Some('\\') => matches!(chars.get(next + 1), Some('|' | ')')),
        Some(_) => false,
    }
}

fn strip_case_markers(pattern: &str) -> (Vec<char>, Option<CaseMarker>) {
    let mut chars = Vec::with_capacity(pattern.len());
    let mut marker = None;
    let mut iter = pattern.chars();
    while let Some(ch) = iter.next() {
        if ch != '\\' {
            chars.push(ch);
            continue;
        }
        match iter.next() {
            Some('c') => marker = marker.or(Some(CaseMarker::Insensitive)),
            Some('C') => marker = Some(CaseMarker::Sensitive),
            Some(next) => {
                chars.push('\\');
                chars.push(next);
            }
            None => chars.push('\\'),
        }
    }
    (chars, marker)
}

fn has_unescaped_upper(chars: &[char]) -> bool {
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i].is_uppercase() {
            return true;
        }
        i += 1;
    }
    false
}

// ---------------------------------------------------------------------------
// Protected spans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    /// `[...]` character class.
    Class,
    /// `\{...}` repetition count.
    Quantifier,
}

/// Inclusive char-index span the escaping rules must not touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    kind: SpanKind,
}

/// Single scan for matched `[...]` pairs and well-formed `\{n,m}`
/// quantifiers. Escape pairs are skipped the same way `translate` skips
/// them, so both passes agree on what is escaped.
fn protected_spans(chars: &[char]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1) == Some(&'{') => {
                if let Some(end) = quantifier_end(chars, i + 2) {
                    spans.push(Span { start: i, end, kind: SpanKind::Quantifier });
                    i = end + 1;
                } else {
                    i += 2;
                }
            }
            '\\' => i += 2,
            '[' => {
                if let Some(end) = class_end(chars, i) {
                    spans.push(Span { start: i, end, kind: SpanKind::Class });
                    i = end + 1;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    spans
}

/// Index of the closing `}` for a quantifier body starting at `from`.
fn quantifier_end(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    if chars.get(j) == Some(&'-') {
        j += 1;
    }
    let mut commas = 0;
    while let Some(&c) = chars.get(j) {
        match c {
            '0'..='9' => j += 1,
            ',' if commas == 0 => {
                commas += 1;
                j += 1;
            }
            '}' => return Some(j),
            '\\' if chars.get(j + 1) == Some(&'}') => return Some(j + 1),
            _ => return None,
        }
    }
    None
}

/// Index of the `]` closing the class opened at `open`.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'^') {
        j += 1;
    }
    // A `]` right after the opening is part of the set.
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while let Some(&c) = chars.get(j) {
        match c {
            '\\' => j += 2,
            ']' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn translate_class(span: &[char]) -> String {
    let mut out = String::from("[");
    let inner = &span[1..span.len() - 1];
    let mut i = 0;
    if inner.first() == Some(&'^') {
        out.push('^');
        i = 1;
    }
    if inner.get(i) == Some(&']') {
        out.push_str(r"\]");
        i += 1;
    }
    while i < inner.len() {
        let c = inner[i];
        match c {
            '\\' => {
                match inner.get(i + 1) {
                    Some(&e @ ('d' | 's' | 'w' | 'D' | 'S' | 'W' | 'n' | 't' | 'r')) => {
                        out.push('\\');
                        out.push(e);
                    }
                    Some('e') => out.push_str(r"\x1b"),
                    Some(&e) => push_literal(&mut out, e),
                    None => out.push_str(r"\\"),
                }
                i += 2;
            }
            '[' | '&' | '~' => {
                out.push('\\');
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push(']');
    out
}

/// `body` is what sits between `\{` and `}`, possibly ending in `\`.
fn translate_quantifier(body: &[char]) -> String {
    let body: String = body.iter().filter(|c| **c != '\\').collect();
    let (lazy, counts) = match body.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, body),
    };
    let mut out = match counts.split_once(',') {
        None if counts.is_empty() => "*".to_string(),
        None => format!("{{{counts}}}"),
        Some((min, max)) => {
            let min = if min.is_empty() { "0" } else { min };
            format!("{{{min},{max}}}")
        }
    };
    if lazy {
        out.push('?');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tr(p: &str) -> String {
        translate(p).unwrap().regex
    }

    fn matches(p: &str, hay: &str) -> Vec<String> {
        compile(p, true, true)
            .unwrap()
            .find_iter(hay)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    // -- Escaping toggles ---------------------------------------------------

    #[test]
    fn bare_group_chars_are_literal() {
        assert_eq!(tr("f(x)+y|z"), r"f\(x\)\+y\|z");
    }

    #[test]
    fn escaped_group_chars_are_operators() {
        assert_eq!(tr(r"\(ab\)\+\|c"), "(ab)+|c");
    }

    #[test]
    fn question_mark_forms() {
        assert_eq!(tr("a?"), r"a\?");
        assert_eq!(tr(r"ab\?"), "ab?");
        assert_eq!(tr(r"ab\="), "ab?");
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(tr(r"\<foo\>"), r"\bfoo\b");
        assert_eq!(matches(r"\<foo\>", "foo food foo"), vec!["foo", "foo"]);
    }

    #[test]
    fn anchors_only_where_they_anchor() {
        assert_eq!(tr("^a$"), "^a$");
        assert_eq!(tr("a^b$c"), r"a\^b\$c");
        assert_eq!(tr(r"^a\|^b"), "^a|^b");
    }

    #[test]
    fn leading_star_is_literal() {
        assert_eq!(tr("*a*"), r"\*a*");
    }

    // -- Protected spans ----------------------------------------------------

    #[test]
    fn character_class_passes_through() {
        assert_eq!(tr("[a-z(]+"), r"[a-z(]\+");
        assert_eq!(tr("[^]x]"), r"[^\]x]");
    }

    #[test]
    fn unmatched_brackets_are_literal() {
        assert_eq!(tr("a[b"), r"a\[b");
        assert_eq!(tr("a]b"), r"a\]b");
    }

    #[test]
    fn braces_literal_unless_quantifier() {
        assert_eq!(tr("a{2}"), r"a\{2\}");
        assert_eq!(tr(r"a\{2}"), "a{2}");
        assert_eq!(tr(r"a\{2,3}"), "a{2,3}");
        assert_eq!(tr(r"a\{,3}"), "a{0,3}");
        assert_eq!(tr(r"a\{-1,}"), "a{1,}?");
        assert_eq!(tr(r"a\{}"), "a*");
        assert_eq!(tr(r"a\{x}"), r"a\{x\}");
    }

    #[test]
    fn character_class_shorthands() {
        assert_eq!(tr(r"\a\l\u\x\h"), "[A-Za-z][a-z][A-Z][0-9A-Fa-f][A-Za-z_]");
        assert_eq!(matches(r"\C\u\l\+", "Foo bar Baz"), vec!["Foo", "Baz"]);
    }

    #[test]
    fn backreferences_are_rejected() {
        assert!(matches!(translate(r"\(a\)\1"), Err(ViError::InvalidPattern(_))));
    }

    // -- Case ---------------------------------------------------------------

    #[test]
    fn smart_case_heuristic() {
        assert!(!translate("foo").unwrap().case_sensitive(true, true));
        assert!(translate("Foo").unwrap().case_sensitive(true, true));
        let t = translate(r"\Cfoo").unwrap();
        assert!(t.case_sensitive(true, true));
        assert_eq!(t.regex, "foo");
    }

    #[test]
    fn lowercase_marker_forces_insensitive() {
        let t = translate(r"Foo\c").unwrap();
        assert!(!t.case_sensitive(true, true));
        assert_eq!(matches(r"Foo\c", "foo FOO"), vec!["foo", "FOO"]);
    }

    #[test]
    fn escaped_uppercase_does_not_count() {
        assert!(!translate(r"\Sfoo").unwrap().has_upper);
    }

    #[test]
    fn noignorecase_is_always_sensitive() {
        assert!(translate("foo").unwrap().case_sensitive(false, true));
    }

    #[test]
    fn escape_literal_round_trips() {
        let word = "a.b*c[d]";
        assert_eq!(matches(&escape_literal(word), "xxa.b*c[d]yy"), vec![word]);
    }

    proptest! {
        #[test]
        fn literal_words_match_like_plain_search(
            word in "[a-z0-9_]{1,4}",
            hay in "[a-z0-9_ ]{0,40}",
        ) {
            let re = compile(&word, true, true).unwrap();
            let ours: Vec<usize> = re.find_iter(&hay).map(|m| m.start()).collect();
            let plain: Vec<usize> = hay.match_indices(word.as_str()).map(|(i, _)| i).collect();
            prop_assert_eq!(ours, plain);
        }
    }
}
