//! Command-line input: the line typed after `:`, `/` or `?`.
//!
//! [`CommandLine`] is a string buffer with a cursor, plus two optional
//! overlays: history browsing (`<Up>`/`<Down>`, filtered by what was typed
//! before the first `<Up>`) and command-name completion (`<Tab>` cycling).
//! Any edit ends both. The prompt char is not stored; the host renders it.

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// InputHistory
// ---------------------------------------------------------------------------

/// Entered command or search lines, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputHistory {
    entries: VecDeque<String>,
}

impl InputHistory {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append `entry`, dropping an older identical entry and trimming to
    /// `capacity`. Empty entries are ignored.
    pub fn push(&mut self, entry: &str, capacity: usize) {
        if entry.is_empty() || capacity == 0 {
            return;
        }
        self.entries.retain(|e| e != entry);
        self.entries.push_back(entry.to_string());
        while self.entries.len() > capacity {
            self.entries.pop_front();
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Replace the contents (session restore).
    pub fn restore(&mut self, entries: impl IntoIterator<Item = String>, capacity: usize) {
        self.entries.clear();
        for entry in entries {
            self.push(&entry, capacity);
        }
    }
}

// ---------------------------------------------------------------------------
// CommandLine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Browse {
    prefix: String,
    /// Entry currently shown; `None` while showing the typed prefix.
    index: Option<usize>,
}

#[derive(Debug, Clone)]
struct Completion {
    head: String,
    matches: Vec<&'static str>,
    next: usize,
}

/// The command-line input buffer.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    input: String,
    /// Cursor position within `input` (char offset).
    cursor: usize,
    browse: Option<Browse>,
    completion: Option<Completion>,
}

impl CommandLine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            browse: None,
            completion: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Replace the whole input and put the cursor at its end.
    pub fn set(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
        self.end_overlays();
    }

    pub fn clear(&mut self) {
        self.set("");
    }

    // -- Editing --------------------------------------------------------------

    pub fn insert_char(&mut self, ch: char) {
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.insert(byte_idx, ch);
        self.cursor += 1;
        self.end_overlays();
    }

    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.insert_char(ch);
        }
    }

    /// Delete the char before the cursor. Returns `true` if one was deleted.
    pub fn backspace(&mut self) -> bool {
        self.end_overlays();
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.remove(byte_idx);
        true
    }

    /// Delete the char at the cursor. Returns `true` if one was deleted.
    pub fn delete(&mut self) -> bool {
        self.end_overlays();
        if self.cursor >= self.input.chars().count() {
            return false;
        }
        let byte_idx = self.char_to_byte(self.cursor);
        self.input.remove(byte_idx);
        true
    }

    /// `<C-w>`: delete the word (or run of punctuation) before the cursor,
    /// and any blanks between it and the cursor.
    pub fn delete_word_before(&mut self) {
        self.end_overlays();
        let chars: Vec<char> = self.input.chars().collect();
        let mut start = self.cursor.min(chars.len());
        while start > 0 && chars[start - 1].is_whitespace() {
            start -= 1;
        }
        if start > 0 {
            let word = is_word(chars[start - 1]);
            while start > 0
                && !chars[start - 1].is_whitespace()
                && is_word(chars[start - 1]) == word
            {
                start -= 1;
            }
        }
        let from = self.char_to_byte(start);
        let to = self.char_to_byte(self.cursor);
        self.input.replace_range(from..to, "");
        self.cursor = start;
    }

    /// `<C-u>`: delete everything before the cursor.
    pub fn delete_to_start(&mut self) {
        self.end_overlays();
        let to = self.char_to_byte(self.cursor);
        self.input.replace_range(..to, "");
        self.cursor = 0;
    }

    // -- Cursor ---------------------------------------------------------------

    pub const fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    pub const fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // -- History --------------------------------------------------------------

    /// `<Up>`: the next older entry starting with the typed prefix.
    /// Returns `false` (input unchanged) when there is none.
    pub fn history_prev(&mut self, history: &InputHistory) -> bool {
        self.completion = None;
        let browse = self.browse.get_or_insert_with(|| Browse {
            prefix: self.input.clone(),
            index: None,
        });
        let upto = browse.index.unwrap_or(history.len());
        let found = (0..upto)
            .rev()
            .find(|&i| history.get(i).is_some_and(|e| e.starts_with(&browse.prefix)));
        let Some(i) = found else {
            return false;
        };
        browse.index = Some(i);
        self.show(history.get(i).unwrap_or_default().to_string());
        true
    }

    /// `<Down>`: the next newer matching entry, then the typed prefix.
    pub fn history_next(&mut self, history: &InputHistory) -> bool {
        self.completion = None;
        let Some(browse) = self.browse.as_mut() else {
            return false;
        };
        let Some(from) = browse.index else {
            return false;
        };
        let found = (from + 1..history.len())
            .find(|&i| history.get(i).is_some_and(|e| e.starts_with(&browse.prefix)));
        let text = match found {
            Some(i) => {
                browse.index = Some(i);
                history.get(i).unwrap_or_default().to_string()
            }
            None => {
                browse.index = None;
                browse.prefix.clone()
            }
        };
        self.show(text);
        true
    }

    // -- Completion -----------------------------------------------------------

    /// `<Tab>`: complete the command name from `names`, cycling through the
    /// candidates on repeated presses. Returns `false` when nothing matches.
    pub fn complete(&mut self, names: &[&'static str]) -> bool {
        self.browse = None;
        if self.completion.is_none() {
            let Some((head, word)) = split_name(&self.input) else {
                return false;
            };
            let matches: Vec<&'static str> =
                names.iter().copied().filter(|n| n.starts_with(word)).collect();
            if matches.is_empty() {
                return false;
            }
            self.completion = Some(Completion {
                head: head.to_string(),
                matches,
                next: 0,
            });
        }
        let Some(state) = self.completion.as_mut() else {
            return false;
        };
        let text = format!("{}{}", state.head, state.matches[state.next]);
        state.next = (state.next + 1) % state.matches.len();
        self.input = text;
        self.cursor = self.input.chars().count();
        true
    }

    // -- Helpers --------------------------------------------------------------

    /// Show history text without ending the browse.
    fn show(&mut self, text: String) {
        self.input = text;
        self.cursor = self.input.chars().count();
    }

    fn end_overlays(&mut self) {
        self.browse = None;
        self.completion = None;
    }

    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map_or(self.input.len(), |(byte_idx, _)| byte_idx)
    }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Split `input` into the range prefix and a trailing command name being
/// typed. `None` once arguments have started.
fn split_name(input: &str) -> Option<(&str, &str)> {
    let start = input
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map_or(input.len(), |(i, _)| i);
    let (head, word) = input.split_at(start);
    if head.contains('\'') && head.ends_with('\'') {
        return None;
    }
    word.chars().all(|c| c.is_ascii_alphabetic()).then_some((head, word))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> CommandLine {
        let mut cl = CommandLine::new();
        cl.set(text);
        cl
    }

    fn history(entries: &[&str]) -> InputHistory {
        let mut h = InputHistory::new();
        for e in entries {
            h.push(e, 50);
        }
        h
    }

    // ── Editing ───────────────────────────────────────────────────────────

    #[test]
    fn insert_and_backspace() {
        let mut cl = CommandLine::new();
        cl.insert_str("wq");
        assert_eq!(cl.input(), "wq");
        assert!(cl.backspace());
        assert_eq!(cl.input(), "w");
        assert!(cl.backspace());
        assert!(!cl.backspace());
        assert!(cl.is_empty());
    }

    #[test]
    fn insert_in_middle() {
        let mut cl = line("wq");
        cl.move_left();
        cl.insert_char('x');
        assert_eq!(cl.input(), "wxq");
        assert_eq!(cl.cursor(), 2);
    }

    #[test]
    fn delete_at_cursor() {
        let mut cl = line("abc");
        cl.move_home();
        assert!(cl.delete());
        assert_eq!(cl.input(), "bc");
        cl.move_end();
        assert!(!cl.delete());
    }

    #[test]
    fn delete_word_before_cursor() {
        let mut cl = line("s/foo bar");
        cl.delete_word_before();
        assert_eq!(cl.input(), "s/foo ");
        cl.delete_word_before();
        assert_eq!(cl.input(), "s/");
        cl.delete_word_before();
        assert_eq!(cl.input(), "s");
    }

    #[test]
    fn delete_to_start_keeps_tail() {
        let mut cl = line("abcdef");
        cl.move_left();
        cl.move_left();
        cl.delete_to_start();
        assert_eq!(cl.input(), "ef");
        assert_eq!(cl.cursor(), 0);
    }

    #[test]
    fn multibyte_editing() {
        let mut cl = line("héllo");
        cl.move_home();
        cl.move_right();
        cl.move_right();
        assert!(cl.backspace());
        assert_eq!(cl.input(), "hllo");
    }

    // ── History ───────────────────────────────────────────────────────────

    #[test]
    fn history_dedups_and_caps() {
        let mut h = history(&["a", "b", "a"]);
        assert_eq!(h.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        h.push("c", 2);
        assert_eq!(h.iter().collect::<Vec<_>>(), vec!["a", "c"]);
        h.push("", 2);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn up_walks_back_and_down_returns() {
        let h = history(&["set ic", "s/a/b/", "set ws"]);
        let mut cl = CommandLine::new();
        assert!(cl.history_prev(&h));
        assert_eq!(cl.input(), "set ws");
        assert!(cl.history_prev(&h));
        assert_eq!(cl.input(), "s/a/b/");
        assert!(cl.history_next(&h));
        assert_eq!(cl.input(), "set ws");
        assert!(cl.history_next(&h));
        assert_eq!(cl.input(), "");
    }

    #[test]
    fn up_filters_by_prefix() {
        let h = history(&["set ic", "s/a/b/", "set ws"]);
        let mut cl = line("s/");
        assert!(cl.history_prev(&h));
        assert_eq!(cl.input(), "s/a/b/");
        assert!(!cl.history_prev(&h));
        assert_eq!(cl.input(), "s/a/b/");
        assert!(cl.history_next(&h));
        assert_eq!(cl.input(), "s/");
    }

    #[test]
    fn editing_ends_browse() {
        let h = history(&["one", "two"]);
        let mut cl = CommandLine::new();
        cl.history_prev(&h);
        cl.insert_char('!');
        assert!(!cl.history_next(&h));
        assert_eq!(cl.input(), "two!");
    }

    // ── Completion ────────────────────────────────────────────────────────

    const NAMES: &[&str] = &["marks", "map", "mapclear", "move"];

    #[test]
    fn tab_cycles_matches() {
        let mut cl = line("ma");
        assert!(cl.complete(NAMES));
        assert_eq!(cl.input(), "marks");
        assert!(cl.complete(NAMES));
        assert_eq!(cl.input(), "map");
        assert!(cl.complete(NAMES));
        assert_eq!(cl.input(), "mapclear");
        assert!(cl.complete(NAMES));
        assert_eq!(cl.input(), "marks");
    }

    #[test]
    fn tab_keeps_range_prefix() {
        let mut cl = line("1,3mo");
        assert!(cl.complete(NAMES));
        assert_eq!(cl.input(), "1,3move");
    }

    #[test]
    fn tab_stops_at_arguments() {
        let mut cl = line("map x");
        assert!(!cl.complete(NAMES));
        let mut cl = line("zz");
        assert!(!cl.complete(NAMES));
    }

    #[test]
    fn tab_skips_mark_address() {
        let mut cl = line("'");
        assert!(!cl.complete(NAMES));
    }
}
