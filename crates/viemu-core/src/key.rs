//! Key events and Vim's angle-bracket key notation.
//!
//! The engine does not care how keystrokes physically arrive. Hosts translate
//! their input into [`KeyEvent`]s; mappings, macros stored in registers, the
//! persisted session and scripted input all use the textual notation handled
//! by [`parse_keys`] and [`format_keys`]:
//!
//! | Notation                 | Key                        |
//! |--------------------------|----------------------------|
//! | `<Esc>`                  | Escape                     |
//! | `<CR>` `<Enter>` `<Return>` | Enter                   |
//! | `<Tab>` `<BS>` `<Del>`   | Tab, Backspace, Delete     |
//! | `<Space>` `<lt>` `<Bar>` `<Bslash>` | ` ` `<` `\|` `\\` |
//! | `<Up>` `<Down>` `<Left>` `<Right>` | arrows           |
//! | `<Home>` `<End>` `<PageUp>` `<PageDown>` `<Insert>` | navigation |
//! | `<F1>` .. `<F35>`        | function keys              |
//! | `<C-x>` `<A-x>` `<M-x>` `<S-x>` | modifier combinations |
//!
//! An unrecognised `<...>` sequence is taken literally, character by
//! character, as Vim does.

use std::fmt;

use bitflags::bitflags;

// ─── Key types ──────────────────────────────────────────────────────────────

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A Unicode character (printable).
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    /// F1 through F35.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
    }
}

/// A single keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// An unmodified key.
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    /// An unmodified printable character.
    #[must_use]
    pub const fn char(ch: char) -> Self {
        Self::plain(KeyCode::Char(ch))
    }

    /// `Ctrl` + character. The character is folded to lowercase so that
    /// `<C-R>` and `<C-r>` are the same key.
    #[must_use]
    pub fn ctrl(ch: char) -> Self {
        Self::new(KeyCode::Char(ch.to_ascii_lowercase()), Modifiers::CTRL)
    }

    #[must_use]
    pub const fn esc() -> Self {
        Self::plain(KeyCode::Escape)
    }

    #[must_use]
    pub const fn enter() -> Self {
        Self::plain(KeyCode::Enter)
    }

    /// The character this key types, if it is a printable key without
    /// `Ctrl`/`Alt`.
    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(ch) if !self.modifiers.intersects(Modifiers::CTRL | Modifiers::ALT) => {
                Some(ch)
            }
            _ => None,
        }
    }

    /// True for `Ctrl` + `ch`.
    #[must_use]
    pub fn is_ctrl(&self, ch: char) -> bool {
        self.modifiers.contains(Modifiers::CTRL) && self.code == KeyCode::Char(ch)
    }

    /// True for an unmodified `ch`.
    #[must_use]
    pub fn is_char(&self, ch: char) -> bool {
        self.as_char() == Some(ch)
    }
}

impl From<char> for KeyEvent {
    fn from(ch: char) -> Self {
        Self::char(ch)
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self::plain(code)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = String::new();
        if self.modifiers.contains(Modifiers::CTRL) {
            prefix.push_str("C-");
        }
        if self.modifiers.contains(Modifiers::ALT) {
            prefix.push_str("A-");
        }
        if self.modifiers.contains(Modifiers::SHIFT) && !matches!(self.code, KeyCode::Char(_)) {
            prefix.push_str("S-");
        }

        let name = match self.code {
            KeyCode::Char(ch) => {
                if prefix.is_empty() {
                    return match ch {
                        '<' => f.write_str("<lt>"),
                        _ => write!(f, "{ch}"),
                    };
                }
                match ch {
                    '<' => "lt".to_string(),
                    ' ' => "Space".to_string(),
                    _ => ch.to_string(),
                }
            }
            KeyCode::Enter => "CR".to_string(),
            KeyCode::Tab => "Tab".to_string(),
            KeyCode::Backspace => "BS".to_string(),
            KeyCode::Escape => "Esc".to_string(),
            KeyCode::Delete => "Del".to_string(),
            KeyCode::Insert => "Insert".to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::Left => "Left".to_string(),
            KeyCode::Right => "Right".to_string(),
            KeyCode::Home => "Home".to_string(),
            KeyCode::End => "End".to_string(),
            KeyCode::PageUp => "PageUp".to_string(),
            KeyCode::PageDown => "PageDown".to_string(),
            KeyCode::F(n) => format!("F{n}"),
        };
        write!(f, "<{prefix}{name}>")
    }
}

// ─── Notation ───────────────────────────────────────────────────────────────

/// Longest `<...>` body we try to interpret (`<C-A-PageDown>` fits).
const MAX_NOTATION_LEN: usize = 16;

/// Parse a key-notation string into key events.
///
/// `"ihello<Esc>"` → `i h e l l o Esc`. Never fails: text that is not valid
/// notation is read as literal characters.
#[must_use]
pub fn parse_keys(input: &str) -> Vec<KeyEvent> {
    let chars: Vec<char> = input.chars().collect();
    let mut keys = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '<' {
            let close = chars[i + 1..]
                .iter()
                .take(MAX_NOTATION_LEN)
                .position(|&c| c == '>');
            if let Some(offset) = close {
                let body: String = chars[i + 1..i + 1 + offset].iter().collect();
                if let Some(key) = parse_notation(&body) {
                    keys.push(key);
                    i += offset + 2;
                    continue;
                }
            }
        }
        keys.push(KeyEvent::char(chars[i]));
        i += 1;
    }

    keys
}

/// Render key events back into notation. Inverse of [`parse_keys`] for any
/// sequence it produced.
#[must_use]
pub fn format_keys(keys: &[KeyEvent]) -> String {
    keys.iter().map(ToString::to_string).collect()
}

/// Interpret the text between `<` and `>`.
fn parse_notation(body: &str) -> Option<KeyEvent> {
    let mut modifiers = Modifiers::empty();
    let mut rest = body;

    // Modifier prefixes: the final segment is the key name, which may itself
    // be `-` (`<C-->`).
    while rest.len() > 2 && rest.as_bytes()[1] == b'-' {
        match rest.as_bytes()[0].to_ascii_uppercase() {
            b'C' => modifiers |= Modifiers::CTRL,
            b'A' | b'M' => modifiers |= Modifiers::ALT,
            b'S' => modifiers |= Modifiers::SHIFT,
            _ => return None,
        }
        rest = &rest[2..];
    }

    let code = named_key(rest).or_else(|| {
        let mut it = rest.chars();
        match (it.next(), it.next()) {
            (Some(ch), None) if !modifiers.is_empty() => Some(KeyCode::Char(ch)),
            _ => None,
        }
    })?;

    Some(normalize(KeyEvent::new(code, modifiers)))
}

fn named_key(name: &str) -> Option<KeyCode> {
    let lower = name.to_ascii_lowercase();
    let code = match lower.as_str() {
        "esc" | "escape" => KeyCode::Escape,
        "cr" | "enter" | "return" | "nl" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "bs" | "backspace" => KeyCode::Backspace,
        "del" | "delete" => KeyCode::Delete,
        "insert" | "ins" => KeyCode::Insert,
        "space" => KeyCode::Char(' '),
        "lt" => KeyCode::Char('<'),
        "bar" => KeyCode::Char('|'),
        "bslash" => KeyCode::Char('\\'),
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        _ => {
            let n = lower.strip_prefix('f')?.parse::<u8>().ok()?;
            if (1..=35).contains(&n) {
                KeyCode::F(n)
            } else {
                return None;
            }
        }
    };
    Some(code)
}

/// Fold equivalent spellings onto one event: `<S-a>` is `A`, `<C-R>` is `<C-r>`.
fn normalize(mut key: KeyEvent) -> KeyEvent {
    if let KeyCode::Char(ch) = key.code {
        if key.modifiers.contains(Modifiers::SHIFT) {
            key.modifiers.remove(Modifiers::SHIFT);
            key.code = KeyCode::Char(ch.to_uppercase().next().unwrap_or(ch));
        }
        if key.modifiers.contains(Modifiers::CTRL) {
            key.code = KeyCode::Char(ch.to_ascii_lowercase());
        }
    }
    key
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn k(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    // -- Parsing -------------------------------------------------------------

    #[test]
    fn plain_text_is_one_key_per_char() {
        assert_eq!(
            parse_keys("3dd"),
            vec![KeyEvent::char('3'), KeyEvent::char('d'), KeyEvent::char('d')]
        );
    }

    #[test]
    fn named_keys_are_case_insensitive() {
        assert_eq!(parse_keys("<Esc>"), vec![k(KeyCode::Escape)]);
        assert_eq!(parse_keys("<esc>"), vec![k(KeyCode::Escape)]);
        assert_eq!(parse_keys("<cr>"), vec![k(KeyCode::Enter)]);
        assert_eq!(parse_keys("<Return>"), vec![k(KeyCode::Enter)]);
        assert_eq!(parse_keys("<BS><Del>"), vec![k(KeyCode::Backspace), k(KeyCode::Delete)]);
    }

    #[test]
    fn special_characters() {
        assert_eq!(parse_keys("<lt>"), vec![KeyEvent::char('<')]);
        assert_eq!(parse_keys("<Space>"), vec![KeyEvent::char(' ')]);
        assert_eq!(parse_keys("<Bar>"), vec![KeyEvent::char('|')]);
        assert_eq!(parse_keys("<Bslash>"), vec![KeyEvent::char('\\')]);
    }

    #[test]
    fn ctrl_keys_fold_case() {
        assert_eq!(parse_keys("<C-R>"), vec![KeyEvent::ctrl('r')]);
        assert_eq!(parse_keys("<c-v>"), vec![KeyEvent::ctrl('v')]);
    }

    #[test]
    fn shift_char_becomes_uppercase() {
        assert_eq!(parse_keys("<S-a>"), vec![KeyEvent::char('A')]);
    }

    #[test]
    fn modified_named_key() {
        assert_eq!(
            parse_keys("<C-Left>"),
            vec![KeyEvent::new(KeyCode::Left, Modifiers::CTRL)]
        );
        assert_eq!(
            parse_keys("<A-x>"),
            vec![KeyEvent::new(KeyCode::Char('x'), Modifiers::ALT)]
        );
        assert_eq!(
            parse_keys("<M-x>"),
            vec![KeyEvent::new(KeyCode::Char('x'), Modifiers::ALT)]
        );
    }

    #[test]
    fn function_keys() {
        assert_eq!(parse_keys("<F1><F12>"), vec![k(KeyCode::F(1)), k(KeyCode::F(12))]);
        assert_eq!(parse_keys("<F99>").len(), 5);
    }

    #[test]
    fn unknown_notation_is_literal() {
        let keys = parse_keys("<foo>");
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], KeyEvent::char('<'));
        assert_eq!(keys[4], KeyEvent::char('>'));
    }

    #[test]
    fn unterminated_bracket_is_literal() {
        assert_eq!(parse_keys("a<b"), vec![
            KeyEvent::char('a'),
            KeyEvent::char('<'),
            KeyEvent::char('b'),
        ]);
    }

    #[test]
    fn ctrl_minus() {
        assert_eq!(
            parse_keys("<C-->"),
            vec![KeyEvent::new(KeyCode::Char('-'), Modifiers::CTRL)]
        );
    }

    // -- Formatting ----------------------------------------------------------

    #[test]
    fn format_round_trips_mixed_sequence() {
        let text = "ihello<Esc>3dd<C-r>x<lt><CR>";
        assert_eq!(format_keys(&parse_keys(text)), text);
    }

    #[test]
    fn format_named_and_modified() {
        assert_eq!(KeyEvent::esc().to_string(), "<Esc>");
        assert_eq!(KeyEvent::ctrl('o').to_string(), "<C-o>");
        assert_eq!(KeyEvent::new(KeyCode::Up, Modifiers::SHIFT).to_string(), "<S-Up>");
        assert_eq!(KeyEvent::char(' ').to_string(), " ");
    }

    // -- Helpers -------------------------------------------------------------

    #[test]
    fn as_char_ignores_modified_keys() {
        assert_eq!(KeyEvent::char('x').as_char(), Some('x'));
        assert_eq!(KeyEvent::ctrl('x').as_char(), None);
        assert_eq!(KeyEvent::esc().as_char(), None);
        assert!(KeyEvent::ctrl('v').is_ctrl('v'));
        assert!(KeyEvent::char('q').is_char('q'));
    }
}
