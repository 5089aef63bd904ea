//! Registers: storage for yanked, deleted and recorded text.
//!
//! Every yank and delete copies text into a register; paste reads it back.
//! Each register remembers how its text was captured, because paste places
//! charwise, linewise and block content differently.
//!
//! ## Register names
//!
//! | Name | Meaning |
//! |------|---------|
//! | `"` | unnamed: reads whichever register was written last |
//! | `0` | latest unnamed yank or delete |
//! | `1`-`9` | ring of older unnamed yanks and deletes, `1` newest |
//! | `a`-`z` | named; `A`-`Z` append to them |
//! | `_` | black hole: writes vanish |
//! | `+` `*` | system clipboard / selection, read live every time |
//! | `.` `^` | last inserted text (read only) |
//! | `:` | last ex command line (read only) |
//! | `/` | last search pattern (read only) |
//!
//! Linewise content always ends with `\n`. Block content is one row per
//! line, joined with `\n`, without a trailing break.

use crate::error::{Result, ViError};
use crate::host::{Clipboard, ClipboardKind, MemoryClipboard};

/// How text moving through a register was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationMode {
    #[default]
    CharWise,
    LineWise,
    Block,
}

impl OperationMode {
    /// Numeric flag used by the persisted register lists.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::CharWise => 0,
            Self::LineWise => 1,
            Self::Block => 2,
        }
    }

    #[must_use]
    pub const fn from_flag(flag: u64) -> Option<Self> {
        match flag {
            0 => Some(Self::CharWise),
            1 => Some(Self::LineWise),
            2 => Some(Self::Block),
            _ => None,
        }
    }

    /// Short tag shown by `:registers`.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::CharWise => 'c',
            Self::LineWise => 'l',
            Self::Block => 'b',
        }
    }
}

/// A single register slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Register {
    content: String,
    mode: OperationMode,
}

impl Register {
    #[must_use]
    pub fn new(content: impl Into<String>, mode: OperationMode) -> Self {
        let mut content = content.into();
        if mode == OperationMode::LineWise && !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        Self { content, mode }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn mode(&self) -> OperationMode {
        self.mode
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Uppercase-register append. Mixing in linewise text makes the whole
    /// register linewise.
    fn append(&mut self, text: &str, mode: OperationMode) {
        if self.content.is_empty() {
            *self = Self::new(text, mode);
            return;
        }
        if mode == OperationMode::LineWise || self.mode == OperationMode::LineWise {
            if !self.content.ends_with('\n') {
                self.content.push('\n');
            }
            self.content.push_str(text);
            if !self.content.ends_with('\n') {
                self.content.push('\n');
            }
            self.mode = OperationMode::LineWise;
        } else {
            self.content.push_str(text);
        }
    }
}

// ── Register file ────────────────────────────────────────────────────────

/// Every register the engine knows, plus the clipboard behind `+` and `*`.
pub struct RegisterFile {
    unnamed: Register,
    numbered: [Register; 10],
    named: [Register; 26],
    last_insert: Register,
    last_command: Register,
    last_search: Register,
    clipboard: Box<dyn Clipboard>,
    /// What we last put on the clipboard, to recover its mode on read.
    clipboard_echo: Option<Register>,
    /// Register the unnamed register currently points at.
    last_written: char,
}

impl RegisterFile {
    #[must_use]
    pub fn new(clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            unnamed: Register::default(),
            numbered: std::array::from_fn(|_| Register::default()),
            named: std::array::from_fn(|_| Register::default()),
            last_insert: Register::default(),
            last_command: Register::default(),
            last_search: Register::default(),
            clipboard,
            clipboard_echo: None,
            last_written: '"',
        }
    }

    /// Swap the clipboard implementation.
    pub fn set_clipboard(&mut self, clipboard: Box<dyn Clipboard>) {
        self.clipboard = clipboard;
        self.clipboard_echo = None;
    }

    /// True for every name `get` accepts.
    #[must_use]
    pub const fn is_valid(name: char) -> bool {
        matches!(
            name,
            '"' | '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' | '+' | '*' | '.' | '^' | ':' | '/'
        )
    }

    /// True for names a yank, delete or macro recording may target.
    #[must_use]
    pub const fn is_writable(name: char) -> bool {
        matches!(name, '"' | '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' | '+' | '*')
    }

    // -- Writing ------------------------------------------------------------

    /// Store `text` in register `name`.
    ///
    /// Uppercase names and `append = true` append. `_` discards. `+`/`*`
    /// go straight to the clipboard. The unnamed register starts pointing
    /// at whatever was written.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` for read-only and unknown names.
    pub fn set(&mut self, name: char, text: &str, mode: OperationMode, append: bool) -> Result<()> {
        let register = Register::new(text, mode);
        match name {
            '_' => return Ok(()),
            '"' => {
                if append {
                    self.unnamed.append(text, mode);
                } else {
                    self.unnamed = register;
                }
            }
            '0'..='9' => {
                let slot = &mut self.numbered[digit_index(name)];
                if append {
                    slot.append(text, mode);
                } else {
                    *slot = register;
                }
            }
            'a'..='z' | 'A'..='Z' => {
                let slot = &mut self.named[letter_index(name)];
                if append || name.is_ascii_uppercase() {
                    slot.append(text, mode);
                } else {
                    *slot = register;
                }
            }
            '+' | '*' => {
                let kind = clipboard_kind(name);
                let full = if append {
                    let mut current = self.read_clipboard(kind);
                    current.append(text, mode);
                    current
                } else {
                    register
                };
                self.clipboard.set(kind, full.content());
                self.clipboard_echo = Some(full);
            }
            other => return Err(ViError::InvalidRegister(other)),
        }
        self.last_written = name.to_ascii_lowercase();
        Ok(())
    }

    /// Record a yank. With no register (or `"`) it lands in `0` and shifts
    /// the numbered ring.
    pub fn yank(&mut self, name: Option<char>, text: &str, mode: OperationMode) {
        self.record(name, text, mode);
    }

    /// Record deleted text. Same routing as [`yank`](Self::yank).
    pub fn delete(&mut self, name: Option<char>, text: &str, mode: OperationMode) {
        self.record(name, text, mode);
    }

    fn record(&mut self, name: Option<char>, text: &str, mode: OperationMode) {
        match name {
            None | Some('"') => self.push_ring(text, mode),
            Some(name) => {
                if let Err(err) = self.set(name, text, mode, false) {
                    tracing::debug!(%err, "register write dropped");
                }
            }
        }
    }

    /// `0` takes the new text, its old content moves into `1`, and the
    /// rest of the ring shifts one slot, dropping `9`.
    fn push_ring(&mut self, text: &str, mode: OperationMode) {
        self.numbered[1..].rotate_right(1);
        self.numbered[1] = std::mem::take(&mut self.numbered[0]);
        self.numbered[0] = Register::new(text, mode);
        self.last_written = '0';
    }

    /// Remember the text typed in the last Insert session (`.` and `^`).
    pub fn set_last_insert(&mut self, text: &str) {
        self.last_insert = Register::new(text, OperationMode::CharWise);
    }

    /// Remember the last executed ex command line (`:`).
    pub fn set_last_command(&mut self, text: &str) {
        self.last_command = Register::new(text, OperationMode::CharWise);
    }

    /// Remember the last search pattern (`/`).
    pub fn set_last_search(&mut self, text: &str) {
        self.last_search = Register::new(text, OperationMode::CharWise);
    }

    // -- Reading ------------------------------------------------------------

    /// Read register `name`. `"` resolves to the last-written register and
    /// the clipboard registers ask the clipboard every time.
    ///
    /// # Errors
    ///
    /// `InvalidRegister` for unknown names.
    pub fn get(&mut self, name: char) -> Result<Register> {
        let name = if name == '"' { self.last_written } else { name };
        Ok(match name {
            '"' => self.unnamed.clone(),
            '0'..='9' => self.numbered[digit_index(name)].clone(),
            'a'..='z' | 'A'..='Z' => self.named[letter_index(name)].clone(),
            '+' | '*' => self.read_clipboard(clipboard_kind(name)),
            '.' | '^' => self.last_insert.clone(),
            ':' => self.last_command.clone(),
            '/' => self.last_search.clone(),
            '_' => Register::default(),
            other => return Err(ViError::InvalidRegister(other)),
        })
    }

    /// Read a register for pasting: empty content is an error.
    ///
    /// # Errors
    ///
    /// `EmptyRegister` when there is nothing to paste, `InvalidRegister`
    /// for unknown names.
    pub fn get_nonempty(&mut self, name: char) -> Result<Register> {
        let reg = self.get(name)?;
        if reg.is_empty() {
            return Err(ViError::EmptyRegister(name));
        }
        Ok(reg)
    }

    fn read_clipboard(&mut self, kind: ClipboardKind) -> Register {
        let Some(text) = self.clipboard.get(kind) else {
            return Register::default();
        };
        match &self.clipboard_echo {
            Some(echo) if echo.content() == text => echo.clone(),
            _ if text.ends_with('\n') => Register::new(text, OperationMode::LineWise),
            _ => Register::new(text, OperationMode::CharWise),
        }
    }

    /// Registers that can be persisted, in listing order.
    #[must_use]
    pub fn stored(&self) -> Vec<(char, Register)> {
        let mut out = Vec::new();
        if !self.unnamed.is_empty() {
            out.push(('"', self.unnamed.clone()));
        }
        for (i, reg) in self.numbered.iter().enumerate() {
            if !reg.is_empty() {
                out.push((char::from(b'0' + u8::try_from(i).unwrap_or(0)), reg.clone()));
            }
        }
        for (i, reg) in self.named.iter().enumerate() {
            if !reg.is_empty() {
                out.push((char::from(b'a' + u8::try_from(i).unwrap_or(0)), reg.clone()));
            }
        }
        out
    }

    /// Everything `:registers` shows: stored registers plus the live and
    /// read-only ones that have content.
    pub fn listing(&mut self) -> Vec<(char, Register)> {
        let mut out = Vec::new();
        if let Ok(reg) = self.get('"')
            && !reg.is_empty()
        {
            out.push(('"', reg));
        }
        out.extend(self.stored().into_iter().filter(|(name, _)| *name != '"'));
        for name in ['+', '*', '.', ':', '/'] {
            if let Ok(reg) = self.get(name)
                && !reg.is_empty()
            {
                out.push((name, reg));
            }
        }
        out
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(Box::new(MemoryClipboard::new()))
    }
}

impl std::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterFile")
            .field("last_written", &self.last_written)
            .field("stored", &self.stored().len())
            .finish_non_exhaustive()
    }
}

fn digit_index(name: char) -> usize {
    name.to_digit(10).map_or(0, |d| d as usize)
}

fn letter_index(name: char) -> usize {
    usize::from(name.to_ascii_lowercase() as u8 - b'a')
}

const fn clipboard_kind(name: char) -> ClipboardKind {
    if name == '*' {
        ClipboardKind::Selection
    } else {
        ClipboardKind::Clipboard
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
