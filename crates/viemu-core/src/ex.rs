//! Ex command names: resolving what follows the range on a `:` line.
//!
//! The name is the longest run of letters, digits, `-` and `_` after the
//! range. A run that is not a known name falls back to its leading letters
//! (`:d3` is `:d 3`, `:m0` is `:m 0`), and `s-` / `s_` always resolve to
//! `:s` with that char as the delimiter. Names accept Vim's abbreviations:
//! every prefix at least as long as the listed minimum.
//!
//! The few commands that are punctuation (`&`, `<`, `>`) are matched
//! before the name scan.

use crate::error::{Result, ViError};
use crate::mode::MapMode;

/// A resolved ex command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExCommand {
    /// A bare line number or address (`:42`).
    Goto,
    Delete,
    Yank,
    Put,
    Join,
    ShiftRight,
    ShiftLeft,
    Move,
    Copy,
    Substitute,
    /// `:&`: repeat the last substitution.
    SubRepeat,
    NoHlsearch,
    Set,
    Map { modes: MapModes, recursive: bool },
    Unmap { modes: MapModes },
    MapClear { modes: MapModes },
    Normal,
    Marks,
    DelMarks,
    Mark,
    Registers,
    Jumps,
    History,
    Undo,
    Redo,
    Write,
    Quit,
    WriteQuit,
    Xit,
    Global,
    /// `:v`: global over non-matching lines.
    VGlobal,
}

/// Which mapping tables a `:map`-family command touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapModes {
    /// `:map`: Normal and Visual.
    NormalVisual,
    One(MapMode),
}

impl MapModes {
    #[must_use]
    pub fn modes(self) -> Vec<MapMode> {
        match self {
            Self::NormalVisual => vec![MapMode::Normal, MapMode::Visual],
            Self::One(mode) => vec![mode],
        }
    }
}

struct Entry {
    name: &'static str,
    min: usize,
    command: ExCommand,
}

const fn entry(name: &'static str, min: usize, command: ExCommand) -> Entry {
    Entry { name, min, command }
}

const N: MapModes = MapModes::One(MapMode::Normal);
const V: MapModes = MapModes::One(MapMode::Visual);
const I: MapModes = MapModes::One(MapMode::Insert);
const C: MapModes = MapModes::One(MapMode::Command);
const NV: MapModes = MapModes::NormalVisual;

/// First matching entry wins, so shorter abbreviations come first.
const TABLE: &[Entry] = &[
    entry("delete", 1, ExCommand::Delete),
    entry("delmarks", 4, ExCommand::DelMarks),
    entry("display", 2, ExCommand::Registers),
    entry("yank", 1, ExCommand::Yank),
    entry("put", 2, ExCommand::Put),
    entry("join", 1, ExCommand::Join),
    entry("jumps", 2, ExCommand::Jumps),
    entry("move", 1, ExCommand::Move),
    entry("mark", 2, ExCommand::Mark),
    entry("marks", 5, ExCommand::Marks),
    entry("map", 3, ExCommand::Map { modes: NV, recursive: true }),
    entry("mapclear", 4, ExCommand::MapClear { modes: NV }),
    entry("k", 1, ExCommand::Mark),
    entry("copy", 2, ExCommand::Copy),
    entry("cmap", 2, ExCommand::Map { modes: C, recursive: true }),
    entry("cnoremap", 3, ExCommand::Map { modes: C, recursive: false }),
    entry("cunmap", 2, ExCommand::Unmap { modes: C }),
    entry("cmapclear", 5, ExCommand::MapClear { modes: C }),
    entry("t", 1, ExCommand::Copy),
    entry("substitute", 1, ExCommand::Substitute),
    entry("set", 2, ExCommand::Set),
    entry("nohlsearch", 3, ExCommand::NoHlsearch),
    entry("noremap", 2, ExCommand::Map { modes: NV, recursive: false }),
    entry("normal", 4, ExCommand::Normal),
    entry("nmap", 2, ExCommand::Map { modes: N, recursive: true }),
    entry("nnoremap", 2, ExCommand::Map { modes: N, recursive: false }),
    entry("nunmap", 3, ExCommand::Unmap { modes: N }),
    entry("nmapclear", 5, ExCommand::MapClear { modes: N }),
    entry("vmap", 2, ExCommand::Map { modes: V, recursive: true }),
    entry("vnoremap", 2, ExCommand::Map { modes: V, recursive: false }),
    entry("vunmap", 2, ExCommand::Unmap { modes: V }),
    entry("vmapclear", 5, ExCommand::MapClear { modes: V }),
    entry("vglobal", 1, ExCommand::VGlobal),
    entry("xmap", 2, ExCommand::Map { modes: V, recursive: true }),
    entry("xnoremap", 2, ExCommand::Map { modes: V, recursive: false }),
    entry("xunmap", 2, ExCommand::Unmap { modes: V }),
    entry("xit", 1, ExCommand::Xit),
    entry("imap", 2, ExCommand::Map { modes: I, recursive: true }),
    entry("inoremap", 3, ExCommand::Map { modes: I, recursive: false }),
    entry("iunmap", 2, ExCommand::Unmap { modes: I }),
    entry("imapclear", 5, ExCommand::MapClear { modes: I }),
    entry("unmap", 3, ExCommand::Unmap { modes: NV }),
    entry("undo", 1, ExCommand::Undo),
    entry("redo", 3, ExCommand::Redo),
    entry("registers", 3, ExCommand::Registers),
    entry("history", 3, ExCommand::History),
    entry("write", 1, ExCommand::Write),
    entry("wq", 2, ExCommand::WriteQuit),
    entry("quit", 1, ExCommand::Quit),
    entry("global", 1, ExCommand::Global),
    entry("goto", 4, ExCommand::Goto),
];

/// Full command names, for `<Tab>` completion.
#[must_use]
pub fn command_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = TABLE.iter().map(|e| e.name).collect();
    names.sort_unstable();
    names
}

/// Look up a name or abbreviation.
#[must_use]
pub fn lookup(name: &str) -> Option<ExCommand> {
    TABLE
        .iter()
        .find(|e| name.len() >= e.min && e.name.starts_with(name))
        .map(|e| e.command)
}

/// A command line after the range: the command, its `!`, and the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExLine<'a> {
    pub command: ExCommand,
    pub bang: bool,
    /// Arguments with leading blanks removed. For `:s`, `:g` and the
    /// shifts, the text right after the name (delimiter or repeats).
    pub args: &'a str,
}

/// Resolve the command at the start of `input` (range already removed).
///
/// # Errors
///
/// `NotACommand` when nothing resolves.
pub fn split_command(input: &str) -> Result<ExLine<'_>> {
    let input = input.trim_start();
    let not_a_command = || ViError::NotACommand(input.to_string());

    if let Some(rest) = input.strip_prefix('&') {
        return Ok(ExLine {
            command: ExCommand::SubRepeat,
            bang: false,
            args: rest,
        });
    }
    for (ch, command) in [('>', ExCommand::ShiftRight), ('<', ExCommand::ShiftLeft)] {
        if input.starts_with(ch) {
            // `>>>` shifts three times; the repeats stay in `args`.
            return Ok(ExLine {
                command,
                bang: false,
                args: &input[1..],
            });
        }
    }

    // `s-`/`s_` are a substitution with that delimiter.
    if input.starts_with("s-") || input.starts_with("s_") {
        return Ok(ExLine {
            command: ExCommand::Substitute,
            bang: false,
            args: &input[1..],
        });
    }

    let run = input
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(input.len());
    let letters = input
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(input.len());

    let (command, len) = if let Some(cmd) = lookup(&input[..run]) {
        (cmd, run)
    } else if let Some(cmd) = lookup(&input[..letters]) {
        (cmd, letters)
    } else if input.starts_with('k') && letters == 2 {
        // `:ka` is `:k a`.
        (ExCommand::Mark, 1)
    } else {
        return Err(not_a_command());
    };

    let rest = &input[len..];
    let (bang, rest) = match rest.strip_prefix('!') {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let args = match command {
        ExCommand::Substitute | ExCommand::Global | ExCommand::VGlobal => rest,
        _ => rest.trim_start(),
    };
    Ok(ExLine { command, bang, args })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
