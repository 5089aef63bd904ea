//! Modes of the key interpreter.
//!
//! The editor is always in exactly one [`Mode`]. Each mode changes how keys
//! are read and where the cursor may sit:
//!
//! | Mode         | Cursor limit        | Mapping table |
//! |--------------|---------------------|---------------|
//! | Normal       | `0..len-1`          | Normal        |
//! | Insert       | `0..len`            | Insert        |
//! | Visual       | `0..len-1`          | Visual        |
//! | Replace      | `0..len`            | Insert        |
//! | Command line | (in the input line) | Command       |

use std::fmt;

use crate::register::OperationMode;

// ---------------------------------------------------------------------------
// VisualKind
// ---------------------------------------------------------------------------

/// The sub-mode of visual selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualKind {
    /// `v`: character-wise selection.
    Char,
    /// `V`: line-wise selection.
    Line,
    /// `Ctrl-V`: block (column) selection.
    Block,
}

impl VisualKind {
    /// How text yanked from this selection is tagged.
    #[must_use]
    pub const fn operation_mode(self) -> OperationMode {
        match self {
            Self::Char => OperationMode::CharWise,
            Self::Line => OperationMode::LineWise,
            Self::Block => OperationMode::Block,
        }
    }
}

impl fmt::Display for VisualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Mode::Visual(*self).display_name())
    }
}

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// Which prompt the command line is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `/` or `?` search input.
    Search,
    /// `:` ex command input.
    Ex,
    /// `:s///c` confirmation prompt.
    Confirm,
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The current editing mode.
///
/// A plain tag: per-mode state (pending operator, insert session, visual
/// anchor, command-line input) lives with the editor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
    Visual(VisualKind),
    /// `R`: overwrite until Esc.
    Replace,
    CommandLine(CommandKind),
}

impl Mode {
    /// Human-readable name for a status line.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
            Self::Visual(kind) => match kind {
                VisualKind::Char => "VISUAL",
                VisualKind::Line => "VISUAL LINE",
                VisualKind::Block => "VISUAL BLOCK",
            },
            Self::Replace => "REPLACE",
            Self::CommandLine(CommandKind::Search) => "SEARCH",
            Self::CommandLine(CommandKind::Ex) => "COMMAND",
            Self::CommandLine(CommandKind::Confirm) => "CONFIRM",
        }
    }

    /// True if the cursor can sit one past the last char.
    #[inline]
    #[must_use]
    pub const fn cursor_past_end(self) -> bool {
        matches!(self, Self::Insert | Self::Replace)
    }

    #[inline]
    #[must_use]
    pub const fn is_visual(self) -> bool {
        matches!(self, Self::Visual(_))
    }

    /// Mapping table consulted in this mode. The confirm prompt is never
    /// remapped.
    #[must_use]
    pub const fn map_mode(self) -> Option<MapMode> {
        match self {
            Self::Normal => Some(MapMode::Normal),
            Self::Visual(_) => Some(MapMode::Visual),
            Self::Insert | Self::Replace => Some(MapMode::Insert),
            Self::CommandLine(CommandKind::Search | CommandKind::Ex) => Some(MapMode::Command),
            Self::CommandLine(CommandKind::Confirm) => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// MapMode
// ---------------------------------------------------------------------------

/// Mode a mapping belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapMode {
    Normal,
    Visual,
    Insert,
    Command,
}

impl MapMode {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Visual, Self::Insert, Self::Command];

    /// Letter used by `:map` listings and persistence.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Normal => 'n',
            Self::Visual => 'v',
            Self::Insert => 'i',
            Self::Command => 'c',
        }
    }

    #[must_use]
    pub const fn from_letter(ch: char) -> Option<Self> {
        match ch {
            'n' => Some(Self::Normal),
            'v' | 'x' => Some(Self::Visual),
            'i' => Some(Self::Insert),
            'c' => Some(Self::Command),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Display ------------------------------------------------------------

    #[test]
    fn mode_display_names() {
        assert_eq!(Mode::Normal.display_name(), "NORMAL");
        assert_eq!(Mode::Visual(VisualKind::Line).display_name(), "VISUAL LINE");
        assert_eq!(format!("{}", VisualKind::Block), "VISUAL BLOCK");
        assert_eq!(Mode::CommandLine(CommandKind::Ex).to_string(), "COMMAND");
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(Mode::default(), Mode::Normal);
    }

    // -- Cursor -------------------------------------------------------------

    #[test]
    fn cursor_past_end_only_while_typing() {
        assert!(Mode::Insert.cursor_past_end());
        assert!(Mode::Replace.cursor_past_end());
        assert!(!Mode::Normal.cursor_past_end());
        assert!(!Mode::Visual(VisualKind::Char).cursor_past_end());
    }

    // -- Mapping tables -----------------------------------------------------

    #[test]
    fn map_mode_per_mode() {
        assert_eq!(Mode::Replace.map_mode(), Some(MapMode::Insert));
        assert_eq!(Mode::Visual(VisualKind::Block).map_mode(), Some(MapMode::Visual));
        assert_eq!(Mode::CommandLine(CommandKind::Search).map_mode(), Some(MapMode::Command));
        assert_eq!(Mode::CommandLine(CommandKind::Confirm).map_mode(), None);
    }

    #[test]
    fn map_mode_letters() {
        for mode in MapMode::ALL {
            assert_eq!(MapMode::from_letter(mode.letter()), Some(mode));
        }
        assert_eq!(MapMode::from_letter('x'), Some(MapMode::Visual));
    }

    #[test]
    fn visual_kinds_map_to_register_modes() {
        assert_eq!(VisualKind::Line.operation_mode(), OperationMode::LineWise);
        assert_eq!(VisualKind::Block.operation_mode(), OperationMode::Block);
    }
}
