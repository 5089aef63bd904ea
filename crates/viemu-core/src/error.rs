//! Error type for everything that can go wrong while interpreting keys.
//!
//! None of these are fatal. The editor turns every error into a status
//! message at the dispatch boundary and carries on; the messages follow
//! Vim's `E<number>: text` wording so they read familiar in a status line.

use thiserror::Error;

/// Errors produced by parsers, lookups and ex commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViError {
    #[error("E486: Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("E35: No previous regular expression")]
    NoPreviousPattern,

    #[error("E383: Invalid search string: {0}")]
    InvalidPattern(String),

    #[error("E384: search hit TOP without match for: {0}")]
    HitTop(String),

    #[error("E385: search hit BOTTOM without match for: {0}")]
    HitBottom(String),

    #[error("E16: Invalid range")]
    InvalidRange,

    #[error("E14: Invalid address")]
    InvalidAddress,

    #[error("E20: Mark not set")]
    MarkNotSet,

    #[error("E191: Argument must be a letter or forward/backward quote")]
    InvalidMark,

    #[error("E492: Not an editor command: {0}")]
    NotACommand(String),

    #[error("E488: Trailing characters: {0}")]
    TrailingCharacters(String),

    #[error("E146: Regular expressions can't be delimited by letters")]
    InvalidDelimiter,

    #[error("E35: No previous substitute regular expression")]
    NoPreviousSubstitute,

    #[error("E474: Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("E518: Unknown option: {0}")]
    UnknownOption(String),

    #[error("E31: No such mapping")]
    NoSuchMapping,

    #[error("E353: Nothing in register {0}")]
    EmptyRegister(char),

    #[error("E354: Invalid register name: '{0}'")]
    InvalidRegister(char),

    #[error("E348: No string under cursor")]
    NoStringUnderCursor,

    #[error("session data: {0}")]
    Persist(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ViError>;
