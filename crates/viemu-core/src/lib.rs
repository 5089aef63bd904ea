//! # viemu-core
//!
//! Vi emulation for any text buffer.
//!
//! The engine turns keystrokes into edits on a host-supplied buffer. The
//! host implements [`TextBuffer`] (and optionally [`Bookmarks`] and
//! [`Clipboard`]), feeds keys to an [`Editor`], and redraws from the cursor,
//! selection, status and highlights the editor reports.
//!
//! - **[`editor`]**: the mode state machine, operators, Insert, Visual,
//!   the command-line prompts and ex commands
//! - **[`host`]**: the traits the host implements
//! - **[`buffer`]**: `Buffer`, an in-memory rope implementation of them
//! - **[`key`]** / **[`keymap`]**: key events, key notation, user mappings
//! - **[`register`]**, **[`mark`]**, **[`jumplist`]**: where text and
//!   positions are kept
//! - **[`pattern`]** / **[`search`]** / **[`substitute`]**: Vi regex
//!   translation, searching and `:s`
//! - **[`range`]** / **[`ex`]**: command-line addresses and command names
//! - **[`session`]** / **[`persist`]**: state shared between editors and
//!   saved between runs

pub mod buffer;
pub mod cmdline;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod ex;
pub mod history;
pub mod host;
pub mod jumplist;
pub mod key;
pub mod keymap;
pub mod mark;
pub mod mode;
pub mod options;
pub mod pattern;
pub mod persist;
pub mod position;
pub mod range;
pub mod recorder;
pub mod register;
pub mod search;
pub mod session;
pub mod substitute;
pub mod text_object;
pub mod word;

pub use buffer::Buffer;
pub use editor::{Editor, ExOutcome, HostRequest, Status};
pub use error::{Result, ViError};
pub use host::{Bookmarks, Clipboard, ClipboardKind, LineBookmarks, MemoryClipboard, TextBuffer};
pub use key::{KeyCode, KeyEvent, Modifiers, format_keys, parse_keys};
pub use mode::Mode;
pub use options::Options;
pub use persist::KeyValueStore;
pub use position::{Position, Range};
pub use session::{Session, SharedSession};
