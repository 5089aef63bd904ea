//! Session state shared by every editor.
//!
//! Registers, mappings, options, the last search, the last substitution,
//! the last change and the input histories are one per session, not one
//! per buffer. The session is built first and editors borrow it through a
//! [`SharedSession`] handle; nothing in the crate is global.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::cmdline::InputHistory;
use crate::host::Clipboard;
use crate::keymap::{MapLimits, MapTable};
use crate::options::Options;
use crate::recorder::Change;
use crate::register::RegisterFile;
use crate::search::SearchParams;
use crate::substitute::Substitution;

/// Handle through which editors share one [`Session`].
pub type SharedSession = Rc<RefCell<Session>>;

/// Everything that outlives a single buffer.
#[derive(Debug, Default)]
pub struct Session {
    pub registers: RegisterFile,
    pub mappings: MapTable,
    pub options: Options,
    pub last_search: Option<SearchParams>,
    pub last_substitute: Option<Substitution>,
    pub last_change: Option<Change>,
    pub search_history: InputHistory,
    pub command_history: InputHistory,
    /// Register of the last `@x`, for `@@`.
    pub last_macro: Option<char>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A session whose `+`/`*` registers go to `clipboard`.
    #[must_use]
    pub fn with_clipboard(clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            registers: RegisterFile::new(clipboard),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Wrap in the shared handle editors take.
    #[must_use]
    pub fn into_shared(self) -> SharedSession {
        Rc::new(RefCell::new(self))
    }

    /// A committed search: becomes the last search, fills the `/`
    /// register, and enters the search history.
    pub fn record_search(&mut self, params: SearchParams, typed: &str) {
        self.registers.set_last_search(&params.pattern);
        self.search_history.push(typed, self.options.history);
        self.last_search = Some(params);
    }

    /// An executed command line: fills `:` and the command history.
    pub fn record_command(&mut self, line: &str) {
        self.registers.set_last_command(line);
        self.command_history.push(line, self.options.history);
    }

    #[must_use]
    pub fn map_limits(&self) -> MapLimits {
        MapLimits {
            max_depth: self.options.maxmapdepth,
            timeout: Duration::from_millis(self.options.timeoutlen),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
