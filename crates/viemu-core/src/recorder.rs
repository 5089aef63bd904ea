//! Keystroke recorders: `q` macros and the `.` last change.
//!
//! Both capture raw key events. The macro recorder is fed typed keys only,
//! before mapping, so a replay re-resolves mappings the way the original
//! typing did. The change recorder is fed dispatched keys, after mapping,
//! and is replayed without remapping.

use tracing::debug;

use crate::key::{KeyEvent, format_keys};

// ---------------------------------------------------------------------------
// Macro recorder
// ---------------------------------------------------------------------------

/// `q{reg}` … `q` recording.
#[derive(Debug, Default, Clone)]
pub struct MacroRecorder {
    register: Option<char>,
    keys: Vec<KeyEvent>,
}

impl MacroRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register being recorded into, if any.
    #[must_use]
    pub const fn recording(&self) -> Option<char> {
        self.register
    }

    /// Begin recording into `register`, discarding anything in progress.
    pub fn start(&mut self, register: char) {
        debug!(register = %register, "macro recording started");
        self.register = Some(register);
        self.keys.clear();
    }

    /// Append a typed key. Ignored when not recording.
    pub fn record(&mut self, key: KeyEvent) {
        if self.register.is_some() {
            self.keys.push(key);
        }
    }

    /// Stop recording. Returns the register and the recorded keys in
    /// notation, minus the `q` that stopped the recording.
    pub fn stop(&mut self) -> Option<(char, String)> {
        let register = self.register.take()?;
        let mut keys = std::mem::take(&mut self.keys);
        if keys.last().is_some_and(|k| k.is_char('q')) {
            keys.pop();
        }
        let text = format_keys(&keys);
        debug!(register = %register, keys = %text, "macro recording stopped");
        Some((register, text))
    }
}

// ---------------------------------------------------------------------------
// Change recorder
// ---------------------------------------------------------------------------

/// The last completed change, ready for `.` replay.
///
/// The key sequence has count digits stripped; counts are tracked separately
/// so a count before `.` can replace the original.
///
/// ```text
/// 2d3w        → count=Some(6), keys=[d, w]
/// dw          → count=None,    keys=[d, w]
/// "ap         → count=None,    register=Some('a'), keys=[p]
/// ihello<Esc> → count=None,    keys=[i, h, e, l, l, o, Esc]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub count: Option<usize>,
    pub register: Option<char>,
    pub keys: Vec<KeyEvent>,
}

/// Builds [`Change`]s from dispatched keys.
#[derive(Debug, Default, Clone)]
pub struct ChangeRecorder {
    recording: bool,
    replaying: bool,
    keys: Vec<KeyEvent>,
    count: Option<usize>,
    register: Option<char>,
}

/// Merge two optional counts by multiplication.
///
/// `None` only when both are `None` (no count typed).
#[must_use]
pub const fn merge_counts(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (Some(x), Some(y)) => Some(x.saturating_mul(y)),
    }
}

impl ChangeRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording
    }

    #[must_use]
    pub const fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// While replaying, every recording call is a no-op so the replay does
    /// not overwrite the change it is replaying.
    pub const fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    /// Start recording a change initiated by `key`.
    pub fn start(&mut self, key: KeyEvent, count: Option<usize>, register: Option<char>) {
        if self.replaying {
            return;
        }
        self.recording = true;
        self.keys.clear();
        self.keys.push(key);
        self.count = count;
        self.register = register;
    }

    /// Append a key to the change in progress.
    pub fn push(&mut self, key: KeyEvent) {
        if self.recording && !self.replaying {
            self.keys.push(key);
        }
    }

    /// Fold a motion count typed after the operator (`2d3w`).
    pub const fn merge_count(&mut self, count: Option<usize>) {
        if self.recording && !self.replaying {
            self.count = merge_counts(self.count, count);
        }
    }

    /// Finalize the change in progress.
    pub fn finish(&mut self) -> Option<Change> {
        if self.replaying || !self.recording {
            return None;
        }
        self.recording = false;
        if self.keys.is_empty() {
            return None;
        }
        Some(Change {
            count: self.count,
            register: self.register,
            keys: std::mem::take(&mut self.keys),
        })
    }

    /// A one-key change (`x`, `p`, `J`), finalized immediately.
    pub fn immediate(
        &mut self,
        key: KeyEvent,
        count: Option<usize>,
        register: Option<char>,
    ) -> Option<Change> {
        if self.replaying {
            return None;
        }
        self.recording = false;
        self.keys.clear();
        Some(Change {
            count,
            register,
            keys: vec![key],
        })
    }

    /// Drop the change in progress; the previous change stays.
    pub fn cancel(&mut self) {
        self.recording = false;
        self.keys.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
