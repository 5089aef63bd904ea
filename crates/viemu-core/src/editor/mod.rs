//! The modal editor: keys in, buffer edits and status messages out.
//!
//! Every key goes through the [`KeyMapper`] first. Resolved keys reach
//! [`Editor::dispatch`], which routes them by [`Mode`]: Normal and Visual
//! keys build counts, registers, operators and motions; Insert and Replace
//! keys type; command-line keys edit the prompt. Macro playback, mapping
//! expansions and `:normal` feed the same dispatch through the mapper
//! queue, so a replayed key behaves exactly like a typed one.
//!
//! Errors never escape: anything a command reports becomes a
//! [`Status::Error`] and the key is otherwise a no-op.

mod commands;
mod insert;
mod normal;
mod operator;
mod prompt;
mod visual;

use std::time::Instant;

use regex::Regex;
use tracing::{debug, trace};

use crate::buffer::Buffer;
use crate::cmdline::CommandLine;
use crate::cursor::Cursor;
use crate::error::{Result, ViError};
use crate::host::{Bookmarks, LineBookmarks, SearchHit, TextBuffer};
use crate::jumplist::JumpList;
use crate::key::{KeyEvent, parse_keys};
use crate::keymap::{KeyMapper, KeyOrigin};
use crate::mark::Marks;
use crate::mode::{Mode, VisualKind};
use crate::options::Options;
use crate::persist::{self, KeyValueStore};
use crate::position::{Position, Range};
use crate::recorder::{ChangeRecorder, MacroRecorder};
use crate::session::SharedSession;

use commands::LineTracker;
pub use commands::{ExOutcome, HostRequest};
use insert::InsertSession;
use normal::{CharFind, Pending};
use prompt::{ConfirmPrompt, SearchPrompt};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// A message for the host's status line, cleared by the next key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

impl Status {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Error(text) => text,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// The last Visual selection, for `gv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisualSnapshot {
    kind: VisualKind,
    anchor: Position,
    cursor: Position,
    block_eol: bool,
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

/// One buffer being edited with Vi keys.
///
/// Registers, mappings, options, histories and the last search/change live
/// in the shared session; marks, jumps and the cursor are per editor.
pub struct Editor<B: TextBuffer = Buffer> {
    buffer: B,
    cursor: Cursor,
    mode: Mode,
    session: SharedSession,
    marks: Marks,
    jumps: JumpList,
    bookmarks: Box<dyn Bookmarks>,

    mapper: KeyMapper,
    macro_recorder: MacroRecorder,
    change: ChangeRecorder,

    // Normal/Visual command state.
    pending: Option<Pending>,
    count: Option<usize>,
    register: Option<char>,
    last_char_find: Option<(char, CharFind)>,
    block_eol: bool,
    last_visual: Option<VisualSnapshot>,

    // Insert/Replace state.
    insert: Option<InsertSession>,
    /// `<C-o>` from Insert: go back to Insert after one command.
    resume_insert: bool,

    // Command-line state.
    cmdline: CommandLine,
    /// The prompt is waiting for the register name after `<C-r>`.
    cmdline_register: bool,
    search: Option<SearchPrompt>,
    confirm: Option<ConfirmPrompt>,
    /// Mode to return to when the `:` prompt closes.
    ex_return: Mode,
    incsearch_hit: Option<Range>,

    status: Option<Status>,
    requests: Vec<HostRequest>,
    hlsearch_active: bool,
    /// Lines still to visit during `:g`.
    global: Option<LineTracker>,
    /// `@` executions during the current typed key.
    macro_runs: usize,
    /// Nesting of `:normal`.
    normal_depth: usize,
}

impl Editor<Buffer> {
    /// Convenience for an in-memory buffer holding `text`.
    #[must_use]
    pub fn from_text(text: &str, session: SharedSession) -> Self {
        Self::new(Buffer::from_text(text), session)
    }
}

impl<B: TextBuffer> Editor<B> {
    #[must_use]
    pub fn new(buffer: B, session: SharedSession) -> Self {
        Self::with_bookmarks(buffer, session, Box::new(LineBookmarks::new()))
    }

    /// Use the host's bookmark facility for user marks.
    #[must_use]
    pub fn with_bookmarks(buffer: B, session: SharedSession, bookmarks: Box<dyn Bookmarks>) -> Self {
        let mut marks = Marks::new();
        marks.sync_from_bookmarks(bookmarks.as_ref());
        Self {
            buffer,
            cursor: Cursor::new(),
            mode: Mode::Normal,
            session,
            marks,
            jumps: JumpList::new(),
            bookmarks,
            mapper: KeyMapper::new(),
            macro_recorder: MacroRecorder::new(),
            change: ChangeRecorder::new(),
            pending: None,
            count: None,
            register: None,
            last_char_find: None,
            block_eol: false,
            last_visual: None,
            insert: None,
            resume_insert: false,
            cmdline: CommandLine::new(),
            cmdline_register: false,
            search: None,
            confirm: None,
            ex_return: Mode::Normal,
            incsearch_hit: None,
            status: None,
            requests: Vec::new(),
            hlsearch_active: false,
            global: None,
            macro_runs: 0,
            normal_depth: 0,
        }
    }

    // -- Accessors ----------------------------------------------------------

    #[must_use]
    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Direct buffer access for the host. Marks do not follow edits made
    /// here.
    pub const fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    #[must_use]
    pub fn into_buffer(self) -> B {
        self.buffer
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.buffer.contents()
    }

    #[must_use]
    pub const fn cursor(&self) -> Position {
        self.cursor.position()
    }

    pub fn set_cursor(&mut self, pos: Position) {
        let past_end = self.mode.cursor_past_end();
        self.cursor.set_position(pos, &self.buffer, past_end);
    }

    /// Anchor and cursor, ordered. In Visual mode both ends are selected.
    #[must_use]
    pub fn selection(&self) -> Option<Range> {
        self.cursor.selection()
    }

    /// Select `range` characterwise: Visual mode from its start to the
    /// char before its end.
    pub fn set_selection(&mut self, range: Range) {
        let last = self
            .buffer
            .pos_to_index(range.end)
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| self.buffer.index_to_pos(idx))
            .filter(|_| !range.is_empty())
            .unwrap_or(range.start);
        self.cursor.set_position(range.start, &self.buffer, false);
        self.cursor.set_anchor();
        self.cursor.set_position(last.max(range.start), &self.buffer, false);
        self.block_eol = false;
        self.set_mode(Mode::Visual(VisualKind::Char));
    }

    pub fn clear_selection(&mut self) {
        if self.mode.is_visual() {
            self.leave_visual();
        } else {
            self.cursor.clear_anchor();
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> SharedSession {
        SharedSession::clone(&self.session)
    }

    #[must_use]
    pub const fn marks(&self) -> &Marks {
        &self.marks
    }

    #[must_use]
    pub const fn jumps(&self) -> &JumpList {
        &self.jumps
    }

    #[must_use]
    pub fn bookmarks(&self) -> &dyn Bookmarks {
        self.bookmarks.as_ref()
    }

    /// The host changed bookmarks: marks follow on the next key.
    pub fn bookmarks_mut(&mut self) -> &mut dyn Bookmarks {
        self.bookmarks.as_mut()
    }

    /// Prompt input while a command line is open.
    #[must_use]
    pub const fn command_line(&self) -> Option<&CommandLine> {
        match self.mode {
            Mode::CommandLine(_) => Some(&self.cmdline),
            _ => None,
        }
    }

    /// Register being recorded into, if any.
    #[must_use]
    pub const fn recording(&self) -> Option<char> {
        self.macro_recorder.recording()
    }

    /// Ranges to highlight: the incremental match or confirm target while a
    /// prompt is open, else every match of the last search under
    /// `hlsearch`.
    #[must_use]
    pub fn highlights(&self) -> Vec<Range> {
        if let Some(hit) = self.confirm.as_ref().and_then(|c| c.interactive.current()) {
            return vec![hit.range];
        }
        if let Some(range) = self.incsearch_hit {
            return vec![range];
        }
        let session = self.session.borrow();
        if !session.options.hlsearch || !self.hlsearch_active {
            return Vec::new();
        }
        let Some(re) = session.last_search.as_ref().and_then(|p| p.regex().ok()) else {
            return Vec::new();
        };
        all_matches(&self.buffer, &re).map(|hit| hit.range).collect()
    }

    /// Write and quit requests from ex commands, oldest first.
    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    // -- Input --------------------------------------------------------------

    pub fn feed(&mut self, key: KeyEvent) {
        self.feed_at(key, Instant::now());
    }

    /// Feed keys written in key notation, e.g. `"3dd"` or `"ihi<Esc>"`.
    pub fn feed_keys(&mut self, keys: &str) {
        for key in parse_keys(keys) {
            self.feed(key);
        }
    }

    /// Feed one typed key at time `now` (drives the mapping timeout).
    pub fn feed_at(&mut self, key: KeyEvent, now: Instant) {
        self.status = None;
        self.macro_runs = 0;
        self.marks.sync_from_bookmarks(self.bookmarks.as_ref());
        self.macro_recorder.record(key);
        self.mapper.push(key, KeyOrigin::Typed, true);
        self.drain(now);
    }

    /// When held mapping keys time out, if any are held.
    #[must_use]
    pub const fn pending_timeout(&self) -> Option<Instant> {
        self.mapper.deadline()
    }

    /// The mapping timer fired.
    pub fn on_timeout(&mut self) {
        self.mapper.expire();
        self.drain(Instant::now());
    }

    /// Fire the mapping timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        if self.mapper.deadline().is_some_and(|deadline| deadline <= now) {
            self.mapper.expire();
            self.drain(now);
        }
    }

    fn drain(&mut self, now: Instant) {
        loop {
            let map_mode = if self.wants_literal() {
                None
            } else {
                self.mode.map_mode()
            };
            let resolved = {
                let session = self.session.borrow();
                let limits = session.map_limits();
                self.mapper.next(&session.mappings, map_mode, limits, now)
            };
            let Some(resolved) = resolved else { break };
            self.dispatch(resolved.key);
            if resolved.origin == KeyOrigin::Replay && self.status.as_ref().is_some_and(Status::is_error) {
                debug!("replay stopped on error");
                self.mapper.discard(KeyOrigin::Replay);
            }
        }
    }

    /// The next key is a literal argument (`f{c}`, `"{c}`, `<C-r>{c}`...).
    fn wants_literal(&self) -> bool {
        self.pending.is_some_and(Pending::wants_literal)
            || self.cmdline_register
            || self.insert.as_ref().is_some_and(|s| s.register_pending)
    }

    /// Interpret one resolved key.
    fn dispatch(&mut self, key: KeyEvent) {
        trace!(key = %key, mode = %self.mode, "dispatch");
        if self.change.is_recording() && !self.is_operator_count(key) {
            self.change.push(key);
        }
        let resuming = self.resume_insert;
        match self.mode {
            Mode::Normal => self.normal_key(key),
            Mode::Visual(kind) => self.visual_key(kind, key),
            Mode::Insert | Mode::Replace => self.insert_key(key),
            Mode::CommandLine(kind) => self.prompt_key(kind, key),
        }
        if resuming
            && self.mode == Mode::Normal
            && self.pending.is_none()
            && self.count.is_none()
            && self.register.is_none()
        {
            self.resume_insert = false;
            self.start_insert(self.cursor.position(), 1, insert::InsertKind::Plain);
        }
        self.marks.sync_to_bookmarks(self.bookmarks.as_mut());
    }

    /// A digit extending the motion count after an operator; the recorder
    /// folds it into the change count instead of logging it.
    fn is_operator_count(&self, key: KeyEvent) -> bool {
        matches!(self.pending, Some(Pending::Operator(_)))
            && key
                .as_char()
                .is_some_and(|ch| ch.is_ascii_digit() && (ch != '0' || self.count.is_some()))
    }

    // -- Ex entry point -----------------------------------------------------

    /// Run a command line as if typed after `:`. The outcome also becomes
    /// the status message.
    pub fn execute(&mut self, line: &str) -> ExOutcome {
        debug!(line, "ex command");
        let outcome = self.run_ex(line).unwrap_or_else(|err| ExOutcome::failed(&err));
        self.status = match (&outcome.message, outcome.ok) {
            (Some(msg), true) => Some(Status::Info(msg.clone())),
            (Some(msg), false) => Some(Status::Error(msg.clone())),
            (None, _) => self.status.take(),
        };
        if let Some(request) = &outcome.request {
            self.requests.push(request.clone());
        }
        outcome
    }

    // -- Persistence --------------------------------------------------------

    /// Save session data plus this editor's jumps and marks.
    pub fn save_state(&self, store: &mut dyn KeyValueStore) {
        persist::save_session(&self.session.borrow(), store);
        persist::save_positions(&self.jumps, &self.marks, store);
    }

    /// Load what [`save_state`](Self::save_state) wrote. Groups that fail to
    /// parse are skipped; the first failure is returned.
    ///
    /// # Errors
    ///
    /// `Persist` for malformed groups.
    pub fn load_state(&mut self, store: &dyn KeyValueStore) -> Result<()> {
        let session = persist::load_session(&mut self.session.borrow_mut(), store);
        let positions = persist::load_positions(&mut self.jumps, &mut self.marks, store);
        self.marks.sync_to_bookmarks(self.bookmarks.as_mut());
        session.and(positions)
    }

    // -- Shared helpers -----------------------------------------------------

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "mode");
            self.mode = mode;
        }
    }

    fn options(&self) -> Options {
        self.session.borrow().options.clone()
    }

    fn error(&mut self, err: &ViError) {
        debug!(%err, "command failed");
        self.status = Some(Status::Error(err.to_string()));
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.status = Some(Status::Info(msg.into()));
    }

    fn take_count(&mut self) -> Option<usize> {
        self.count.take()
    }

    /// Clamp the cursor for the current mode.
    fn clamp_cursor(&mut self) {
        let past_end = self.mode.cursor_past_end();
        self.cursor.clamp(&self.buffer, past_end);
    }

    fn move_cursor(&mut self, pos: Position) {
        let past_end = self.mode.cursor_past_end();
        self.cursor.set_position(pos, &self.buffer, past_end);
    }

    /// Put the cursor on the first non-blank of `line`.
    fn goto_first_non_blank(&mut self, line: usize) {
        self.move_cursor(Position::new(line, 0));
        let past_end = self.mode.cursor_past_end();
        self.cursor.move_to_first_non_blank(&self.buffer, past_end);
    }

    fn set_mark(&mut self, ch: char, pos: Position) {
        self.marks.set(ch, pos, self.bookmarks.as_mut());
    }

    /// Remember the cursor before a jump.
    fn record_jump(&mut self) {
        let here = self.cursor.position();
        self.jumps.add(here);
        self.set_mark('\'', here);
    }

    fn finish_change(&mut self) {
        if let Some(change) = self.change.finish() {
            trace!(keys = change.keys.len(), "change recorded");
            self.session.borrow_mut().last_change = Some(change);
        }
    }

    /// Log a complete one-key change (`x`, `p`, `J`).
    fn immediate_change(&mut self, key: KeyEvent, count: Option<usize>) {
        if let Some(change) = self.change.immediate(key, count, self.register) {
            self.session.borrow_mut().last_change = Some(change);
        }
    }

    // -- Edits --------------------------------------------------------------

    /// The buffer with marks, jumps and `:g` lines following every edit.
    fn tracked(&mut self) -> Tracked<'_, B> {
        Tracked {
            buffer: &mut self.buffer,
            marks: &mut self.marks,
            jumps: &mut self.jumps,
            lines: self.global.as_mut(),
        }
    }

    fn insert_text(&mut self, pos: Position, text: &str) {
        if !text.is_empty() {
            self.tracked().insert(pos, text);
        }
    }

    fn remove_text(&mut self, range: Range) {
        if !range.is_empty() {
            self.tracked().remove(range);
        }
    }

    fn begin_edit(&mut self) {
        let cursor = self.cursor.position();
        self.buffer.begin_edit(cursor);
    }

    fn end_edit(&mut self) {
        let cursor = self.cursor.position();
        self.buffer.end_edit(cursor);
    }

    /// Record `[`, `]` and `.` around a change.
    fn set_change_marks(&mut self, start: Position, end: Position) {
        self.set_mark('[', start);
        self.set_mark(']', end);
        self.set_mark('.', start);
    }
}

// ---------------------------------------------------------------------------
// Tracked
// ---------------------------------------------------------------------------

/// A buffer view whose edits also move marks, jumps and pending `:g`
/// lines.
struct Tracked<'a, B: TextBuffer> {
    buffer: &'a mut B,
    marks: &'a mut Marks,
    jumps: &'a mut JumpList,
    lines: Option<&'a mut LineTracker>,
}

impl<B: TextBuffer> TextBuffer for Tracked<'_, B> {
    fn line_count(&self) -> usize {
        self.buffer.line_count()
    }

    fn line_len(&self, line: usize) -> usize {
        self.buffer.line_len(line)
    }

    fn line_text(&self, line: usize) -> String {
        self.buffer.line_text(line)
    }

    fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    fn char_at_index(&self, idx: usize) -> Option<char> {
        self.buffer.char_at_index(idx)
    }

    fn pos_to_index(&self, pos: Position) -> Option<usize> {
        self.buffer.pos_to_index(pos)
    }

    fn index_to_pos(&self, idx: usize) -> Option<Position> {
        self.buffer.index_to_pos(idx)
    }

    fn text(&self, range: Range) -> String {
        self.buffer.text(range)
    }

    fn insert(&mut self, pos: Position, text: &str) {
        let pos = self.buffer.clamp(pos);
        self.buffer.insert(pos, text);
        self.marks.adjust_insert(pos, text);
        let added = text.matches('\n').count();
        if added > 0 {
            self.jumps
                .shift_lines(pos.line + 1, isize::try_from(added).unwrap_or(isize::MAX));
        }
        if let Some(lines) = self.lines.as_deref_mut() {
            lines.inserted(pos, text);
        }
    }

    fn remove(&mut self, range: Range) {
        let range = Range::new(self.buffer.clamp(range.start), self.buffer.clamp(range.end));
        if let Some(lines) = self.lines.as_deref_mut() {
            lines.removed(range);
        }
        self.buffer.remove(range);
        self.marks.adjust_delete(range);
        let removed = range.end.line - range.start.line;
        if removed > 0 {
            self.jumps
                .shift_lines(range.start.line + 1, -isize::try_from(removed).unwrap_or(isize::MAX));
        }
    }

    fn begin_edit(&mut self, cursor: Position) {
        self.buffer.begin_edit(cursor);
    }

    fn end_edit(&mut self, cursor: Position) {
        self.buffer.end_edit(cursor);
    }

    fn undo(&mut self) -> Option<Position> {
        self.buffer.undo()
    }

    fn redo(&mut self) -> Option<Position> {
        self.buffer.redo()
    }

    fn find(&self, re: &Regex, from: Position, limit: Position) -> Option<SearchHit> {
        self.buffer.find(re, from, limit)
    }
}

/// Every match of `re` in the buffer, stepping past empty matches.
fn all_matches<'a>(buf: &'a dyn TextBuffer, re: &'a Regex) -> impl Iterator<Item = SearchHit> + 'a {
    let end = buf.end_position();
    let mut from = Some(Position::ZERO);
    std::iter::from_fn(move || {
        let hit = buf.find(re, from?, end)?;
        from = if hit.range.is_empty() {
            buf.pos_to_index(hit.range.end)
                .and_then(|idx| buf.index_to_pos(idx + 1))
        } else {
            Some(hit.range.end)
        };
        Some(hit)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
