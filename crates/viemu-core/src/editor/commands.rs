//! Ex commands: everything after `:`.
//!
//! A command line is split into its range ([`parse_range`]), then its
//! command ([`split_command`]), then run here against the editor. Errors
//! come back as [`ViError`]s; [`Editor::execute`] turns them into the
//! status line.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, warn};

use super::Editor;
use super::operator::Region;
use crate::error::{Result, ViError};
use crate::ex::{self, ExCommand, MapModes};
use crate::host::TextBuffer;
use crate::key::{KeyEvent, format_keys, parse_keys};
use crate::keymap::{KeyMapper, KeyOrigin};
use crate::mark::Marks;
use crate::mode::{MapMode, Mode};
use crate::position::{Position, Range};
use crate::range::{LineRange, RangeContext, parse_address, parse_range};
use crate::register::{OperationMode, Register};
use crate::search::{self, SearchDirection, SearchParams};
use crate::substitute::{self, Interactive, Replacer, SubCommand, Substitution};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Something an ex command asks of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    /// `:w [path]`, `:wq`, `:x`.
    Write { path: Option<PathBuf>, quit: bool },
    /// `:q`, `:q!`.
    Quit { force: bool },
}

/// Result of one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExOutcome {
    pub ok: bool,
    /// Text for the status line, if the command printed anything.
    pub message: Option<String>,
    pub request: Option<HostRequest>,
}

impl ExOutcome {
    #[must_use]
    pub const fn done() -> Self {
        Self { ok: true, message: None, request: None }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self { ok: true, message: Some(message.into()), request: None }
    }

    #[must_use]
    pub fn failed(err: &ViError) -> Self {
        Self { ok: false, message: Some(err.to_string()), request: None }
    }

    fn request(request: HostRequest) -> Self {
        Self { ok: true, message: None, request: Some(request) }
    }
}

// ---------------------------------------------------------------------------
// LineTracker
// ---------------------------------------------------------------------------

/// Lines marked for a pass (`:g`, ranged `:normal`), kept in step with
/// the edits made while the pass runs. A deleted line drops out.
#[derive(Debug, Clone, Default)]
pub(super) struct LineTracker {
    lines: Vec<Option<usize>>,
}

impl LineTracker {
    pub(super) fn new(lines: &[usize]) -> Self {
        Self { lines: lines.iter().copied().map(Some).collect() }
    }

    pub(super) fn len(&self) -> usize {
        self.lines.len()
    }

    /// Where the `i`th marked line is now, `None` once deleted.
    pub(super) fn line(&self, i: usize) -> Option<usize> {
        self.lines.get(i).copied().flatten()
    }

    pub(super) fn inserted(&mut self, at: Position, text: &str) {
        let added = text.matches('\n').count();
        if added == 0 {
            return;
        }
        for line in self.lines.iter_mut().flatten() {
            if *line > at.line || (*line == at.line && at.col == 0) {
                *line += added;
            }
        }
    }

    /// Called before `range` is removed. From column 0 to column 0 the
    /// covered lines vanish; otherwise the lines after the start merge into
    /// it.
    pub(super) fn removed(&mut self, range: Range) {
        let Range { start, end } = range;
        let joined = end.line - start.line;
        if joined == 0 {
            return;
        }
        let gone = if start.col == 0 && end.col == 0 {
            start.line..end.line
        } else {
            start.line + 1..end.line + 1
        };
        for slot in &mut self.lines {
            match *slot {
                Some(line) if gone.contains(&line) => *slot = None,
                Some(line) if line >= gone.end => *slot = Some(line - joined),
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

impl<B: TextBuffer> RangeContext for Editor<B> {
    fn current_line(&self) -> usize {
        self.cursor.line()
    }

    fn last_line(&self) -> usize {
        self.buffer.last_line()
    }

    fn mark_line(&self, mark: char) -> Option<usize> {
        self.marks.get(mark).map(|pos| pos.line)
    }

    fn search_line(&self, pattern: &str, line: usize, backward: bool) -> Result<usize> {
        let direction = if backward { SearchDirection::Backward } else { SearchDirection::Forward };
        let pattern = self.pattern_or_last(pattern)?;
        let options = self.options();
        let params = SearchParams::new(&pattern, direction, options.ignorecase, options.smartcase)?;
        let re = params.regex()?;
        // `/pat/` starts on the next line, `?pat?` on the one before.
        let from = if backward {
            Position::new(line, 0)
        } else {
            Position::new(line, self.buffer.line_len(line))
        };
        let found = search::find_pattern(&self.buffer, &re, &pattern, from, direction, 1, true)?;
        Ok(found.hit.range.start.line)
    }
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

impl<B: TextBuffer> Editor<B> {
    /// Parse and run one command line.
    pub(super) fn run_ex(&mut self, line: &str) -> Result<ExOutcome> {
        let parsed = parse_range(line, &*self)?;
        if parsed.command.is_empty() {
            return Ok(ExOutcome::done());
        }
        let cmd = ex::split_command(&parsed.command)?;
        let range = parsed.range;
        let args = cmd.args;
        debug!(command = ?cmd.command, ?range, args, "run ex");

        match cmd.command {
            ExCommand::Goto => self.goto_line(range, args),
            ExCommand::Delete | ExCommand::Yank => {
                let (register, count) = register_and_count(args)?;
                let r = self.counted(self.line_range(range)?, count);
                let region = Region::Lines { first: r.start, last: r.end };
                self.register = register;
                if cmd.command == ExCommand::Delete {
                    self.delete_region(region);
                } else {
                    let here = self.cursor.position();
                    self.yank_region(region);
                    self.move_cursor(here);
                }
                Ok(ExOutcome::done())
            }
            ExCommand::Put => self.put_lines(range, args, cmd.bang),
            ExCommand::Join => {
                let r = self.line_range(range)?;
                let (first, count) = match parse_count(args)? {
                    Some(count) => (r.end, count),
                    None => (r.start, r.len()),
                };
                self.join_lines(first, count, !cmd.bang);
                Ok(ExOutcome::done())
            }
            ExCommand::ShiftRight | ExCommand::ShiftLeft => {
                let right = cmd.command == ExCommand::ShiftRight;
                let ch = if right { '>' } else { '<' };
                let repeats = args.chars().take_while(|&c| c == ch).count();
                let count = parse_count(&args[repeats..])?;
                let r = self.counted(self.line_range(range)?, count);
                self.shift_lines(r.start, r.end, repeats + 1, right);
                Ok(ExOutcome::done())
            }
            ExCommand::Move => {
                let r = self.line_range(range)?;
                let dest = self.destination(args)?;
                self.move_lines(r, dest)
            }
            ExCommand::Copy => {
                let r = self.line_range(range)?;
                let dest = self.destination(args)?;
                Ok(self.copy_lines(r, dest))
            }
            ExCommand::Substitute => {
                let command = substitute::parse_substitute(args)?;
                self.substitute(range, command)
            }
            ExCommand::SubRepeat => {
                let (flags, count) = substitute::parse_flags(args.trim())?;
                self.substitute(range, SubCommand::Repeat { flags, count })
            }
            ExCommand::NoHlsearch => {
                self.hlsearch_active = false;
                Ok(ExOutcome::done())
            }
            ExCommand::Set => {
                let shown = self.session.borrow_mut().options.run_set(args)?;
                Ok(shown.map_or_else(ExOutcome::done, ExOutcome::info))
            }
            ExCommand::Map { modes, recursive } => self.map(map_modes(modes, cmd.bang), args, recursive),
            ExCommand::Unmap { modes } => self.unmap(&map_modes(modes, cmd.bang), args),
            ExCommand::MapClear { modes } => {
                let mut session = self.session.borrow_mut();
                for mode in map_modes(modes, cmd.bang) {
                    session.mappings.clear(mode);
                }
                Ok(ExOutcome::done())
            }
            ExCommand::Normal => self.normal(range, args, !cmd.bang),
            ExCommand::Marks => Ok(self.list_marks(args)),
            ExCommand::DelMarks => self.delete_marks(args, cmd.bang),
            ExCommand::Mark => {
                let line = self.line_range(range)?.end;
                let mut chars = args.chars();
                let (Some(name), None) = (chars.next(), chars.next()) else {
                    return Err(ViError::InvalidArgument(args.to_string()));
                };
                if !Marks::is_settable(name) {
                    return Err(ViError::InvalidMark);
                }
                self.set_mark(name, Position::new(line, 0));
                Ok(ExOutcome::done())
            }
            ExCommand::Registers => Ok(self.list_registers(args)),
            ExCommand::Jumps => Ok(self.list_jumps()),
            ExCommand::History => Ok(self.list_history(args)),
            ExCommand::Undo => {
                self.undo(parse_count(args)?.unwrap_or(1));
                Ok(ExOutcome::done())
            }
            ExCommand::Redo => {
                self.redo(parse_count(args)?.unwrap_or(1));
                Ok(ExOutcome::done())
            }
            ExCommand::Write => Ok(ExOutcome::request(HostRequest::Write { path: path_arg(args), quit: false })),
            ExCommand::WriteQuit | ExCommand::Xit => {
                Ok(ExOutcome::request(HostRequest::Write { path: path_arg(args), quit: true }))
            }
            ExCommand::Quit => Ok(ExOutcome::request(HostRequest::Quit { force: cmd.bang })),
            ExCommand::Global => self.global(range, args, cmd.bang),
            ExCommand::VGlobal => self.global(range, args, true),
        }
    }

    // -- Ranges -------------------------------------------------------------

    /// The given range, or the cursor line, checked against the buffer.
    fn line_range(&self, range: Option<LineRange>) -> Result<LineRange> {
        range
            .unwrap_or_else(|| LineRange::single(self.cursor.line()))
            .check(self.buffer.last_line())
    }

    /// A trailing count runs from the range end: `:3d 2` is lines 3 and 4.
    fn counted(&self, range: LineRange, count: Option<usize>) -> LineRange {
        match count {
            Some(count) => {
                let last = (range.end + count.max(1) - 1).min(self.buffer.last_line());
                LineRange::new(range.end, last)
            }
            None => range,
        }
    }

    /// `:m`/`:t` target, 1-indexed; 0 is above the first line.
    fn destination(&self, args: &str) -> Result<usize> {
        let (addr, rest) = parse_address(args, self)?.ok_or(ViError::InvalidAddress)?;
        if !rest.trim().is_empty() {
            return Err(ViError::TrailingCharacters(rest.trim().to_string()));
        }
        if addr > self.buffer.line_count() {
            return Err(ViError::InvalidRange);
        }
        Ok(addr)
    }

    fn pattern_or_last(&self, pattern: &str) -> Result<String> {
        if !pattern.is_empty() {
            return Ok(pattern.to_string());
        }
        self.session
            .borrow()
            .last_search
            .as_ref()
            .map(|params| params.pattern.clone())
            .ok_or(ViError::NoPreviousPattern)
    }

    fn goto_line(&mut self, range: Option<LineRange>, args: &str) -> Result<ExOutcome> {
        let line = match range {
            Some(r) => r.end,
            None => match parse_count(args)? {
                Some(n) => n.saturating_sub(1),
                None => return Ok(ExOutcome::done()),
            },
        };
        self.record_jump();
        self.goto_first_non_blank(line.min(self.buffer.last_line()));
        Ok(ExOutcome::done())
    }

    // -- Line edits ---------------------------------------------------------

    fn lines_text(&self, first: usize, last: usize) -> String {
        (first..=last).map(|line| self.buffer.line_text(line)).collect::<Vec<_>>().join("\n")
    }

    /// Insert `body` as whole lines before `line`, or after the last line.
    fn insert_lines(&mut self, line: usize, body: &str) {
        if line > self.buffer.last_line() {
            let end = self.buffer.end_position();
            self.insert_text(end, &format!("\n{body}"));
        } else {
            self.insert_text(Position::new(line, 0), &format!("{body}\n"));
        }
    }

    fn move_lines(&mut self, range: LineRange, dest: usize) -> Result<ExOutcome> {
        let LineRange { start, end } = range;
        if dest > start && dest <= end {
            return Err(ViError::InvalidArgument("cannot move a range of lines into itself".into()));
        }
        let n = range.len();
        if dest == start || dest == end + 1 || n == self.buffer.line_count() {
            self.goto_first_non_blank(end);
            return Ok(ExOutcome::done());
        }
        let body = self.lines_text(start, end);
        self.begin_edit();
        let last = if dest > end {
            self.insert_lines(dest, &body);
            let removal = self.linewise_removal(start, end);
            self.remove_text(removal);
            dest - 1
        } else {
            let removal = self.linewise_removal(start, end);
            self.remove_text(removal);
            self.insert_lines(dest, &body);
            dest + n - 1
        };
        self.end_edit();
        self.goto_first_non_blank(last);
        Ok(if n > 2 { ExOutcome::info(format!("{n} lines moved")) } else { ExOutcome::done() })
    }

    fn copy_lines(&mut self, range: LineRange, dest: usize) -> ExOutcome {
        let n = range.len();
        let body = self.lines_text(range.start, range.end);
        self.begin_edit();
        self.insert_lines(dest, &body);
        self.end_edit();
        self.goto_first_non_blank(dest + n - 1);
        if n > 2 { ExOutcome::info(format!("{n} more lines")) } else { ExOutcome::done() }
    }

    /// `:pu [x]` puts linewise after the range end; `:pu!` above it.
    fn put_lines(&mut self, range: Option<LineRange>, args: &str, above: bool) -> Result<ExOutcome> {
        let line = self.line_range(range)?.end;
        let name = args.chars().next().unwrap_or('"');
        let register = self.session.borrow_mut().registers.get_nonempty(name)?;
        let register = Register::new(register.content(), OperationMode::LineWise);
        self.move_cursor(Position::new(line, 0));
        self.put(&register, !above, 1, false);
        Ok(ExOutcome::done())
    }

    // -- Substitute ---------------------------------------------------------

    fn substitute(&mut self, range: Option<LineRange>, command: SubCommand) -> Result<ExOutcome> {
        let sub = match command {
            SubCommand::Full(sub) => {
                let previous = self.session.borrow().last_substitute.as_ref().map(|s| s.flags);
                Substitution { flags: sub.flags.merged_with(previous.unwrap_or_default()), ..sub }
            }
            SubCommand::Repeat { flags, count } => {
                let last = self
                    .session
                    .borrow()
                    .last_substitute
                    .clone()
                    .ok_or(ViError::NoPreviousSubstitute)?;
                Substitution { flags: flags.merged_with(last.flags), count, ..last }
            }
        };
        let pattern = self.pattern_or_last(&sub.pattern)?;
        let flags = sub.flags;

        let options = self.options();
        let ignorecase = flags.ignore_case.unwrap_or(options.ignorecase);
        let smartcase = flags.ignore_case.is_none() && options.smartcase;
        let direction = self
            .session
            .borrow()
            .last_search
            .as_ref()
            .map_or(SearchDirection::Forward, |p| p.direction);
        let params = SearchParams::new(&pattern, direction, ignorecase, smartcase)?;
        let re = params.regex()?;
        {
            let mut session = self.session.borrow_mut();
            session.last_substitute = Some(Substitution { pattern: pattern.clone(), ..sub.clone() });
            session.record_search(params, &pattern);
        }
        self.hlsearch_active = true;

        let range = self.counted(self.line_range(range)?, sub.count);
        let mut replacer = Replacer::new(re, &sub.replacement, flags, range);

        if flags.confirm && !flags.count_only && self.global.is_none() {
            let interactive = Interactive::start(replacer, &self.buffer);
            if interactive.current().is_none() {
                return if flags.no_error { Ok(ExOutcome::done()) } else { Err(ViError::PatternNotFound(pattern)) };
            }
            self.start_confirm(interactive, sub.replacement);
            return Ok(ExOutcome::done());
        }

        self.begin_edit();
        let stats = replacer.run_all(&mut self.tracked());
        self.end_edit();
        debug!(count = stats.count, lines = stats.lines, "substitute");

        if stats.count == 0 {
            return if flags.no_error { Ok(ExOutcome::done()) } else { Err(ViError::PatternNotFound(pattern)) };
        }
        if flags.count_only {
            return Ok(ExOutcome::info(stats.message(true)));
        }
        if let (Some(start), Some(end)) = (stats.last_start, stats.last_end) {
            self.set_change_marks(start, end);
            self.goto_first_non_blank(start.line);
        }
        if stats.count > 2 && self.global.is_none() {
            Ok(ExOutcome::info(stats.message(false)))
        } else {
            Ok(ExOutcome::done())
        }
    }

    // -- Global -------------------------------------------------------------

    /// `:g/pat/cmd`, `:g!/pat/cmd`, `:v/pat/cmd`.
    fn global(&mut self, range: Option<LineRange>, args: &str, invert: bool) -> Result<ExOutcome> {
        if self.global.is_some() {
            return Err(ViError::InvalidArgument("cannot nest :global".into()));
        }
        let args = args.trim_start();
        let Some(delim) = args.chars().next() else {
            return Err(ViError::NoPreviousPattern);
        };
        if !substitute::is_valid_delimiter(delim) {
            return Err(ViError::InvalidDelimiter);
        }
        let (pattern, command) = split_pattern(&args[delim.len_utf8()..], delim);
        let pattern = self.pattern_or_last(&pattern)?;

        let options = self.options();
        let params = SearchParams::new(&pattern, SearchDirection::Forward, options.ignorecase, options.smartcase)?;
        let re = params.regex()?;
        self.session.borrow_mut().record_search(params, &pattern);
        self.hlsearch_active = true;

        let last = self.buffer.last_line();
        let range = range.unwrap_or(LineRange::new(0, last)).check(last)?;
        let lines: Vec<usize> = (range.start..=range.end)
            .filter(|&line| re.is_match(&self.buffer.line_text(line)) != invert)
            .collect();
        debug!(pattern, invert, matched = lines.len(), "global");
        if lines.is_empty() {
            return if invert {
                Ok(ExOutcome::info(format!("Pattern found in every line: {pattern}")))
            } else {
                Err(ViError::PatternNotFound(pattern))
            };
        }

        let command = command.trim();
        if command.is_empty() {
            let listing: Vec<String> = lines.iter().map(|&line| self.buffer.line_text(line)).collect();
            if let Some(&line) = lines.last() {
                self.goto_first_non_blank(line);
            }
            return Ok(ExOutcome::info(listing.join("\n")));
        }

        let before = self.buffer.line_count();
        self.begin_edit();
        let outcome = self.visit_lines(&lines, |ed, _| ed.run_ex(command));
        self.end_edit();
        self.clamp_cursor();

        let after = self.buffer.line_count();
        let outcome = outcome?;
        if outcome.message.is_none() && before.abs_diff(after) > 2 {
            let n = before.abs_diff(after);
            let word = if after < before { "fewer" } else { "more" };
            return Ok(ExOutcome { message: Some(format!("{n} {word} lines")), ..outcome });
        }
        Ok(outcome)
    }

    /// Run `f` with the cursor on each of `lines` in turn, following them
    /// through the edits `f` makes. Deleted lines are skipped. A line that
    /// fails does not stop the pass; the first failure is returned at the
    /// end.
    fn visit_lines(
        &mut self,
        lines: &[usize],
        mut f: impl FnMut(&mut Self, usize) -> Result<ExOutcome>,
    ) -> Result<ExOutcome> {
        let outer = self.global.replace(LineTracker::new(lines));
        let mut outcome = ExOutcome::done();
        let mut failure = None;
        let count = self.global.as_ref().map_or(0, LineTracker::len);
        for i in 0..count {
            let Some(line) = self.global.as_ref().and_then(|t| t.line(i)) else { continue };
            if line > self.buffer.last_line() {
                continue;
            }
            self.move_cursor(Position::new(line, 0));
            match f(self, line) {
                Ok(done) if done.message.is_some() || done.request.is_some() => outcome = done,
                Ok(_) | Err(ViError::PatternNotFound(_)) => {}
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        self.global = outer;
        failure.map_or(Ok(outcome), Err)
    }

    // -- :normal ------------------------------------------------------------

    fn normal(&mut self, range: Option<LineRange>, args: &str, remap: bool) -> Result<ExOutcome> {
        if args.is_empty() {
            return Err(ViError::InvalidArgument("normal".into()));
        }
        let keys = parse_keys(args);
        match range {
            None => self.run_keys(&keys, remap),
            Some(range) => {
                let range = range.check(self.buffer.last_line())?;
                let lines: Vec<usize> = (range.start..=range.end).collect();
                self.begin_edit();
                let outcome = self.visit_lines(&lines, |ed, _| {
                    ed.run_keys(&keys, remap);
                    Ok(ExOutcome::done())
                });
                self.end_edit();
                outcome?;
            }
        }
        Ok(ExOutcome::done())
    }

    /// Feed `keys` as Normal-mode input on a fresh key queue. An unfinished
    /// command is abandoned as if `<Esc>` were typed.
    fn run_keys(&mut self, keys: &[KeyEvent], remap: bool) {
        let limit = self.options().maxmapdepth;
        if self.normal_depth >= limit {
            warn!(depth = self.normal_depth, "`:normal` nested too deep");
            return;
        }
        if self.mode != Mode::Normal {
            self.set_mode(Mode::Normal);
        }
        self.normal_depth += 1;
        let outer = std::mem::replace(&mut self.mapper, KeyMapper::new());
        for key in keys {
            self.mapper.push(*key, KeyOrigin::Replay, remap);
        }
        let now = Instant::now();
        self.drain(now);
        self.mapper.expire();
        self.drain(now);
        for _ in 0..3 {
            if self.mode == Mode::Normal && self.pending.is_none() {
                break;
            }
            self.mapper.push(KeyEvent::esc(), KeyOrigin::Replay, false);
            self.drain(now);
        }
        self.mapper = outer;
        self.normal_depth -= 1;
    }

    // -- Mappings -----------------------------------------------------------

    fn map(&mut self, modes: Vec<MapMode>, args: &str, recursive: bool) -> Result<ExOutcome> {
        let args = args.trim();
        let (lhs, rhs) = match args.split_once(char::is_whitespace) {
            Some((lhs, rhs)) => (lhs, rhs.trim_start()),
            None => (args, ""),
        };
        if rhs.is_empty() {
            let session = self.session.borrow();
            let filter = format_keys(&parse_keys(lhs));
            let listing: Vec<String> = session
                .mappings
                .listing(&modes)
                .into_iter()
                .filter(|line| lhs.is_empty() || line.split_whitespace().nth(1) == Some(filter.as_str()))
                .collect();
            if listing.is_empty() {
                return Ok(ExOutcome::info("No mapping found"));
            }
            return Ok(ExOutcome::info(listing.join("\n")));
        }
        let (from, to) = (parse_keys(lhs), parse_keys(rhs));
        let mut session = self.session.borrow_mut();
        for mode in modes {
            session.mappings.map(mode, from.clone(), to.clone(), recursive)?;
        }
        Ok(ExOutcome::done())
    }

    fn unmap(&mut self, modes: &[MapMode], args: &str) -> Result<ExOutcome> {
        let from = parse_keys(args.trim());
        let mut session = self.session.borrow_mut();
        let removed = modes
            .iter()
            .filter(|&&mode| session.mappings.unmap(mode, &from).is_ok())
            .count();
        if removed == 0 {
            return Err(ViError::NoSuchMapping);
        }
        Ok(ExOutcome::done())
    }

    // -- Listings -----------------------------------------------------------

    fn list_marks(&self, args: &str) -> ExOutcome {
        let mut lines = vec!["mark line  col text".to_string()];
        for (name, pos) in self.marks.iter() {
            if !args.is_empty() && !args.contains(name) {
                continue;
            }
            let text = if pos.line <= self.buffer.last_line() {
                self.buffer.line_text(pos.line).trim().to_string()
            } else {
                String::new()
            };
            lines.push(format!(" {name} {:>6} {:>4} {text}", pos.line + 1, pos.col));
        }
        ExOutcome::info(lines.join("\n"))
    }

    /// `:delm a b-d`, `:delm!`.
    fn delete_marks(&mut self, args: &str, all: bool) -> Result<ExOutcome> {
        if all {
            self.marks.clear_user(self.bookmarks.as_mut());
            return Ok(ExOutcome::done());
        }
        if args.trim().is_empty() {
            return Err(ViError::InvalidArgument(String::new()));
        }
        let chars: Vec<char> = args.chars().filter(|c| !c.is_whitespace()).collect();
        let mut names = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if chars.get(i + 1) == Some(&'-') {
                let end = *chars.get(i + 2).ok_or_else(|| ViError::InvalidArgument(args.to_string()))?;
                if !(ch.is_ascii_lowercase() && end.is_ascii_lowercase() && ch <= end) {
                    return Err(ViError::InvalidArgument(args.to_string()));
                }
                names.extend(ch..=end);
                i += 3;
            } else {
                if !Marks::is_readable(ch) {
                    return Err(ViError::InvalidArgument(args.to_string()));
                }
                names.push(ch);
                i += 1;
            }
        }
        for name in names {
            self.marks.remove(name, self.bookmarks.as_mut());
        }
        Ok(ExOutcome::done())
    }

    fn list_registers(&self, args: &str) -> ExOutcome {
        let listing = self.session.borrow_mut().registers.listing();
        let mut lines = vec!["Type Name Content".to_string()];
        for (name, register) in listing {
            if !args.is_empty() && !args.contains(name) {
                continue;
            }
            lines.push(format!("  {}  \"{name}   {}", register.mode().tag(), escape_control(register.content())));
        }
        ExOutcome::info(lines.join("\n"))
    }

    fn list_jumps(&self) -> ExOutcome {
        let current = self.jumps.current();
        let mut lines = vec![" jump line  col text".to_string()];
        for (i, pos) in self.jumps.entries().iter().enumerate() {
            let marker = if i == current { '>' } else { ' ' };
            let text = if pos.line <= self.buffer.last_line() {
                self.buffer.line_text(pos.line).trim().to_string()
            } else {
                String::new()
            };
            lines.push(format!("{marker}{:>4} {:>5} {:>4} {text}", i.abs_diff(current), pos.line + 1, pos.col));
        }
        ExOutcome::info(lines.join("\n"))
    }

    /// `:his` shows commands; `:his /` (or `search`) shows searches.
    fn list_history(&self, args: &str) -> ExOutcome {
        let session = self.session.borrow();
        let search = matches!(args.trim(), "/" | "?" | "s" | "se" | "sea" | "search");
        let (title, history) = if search {
            ("search", &session.search_history)
        } else {
            ("cmd", &session.command_history)
        };
        let mut lines = vec![format!("      #  {title} history")];
        lines.extend(history.iter().enumerate().map(|(i, entry)| format!("{:>7}  {entry}", i + 1)));
        ExOutcome::info(lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn parse_count(args: &str) -> Result<Option<usize>> {
    let args = args.trim();
    if args.is_empty() {
        return Ok(None);
    }
    match args.parse::<usize>() {
        Ok(0) => Err(ViError::InvalidArgument(args.to_string())),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(ViError::TrailingCharacters(args.to_string())),
    }
}

/// `:d [x] [count]`.
fn register_and_count(args: &str) -> Result<(Option<char>, Option<usize>)> {
    let args = args.trim();
    match args.chars().next() {
        Some(ch) if !ch.is_ascii_digit() => {
            if !(ch.is_ascii_alphabetic() || matches!(ch, '"' | '_' | '+' | '*')) {
                return Err(ViError::InvalidRegister(ch));
            }
            Ok((Some(ch), parse_count(&args[ch.len_utf8()..])?))
        }
        _ => Ok((None, parse_count(args)?)),
    }
}

fn path_arg(args: &str) -> Option<PathBuf> {
    let args = args.trim();
    (!args.is_empty()).then(|| PathBuf::from(args))
}

/// `:map!` is Insert and Command-line.
fn map_modes(modes: MapModes, bang: bool) -> Vec<MapMode> {
    if bang && modes == MapModes::NormalVisual {
        vec![MapMode::Insert, MapMode::Command]
    } else {
        modes.modes()
    }
}

/// Split `pat/rest` at the first unescaped `delim`. `\{delim}` in the
/// pattern stands for the delimiter itself.
fn split_pattern(input: &str, delim: char) -> (String, &str) {
    let mut pattern = String::new();
    let mut chars = input.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some((_, next)) if next == delim => pattern.push(next),
                Some((_, next)) => {
                    pattern.push('\\');
                    pattern.push(next);
                }
                None => pattern.push('\\'),
            }
        } else if ch == delim {
            return (pattern, &input[i + ch.len_utf8()..]);
        } else {
            pattern.push(ch);
        }
    }
    (pattern, "")
}

/// Register contents for a listing: control chars as `^X`.
fn escape_control(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match u8::try_from(ch) {
            Ok(b) if b < 0x20 => {
                out.push('^');
                out.push(char::from(b + 0x40));
            }
            _ => out.push(ch),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::Status;
    use super::super::tests::{editor_with, p};
    use super::*;
    use pretty_assertions::assert_eq;

    fn ex(text: &str, line: &str) -> (String, ExOutcome) {
        let mut ed = editor_with(text);
        let outcome = ed.execute(line);
        (ed.text(), outcome)
    }

    // -- Line tracking ------------------------------------------------------

    #[test]
    fn tracker_follows_inserts() {
        let mut t = LineTracker::new(&[0, 2, 4]);
        t.inserted(p(1, 3), "x\ny\n");
        assert_eq!((t.line(0), t.line(1), t.line(2)), (Some(0), Some(4), Some(6)));
        t.inserted(p(0, 0), "z\n");
        assert_eq!(t.line(0), Some(1));
    }

    #[test]
    fn tracker_drops_whole_lines() {
        let mut t = LineTracker::new(&[0, 1, 2, 3]);
        t.removed(Range::new(p(1, 0), p(3, 0)));
        assert_eq!((t.line(0), t.line(1), t.line(2), t.line(3)), (Some(0), None, None, Some(1)));
    }

    #[test]
    fn tracker_merges_partial_lines() {
        let mut t = LineTracker::new(&[0, 1, 2]);
        t.removed(Range::new(p(0, 2), p(1, 1)));
        assert_eq!((t.line(0), t.line(1), t.line(2)), (Some(0), None, Some(1)));
    }

    // -- Addresses ----------------------------------------------------------

    #[test]
    fn bare_number_goes_to_line() {
        let mut ed = editor_with("a\n  b\nc");
        ed.execute("2");
        assert_eq!(ed.cursor(), p(1, 2));
        assert_eq!(ed.jumps().len(), 1);
        ed.execute("99");
        assert_eq!(ed.cursor(), p(2, 0));
    }

    #[test]
    fn search_address() {
        let mut ed = editor_with("a\nfoo\nb\nfoo");
        ed.execute("/foo/d");
        assert_eq!(ed.text(), "a\nb\nfoo");
    }

    #[test]
    fn range_past_end_is_rejected() {
        let (text, outcome) = ex("a\nb", "1,5d");
        assert_eq!(text, "a\nb");
        assert!(!outcome.ok);
        assert_eq!(outcome.message.as_deref(), Some("E16: Invalid range"));
    }

    #[test]
    fn unknown_command_fails() {
        let (_, outcome) = ex("a", "frobnicate");
        assert_eq!(outcome.message.as_deref(), Some("E492: Not an editor command: frobnicate"));
    }

    // -- Line commands ------------------------------------------------------

    #[test]
    fn delete_range_and_register() {
        let mut ed = editor_with("a\nb\nc\nd");
        ed.execute("2,3d x");
        assert_eq!(ed.text(), "a\nd");
        let reg = ed.session().borrow_mut().registers.get('x').unwrap();
        assert_eq!(reg.content(), "b\nc\n");
    }

    #[test]
    fn delete_with_count() {
        assert_eq!(ex("a\nb\nc\nd", "2d 2").0, "a\nd");
    }

    #[test]
    fn yank_keeps_cursor_and_put_adds_lines() {
        let mut ed = editor_with("a\nb\nc");
        ed.execute("3");
        ed.execute("1y");
        assert_eq!(ed.cursor(), p(2, 0));
        ed.execute("pu");
        assert_eq!(ed.text(), "a\nb\nc\na");
        ed.execute("1pu!");
        assert_eq!(ed.text(), "a\na\nb\nc\na");
    }

    #[test]
    fn join_range() {
        assert_eq!(ex("a\nb\nc\nd", "1,3j").0, "a b c\nd");
        assert_eq!(ex("a\n  b", "j!").0, "a  b");
    }

    #[test]
    fn shift_repeats() {
        assert_eq!(ex("a", ">").0, "    a");
        assert_eq!(ex("a", ">>").0, "        a");
        assert_eq!(ex("        a", "<").0, "    a");
    }

    #[test]
    fn shift_follows_shiftwidth() {
        let mut ed = editor_with("a");
        ed.execute("set sw=2");
        ed.execute(">");
        assert_eq!(ed.text(), "  a");
    }

    #[test]
    fn move_lines() {
        assert_eq!(ex("a\nb\nc", "3m0").0, "c\na\nb");
        assert_eq!(ex("a\nb\nc", "1m$").0, "b\nc\na");
        assert_eq!(ex("a\nb\nc\nd", "1,2m3").0, "c\na\nb\nd");
    }

    #[test]
    fn move_into_itself_fails() {
        let (text, outcome) = ex("a\nb\nc", "1,3m1");
        assert_eq!(text, "a\nb\nc");
        assert!(!outcome.ok);
    }

    #[test]
    fn copy_lines() {
        let mut ed = editor_with("a\nb");
        ed.execute("1t$");
        assert_eq!(ed.text(), "a\nb\na");
        assert_eq!(ed.cursor(), p(2, 0));
        ed.execute("2co0");
        assert_eq!(ed.text(), "b\na\nb\na");
    }

    #[test]
    fn undo_and_redo_commands() {
        let mut ed = editor_with("a\nb");
        ed.execute("d");
        ed.execute("u");
        assert_eq!(ed.text(), "a\nb");
        ed.execute("red");
        assert_eq!(ed.text(), "b");
    }

    // -- Substitute ---------------------------------------------------------

    #[test]
    fn substitute_first_and_global() {
        assert_eq!(ex("a a a", "s/a/b/").0, "b a a");
        assert_eq!(ex("a a a", "s/a/b/g").0, "b b b");
        assert_eq!(ex("a\na", "%s/a/b/").0, "b\nb");
    }

    #[test]
    fn substitute_not_found() {
        let (_, outcome) = ex("abc", "s/x/y/");
        assert_eq!(outcome.message.as_deref(), Some("E486: Pattern not found: x"));
        let (_, outcome) = ex("abc", "s/x/y/e");
        assert!(outcome.ok);
    }

    #[test]
    fn substitute_count_only() {
        let (text, outcome) = ex("a a\na", "%s/a//gn");
        assert_eq!(text, "a a\na");
        assert_eq!(outcome.message.as_deref(), Some("3 matches on 2 lines"));
    }

    #[test]
    fn substitute_reports_many_lines() {
        let (_, outcome) = ex("a\na\na", "%s/a/b/");
        assert_eq!(outcome.message.as_deref(), Some("3 substitutions on 3 lines"));
    }

    #[test]
    fn substitute_case_flags() {
        assert_eq!(ex("A a", "s/a/x/g").0, "x x");
        assert_eq!(ex("A a", "s/a/x/gI").0, "A x");
        assert_eq!(ex("A a", "s/A/x/g").0, "x a");
    }

    #[test]
    fn repeat_substitute() {
        let mut ed = editor_with("a a\na a");
        ed.execute("s/a/b/g");
        ed.execute("2");
        ed.execute("s");
        assert_eq!(ed.text(), "b b\nb a");
        ed.execute("&&");
        assert_eq!(ed.text(), "b b\nb b");
    }

    #[test]
    fn substitute_empty_pattern_uses_last_search() {
        let mut ed = editor_with("foo bar");
        ed.feed_keys("/bar<CR>");
        ed.execute("s//baz/");
        assert_eq!(ed.text(), "foo baz");
    }

    #[test]
    fn substitute_is_one_undo_step() {
        let mut ed = editor_with("a\na\na");
        ed.execute("%s/a/b/");
        ed.feed_keys("u");
        assert_eq!(ed.text(), "a\na\na");
    }

    // -- Global -------------------------------------------------------------

    #[test]
    fn global_delete() {
        let mut ed = editor_with("x1\ny\nx2\nx3");
        ed.execute("g/x/d");
        assert_eq!(ed.text(), "y");
        ed.feed_keys("u");
        assert_eq!(ed.text(), "x1\ny\nx2\nx3");
    }

    #[test]
    fn vglobal_keeps_matches() {
        assert_eq!(ex("x1\ny\nx2\nz", "v/x/d").0, "x1\nx2");
        assert_eq!(ex("x1\ny", "g!/x/d").0, "x1");
    }

    #[test]
    fn global_move_reverses() {
        assert_eq!(ex("a\nb\nc", "g/^/m0").0, "c\nb\na");
    }

    #[test]
    fn global_substitute_and_normal() {
        assert_eq!(ex("ab\ncd\nab", "g/a/s/b/X/").0, "aX\ncd\naX");
        assert_eq!(ex("ab\ncd\nab", "g/a/normal Az").0, "abz\ncd\nabz");
    }

    #[test]
    fn global_without_command_lists() {
        let (_, outcome) = ex("one\ntwo\nthree", "g/t/");
        assert_eq!(outcome.message.as_deref(), Some("two\nthree"));
    }

    #[test]
    fn global_no_match() {
        let (_, outcome) = ex("abc", "g/x/d");
        assert!(!outcome.ok);
    }

    #[test]
    fn global_cannot_nest() {
        let (text, _) = ex("a\nb", "g/a/g/b/d");
        assert_eq!(text, "a\nb");
    }

    // -- :normal ------------------------------------------------------------

    #[test]
    fn normal_runs_keys() {
        assert_eq!(ex("abc", "normal x").0, "bc");
        assert_eq!(ex("a\nb", "%norm Ax").0, "ax\nbx");
    }

    #[test]
    fn normal_finishes_insert() {
        let mut ed = editor_with("a");
        ed.execute("normal ihi");
        assert_eq!(ed.text(), "hia");
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn normal_bang_skips_mappings() {
        let mut ed = editor_with("abc");
        ed.execute("map x dd");
        ed.execute("normal! x");
        assert_eq!(ed.text(), "bc");
        ed.execute("normal x");
        assert_eq!(ed.text(), "");
    }

    // -- Mappings -----------------------------------------------------------

    #[test]
    fn map_and_noremap() {
        let mut ed = editor_with("abc");
        ed.execute("map X dd");
        ed.execute("noremap Y X");
        ed.feed_keys("llY");
        assert_eq!(ed.text(), "ac");
        ed.feed_keys("X");
        assert_eq!(ed.text(), "");
    }

    #[test]
    fn recursive_mapping_loop_stops() {
        let mut ed = editor_with("abc");
        ed.execute("map Q W");
        ed.execute("map W Q");
        ed.feed_keys("Q");
        assert_eq!(ed.text(), "abc");
        assert_eq!(ed.mode(), Mode::Normal);
    }

    #[test]
    fn map_listing_and_unmap() {
        let mut ed = editor_with("");
        ed.execute("nmap Q dd");
        let outcome = ed.execute("map");
        assert!(outcome.message.is_some_and(|m| m.contains("dd")));
        assert!(ed.execute("nunmap Q").ok);
        let outcome = ed.execute("nunmap Q");
        assert_eq!(outcome.message.as_deref(), Some("E31: No such mapping"));
    }

    // -- Marks, registers, listings ----------------------------------------

    #[test]
    fn mark_and_delmarks() {
        let mut ed = editor_with("a\nb\nc");
        ed.execute("3mark a");
        ed.execute("k b");
        assert_eq!(ed.marks().get('a'), Some(p(2, 0)));
        assert_eq!(ed.marks().get('b'), Some(p(0, 0)));
        let listing = ed.execute("marks").message.unwrap_or_default();
        assert!(listing.contains(" a      3    0 c"));
        ed.execute("delm a-b");
        assert_eq!(ed.marks().get('a'), None);
        assert_eq!(ed.marks().get('b'), None);
    }

    #[test]
    fn mark_address_in_range() {
        let mut ed = editor_with("a\nb\nc\nd");
        ed.feed_keys("jmajjmb");
        ed.execute("'a,'bd");
        assert_eq!(ed.text(), "a");
    }

    #[test]
    fn registers_listing() {
        let mut ed = editor_with("abc");
        ed.feed_keys("yy");
        let listing = ed.execute("reg").message.unwrap_or_default();
        assert!(listing.contains("  l  \"\"   abc^J"));
    }

    #[test]
    fn history_listing() {
        let mut ed = editor_with("a");
        ed.feed_keys(":nohl<CR>");
        let listing = ed.execute("his").message.unwrap_or_default();
        assert!(listing.contains("nohl"));
    }

    // -- Host requests ------------------------------------------------------

    #[test]
    fn write_and_quit_requests() {
        let mut ed = editor_with("a");
        ed.execute("w out.txt");
        ed.execute("q!");
        ed.execute("wq");
        assert_eq!(
            ed.take_requests(),
            vec![
                HostRequest::Write { path: Some(PathBuf::from("out.txt")), quit: false },
                HostRequest::Quit { force: true },
                HostRequest::Write { path: None, quit: true },
            ]
        );
        assert!(ed.take_requests().is_empty());
    }

    #[test]
    fn set_shows_value() {
        let mut ed = editor_with("");
        let outcome = ed.execute("set sw?");
        assert_eq!(outcome.message.as_deref(), Some("shiftwidth=4"));
        assert!(ed.status().is_some_and(|s| !Status::is_error(s)));
    }
}
