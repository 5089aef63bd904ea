//! The command-line prompts: `/` and `?` search, `:` commands, and the
//! `:s///c` confirmation.

use tracing::debug;

use super::Editor;
use super::normal::OpPending;
use crate::cursor::Cursor;
use crate::error::{Result, ViError};
use crate::ex;
use crate::host::TextBuffer;
use crate::key::{KeyCode, KeyEvent};
use crate::mode::{CommandKind, Mode};
use crate::position::Position;
use crate::search::{self, SearchDirection, SearchParams};
use crate::substitute::{Answer, Interactive};

/// An open `/` or `?` prompt.
pub(super) struct SearchPrompt {
    direction: SearchDirection,
    /// Where the cursor goes back to if the search is abandoned.
    origin: Cursor,
    count: Option<usize>,
    /// `d/foo<CR>`: the operator waiting for the search.
    op: Option<OpPending>,
    back: Mode,
}

/// A confirming substitution in progress.
pub(super) struct ConfirmPrompt {
    pub(super) interactive: Interactive,
    origin: Position,
    replacement: String,
}

/// What a key did to the prompt input.
enum LineKey {
    Edited,
    Commit,
    Abort,
    Ignored,
}

impl<B: TextBuffer> Editor<B> {
    pub(super) fn open_search(&mut self, direction: SearchDirection, op: Option<OpPending>) {
        let count = match op {
            Some(op) => self.operator_count(op),
            None => self.take_count(),
        };
        self.search = Some(SearchPrompt {
            direction,
            origin: self.cursor.clone(),
            count,
            op,
            back: self.mode,
        });
        self.cmdline.clear();
        self.incsearch_hit = None;
        self.set_mode(Mode::CommandLine(CommandKind::Search));
    }

    pub(super) fn open_ex(&mut self, prefill: &str) {
        self.ex_return = self.mode;
        self.cmdline.set(prefill);
        self.set_mode(Mode::CommandLine(CommandKind::Ex));
    }

    pub(super) fn prompt_key(&mut self, kind: CommandKind, key: KeyEvent) {
        match kind {
            CommandKind::Search => self.search_key(key),
            CommandKind::Ex => self.ex_key(key),
            CommandKind::Confirm => self.confirm_key(key),
        }
    }

    /// Line editing shared by the search and `:` prompts.
    fn edit_cmdline(&mut self, key: KeyEvent, search: bool) -> LineKey {
        if self.cmdline_register {
            self.cmdline_register = false;
            let Some(name) = key.as_char() else { return LineKey::Ignored };
            let register = self.session.borrow_mut().registers.get(name);
            match register {
                Ok(register) => {
                    let text = register.content().trim_end_matches('\n').to_string();
                    self.cmdline.insert_str(&text);
                    return LineKey::Edited;
                }
                Err(err) => {
                    self.error(&err);
                    return LineKey::Ignored;
                }
            }
        }
        if let Some(ch) = key.as_char() {
            self.cmdline.insert_char(ch);
            return LineKey::Edited;
        }
        match key.code {
            KeyCode::Escape => LineKey::Abort,
            KeyCode::Enter => LineKey::Commit,
            KeyCode::Backspace => self.cmdline_backspace(),
            KeyCode::Delete => {
                self.cmdline.delete();
                LineKey::Edited
            }
            KeyCode::Left => {
                self.cmdline.move_left();
                LineKey::Ignored
            }
            KeyCode::Right => {
                self.cmdline.move_right();
                LineKey::Ignored
            }
            KeyCode::Home => {
                self.cmdline.move_home();
                LineKey::Ignored
            }
            KeyCode::End => {
                self.cmdline.move_end();
                LineKey::Ignored
            }
            KeyCode::Up | KeyCode::Down => {
                let session = self.session.borrow();
                let history = if search { &session.search_history } else { &session.command_history };
                let changed = if key.code == KeyCode::Up {
                    self.cmdline.history_prev(history)
                } else {
                    self.cmdline.history_next(history)
                };
                if changed { LineKey::Edited } else { LineKey::Ignored }
            }
            _ if key.is_ctrl('c') => LineKey::Abort,
            _ if key.is_ctrl('j') || key.is_ctrl('m') => LineKey::Commit,
            _ if key.is_ctrl('h') => self.cmdline_backspace(),
            _ if key.is_ctrl('w') => {
                self.cmdline.delete_word_before();
                LineKey::Edited
            }
            _ if key.is_ctrl('u') => {
                self.cmdline.delete_to_start();
                LineKey::Edited
            }
            _ if key.is_ctrl('b') => {
                self.cmdline.move_home();
                LineKey::Ignored
            }
            _ if key.is_ctrl('e') => {
                self.cmdline.move_end();
                LineKey::Ignored
            }
            _ if key.is_ctrl('r') => {
                self.cmdline_register = true;
                LineKey::Ignored
            }
            _ => LineKey::Ignored,
        }
    }

    /// Backspace on an empty prompt closes it.
    fn cmdline_backspace(&mut self) -> LineKey {
        if self.cmdline.is_empty() {
            LineKey::Abort
        } else {
            self.cmdline.backspace();
            LineKey::Edited
        }
    }

    // -- Search -------------------------------------------------------------

    fn search_key(&mut self, key: KeyEvent) {
        match self.edit_cmdline(key, true) {
            LineKey::Edited => self.incremental_search(),
            LineKey::Commit => self.commit_search(),
            LineKey::Abort => self.abort_search(),
            LineKey::Ignored => {}
        }
    }

    /// Move to the first match of the input so far, from the origin.
    fn incremental_search(&mut self) {
        self.incsearch_hit = None;
        let Some(prompt) = self.search.as_ref() else { return };
        let (origin, direction, count) = (prompt.origin.clone(), prompt.direction, prompt.count);
        self.cursor = origin;
        let options = self.options();
        if !options.incsearch {
            return;
        }
        let (pat, _) = search::split_offset(self.cmdline.input(), direction.prefix());
        if pat.is_empty() {
            return;
        }
        let Ok(params) = SearchParams::new(&pat, direction, options.ignorecase, options.smartcase) else {
            return;
        };
        let Ok(re) = params.regex() else { return };
        let from = self.cursor.position();
        let n = count.unwrap_or(1);
        if let Ok(found) = search::find_pattern(&self.buffer, &re, &pat, from, direction, n, options.wrapscan) {
            self.incsearch_hit = Some(found.hit.range);
            self.cursor.set_position(found.hit.range.start, &self.buffer, true);
        }
    }

    fn commit_search(&mut self) {
        let Some(prompt) = self.search.take() else { return };
        self.incsearch_hit = None;
        let input = self.cmdline.input().to_string();
        self.cmdline.clear();
        self.cursor = prompt.origin.clone();
        self.set_mode(prompt.back);
        let n = prompt.count.unwrap_or(1);
        let target = self
            .resolve_search(&input, prompt.direction)
            .and_then(|params| self.search_target(&params, params.direction, n));
        match (target, prompt.op) {
            (Ok(target), Some(op)) => {
                let start = prompt.origin.position();
                self.operate_on_target(op.op, start, target, false);
            }
            (Ok(target), None) => self.goto_target(target),
            (Err(err), op) => {
                if op.is_some() {
                    self.cancel_pending();
                }
                self.error(&err);
                self.motion_failed();
            }
        }
    }

    /// Parse the typed search; an empty pattern reuses the last one.
    fn resolve_search(&mut self, input: &str, direction: SearchDirection) -> Result<SearchParams> {
        let (pat, to_end) = search::split_offset(input, direction.prefix());
        let params = if pat.is_empty() {
            let last = self.session.borrow().last_search.clone().ok_or(ViError::NoPreviousPattern)?;
            SearchParams { direction, to_end, ..last }
        } else {
            let options = self.options();
            let mut params = SearchParams::new(&pat, direction, options.ignorecase, options.smartcase)?;
            params.to_end = to_end;
            params
        };
        params.regex()?;
        debug!(pattern = %params.pattern, ?direction, "search");
        self.session.borrow_mut().record_search(params.clone(), input);
        self.hlsearch_active = true;
        Ok(params)
    }

    fn abort_search(&mut self) {
        self.incsearch_hit = None;
        self.cmdline.clear();
        let Some(prompt) = self.search.take() else { return };
        self.cursor = prompt.origin;
        self.set_mode(prompt.back);
        if prompt.op.is_some() {
            self.cancel_pending();
        }
    }

    // -- Ex -----------------------------------------------------------------

    fn ex_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab && !self.cmdline_register {
            self.cmdline.complete(&ex::command_names());
            return;
        }
        match self.edit_cmdline(key, false) {
            LineKey::Commit => {
                let line = self.cmdline.input().to_string();
                self.cmdline.clear();
                self.set_mode(self.ex_return);
                if !line.trim().is_empty() {
                    self.session.borrow_mut().record_command(&line);
                    self.execute(&line);
                }
            }
            LineKey::Abort => {
                self.cmdline.clear();
                self.set_mode(self.ex_return);
            }
            LineKey::Edited | LineKey::Ignored => {}
        }
    }

    // -- Confirm ------------------------------------------------------------

    /// Ask about each match of a `c`-flag substitution. The whole run is one
    /// undo step.
    pub(super) fn start_confirm(&mut self, interactive: Interactive, replacement: String) {
        self.begin_edit();
        self.confirm = Some(ConfirmPrompt {
            interactive,
            origin: self.cursor.position(),
            replacement,
        });
        self.set_mode(Mode::CommandLine(CommandKind::Confirm));
        self.show_confirm();
    }

    fn show_confirm(&mut self) {
        let Some(prompt) = self.confirm.as_ref() else { return };
        let Some(hit) = prompt.interactive.current() else { return };
        let start = hit.range.start;
        let message = format!("replace with {} (y/n/a/q/l)?", prompt.replacement);
        self.cursor.set_position(start, &self.buffer, true);
        self.info(message);
    }

    fn confirm_key(&mut self, key: KeyEvent) {
        let answer = if key.code == KeyCode::Escape || key.is_ctrl('c') {
            Some(Answer::Quit)
        } else {
            key.as_char().and_then(Answer::from_char)
        };
        let Some(answer) = answer else {
            self.show_confirm();
            return;
        };
        let Some(mut prompt) = self.confirm.take() else {
            self.set_mode(Mode::Normal);
            return;
        };
        let more = prompt.interactive.respond(&mut self.tracked(), answer);
        if more {
            self.confirm = Some(prompt);
            self.show_confirm();
        } else {
            self.finish_confirm(&prompt);
        }
    }

    /// Back to Normal on the last replaced line, or where `:s` started
    /// when nothing was replaced.
    fn finish_confirm(&mut self, prompt: &ConfirmPrompt) {
        self.set_mode(Mode::Normal);
        let stats = prompt.interactive.stats();
        match stats.last_start {
            Some(pos) if stats.count > 0 => self.goto_first_non_blank(pos.line),
            _ => self.move_cursor(prompt.origin),
        }
        self.end_edit();
        if stats.count > 0 {
            self.info(stats.message(false));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
