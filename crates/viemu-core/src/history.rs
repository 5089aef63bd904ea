//! Undo/redo history: transaction-based edit tracking.
//!
//! Records every buffer mutation as a reversible [`Edit`] grouped into
//! transactions. A transaction is the atomic unit of undo/redo:
//!
//! - **Normal mode**: each command (`x`, `dd`, `>>`) is one transaction.
//! - **Insert mode**: everything from entering insert to pressing Esc,
//!   including the deletion of a `c` operator that started the insert.
//! - **Ex commands**: a whole `:s` pass, `:g` run or `:normal` is one step.
//!
//! Transactions nest. Only the outermost `begin`/`commit` pair produces an
//! undo step, so a mapping that runs several editing commands, or a macro
//! replayed inside `:normal`, still undoes in one go.
//!
//! ```text
//! history.begin(cursor);
//!     history.begin(cursor);     // nested: joins the outer group
//!     history.record_insert(pos, text);
//!     history.commit(cursor);    // nothing pushed yet
//! history.record_delete(pos, text);
//! history.commit(cursor);        // one transaction with both edits
//! ```
//!
//! Edits recorded outside any transaction become single-edit transactions.
//! Empty transactions are discarded.
//!
//! The history never touches text itself. [`History::undo`] and
//! [`History::redo`] hand back a [`Step`]: the edits to perform, already
//! inverted and ordered, which the owning buffer applies.

use crate::position::Position;

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// A single reversible buffer edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Text was inserted at `pos`.
    Insert { pos: Position, text: String },
    /// Text was deleted starting at `pos`.
    Delete { pos: Position, text: String },
}

impl Edit {
    /// The edit that cancels this one.
    #[must_use]
    pub fn inverted(&self) -> Self {
        match self {
            Self::Insert { pos, text } => Self::Delete {
                pos: *pos,
                text: text.clone(),
            },
            Self::Delete { pos, text } => Self::Insert {
                pos: *pos,
                text: text.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Transaction {
    edits: Vec<Edit>,
    cursor_before: Position,
    cursor_after: Position,
}

/// What to apply to the text for one undo or redo, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub edits: Vec<Edit>,
    /// Where the cursor goes afterwards.
    pub cursor: Position,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Undo/redo history for a buffer.
///
/// Two stacks plus the transaction being built. New edits clear the redo
/// stack; there is no undo tree.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
    pending: Option<Transaction>,
    depth: usize,
}

impl History {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: None,
            depth: 0,
        }
    }

    /// Open a transaction, or join the one already open.
    pub fn begin(&mut self, cursor: Position) {
        if self.depth == 0 {
            self.pending = Some(Transaction {
                edits: Vec::new(),
                cursor_before: cursor,
                cursor_after: cursor,
            });
        }
        self.depth += 1;
    }

    /// Close the innermost transaction. When it was the outermost one the
    /// collected edits become a single undo step.
    pub fn commit(&mut self, cursor: Position) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if let Some(txn) = &mut self.pending {
            txn.cursor_after = cursor;
        }
        if self.depth == 0 {
            self.flush();
        }
    }

    /// Nesting depth of open transactions.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    pub fn record_insert(&mut self, pos: Position, text: &str) {
        self.record(Edit::Insert {
            pos,
            text: text.to_string(),
        });
    }

    /// `text` is the content that was removed; capture it before deleting.
    pub fn record_delete(&mut self, pos: Position, text: &str) {
        self.record(Edit::Delete {
            pos,
            text: text.to_string(),
        });
    }

    fn record(&mut self, edit: Edit) {
        if text_of(&edit).is_empty() {
            return;
        }
        if let Some(txn) = &mut self.pending {
            txn.edits.push(edit);
            return;
        }
        let pos = match &edit {
            Edit::Insert { pos, .. } | Edit::Delete { pos, .. } => *pos,
        };
        self.redo_stack.clear();
        self.undo_stack.push(Transaction {
            edits: vec![edit],
            cursor_before: pos,
            cursor_after: pos,
        });
    }

    fn flush(&mut self) {
        if let Some(txn) = self.pending.take()
            && !txn.edits.is_empty()
        {
            self.redo_stack.clear();
            self.undo_stack.push(txn);
        }
    }

    /// Pop the last transaction for undoing. Any open transaction is closed
    /// first so it can be undone too.
    pub fn undo(&mut self) -> Option<Step> {
        if self.depth > 0 {
            self.depth = 0;
            self.flush();
        }
        let txn = self.undo_stack.pop()?;
        let step = Step {
            edits: txn.edits.iter().rev().map(Edit::inverted).collect(),
            cursor: txn.cursor_before,
        };
        self.redo_stack.push(txn);
        Some(step)
    }

    /// Pop the last undone transaction for redoing.
    pub fn redo(&mut self) -> Option<Step> {
        let txn = self.redo_stack.pop()?;
        let step = Step {
            edits: txn.edits.clone(),
            cursor: txn.cursor_after,
        };
        self.undo_stack.push(txn);
        Some(step)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.pending.as_ref().is_some_and(|t| !t.edits.is_empty())
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

fn text_of(edit: &Edit) -> &str {
    match edit {
        Edit::Insert { text, .. } | Edit::Delete { text, .. } => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
