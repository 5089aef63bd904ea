//! Session data in a flat key-value store.
//!
//! Everything is stored as parallel lists under fixed keys, so a host can
//! keep it next to its own settings:
//!
//! | Key | Value |
//! |-----|-------|
//! | `registers.names` | `["a", "0", ...]` |
//! | `registers.contents` | `["text", ...]` (macros are key notation) |
//! | `registers.flags` | `[0, 1, 2, ...]` charwise, linewise, block |
//! | `jumps` | `[line, col, line, col, ...]` |
//! | `marks` | `[char, line, col, ...]`, char as its code point |
//! | `mappings.modes` / `.from` / `.to` / `.recursive` | one entry per mapping |
//! | `history.search` / `history.command` | oldest first |
//!
//! Lists in one group must have equal lengths. A group that does not is
//! rejected as a whole; the other groups still load.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, ViError};
use crate::jumplist::JumpList;
use crate::key::{format_keys, parse_keys};
use crate::mark::Marks;
use crate::mode::MapMode;
use crate::position::Position;
use crate::register::OperationMode;
use crate::session::Session;

pub const REGISTER_NAMES: &str = "registers.names";
pub const REGISTER_CONTENTS: &str = "registers.contents";
pub const REGISTER_FLAGS: &str = "registers.flags";
pub const JUMPS: &str = "jumps";
pub const MARKS: &str = "marks";
pub const MAPPING_MODES: &str = "mappings.modes";
pub const MAPPING_FROM: &str = "mappings.from";
pub const MAPPING_TO: &str = "mappings.to";
pub const MAPPING_RECURSIVE: &str = "mappings.recursive";
pub const SEARCH_HISTORY: &str = "history.search";
pub const COMMAND_HISTORY: &str = "history.command";

/// Where session data lives.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
}

impl KeyValueStore for BTreeMap<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        BTreeMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.insert(key.to_string(), value);
    }
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Write registers, mappings and histories.
pub fn save_session(session: &Session, store: &mut dyn KeyValueStore) {
    let registers = session.registers.stored();
    store.set(
        REGISTER_NAMES,
        Value::from(registers.iter().map(|(c, _)| c.to_string()).collect::<Vec<_>>()),
    );
    store.set(
        REGISTER_CONTENTS,
        Value::from(registers.iter().map(|(_, r)| r.content().to_string()).collect::<Vec<_>>()),
    );
    store.set(
        REGISTER_FLAGS,
        Value::from(registers.iter().map(|(_, r)| r.mode().flag()).collect::<Vec<_>>()),
    );

    let mappings: Vec<_> = session.mappings.iter().collect();
    store.set(
        MAPPING_MODES,
        Value::from(mappings.iter().map(|(m, _)| m.letter().to_string()).collect::<Vec<_>>()),
    );
    store.set(
        MAPPING_FROM,
        Value::from(mappings.iter().map(|(_, m)| format_keys(&m.from)).collect::<Vec<_>>()),
    );
    store.set(
        MAPPING_TO,
        Value::from(mappings.iter().map(|(_, m)| format_keys(&m.to)).collect::<Vec<_>>()),
    );
    store.set(
        MAPPING_RECURSIVE,
        Value::from(mappings.iter().map(|(_, m)| m.recursive).collect::<Vec<_>>()),
    );

    store.set(SEARCH_HISTORY, Value::from(session.search_history.iter().collect::<Vec<_>>()));
    store.set(COMMAND_HISTORY, Value::from(session.command_history.iter().collect::<Vec<_>>()));
    debug!(
        registers = registers.len(),
        mappings = mappings.len(),
        "session saved"
    );
}

/// Write the jump list and marks of one buffer.
pub fn save_positions(jumps: &JumpList, marks: &Marks, store: &mut dyn KeyValueStore) {
    let flat_jumps: Vec<usize> = jumps.entries().iter().flat_map(|p| [p.line, p.col]).collect();
    store.set(JUMPS, Value::from(flat_jumps));
    let flat_marks: Vec<usize> = marks
        .iter()
        .flat_map(|(c, p)| [c as usize, p.line, p.col])
        .collect();
    store.set(MARKS, Value::from(flat_marks));
    debug!(jumps = jumps.len(), "positions saved");
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load everything [`save_session`] wrote. Every group is tried; the first
/// malformed one is reported after the rest have loaded.
///
/// # Errors
///
/// `Persist` naming the first group that could not be read.
pub fn load_session(session: &mut Session, store: &dyn KeyValueStore) -> Result<()> {
    let mut first_err = None;
    let mut note = |res: Result<()>| {
        if let Err(err) = res {
            warn!(%err, "session group skipped");
            first_err.get_or_insert(err);
        }
    };
    note(load_registers(session, store));
    note(load_mappings(session, store));
    note(load_histories(session, store));
    debug!("session loaded");
    first_err.map_or(Ok(()), Err)
}

/// Load what [`save_positions`] wrote.
///
/// # Errors
///
/// `Persist` naming the first group that could not be read.
pub fn load_positions(
    jumps: &mut JumpList,
    marks: &mut Marks,
    store: &dyn KeyValueStore,
) -> Result<()> {
    let mut first_err = None;
    match numbers(store, JUMPS) {
        Ok(Some(flat)) if flat.len() % 2 == 0 => {
            jumps.restore(flat.chunks(2).map(|p| Position::new(p[0], p[1])));
        }
        Ok(Some(_)) => {
            first_err.get_or_insert(ViError::Persist(format!("{JUMPS}: odd number of values")));
        }
        Ok(None) => {}
        Err(err) => {
            first_err.get_or_insert(err);
        }
    }
    match numbers(store, MARKS) {
        Ok(Some(flat)) if flat.len() % 3 == 0 => {
            let restored: Vec<(char, Position)> = flat
                .chunks(3)
                .filter_map(|m| {
                    let ch = u32::try_from(m[0]).ok().and_then(char::from_u32)?;
                    Some((ch, Position::new(m[1], m[2])))
                })
                .collect();
            marks.restore(restored);
        }
        Ok(Some(_)) => {
            first_err
                .get_or_insert(ViError::Persist(format!("{MARKS}: values are not triples")));
        }
        Ok(None) => {}
        Err(err) => {
            first_err.get_or_insert(err);
        }
    }
    debug!(jumps = jumps.len(), "positions loaded");
    first_err.map_or(Ok(()), Err)
}

fn load_registers(session: &mut Session, store: &dyn KeyValueStore) -> Result<()> {
    let names = strings(store, REGISTER_NAMES)?.unwrap_or_default();
    let contents = strings(store, REGISTER_CONTENTS)?.unwrap_or_default();
    let flags = numbers(store, REGISTER_FLAGS)?.unwrap_or_default();
    same_length("registers", &[names.len(), contents.len(), flags.len()])?;

    let mut parsed = Vec::with_capacity(names.len());
    for ((name, content), flag) in names.iter().zip(&contents).zip(&flags) {
        let mut chars = name.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            return Err(ViError::Persist(format!("{REGISTER_NAMES}: bad name {name:?}")));
        };
        let mode = u64::try_from(*flag)
            .ok()
            .and_then(OperationMode::from_flag)
            .ok_or_else(|| ViError::Persist(format!("{REGISTER_FLAGS}: bad flag {flag}")))?;
        parsed.push((ch, content.as_str(), mode));
    }
    for (ch, content, mode) in parsed {
        session.registers.set(ch, content, mode, false)?;
    }
    Ok(())
}

fn load_mappings(session: &mut Session, store: &dyn KeyValueStore) -> Result<()> {
    let modes = strings(store, MAPPING_MODES)?.unwrap_or_default();
    let from = strings(store, MAPPING_FROM)?.unwrap_or_default();
    let to = strings(store, MAPPING_TO)?.unwrap_or_default();
    let recursive = bools(store, MAPPING_RECURSIVE)?.unwrap_or_default();
    same_length("mappings", &[modes.len(), from.len(), to.len(), recursive.len()])?;

    let mut parsed = Vec::with_capacity(modes.len());
    for i in 0..modes.len() {
        let mode = modes[i]
            .chars()
            .next()
            .and_then(MapMode::from_letter)
            .ok_or_else(|| ViError::Persist(format!("{MAPPING_MODES}: bad mode {:?}", modes[i])))?;
        parsed.push((mode, parse_keys(&from[i]), parse_keys(&to[i]), recursive[i]));
    }
    for (mode, from, to, recursive) in parsed {
        session.mappings.map(mode, from, to, recursive)?;
    }
    Ok(())
}

fn load_histories(session: &mut Session, store: &dyn KeyValueStore) -> Result<()> {
    let capacity = session.options.history;
    let search = strings(store, SEARCH_HISTORY)?;
    let command = strings(store, COMMAND_HISTORY)?;
    if let Some(entries) = search {
        session.search_history.restore(entries, capacity);
    }
    if let Some(entries) = command {
        session.command_history.restore(entries, capacity);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn same_length(group: &str, lens: &[usize]) -> Result<()> {
    if lens.windows(2).all(|w| w[0] == w[1]) {
        Ok(())
    } else {
        Err(ViError::Persist(format!("{group}: list lengths differ {lens:?}")))
    }
}

fn list(store: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<Value>>> {
    match store.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(ViError::Persist(format!("{key}: expected a list"))),
    }
}

fn strings(store: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<String>>> {
    list(store, key)?
        .map(|items| {
            items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(ViError::Persist(format!("{key}: expected text, got {other}"))),
                })
                .collect()
        })
        .transpose()
}

fn numbers(store: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<usize>>> {
    list(store, key)?
        .map(|items| {
            items
                .into_iter()
                .map(|v| {
                    v.as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| ViError::Persist(format!("{key}: expected a number, got {v}")))
                })
                .collect()
        })
        .transpose()
}

fn bools(store: &dyn KeyValueStore, key: &str) -> Result<Option<Vec<bool>>> {
    list(store, key)?
        .map(|items| {
            items
                .into_iter()
                .map(|v| {
                    v.as_bool()
                        .ok_or_else(|| ViError::Persist(format!("{key}: expected true/false, got {v}")))
                })
                .collect()
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LineBookmarks;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type Store = BTreeMap<String, Value>;

    fn session_with_data() -> Session {
        let mut s = Session::new();
        s.registers.set('a', "3dd", OperationMode::CharWise, false).unwrap();
        s.registers.set('b', "line", OperationMode::LineWise, false).unwrap();
        s.mappings
            .map(MapMode::Normal, parse_keys("Q"), parse_keys("gq<CR>"), false)
            .unwrap();
        s.search_history.push("foo", 50);
        s.command_history.push("s/a/b/", 50);
        s
    }

    // -- Round trip -----------------------------------------------------------

    #[test]
    fn session_round_trip() {
        let mut store = Store::new();
        save_session(&session_with_data(), &mut store);

        let mut loaded = Session::new();
        load_session(&mut loaded, &store).unwrap();
        assert_eq!(loaded.registers.get('a').unwrap().content(), "3dd");
        let b = loaded.registers.get('b').unwrap();
        assert_eq!(b.content(), "line\n");
        assert_eq!(b.mode(), OperationMode::LineWise);
        let m = loaded.mappings.get(MapMode::Normal, &parse_keys("Q")).unwrap();
        assert_eq!(m.to, parse_keys("gq<CR>"));
        assert!(!m.recursive);
        assert_eq!(loaded.search_history.last(), Some("foo"));
        assert_eq!(loaded.command_history.last(), Some("s/a/b/"));
    }

    #[test]
    fn flat_layout_of_registers() {
        let mut store = Store::new();
        save_session(&session_with_data(), &mut store);
        assert_eq!(store[REGISTER_NAMES], json!(["a", "b"]));
        assert_eq!(store[REGISTER_CONTENTS], json!(["3dd", "line\n"]));
        assert_eq!(store[REGISTER_FLAGS], json!([0, 1]));
    }

    #[test]
    fn positions_round_trip() {
        let mut jumps = JumpList::new();
        jumps.add(Position::new(1, 2));
        jumps.add(Position::new(5, 0));
        let mut marks = Marks::new();
        let mut bookmarks = LineBookmarks::new();
        marks.set('a', Position::new(3, 4), &mut bookmarks);

        let mut store = Store::new();
        save_positions(&jumps, &marks, &mut store);
        assert_eq!(store[JUMPS], json!([1, 2, 5, 0]));
        assert_eq!(store[MARKS], json!([97, 3, 4]));

        let mut jumps2 = JumpList::new();
        let mut marks2 = Marks::new();
        load_positions(&mut jumps2, &mut marks2, &store).unwrap();
        assert_eq!(jumps2.entries(), jumps.entries());
        assert_eq!(marks2.get('a'), Some(Position::new(3, 4)));
    }

    // -- Malformed data -------------------------------------------------------

    #[test]
    fn unequal_register_lists_load_nothing() {
        let mut store = Store::new();
        store.set(REGISTER_NAMES, json!(["a", "b"]));
        store.set(REGISTER_CONTENTS, json!(["x"]));
        store.set(REGISTER_FLAGS, json!([0, 0]));
        store.set(SEARCH_HISTORY, json!(["kept"]));

        let mut s = Session::new();
        let err = load_session(&mut s, &store).unwrap_err();
        assert!(matches!(err, ViError::Persist(_)));
        assert!(s.registers.get('a').unwrap().is_empty());
        assert_eq!(s.search_history.last(), Some("kept"));
    }

    #[test]
    fn bad_flag_rejects_the_group() {
        let mut store = Store::new();
        store.set(REGISTER_NAMES, json!(["a", "b"]));
        store.set(REGISTER_CONTENTS, json!(["x", "y"]));
        store.set(REGISTER_FLAGS, json!([0, 9]));
        let mut s = Session::new();
        assert!(load_session(&mut s, &store).is_err());
        assert!(s.registers.get('a').unwrap().is_empty());
    }

    #[test]
    fn odd_jump_list_is_rejected() {
        let mut store = Store::new();
        store.set(JUMPS, json!([1, 2, 3]));
        store.set(MARKS, json!([97, 0, 0]));
        let mut jumps = JumpList::new();
        let mut marks = Marks::new();
        assert!(load_positions(&mut jumps, &mut marks, &store).is_err());
        assert!(jumps.is_empty());
        assert_eq!(marks.get('a'), Some(Position::ZERO));
    }

    #[test]
    fn missing_keys_are_fine() {
        let store = Store::new();
        let mut s = Session::new();
        load_session(&mut s, &store).unwrap();
        assert!(s.mappings.is_empty());
    }

    #[test]
    fn wrong_value_type_is_an_error() {
        let mut store = Store::new();
        store.set(MAPPING_MODES, json!("n"));
        let mut s = Session::new();
        assert!(load_session(&mut s, &store).is_err());
    }
}
