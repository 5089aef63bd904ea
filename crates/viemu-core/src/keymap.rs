//! Key mappings and the expansion queue that applies them.
//!
//! [`MapTable`] stores user mappings per [`MapMode`]. [`KeyMapper`] sits in
//! front of the mode state machine: every key goes into its work queue, and
//! [`KeyMapper::next`] hands back keys ready for dispatch, expanding
//! mappings on the way.
//!
//! ```text
//!   typed key ──► queue ──► held prefix ──► exact match? ──► expansion pushed
//!                   ▲                              │          to queue front
//!                   └──────────────────────────────┘
//!                                  │ no match / flushed
//!                                  ▼
//!                               dispatch
//! ```
//!
//! A sequence that is a strict prefix of a longer mapping is held until the
//! next key decides it or the host reports a timeout. Expansion is iterative,
//! so runaway mappings (`a → b`, `b → a`) are bounded by a depth limit and a
//! per-input budget instead of the call stack.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::error::{Result, ViError};
use crate::key::{KeyEvent, format_keys};
use crate::mode::MapMode;

/// Expansions allowed while resolving one input key.
const EXPANSION_BUDGET: usize = 10_000;

// ---------------------------------------------------------------------------
// MapTable
// ---------------------------------------------------------------------------

/// One user mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub from: Vec<KeyEvent>,
    pub to: Vec<KeyEvent>,
    /// Whether the expansion may trigger further mappings (`map` vs `noremap`).
    pub recursive: bool,
}

/// How a key sequence relates to the mappings of one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lookup {
    /// The sequence is exactly some mapping's `from`.
    pub exact: bool,
    /// Some longer mapping starts with the sequence.
    pub prefix: bool,
}

/// User mappings for every mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapTable {
    modes: BTreeMap<MapMode, Vec<Mapping>>,
}

impl MapTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the mapping for `from` in `mode`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty `from`.
    pub fn map(
        &mut self,
        mode: MapMode,
        from: Vec<KeyEvent>,
        to: Vec<KeyEvent>,
        recursive: bool,
    ) -> Result<()> {
        if from.is_empty() {
            return Err(ViError::InvalidArgument(String::new()));
        }
        trace!(mode = ?mode, from = %format_keys(&from), to = %format_keys(&to), recursive, "map");
        let list = self.modes.entry(mode).or_default();
        let mapping = Mapping { from, to, recursive };
        match list.iter_mut().find(|m| m.from == mapping.from) {
            Some(slot) => *slot = mapping,
            None => list.push(mapping),
        }
        Ok(())
    }

    /// Remove the mapping for `from` in `mode`.
    ///
    /// # Errors
    ///
    /// `NoSuchMapping` if there is none.
    pub fn unmap(&mut self, mode: MapMode, from: &[KeyEvent]) -> Result<()> {
        let list = self.modes.get_mut(&mode).ok_or(ViError::NoSuchMapping)?;
        let before = list.len();
        list.retain(|m| m.from != from);
        if list.len() == before {
            return Err(ViError::NoSuchMapping);
        }
        Ok(())
    }

    pub fn clear(&mut self, mode: MapMode) {
        self.modes.remove(&mode);
    }

    #[must_use]
    pub fn get(&self, mode: MapMode, from: &[KeyEvent]) -> Option<&Mapping> {
        self.modes.get(&mode)?.iter().find(|m| m.from == from)
    }

    #[must_use]
    pub fn lookup(&self, mode: MapMode, keys: &[KeyEvent]) -> Lookup {
        let mut found = Lookup::default();
        for m in self.modes.get(&mode).into_iter().flatten() {
            if m.from == keys {
                found.exact = true;
            } else if m.from.len() > keys.len() && m.from.starts_with(keys) {
                found.prefix = true;
            }
        }
        found
    }

    /// Every mapping with its mode, in mode order then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (MapMode, &Mapping)> {
        self.modes
            .iter()
            .flat_map(|(mode, list)| list.iter().map(move |m| (*mode, m)))
    }

    /// `:map` listing lines for the given modes.
    #[must_use]
    pub fn listing(&self, modes: &[MapMode]) -> Vec<String> {
        self.iter()
            .filter(|(mode, _)| modes.contains(mode))
            .map(|(mode, m)| {
                format!(
                    "{}  {:<12} {}{}",
                    mode.letter(),
                    format_keys(&m.from),
                    if m.recursive { " " } else { "*" },
                    format_keys(&m.to)
                )
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.values().all(Vec::is_empty)
    }
}

// ---------------------------------------------------------------------------
// KeyMapper
// ---------------------------------------------------------------------------

/// Where a key came from. Only `Typed` keys are recorded into macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Typed,
    /// Produced by a mapping expansion.
    Mapped,
    /// Played back from a macro register or `:normal`.
    Replay,
}

#[derive(Debug, Clone, Copy)]
struct QueuedKey {
    key: KeyEvent,
    remap: bool,
    depth: usize,
    origin: KeyOrigin,
}

/// A key ready for the mode state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub key: KeyEvent,
    pub origin: KeyOrigin,
}

/// Limits applied by [`KeyMapper::next`].
#[derive(Debug, Clone, Copy)]
pub struct MapLimits {
    pub max_depth: usize,
    pub timeout: Duration,
}

/// The expansion work queue.
#[derive(Debug, Default)]
pub struct KeyMapper {
    queue: VecDeque<QueuedKey>,
    held: Vec<QueuedKey>,
    deadline: Option<Instant>,
    /// Set by a timeout: resolve the held keys without waiting again.
    forced: bool,
    spent: usize,
}

impl KeyMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key. `remap: false` keys bypass mapping (`noremap`
    /// expansions, `:normal!`, dot replay).
    pub fn push(&mut self, key: KeyEvent, origin: KeyOrigin, remap: bool) {
        if origin == KeyOrigin::Typed && self.held.is_empty() && self.queue.is_empty() {
            self.spent = 0;
        }
        self.queue.push_back(QueuedKey {
            key,
            remap,
            depth: 0,
            origin,
        });
    }

    /// Queue `keys` ahead of everything already waiting (macro playback:
    /// the register runs before any keys typed after `@x`).
    pub fn push_front(&mut self, keys: &[KeyEvent], origin: KeyOrigin, remap: bool) {
        for key in keys.iter().rev() {
            self.queue.push_front(QueuedKey {
                key: *key,
                remap,
                depth: 0,
                origin,
            });
        }
    }

    /// Drop queued keys of `origin`, e.g. the rest of a macro after an error.
    pub fn discard(&mut self, origin: KeyOrigin) {
        self.queue.retain(|q| q.origin != origin);
        self.held.retain(|q| q.origin != origin);
        if self.held.is_empty() {
            self.deadline = None;
            self.forced = false;
        }
    }

    /// When the held prefix times out, if one is held.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True while keys are held waiting to see if a longer mapping matches.
    #[must_use]
    pub fn is_holding(&self) -> bool {
        !self.held.is_empty()
    }

    /// True when nothing is queued or held.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.held.is_empty() && self.queue.is_empty()
    }

    /// The held prefix timed out: resolve it on the next [`KeyMapper::next`]
    /// call without waiting for more keys.
    pub fn expire(&mut self) {
        if !self.held.is_empty() {
            self.forced = true;
        }
        self.deadline = None;
    }

    /// Drop everything queued and held.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.held.clear();
        self.deadline = None;
        self.forced = false;
    }

    /// Next key for dispatch, or `None` when the queue is drained or the
    /// held keys are waiting on the timer.
    ///
    /// `mode` is the table to consult for this key; `None` disables mapping
    /// (a literal char argument is awaited, or a prompt never remaps).
    pub fn next(
        &mut self,
        table: &MapTable,
        mode: Option<MapMode>,
        limits: MapLimits,
        now: Instant,
    ) -> Option<Resolved> {
        loop {
            let Some(item) = self.queue.pop_front() else {
                if !self.forced {
                    return None;
                }
                if let Some(resolved) = self.resolve_held(table, mode, limits, true) {
                    return Some(resolved);
                }
                continue;
            };

            let Some(map_mode) = mode.filter(|_| item.remap) else {
                if self.held.is_empty() {
                    return Some(Self::emit(item));
                }
                // A key that cannot extend the held prefix decides it.
                self.queue.push_front(item);
                if let Some(resolved) = self.resolve_held(table, mode, limits, true) {
                    return Some(resolved);
                }
                continue;
            };

            self.held.push(item);
            let keys: Vec<KeyEvent> = self.held.iter().map(|q| q.key).collect();
            let found = table.lookup(map_mode, &keys);

            if found.prefix {
                self.deadline = Some(now + limits.timeout);
                continue;
            }
            if let Some(resolved) = self.resolve_held(table, Some(map_mode), limits, false) {
                return Some(resolved);
            }
        }
    }

    /// Turn the held keys into an expansion or flush them.
    ///
    /// The longest held prefix that is an exact mapping expands and the
    /// keys after it go back to the queue. Without one, the first held key
    /// is emitted verbatim and the rest are re-examined.
    fn resolve_held(
        &mut self,
        table: &MapTable,
        mode: Option<MapMode>,
        limits: MapLimits,
        forced: bool,
    ) -> Option<Resolved> {
        self.forced = false;
        self.deadline = None;
        if self.held.is_empty() {
            return None;
        }
        let held = std::mem::take(&mut self.held);
        let keys: Vec<KeyEvent> = held.iter().map(|q| q.key).collect();

        let matched = mode.and_then(|mode| {
            (1..=keys.len())
                .rev()
                .find_map(|n| table.get(mode, &keys[..n]).map(|m| (n, m)))
        });

        let Some((n, mapping)) = matched else {
            for rest in held[1..].iter().rev() {
                self.queue.push_front(*rest);
            }
            return Some(Self::emit(held[0]));
        };

        for rest in held[n..].iter().rev() {
            self.queue.push_front(*rest);
        }

        let depth = held[..n].iter().map(|q| q.depth).max().unwrap_or(0) + 1;
        self.spent += 1;
        if depth > limits.max_depth || self.spent > EXPANSION_BUDGET {
            warn!(
                from = %format_keys(&mapping.from),
                depth,
                expansions = self.spent,
                "mapping runaway, dropping remaining keys"
            );
            self.queue.retain(|q| q.origin == KeyOrigin::Typed && q.depth == 0);
            return None;
        }

        trace!(
            from = %format_keys(&mapping.from),
            to = %format_keys(&mapping.to),
            depth,
            forced,
            "expand mapping"
        );
        let origin = if held[0].origin == KeyOrigin::Replay {
            KeyOrigin::Replay
        } else {
            KeyOrigin::Mapped
        };
        for key in mapping.to.iter().rev() {
            self.queue.push_front(QueuedKey {
                key: *key,
                remap: mapping.recursive,
                depth,
                origin,
            });
        }
        None
    }

    const fn emit(item: QueuedKey) -> Resolved {
        Resolved {
            key: item.key,
            origin: item.origin,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::parse_keys;

    const LIMITS: MapLimits = MapLimits {
        max_depth: 1000,
        timeout: Duration::from_millis(1000),
    };

    fn table(maps: &[(&str, &str, bool)]) -> MapTable {
        let mut t = MapTable::new();
        for (from, to, rec) in maps {
            t.map(MapMode::Normal, parse_keys(from), parse_keys(to), *rec).unwrap();
        }
        t
    }

    /// Feed `input` and collect what reaches dispatch, as notation.
    fn run(t: &MapTable, input: &str) -> (String, KeyMapper) {
        let mut mapper = KeyMapper::new();
        let now = Instant::now();
        let mut out = Vec::new();
        for key in parse_keys(input) {
            mapper.push(key, KeyOrigin::Typed, true);
            while let Some(r) = mapper.next(t, Some(MapMode::Normal), LIMITS, now) {
                out.push(r.key);
            }
        }
        (format_keys(&out), mapper)
    }

    fn drain(t: &MapTable, mapper: &mut KeyMapper) -> String {
        let mut out = Vec::new();
        while let Some(r) = mapper.next(t, Some(MapMode::Normal), LIMITS, Instant::now()) {
            out.push(r.key);
        }
        format_keys(&out)
    }

    // -- MapTable -------------------------------------------------------------

    #[test]
    fn map_replaces_existing() {
        let mut t = table(&[("x", "a", true)]);
        t.map(MapMode::Normal, parse_keys("x"), parse_keys("b"), false).unwrap();
        let m = t.get(MapMode::Normal, &parse_keys("x")).unwrap();
        assert_eq!(m.to, parse_keys("b"));
        assert!(!m.recursive);
        assert_eq!(t.iter().count(), 1);
    }

    #[test]
    fn unmap_missing_is_an_error() {
        let mut t = table(&[("x", "a", true)]);
        assert_eq!(t.unmap(MapMode::Insert, &parse_keys("x")), Err(ViError::NoSuchMapping));
        assert_eq!(t.unmap(MapMode::Normal, &parse_keys("y")), Err(ViError::NoSuchMapping));
        assert!(t.unmap(MapMode::Normal, &parse_keys("x")).is_ok());
        assert!(t.is_empty());
    }

    #[test]
    fn lookup_reports_exact_and_prefix() {
        let t = table(&[("g", "x", true), ("gq", "y", true)]);
        let l = t.lookup(MapMode::Normal, &parse_keys("g"));
        assert!(l.exact && l.prefix);
        let l = t.lookup(MapMode::Normal, &parse_keys("gq"));
        assert!(l.exact && !l.prefix);
        assert_eq!(t.lookup(MapMode::Visual, &parse_keys("g")), Lookup::default());
    }

    #[test]
    fn empty_from_is_rejected() {
        let mut t = MapTable::new();
        assert!(t.map(MapMode::Normal, Vec::new(), parse_keys("x"), true).is_err());
    }

    #[test]
    fn listing_marks_noremap() {
        let t = table(&[("Q", "gq", false)]);
        let lines = t.listing(&[MapMode::Normal]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("n  Q"));
        assert!(lines[0].ends_with("*gq"));
    }

    // -- Expansion ------------------------------------------------------------

    #[test]
    fn unmapped_keys_pass_through() {
        let (out, mapper) = run(&MapTable::new(), "dd");
        assert_eq!(out, "dd");
        assert!(mapper.is_idle());
    }

    #[test]
    fn simple_expansion() {
        let t = table(&[("Y", "y$", false)]);
        assert_eq!(run(&t, "Y").0, "y$");
    }

    #[test]
    fn recursive_expansion_chains() {
        let t = table(&[("a", "b", true), ("b", "c", true)]);
        assert_eq!(run(&t, "a").0, "c");
    }

    #[test]
    fn noremap_expansion_is_not_remapped() {
        let t = table(&[("a", "b", false), ("b", "c", true)]);
        assert_eq!(run(&t, "a").0, "b");
        assert_eq!(run(&t, "b").0, "c");
    }

    #[test]
    fn mutual_recursion_terminates() {
        let t = table(&[("a", "b", true), ("b", "a", true)]);
        let (out, mapper) = run(&t, "a");
        assert_eq!(out, "");
        assert!(mapper.is_idle());
    }

    #[test]
    fn self_growing_mapping_is_stopped() {
        let t = table(&[("a", "aa", true)]);
        let (out, mapper) = run(&t, "ax");
        // The expansion is dropped; the following typed key survives.
        assert_eq!(out, "x");
        assert!(mapper.is_idle());
    }

    #[test]
    fn self_prefixed_recursive_mapping_is_bounded_by_depth() {
        let t = table(&[("j", "jx", true)]);
        let mut mapper = KeyMapper::new();
        mapper.push(KeyEvent::char('j'), KeyOrigin::Typed, true);
        let limits = MapLimits { max_depth: 5, ..LIMITS };
        let mut out = Vec::new();
        while let Some(r) = mapper.next(&t, Some(MapMode::Normal), limits, Instant::now()) {
            out.push(r.key);
        }
        assert!(out.is_empty());
        assert!(mapper.is_idle());
    }

    // -- Ambiguous prefixes ---------------------------------------------------

    #[test]
    fn prefix_is_held_until_decided() {
        let t = table(&[("gq", "X", true)]);
        let (out, mapper) = run(&t, "g");
        assert_eq!(out, "");
        assert!(mapper.is_holding());
        assert!(mapper.deadline().is_some());

        let (out, _) = run(&t, "gq");
        assert_eq!(out, "X");
    }

    #[test]
    fn non_extending_key_flushes_verbatim() {
        let t = table(&[("gq", "X", true)]);
        assert_eq!(run(&t, "gx").0, "gx");
        // The second `g` starts a new candidate.
        let (out, mapper) = run(&t, "gg");
        assert_eq!(out, "g");
        assert!(mapper.is_holding());
    }

    #[test]
    fn flushed_tail_is_mapped_again() {
        let t = table(&[("gq", "X", true), ("x", "Y", true)]);
        assert_eq!(run(&t, "gx").0, "gY");
    }

    #[test]
    fn timeout_expands_exact_prefix() {
        let t = table(&[("g", "G", true), ("gq", "X", true)]);
        let (out, mut mapper) = run(&t, "g");
        assert_eq!(out, "");
        mapper.expire();
        assert_eq!(drain(&t, &mut mapper), "G");
        assert!(mapper.deadline().is_none());
    }

    #[test]
    fn timeout_flushes_non_mapping_prefix() {
        let t = table(&[("abc", "X", true)]);
        let (out, mut mapper) = run(&t, "ab");
        assert_eq!(out, "");
        mapper.expire();
        assert_eq!(drain(&t, &mut mapper), "ab");
        assert!(mapper.is_idle());
    }

    #[test]
    fn longest_exact_prefix_wins_on_mismatch() {
        let t = table(&[("g", "G", false), ("gqq", "X", true)]);
        assert_eq!(run(&t, "gqz").0, "Gqz");
    }

    #[test]
    fn mapping_disabled_for_literal_arguments() {
        let t = table(&[("a", "b", true)]);
        let mut mapper = KeyMapper::new();
        mapper.push(KeyEvent::char('a'), KeyOrigin::Typed, true);
        let r = mapper.next(&t, None, LIMITS, Instant::now()).unwrap();
        assert_eq!(r.key, KeyEvent::char('a'));
    }

    #[test]
    fn expansion_origin_is_mapped() {
        let t = table(&[("a", "b", true)]);
        let mut mapper = KeyMapper::new();
        mapper.push(KeyEvent::char('a'), KeyOrigin::Typed, true);
        let r = mapper.next(&t, Some(MapMode::Normal), LIMITS, Instant::now()).unwrap();
        assert_eq!(r.origin, KeyOrigin::Mapped);
        mapper.push(KeyEvent::char('a'), KeyOrigin::Replay, true);
        let r = mapper.next(&t, Some(MapMode::Normal), LIMITS, Instant::now()).unwrap();
        assert_eq!(r.origin, KeyOrigin::Replay);
    }

    #[test]
    fn push_front_runs_before_queued_keys() {
        let t = MapTable::new();
        let mut mapper = KeyMapper::new();
        mapper.push(KeyEvent::char('x'), KeyOrigin::Typed, true);
        mapper.push_front(&parse_keys("ab"), KeyOrigin::Replay, true);
        assert_eq!(drain(&t, &mut mapper), "abx");
    }

    #[test]
    fn discard_drops_only_that_origin() {
        let t = MapTable::new();
        let mut mapper = KeyMapper::new();
        mapper.push(KeyEvent::char('x'), KeyOrigin::Typed, true);
        mapper.push_front(&parse_keys("ab"), KeyOrigin::Replay, true);
        mapper.discard(KeyOrigin::Replay);
        assert_eq!(drain(&t, &mut mapper), "x");
    }
}
