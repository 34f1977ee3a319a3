//! Per-visit execution history.
//!
//! The history is an append-only log with one entry per state *entry*: the
//! start state, every transition destination, and every re-entry of the same
//! state each get their own entry. Result and message slots live on the
//! entry, not on the state, so every visit keeps its own pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One history entry: a single entry into a state.
///
/// The result and message slots start empty and are filled by actions (or by
/// the machine's `set_result`/`set_message`) while the visit is the latest
/// one for its state.
///
/// # Example
///
/// ```rust
/// use statecraft::{MachineBuilder, StateBuilder};
///
/// let mut machine = MachineBuilder::new()
///     .state(StateBuilder::new("boot"))
///     .build()
///     .unwrap();
/// machine.start();
///
/// let history = machine.raw_history();
/// assert_eq!(history.len(), 1);
/// assert_eq!(history[0].state, "boot");
/// assert!(history[0].result.is_none());
/// assert!(history[0].message.is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Name of the state that was entered.
    pub state: String,
    /// Result recorded during this visit, if any.
    pub result: Option<Value>,
    /// Message recorded during this visit, if any.
    pub message: Option<Value>,
    /// When the state was entered.
    pub entered_at: DateTime<Utc>,
}

impl Visit {
    pub(crate) fn new(state: String) -> Self {
        Self {
            state,
            result: None,
            message: None,
            entered_at: Utc::now(),
        }
    }
}

/// Append-only visit log plus, per state, the ordered list of indices of
/// that state's entries. The index list is what makes "all results ever
/// recorded for state X, in entry order" a cheap query.
pub(crate) struct History {
    entries: Vec<Visit>,
    by_state: Vec<Vec<usize>>,
}

impl History {
    pub(crate) fn new(state_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            by_state: vec![Vec::new(); state_count],
        }
    }

    /// Append a fresh entry for the given state.
    pub(crate) fn open(&mut self, state: usize, name: String) {
        let index = self.entries.len();
        self.entries.push(Visit::new(name));
        self.by_state[state].push(index);
    }

    pub(crate) fn entries(&self) -> &[Visit] {
        &self.entries
    }

    /// Index into `entries` of the latest visit of the given state.
    pub(crate) fn latest_for(&self, state: usize) -> Option<usize> {
        self.by_state[state].last().copied()
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut Visit {
        &mut self.entries[index]
    }

    /// All visits of the given state, oldest to newest.
    pub(crate) fn visits_for(&self, state: usize) -> impl Iterator<Item = &Visit> + '_ {
        self.by_state[state].iter().map(move |&index| &self.entries[index])
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        for indices in &mut self.by_state {
            indices.clear();
        }
    }

    /// Rebuild a history from raw entries, resolving each state name through
    /// the given lookup. Fails with the offending name if an entry names a
    /// state the lookup does not know.
    pub(crate) fn from_entries<F>(
        entries: Vec<Visit>,
        state_count: usize,
        index_of: F,
    ) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut by_state = vec![Vec::new(); state_count];
        for (position, visit) in entries.iter().enumerate() {
            let state = index_of(&visit.state).ok_or_else(|| visit.state.clone())?;
            by_state[state].push(position);
        }
        Ok(Self { entries, by_state })
    }
}
