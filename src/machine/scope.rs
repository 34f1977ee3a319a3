//! The handle every callback receives.
//!
//! Actions and predicates never hold the machine itself; they get a `Scope`
//! borrowing exactly the mutable runtime (history slots, notes, done flag)
//! plus a view of the state the hook belongs to. This is the non-owning
//! back-reference from a state to its machine: states never own or count the
//! machine, so there is no reference cycle to manage.

use serde_json::Value;

use crate::core::{StateNode, Visit};
use crate::machine::{Done, Runtime};

/// Borrow-scoped view of a machine handed to actions and predicates.
///
/// For entry and body actions, [`state`](Scope::state) is the state being
/// entered and there is no target. For exit and transition actions run while
/// a transition is underway, `state` is the departing state and
/// [`target`](Scope::target) names the destination.
pub struct Scope<'m> {
    pub(crate) state: &'m StateNode,
    pub(crate) target: Option<&'m StateNode>,
    pub(crate) runtime: &'m mut Runtime,
    pub(crate) done: &'m mut Done,
}

impl<'m> Scope<'m> {
    /// Name of the state this hook belongs to.
    pub fn state(&self) -> &str {
        self.state.name()
    }

    /// Name of the destination state, during exit and transition actions.
    pub fn target(&self) -> Option<&str> {
        self.target.map(StateNode::name)
    }

    /// Result slot of the current state's latest visit.
    pub fn result(&self) -> Option<&Value> {
        self.runtime.latest_entry().and_then(|visit| visit.result.as_ref())
    }

    /// Record a result on the current state's latest visit.
    pub fn set_result(&mut self, value: Value) {
        if let Some(visit) = self.runtime.latest_entry_mut() {
            visit.result = Some(value);
        }
    }

    /// Message slot of the current state's latest visit.
    pub fn message(&self) -> Option<&Value> {
        self.runtime.latest_entry().and_then(|visit| visit.message.as_ref())
    }

    /// Record a message on the current state's latest visit.
    pub fn set_message(&mut self, value: Value) {
        if let Some(visit) = self.runtime.latest_entry_mut() {
            visit.message = Some(value);
        }
    }

    /// Read a machine-wide note.
    pub fn note(&self, key: &str) -> Option<&Value> {
        self.runtime.notes.get(key)
    }

    /// Write a machine-wide note, returning the previous value if any.
    pub fn set_note(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.runtime.notes.insert(key.into(), value)
    }

    /// Remove a machine-wide note, returning it if it was set.
    pub fn remove_note(&mut self, key: &str) -> Option<Value> {
        self.runtime.notes.remove(key)
    }

    /// The full visit log so far, oldest first.
    pub fn history(&self) -> &[Visit] {
        self.runtime.history.entries()
    }

    /// Set the machine's done condition to a constant.
    ///
    /// This is how an action stops `run()`: the loop checks the done
    /// condition after every switch.
    pub fn set_done(&mut self, value: bool) {
        *self.done = Done::Flag(value);
    }
}
