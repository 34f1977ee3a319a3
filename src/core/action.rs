//! Action lists: the normalized callable sequences behind every lifecycle hook.
//!
//! Every state owns three of these (enter, body, exit) and every rule owns
//! one (run only when that rule fires). Normalization happens at build time:
//! the builders append callables one by one, so by the time a machine exists
//! each hook is a single canonical ordered list and the runtime never
//! branches on shape.

use crate::machine::Scope;

/// A single callable unit attached to a lifecycle hook.
///
/// Actions receive a [`Scope`] borrowing the machine's runtime: they can read
/// the state they belong to, read and write the current visit's result and
/// message slots, and read and write machine-wide notes. Actions do not
/// return values and cannot fail; anything worth keeping goes into a slot or
/// a note.
pub type Action = Box<dyn Fn(&mut Scope<'_>) + Send + Sync>;

/// Ordered sequence of zero or more actions.
///
/// Actions run in insertion order, each to completion before the next.
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    /// Create an empty action list.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Append an action, preserving insertion order.
    pub fn push<F>(&mut self, action: F)
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        self.actions.push(Box::new(action));
    }

    /// Number of actions in the list.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if no actions are attached.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order against the given scope.
    pub(crate) fn run(&self, scope: &mut Scope<'_>) {
        for action in &self.actions {
            action(scope);
        }
    }
}

impl Default for ActionList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_list_is_empty() {
        let list = ActionList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn push_accumulates_in_order() {
        let mut list = ActionList::new();
        list.push(|_scope| {});
        list.push(|_scope| {});
        assert_eq!(list.len(), 2);
        assert!(!list.is_empty());
    }

    #[test]
    fn default_matches_new() {
        let list = ActionList::default();
        assert!(list.is_empty());
    }
}
