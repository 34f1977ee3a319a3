//! The machine: table ownership, transition selection, lifecycle, run loop.
//!
//! Construction (see [`crate::builder`]) builds and validates the state/rule
//! table once. After that the machine mutates only three things: the
//! current-state pointer, the visit history, and the note store. The machine
//! keeps no iteration counter of its own; [`Machine::run`] is the only thing
//! that loops.

mod error;
mod scope;
mod snapshot;

pub use error::TransitionError;
pub use scope::Scope;
pub use snapshot::{RuleSnapshot, StateSnapshot, TableSnapshot};

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace};

use crate::core::{History, StateNode, Visit};

/// Callable form of the done condition, evaluated over the whole machine.
pub type DoneCheck = Box<dyn Fn(&Machine) -> bool + Send + Sync>;

/// The machine's termination condition: a constant or a callable.
pub(crate) enum Done {
    Flag(bool),
    Check(DoneCheck),
}

/// The immutable state/rule table.
pub(crate) struct Table {
    pub(crate) states: Vec<StateNode>,
    pub(crate) index: HashMap<String, usize>,
}

/// The mutable runtime: everything `reset` clears.
pub(crate) struct Runtime {
    pub(crate) current: Option<usize>,
    pub(crate) history: History,
    pub(crate) notes: HashMap<String, Value>,
}

impl Runtime {
    /// Latest visit of the currently active state.
    pub(crate) fn latest_entry(&self) -> Option<&Visit> {
        let current = self.current?;
        let index = self.history.latest_for(current)?;
        Some(&self.history.entries()[index])
    }

    pub(crate) fn latest_entry_mut(&mut self) -> Option<&mut Visit> {
        let current = self.current?;
        let index = self.history.latest_for(current)?;
        Some(self.history.entry_mut(index))
    }
}

/// A rule-table driven finite state machine.
///
/// Built once from a declarative table via [`MachineBuilder`]
/// (`crate::builder`), then driven through `start`/`switch`/`run`. The first
/// declared state is the start state.
///
/// # Example
///
/// ```rust
/// use statecraft::{MachineBuilder, RuleBuilder, StateBuilder};
///
/// let mut machine = MachineBuilder::new()
///     .state(StateBuilder::new("draft").rule(RuleBuilder::to("published").always()))
///     .state(StateBuilder::new("published"))
///     .build()
///     .unwrap();
///
/// machine.start();
/// assert_eq!(machine.current_state(), Some("draft"));
///
/// machine.switch().unwrap();
/// assert_eq!(machine.current_state(), Some("published"));
/// assert_eq!(machine.stack(), vec!["draft", "published"]);
/// ```
///
/// [`MachineBuilder`]: crate::builder::MachineBuilder
pub struct Machine {
    pub(crate) table: Table,
    pub(crate) runtime: Runtime,
    pub(crate) done: Done,
    pub(crate) strict: bool,
}

impl Machine {
    pub(crate) fn assemble(
        states: Vec<StateNode>,
        index: HashMap<String, usize>,
        strict: bool,
        done: Done,
    ) -> Self {
        let state_count = states.len();
        Self {
            table: Table { states, index },
            runtime: Runtime {
                current: None,
                history: History::new(state_count),
                notes: HashMap::new(),
            },
            done,
            strict,
        }
    }

    /// Enter the first declared state and return its name.
    ///
    /// On a machine that already has a current state this is a no-op
    /// returning the current state's name; no new history entry is appended.
    pub fn start(&mut self) -> &str {
        if self.runtime.current.is_none() {
            self.enter_state(0, None);
        }
        let current = self.runtime.current.unwrap_or(0);
        self.table.states[current].name()
    }

    /// Name of the currently active state, if the machine has started.
    pub fn current_state(&self) -> Option<&str> {
        self.runtime.current.map(|index| self.table.states[index].name())
    }

    /// Handle on the currently active state.
    pub fn current(&self) -> Option<StateRef<'_>> {
        self.runtime.current.map(|index| StateRef { machine: self, index })
    }

    /// True if the machine is currently in the named state.
    pub fn at(&self, name: &str) -> bool {
        self.current_state() == Some(name)
    }

    /// Name of the state the machine was in before the current one.
    pub fn previous_state(&self) -> Option<&str> {
        let entries = self.runtime.history.entries();
        if entries.len() < 2 {
            return None;
        }
        Some(entries[entries.len() - 2].state.as_str())
    }

    /// Jump directly to the named state, bypassing rule evaluation.
    ///
    /// Runs the same lifecycle as a rule-driven transition except that no
    /// transition actions fire (no rule fired). Fails before any exit action
    /// runs if the name is not a declared state, so a failed call is atomic.
    pub fn set_state(&mut self, name: &str) -> Result<&str, TransitionError> {
        let target = self
            .table
            .index
            .get(name)
            .copied()
            .ok_or_else(|| TransitionError::UnknownState {
                name: name.to_string(),
            })?;
        self.enter_state(target, None);
        Ok(self.table.states[target].name())
    }

    /// Evaluate the current state's rules and transition if one applies.
    ///
    /// Returns the new state's name, or `None` if no rule applied. See
    /// [`Machine::try_switch_with`] for the argument-forwarding variant.
    pub fn try_switch(&mut self) -> Result<Option<&str>, TransitionError> {
        self.try_switch_with(&[])
    }

    /// [`Machine::try_switch`] with extra arguments forwarded verbatim to
    /// every rule predicate evaluated during this call.
    ///
    /// Rules are evaluated in declaration order. In the default mode the
    /// first rule whose guard holds is selected and evaluation stops there.
    /// In strict mode every guard is evaluated first: exactly one match
    /// fires, more than one is [`TransitionError::AmbiguousTransition`]
    /// (raised before any action runs), zero matches is no transition.
    pub fn try_switch_with(&mut self, args: &[Value]) -> Result<Option<&str>, TransitionError> {
        let current = self.runtime.current.ok_or(TransitionError::NotStarted)?;

        let selected = if self.strict {
            self.select_exclusive(current, args)?
        } else {
            self.select_first(current, args)
        };

        match selected {
            Some(rule) => {
                let target = self.table.states[current].rules[rule].target;
                self.enter_state(target, Some((current, rule)));
                Ok(Some(self.table.states[target].name()))
            }
            None => Ok(None),
        }
    }

    /// Like [`Machine::try_switch`], but failing with
    /// [`TransitionError::NoTransition`] when no rule applies.
    pub fn switch(&mut self) -> Result<&str, TransitionError> {
        self.switch_with(&[])
    }

    /// [`Machine::switch`] with extra arguments forwarded to predicates.
    pub fn switch_with(&mut self, args: &[Value]) -> Result<&str, TransitionError> {
        let current = self.runtime.current.ok_or(TransitionError::NotStarted)?;
        let from = self.table.states[current].name().to_string();
        match self.try_switch_with(args)? {
            Some(next) => Ok(next),
            None => Err(TransitionError::NoTransition { from }),
        }
    }

    /// Evaluate the machine's done condition.
    pub fn is_done(&self) -> bool {
        match &self.done {
            Done::Flag(value) => *value,
            Done::Check(check) => check(self),
        }
    }

    /// Set the done condition to a constant.
    pub fn set_done(&mut self, value: bool) {
        self.done = Done::Flag(value);
    }

    /// Set the done condition to a callable over the machine.
    pub fn set_done_when<F>(&mut self, check: F)
    where
        F: Fn(&Machine) -> bool + Send + Sync + 'static,
    {
        self.done = Done::Check(Box::new(check));
    }

    /// Whether strict (exclusive) transition selection is active.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Toggle strict transition selection.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Drive the machine until the done condition holds.
    ///
    /// Starts the machine if it has no current state, then repeatedly calls
    /// the fatal [`Machine::switch`]. The engine enforces no step limit and
    /// no cycle detection: termination is the caller's responsibility, via
    /// rule design or a bounded done condition. Callers that need to
    /// interrupt mid-run should drive [`Machine::switch`] themselves.
    pub fn run(&mut self) -> Result<(), TransitionError> {
        if self.runtime.current.is_none() {
            self.start();
        }
        while !self.is_done() {
            self.switch()?;
        }
        Ok(())
    }

    /// Clear current state, history, per-state indices, and notes.
    ///
    /// The state/rule table, the done condition, and the strict flag are
    /// untouched; a reset machine is reusable as if freshly constructed.
    pub fn reset(&mut self) {
        self.runtime.current = None;
        self.runtime.history.clear();
        self.runtime.notes.clear();
        debug!("machine reset");
    }

    /// The note store: free-form key/value data shared across states.
    pub fn notes(&self) -> &HashMap<String, Value> {
        &self.runtime.notes
    }

    /// Read a single note.
    pub fn note(&self, key: &str) -> Option<&Value> {
        self.runtime.notes.get(key)
    }

    /// Write a note, returning the previous value if any.
    pub fn set_note(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.runtime.notes.insert(key.into(), value)
    }

    /// Remove a note, returning it if it was set.
    pub fn remove_note(&mut self, key: &str) -> Option<Value> {
        self.runtime.notes.remove(key)
    }

    /// Result slot of the current state's latest visit.
    pub fn result(&self) -> Option<&Value> {
        self.runtime.latest_entry().and_then(|visit| visit.result.as_ref())
    }

    /// Record a result on the current state's latest visit.
    pub fn set_result(&mut self, value: Value) -> Result<(), TransitionError> {
        match self.runtime.latest_entry_mut() {
            Some(visit) => {
                visit.result = Some(value);
                Ok(())
            }
            None => Err(TransitionError::NotStarted),
        }
    }

    /// Message slot of the current state's latest visit.
    pub fn message(&self) -> Option<&Value> {
        self.runtime.latest_entry().and_then(|visit| visit.message.as_ref())
    }

    /// Record a message on the current state's latest visit.
    pub fn set_message(&mut self, value: Value) -> Result<(), TransitionError> {
        match self.runtime.latest_entry_mut() {
            Some(visit) => {
                visit.message = Some(value);
                Ok(())
            }
            None => Err(TransitionError::NotStarted),
        }
    }

    /// Handles on all states in declaration order.
    pub fn states(&self) -> Vec<StateRef<'_>> {
        (0..self.table.states.len())
            .map(|index| StateRef { machine: self, index })
            .collect()
    }

    /// Handle on the named state.
    pub fn state(&self, name: &str) -> Option<StateRef<'_>> {
        self.table
            .index
            .get(name)
            .map(|&index| StateRef { machine: self, index })
    }

    /// Names of every state entered so far, oldest first.
    pub fn stack(&self) -> Vec<&str> {
        self.runtime
            .history
            .entries()
            .iter()
            .map(|visit| visit.state.as_str())
            .collect()
    }

    /// The raw visit log, oldest first.
    pub fn raw_history(&self) -> &[Visit] {
        self.runtime.history.entries()
    }

    /// Static snapshot of the state/rule table for external renderers.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            states: self
                .table
                .states
                .iter()
                .map(|state| StateSnapshot {
                    name: state.name().to_string(),
                    rules: state
                        .rules
                        .iter()
                        .map(|rule| RuleSnapshot {
                            target: self.table.states[rule.target].name().to_string(),
                            label: rule.label().map(str::to_string),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// First rule in declaration order whose guard holds; stops evaluating
    /// at the match.
    fn select_first(&mut self, current: usize, args: &[Value]) -> Option<usize> {
        let state = &self.table.states[current];
        for (index, rule) in state.rules.iter().enumerate() {
            let mut scope = Scope {
                state,
                target: None,
                runtime: &mut self.runtime,
                done: &mut self.done,
            };
            if rule.guard.check(&mut scope, args) {
                trace!(from = state.name(), rule = index, "rule selected");
                return Some(index);
            }
        }
        None
    }

    /// Strict selection: evaluate every guard, then demand exactly one match.
    fn select_exclusive(
        &mut self,
        current: usize,
        args: &[Value],
    ) -> Result<Option<usize>, TransitionError> {
        let state = &self.table.states[current];
        let mut matches = Vec::new();
        for (index, rule) in state.rules.iter().enumerate() {
            let mut scope = Scope {
                state,
                target: None,
                runtime: &mut self.runtime,
                done: &mut self.done,
            };
            if rule.guard.check(&mut scope, args) {
                matches.push(index);
            }
        }
        match matches.len() {
            0 => Ok(None),
            1 => {
                trace!(from = state.name(), rule = matches[0], "rule selected");
                Ok(Some(matches[0]))
            }
            _ => Err(TransitionError::AmbiguousTransition {
                from: state.name().to_string(),
                candidates: matches
                    .iter()
                    .map(|&index| self.table.states[state.rules[index].target].name().to_string())
                    .collect(),
            }),
        }
    }

    /// The state-entry lifecycle: exit actions of the current state, the
    /// fired rule's transition actions (if any rule fired), a fresh history
    /// entry, the current-pointer move, then the new state's entry and body
    /// actions, in that order.
    fn enter_state(&mut self, target: usize, fired: Option<(usize, usize)>) {
        if let Some(current) = self.runtime.current {
            let state = &self.table.states[current];
            let mut scope = Scope {
                state,
                target: Some(&self.table.states[target]),
                runtime: &mut self.runtime,
                done: &mut self.done,
            };
            state.on_exit.run(&mut scope);
        }

        if let Some((source, rule)) = fired {
            let state = &self.table.states[source];
            let mut scope = Scope {
                state,
                target: Some(&self.table.states[target]),
                runtime: &mut self.runtime,
                done: &mut self.done,
            };
            state.rules[rule].actions.run(&mut scope);
        }

        let name = self.table.states[target].name().to_string();
        debug!(state = name.as_str(), "entering state");
        self.runtime.history.open(target, name);
        self.runtime.current = Some(target);

        let state = &self.table.states[target];
        let mut scope = Scope {
            state,
            target: None,
            runtime: &mut self.runtime,
            done: &mut self.done,
        };
        state.on_enter.run(&mut scope);
        state.on_body.run(&mut scope);
    }
}

/// Lightweight handle on one state of a machine.
///
/// This is the public face of a state: its name, a back-reference to the
/// owning machine, and the per-state view of the visit history.
#[derive(Clone, Copy)]
pub struct StateRef<'m> {
    machine: &'m Machine,
    index: usize,
}

impl<'m> StateRef<'m> {
    /// The state's name.
    pub fn name(&self) -> &'m str {
        self.machine.table.states[self.index].name()
    }

    /// The machine this state belongs to.
    pub fn machine(&self) -> &'m Machine {
        self.machine
    }

    /// Every visit of this state, oldest first.
    pub fn visits(&self) -> Vec<&'m Visit> {
        self.machine
            .runtime
            .history
            .visits_for(self.index)
            .collect()
    }

    /// The most recent result recorded for this state across all its visits,
    /// or `None` if the state never recorded one.
    pub fn result(&self) -> Option<&'m Value> {
        self.visits()
            .into_iter()
            .rev()
            .find_map(|visit| visit.result.as_ref())
    }

    /// All results recorded for this state, oldest to newest.
    ///
    /// Visits that recorded nothing contribute nothing; use
    /// [`StateRef::visits`] for the raw per-visit slots.
    pub fn results(&self) -> Vec<&'m Value> {
        self.machine
            .runtime
            .history
            .visits_for(self.index)
            .filter_map(|visit| visit.result.as_ref())
            .collect()
    }

    /// The most recent message recorded for this state across all visits.
    pub fn message(&self) -> Option<&'m Value> {
        self.visits()
            .into_iter()
            .rev()
            .find_map(|visit| visit.message.as_ref())
    }

    /// All messages recorded for this state, oldest to newest.
    pub fn messages(&self) -> Vec<&'m Value> {
        self.machine
            .runtime
            .history
            .visits_for(self.index)
            .filter_map(|visit| visit.message.as_ref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use crate::builder::{MachineBuilder, RuleBuilder, StateBuilder};
    use crate::machine::TransitionError;

    #[test]
    fn start_enters_first_declared_state() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("alpha"))
            .state(StateBuilder::new("beta"))
            .build()
            .unwrap();

        assert_eq!(machine.current_state(), None);
        assert_eq!(machine.start(), "alpha");
        assert_eq!(machine.current_state(), Some("alpha"));
        assert_eq!(machine.raw_history().len(), 1);
    }

    #[test]
    fn start_twice_does_not_reenter() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("alpha"))
            .build()
            .unwrap();

        machine.start();
        machine.start();
        assert_eq!(machine.raw_history().len(), 1);
    }

    #[test]
    fn lifecycle_runs_in_exit_transition_enter_body_order() {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let l1 = Arc::clone(&log);
        let l2 = Arc::clone(&log);
        let l3 = Arc::clone(&log);
        let l4 = Arc::clone(&log);

        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .on_exit(move |_scope| l1.lock().unwrap().push("exit a".to_string()))
                    .rule(
                        RuleBuilder::to("b")
                            .always()
                            .action(move |_scope| l2.lock().unwrap().push("transition".to_string())),
                    ),
            )
            .state(
                StateBuilder::new("b")
                    .on_enter(move |_scope| l3.lock().unwrap().push("enter b".to_string()))
                    .on_body(move |_scope| l4.lock().unwrap().push("body b".to_string())),
            )
            .build()
            .unwrap();

        machine.start();
        machine.switch().unwrap();

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["exit a", "transition", "enter b", "body b"]
        );
    }

    #[test]
    fn exit_and_transition_actions_see_the_target() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = Arc::clone(&seen);
        let s2 = Arc::clone(&seen);

        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .on_exit(move |scope| {
                        s1.lock().unwrap().push(scope.target().map(str::to_string));
                    })
                    .rule(RuleBuilder::to("b").always().action(move |scope| {
                        s2.lock().unwrap().push(scope.target().map(str::to_string));
                    })),
            )
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        machine.switch().unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            [Some("b".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn set_state_skips_transition_actions() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);

        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a").rule(
                RuleBuilder::to("b").always().action(move |_scope| {
                    f.fetch_add(1, Ordering::SeqCst);
                }),
            ))
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        machine.set_state("b").unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(machine.stack(), vec!["a", "b"]);
    }

    #[test]
    fn set_state_unknown_is_atomic() {
        let exited = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&exited);

        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a").on_exit(move |_scope| {
                e.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        machine.start();
        let err = machine.set_state("ghost").unwrap_err();

        assert!(matches!(err, TransitionError::UnknownState { ref name } if name == "ghost"));
        assert_eq!(exited.load(Ordering::SeqCst), 0);
        assert_eq!(machine.current_state(), Some("a"));
        assert_eq!(machine.raw_history().len(), 1);
    }

    #[test]
    fn switch_before_start_is_not_started() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .build()
            .unwrap();

        assert!(matches!(machine.try_switch(), Err(TransitionError::NotStarted)));
        assert!(matches!(machine.switch(), Err(TransitionError::NotStarted)));
    }

    #[test]
    fn try_switch_returns_none_when_no_rule_applies() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a").rule(RuleBuilder::to("a").never()))
            .build()
            .unwrap();

        machine.start();
        assert_eq!(machine.try_switch().unwrap(), None);
        assert_eq!(machine.current_state(), Some("a"));
    }

    #[test]
    fn switch_fails_when_no_rule_applies() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("stuck"))
            .build()
            .unwrap();

        machine.start();
        let err = machine.switch().unwrap_err();
        assert!(matches!(err, TransitionError::NoTransition { ref from } if from == "stuck"));
    }

    #[test]
    fn first_truthy_rule_wins_in_declaration_order() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .rule(RuleBuilder::to("b").never())
                    .rule(RuleBuilder::to("c").always())
                    .rule(RuleBuilder::to("b").always()),
            )
            .state(StateBuilder::new("b"))
            .state(StateBuilder::new("c"))
            .build()
            .unwrap();

        machine.start();
        assert_eq!(machine.switch().unwrap(), "c");
    }

    #[test]
    fn switch_args_reach_predicates() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a").rule(RuleBuilder::to("b").when(|_scope, args| {
                    args.first().and_then(|v| v.as_i64()) == Some(7)
                })),
            )
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        assert_eq!(machine.try_switch_with(&[json!(1)]).unwrap(), None);
        assert_eq!(machine.try_switch_with(&[json!(7)]).unwrap(), Some("b"));
    }

    #[test]
    fn strict_mode_with_single_match_fires() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .rule(RuleBuilder::to("b").never())
                    .rule(RuleBuilder::to("c").always()),
            )
            .state(StateBuilder::new("b"))
            .state(StateBuilder::new("c"))
            .strict(true)
            .build()
            .unwrap();

        machine.start();
        assert_eq!(machine.switch().unwrap(), "c");
    }

    #[test]
    fn strict_mode_evaluates_every_rule() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let e1 = Arc::clone(&evaluated);
        let e2 = Arc::clone(&evaluated);

        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .rule(RuleBuilder::to("b").when(move |_scope, _args| {
                        e1.fetch_add(1, Ordering::SeqCst);
                        true
                    }))
                    .rule(RuleBuilder::to("a").when(move |_scope, _args| {
                        e2.fetch_add(1, Ordering::SeqCst);
                        false
                    })),
            )
            .state(StateBuilder::new("b"))
            .strict(true)
            .build()
            .unwrap();

        machine.start();
        machine.switch().unwrap();
        assert_eq!(evaluated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn strict_ambiguity_names_every_candidate_and_changes_nothing() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .rule(RuleBuilder::to("b").always())
                    .rule(RuleBuilder::to("c").always()),
            )
            .state(StateBuilder::new("b"))
            .state(StateBuilder::new("c"))
            .strict(true)
            .build()
            .unwrap();

        machine.start();
        let err = machine.try_switch().unwrap_err();

        match err {
            TransitionError::AmbiguousTransition { from, candidates } => {
                assert_eq!(from, "a");
                assert_eq!(candidates, vec!["b".to_string(), "c".to_string()]);
            }
            other => panic!("expected AmbiguousTransition, got {other:?}"),
        }
        assert_eq!(machine.current_state(), Some("a"));
        assert_eq!(machine.raw_history().len(), 1);
    }

    #[test]
    fn notes_persist_across_transitions_until_reset() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a").on_body(|scope| {
                scope.set_note("seen", json!(true));
            }))
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        machine.set_state("b").unwrap();
        assert_eq!(machine.note("seen"), Some(&json!(true)));

        machine.reset();
        assert!(machine.notes().is_empty());
        assert_eq!(machine.current_state(), None);
        assert!(machine.stack().is_empty());
    }

    #[test]
    fn results_attach_to_the_visit_not_the_state() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        machine.set_state("b").unwrap();
        machine.set_result(json!(1)).unwrap();
        machine.set_state("b").unwrap();
        machine.set_result(json!(2)).unwrap();

        let b = machine.state("b").unwrap();
        assert_eq!(b.results(), vec![&json!(1), &json!(2)]);
        assert_eq!(b.result(), Some(&json!(2)));
        assert_eq!(machine.result(), Some(&json!(2)));
    }

    #[test]
    fn exit_actions_write_to_the_departing_visit() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .on_exit(|scope| {
                        scope.set_message(json!("leaving"));
                    })
                    .rule(RuleBuilder::to("b").always()),
            )
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        machine.switch().unwrap();

        assert_eq!(machine.state("a").unwrap().message(), Some(&json!("leaving")));
        assert_eq!(machine.message(), None);
    }

    #[test]
    fn result_and_message_require_a_started_machine() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .build()
            .unwrap();

        assert!(matches!(
            machine.set_result(json!(1)),
            Err(TransitionError::NotStarted)
        ));
        assert!(matches!(
            machine.set_message(json!("hi")),
            Err(TransitionError::NotStarted)
        ));
        assert_eq!(machine.result(), None);
    }

    #[test]
    fn previous_state_tracks_the_entry_before_current() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        machine.start();
        assert_eq!(machine.previous_state(), None);

        machine.set_state("b").unwrap();
        assert_eq!(machine.previous_state(), Some("a"));

        machine.set_state("b").unwrap();
        assert_eq!(machine.previous_state(), Some("b"));
    }

    #[test]
    fn at_matches_only_the_current_state() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        assert!(!machine.at("a"));
        machine.start();
        assert!(machine.at("a"));
        assert!(!machine.at("b"));
    }

    #[test]
    fn done_flag_and_callable_both_drive_run() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a").rule(RuleBuilder::to("a").always()))
            .build()
            .unwrap();

        machine.set_done(true);
        machine.run().unwrap();
        assert_eq!(machine.stack(), vec!["a"]);

        machine.reset();
        machine.set_done_when(|m| m.stack().len() >= 3);
        machine.run().unwrap();
        assert_eq!(machine.stack(), vec!["a", "a", "a"]);
    }

    #[test]
    fn actions_can_mark_the_machine_done() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .on_body(|scope| {
                        if scope.history().len() >= 2 {
                            scope.set_done(true);
                        }
                    })
                    .rule(RuleBuilder::to("a").always()),
            )
            .build()
            .unwrap();

        machine.run().unwrap();
        assert_eq!(machine.stack(), vec!["a", "a"]);
    }

    #[test]
    fn state_handles_expose_machine_backreference() {
        let mut machine = MachineBuilder::new()
            .state(StateBuilder::new("a"))
            .build()
            .unwrap();
        machine.start();

        let state = machine.state("a").unwrap();
        assert_eq!(state.name(), "a");
        assert_eq!(state.machine().current_state(), Some("a"));
        assert_eq!(state.visits().len(), 1);
    }

    #[test]
    fn states_come_back_in_declaration_order() {
        let machine = MachineBuilder::new()
            .state(StateBuilder::new("first"))
            .state(StateBuilder::new("second"))
            .state(StateBuilder::new("third"))
            .build()
            .unwrap();

        let names: Vec<&str> = machine.states().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(machine.state("missing").is_none());
    }

    #[test]
    fn snapshot_reflects_the_static_table_only() {
        let mut machine = MachineBuilder::new()
            .state(
                StateBuilder::new("a")
                    .rule(RuleBuilder::to("b").always().label("forward"))
                    .rule(RuleBuilder::to("a").never()),
            )
            .state(StateBuilder::new("b"))
            .build()
            .unwrap();

        let before = machine.snapshot();
        machine.start();
        machine.switch().unwrap();
        let after = machine.snapshot();

        assert_eq!(before, after);
        assert_eq!(before.states.len(), 2);
        assert_eq!(before.states[0].name, "a");
        assert_eq!(before.states[0].rules[0].target, "b");
        assert_eq!(before.states[0].rules[0].label.as_deref(), Some("forward"));
        assert_eq!(before.states[0].rules[1].label, None);
    }

    #[test]
    fn snapshot_serializes() {
        let machine = MachineBuilder::new()
            .state(StateBuilder::new("a").rule(RuleBuilder::to("a").always()))
            .build()
            .unwrap();

        let json = serde_json::to_string(&machine.snapshot()).unwrap();
        assert!(json.contains("\"a\""));
    }
}
