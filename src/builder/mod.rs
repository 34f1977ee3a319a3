//! Fluent construction and validation of machine tables.
//!
//! Builders are the Rust rendition of the declarative (name, definition)
//! table: states in declaration order, each with its lifecycle hooks and its
//! ordered rules. Validation is two-pass (names are collected first, then
//! every rule target is resolved against the complete table), so forward
//! references, self-references, and mutual cycles between states all work.

mod error;

pub use error::DefinitionError;

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::core::{ActionList, Guard, Rule, StateNode};
use crate::machine::{Done, Machine, Scope};

/// Builder for one transition rule.
///
/// A rule needs a target (given at construction) and a guard; the guard is
/// either a predicate ([`when`](RuleBuilder::when)) or a constant
/// ([`always`](RuleBuilder::always), [`never`](RuleBuilder::never),
/// [`flag`](RuleBuilder::flag)). Building a machine whose rule never
/// received a guard fails with [`DefinitionError::MissingPredicate`].
pub struct RuleBuilder {
    target: String,
    guard: Option<Guard>,
    label: Option<String>,
    actions: ActionList,
}

impl RuleBuilder {
    /// Start a rule targeting the named state.
    ///
    /// The target may be declared later in the table than the referencing
    /// state; resolution happens when the machine is built.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            guard: None,
            label: None,
            actions: ActionList::new(),
        }
    }

    /// Guard the rule with a predicate.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::when(predicate));
        self
    }

    /// Make the rule apply unconditionally.
    pub fn always(mut self) -> Self {
        self.guard = Some(Guard::always());
        self
    }

    /// Make the rule never apply (useful to park an edge while keeping it
    /// visible in diagrams).
    pub fn never(mut self) -> Self {
        self.guard = Some(Guard::never());
        self
    }

    /// Guard the rule with a constant truth value.
    pub fn flag(mut self, value: bool) -> Self {
        self.guard = Some(Guard::flag(value));
        self
    }

    /// Attach a human-readable label for diagnostics and diagrams.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a transition action, run only when this rule fires, after the
    /// source state's exit actions and before the target's entry actions.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        self.actions.push(action);
        self
    }
}

/// Builder for one state: name, lifecycle hooks, ordered rules.
pub struct StateBuilder {
    name: String,
    on_enter: ActionList,
    on_body: ActionList,
    on_exit: ActionList,
    rules: Vec<RuleBuilder>,
}

impl StateBuilder {
    /// Start a state with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_enter: ActionList::new(),
            on_body: ActionList::new(),
            on_exit: ActionList::new(),
            rules: Vec::new(),
        }
    }

    /// Append an entry action. Call repeatedly to build an ordered list.
    pub fn on_enter<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        self.on_enter.push(action);
        self
    }

    /// Append a body ("do") action, run after the entry actions.
    pub fn on_body<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        self.on_body.push(action);
        self
    }

    /// Append an exit action, run when the machine leaves this state.
    pub fn on_exit<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        self.on_exit.push(action);
        self
    }

    /// Append a transition rule. Rules are evaluated in the order they were
    /// added.
    pub fn rule(mut self, rule: RuleBuilder) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Builder for a whole machine.
///
/// # Example
///
/// ```rust
/// use statecraft::{MachineBuilder, RuleBuilder, StateBuilder};
///
/// let machine = MachineBuilder::new()
///     .state(StateBuilder::new("open").rule(RuleBuilder::to("closed").always()))
///     .state(StateBuilder::new("closed"))
///     .auto_start(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.current_state(), Some("open"));
/// ```
pub struct MachineBuilder {
    states: Vec<StateBuilder>,
    strict: bool,
    done: Done,
    auto_start: bool,
}

impl MachineBuilder {
    /// Start an empty table. Defaults: non-strict, done is `false`, no
    /// auto-start.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            strict: false,
            done: Done::Flag(false),
            auto_start: false,
        }
    }

    /// Append a state. Declaration order is evaluation order, and the first
    /// declared state is the start state.
    pub fn state(mut self, state: StateBuilder) -> Self {
        self.states.push(state);
        self
    }

    /// Set strict (exclusive) transition selection.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the done condition to a constant.
    pub fn done(mut self, value: bool) -> Self {
        self.done = Done::Flag(value);
        self
    }

    /// Set the done condition to a callable over the machine.
    pub fn done_when<F>(mut self, check: F) -> Self
    where
        F: Fn(&Machine) -> bool + Send + Sync + 'static,
    {
        self.done = Done::Check(Box::new(check));
        self
    }

    /// Start the machine as the last step of a successful build.
    pub fn auto_start(mut self, start: bool) -> Self {
        self.auto_start = start;
        self
    }

    /// Validate the table and produce the machine.
    ///
    /// First pass collects state names and rejects duplicates; second pass
    /// resolves every rule target against the complete table and normalizes
    /// guards. Construction executes no action or predicate (auto-start, if
    /// requested, runs the start state's entry lifecycle after validation
    /// succeeds).
    pub fn build(self) -> Result<Machine, DefinitionError> {
        let MachineBuilder {
            states: specs,
            strict,
            done,
            auto_start,
        } = self;

        if specs.is_empty() {
            return Err(DefinitionError::EmptyMachine);
        }

        let mut index = HashMap::new();
        for (position, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), position).is_some() {
                return Err(DefinitionError::DuplicateState(spec.name.clone()));
            }
        }

        let mut states = Vec::with_capacity(specs.len());
        for spec in specs {
            let StateBuilder {
                name,
                on_enter,
                on_body,
                on_exit,
                rules: rule_specs,
            } = spec;

            let mut rules = Vec::with_capacity(rule_specs.len());
            for rule in rule_specs {
                let target = index.get(&rule.target).copied().ok_or_else(|| {
                    DefinitionError::UnknownTarget {
                        state: name.clone(),
                        target: rule.target.clone(),
                    }
                })?;
                let guard = rule.guard.ok_or_else(|| DefinitionError::MissingPredicate {
                    state: name.clone(),
                    target: rule.target.clone(),
                })?;
                rules.push(Rule {
                    target,
                    guard,
                    label: rule.label,
                    actions: rule.actions,
                });
            }

            states.push(StateNode {
                name,
                on_enter,
                on_body,
                on_exit,
                rules,
            });
        }

        debug!(states = states.len(), "machine table validated");
        let mut machine = Machine::assemble(states, index, strict, done);
        if auto_start {
            machine.start();
        }
        Ok(machine)
    }
}

impl Default for MachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
