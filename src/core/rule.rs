//! Transition rules and the guards that select them.
//!
//! A rule is one named transition candidate: a guard deciding whether the
//! rule applies, an optional label for diagnostics, and an action list run
//! only when this rule is the one selected to fire. Guards are normalized
//! once at build time into a tagged variant, either a constant truth value
//! or a predicate callable, so runtime evaluation is a single uniform call
//! regardless of how the rule was expressed.

use serde_json::Value;

use crate::core::action::ActionList;
use crate::machine::Scope;

/// Predicate callable deciding whether a rule applies.
///
/// Receives a [`Scope`] for the state under evaluation plus the extra
/// arguments forwarded verbatim from the `switch` call. Predicates are
/// ordinary side-effecting callbacks: they may read and write notes or the
/// current visit's slots, and nothing guarantees purity.
pub type Predicate = Box<dyn Fn(&mut Scope<'_>, &[Value]) -> bool + Send + Sync>;

/// Guard over a transition rule: a constant truth value or a predicate.
///
/// Constants cover "always transition" and "never transition" rules without
/// paying for a callable; anything dynamic goes through [`Guard::when`].
pub enum Guard {
    /// Constant truth value, evaluated without calling anything.
    Always(bool),
    /// Predicate evaluated against the current state and switch arguments.
    When(Predicate),
}

impl Guard {
    /// Guard that always applies.
    pub fn always() -> Self {
        Guard::Always(true)
    }

    /// Guard that never applies.
    pub fn never() -> Self {
        Guard::Always(false)
    }

    /// Guard fixed to the given truth value.
    pub fn flag(value: bool) -> Self {
        Guard::Always(value)
    }

    /// Guard backed by a predicate callable.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &[Value]) -> bool + Send + Sync + 'static,
    {
        Guard::When(Box::new(predicate))
    }

    /// Evaluate the guard for the given scope and switch arguments.
    pub fn check(&self, scope: &mut Scope<'_>, args: &[Value]) -> bool {
        match self {
            Guard::Always(value) => *value,
            Guard::When(predicate) => predicate(scope, args),
        }
    }
}

/// A compiled transition rule.
///
/// The target is resolved to a state index at build time; construction fails
/// if the target name is not a declared state, so a `Rule` always points at
/// a live row of the owning machine's table.
pub struct Rule {
    pub(crate) target: usize,
    pub(crate) guard: Guard,
    pub(crate) label: Option<String>,
    pub(crate) actions: ActionList,
}

impl Rule {
    /// Human-readable label, if one was declared.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}
