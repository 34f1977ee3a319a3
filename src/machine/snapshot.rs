//! Read-only snapshot of the static state table.
//!
//! This is the boundary consumed by external diagram renderers: state names,
//! rule targets, and rule labels only. It reflects the table as declared,
//! never runtime state, and can be re-derived at any time.

use serde::{Deserialize, Serialize};

/// Static snapshot of a machine's state/rule table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// States in declaration order; the first is the start state.
    pub states: Vec<StateSnapshot>,
}

/// One state in a [`TableSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub name: String,
    /// Rules in declaration order.
    pub rules: Vec<RuleSnapshot>,
}

/// One rule edge in a [`TableSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub target: String,
    pub label: Option<String>,
}
