//! Statecraft: a rule-table driven finite state machine engine.
//!
//! A machine is built once from a declarative table of named states, each
//! with optional entry/body/exit actions and an ordered list of transition
//! rules, and then driven from its start state through successive
//! transitions until a termination condition holds.
//!
//! # Core Concepts
//!
//! - **States** are named table rows with three lifecycle hooks and ordered
//!   rules; the first declared state is the start state.
//! - **Rules** pair a guard (predicate or constant) with a target state and
//!   optional transition actions; they are evaluated in declaration order.
//! - **History** is an append-only log with one entry per state entry, each
//!   carrying its own result and message slots.
//! - **Notes** are a free-form key/value store shared across states,
//!   cleared only by `reset`.
//!
//! # Example
//!
//! ```rust
//! use statecraft::{MachineBuilder, RuleBuilder, StateBuilder};
//! use serde_json::json;
//!
//! let mut machine = MachineBuilder::new()
//!     .state(
//!         StateBuilder::new("ping")
//!             .on_body(|scope| {
//!                 scope.set_note("next", json!("pong"));
//!             })
//!             .rule(RuleBuilder::to("pong").when(|scope, _args| {
//!                 scope.note("next") == Some(&json!("pong"))
//!             })),
//!     )
//!     .state(
//!         StateBuilder::new("pong")
//!             .on_body(|scope| {
//!                 scope.set_note("next", json!("ping"));
//!             })
//!             .rule(RuleBuilder::to("ping").when(|scope, _args| {
//!                 scope.note("next") == Some(&json!("ping"))
//!             })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! machine.start();
//! machine.switch().unwrap();
//! machine.switch().unwrap();
//!
//! assert_eq!(machine.current_state(), Some("ping"));
//! assert_eq!(machine.stack(), vec!["ping", "pong", "ping"]);
//! ```
//!
//! Transition selection is non-strict by default: the first rule whose guard
//! holds wins and later rules are never evaluated. Strict mode evaluates
//! every rule and demands exactly one match, enforcing a single-successor
//! discipline.
//!
//! A single machine is single-threaded and synchronous; every callback runs
//! to completion before the next begins. Callbacks are `Send + Sync`, so a
//! machine may be moved across threads, and independent machines share
//! nothing.

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod machine;

// Re-export the working surface at the crate root.
pub use crate::builder::{DefinitionError, MachineBuilder, RuleBuilder, StateBuilder};
pub use crate::checkpoint::{Checkpoint, CheckpointError, CHECKPOINT_VERSION};
pub use crate::core::{Action, ActionList, Guard, Predicate, Visit};
pub use crate::machine::{
    DoneCheck, Machine, RuleSnapshot, Scope, StateRef, StateSnapshot, TableSnapshot,
    TransitionError,
};
