//! Call-time errors.

use thiserror::Error;

/// Errors raised while driving a machine.
///
/// All of these are ordinary recoverable failures at the point of the
/// offending call; none leave the machine corrupted. A failed switch or
/// `set_state` leaves current state and history exactly as before the call.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// A transition was attempted before any state was current.
    #[error("machine has not been started; call start() first")]
    NotStarted,

    /// `set_state` named a state that was never declared.
    #[error("cannot move to unknown state '{name}'")]
    UnknownState { name: String },

    /// Strict mode found more than one applicable rule.
    #[error("ambiguous transition from '{from}': multiple rules apply, candidate targets {candidates:?}")]
    AmbiguousTransition {
        from: String,
        candidates: Vec<String>,
    },

    /// The fatal `switch` found no applicable rule.
    #[error("no rule applies from state '{from}'")]
    NoTransition { from: String },
}
