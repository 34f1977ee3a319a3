//! Construction errors for machine tables.

use thiserror::Error;

/// Errors detected while building a machine from its declarative table.
///
/// All of these are fatal to construction: no machine is returned and
/// nothing has executed (construction never runs an action or predicate).
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("machine declares no states; add at least one state")]
    EmptyMachine,

    #[error("state '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("state '{state}' has a rule targeting unknown state '{target}'")]
    UnknownTarget { state: String, target: String },

    #[error("rule from '{state}' to '{target}' has no predicate; call when(), always(), never(), or flag()")]
    MissingPredicate { state: String, target: String },
}
