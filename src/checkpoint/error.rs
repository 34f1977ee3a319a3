//! Checkpoint error types.

use thiserror::Error;

/// Errors that can occur during checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Serialization to JSON failed
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON failed
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint format version is not supported by this version
    #[error("unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Checkpoint references a state the target machine does not declare
    #[error("checkpoint references unknown state '{0}'")]
    UnknownState(String),

    /// Checkpoint data failed consistency validation
    #[error("checkpoint validation failed: {0}")]
    ValidationFailed(String),
}
