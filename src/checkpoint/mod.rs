//! Checkpoint and resume for machine runtime state.
//!
//! A checkpoint captures the serializable portion of a running machine
//! (current state name, visit history, and notes) so a long-lived workflow
//! can survive a process restart. Action lists and predicates are not
//! serializable and are never captured: restore re-seats the runtime onto a
//! machine rebuilt from the same table definition, and runs no actions.

mod error;

pub use error::CheckpointError;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::core::{History, Visit};
use crate::machine::Machine;

/// Version identifier for the checkpoint format.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a machine's runtime state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When the checkpoint was taken
    pub created_at: DateTime<Utc>,

    /// Name of the current state, if the machine had started
    pub current: Option<String>,

    /// Complete visit history
    pub history: Vec<Visit>,

    /// The note store
    pub notes: HashMap<String, Value>,
}

impl Checkpoint {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from JSON, rejecting unsupported format versions.
    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Checkpoint = serde_json::from_str(json)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(checkpoint)
    }
}

impl Machine {
    /// Capture the machine's runtime state as a [`Checkpoint`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use statecraft::{MachineBuilder, RuleBuilder, StateBuilder};
    ///
    /// fn table() -> MachineBuilder {
    ///     MachineBuilder::new()
    ///         .state(StateBuilder::new("a").rule(RuleBuilder::to("b").always()))
    ///         .state(StateBuilder::new("b"))
    /// }
    ///
    /// let mut machine = table().build().unwrap();
    /// machine.start();
    /// machine.switch().unwrap();
    ///
    /// let json = machine.checkpoint().to_json().unwrap();
    ///
    /// // Later, possibly in another process: rebuild the same table and resume.
    /// let checkpoint = statecraft::Checkpoint::from_json(&json).unwrap();
    /// let mut resumed = table().build().unwrap();
    /// resumed.restore(&checkpoint).unwrap();
    ///
    /// assert_eq!(resumed.current_state(), Some("b"));
    /// assert_eq!(resumed.stack(), vec!["a", "b"]);
    /// ```
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            current: self.current_state().map(str::to_string),
            history: self.raw_history().to_vec(),
            notes: self.notes().clone(),
        }
    }

    /// Re-seat a checkpoint's runtime state onto this machine.
    ///
    /// The machine must be built from the same table the checkpoint was
    /// taken against: every state the checkpoint references must be
    /// declared. Runs no actions; the table, done condition, and strict flag
    /// are untouched.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: checkpoint.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        match (&checkpoint.current, checkpoint.history.last()) {
            (None, None) => {}
            (Some(name), Some(last)) if last.state == *name => {}
            (Some(_), _) => {
                return Err(CheckpointError::ValidationFailed(
                    "history does not end at the current state".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(CheckpointError::ValidationFailed(
                    "history present without a current state".to_string(),
                ))
            }
        }

        let current = match &checkpoint.current {
            Some(name) => Some(
                self.table
                    .index
                    .get(name)
                    .copied()
                    .ok_or_else(|| CheckpointError::UnknownState(name.clone()))?,
            ),
            None => None,
        };

        let history = History::from_entries(
            checkpoint.history.clone(),
            self.table.states.len(),
            |name| self.table.index.get(name).copied(),
        )
        .map_err(CheckpointError::UnknownState)?;

        self.runtime.current = current;
        self.runtime.history = history;
        self.runtime.notes = checkpoint.notes.clone();
        debug!(
            current = ?checkpoint.current,
            entries = checkpoint.history.len(),
            "machine restored from checkpoint"
        );
        Ok(())
    }
}
