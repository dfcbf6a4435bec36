//! Programmer errors reported synchronously by store operations.
//!
//! Runtime failures never surface here: updater errors are logged and the
//! dispatch is skipped, loader errors are stored in the affected slot.

use serde::{Deserialize, Serialize};

/// Misuse of the store API, detected when a view or handler is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// An action kind already has an updater somewhere in the store
    #[error("Duplicate updater: {message}")]
    DuplicateUpdater {
        /// Which kind was registered twice, and where
        message: String,
    },

    /// A focus target that is neither a record nor a list
    #[error("Non-object focus target: {message}")]
    NonObjectFocus {
        /// Path and kind of the rejected target
        message: String,
    },

    /// A field-level operation on a view whose state is not a record
    #[error("State is not a record: {message}")]
    NonRecordState {
        /// Operation and view path
        message: String,
    },

    /// A derived key that already exists in the parent view
    #[error("Key collision: {message}")]
    KeyCollision {
        /// Colliding key and view path
        message: String,
    },

    /// Asynchronous wiring without a Tokio runtime
    #[error("No async runtime: {message}")]
    NoRuntime {
        /// Operation that needed the runtime
        message: String,
    },

    /// Invalid initial state or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was rejected
        message: String,
    },
}

impl StoreError {
    /// Create a duplicate updater error
    pub fn duplicate_updater(message: impl Into<String>) -> Self {
        Self::DuplicateUpdater {
            message: message.into(),
        }
    }

    /// Create a non-object focus error
    pub fn non_object_focus(message: impl Into<String>) -> Self {
        Self::NonObjectFocus {
            message: message.into(),
        }
    }

    /// Create a non-record state error
    pub fn non_record_state(message: impl Into<String>) -> Self {
        Self::NonRecordState {
            message: message.into(),
        }
    }

    /// Create a key collision error
    pub fn key_collision(message: impl Into<String>) -> Self {
        Self::KeyCollision {
            message: message.into(),
        }
    }

    /// Create a missing runtime error
    pub fn no_runtime(message: impl Into<String>) -> Self {
        Self::NoRuntime {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
