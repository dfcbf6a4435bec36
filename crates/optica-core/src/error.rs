//! Error types for tree updates and asynchronous loads.

use crate::value::ValueKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Failure of a pure updater. Recovered by the store: the update is skipped
/// and the tree stays unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum UpdateError {
    /// A lens tried to descend through something that is not a record.
    #[error("Cannot update `{path}`: found {found}, expected a record")]
    NotARecord {
        /// Dotted path of the offending node
        path: String,
        /// Kind of value found there
        found: ValueKind,
    },

    /// An application updater rejected the update.
    #[error("Updater failed: {message}")]
    Handler {
        /// Error message supplied by the updater
        message: String,
    },
}

impl UpdateError {
    /// Create an updater failure
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Create a not-a-record failure
    pub fn not_a_record(path: impl Into<String>, found: ValueKind) -> Self {
        Self::NotARecord {
            path: path.into(),
            found,
        }
    }
}

// `ValueKind` travels inside `UpdateError`, so it has to be serializable too.
impl Serialize for ValueKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ValueKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(match label.as_str() {
            "null" => Self::Null,
            "boolean" => Self::Bool,
            "integer" => Self::Int,
            "float" => Self::Float,
            "string" => Self::Str,
            "list" => Self::List,
            "record" => Self::Record,
            other => {
                return Err(serde::de::Error::unknown_variant(
                    other,
                    &["null", "boolean", "integer", "float", "string", "list", "record"],
                ))
            }
        })
    }
}

/// Error produced by an asynchronous loader. Stored in the data model
/// (`LoadSlot::error`), hence cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct LoadError {
    message: Arc<str>,
}

impl LoadError {
    /// Create a load error from a message
    pub fn new(message: impl AsRef<str>) -> Self {
        Self {
            message: Arc::from(message.as_ref()),
        }
    }

    /// Capture any error's display form
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string())
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoadError").field(&self.message).finish()
    }
}

impl From<&str> for LoadError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for LoadError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_error_display() {
        let err = UpdateError::not_a_record("todo.list", ValueKind::List);
        assert_eq!(
            err.to_string(),
            "Cannot update `todo.list`: found list, expected a record"
        );
        assert_eq!(
            UpdateError::handler("boom").to_string(),
            "Updater failed: boom"
        );
    }

    #[test]
    fn test_load_error_clone_shares_message() {
        let err = LoadError::new("timeout");
        let copy = err.clone();
        assert_eq!(copy, err);
        assert_eq!(copy.message(), "timeout");
    }

    #[test]
    fn test_value_kind_serde() {
        let json = serde_json::to_string(&ValueKind::Record).unwrap();
        assert_eq!(json, "\"record\"");
        let back: ValueKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ValueKind::Record);
    }
}
