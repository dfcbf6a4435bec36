//! Store-wide status from the statuses of all loadable slots.

use crate::error::LoadError;
use crate::raw_state::{LoadSlot, LoadStatus};
use serde::{Deserialize, Serialize};

/// Aggregate status of a set of loadable slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// `Error` if any slot failed, else `Loading` if any slot is pending,
    /// else `Loaded` (also for an empty set).
    pub status: LoadStatus,
    /// Every slot error, in slot iteration order.
    pub errors: Vec<LoadError>,
}

impl StatusSummary {
    /// Summary of an empty slot set.
    pub fn loaded() -> Self {
        Self {
            status: LoadStatus::Loaded,
            errors: Vec::new(),
        }
    }
}

/// Combine slot statuses. Not cached: callers re-run it on every emission.
pub fn aggregate<'a, I>(slots: I) -> StatusSummary
where
    I: IntoIterator<Item = &'a LoadSlot>,
{
    let mut any_loading = false;
    let mut any_error = false;
    let mut errors = Vec::new();

    for slot in slots {
        match slot.status {
            LoadStatus::Error => any_error = true,
            LoadStatus::Loading => any_loading = true,
            LoadStatus::Loaded => {}
        }
        if let Some(error) = &slot.error {
            errors.push(error.clone());
        }
    }

    let status = if any_error {
        LoadStatus::Error
    } else if any_loading {
        LoadStatus::Loading
    } else {
        LoadStatus::Loaded
    };

    StatusSummary { status, errors }
}
