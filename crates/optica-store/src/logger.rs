//! Diagnostic logging through `tracing`.
//!
//! All events use the `optica` target so they can be filtered with
//! `RUST_LOG=optica=debug`. The store never depends on what is logged.

use crate::config::LoggerOptions;
use std::fmt::Debug;

const TARGET: &str = "optica";

/// Kinds of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEvent {
    /// An action was dispatched
    Message,
    /// A handler updated the tree
    Update,
    /// An epic emitted an action
    Epic,
    /// A computed value was produced
    Compute,
    /// Loaders were started
    Loading,
    /// A loader settled
    Loaded,
    /// An updater or epic failed
    Error,
}

impl LogEvent {
    /// Every event kind.
    pub const ALL: [LogEvent; 7] = [
        LogEvent::Message,
        LogEvent::Update,
        LogEvent::Epic,
        LogEvent::Compute,
        LogEvent::Loading,
        LogEvent::Loaded,
        LogEvent::Error,
    ];
}

/// Event sink gated by [`LoggerOptions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    options: LoggerOptions,
}

impl Logger {
    /// Create a logger.
    pub fn new(options: LoggerOptions) -> Self {
        Self { options }
    }

    /// The active options.
    pub fn options(&self) -> LoggerOptions {
        self.options
    }

    /// Whether `event` is emitted.
    pub fn enabled(&self, event: LogEvent) -> bool {
        self.options.enabled(event)
    }

    pub(crate) fn message(&self, path: &str, action: &dyn Debug) {
        if self.enabled(LogEvent::Message) {
            tracing::debug!(target: TARGET, path, action = ?action, "dispatch");
        }
    }

    pub(crate) fn update(&self, path: &str, action: &dyn Debug) {
        if self.enabled(LogEvent::Update) {
            tracing::debug!(target: TARGET, path, action = ?action, "state updated");
        }
    }

    pub(crate) fn epic(&self, path: &str, action: &dyn Debug) {
        if self.enabled(LogEvent::Epic) {
            tracing::debug!(target: TARGET, path, action = ?action, "epic emitted action");
        }
    }

    pub(crate) fn compute(&self, path: &str, keys: &[&str]) {
        if self.enabled(LogEvent::Compute) {
            tracing::trace!(target: TARGET, path, ?keys, "computed");
        }
    }

    pub(crate) fn loading(&self, path: &str, keys: &[&str]) {
        if self.enabled(LogEvent::Loading) {
            tracing::trace!(target: TARGET, path, ?keys, "loading");
        }
    }

    pub(crate) fn loaded(&self, path: &str, key: &str, ok: bool) {
        if self.enabled(LogEvent::Loaded) {
            tracing::debug!(target: TARGET, path, key, ok, "loader settled");
        }
    }

    pub(crate) fn error(&self, path: &str, context: &str, error: &dyn std::fmt::Display) {
        if self.enabled(LogEvent::Error) {
            tracing::error!(target: TARGET, path, context, %error, "store error");
        }
    }

    /// Warnings are not switchable: they flag API misuse.
    pub(crate) fn warn(&self, path: &str, message: &str) {
        tracing::warn!(target: TARGET, path, "{}", message);
    }
}
