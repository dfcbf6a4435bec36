//! Store configuration.
//!
//! Only diagnostics are configurable; nothing here changes how state
//! propagates. The serializable part can be loaded from TOML or JSON:
//!
//! ```toml
//! [logger]
//! update = false
//! loaded = false
//! ```

use crate::error::StoreError;
use crate::logger::LogEvent;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

/// Which log events are emitted. Every event is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerOptions {
    /// Dispatched actions
    pub message: bool,
    /// Tree updates produced by handlers
    pub update: bool,
    /// Actions emitted by epics
    pub epic: bool,
    /// Computed values
    pub compute: bool,
    /// Loaders started
    pub loading: bool,
    /// Loaders settled
    pub loaded: bool,
    /// Updater and epic failures
    pub error: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            message: true,
            update: true,
            epic: true,
            compute: true,
            loading: true,
            loaded: true,
            error: true,
        }
    }
}

impl LoggerOptions {
    /// Options that disable every event.
    pub fn silent() -> Self {
        Self {
            message: false,
            update: false,
            epic: false,
            compute: false,
            loading: false,
            loaded: false,
            error: false,
        }
    }

    /// Whether `event` is emitted.
    pub fn enabled(&self, event: LogEvent) -> bool {
        match event {
            LogEvent::Message => self.message,
            LogEvent::Update => self.update,
            LogEvent::Epic => self.epic,
            LogEvent::Compute => self.compute,
            LogEvent::Loading => self.loading,
            LogEvent::Loaded => self.loaded,
            LogEvent::Error => self.error,
        }
    }

    /// Same options with `event` switched on or off.
    pub fn with(mut self, event: LogEvent, on: bool) -> Self {
        let flag = match event {
            LogEvent::Message => &mut self.message,
            LogEvent::Update => &mut self.update,
            LogEvent::Epic => &mut self.epic,
            LogEvent::Compute => &mut self.compute,
            LogEvent::Loading => &mut self.loading,
            LogEvent::Loaded => &mut self.loaded,
            LogEvent::Error => &mut self.error,
        };
        *flag = on;
        self
    }
}

/// Serializable part of [`StoreConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Log event switches
    pub logger: LoggerOptions,
}

/// Configuration for [`create_store`](crate::create_store).
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Log event switches
    pub logger: LoggerOptions,
    /// Runtime for loaders, input streams and epics. Falls back to the
    /// ambient runtime when unset.
    pub runtime: Option<Handle>,
}

impl StoreConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with logging disabled.
    pub fn silent() -> Self {
        Self::new().with_logger(LoggerOptions::silent())
    }

    /// Set the logger options.
    pub fn with_logger(mut self, logger: LoggerOptions) -> Self {
        self.logger = logger;
        self
    }

    /// Set the runtime used for asynchronous work.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build from deserialized settings.
    pub fn from_settings(settings: StoreSettings) -> Self {
        Self::new().with_logger(settings.logger)
    }

    /// Parse settings from TOML.
    pub fn from_toml_str(source: &str) -> Result<Self, StoreError> {
        let settings: StoreSettings = toml::from_str(source)
            .map_err(|e| StoreError::invalid(format!("Invalid TOML config: {}", e)))?;
        let config = Self::from_settings(settings);
        config.validate()?;
        Ok(config)
    }

    /// Parse settings from a JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, StoreError> {
        if !value.is_object() {
            return Err(StoreError::invalid("Configuration must be a JSON object"));
        }
        let settings: StoreSettings = serde_json::from_value(value)
            .map_err(|e| StoreError::invalid(format!("Invalid JSON config: {}", e)))?;
        let config = Self::from_settings(settings);
        config.validate()?;
        Ok(config)
    }

    /// The serializable part of this configuration.
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            logger: self.logger,
        }
    }

    /// Validate the configuration. Every combination of log switches is
    /// valid, so this only fails for settings added later.
    pub fn validate(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let options = LoggerOptions::default();
        assert!(options.enabled(LogEvent::Message));
        assert!(options.enabled(LogEvent::Error));
    }

    #[test]
    fn test_silent_disables_everything() {
        let options = LoggerOptions::silent();
        for event in LogEvent::ALL {
            assert!(!options.enabled(event));
        }
        assert!(options.with(LogEvent::Error, true).enabled(LogEvent::Error));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = StoreConfig::from_toml_str(
            r#"
            [logger]
            update = false
            loaded = false
            "#,
        )
        .unwrap();
        assert!(!config.logger.update);
        assert!(!config.logger.loaded);
        assert!(config.logger.message);
        assert!(config.runtime.is_none());
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let err = StoreConfig::from_toml_str("[logger]\nupdate = 3").unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
    }

    #[test]
    fn test_from_json_value() {
        let config =
            StoreConfig::from_json_value(serde_json::json!({ "logger": { "error": false } }))
                .unwrap();
        assert!(!config.logger.error);
        assert!(StoreConfig::from_json_value(serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_settings_roundtrip_through_toml() {
        let settings = StoreConfig::silent().settings();
        let text = toml::to_string(&settings).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap().settings(), settings);
    }
}
