//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `roomctl.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use roomctl_app::engine::EngineSettings;
use roomctl_domain::presence::NightWindow;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine tunables.
    pub engine: EngineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Event bus settings.
    pub events: EventsConfig,
}

/// Engine tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// First hour of the day (`0..24`).
    pub day_start_hour: u32,
    /// First hour of the night (`0..24`); debounce durations double at night.
    pub night_start_hour: u32,
    /// How long an indicator flash stays lit, in milliseconds.
    pub flash_ms: u64,
    /// A scene younger than this keeps the room occupied, in seconds.
    pub recent_activity_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Event bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity.
    pub capacity: usize,
}

impl Config {
    /// Load configuration from `roomctl.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("roomctl.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROOMCTL_DAY_START")
            && let Ok(hour) = val.parse()
        {
            self.engine.day_start_hour = hour;
        }
        if let Ok(val) = std::env::var("ROOMCTL_NIGHT_START")
            && let Ok(hour) = val.parse()
        {
            self.engine.night_start_hour = hour;
        }
        if let Ok(val) = std::env::var("ROOMCTL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.day_start_hour >= 24 || self.engine.night_start_hour >= 24 {
            return Err(ConfigError::Validation(
                "day and night start hours must be below 24".to_string(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "event capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine settings derived from the `[engine]` section.
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            night: NightWindow {
                day_start: self.engine.day_start_hour,
                night_start: self.engine.night_start_hour,
            },
            flash: Duration::from_millis(self.engine.flash_ms),
            recent_activity: Duration::from_secs(self.engine.recent_activity_secs),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_start_hour: 6,
            night_start_hour: 22,
            flash_ms: 1000,
            recent_activity_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "roomctld=info,roomctl_app=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
