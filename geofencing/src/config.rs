//! Geofence configuration.
//!
//! Every managed geofence is built from the same radius, expiration and
//! transition settings. The defaults below are what the manager uses unless a
//! host overrides them, either in code through the `with_*` setters or from the
//! `[geofence]` section of an INI file:
//!
//! ```ini
//! [geofence]
//! radius_meters = 50
//! expiration_hours = 72
//! transitions = enter, exit
//! initial_trigger = enter
//! ```

use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::geofence::{InitialTrigger, Transition, TransitionMask};

/// Radius of every geofence, in meters.
pub const GEOFENCE_RADIUS_IN_METERS: f32 = 50.0;

/// Lifetime of a registered geofence before the backend drops it, in hours.
pub const GEOFENCE_EXPIRATION_IN_HOURS: u64 = 72;

/// [`GEOFENCE_EXPIRATION_IN_HOURS`] in milliseconds, the unit the backend expects.
pub const GEOFENCE_EXPIRATION_IN_MILLISECONDS: u64 = GEOFENCE_EXPIRATION_IN_HOURS * 60 * 60 * 1000;

/// Transitions every geofence reports.
pub const DEFAULT_TRANSITIONS: TransitionMask = TransitionMask::ENTER_EXIT;

/// Initial trigger policy of every registration request.
pub const DEFAULT_INITIAL_TRIGGER: InitialTrigger = InitialTrigger::Enter;

/// INI section holding geofence settings.
pub const CONFIG_SECTION: &str = "geofence";

/// Errors from building or loading a [`GeofenceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid radius: {0} meters (must be positive and finite)")]
    InvalidRadius(f32),

    #[error("Invalid expiration: must be at least one millisecond")]
    InvalidExpiration,

    #[error("Transition mask must contain at least one transition")]
    EmptyTransitions,

    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings applied to every geofence the manager builds.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceConfig {
    /// Region radius in meters.
    pub radius_meters: f32,

    /// Time after which the backend removes the region on its own.
    pub expiration: Duration,

    /// Transitions each region reports.
    pub transitions: TransitionMask,

    /// Trigger applied when a region is added while already satisfied.
    pub initial_trigger: InitialTrigger,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            radius_meters: GEOFENCE_RADIUS_IN_METERS,
            expiration: Duration::from_millis(GEOFENCE_EXPIRATION_IN_MILLISECONDS),
            transitions: DEFAULT_TRANSITIONS,
            initial_trigger: DEFAULT_INITIAL_TRIGGER,
        }
    }
}

impl GeofenceConfig {
    /// Set the region radius.
    pub fn with_radius_meters(mut self, radius_meters: f32) -> Self {
        self.radius_meters = radius_meters;
        self
    }

    /// Set the region expiration.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Set the reported transitions.
    pub fn with_transitions(mut self, transitions: TransitionMask) -> Self {
        self.transitions = transitions;
        self
    }

    /// Set the initial trigger policy.
    pub fn with_initial_trigger(mut self, initial_trigger: InitialTrigger) -> Self {
        self.initial_trigger = initial_trigger;
        self
    }

    /// Expiration in milliseconds, saturating at `u64::MAX`.
    pub fn expiration_millis(&self) -> u64 {
        u64::try_from(self.expiration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Check that the settings are acceptable to the backend.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius_meters));
        }
        if self.expiration_millis() == 0 {
            return Err(ConfigError::InvalidExpiration);
        }
        if self.transitions.is_empty() {
            return Err(ConfigError::EmptyTransitions);
        }
        Ok(())
    }

    /// Parse settings from INI text. Keys missing from the `[geofence]`
    /// section keep their defaults.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    /// Load settings from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ini_str(&content)?;
        tracing::debug!(path = %path.display(), ?config, "Loaded geofence config");
        Ok(config)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(section) = ini.section(Some(CONFIG_SECTION)) else {
            return Ok(config);
        };

        if let Some(value) = section.get("radius_meters") {
            config.radius_meters = value
                .trim()
                .parse()
                .map_err(|_| invalid_value("radius_meters", value))?;
        }

        if let Some(value) = section.get("expiration_hours") {
            let hours: u64 = value
                .trim()
                .parse()
                .map_err(|_| invalid_value("expiration_hours", value))?;
            config.expiration = Duration::from_secs(hours.saturating_mul(60 * 60));
        }

        if let Some(value) = section.get("transitions") {
            let mut mask = TransitionMask::EMPTY;
            for name in value.split(',').filter(|s| !s.trim().is_empty()) {
                let transition =
                    Transition::parse(name).ok_or_else(|| invalid_value("transitions", value))?;
                mask = mask.with(transition);
            }
            config.transitions = mask;
        }

        if let Some(value) = section.get("initial_trigger") {
            config.initial_trigger = InitialTrigger::parse(value)
                .ok_or_else(|| invalid_value("initial_trigger", value))?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn invalid_value(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
