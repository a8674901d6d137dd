//! Pipeline configuration using Figment
//!
//! A [`DichroConfig`] is supplied once at pipeline construction and never mutated
//! afterwards. Pipelines hold it behind an `Arc` so a router, a pipeline and the
//! replay binary can share one value.
//!
//! Configuration is layered (lowest to highest precedence):
//! 1. Built-in defaults
//! 2. An optional TOML file with top-level keys
//! 3. Environment variables prefixed with `DICHRO_`
//!
//! ```text
//! DICHRO_WINDOW_SIZE=8
//! DICHRO_TRANSMISSION_MODE=false
//! DICHRO_DETECTOR_KEY=fluo
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dichro_daq::config::DichroConfig;
//!
//! let config = DichroConfig::load_from("config/dichro.toml")?;
//! println!("window size: {}", config.window_size);
//! # Ok::<(), dichro_daq::config::ConfigError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Number of events in one polarization-switching cycle.
pub const POLARIZATION_CYCLE: usize = 4;
/// Derived XAS field. Reserved; no channel may use it.
pub const XAS_KEY: &str = "xas";
/// Derived XMCD field. Reserved; no channel may use it.
pub const XMCD_KEY: &str = "xmcd";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed or a value has the wrong type
    #[error("Configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// Values loaded but are inconsistent
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Immutable settings for one dichroism pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DichroConfig {
    /// Events per window
    pub window_size: usize,
    /// Field name of the scanned positioner (e.g. the monochromator energy)
    pub positioner_key: String,
    /// Field name of the incident-flux monitor channel
    pub monitor_key: String,
    /// Field name of the detector channel
    pub detector_key: String,
    /// `true` for `ln(monitor/detector)`, `false` for `detector/monitor`
    pub transmission_mode: bool,
    /// Only events from descriptors with this stream name are windowed
    pub primary_stream: String,
    /// `scan_type` hint value marking a run for plot routing
    pub scan_type_tag: String,
}

impl Default for DichroConfig {
    fn default() -> Self {
        Self {
            window_size: POLARIZATION_CYCLE,
            positioner_key: "energy".to_string(),
            monitor_key: "monitor".to_string(),
            detector_key: "detector".to_string(),
            transmission_mode: true,
            primary_stream: "primary".to_string(),
            scan_type_tag: "dichro".to_string(),
        }
    }
}

impl DichroConfig {
    /// Load configuration from defaults and `DICHRO_` environment variables only.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment(None))
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::extract(Self::figment(Some(path.as_ref())))
    }

    /// Defaults, then the optional file, then the environment.
    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("DICHRO_"))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Window size is a positive multiple of the four-point polarization cycle
    /// - Channel keys are non-empty and distinct
    /// - Stream name and scan-type tag are non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size % POLARIZATION_CYCLE != 0 {
            return Err(ConfigError::Validation(format!(
                "Invalid window_size {}. Must be a positive multiple of {}",
                self.window_size, POLARIZATION_CYCLE
            )));
        }

        let keys = [
            ("positioner_key", &self.positioner_key),
            ("monitor_key", &self.monitor_key),
            ("detector_key", &self.detector_key),
        ];
        for (name, value) in keys {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "'{}' cannot be empty",
                    name
                )));
            }
        }
        let mut seen: std::collections::HashSet<&str> = [XAS_KEY, XMCD_KEY].into();
        for (name, value) in keys {
            if !seen.insert(value.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate or reserved channel key '{}' for '{}'",
                    value, name
                )));
            }
        }

        if self.primary_stream.is_empty() {
            return Err(ConfigError::Validation(
                "'primary_stream' cannot be empty".to_string(),
            ));
        }
        if self.scan_type_tag.is_empty() {
            return Err(ConfigError::Validation(
                "'scan_type_tag' cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the configured channel names into a typed lookup table.
    pub fn channels(&self) -> ChannelKeys {
        ChannelKeys {
            keys: [
                self.positioner_key.clone(),
                self.monitor_key.clone(),
                self.detector_key.clone(),
            ],
        }
    }
}

/// Role of a data key inside the dichroism transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Scanned positioner, averaged per window
    Positioner,
    /// Incident-flux monitor
    Monitor,
    /// Transmitted or fluorescence signal
    Detector,
}

impl Channel {
    /// All channels in accessor order.
    pub const ALL: [Channel; 3] = [Channel::Positioner, Channel::Monitor, Channel::Detector];

    fn index(self) -> usize {
        match self {
            Channel::Positioner => 0,
            Channel::Monitor => 1,
            Channel::Detector => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Positioner => "positioner",
            Channel::Monitor => "monitor",
            Channel::Detector => "detector",
        })
    }
}

/// Channel names resolved once from a [`DichroConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKeys {
    keys: [String; 3],
}

impl ChannelKeys {
    /// Data key name for a channel.
    pub fn key(&self, channel: Channel) -> &str {
        &self.keys[channel.index()]
    }

    /// `(channel, key)` pairs in accessor order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &str)> {
        Channel::ALL.into_iter().map(move |c| (c, self.key(c)))
    }
}
