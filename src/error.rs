//! Custom error types for the dichroism pipeline.
//!
//! This module defines the primary error type, `DichroError`, together with the
//! per-window failure type `WindowError`. Using the `thiserror` crate, it provides
//! a consistent way to report problems from configuration loading through to the
//! transform of a single window.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps [`ConfigError`], raised while loading or validating the
//!   pipeline configuration. These happen once, at construction.
//! - **`Window`**: Wraps [`WindowError`]. A window error aborts only the window that
//!   produced it; the run and the pipeline keep going.
//! - **`Io`** / **`Json`** / **`Encode`**: Raised by [`crate::replay`] when reading
//!   document lines or writing results.
//!
//! `WindowError` is returned as a typed value from the validator and transform,
//! so callers decide whether to continue without unwinding.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DichroError>;

/// Top-level error of the crate.
#[derive(Error, Debug)]
pub enum DichroError {
    /// Loading or validating configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A window was rejected
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input line is not a valid document
    #[error("Malformed document on line {line}: {source}")]
    Json {
        /// 1-based line number
        line: usize,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Serializing output failed
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reason a sealed window was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    /// The window does not hold exactly the configured number of events.
    #[error("window holds {actual} events, expected {expected}")]
    WrongWindowSize {
        /// Configured window size
        expected: usize,
        /// Events in the rejected window
        actual: usize,
    },

    /// Events in one window reference more than one descriptor.
    #[error("window events reference multiple descriptors: {descriptor_ids:?}")]
    DescriptorMismatch {
        /// Every distinct descriptor uid in the window
        descriptor_ids: BTreeSet<String>,
    },

    /// The shared descriptor does not declare every configured channel.
    #[error("descriptor {descriptor_uid} is missing data keys: {keys:?}")]
    MissingDataKey {
        /// Descriptor the window references
        descriptor_uid: String,
        /// Configured keys it does not declare
        keys: Vec<String>,
    },

    /// An event lacks a value the descriptor promised.
    #[error("event {index} in window has no reading for '{key}'")]
    MissingReading {
        /// Data key
        key: String,
        /// Position of the event in the window
        index: usize,
    },

    /// The transform only accepts scalar readings.
    #[error("event {index} in window has a non-scalar reading for '{key}'")]
    NonScalarReading {
        /// Data key
        key: String,
        /// Position of the event in the window
        index: usize,
    },

    /// A monitor or detector reading cannot enter the absorption formula.
    #[error("invalid {channel} reading {value} at event {index}")]
    InvalidReading {
        /// Channel role, e.g. `detector`
        channel: String,
        /// Position of the event in the window
        index: usize,
        /// Offending value
        value: f64,
    },
}

/// Payload-free discriminant of [`WindowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowErrorKind {
    /// [`WindowError::WrongWindowSize`]
    WrongWindowSize,
    /// [`WindowError::DescriptorMismatch`]
    DescriptorMismatch,
    /// [`WindowError::MissingDataKey`]
    MissingDataKey,
    /// [`WindowError::MissingReading`]
    MissingReading,
    /// [`WindowError::NonScalarReading`]
    NonScalarReading,
    /// [`WindowError::InvalidReading`]
    InvalidReading,
}

impl WindowError {
    /// Get the error kind.
    pub fn kind(&self) -> WindowErrorKind {
        match self {
            WindowError::WrongWindowSize { .. } => WindowErrorKind::WrongWindowSize,
            WindowError::DescriptorMismatch { .. } => WindowErrorKind::DescriptorMismatch,
            WindowError::MissingDataKey { .. } => WindowErrorKind::MissingDataKey,
            WindowError::MissingReading { .. } => WindowErrorKind::MissingReading,
            WindowError::NonScalarReading { .. } => WindowErrorKind::NonScalarReading,
            WindowError::InvalidReading { .. } => WindowErrorKind::InvalidReading,
        }
    }

    /// Whether the error will recur for every window of the same descriptor.
    ///
    /// Misconfiguration errors are logged at error level by the pipeline.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, WindowError::MissingDataKey { .. })
    }
}

impl fmt::Display for WindowErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WindowErrorKind::WrongWindowSize => "wrong_window_size",
            WindowErrorKind::DescriptorMismatch => "descriptor_mismatch",
            WindowErrorKind::MissingDataKey => "missing_data_key",
            WindowErrorKind::MissingReading => "missing_reading",
            WindowErrorKind::NonScalarReading => "non_scalar_reading",
            WindowErrorKind::InvalidReading => "invalid_reading",
        };
        f.write_str(name)
    }
}
