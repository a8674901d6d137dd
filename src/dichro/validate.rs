//! Consistency checks on sealed windows.
//!
//! A window passes when it holds exactly the configured number of events, every
//! event references one descriptor and that descriptor declares all three
//! configured channels. Only a [`ValidatedWindow`] can reach the transform.

use crate::config::ChannelKeys;
use crate::dichro::window::Window;
use crate::error::WindowError;
use crate::experiment::DescriptorDoc;

/// A window that passed [`ConsistencyValidator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedWindow {
    window: Window,
}

impl ValidatedWindow {
    /// The checked window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Give the window back.
    pub fn into_inner(self) -> Window {
        self.window
    }
}

/// Gatekeeper between the windower and the transform.
#[derive(Debug, Clone)]
pub struct ConsistencyValidator {
    channels: ChannelKeys,
    window_size: usize,
}

impl ConsistencyValidator {
    /// Check windows of `window_size` events for the given channels.
    pub fn new(channels: ChannelKeys, window_size: usize) -> Self {
        Self {
            channels,
            window_size,
        }
    }

    /// Validate `window` against the descriptor returned by `lookup`.
    ///
    /// `lookup` is called with the shared descriptor id once the size and
    /// mismatch checks have passed. An unknown descriptor declares no keys.
    pub fn validate<'d, F>(&self, window: Window, lookup: F) -> Result<ValidatedWindow, WindowError>
    where
        F: FnOnce(&str) -> Option<&'d DescriptorDoc>,
    {
        if window.len() != self.window_size {
            return Err(WindowError::WrongWindowSize {
                expected: self.window_size,
                actual: window.len(),
            });
        }

        let descriptor_ids = window.descriptor_ids();
        if descriptor_ids.len() > 1 {
            return Err(WindowError::DescriptorMismatch { descriptor_ids });
        }

        let descriptor_uid = window.descriptor_uid().to_string();
        let descriptor = lookup(&descriptor_uid);
        let missing: Vec<String> = self
            .channels
            .iter()
            .map(|(_, key)| key)
            .filter(|key| descriptor.map_or(true, |d| !d.data_keys.contains_key(*key)))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(WindowError::MissingDataKey {
                descriptor_uid,
                keys: missing,
            });
        }

        Ok(ValidatedWindow { window })
    }
}
