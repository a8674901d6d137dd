//! XAS/XMCD reduction of one validated window.
//!
//! Per-point absorption is `ln(monitor/detector)` in transmission mode and
//! `detector/monitor` otherwise. XAS is the mean absorption over the window.
//! XMCD weights each point by the polarization sequence `[+, -, -, +]`,
//! repeated for every four-point cycle, and divides by the window length.

use serde::{Deserialize, Serialize};

use crate::config::{Channel, ChannelKeys, POLARIZATION_CYCLE};
use crate::dichro::validate::ValidatedWindow;
use crate::error::WindowError;
use crate::experiment::EventDoc;

/// Reduced quantities for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedEvent {
    /// Run the source events belong to
    pub run_uid: String,
    /// Descriptor the source events reference
    pub descriptor_uid: String,
    /// Mean positioner reading over the window
    pub positioner_mean: f64,
    /// Mean absorption
    pub xas: f64,
    /// Polarization-weighted mean absorption
    pub xmcd: f64,
    /// Timestamp of the last event in the window
    pub time_ns: u64,
}

/// Sign of point `index` in the polarization-switching sequence.
pub fn polarization_sign(index: usize) -> f64 {
    match index % POLARIZATION_CYCLE {
        0 | 3 => 1.0,
        _ => -1.0,
    }
}

/// Window reducer for one channel mapping and absorption mode.
#[derive(Debug, Clone)]
pub struct DichroTransform {
    channels: ChannelKeys,
    transmission_mode: bool,
}

impl DichroTransform {
    /// `transmission_mode` selects `ln(monitor/detector)` over `detector/monitor`.
    pub fn new(channels: ChannelKeys, transmission_mode: bool) -> Self {
        Self {
            channels,
            transmission_mode,
        }
    }

    /// Compute the derived event for a validated window.
    ///
    /// Non-positive readings in transmission mode and a zero monitor in
    /// fluorescence mode are reported as [`WindowError::InvalidReading`]
    /// rather than producing non-finite values.
    pub fn apply(&self, validated: &ValidatedWindow) -> Result<DerivedEvent, WindowError> {
        let window = validated.window();
        let events = window.events();
        let n = events.len() as f64;

        let mut positioner_sum = 0.0;
        let mut xas_sum = 0.0;
        let mut xmcd_sum = 0.0;
        for (index, event) in events.iter().enumerate() {
            positioner_sum += self.reading(event, Channel::Positioner, index)?;
            let monitor = self.reading(event, Channel::Monitor, index)?;
            let detector = self.reading(event, Channel::Detector, index)?;
            let absorption = self.absorption(monitor, detector, index)?;
            xas_sum += absorption;
            xmcd_sum += polarization_sign(index) * absorption;
        }

        let last = &events[events.len() - 1];
        Ok(DerivedEvent {
            run_uid: window.run_uid().to_string(),
            descriptor_uid: window.descriptor_uid().to_string(),
            positioner_mean: positioner_sum / n,
            xas: xas_sum / n,
            xmcd: xmcd_sum / n,
            time_ns: last.time_ns,
        })
    }

    fn reading(&self, event: &EventDoc, channel: Channel, index: usize) -> Result<f64, WindowError> {
        let key = self.channels.key(channel);
        let value = event
            .data
            .get(key)
            .ok_or_else(|| WindowError::MissingReading {
                key: key.to_string(),
                index,
            })?
            .as_scalar()
            .ok_or_else(|| WindowError::NonScalarReading {
                key: key.to_string(),
                index,
            })?;
        if !value.is_finite() {
            return Err(invalid(channel, index, value));
        }
        Ok(value)
    }

    fn absorption(&self, monitor: f64, detector: f64, index: usize) -> Result<f64, WindowError> {
        if self.transmission_mode {
            if monitor <= 0.0 {
                return Err(invalid(Channel::Monitor, index, monitor));
            }
            if detector <= 0.0 {
                return Err(invalid(Channel::Detector, index, detector));
            }
            Ok((monitor / detector).ln())
        } else {
            if monitor == 0.0 {
                return Err(invalid(Channel::Monitor, index, monitor));
            }
            Ok(detector / monitor)
        }
    }
}

fn invalid(channel: Channel, index: usize, value: f64) -> WindowError {
    WindowError::InvalidReading {
        channel: channel.to_string(),
        index,
        value,
    }
}
