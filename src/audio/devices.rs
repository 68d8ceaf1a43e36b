//! Audio device enumeration with typed descriptors.

use crate::error::{DeviceKind, HarnessError, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::debug;

/// What the harness needs to know about an audio device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub input_channel_count: u16,
    pub output_channel_count: u16,
}

impl AudioDeviceInfo {
    pub fn new(name: impl Into<String>, input_channel_count: u16, output_channel_count: u16) -> Self {
        Self {
            name: name.into(),
            input_channel_count,
            output_channel_count,
        }
    }

    pub fn is_input(&self) -> bool {
        self.input_channel_count > 0
    }
}

pub(super) fn describe(device: &cpal::Device) -> AudioDeviceInfo {
    let name = device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string());
    let input_channel_count = device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);
    let output_channel_count = device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);
    AudioDeviceInfo {
        name,
        input_channel_count,
        output_channel_count,
    }
}

/// Every device the default host reports, input or output.
pub fn list_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let devices = host.devices().map_err(|err| HarnessError::ConnectionError {
        kind: DeviceKind::AudioInput,
        device: host.id().name().to_string(),
        reason: err.to_string(),
    })?;
    Ok(devices.map(|device| describe(&device)).collect())
}

/// First input-capable device whose name contains `name_hint` and which
/// exposes at least `min_channels` inputs.
pub fn select_device<'a>(
    devices: &'a [AudioDeviceInfo],
    name_hint: &str,
    min_channels: u16,
) -> Option<&'a AudioDeviceInfo> {
    select_device_index(devices, name_hint, min_channels).map(|index| &devices[index])
}

/// Position of the device `select_device` would pick. Names are not unique,
/// so callers holding a parallel list of handles index it with this.
pub fn select_device_index(devices: &[AudioDeviceInfo], name_hint: &str, min_channels: u16) -> Option<usize> {
    let picked = devices.iter().position(|device| {
        device.is_input()
            && device.name.contains(name_hint)
            && device.input_channel_count >= min_channels
    });
    debug!(
        hint = name_hint,
        min_channels,
        picked = ?picked,
        "audio device selection"
    );
    picked
}

pub(super) fn not_found(name_hint: &str, min_channels: u16) -> HarnessError {
    HarnessError::DeviceNotFound {
        kind: DeviceKind::AudioInput,
        filter: name_hint.to_string(),
        requirement: format!(" with at least {min_channels} input channels"),
    }
}
