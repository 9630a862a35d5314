//! Audio device enumeration via cpal.

use crate::Result;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Channels of the default configuration (output if available).
    pub channels: u16,
}

/// List all available audio devices.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device_name(&device) {
                let input = device.default_input_config().ok();
                let output = device.default_output_config().ok();
                devices.push(AudioDevice {
                    name,
                    is_input: true,
                    is_output: output.is_some(),
                    default_sample_rate: input.as_ref().map_or(48000, |c| c.sample_rate()),
                    channels: output
                        .as_ref()
                        .or(input.as_ref())
                        .map_or(0, |c| c.channels()),
                });
            }
        }
    }

    // Output-only devices
    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device_name(&device) {
                if devices.iter().any(|d| d.name == name) {
                    continue;
                }
                let config = device.default_output_config().ok();
                devices.push(AudioDevice {
                    name,
                    is_input: false,
                    is_output: true,
                    default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
                    channels: config.as_ref().map_or(0, |c| c.channels()),
                });
            }
        }
    }

    Ok(devices)
}

/// Get the default input and output device info.
pub fn default_device() -> Result<(Option<AudioDevice>, Option<AudioDevice>)> {
    let host = cpal::default_host();

    let input = host.default_input_device().and_then(|d| {
        device_name(&d).ok().map(|name| {
            let config = d.default_input_config().ok();
            AudioDevice {
                name,
                is_input: true,
                is_output: false,
                default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
                channels: config.as_ref().map_or(0, |c| c.channels()),
            }
        })
    });

    let output = host.default_output_device().and_then(|d| {
        device_name(&d).ok().map(|name| {
            let config = d.default_output_config().ok();
            AudioDevice {
                name,
                is_input: false,
                is_output: true,
                default_sample_rate: config.as_ref().map_or(48000, |c| c.sample_rate()),
                channels: config.as_ref().map_or(0, |c| c.channels()),
            }
        })
    });

    Ok((input, output))
}
