//! cpal-based audio backend (ALSA, CoreAudio, WASAPI).

use crate::backend::{
    AudioBackend, CaptureCallback, PlaybackCallback, StreamDirection, StreamErrorCallback,
    StreamGuard, StreamRequest,
};
use crate::device::device_name;
use crate::{AudioDevice, Error, Result};
use cpal::Host;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Streams on the platform's default cpal host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Backend on the default host.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::info!(host = host.id().name(), "cpal backend initialized");
        Self { host }
    }

    fn device(&self, filter: Option<&str>, direction: StreamDirection) -> Result<cpal::Device> {
        let Some(filter) = filter else {
            return match direction {
                StreamDirection::Capture => self.host.default_input_device(),
                StreamDirection::Playback => self.host.default_output_device(),
            }
            .ok_or(Error::NoDevice);
        };

        let needle = filter.to_lowercase();
        let candidates: Vec<cpal::Device> = match direction {
            StreamDirection::Capture => self.host.input_devices().map(Iterator::collect),
            StreamDirection::Playback => self.host.output_devices().map(Iterator::collect),
        }
        .map_err(|e| Error::Stream(e.to_string()))?;
        candidates
            .into_iter()
            .find(|d| device_name(d).is_ok_and(|n| n.to_lowercase().contains(&needle)))
            .ok_or_else(|| {
                Error::DeviceNotFound(format!(
                    "no {} device matching '{filter}'",
                    direction.label()
                ))
            })
    }

    fn config(request: &StreamRequest) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: request.channels,
            sample_rate: request.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(request.frames_per_buffer),
        }
    }

    fn started(
        stream: cpal::Stream,
        request: &StreamRequest,
        direction: StreamDirection,
    ) -> Result<StreamGuard> {
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            direction = direction.label(),
            channels = request.channels,
            sample_rate = request.sample_rate,
            frames = request.frames_per_buffer,
            "stream started"
        );
        Ok(StreamGuard::new(stream))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn devices(&self) -> Result<Vec<AudioDevice>> {
        crate::device::list_devices()
    }

    fn default_device(&self, direction: StreamDirection) -> Result<Option<AudioDevice>> {
        let (capture, playback) = crate::device::default_device()?;
        Ok(match direction {
            StreamDirection::Capture => capture,
            StreamDirection::Playback => playback,
        })
    }

    fn open_playback(
        &self,
        request: &StreamRequest,
        mut fill: PlaybackCallback,
        mut on_error: StreamErrorCallback,
    ) -> Result<StreamGuard> {
        let device = self.device(request.device.as_deref(), StreamDirection::Playback)?;
        let stream = device
            .build_output_stream(
                &Self::config(request),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| fill(data),
                move |err| on_error(&err.to_string()),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        Self::started(stream, request, StreamDirection::Playback)
    }

    fn open_capture(
        &self,
        request: &StreamRequest,
        mut consume: CaptureCallback,
        mut on_error: StreamErrorCallback,
    ) -> Result<StreamGuard> {
        let device = self.device(request.device.as_deref(), StreamDirection::Capture)?;
        let stream = device
            .build_input_stream(
                &Self::config(request),
                move |data: &[f32], _: &cpal::InputCallbackInfo| consume(data),
                move |err| on_error(&err.to_string()),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        Self::started(stream, request, StreamDirection::Capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_listing_does_not_fail() {
        // Availability depends on the machine.
        assert!(CpalBackend::new().devices().is_ok());
    }

    #[test]
    fn requests_map_to_fixed_buffers() {
        let config = CpalBackend::config(&StreamRequest::new(44100, 128, 6));
        assert_eq!(config.channels, 6);
        assert_eq!(config.sample_rate, 44100);
        assert!(matches!(config.buffer_size, cpal::BufferSize::Fixed(128)));
    }
}
