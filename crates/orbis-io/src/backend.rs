//! Audio backend abstraction.
//!
//! A realtime renderer needs two streams: capture delivering the object
//! signals and playback consuming the loudspeaker feeds. [`AudioBackend`]
//! opens them from boxed callbacks, so the trait stays object-safe and
//! tests can drive the callbacks themselves. [`CpalBackend`](crate::CpalBackend)
//! is the platform implementation.

use crate::{AudioDevice, Result};

/// Which side of the renderer a stream serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDirection {
    /// Object signals from an input device.
    Capture,
    /// Loudspeaker signals to an output device.
    Playback,
}

impl StreamDirection {
    /// Lower-case name for messages.
    pub fn label(self) -> &'static str {
        match self {
            StreamDirection::Capture => "capture",
            StreamDirection::Playback => "playback",
        }
    }
}

/// Shape of a stream to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per hardware buffer.
    pub frames_per_buffer: u32,
    /// Interleaved channels.
    pub channels: u16,
    /// Device name filter (substring, case-insensitive); the default device if `None`.
    pub device: Option<String>,
}

impl StreamRequest {
    /// Request on the default device.
    pub fn new(sample_rate: u32, frames_per_buffer: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            frames_per_buffer,
            channels,
            device: None,
        }
    }

    /// Selects a device by name filter.
    pub fn on_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }
}

/// Keeps an opened stream running; dropping it stops the stream.
pub struct StreamGuard {
    _stream: Box<dyn Send>,
}

impl StreamGuard {
    /// Holds a backend-specific stream object.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _stream: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamGuard")
    }
}

/// Fills an interleaved playback buffer (`frames * channels` samples).
///
/// Runs on the audio thread; must not allocate, block or do I/O.
pub type PlaybackCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Receives an interleaved capture buffer.
pub type CaptureCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Receives asynchronous stream errors.
pub type StreamErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Source of capture and playback streams.
pub trait AudioBackend: Send {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// All devices the backend can open.
    fn devices(&self) -> Result<Vec<AudioDevice>>;

    /// Device used when a request names none.
    fn default_device(&self, direction: StreamDirection) -> Result<Option<AudioDevice>>;

    /// Opens and starts a playback stream.
    fn open_playback(
        &self,
        request: &StreamRequest,
        fill: PlaybackCallback,
        on_error: StreamErrorCallback,
    ) -> Result<StreamGuard>;

    /// Opens and starts a capture stream.
    fn open_capture(
        &self,
        request: &StreamRequest,
        consume: CaptureCallback,
        on_error: StreamErrorCallback,
    ) -> Result<StreamGuard>;
}
