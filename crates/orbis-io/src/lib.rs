//! Audio I/O layer for the orbis object renderer.
//!
//! This crate provides:
//!
//! - **Backends**: the [`AudioBackend`] trait and its cpal implementation
//!   [`CpalBackend`]
//! - **Block adaptation**: [`BlockAdapter`] turns hardware buffers of any
//!   size into the fixed-period planar blocks an
//!   [`AudioSignalFlow`](orbis_core::AudioSignalFlow) expects
//! - **Realtime rendering**: [`DuplexStream`] runs a flow between a capture
//!   and a playback stream
//! - **WAV files**: multichannel [`read_wav`] / [`write_wav`], filter
//!   matrices via [`load_filter_matrix`] and [`render_offline`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orbis_io::render_offline;
//!
//! let mut flow = AudioSignalFlow::new(renderer, &registry)?;
//! let report = render_offline(&mut flow, "objects.wav", "speakers.wav")?;
//! println!("rendered {} frames", report.frames);
//! ```

pub mod backend;
mod block;
pub mod cpal_backend;
mod device;
mod offline;
mod stream;
mod wav;

pub use backend::{
    AudioBackend, CaptureCallback, PlaybackCallback, StreamDirection, StreamErrorCallback,
    StreamGuard, StreamRequest,
};
pub use block::BlockAdapter;
pub use cpal_backend::CpalBackend;
pub use device::{AudioDevice, default_device, list_devices};
pub use offline::{OfflineReport, render_offline};
pub use stream::{CaptureQueue, DuplexConfig, DuplexStream, StreamStats};
pub use wav::{
    PlanarSamples, WavInfo, WavSpec, load_filter_matrix, read_wav, read_wav_info, write_wav,
};

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A file's channel count does not fit the signal flow.
    #[error("{what} has {found} channels, the signal flow expects {expected}")]
    ChannelMismatch {
        /// Which buffer or file mismatched.
        what: &'static str,
        /// Channels the flow needs.
        expected: usize,
        /// Channels provided.
        found: usize,
    },

    /// The signal flow rejected a block.
    #[error("rendering failed: {0}")]
    Render(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
