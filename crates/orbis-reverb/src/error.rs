//! Error types for the reverb pipeline.

use orbis_core::{ProcessError, SignalFlowError};
use orbis_objects::ObjectId;
use orbis_panning::PanningError;
use thiserror::Error;

/// Errors raised by the reverb parameter and filter calculators.
#[derive(Debug, Error)]
pub enum ReverbError {
    /// More reverb objects than render channels.
    #[error("{found} reverb objects exceed the maximum of {max}")]
    TooManyObjects {
        /// Number of reverb objects in the scene.
        found: usize,
        /// Number of render channels.
        max: usize,
    },

    /// An object declares more discrete reflections than configured.
    #[error("object {id}: {found} discrete reflections exceed the maximum of {max}")]
    TooManyReflections {
        /// Object id.
        id: ObjectId,
        /// Declared reflections.
        found: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A reflection filter has more sections than configured.
    #[error("object {id}: {found} reflection filter sections exceed the maximum of {max}")]
    TooManySections {
        /// Object id.
        id: ObjectId,
        /// Declared sections.
        found: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The subband count does not match the octave filter bank.
    #[error("late reverberation needs {expected} subbands, found {found}")]
    SubbandCount {
        /// Bands of the filter bank.
        expected: usize,
        /// Requested bands.
        found: usize,
    },

    /// The onset delay plus attack time do not fit into the filter.
    #[error("late reverberation envelope needs {needed} samples but the filter has {length}")]
    EnvelopeTooLong {
        /// Samples covered by delay and attack.
        needed: usize,
        /// Filter length in samples.
        length: usize,
    },

    /// A render channel index exceeds the configured channels.
    #[error("render channel {index} out of range (limit {limit})")]
    ChannelOutOfRange {
        /// Requested channel.
        index: usize,
        /// Number of channels.
        limit: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid reverb configuration: {0}")]
    InvalidConfig(String),

    /// Panning setup for the discrete reflections failed.
    #[error("reflection panning: {0}")]
    Panning(#[from] PanningError),

    /// Declaring the component's ports failed.
    #[error(transparent)]
    SignalFlow(#[from] SignalFlowError),
}

impl From<ReverbError> for ProcessError {
    fn from(e: ReverbError) -> Self {
        ProcessError::Component(e.to_string())
    }
}

/// Convenience alias for reverb results.
pub type Result<T> = std::result::Result<T, ReverbError>;
