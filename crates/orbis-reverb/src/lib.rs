//! Orbis Reverb - parameter and filter calculation for reverb objects
//!
//! A reverb object is a point source carrying a room description: a set of
//! discrete reflections (position, delay, level, wall filter) and a late
//! tail given as per-octave envelopes. This crate turns those descriptions
//! into rendering parameters:
//!
//! - [`ObjectChannelAllocator`] - Sticky assignment of objects to render channels
//! - [`ReverbParameterCalculator`] - Routing, reflection gains, delays,
//!   filters and VBAP panning per render channel, plus late tail requests
//! - [`LateReverbFilterCalculator`] - Octave-band noise synthesis of late
//!   tail impulse responses, bounded per block
//!
//! Both calculators can be wrapped into atomic components with `component`.

pub mod allocator;
pub mod calculator;
pub mod error;
pub mod late;

pub use allocator::ObjectChannelAllocator;
pub use calculator::{LATE_REVERB_TOLERANCE, ReverbParameterCalculator, ReverbParameters};
pub use error::{Result, ReverbError};
pub use late::{
    DEFAULT_NOISE_SEED, LateReverbFilterCalculator, LateReverbRequest, OCTAVE_BAND_FILTERS,
    TRANSIENT_SAMPLES, create_envelope, filter_length,
};

use orbis_core::{Parameter, ParameterRegistry};

/// Adds the parameter types of this crate to a registry.
pub fn register_parameters(registry: &mut ParameterRegistry) {
    registry.register(
        LateReverbRequest::TYPE,
        "late reverberation parameters for one render channel",
        |_| Box::new(LateReverbRequest::default()),
    );
}
