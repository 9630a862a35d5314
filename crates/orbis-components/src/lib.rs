//! Orbis Components - atomic building blocks for object renderers
//!
//! Every component is created by a `component` constructor that declares its
//! ports on a [`orbis_core::ComponentBuilder`] and returns a ready
//! [`orbis_core::Component`]. Processing never allocates; parameter updates
//! arrive through the ports named in each constructor's documentation.
//!
//! ## Audio
//!
//! - [`GainMatrix`] - Matrix mix with linearly ramped gain changes
//! - [`DelayVector`] - Per-channel fractional delay and gain
//! - [`BiquadIirFilter`] - Cascaded biquads per channel
//! - [`FirFilterMatrix`] - Uniformly partitioned FFT convolution with routings
//! - [`SignalRouter`] - Channel permutation and selection
//! - [`Add`] / [`NullSource`] - Summing and silence
//!
//! ## Control
//!
//! - [`PanningCalculator`] - VBAP gains for the object vector
//! - [`DiffusionGainCalculator`] - Diffuse send levels per object
//! - [`SceneDecoder`] - JSON scene messages to object vector updates
//! - [`UdpReceiver`] - Network ingestion of scene messages

pub mod add;
pub mod biquad_filter;
pub mod delay_vector;
pub mod diffusion_gain_calculator;
pub mod error;
pub mod fir_matrix;
pub mod gain_matrix;
pub mod null_source;
pub mod panning_calculator;
pub mod ramp;
pub mod scene_decoder;
pub mod signal_routing;
pub mod udp_receiver;

pub use add::Add;
pub use biquad_filter::BiquadIirFilter;
pub use delay_vector::{DelayInterpolation, DelayVector, DelayVectorConfig};
pub use diffusion_gain_calculator::DiffusionGainCalculator;
pub use error::{ComponentError, Result};
pub use fir_matrix::{FirFilterMatrix, FirMatrixConfig, FirRouting, PartitionedConvolver};
pub use gain_matrix::GainMatrix;
pub use null_source::NullSource;
pub use panning_calculator::{PanningCalculator, PanningOptions};
pub use ramp::LinearRamp;
pub use scene_decoder::SceneDecoder;
pub use signal_routing::SignalRouter;
pub use udp_receiver::{DEFAULT_QUEUE_CAPACITY, MAX_DATAGRAM_SIZE, UdpReceiver};
