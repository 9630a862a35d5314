//! Orbis Panning - loudspeaker arrays, VBAP and AllRAD
//!
//! - [`LoudspeakerArray`] - Validated array model, loaded from the text or
//!   XML format ([`LoudspeakerArray::load`]) or assembled with an
//!   [`ArrayBuilder`]
//! - [`Vbap`] - Vector base amplitude panning over the array's triplets
//! - [`AllRad`] - Ambisonic decoding via a regular virtual layout and VBAP
//!
//! # Example
//!
//! ```rust,ignore
//! use orbis_panning::{LoudspeakerArray, Vbap};
//! use nalgebra::Vector3;
//!
//! let array = LoudspeakerArray::load("arrays/octahedron.xml")?;
//! let mut vbap = Vbap::new(&array)?;
//! let mut gains = vec![0.0; array.number_of_regular_speakers()];
//! vbap.calculate_gains(Vector3::new(1.0, 1.0, 0.0), false, &mut gains);
//! ```

pub mod allrad;
pub mod array;
pub mod error;
mod text;
pub mod vbap;
mod xml;

pub use allrad::AllRad;
pub use array::{
    ArrayBuilder, Loudspeaker, LoudspeakerArray, Subwoofer, Triplet, UNUSED_VERTEX, db_to_linear,
    spherical_to_cartesian,
};
pub use error::{ArrayError, PanningError, Result};
pub use vbap::Vbap;

pub use nalgebra::Vector3;
