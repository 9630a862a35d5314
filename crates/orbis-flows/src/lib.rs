//! Orbis Flows - composite object renderers
//!
//! - [`CoreRenderer`] - VBAP panning, diffuse decorrelation, optional reverb
//!   objects, subwoofer mixing and output adjustment for one loudspeaker array
//! - [`ReverbObjectRenderer`] - Discrete reflections and late tails of
//!   reverb objects
//! - [`SceneRenderer`] - Scene message decoding (UDP or external input) in
//!   front of a core renderer
//!
//! Renderers are composites; wrap the top level in an
//! [`orbis_core::AudioSignalFlow`] built with [`registry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use orbis_flows::{CoreRendererOptions, SceneRenderer, SceneSource, registry};
//!
//! let renderer = SceneRenderer::component(
//!     context, "orbis", &array, 16, 8, &CoreRendererOptions::default(), SceneSource::Udp(4242),
//! )?;
//! let mut flow = AudioSignalFlow::new(renderer, &registry())?;
//! ```

pub mod core_renderer;
pub mod error;
pub mod reverb_renderer;
pub mod scene_renderer;

pub use core_renderer::{CoreRenderer, CoreRendererOptions};
pub use error::{FlowError, Result};
pub use reverb_renderer::{ReverbObjectRenderer, ReverbOptions};
pub use scene_renderer::{SceneRenderer, SceneSource};

use orbis_core::ParameterRegistry;

/// Registry with every parameter type the renderers exchange.
pub fn registry() -> ParameterRegistry {
    let mut registry = ParameterRegistry::with_core_types();
    orbis_objects::register_parameters(&mut registry);
    orbis_reverb::register_parameters(&mut registry);
    registry
}
