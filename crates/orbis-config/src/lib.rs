//! Configuration files for the orbis object renderer.
//!
//! A renderer is described by one TOML file: the signal flow setup
//! (`[renderer]`), the scene message input (`[scene]`), the optional reverb
//! object renderer (`[reverb]`) and the audio devices (`[audio]`).
//!
//! # Example
//!
//! ```rust,no_run
//! use orbis_config::RendererConfig;
//!
//! let config = RendererConfig::load("renderer.toml").unwrap();
//! config.validate().unwrap();
//! println!("{} objects -> {} outputs", config.renderer.inputs, config.renderer.outputs);
//! ```

mod error;
mod renderer;
mod reverb;

/// Platform-specific configuration paths.
pub mod paths;

/// Range checks for configurations.
pub mod validation;

pub use error::{ConfigError, Result};
pub use paths::{default_config_path, user_config_dir};
pub use renderer::{AudioBackendKind, AudioSection, RendererConfig, RendererSection, SceneSection};
pub use reverb::{MAX_LATE_FILTER_LENGTH, ReverbConfig};
pub use validation::{ValidationError, ValidationResult};
