//! Renderer configuration file format and operations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::paths;
use crate::reverb::ReverbConfig;
use crate::validation::{ValidationError, Validator};

/// Complete configuration of a renderer instance.
///
/// # TOML Format
///
/// ```toml
/// [renderer]
/// sample_rate = 48000
/// period = 256
/// inputs = 16
/// outputs = 24
/// array = "arrays/bs2051-9+10+3.xml"
/// diffusion_filters = "filters/decorrelation.wav"
/// lock_distance = 5.0
///
/// [scene]
/// port = 4242
///
/// [reverb]
/// max_objects = 4
///
/// [audio]
/// output_device = "Scarlett"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    /// Signal flow setup.
    pub renderer: RendererSection,

    /// Scene message input.
    #[serde(default)]
    pub scene: SceneSection,

    /// Reverb objects; absent disables the reverb renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb: Option<ReverbConfig>,

    /// Audio device selection.
    #[serde(default)]
    pub audio: AudioSection,
}

/// The `[renderer]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RendererSection {
    /// Sampling frequency in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Block size in samples.
    #[serde(default = "default_period")]
    pub period: usize,

    /// Number of object signals.
    pub inputs: usize,

    /// Number of playback channels.
    pub outputs: usize,

    /// Samples over which gain changes are interpolated; defaults to the
    /// period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation_period: Option<usize>,

    /// Loudspeaker array file. `.xml` files use the XML loader, anything
    /// else the text format.
    pub array: PathBuf,

    /// Multichannel WAV with one diffuse decorrelation filter per
    /// loudspeaker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffusion_filters: Option<PathBuf>,

    /// Channel lock distance in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_distance: Option<f32>,
}

/// The `[scene]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SceneSection {
    /// UDP port for scene messages; absent disables the network input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Supported audio backends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackendKind {
    /// Cross-platform backend on top of cpal.
    #[default]
    Cpal,
}

/// The `[audio]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AudioSection {
    /// Backend driving the realtime callback.
    #[serde(default)]
    pub backend: AudioBackendKind,

    /// Capture device name (substring match); the default device if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,

    /// Playback device name (substring match); the default device if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_period() -> usize {
    1024
}

impl RendererSection {
    /// Creates a section with default rate and period.
    pub fn new(inputs: usize, outputs: usize, array: impl Into<PathBuf>) -> Self {
        Self {
            sample_rate: default_sample_rate(),
            period: default_period(),
            inputs,
            outputs,
            interpolation_period: None,
            array: array.into(),
            diffusion_filters: None,
            lock_distance: None,
        }
    }

    /// Interpolation length in samples.
    pub fn interpolation_period(&self) -> usize {
        self.interpolation_period.unwrap_or(self.period)
    }
}

impl RendererConfig {
    /// Create a configuration with default scene, reverb and audio tables.
    pub fn new(renderer: RendererSection) -> Self {
        Self {
            renderer,
            scene: SceneSection::default(),
            reverb: None,
            audio: AudioSection::default(),
        }
    }

    /// Load a configuration from a TOML file.
    ///
    /// Relative file paths inside the configuration are resolved against
    /// the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse a configuration from a TOML string. Paths stay as written.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|e| ConfigError::io("write", path, e))
    }

    /// Makes every relative file path absolute with respect to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let renderer = &mut self.renderer;
        renderer.array = paths::resolve(base, &renderer.array);
        if let Some(filters) = renderer.diffusion_filters.as_mut() {
            *filters = paths::resolve(base, filters);
        }
        if let Some(filters) = self
            .reverb
            .as_mut()
            .and_then(|r| r.late_decorrelation_filters.as_mut())
        {
            *filters = paths::resolve(base, filters);
        }
    }

    /// Checks counts, rates and ranges; reports every violation.
    pub fn validate(&self) -> Result<()> {
        let mut v = Validator::default();
        let r = &self.renderer;
        v.positive("renderer.sample_rate", r.sample_rate as usize);
        v.positive("renderer.period", r.period);
        v.positive("renderer.inputs", r.inputs);
        v.positive("renderer.outputs", r.outputs);
        if let Some(distance) = r.lock_distance {
            v.in_range("renderer.lock_distance", f64::from(distance), 0.0, 180.0);
        }
        if r.array.as_os_str().is_empty() {
            v.push(ValidationError::Unsupported {
                field: "renderer.array",
                value: String::new(),
            });
        }
        if let Some(reverb) = &self.reverb {
            reverb.check(&mut v);
        }
        v.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [renderer]
        inputs = 2
        outputs = 8
        array = "cube.xml"
    "#;

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = RendererConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.renderer.sample_rate, 48000);
        assert_eq!(config.renderer.period, 1024);
        assert_eq!(config.renderer.interpolation_period(), 1024);
        assert_eq!(config.scene.port, None);
        assert!(config.reverb.is_none());
        assert_eq!(config.audio.backend, AudioBackendKind::Cpal);
        config.validate().unwrap();
    }

    #[test]
    fn every_table_is_parsed() {
        let config = RendererConfig::from_toml_str(
            r#"
            [renderer]
            sample_rate = 44100
            period = 128
            inputs = 4
            outputs = 6
            interpolation_period = 512
            array = "/arrays/5.1.txt"
            diffusion_filters = "/filters/diffuse.wav"
            lock_distance = 3.5

            [scene]
            port = 4242

            [reverb]
            max_objects = 2
            late_filter_length = 1.25

            [audio]
            backend = "cpal"
            output_device = "Scarlett"
            "#,
        )
        .unwrap();
        assert_eq!(config.renderer.interpolation_period(), 512);
        assert_eq!(config.renderer.lock_distance, Some(3.5));
        assert_eq!(config.scene.port, Some(4242));
        let reverb = config.reverb.as_ref().unwrap();
        assert_eq!(reverb.max_objects, 2);
        assert_eq!(reverb.late_filter_length, 1.25);
        assert_eq!(reverb.discrete_reflections, ReverbConfig::default().discrete_reflections);
        assert_eq!(config.audio.output_device.as_deref(), Some("Scarlett"));
        assert!(config.audio.input_device.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = RendererConfig::from_toml_str(
            r#"
            [renderer]
            inputs = 2
            outputs = 2
            array = "a.txt"
            perod = 64
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_array_is_a_parse_error() {
        let result = RendererConfig::from_toml_str("[renderer]\ninputs = 1\noutputs = 1\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validation_reports_all_zero_counts() {
        let mut config = RendererConfig::from_toml_str(MINIMAL).unwrap();
        config.renderer.period = 0;
        config.renderer.outputs = 0;
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(ValidationError::Multiple(errors)) => {
                assert_eq!(
                    errors,
                    vec![
                        ValidationError::Zero("renderer.period"),
                        ValidationError::Zero("renderer.outputs"),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reverb_table_is_validated_when_present() {
        let mut config = RendererConfig::from_toml_str(MINIMAL).unwrap();
        config.reverb = Some(ReverbConfig {
            discrete_reflections: 0,
            ..ReverbConfig::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(ValidationError::Zero("reverb.discrete_reflections")))
        ));
    }

    #[test]
    fn lock_distance_is_limited_to_a_half_circle() {
        let mut config = RendererConfig::from_toml_str(MINIMAL).unwrap();
        config.renderer.lock_distance = Some(270.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn toml_string_parses_back() {
        let mut config = RendererConfig::new(RendererSection::new(3, 5, "square.txt"));
        config.scene.port = Some(9000);
        config.reverb = Some(ReverbConfig::default());
        let text = config.to_toml_string().unwrap();
        assert_eq!(RendererConfig::from_toml_str(&text).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn relative_paths_follow_the_base_directory() {
        let mut config = RendererConfig::from_toml_str(MINIMAL).unwrap();
        config.renderer.diffusion_filters = Some(PathBuf::from("/abs/diffuse.wav"));
        config.resolve_paths(Path::new("/etc/orbis"));
        assert_eq!(config.renderer.array, PathBuf::from("/etc/orbis/cube.xml"));
        assert_eq!(
            config.renderer.diffusion_filters,
            Some(PathBuf::from("/abs/diffuse.wav"))
        );
    }
}
