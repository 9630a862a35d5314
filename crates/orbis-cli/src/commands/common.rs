//! Shared CLI helpers: configuration loading and renderer construction.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Args;
use orbis_config::{RendererConfig, RendererSection, ReverbConfig, default_config_path};
use orbis_core::{AudioSignalFlow, Matrix, SignalFlowContext};
use orbis_flows::{CoreRendererOptions, ReverbOptions, SceneRenderer, SceneSource, registry};
use orbis_io::load_filter_matrix;
use orbis_panning::LoudspeakerArray;

/// Renderer options shared by the rendering commands. Flags override the
/// configuration file.
#[derive(Args, Debug, Default)]
pub struct RendererArgs {
    /// Renderer configuration (TOML); defaults to the user configuration if present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Loudspeaker array file (.xml or text format)
    #[arg(short, long)]
    pub array: Option<PathBuf>,

    /// Number of object signals
    #[arg(long)]
    pub inputs: Option<usize>,

    /// Number of output channels
    #[arg(long)]
    pub outputs: Option<usize>,

    /// Block size in samples
    #[arg(long)]
    pub period: Option<usize>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Channel lock distance in degrees
    #[arg(long)]
    pub lock_distance: Option<f32>,

    /// Multichannel WAV with the diffuse decorrelation filters
    #[arg(long)]
    pub diffusion_filters: Option<PathBuf>,

    /// Reverb configuration as a JSON object (numReverbObjects, ...)
    #[arg(long)]
    pub reverb_config: Option<String>,
}

impl RendererArgs {
    /// Loads the configuration, applies the flags and validates the result.
    pub fn load_config(&self) -> anyhow::Result<RendererConfig> {
        let default_path = default_config_path();
        let mut config = match (&self.config, &self.array) {
            (Some(path), _) => RendererConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            (None, None) if default_path.exists() => RendererConfig::load(&default_path)
                .with_context(|| format!("loading configuration {}", default_path.display()))?,
            (None, Some(array)) => {
                let (Some(inputs), Some(outputs)) = (self.inputs, self.outputs) else {
                    bail!("without a configuration file, --array needs --inputs and --outputs");
                };
                RendererConfig::new(RendererSection::new(inputs, outputs, array.clone()))
            }
            (None, None) => bail!(
                "no configuration: pass --config, or --array with --inputs and --outputs \
                 (or create {})",
                default_path.display()
            ),
        };
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut RendererConfig) -> anyhow::Result<()> {
        let r = &mut config.renderer;
        if let Some(array) = &self.array {
            r.array.clone_from(array);
        }
        if let Some(inputs) = self.inputs {
            r.inputs = inputs;
        }
        if let Some(outputs) = self.outputs {
            r.outputs = outputs;
        }
        if let Some(period) = self.period {
            r.period = period;
        }
        if let Some(sample_rate) = self.sample_rate {
            r.sample_rate = sample_rate;
        }
        if self.lock_distance.is_some() {
            r.lock_distance = self.lock_distance;
        }
        if self.diffusion_filters.is_some() {
            r.diffusion_filters.clone_from(&self.diffusion_filters);
        }
        if let Some(json) = &self.reverb_config {
            config.reverb = Some(ReverbConfig::from_json_str(json)?);
        }
        Ok(())
    }
}

/// Loads a filter WAV, warning if its rate differs from the renderer's.
fn load_filters(path: &Path, sample_rate: u32) -> anyhow::Result<Matrix> {
    let (filters, rate) = load_filter_matrix(path)
        .with_context(|| format!("loading filters {}", path.display()))?;
    if rate != sample_rate {
        tracing::warn!(
            path = %path.display(),
            file = rate,
            renderer = sample_rate,
            "filter sample rate differs from the renderer"
        );
    }
    Ok(filters)
}

/// Renderer options derived from a configuration.
pub fn renderer_options(config: &RendererConfig) -> anyhow::Result<CoreRendererOptions> {
    let r = &config.renderer;
    let diffusion_filters = r
        .diffusion_filters
        .as_ref()
        .map(|p| load_filters(p, r.sample_rate))
        .transpose()?;
    let reverb = config
        .reverb
        .as_ref()
        .map(|reverb| -> anyhow::Result<ReverbOptions> {
            Ok(ReverbOptions {
                max_objects: reverb.max_objects,
                discrete_reflections: reverb.discrete_reflections,
                biquad_sections: reverb.biquad_sections,
                late_filter_length: reverb.late_filter_length,
                max_filter_updates_per_period: reverb.max_filter_updates_per_period,
                late_decorrelation_filters: reverb
                    .late_decorrelation_filters
                    .as_ref()
                    .map(|p| load_filters(p, r.sample_rate))
                    .transpose()?,
                ..ReverbOptions::default()
            })
        })
        .transpose()?;
    Ok(CoreRendererOptions {
        interpolation_steps: r.interpolation_period(),
        diffusion_filters,
        lock_distance: r.lock_distance,
        listener_input: false,
        reverb,
    })
}

/// Builds the executable renderer for `config`.
pub fn build_renderer(config: &RendererConfig, source: SceneSource) -> anyhow::Result<AudioSignalFlow> {
    let r = &config.renderer;
    let array = LoudspeakerArray::load(&r.array)
        .with_context(|| format!("loading loudspeaker array {}", r.array.display()))?;
    let options = renderer_options(config)?;
    let context = SignalFlowContext::new(r.period, r.sample_rate as f32);
    let renderer = SceneRenderer::component(
        context, "orbis", &array, r.inputs, r.outputs, &options, source,
    )?;
    let flow = AudioSignalFlow::new(renderer, &registry())?;
    tracing::debug!(schedule = ?flow.schedule(), "renderer schedule");
    Ok(flow)
}
