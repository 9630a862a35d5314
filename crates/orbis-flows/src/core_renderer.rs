//! The object renderer's signal processing core.
//!
//! Object signals are panned with VBAP gains and, for their diffuse part,
//! mixed down, decorrelated and spread over all loudspeakers. Reverb objects
//! additionally run through a [`ReverbObjectRenderer`]. The loudspeaker
//! feeds then get subwoofer mixing, optional output equalisation and the
//! array's gain and delay adjustments before they are routed to their
//! output channels. Unused output channels are fed with silence.

use std::collections::BTreeSet;

use orbis_components::{
    Add, BiquadIirFilter, DelayInterpolation, DelayVector, DelayVectorConfig,
    DiffusionGainCalculator, FirFilterMatrix, GainMatrix, NullSource, PanningCalculator,
    PanningOptions,
};
use orbis_core::{
    BiquadMatrix, Component, ComponentBuilder, ListenerPosition, Matrix, Parameter,
    ParameterConfig, ProtocolType, SignalFlowContext,
};
use orbis_objects::ObjectVector;
use orbis_panning::LoudspeakerArray;

use crate::error::{FlowError, Result};
use crate::reverb_renderer::{ReverbObjectRenderer, ReverbOptions, decorrelation_config};

/// Setup of a [`CoreRenderer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreRendererOptions {
    /// Samples over which panning gain changes are interpolated.
    pub interpolation_steps: usize,
    /// Decorrelation filters of the diffuse part, one row per loudspeaker.
    pub diffusion_filters: Option<Matrix>,
    /// Channel lock distance in degrees.
    pub lock_distance: Option<f32>,
    /// Adds the `listenerPosition` input for tracked reproduction.
    pub listener_input: bool,
    /// Adds the reverb object subgraph.
    pub reverb: Option<ReverbOptions>,
}

/// Builder of the core renderer composite.
pub struct CoreRenderer;

impl CoreRenderer {
    /// Builds the renderer for `inputs` object signals and `outputs`
    /// playback channels.
    ///
    /// Ports: audio `audioIn` and `audioOut`, the double-buffered object
    /// input `objectDataInput` and, with `listener_input`, the
    /// double-buffered `listenerPosition`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        array: &LoudspeakerArray,
        inputs: usize,
        outputs: usize,
        options: &CoreRendererOptions,
    ) -> Result<Component> {
        if inputs == 0 {
            return Err(FlowError::InvalidOption("at least one object input required".to_owned()));
        }
        let loudspeakers = array.number_of_regular_speakers();
        let subwoofers = array.number_of_subwoofers();
        let signals = loudspeakers + subwoofers;
        let playback = playback_channels(array, outputs)?;

        let mut b = ComponentBuilder::new(context, name);
        b.audio_input("audioIn", inputs)?;
        b.audio_output("audioOut", outputs)?;
        b.parameter_input(
            "objectDataInput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        if options.listener_input {
            b.parameter_input(
                "listenerPosition",
                ListenerPosition::TYPE,
                ProtocolType::DoubleBuffering,
                ParameterConfig::Empty,
            )?;
        }
        let mut flow = b.into_composite();
        let steps = options.interpolation_steps;

        // Direct part
        flow.add_child(PanningCalculator::component(
            context,
            "panning",
            inputs,
            array,
            PanningOptions {
                listener_input: options.listener_input,
                low_frequency_output: false,
                lock_distance: options.lock_distance,
            },
        )?)?;
        flow.add_child(GainMatrix::component(
            context,
            "vbap_matrix",
            inputs,
            loudspeakers,
            steps,
            &Matrix::new(loudspeakers, inputs),
            true,
        )?)?;
        flow.parameter_connection("this", "objectDataInput", "panning", "objectVectorInput")?;
        flow.parameter_connection("panning", "gainOutput", "vbap_matrix", "gainInput")?;
        if options.listener_input {
            flow.parameter_connection("this", "listenerPosition", "panning", "listenerPosition")?;
        }
        flow.connect_audio_ports("this", "audioIn", "vbap_matrix", "in")?;

        // Diffuse part
        flow.add_child(DiffusionGainCalculator::component(context, "diffusion", inputs)?)?;
        flow.add_child(GainMatrix::component(
            context,
            "diffuse_matrix",
            inputs,
            1,
            steps,
            &Matrix::new(1, inputs),
            true,
        )?)?;
        flow.add_child(FirFilterMatrix::component(
            context,
            "decorrelator",
            &decorrelation_config(loudspeakers, options.diffusion_filters.as_ref())?,
        )?)?;
        flow.parameter_connection("this", "objectDataInput", "diffusion", "objectInput")?;
        flow.parameter_connection("diffusion", "gainOutput", "diffuse_matrix", "gainInput")?;
        flow.connect_audio_ports("this", "audioIn", "diffuse_matrix", "in")?;
        flow.connect_audio_ports("diffuse_matrix", "out", "decorrelator", "in")?;

        let mix_inputs = if options.reverb.is_some() { 3 } else { 2 };
        flow.add_child(Add::component(context, "mix", loudspeakers, mix_inputs)?)?;
        flow.connect_audio_ports("vbap_matrix", "out", "mix", "in0")?;
        flow.connect_audio_ports("decorrelator", "out", "mix", "in1")?;

        if let Some(reverb) = &options.reverb {
            flow.add_child(ReverbObjectRenderer::component(
                context, "reverb", array, inputs, steps, reverb,
            )?)?;
            flow.parameter_connection("this", "objectDataInput", "reverb", "objectInput")?;
            flow.connect_audio_ports("this", "audioIn", "reverb", "in")?;
            flow.connect_audio_ports("reverb", "out", "mix", "in2")?;
        }

        // Output stage
        let eq = output_equalisation(array)?;
        let first_stage = if eq.is_some() { "output_eq" } else { "output_adjustment" };
        if let Some(eq) = &eq {
            flow.add_child(BiquadIirFilter::component(
                context,
                "output_eq",
                signals,
                eq.sections(),
                eq,
                false,
            )?)?;
        }
        flow.audio_connection("mix", "out", 0..loudspeakers, first_stage, "in", 0..loudspeakers)?;
        if subwoofers > 0 {
            flow.add_child(GainMatrix::component(
                context,
                "subwoofer_mix",
                loudspeakers,
                subwoofers,
                0,
                array.subwoofer_gains(),
                false,
            )?)?;
            flow.connect_audio_ports("mix", "out", "subwoofer_mix", "in")?;
            flow.audio_connection(
                "subwoofer_mix",
                "out",
                0..subwoofers,
                first_stage,
                "in",
                loudspeakers..signals,
            )?;
        }

        let delays = array.delay_adjustment();
        let mut adjustment = DelayVectorConfig::new(signals, delays.iter().copied().fold(0.0, f32::max));
        adjustment.interpolation = DelayInterpolation::NearestSample;
        adjustment.initial_delays = delays;
        adjustment.initial_gains = array.gain_adjustment();
        flow.add_child(DelayVector::component(context, "output_adjustment", &adjustment)?)?;
        if eq.is_some() {
            flow.connect_audio_ports("output_eq", "out", "output_adjustment", "in")?;
        }
        flow.audio_connection("output_adjustment", "out", 0..signals, "this", "audioOut", playback.clone())?;

        let used: BTreeSet<usize> = playback.into_iter().collect();
        let silent: Vec<usize> = (0..outputs).filter(|ch| !used.contains(ch)).collect();
        if !silent.is_empty() {
            flow.add_child(NullSource::component(context, "silence", 1)?)?;
            flow.audio_connection("silence", "out", vec![0; silent.len()], "this", "audioOut", silent)?;
        }

        tracing::debug!(name, inputs, outputs, loudspeakers, subwoofers, "core renderer");
        Ok(flow)
    }
}

/// Output channel of every loudspeaker signal (regular, then subwoofers).
fn playback_channels(array: &LoudspeakerArray, outputs: usize) -> Result<Vec<usize>> {
    let regular = array.number_of_regular_speakers();
    if regular + array.number_of_subwoofers() > outputs {
        return Err(FlowError::Outputs(format!(
            "{regular} loudspeakers and {} subwoofers exceed {outputs} output channels",
            array.number_of_subwoofers()
        )));
    }
    let mut channels = Vec::with_capacity(regular + array.number_of_subwoofers());
    for index in 0..regular {
        let channel = array
            .channel_index(index)
            .ok_or_else(|| FlowError::Outputs(format!("loudspeaker {index} has no output channel")))?;
        channels.push(channel);
    }
    channels.extend(array.subwoofer_channels());

    let mut seen = BTreeSet::new();
    for &channel in &channels {
        if channel >= outputs {
            return Err(FlowError::Outputs(format!(
                "channel {} exceeds {outputs} output channels",
                channel + 1
            )));
        }
        if !seen.insert(channel) {
            return Err(FlowError::Outputs(format!("channel {} is used twice", channel + 1)));
        }
    }
    Ok(channels)
}

/// Output equalisation of the array as a biquad matrix, padded with
/// identity sections.
fn output_equalisation(array: &LoudspeakerArray) -> Result<Option<BiquadMatrix>> {
    let Some(filters) = array.output_eq() else {
        return Ok(None);
    };
    let signals = array.number_of_regular_speakers() + array.number_of_subwoofers();
    if filters.len() != signals {
        return Err(FlowError::Outputs(format!(
            "output equalisation has {} filters for {signals} output signals",
            filters.len()
        )));
    }
    let sections = filters.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut matrix = BiquadMatrix::new(signals, sections);
    for (index, sections) in filters.iter().enumerate() {
        matrix.filter_mut(index)[..sections.len()].copy_from_slice(sections);
    }
    Ok(Some(matrix))
}
