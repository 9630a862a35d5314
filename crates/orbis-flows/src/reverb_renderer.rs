//! Rendering subgraph for reverb objects.
//!
//! ```text
//!            +-> reflection delays -> wall filters -> reflection panning --+
//! in -> routing                                                            +-> mix -> out
//!            +-> late gain/delay -> late filters -> late decorrelation ----+
//! ```
//!
//! The parameter calculator assigns reverb objects to render channels and
//! drives every stage; the late filter calculator synthesises the tail
//! impulse responses it requests.

use orbis_components::{
    Add, BiquadIirFilter, DelayInterpolation, DelayVector, DelayVectorConfig, FirFilterMatrix,
    FirMatrixConfig, FirRouting, GainMatrix, SignalRouter,
};
use orbis_core::{
    BiquadMatrix, Component, ComponentBuilder, Matrix, Parameter, ParameterConfig, ProtocolType,
    SignalFlowContext, SignalRouting,
};
use orbis_objects::{LATE_REVERB_SUBBANDS, ObjectVector};
use orbis_panning::LoudspeakerArray;
use orbis_reverb::{
    DEFAULT_NOISE_SEED, LateReverbFilterCalculator, ReverbParameterCalculator, filter_length,
};

use crate::error::{FlowError, Result};

/// Setup of a [`ReverbObjectRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReverbOptions {
    /// Maximum number of simultaneous reverb objects (render channels).
    pub max_objects: usize,
    /// Discrete reflections per object.
    pub discrete_reflections: usize,
    /// Biquad sections per reflection wall filter.
    pub biquad_sections: usize,
    /// Length of the late tail in seconds.
    pub late_filter_length: f32,
    /// Late filter syntheses per block; 0 means one per render channel.
    pub max_filter_updates_per_period: usize,
    /// Longest reflection delay in seconds.
    pub max_reflection_delay: f32,
    /// Longest late onset delay in seconds.
    pub max_late_delay: f32,
    /// Decorrelation filters of the late part, one row per loudspeaker.
    /// `None` spreads the tail without decorrelation.
    pub late_decorrelation_filters: Option<Matrix>,
    /// Seed of the late reverberation noise bank.
    pub noise_seed: u64,
}

impl Default for ReverbOptions {
    fn default() -> Self {
        Self {
            max_objects: 4,
            discrete_reflections: 4,
            biquad_sections: 8,
            late_filter_length: 2.0,
            max_filter_updates_per_period: 0,
            max_reflection_delay: 1.0,
            max_late_delay: 1.0,
            late_decorrelation_filters: None,
            noise_seed: DEFAULT_NOISE_SEED,
        }
    }
}

impl ReverbOptions {
    fn validate(&self) -> Result<()> {
        if self.max_objects == 0 || self.discrete_reflections == 0 {
            return Err(FlowError::InvalidOption(format!(
                "reverb needs at least one object and one reflection, got {} and {}",
                self.max_objects, self.discrete_reflections
            )));
        }
        if !(self.late_filter_length > 0.0) {
            return Err(FlowError::InvalidOption(format!(
                "late filter length {} s must be positive",
                self.late_filter_length
            )));
        }
        Ok(())
    }
}

/// Composite renderer for `PointSourceWithReverb` objects.
pub struct ReverbObjectRenderer;

impl ReverbObjectRenderer {
    /// Builds the subgraph.
    ///
    /// Ports: audio `in` (`object_signals`), audio `out` (one channel per
    /// regular loudspeaker) and the double-buffered object input
    /// `objectInput`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        array: &LoudspeakerArray,
        object_signals: usize,
        interpolation_steps: usize,
        options: &ReverbOptions,
    ) -> Result<Component> {
        options.validate()?;
        let loudspeakers = array.number_of_regular_speakers();
        let objects = options.max_objects;
        let slots = objects * options.discrete_reflections;
        let late_length = filter_length(options.late_filter_length, context.sample_rate());

        let mut b = ComponentBuilder::new(context, name);
        b.audio_input("in", object_signals)?;
        b.audio_output("out", loudspeakers)?;
        b.parameter_input(
            "objectInput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        let mut flow = b.into_composite();

        let calculator = ReverbParameterCalculator::new(
            array,
            objects,
            options.discrete_reflections,
            options.biquad_sections,
        )?;
        flow.add_child(calculator.component(context, "parameters")?)?;
        flow.add_child(SignalRouter::component(
            context,
            "routing",
            object_signals,
            objects,
            &SignalRouting::new(),
            true,
        )?)?;

        let mut reflection_delay = DelayVectorConfig::new(slots, options.max_reflection_delay);
        reflection_delay.interpolation = DelayInterpolation::Linear;
        reflection_delay.interpolation_steps = interpolation_steps;
        reflection_delay.initial_gains = vec![0.0; slots];
        reflection_delay.control_inputs = true;
        flow.add_child(DelayVector::component(context, "reflection_delay", &reflection_delay)?)?;
        flow.add_child(BiquadIirFilter::component(
            context,
            "reflection_filters",
            slots,
            options.biquad_sections,
            &BiquadMatrix::new(slots, options.biquad_sections),
            true,
        )?)?;
        flow.add_child(GainMatrix::component(
            context,
            "reflection_panning",
            slots,
            loudspeakers,
            interpolation_steps,
            &Matrix::new(loudspeakers, slots),
            true,
        )?)?;

        let mut late_delay = DelayVectorConfig::new(objects, options.max_late_delay);
        late_delay.interpolation = DelayInterpolation::NearestSample;
        late_delay.interpolation_steps = interpolation_steps;
        late_delay.initial_gains = vec![0.0; objects];
        late_delay.control_inputs = true;
        flow.add_child(DelayVector::component(context, "late_delay", &late_delay)?)?;

        let late = LateReverbFilterCalculator::new(
            objects,
            options.late_filter_length,
            context.sample_rate(),
            LATE_REVERB_SUBBANDS,
            options.max_filter_updates_per_period,
            options.noise_seed,
        )?;
        flow.add_child(late.component(context, "late_calculator")?)?;

        let mut late_filters = FirMatrixConfig::new(objects, 1, late_length, objects).control_input(true);
        for channel in 0..objects {
            late_filters = late_filters.routing(FirRouting::new(channel, 0, channel, 1.0));
        }
        flow.add_child(FirFilterMatrix::component(context, "late_filters", &late_filters)?)?;
        flow.add_child(FirFilterMatrix::component(
            context,
            "late_decorrelation",
            &decorrelation_config(loudspeakers, options.late_decorrelation_filters.as_ref())?,
        )?)?;
        flow.add_child(Add::component(context, "mix", loudspeakers, 2)?)?;

        flow.connect_audio_ports("this", "in", "routing", "in")?;
        // Every render channel feeds all of its reflection slots.
        let fan_out: Vec<usize> = (0..objects)
            .flat_map(|channel| std::iter::repeat_n(channel, options.discrete_reflections))
            .collect();
        flow.audio_connection("routing", "out", fan_out, "reflection_delay", "in", 0..slots)?;
        flow.connect_audio_ports("reflection_delay", "out", "reflection_filters", "in")?;
        flow.connect_audio_ports("reflection_filters", "out", "reflection_panning", "in")?;
        flow.connect_audio_ports("reflection_panning", "out", "mix", "in0")?;
        flow.connect_audio_ports("routing", "out", "late_delay", "in")?;
        flow.connect_audio_ports("late_delay", "out", "late_filters", "in")?;
        flow.connect_audio_ports("late_filters", "out", "late_decorrelation", "in")?;
        flow.connect_audio_ports("late_decorrelation", "out", "mix", "in1")?;
        flow.connect_audio_ports("mix", "out", "this", "out")?;

        for (sender, receiver, port) in [
            ("signalRoutingOutput", "routing", "controlInput"),
            ("discreteGainOutput", "reflection_delay", "gainInput"),
            ("discreteDelayOutput", "reflection_delay", "delayInput"),
            ("discreteFilterOutput", "reflection_filters", "eqInput"),
            ("discretePanningOutput", "reflection_panning", "gainInput"),
            ("lateGainOutput", "late_delay", "gainInput"),
            ("lateDelayOutput", "late_delay", "delayInput"),
            ("lateSubbandOutput", "late_calculator", "subbandInput"),
        ] {
            flow.parameter_connection("parameters", sender, receiver, port)?;
        }
        flow.parameter_connection("this", "objectInput", "parameters", "objectInput")?;
        flow.parameter_connection("late_calculator", "lateFilterOutput", "late_filters", "filterInput")?;

        tracing::debug!(
            name,
            objects,
            reflections = options.discrete_reflections,
            late_length,
            "reverb object renderer"
        );
        Ok(flow)
    }
}

/// One input spread to `outputs` channels through one filter each, scaled
/// by `1/sqrt(outputs)` to keep the diffuse energy comparable to a panned
/// source.
///
/// Without filters every output gets a unit impulse.
pub(crate) fn decorrelation_config(outputs: usize, filters: Option<&Matrix>) -> Result<FirMatrixConfig> {
    let filters = match filters {
        Some(f) if f.rows() < outputs => {
            return Err(FlowError::InvalidOption(format!(
                "{} decorrelation filters for {outputs} loudspeakers",
                f.rows()
            )));
        }
        Some(f) => {
            let mut used = Matrix::new(outputs, f.columns().max(1));
            for row in 0..outputs {
                used.row_mut(row)[..f.columns()].copy_from_slice(f.row(row));
            }
            used
        }
        None => {
            let mut impulses = Matrix::new(outputs, 1);
            impulses.fill(1.0);
            impulses
        }
    };
    let gain = 1.0 / (outputs.max(1) as f32).sqrt();
    let mut config = FirMatrixConfig::new(1, outputs, filters.columns(), outputs);
    for output in 0..outputs {
        config = config.routing(FirRouting::new(0, output, output, gain));
    }
    Ok(config.filters(filters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorrelation_without_filters_uses_impulses() {
        let config = decorrelation_config(4, None).unwrap();
        assert_eq!(config.max_filter_length, 1);
        assert_eq!(config.routings.len(), 4);
        assert!(config.routings.iter().all(|r| (r.gain - 0.5).abs() < 1e-6));
        let filters = config.initial_filters.unwrap();
        assert_eq!(filters.as_slice(), &[1.0; 4]);
    }

    #[test]
    fn too_few_decorrelation_filters_are_rejected() {
        let filters = Matrix::new(2, 16);
        assert!(matches!(
            decorrelation_config(4, Some(&filters)),
            Err(FlowError::InvalidOption(_))
        ));
    }

    #[test]
    fn extra_decorrelation_filters_are_ignored() {
        let mut filters = Matrix::new(3, 2);
        filters.set(2, 1, 7.0);
        let config = decorrelation_config(2, Some(&filters)).unwrap();
        let used = config.initial_filters.unwrap();
        assert_eq!(used.rows(), 2);
        assert_eq!(used.columns(), 2);
    }

    #[test]
    fn zero_objects_are_rejected() {
        let options = ReverbOptions {
            max_objects: 0,
            ..ReverbOptions::default()
        };
        assert!(matches!(options.validate(), Err(FlowError::InvalidOption(_))));
    }
}
