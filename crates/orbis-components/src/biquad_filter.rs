//! Cascaded biquad filters, one cascade per channel.

use orbis_core::{
    AtomicProcessor, AudioPortId, Biquad, BiquadMatrix, Component, ComponentBuilder, Parameter,
    ParameterConfig, ParameterPortId, ProcessContext, ProcessError, ProtocolType,
    SignalFlowContext,
};

use crate::error::{ComponentError, Result};

/// Multichannel IIR filter built from `sections` biquads per channel.
///
/// Coefficients arrive as a [`BiquadMatrix`] with one row per channel. New
/// coefficients are applied at block boundaries; filter states are kept so
/// that small coefficient changes do not click.
pub struct BiquadIirFilter {
    input: AudioPortId,
    output: AudioPortId,
    eq_input: Option<ParameterPortId>,
    channels: usize,
    sections: usize,
    /// Row-major: `channel * sections + section`.
    filters: Vec<Biquad>,
}

impl BiquadIirFilter {
    /// Creates the component.
    ///
    /// Ports: audio `in` and `out` of width `channels` and, if
    /// `control_input` is set, the double-buffered input `eqInput`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        channels: usize,
        sections: usize,
        initial: &BiquadMatrix,
        control_input: bool,
    ) -> Result<Component> {
        if initial.filters() != channels || initial.sections() != sections {
            return Err(ComponentError::invalid(
                "BiquadIirFilter",
                format!(
                    "initial coefficients are {}x{}, expected {channels}x{sections}",
                    initial.filters(),
                    initial.sections()
                ),
            ));
        }
        let mut b = ComponentBuilder::new(context, name);
        let input = b.audio_input("in", channels)?;
        let output = b.audio_output("out", channels)?;
        let eq_input = control_input
            .then(|| {
                b.parameter_input(
                    "eqInput",
                    BiquadMatrix::TYPE,
                    ProtocolType::DoubleBuffering,
                    ParameterConfig::Biquad {
                        filters: channels,
                        sections,
                    },
                )
            })
            .transpose()?;
        let filters = (0..channels)
            .flat_map(|ch| initial.filter(ch).iter().copied())
            .map(Biquad::with_coefficients)
            .collect();
        Ok(b.into_atomic(BiquadIirFilter {
            input,
            output,
            eq_input,
            channels,
            sections,
            filters,
        }))
    }
}

impl AtomicProcessor for BiquadIirFilter {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if let Some(port) = self.eq_input
            && ctx.parameters.changed(port)
        {
            let eq = ctx.parameters.read::<BiquadMatrix>(port)?;
            let channels = self.channels;
            if eq.filters() != channels || eq.sections() != self.sections {
                return Err(ProcessError::Component(format!(
                    "biquad matrix is {}x{}, expected {channels}x{}",
                    eq.filters(),
                    eq.sections(),
                    self.sections
                )));
            }
            for ch in 0..channels {
                let row = &mut self.filters[ch * self.sections..(ch + 1) * self.sections];
                for (filter, coeffs) in row.iter_mut().zip(eq.filter(ch)) {
                    filter.set_coefficients(*coeffs);
                }
            }
            ctx.parameters.reset_changed(port);
        }

        let inputs = ctx.audio.inputs();
        let sections = self.sections;
        for (ch, out) in ctx.audio.output_port(self.output).enumerate() {
            out.copy_from_slice(inputs.input(self.input, ch));
            for filter in &mut self.filters[ch * sections..(ch + 1) * sections] {
                filter.process_block(out);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, BiquadCoefficients, ParameterRegistry};

    fn flow(component: Component) -> AudioSignalFlow {
        AudioSignalFlow::new(component, &ParameterRegistry::with_core_types()).unwrap()
    }

    #[test]
    fn identity_sections_pass_signal() {
        let ctx = SignalFlowContext::new(4, 48000.0);
        let c = BiquadIirFilter::component(ctx, "eq", 2, 3, &BiquadMatrix::new(2, 3), false)
            .unwrap();
        let mut flow = flow(c);
        let a = [1.0, -1.0, 0.5, 0.25];
        let b = [0.0, 2.0, 0.0, 0.0];
        let (mut oa, mut ob) = ([0.0; 4], [0.0; 4]);
        flow.process(&[&a, &b], &mut [&mut oa, &mut ob]);
        assert_eq!(oa, a);
        assert_eq!(ob, b);
    }

    #[test]
    fn sections_are_cascaded() {
        let ctx = SignalFlowContext::new(4, 48000.0);
        let mut eq = BiquadMatrix::new(1, 2);
        // one-sample delay followed by a gain of two
        eq.filter_mut(0)[0] = BiquadCoefficients::new(0.0, 1.0, 0.0, 0.0, 0.0);
        eq.filter_mut(0)[1] = BiquadCoefficients::new(2.0, 0.0, 0.0, 0.0, 0.0);
        let c = BiquadIirFilter::component(ctx, "eq", 1, 2, &eq, false).unwrap();
        let mut flow = flow(c);
        let x = [1.0, 0.0, 0.0, 3.0];
        let mut o = [0.0; 4];
        flow.process(&[&x], &mut [&mut o]);
        assert_eq!(o, [0.0, 2.0, 0.0, 0.0]);
        let mut o = [0.0; 4];
        flow.process(&[&[0.0; 4]], &mut [&mut o]);
        assert_eq!(o, [6.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn coefficients_update_from_input() {
        let ctx = SignalFlowContext::new(2, 48000.0);
        let c = BiquadIirFilter::component(ctx, "eq", 1, 1, &BiquadMatrix::new(1, 1), true)
            .unwrap();
        let mut flow = flow(c);
        let mut eq = BiquadMatrix::new(1, 1);
        eq.filter_mut(0)[0] = BiquadCoefficients::new(0.5, 0.0, 0.0, 0.0, 0.0);
        flow.parameter_sender("eqInput").unwrap().send(eq).unwrap();
        let mut o = [0.0; 2];
        flow.process(&[&[1.0, 1.0]], &mut [&mut o]);
        assert_eq!(o, [0.5, 0.5]);
    }
}
