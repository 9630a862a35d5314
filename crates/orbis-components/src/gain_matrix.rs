//! Matrix mixer with interpolated gain changes.

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, Matrix, Parameter, ParameterConfig,
    ParameterPortId, ProcessContext, ProcessError, ProtocolType, SignalFlowContext,
};

use crate::error::{ComponentError, Result};
use crate::ramp::LinearRamp;

/// Mixes `inputs` channels to `outputs` channels with an `outputs x inputs`
/// gain matrix.
///
/// New gains arriving on `gainInput` are approached linearly over the
/// configured number of samples.
pub struct GainMatrix {
    input: AudioPortId,
    output: AudioPortId,
    gain_input: Option<ParameterPortId>,
    inputs: usize,
    /// Row-major, one ramp per matrix entry.
    ramps: Vec<LinearRamp>,
}

impl GainMatrix {
    /// Creates the component.
    ///
    /// Ports: audio `in` (`inputs`), audio `out` (`outputs`) and, if
    /// `control_input` is set, the double-buffered matrix input `gainInput`
    /// whose value replaces `initial` from the first block on.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        inputs: usize,
        outputs: usize,
        interpolation_steps: usize,
        initial: &Matrix,
        control_input: bool,
    ) -> Result<Component> {
        if initial.rows() != outputs || initial.columns() != inputs {
            return Err(ComponentError::invalid(
                "GainMatrix",
                format!(
                    "initial gains are {}x{}, expected {outputs}x{inputs}",
                    initial.rows(),
                    initial.columns()
                ),
            ));
        }
        let mut b = ComponentBuilder::new(context, name);
        let input = b.audio_input("in", inputs)?;
        let output = b.audio_output("out", outputs)?;
        let gain_input = control_input
            .then(|| {
                b.parameter_input(
                    "gainInput",
                    Matrix::TYPE,
                    ProtocolType::DoubleBuffering,
                    ParameterConfig::Matrix {
                        rows: outputs,
                        columns: inputs,
                    },
                )
            })
            .transpose()?;
        let ramps = initial
            .as_slice()
            .iter()
            .map(|&g| LinearRamp::new(g, interpolation_steps))
            .collect();
        Ok(b.into_atomic(GainMatrix {
            input,
            output,
            gain_input,
            inputs,
            ramps,
        }))
    }

    fn set_targets(&mut self, gains: &Matrix) -> std::result::Result<(), ProcessError> {
        if gains.as_slice().len() != self.ramps.len() {
            return Err(ProcessError::Component(format!(
                "gain matrix has {}x{} entries, expected {}",
                gains.rows(),
                gains.columns(),
                self.ramps.len()
            )));
        }
        for (ramp, &g) in self.ramps.iter_mut().zip(gains.as_slice()) {
            ramp.set_target(g);
        }
        Ok(())
    }
}

impl AtomicProcessor for GainMatrix {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if let Some(port) = self.gain_input
            && ctx.parameters.changed(port)
        {
            let gains = ctx.parameters.read::<Matrix>(port)?;
            self.set_targets(gains)?;
            ctx.parameters.reset_changed(port);
        }

        let inputs = ctx.audio.inputs();
        let width = self.inputs;
        for (row, out) in ctx.audio.output_port(self.output).enumerate() {
            out.fill(0.0);
            for col in 0..width {
                let ramp = &mut self.ramps[row * width + col];
                let input = inputs.input(self.input, col);
                if ramp.is_settled() {
                    let g = ramp.get();
                    if g == 0.0 {
                        continue;
                    }
                    for (o, i) in out.iter_mut().zip(input) {
                        *o += g * i;
                    }
                } else {
                    for (o, i) in out.iter_mut().zip(input) {
                        *o += ramp.advance() * i;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, CallbackResult, ParameterRegistry};

    fn ctx() -> SignalFlowContext {
        SignalFlowContext::new(4, 48000.0)
    }

    #[test]
    fn static_mix() {
        let gains = Matrix::from_rows(&[&[1.0, 0.5], &[0.0, 2.0], &[0.0, 0.0]]).unwrap();
        let c = GainMatrix::component(ctx(), "mix", 2, 3, 0, &gains, false).unwrap();
        let mut flow = AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap();
        let a = [1.0; 4];
        let b = [2.0; 4];
        let (mut o1, mut o2, mut o3) = ([0.0; 4], [0.0; 4], [9.0; 4]);
        let r = flow.process(&[&a, &b], &mut [&mut o1, &mut o2, &mut o3]);
        assert_eq!(r, CallbackResult::Continue);
        assert_eq!(o1, [2.0; 4]);
        assert_eq!(o2, [4.0; 4]);
        assert_eq!(o3, [0.0; 4]);
    }

    #[test]
    fn gain_change_is_interpolated() {
        let c = GainMatrix::component(ctx(), "mix", 1, 1, 8, &Matrix::new(1, 1), true).unwrap();
        let mut flow = AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap();
        let gains = flow.parameter_sender("gainInput").unwrap();
        gains.send(Matrix::from_rows(&[&[1.0]]).unwrap()).unwrap();

        let x = [1.0; 4];
        let mut o = [0.0; 4];
        flow.process(&[&x], &mut [&mut o]);
        assert_eq!(o, [0.125, 0.25, 0.375, 0.5]);
        flow.process(&[&x], &mut [&mut o]);
        assert_eq!(o, [0.625, 0.75, 0.875, 1.0]);
        flow.process(&[&x], &mut [&mut o]);
        assert_eq!(o, [1.0; 4]);
    }

    #[test]
    fn wrong_initial_shape_is_rejected() {
        let err = GainMatrix::component(ctx(), "mix", 2, 2, 0, &Matrix::new(1, 2), false).unwrap_err();
        assert!(err.to_string().contains("expected 2x2"), "got: {err}");
    }
}
