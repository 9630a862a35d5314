//! Sample-wise sum of several multichannel inputs.

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, ProcessContext, ProcessError,
    SignalFlowContext,
};

use crate::error::{ComponentError, Result};

/// Adds `inputs` signals of equal width.
///
/// Ports: audio `in0` .. `in{inputs-1}` and `out`, all of width `width`.
pub struct Add {
    inputs: Vec<AudioPortId>,
    output: AudioPortId,
}

impl Add {
    /// Creates the component.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        width: usize,
        inputs: usize,
    ) -> Result<Component> {
        if inputs == 0 {
            return Err(ComponentError::invalid("Add", "needs at least one input"));
        }
        let mut b = ComponentBuilder::new(context, name);
        let input_ports = (0..inputs)
            .map(|i| b.audio_input(&format!("in{i}"), width))
            .collect::<orbis_core::Result<Vec<_>>>()?;
        let output = b.audio_output("out", width)?;
        Ok(b.into_atomic(Add {
            inputs: input_ports,
            output,
        }))
    }
}

impl AtomicProcessor for Add {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        let inputs = ctx.audio.inputs();
        let (first, rest) = self.inputs.split_first().ok_or(ProcessError::NoValue)?;
        for (ch, out) in ctx.audio.output_port(self.output).enumerate() {
            out.copy_from_slice(inputs.input(*first, ch));
            for &port in rest {
                for (o, x) in out.iter_mut().zip(inputs.input(port, ch)) {
                    *o += x;
                }
            }
        }
        Ok(())
    }
}
