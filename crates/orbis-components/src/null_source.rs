//! Silent signal source.

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, ProcessContext, ProcessError,
    SignalFlowContext,
};

use crate::error::Result;

/// Writes silence to its output `out`.
///
/// Feeds receive ports that would otherwise stay unconnected.
pub struct NullSource {
    output: AudioPortId,
}

impl NullSource {
    /// Creates the component.
    pub fn component(context: SignalFlowContext, name: &str, width: usize) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let output = b.audio_output("out", width)?;
        Ok(b.into_atomic(NullSource { output }))
    }
}

impl AtomicProcessor for NullSource {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        for out in ctx.audio.output_port(self.output) {
            out.fill(0.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, ParameterRegistry};

    #[test]
    fn outputs_silence() {
        let c = NullSource::component(SignalFlowContext::new(3, 48000.0), "zero", 2).unwrap();
        let mut flow = AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap();
        let (mut a, mut b) = ([1.0; 3], [1.0; 3]);
        flow.process(&[], &mut [&mut a, &mut b]);
        assert_eq!(a, [0.0; 3]);
        assert_eq!(b, [0.0; 3]);
    }
}
