//! Channel router driven by a [`SignalRouting`] table.

use orbis_core::{
    AtomicProcessor, AudioPortId, Component, ComponentBuilder, Parameter, ParameterConfig,
    ParameterPortId, ProcessContext, ProcessError, ProtocolType, SignalFlowContext,
    SignalRouting,
};

use crate::error::Result;

/// Copies input channels to output channels according to a routing table.
///
/// Outputs without a routing entry are silent. Entries addressing channels
/// outside the port widths are ignored with a warning.
pub struct SignalRouter {
    input: AudioPortId,
    output: AudioPortId,
    control: Option<ParameterPortId>,
    /// Per output: routed input.
    table: Vec<Option<usize>>,
}

impl SignalRouter {
    /// Creates the component.
    ///
    /// Ports: audio `in` (`inputs`), audio `out` (`outputs`) and, if
    /// `control_input` is set, the double-buffered input `controlInput`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        inputs: usize,
        outputs: usize,
        initial: &SignalRouting,
        control_input: bool,
    ) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let input = b.audio_input("in", inputs)?;
        let output = b.audio_output("out", outputs)?;
        let control = control_input
            .then(|| {
                b.parameter_input(
                    "controlInput",
                    SignalRouting::TYPE,
                    ProtocolType::DoubleBuffering,
                    ParameterConfig::Empty,
                )
            })
            .transpose()?;
        let mut router = SignalRouter {
            input,
            output,
            control,
            table: vec![None; outputs],
        };
        router.apply(initial, inputs);
        Ok(b.into_atomic(router))
    }

    fn apply(&mut self, routing: &SignalRouting, inputs: usize) {
        self.table.fill(None);
        for (input, output) in routing.iter() {
            match self.table.get_mut(output) {
                Some(entry) if input < inputs => *entry = Some(input),
                _ => tracing::warn!(input, output, "routing entry out of range, ignored"),
            }
        }
    }
}

impl AtomicProcessor for SignalRouter {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        let inputs = ctx.audio.inputs();
        if let Some(port) = self.control
            && ctx.parameters.changed(port)
        {
            let routing = ctx.parameters.read::<SignalRouting>(port)?;
            let width = inputs.width(self.input);
            self.apply(routing, width);
            ctx.parameters.reset_changed(port);
        }

        for (out, entry) in ctx.audio.output_port(self.output).zip(&self.table) {
            match entry {
                Some(input) => out.copy_from_slice(inputs.input(self.input, *input)),
                None => out.fill(0.0),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, ParameterRegistry};

    fn ctx() -> SignalFlowContext {
        SignalFlowContext::new(2, 48000.0)
    }

    #[test]
    fn routes_and_silences_unrouted_outputs() {
        let mut routing = SignalRouting::new();
        routing.add_routing(1, 0);
        routing.add_routing(1, 2);
        let c = SignalRouter::component(ctx(), "router", 2, 3, &routing, false).unwrap();
        let mut flow = AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap();
        let (a, b) = ([1.0, 1.0], [2.0, 3.0]);
        let (mut o0, mut o1, mut o2) = ([9.0; 2], [9.0; 2], [9.0; 2]);
        flow.process(&[&a, &b], &mut [&mut o0, &mut o1, &mut o2]);
        assert_eq!(o0, b);
        assert_eq!(o1, [0.0; 2]);
        assert_eq!(o2, b);
    }

    #[test]
    fn routing_changes_at_block_boundary() {
        let c = SignalRouter::component(ctx(), "router", 2, 1, &SignalRouting::new(), true)
            .unwrap();
        let mut flow = AudioSignalFlow::new(c, &ParameterRegistry::with_core_types()).unwrap();
        let control = flow.parameter_sender("controlInput").unwrap();
        let (a, b) = ([1.0, 1.0], [2.0, 2.0]);
        let mut o = [0.0; 2];

        let mut routing = SignalRouting::new();
        routing.add_routing(0, 0);
        control.send(routing.clone()).unwrap();
        flow.process(&[&a, &b], &mut [&mut o]);
        assert_eq!(o, a);

        routing.add_routing(1, 0);
        routing.add_routing(7, 5);
        control.send(routing).unwrap();
        flow.process(&[&a, &b], &mut [&mut o]);
        assert_eq!(o, b);
    }
}
