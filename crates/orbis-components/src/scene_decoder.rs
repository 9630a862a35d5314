//! Decoding of scene messages into the renderer's object vector.

use orbis_core::{
    AtomicProcessor, Component, ComponentBuilder, Parameter, ParameterConfig, ParameterPortId,
    ProcessContext, ProcessError, ProtocolType, SignalFlowContext, StringParameter,
};
use orbis_objects::{ObjectVector, update_object_vector};

use crate::error::Result;

/// Applies JSON scene messages to an object vector.
///
/// Every message queued on `datagramInput` is merged into the vector
/// published on `objectVectorOutput`. Malformed objects are skipped; a
/// message that is not valid JSON is dropped as a whole. Both cases are
/// logged and never fail the block.
pub struct SceneDecoder {
    datagram_input: ParameterPortId,
    object_output: ParameterPortId,
}

impl SceneDecoder {
    /// Creates the component.
    pub fn component(context: SignalFlowContext, name: &str) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let datagram_input = b.parameter_input(
            "datagramInput",
            StringParameter::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )?;
        let object_output = b.parameter_output(
            "objectVectorOutput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        Ok(b.into_atomic(SceneDecoder {
            datagram_input,
            object_output,
        }))
    }
}

impl AtomicProcessor for SceneDecoder {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        while let Some(message) = ctx.parameters.receive::<StringParameter>(self.datagram_input)? {
            let objects = ctx.parameters.data_mut::<ObjectVector>(self.object_output)?;
            match update_object_vector(message.as_str(), objects) {
                Ok(update) => tracing::debug!(
                    applied = update.applied,
                    rejected = update.rejected.len(),
                    "scene message decoded"
                ),
                Err(e) => tracing::warn!("dropping scene message: {e}"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_core::{AudioSignalFlow, ParameterRegistry};
    use orbis_objects::{ObjectKind, register_parameters};

    fn flow() -> AudioSignalFlow {
        let mut registry = ParameterRegistry::with_core_types();
        register_parameters(&mut registry);
        let c = SceneDecoder::component(SignalFlowContext::new(4, 48000.0), "decoder").unwrap();
        AudioSignalFlow::new(c, &registry).unwrap()
    }

    #[test]
    fn messages_merge_into_object_vector() {
        let mut flow = flow();
        let input = flow.parameter_sender("datagramInput").unwrap();
        let output = flow.parameter_receiver("objectVectorOutput").unwrap();

        input
            .send(StringParameter::new(
                r#"{"objects":[{"type":"point","id":1,"channels":0,"position":{"x":1,"y":0,"z":0}}]}"#,
            ))
            .unwrap();
        input
            .send(StringParameter::new(r#"{"objects":[{"type":"diffuse","id":2,"channels":1}]}"#))
            .unwrap();
        flow.process(&[], &mut []);
        let objects = output.receive::<ObjectVector>().unwrap().unwrap();
        assert_eq!(objects.ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(objects.get(2).unwrap().kind, ObjectKind::DiffuseSource);
    }

    #[test]
    fn invalid_messages_do_not_fail_the_block() {
        let mut flow = flow();
        let input = flow.parameter_sender("datagramInput").unwrap();
        input.send(StringParameter::new("not json")).unwrap();
        input
            .send(StringParameter::new(
                r#"{"objects":[{"type":"nonsense","id":5},{"type":"diffuse","id":6,"channels":0}]}"#,
            ))
            .unwrap();
        assert_eq!(flow.process(&[], &mut []), orbis_core::CallbackResult::Continue);
        let objects = flow
            .parameter_receiver("objectVectorOutput")
            .unwrap()
            .receive::<ObjectVector>()
            .unwrap()
            .unwrap();
        assert_eq!(objects.ids().collect::<Vec<_>>(), vec![6]);
    }
}
