//! Top-level renderer fed by JSON scene messages.

use orbis_components::{SceneDecoder, UdpReceiver};
use orbis_core::{
    Component, ComponentBuilder, ListenerPosition, Parameter, ParameterConfig, ProtocolType,
    SignalFlowContext, StringParameter,
};
use orbis_panning::LoudspeakerArray;

use crate::core_renderer::{CoreRenderer, CoreRendererOptions};
use crate::error::Result;

/// Where scene messages come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneSource {
    /// Datagrams on a UDP port.
    Udp(u16),
    /// The message-queue input `sceneInput`, fed through
    /// `AudioSignalFlow::parameter_sender`.
    External,
}

/// Scene decoding in front of a [`CoreRenderer`].
pub struct SceneRenderer;

impl SceneRenderer {
    /// Builds the renderer.
    ///
    /// Ports: audio `input` and `output`, `sceneInput` for
    /// [`SceneSource::External`] and `listenerPosition` if the core options
    /// enable it.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        array: &LoudspeakerArray,
        inputs: usize,
        outputs: usize,
        options: &CoreRendererOptions,
        source: SceneSource,
    ) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        b.audio_input("input", inputs)?;
        b.audio_output("output", outputs)?;
        if source == SceneSource::External {
            b.parameter_input(
                "sceneInput",
                StringParameter::TYPE,
                ProtocolType::MessageQueue,
                ParameterConfig::Empty,
            )?;
        }
        if options.listener_input {
            b.parameter_input(
                "listenerPosition",
                ListenerPosition::TYPE,
                ProtocolType::DoubleBuffering,
                ParameterConfig::Empty,
            )?;
        }
        let mut flow = b.into_composite();

        match source {
            SceneSource::Udp(port) => {
                let receiver = UdpReceiver::bind(port)?;
                flow.add_child(receiver.into_component(context, "scene_receiver")?)?;
                flow.parameter_connection("scene_receiver", "messageOutput", "scene_decoder", "datagramInput")?;
            }
            SceneSource::External => {
                flow.parameter_connection("this", "sceneInput", "scene_decoder", "datagramInput")?;
            }
        }
        flow.add_child(SceneDecoder::component(context, "scene_decoder")?)?;
        flow.add_child(CoreRenderer::component(context, "renderer", array, inputs, outputs, options)?)?;
        flow.parameter_connection("scene_decoder", "objectVectorOutput", "renderer", "objectDataInput")?;
        if options.listener_input {
            flow.parameter_connection("this", "listenerPosition", "renderer", "listenerPosition")?;
        }
        flow.connect_audio_ports("this", "input", "renderer", "audioIn")?;
        flow.connect_audio_ports("renderer", "audioOut", "this", "output")?;
        Ok(flow)
    }
}
