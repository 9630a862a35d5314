//! Per-object gains of the diffuse rendering path.

use orbis_core::{
    AtomicProcessor, Component, ComponentBuilder, Matrix, Parameter, ParameterConfig,
    ParameterPortId, ProcessContext, ProcessError, ProtocolType, SignalFlowContext,
};
use orbis_objects::{ObjectKind, ObjectVector};

use crate::error::Result;

/// Computes a `1 x objects` matrix of diffuse gains: the level of diffuse
/// sources, level times diffuseness for point sources with diffuseness and
/// zero for everything else.
pub struct DiffusionGainCalculator {
    object_input: ParameterPortId,
    gain_output: ParameterPortId,
    gains: Vec<f32>,
}

impl DiffusionGainCalculator {
    /// Creates the component.
    ///
    /// Ports: double-buffered `objectInput` and `gainOutput`.
    pub fn component(context: SignalFlowContext, name: &str, objects: usize) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let object_input = b.parameter_input(
            "objectInput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        let gain_output = b.parameter_output(
            "gainOutput",
            Matrix::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Matrix {
                rows: 1,
                columns: objects,
            },
        )?;
        Ok(b.into_atomic(DiffusionGainCalculator {
            object_input,
            gain_output,
            gains: vec![0.0; objects],
        }))
    }

    fn calculate(&mut self, objects: &ObjectVector) {
        self.gains.fill(0.0);
        for object in objects {
            if object.number_of_channels() != 1 {
                continue;
            }
            let Some(channel) = object.channel_index() else {
                continue;
            };
            let Some(gain) = self.gains.get_mut(channel) else {
                tracing::warn!(
                    object = object.id,
                    channel,
                    limit = self.gains.len(),
                    "object channel out of range, skipped"
                );
                continue;
            };
            *gain = match object.kind {
                ObjectKind::DiffuseSource => object.level,
                ObjectKind::PointSourceWithDiffuseness { diffuseness, .. } => {
                    object.level * diffuseness
                }
                _ => 0.0,
            };
        }
    }
}

impl AtomicProcessor for DiffusionGainCalculator {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if !ctx.parameters.changed(self.object_input) {
            return Ok(());
        }
        let objects = ctx.parameters.read::<ObjectVector>(self.object_input)?;
        self.calculate(objects);
        ctx.parameters.reset_changed(self.object_input);

        let out = ctx.parameters.data_mut::<Matrix>(self.gain_output)?;
        if out.rows() != 1 || out.columns() != self.gains.len() {
            return Err(ProcessError::Component(format!(
                "diffuse gain output is {}x{}, expected 1x{}",
                out.rows(),
                out.columns(),
                self.gains.len()
            )));
        }
        out.row_mut(0).copy_from_slice(&self.gains);
        Ok(())
    }
}
