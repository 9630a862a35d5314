//! VBAP gain calculation for the objects of a scene.
//!
//! Produces an `regular loudspeakers x object channels` gain matrix from the
//! current [`ObjectVector`]. Point sources (including the direct path of
//! diffuse and reverberant point sources) and plane waves are panned with
//! [`Vbap`]; channel objects are routed straight to their loudspeakers;
//! diffuse sources get no direct gains.
//!
//! With a separate low-frequency output the main output carries energy
//! preserving (VBIP) gains, the square roots of the amplitude gains
//! renormalised to unit power, while the low-frequency output carries the
//! amplitude gains normalised to unit sum.

use orbis_core::{
    AtomicProcessor, Component, ComponentBuilder, ListenerPosition, Matrix, Parameter,
    ParameterConfig, ParameterPortId, ProcessContext, ProcessError, ProtocolType,
    SignalFlowContext,
};
use orbis_objects::{AudioObject, ObjectKind, ObjectVector};
use orbis_panning::{LoudspeakerArray, Vbap, Vector3};

use crate::error::Result;

/// Optional features of a [`PanningCalculator`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanningOptions {
    /// Adds the `listenerPosition` input.
    pub listener_input: bool,
    /// Adds the `lowFrequencyGainOutput` output.
    pub low_frequency_output: bool,
    /// Snap sources within this angle (degrees) of a loudspeaker to that
    /// loudspeaker. `None` disables the channel lock.
    pub lock_distance: Option<f32>,
}

/// Panning gain calculator component.
pub struct PanningCalculator {
    object_input: ParameterPortId,
    listener_input: Option<ParameterPortId>,
    gain_output: ParameterPortId,
    low_frequency_output: Option<ParameterPortId>,
    vbap: Vbap,
    lock_distance: Option<f32>,
    number_of_objects: usize,
    gains: Matrix,
    low_frequency_gains: Matrix,
    column: Vec<f32>,
    low_frequency_column: Vec<f32>,
}

impl PanningCalculator {
    /// Creates the component for `objects` object channels.
    ///
    /// Ports: double-buffered `objectVectorInput` and `gainOutput`
    /// (`regular x objects`), plus the optional `listenerPosition` and
    /// `lowFrequencyGainOutput`.
    pub fn component(
        context: SignalFlowContext,
        name: &str,
        objects: usize,
        array: &LoudspeakerArray,
        options: PanningOptions,
    ) -> Result<Component> {
        let vbap = Vbap::new(array)?;
        let regular = array.number_of_regular_speakers();
        let gain_config = ParameterConfig::Matrix {
            rows: regular,
            columns: objects,
        };

        let mut b = ComponentBuilder::new(context, name);
        let object_input = b.parameter_input(
            "objectVectorInput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        let listener_input = options
            .listener_input
            .then(|| {
                b.parameter_input(
                    "listenerPosition",
                    ListenerPosition::TYPE,
                    ProtocolType::DoubleBuffering,
                    ParameterConfig::Empty,
                )
            })
            .transpose()?;
        let gain_output = b.parameter_output(
            "gainOutput",
            Matrix::TYPE,
            ProtocolType::DoubleBuffering,
            gain_config.clone(),
        )?;
        let low_frequency_output = options
            .low_frequency_output
            .then(|| {
                b.parameter_output(
                    "lowFrequencyGainOutput",
                    Matrix::TYPE,
                    ProtocolType::DoubleBuffering,
                    gain_config,
                )
            })
            .transpose()?;

        Ok(b.into_atomic(PanningCalculator {
            object_input,
            listener_input,
            gain_output,
            low_frequency_output,
            vbap,
            lock_distance: options.lock_distance,
            number_of_objects: objects,
            gains: Matrix::new(regular, objects),
            low_frequency_gains: Matrix::new(regular, objects),
            column: vec![0.0; regular],
            low_frequency_column: vec![0.0; regular],
        }))
    }

    fn calculate(&mut self, objects: &ObjectVector) {
        self.gains.fill(0.0);
        self.low_frequency_gains.fill(0.0);
        for object in objects {
            if let ObjectKind::ChannelObject { output_channels } = &object.kind {
                self.route_channel_object(object, output_channels);
            } else {
                self.pan_object(object);
            }
        }
    }

    fn route_channel_object(&mut self, object: &AudioObject, output_channels: &[usize]) {
        for (k, &column) in object.channels.iter().enumerate() {
            let Some(&row) = output_channels.get(k) else {
                tracing::warn!(object = object.id, channel = k, "channel object lacks an output channel");
                continue;
            };
            if column >= self.number_of_objects || row >= self.gains.rows() {
                tracing::warn!(object = object.id, column, row, "channel object routing out of range");
                continue;
            }
            self.gains.set(row, column, object.level);
            self.low_frequency_gains.set(row, column, object.level);
        }
    }

    fn pan_object(&mut self, object: &AudioObject) {
        let Some(position) = object.position() else {
            return;
        };
        let Some(column) = object.channel_index() else {
            return;
        };
        if object.number_of_channels() != 1 {
            tracing::warn!(object = object.id, channels = object.number_of_channels(), "only single-channel objects are panned");
            return;
        }
        if column >= self.number_of_objects {
            tracing::warn!(
                object = object.id,
                channel = column,
                limit = self.number_of_objects,
                "object channel out of range, skipped"
            );
            return;
        }

        let plane_wave = matches!(object.kind, ObjectKind::PlaneWave { .. });
        let direction = Vector3::new(position.x, position.y, position.z);
        let locked = self
            .lock_distance
            .and_then(|angle| self.vbap.nearest_speaker(direction, plane_wave, angle));
        match locked {
            Some(speaker) => {
                self.column.fill(0.0);
                self.column[speaker] = 1.0;
            }
            None => {
                self.vbap.calculate_gains(direction, plane_wave, &mut self.column);
            }
        }

        if self.low_frequency_output.is_some() {
            let sum: f32 = self.column.iter().sum();
            let scale = if sum > f32::EPSILON { 1.0 / sum } else { 0.0 };
            for (lf, &g) in self.low_frequency_column.iter_mut().zip(&self.column) {
                *lf = g * scale;
            }
            self.column.iter_mut().for_each(|g| *g = g.max(0.0).sqrt());
            let power: f32 = self.column.iter().map(|g| g * g).sum();
            let scale = if power > f32::EPSILON { power.sqrt().recip() } else { 0.0 };
            self.column.iter_mut().for_each(|g| *g *= scale);
        }

        let direct = object.level * (1.0 - object.diffuseness());
        self.column.iter_mut().for_each(|g| *g *= direct);
        self.gains.set_column(column, &self.column);
        if self.low_frequency_output.is_some() {
            self.low_frequency_column.iter_mut().for_each(|g| *g *= direct);
            self.low_frequency_gains
                .set_column(column, &self.low_frequency_column);
        }
    }
}

fn publish(
    ctx: &mut ProcessContext<'_>,
    port: ParameterPortId,
    gains: &Matrix,
) -> std::result::Result<(), ProcessError> {
    let out = ctx.parameters.data_mut::<Matrix>(port)?;
    if out.copy_from(gains) {
        Ok(())
    } else {
        Err(ProcessError::Component(format!(
            "gain output is {}x{}, expected {}x{}",
            out.rows(),
            out.columns(),
            gains.rows(),
            gains.columns()
        )))
    }
}

impl AtomicProcessor for PanningCalculator {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        let mut listener_moved = false;
        if let Some(port) = self.listener_input
            && ctx.parameters.changed(port)
        {
            let p = *ctx.parameters.read::<ListenerPosition>(port)?;
            ctx.parameters.reset_changed(port);
            match self.vbap.set_listener_position(Vector3::new(p.x, p.y, p.z)) {
                Ok(()) => listener_moved = true,
                Err(e) => tracing::warn!(x = p.x, y = p.y, z = p.z, "listener position rejected: {e}"),
            }
        }
        if !(listener_moved || ctx.parameters.changed(self.object_input)) {
            return Ok(());
        }

        let objects = ctx.parameters.read::<ObjectVector>(self.object_input)?;
        self.calculate(objects);
        ctx.parameters.reset_changed(self.object_input);

        publish(ctx, self.gain_output, &self.gains)?;
        if let Some(port) = self.low_frequency_output {
            publish(ctx, port, &self.low_frequency_gains)?;
        }
        Ok(())
    }
}
