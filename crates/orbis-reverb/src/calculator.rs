//! Per-block parameter calculation for reverb objects.
//!
//! Every reverb object in the scene is assigned to one render channel. For
//! each render channel the calculator produces:
//!
//! - a routing entry from the object's input signal to the render channel
//! - gain, delay, reflection filter and VBAP gains per discrete reflection
//!   (`reflections` slots per channel, unused slots silent)
//! - the gain and delay of the late tail
//! - a [`LateReverbRequest`] whenever the late parameters change
//!
//! Slot `k` of render channel `c` lives at index `c * reflections + k` of
//! the reflection vectors and in that column of the panning matrix.

use orbis_core::{
    AtomicProcessor, BiquadCoefficients, BiquadMatrix, Component, ComponentBuilder, Matrix,
    Parameter, ParameterConfig, ParameterPortId, ProcessContext, ProcessError, ProtocolType,
    SignalFlowContext, SignalRouting, VectorParameter,
};
use orbis_objects::{AudioObject, LateReverb, ObjectId, ObjectKind, ObjectVector};
use orbis_panning::{LoudspeakerArray, Vbap, Vector3};

use crate::allocator::ObjectChannelAllocator;
use crate::error::{Result, ReverbError};
use crate::late::LateReverbRequest;

/// Tolerance for detecting late reverberation changes.
pub const LATE_REVERB_TOLERANCE: f32 = f32::EPSILON;

/// Output parameters of the reverb calculator for all render channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverbParameters {
    /// Object input signal to render channel.
    pub routing: SignalRouting,
    /// Gain per reflection slot.
    pub discrete_gains: VectorParameter,
    /// Delay per reflection slot in seconds.
    pub discrete_delays: VectorParameter,
    /// Wall filter per reflection slot.
    pub discrete_filters: BiquadMatrix,
    /// Loudspeakers x reflection slots.
    pub discrete_panning: Matrix,
    /// Late tail gain per render channel.
    pub late_gains: VectorParameter,
    /// Late tail delay per render channel in seconds.
    pub late_delays: VectorParameter,
}

impl ReverbParameters {
    /// Silent parameters for the given dimensions.
    pub fn new(channels: usize, reflections: usize, sections: usize, loudspeakers: usize) -> Self {
        let slots = channels * reflections;
        Self {
            routing: SignalRouting::new(),
            discrete_gains: VectorParameter::zeros(slots),
            discrete_delays: VectorParameter::zeros(slots),
            discrete_filters: BiquadMatrix::new(slots, sections),
            discrete_panning: Matrix::new(loudspeakers, slots),
            late_gains: VectorParameter::zeros(channels),
            late_delays: VectorParameter::zeros(channels),
        }
    }
}

/// Computes the rendering parameters of reverb objects.
#[derive(Debug, Clone)]
pub struct ReverbParameterCalculator {
    max_objects: usize,
    reflections: usize,
    sections: usize,
    loudspeakers: usize,
    vbap: Vbap,
    allocator: ObjectChannelAllocator,
    previous_late: Vec<LateReverb>,
    found: Vec<ObjectId>,
    panning_gains: Vec<f32>,
}

impl ReverbParameterCalculator {
    /// Creates a calculator for up to `max_objects` reverb objects with
    /// `reflections` discrete reflections of `sections` biquads each.
    pub fn new(
        array: &LoudspeakerArray,
        max_objects: usize,
        reflections: usize,
        sections: usize,
    ) -> Result<Self> {
        let vbap = Vbap::new(array)?;
        let loudspeakers = array.number_of_regular_speakers();
        // The negative onset forces a request for every channel in the first block.
        let unset = LateReverb {
            onset_delay: -1.0,
            ..LateReverb::default()
        };
        Ok(Self {
            max_objects,
            reflections,
            sections,
            loudspeakers,
            vbap,
            allocator: ObjectChannelAllocator::new(max_objects),
            previous_late: vec![unset; max_objects],
            found: Vec::with_capacity(max_objects),
            panning_gains: vec![0.0; loudspeakers],
        })
    }

    /// Maximum number of reverb objects.
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Reflection slots per render channel.
    pub fn reflections(&self) -> usize {
        self.reflections
    }

    /// Biquad sections per reflection.
    pub fn biquad_sections(&self) -> usize {
        self.sections
    }

    /// Number of regular loudspeakers panned to.
    pub fn number_of_loudspeakers(&self) -> usize {
        self.loudspeakers
    }

    /// Silent output parameters matching this calculator.
    pub fn parameters(&self) -> ReverbParameters {
        ReverbParameters::new(self.max_objects, self.reflections, self.sections, self.loudspeakers)
    }

    /// Render channel of an object.
    pub fn channel_for_object(&self, id: ObjectId) -> Option<usize> {
        self.allocator.channel_for_object(id)
    }

    /// Updates `out` for the objects of a scene and appends late reverb
    /// requests to `requests`.
    ///
    /// Errors are recovered per object and the first one is returned after
    /// `out` has been fully updated. When there are more reverb objects than
    /// render channels, objects already holding a channel keep it and the
    /// remaining newcomers are placed in scene order until the channels run
    /// out; the others are dropped. An object with too many reflections or
    /// filter sections has its channel cleared.
    pub fn process(
        &mut self,
        objects: &ObjectVector,
        out: &mut ReverbParameters,
        requests: &mut Vec<LateReverbRequest>,
    ) -> Result<()> {
        self.found.clear();
        for object in objects {
            if !matches!(object.kind, ObjectKind::PointSourceWithReverb { .. }) {
                continue;
            }
            if object.number_of_channels() != 1 {
                tracing::warn!(
                    object = object.id,
                    channels = object.number_of_channels(),
                    "reverb objects must have exactly one channel, skipped"
                );
                continue;
            }
            self.found.push(object.id);
        }
        let mut first_error = self.drop_excess_objects();
        self.allocator.set_objects(&self.found)?;

        for channel in 0..self.max_objects {
            let object = self
                .allocator
                .object_for_channel(channel)
                .and_then(|id| objects.get(id));
            let result = match object {
                Some(object) => self.process_object(object, channel, out, requests),
                None => {
                    self.clear_channel(channel, out, requests);
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::warn!(channel, "reverb object cleared: {e}");
                self.clear_channel(channel, out, requests);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn drop_excess_objects(&mut self) -> Option<ReverbError> {
        let found = self.found.len();
        if found <= self.max_objects {
            return None;
        }
        let allocator = &self.allocator;
        self.found
            .sort_by_key(|&id| allocator.channel_for_object(id).is_none());
        for &id in &self.found[self.max_objects..] {
            tracing::warn!(object = id, "no free reverb render channel, object dropped");
        }
        self.found.truncate(self.max_objects);
        Some(ReverbError::TooManyObjects {
            found,
            max: self.max_objects,
        })
    }

    fn process_object(
        &mut self,
        object: &AudioObject,
        channel: usize,
        out: &mut ReverbParameters,
        requests: &mut Vec<LateReverbRequest>,
    ) -> Result<()> {
        let ObjectKind::PointSourceWithReverb {
            reflections, late, ..
        } = &object.kind
        else {
            return Ok(());
        };
        if reflections.len() > self.reflections {
            return Err(ReverbError::TooManyReflections {
                id: object.id,
                found: reflections.len(),
                max: self.reflections,
            });
        }
        if let Some(r) = reflections.iter().find(|r| r.filter.len() > self.sections) {
            return Err(ReverbError::TooManySections {
                id: object.id,
                found: r.filter.len(),
                max: self.sections,
            });
        }
        let Some(input) = object.channel_index() else {
            return Ok(());
        };
        out.routing.add_routing(input, channel);

        let start = channel * self.reflections;
        for slot in 0..self.reflections {
            let index = start + slot;
            let filter = out.discrete_filters.filter_mut(index);
            filter.fill(BiquadCoefficients::identity());
            let Some(reflection) = reflections.get(slot) else {
                out.discrete_gains[index] = 0.0;
                out.discrete_delays[index] = 0.0;
                for lsp in 0..self.loudspeakers {
                    out.discrete_panning.set(lsp, index, 0.0);
                }
                continue;
            };
            filter[..reflection.filter.len()].copy_from_slice(&reflection.filter);
            out.discrete_gains[index] = object.level * reflection.level;
            out.discrete_delays[index] = reflection.delay;

            let p = reflection.position;
            let position = Vector3::new(p.x, p.y, p.z);
            if self
                .vbap
                .calculate_gains(position, false, &mut self.panning_gains)
                .is_none()
            {
                tracing::warn!(
                    object = object.id,
                    reflection = slot,
                    "reflection direction not covered by the array"
                );
            }
            for (lsp, &g) in self.panning_gains.iter().enumerate() {
                out.discrete_panning.set(lsp, index, g);
            }
        }

        out.late_gains[channel] = object.level;
        out.late_delays[channel] = 0.0;
        let previous = &mut self.previous_late[channel];
        if !previous.approx_eq(late, LATE_REVERB_TOLERANCE) {
            previous.clone_from(late);
            requests.push(LateReverbRequest::new(channel, late.clone()));
        }
        Ok(())
    }

    fn clear_channel(
        &mut self,
        channel: usize,
        out: &mut ReverbParameters,
        requests: &mut Vec<LateReverbRequest>,
    ) {
        out.routing.remove_entry(channel);
        let start = channel * self.reflections;
        for index in start..start + self.reflections {
            out.discrete_filters
                .filter_mut(index)
                .fill(BiquadCoefficients::identity());
            out.discrete_gains[index] = 0.0;
            out.discrete_delays[index] = 0.0;
            for lsp in 0..self.loudspeakers {
                out.discrete_panning.set(lsp, index, 0.0);
            }
        }
        out.late_gains[channel] = 0.0;
        out.late_delays[channel] = 0.0;

        let silent = LateReverb::default();
        let previous = &mut self.previous_late[channel];
        if !previous.approx_eq(&silent, LATE_REVERB_TOLERANCE) {
            *previous = silent.clone();
            requests.push(LateReverbRequest::new(channel, silent));
        }
    }

    /// Wraps the calculator into an atomic component.
    ///
    /// Input `objectInput` (double-buffered [`ObjectVector`]); double-buffered
    /// outputs `signalRoutingOutput`, `discreteGainOutput`,
    /// `discreteDelayOutput`, `discreteFilterOutput`,
    /// `discretePanningOutput`, `lateGainOutput`, `lateDelayOutput`; and the
    /// message-queue output `lateSubbandOutput`.
    pub fn component(self, context: SignalFlowContext, name: &str) -> Result<Component> {
        let slots = self.max_objects * self.reflections;
        let vector = |size| ParameterConfig::Vector { size };
        let mut b = ComponentBuilder::new(context, name);
        let objects = b.parameter_input(
            "objectInput",
            ObjectVector::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        let routing = b.parameter_output(
            "signalRoutingOutput",
            SignalRouting::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Empty,
        )?;
        let discrete_gains = b.parameter_output(
            "discreteGainOutput",
            VectorParameter::TYPE,
            ProtocolType::DoubleBuffering,
            vector(slots),
        )?;
        let discrete_delays = b.parameter_output(
            "discreteDelayOutput",
            VectorParameter::TYPE,
            ProtocolType::DoubleBuffering,
            vector(slots),
        )?;
        let discrete_filters = b.parameter_output(
            "discreteFilterOutput",
            BiquadMatrix::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Biquad {
                filters: slots,
                sections: self.sections,
            },
        )?;
        let discrete_panning = b.parameter_output(
            "discretePanningOutput",
            Matrix::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Matrix {
                rows: self.loudspeakers,
                columns: slots,
            },
        )?;
        let late_gains = b.parameter_output(
            "lateGainOutput",
            VectorParameter::TYPE,
            ProtocolType::DoubleBuffering,
            vector(self.max_objects),
        )?;
        let late_delays = b.parameter_output(
            "lateDelayOutput",
            VectorParameter::TYPE,
            ProtocolType::DoubleBuffering,
            vector(self.max_objects),
        )?;
        let late_requests = b.parameter_output(
            "lateSubbandOutput",
            LateReverbRequest::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )?;
        let parameters = self.parameters();
        Ok(b.into_atomic(ReverbParameterProcessor {
            calculator: self,
            parameters,
            requests: Vec::new(),
            ports: OutputPorts {
                objects,
                routing,
                discrete_gains,
                discrete_delays,
                discrete_filters,
                discrete_panning,
                late_gains,
                late_delays,
                late_requests,
            },
        }))
    }
}

struct OutputPorts {
    objects: ParameterPortId,
    routing: ParameterPortId,
    discrete_gains: ParameterPortId,
    discrete_delays: ParameterPortId,
    discrete_filters: ParameterPortId,
    discrete_panning: ParameterPortId,
    late_gains: ParameterPortId,
    late_delays: ParameterPortId,
    late_requests: ParameterPortId,
}

struct ReverbParameterProcessor {
    calculator: ReverbParameterCalculator,
    parameters: ReverbParameters,
    requests: Vec<LateReverbRequest>,
    ports: OutputPorts,
}

fn copy_vector(dst: &mut VectorParameter, src: &VectorParameter) -> std::result::Result<(), ProcessError> {
    if dst.len() != src.len() {
        return Err(ProcessError::Component(format!(
            "vector parameter holds {} elements, expected {}",
            dst.len(),
            src.len()
        )));
    }
    dst.copy_from_slice(src);
    Ok(())
}

impl ReverbParameterProcessor {
    fn publish(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        let p = &self.parameters;
        let ports = &self.ports;
        ctx.parameters
            .data_mut::<SignalRouting>(ports.routing)?
            .clone_from(&p.routing);
        copy_vector(ctx.parameters.data_mut(ports.discrete_gains)?, &p.discrete_gains)?;
        copy_vector(ctx.parameters.data_mut(ports.discrete_delays)?, &p.discrete_delays)?;
        copy_vector(ctx.parameters.data_mut(ports.late_gains)?, &p.late_gains)?;
        copy_vector(ctx.parameters.data_mut(ports.late_delays)?, &p.late_delays)?;

        let filters = ctx.parameters.data_mut::<BiquadMatrix>(ports.discrete_filters)?;
        if filters.filters() != p.discrete_filters.filters()
            || filters.sections() != p.discrete_filters.sections()
        {
            return Err(ProcessError::Component(
                "reflection filter matrix has the wrong shape".to_owned(),
            ));
        }
        for i in 0..filters.filters() {
            filters.filter_mut(i).copy_from_slice(p.discrete_filters.filter(i));
        }
        if !ctx
            .parameters
            .data_mut::<Matrix>(ports.discrete_panning)?
            .copy_from(&p.discrete_panning)
        {
            return Err(ProcessError::Component(
                "reflection panning matrix has the wrong shape".to_owned(),
            ));
        }
        for request in self.requests.drain(..) {
            ctx.parameters.send(ports.late_requests, request)?;
        }
        Ok(())
    }
}

impl AtomicProcessor for ReverbParameterProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        if !ctx.parameters.changed(self.ports.objects) {
            return Ok(());
        }
        let objects = ctx.parameters.read::<ObjectVector>(self.ports.objects)?;
        let result = self
            .calculator
            .process(objects, &mut self.parameters, &mut self.requests);
        ctx.parameters.reset_changed(self.ports.objects);
        if let Err(e) = result {
            tracing::warn!("reverb parameters recovered: {e}");
        }
        self.publish(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_objects::{DiscreteReflection, LATE_REVERB_SUBBANDS, Position};

    fn square() -> LoudspeakerArray {
        LoudspeakerArray::builder()
            .two_d(true)
            .speaker(1, 1, Vector3::new(1.0, 0.0, 0.0))
            .speaker(2, 2, Vector3::new(0.0, 1.0, 0.0))
            .speaker(3, 3, Vector3::new(-1.0, 0.0, 0.0))
            .speaker(4, 4, Vector3::new(0.0, -1.0, 0.0))
            .triplet(&[1, 2])
            .triplet(&[2, 3])
            .triplet(&[3, 4])
            .triplet(&[4, 1])
            .build()
            .unwrap()
    }

    fn late(level: f32) -> LateReverb {
        LateReverb {
            onset_delay: 0.01,
            levels: [level; LATE_REVERB_SUBBANDS],
            decay_coeffs: [-5.0; LATE_REVERB_SUBBANDS],
            attack_times: [0.005; LATE_REVERB_SUBBANDS],
        }
    }

    fn reflection(x: f32, y: f32, level: f32) -> DiscreteReflection {
        DiscreteReflection {
            position: Position::new(x, y, 0.0),
            delay: 0.02,
            level,
            filter: vec![BiquadCoefficients::new(0.5, 0.0, 0.0, 0.0, 0.0)],
        }
    }

    fn reverb_object(id: u32, input: usize, reflections: Vec<DiscreteReflection>) -> AudioObject {
        AudioObject::new(
            id,
            ObjectKind::PointSourceWithReverb {
                position: Position::new(1.0, 0.0, 0.0),
                reflections,
                late: late(0.3),
            },
        )
        .with_channels(vec![input])
        .with_level(0.5)
    }

    fn setup(max: usize) -> (ReverbParameterCalculator, ReverbParameters) {
        let calc = ReverbParameterCalculator::new(&square(), max, 2, 2).unwrap();
        let params = calc.parameters();
        (calc, params)
    }

    #[test]
    fn first_block_requests_every_channel() {
        let (mut calc, mut out) = setup(2);
        let mut requests = Vec::new();
        let scene: ObjectVector = [reverb_object(4, 3, vec![reflection(0.0, 1.0, 0.8)])]
            .into_iter()
            .collect();
        calc.process(&scene, &mut out, &mut requests).unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], LateReverbRequest::new(0, late(0.3)));
        assert_eq!(requests[1], LateReverbRequest::new(1, LateReverb::default()));
        assert_eq!(out.routing.input_for(0), Some(3));
        assert_eq!(out.routing.input_for(1), None);
        assert!((out.discrete_gains[0] - 0.4).abs() < 1e-6);
        assert_eq!(out.discrete_gains[1], 0.0);
        assert_eq!(out.discrete_delays[0], 0.02);
        assert_eq!(out.discrete_filters.filter(0)[0].b0, 0.5);
        assert_eq!(out.discrete_filters.filter(0)[1], BiquadCoefficients::identity());
        assert_eq!(out.discrete_filters.filter(1)[0], BiquadCoefficients::identity());
        assert!((out.discrete_panning.get(1, 0) - 1.0).abs() < 1e-5);
        assert_eq!(out.discrete_panning.get(0, 1), 0.0);
        assert_eq!(out.late_gains.0, vec![0.5, 0.0]);
    }

    #[test]
    fn unchanged_parameters_send_no_request() {
        let (mut calc, mut out) = setup(1);
        let scene: ObjectVector = [reverb_object(1, 0, vec![])].into_iter().collect();
        let mut requests = Vec::new();
        calc.process(&scene, &mut out, &mut requests).unwrap();
        assert_eq!(requests.len(), 1);
        requests.clear();
        calc.process(&scene, &mut out, &mut requests).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn removal_clears_channel_once() {
        let (mut calc, mut out) = setup(2);
        let mut requests = Vec::new();
        let both: ObjectVector = [
            reverb_object(1, 0, vec![reflection(1.0, 0.0, 1.0)]),
            reverb_object(2, 1, vec![reflection(0.0, 1.0, 1.0)]),
        ]
        .into_iter()
        .collect();
        calc.process(&both, &mut out, &mut requests).unwrap();
        assert_eq!(calc.channel_for_object(2), Some(1));
        requests.clear();

        let only_second: ObjectVector = [reverb_object(2, 1, vec![reflection(0.0, 1.0, 1.0)])]
            .into_iter()
            .collect();
        calc.process(&only_second, &mut out, &mut requests).unwrap();
        assert_eq!(requests, vec![LateReverbRequest::new(0, LateReverb::default())]);
        assert_eq!(calc.channel_for_object(2), Some(1));
        assert_eq!(out.routing.input_for(0), None);
        assert_eq!(out.discrete_gains[0], 0.0);
        assert_eq!(out.discrete_panning.get(0, 0), 0.0);
        assert_eq!(out.late_gains.0, vec![0.0, 0.5]);

        requests.clear();
        calc.process(&only_second, &mut out, &mut requests).unwrap();
        assert!(requests.is_empty());
    }

    #[test]
    fn non_reverb_and_multichannel_objects_are_ignored() {
        let (mut calc, mut out) = setup(1);
        let scene: ObjectVector = [
            AudioObject::point(1, 0, Position::new(1.0, 0.0, 0.0)),
            reverb_object(2, 0, vec![]).with_channels(vec![0, 1]),
        ]
        .into_iter()
        .collect();
        let mut requests = Vec::new();
        calc.process(&scene, &mut out, &mut requests).unwrap();
        assert!(out.routing.is_empty());
        assert_eq!(calc.channel_for_object(2), None);
    }

    #[test]
    fn excess_objects_are_dropped_and_reported() {
        let (mut calc, mut out) = setup(1);
        let scene: ObjectVector = [reverb_object(1, 0, vec![]), reverb_object(2, 1, vec![])]
            .into_iter()
            .collect();
        let mut requests = Vec::new();
        let err = calc.process(&scene, &mut out, &mut requests).unwrap_err();
        assert!(matches!(err, ReverbError::TooManyObjects { found: 2, max: 1 }));
        assert_eq!(calc.channel_for_object(1), Some(0));
        assert_eq!(calc.channel_for_object(2), None);
        assert_eq!(out.routing.input_for(0), Some(0));
        assert_eq!(out.late_gains.0, vec![0.5]);
        assert_eq!(requests, vec![LateReverbRequest::new(0, late(0.3))]);
    }

    #[test]
    fn placed_objects_keep_their_channel_on_overflow() {
        let (mut calc, mut out) = setup(1);
        let mut requests = Vec::new();
        let second: ObjectVector = [reverb_object(2, 1, vec![])].into_iter().collect();
        calc.process(&second, &mut out, &mut requests).unwrap();

        let both: ObjectVector = [reverb_object(1, 0, vec![]), reverb_object(2, 1, vec![])]
            .into_iter()
            .collect();
        assert!(calc.process(&both, &mut out, &mut requests).is_err());
        assert_eq!(calc.channel_for_object(2), Some(0));
        assert_eq!(calc.channel_for_object(1), None);
        assert_eq!(out.routing.input_for(0), Some(1));
    }

    #[test]
    fn too_many_reflections_clears_the_channel() {
        let (mut calc, mut out) = setup(2);
        let refl = vec![reflection(1.0, 0.0, 1.0); 3];
        let scene: ObjectVector = [reverb_object(1, 0, refl), reverb_object(2, 1, vec![])]
            .into_iter()
            .collect();
        let mut requests = Vec::new();
        let err = calc.process(&scene, &mut out, &mut requests).unwrap_err();
        assert!(matches!(err, ReverbError::TooManyReflections { id: 1, found: 3, max: 2 }));
        assert_eq!(out.routing.input_for(0), None);
        assert_eq!(out.routing.input_for(1), Some(1));
        assert_eq!(out.late_gains.0, vec![0.0, 0.5]);
    }
}
