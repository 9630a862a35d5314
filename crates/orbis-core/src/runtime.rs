//! Block-processing runtime.
//!
//! [`AudioSignalFlow`] owns everything needed to render one block: the sample
//! arena, the parameter bus, the atomic processors in execution order and the
//! endpoints for the top-level parameter ports. Construction does all the
//! setup work (flattening, slot assignment, default parameter values);
//! [`AudioSignalFlow::process`] only copies, calls and publishes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::component::atomic::{AudioBinding, ParameterPortSlots};
use crate::component::{
    AtomicProcessor, AudioBlock, Component, ComponentBuilder, ComponentKind, ParameterAccess,
    PortDirection, ProcessContext, THIS,
};
use crate::context::SignalFlowContext;
use crate::error::{ProcessError, Result};
use crate::graph::{ArenaLayout, FlatGraph, PortKey, flatten};
use crate::parameter::{
    ExternalInput, ExternalOutput, Mailbox, ParameterBus, ParameterReceiver, ParameterRegistry,
    ParameterSender, ParameterSlot, ProtocolType,
};

/// Outcome of one [`AudioSignalFlow::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// The block was rendered.
    Continue,
    /// A component failed; the playback buffers hold silence.
    Silenced,
    /// The buffers do not match the flow's channel counts or period.
    Abort,
}

struct ScheduledAtom {
    full_name: String,
    processor: Box<dyn AtomicProcessor>,
    audio: AudioBinding,
    /// One past the last arena slot owned by this atom.
    out_end: usize,
    parameters: Vec<ParameterPortSlots>,
    seen: Vec<u64>,
}

/// Executable signal flow.
pub struct AudioSignalFlow {
    context: SignalFlowContext,
    arena: Vec<f32>,
    capture_channels: usize,
    playback_slots: Vec<usize>,
    capture_names: Vec<String>,
    playback_names: Vec<String>,
    atoms: Vec<ScheduledAtom>,
    bus: ParameterBus,
    external_inputs: Vec<ExternalInput>,
    external_outputs: Vec<ExternalOutput>,
    senders: Vec<ParameterSender>,
    receivers: Vec<ParameterReceiver>,
    last_error: Option<(usize, ProcessError)>,
}

impl std::fmt::Debug for AudioSignalFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSignalFlow")
            .field("context", &self.context)
            .field("schedule", &self.schedule())
            .field("arena_slots", &self.arena_slots())
            .finish_non_exhaustive()
    }
}

/// Wraps an atomic component into a composite exposing the same ports.
fn wrap_atomic(atom: Component) -> Result<Component> {
    let mut b = ComponentBuilder::new(atom.context(), atom.name());
    for p in atom.audio_ports() {
        match p.direction() {
            PortDirection::Input => b.audio_input(p.name(), p.width())?,
            PortDirection::Output => b.audio_output(p.name(), p.width())?,
        };
    }
    for p in atom.parameter_ports() {
        let (ty, protocol, config) = (p.parameter_type(), p.protocol(), p.config().clone());
        match p.direction() {
            PortDirection::Input => b.parameter_input(p.name(), ty, protocol, config)?,
            PortDirection::Output => b.parameter_output(p.name(), ty, protocol, config)?,
        };
    }
    let name = atom.name().to_owned();
    let audio: Vec<(String, PortDirection)> = atom
        .audio_ports()
        .iter()
        .map(|p| (p.name().to_owned(), p.direction()))
        .collect();
    let parameters: Vec<(String, PortDirection)> = atom
        .parameter_ports()
        .iter()
        .map(|p| (p.name().to_owned(), p.direction()))
        .collect();

    let mut top = b.into_composite();
    top.add_child(atom)?;
    for (port, direction) in &audio {
        match direction {
            PortDirection::Input => top.connect_audio_ports(THIS, port, &name, port)?,
            PortDirection::Output => top.connect_audio_ports(&name, port, THIS, port)?,
        }
    }
    for (port, direction) in &parameters {
        match direction {
            PortDirection::Input => top.parameter_connection(THIS, port, &name, port)?,
            PortDirection::Output => top.parameter_connection(&name, port, THIS, port)?,
        }
    }
    Ok(top)
}

/// Moves the processors out of the hierarchy in pre-order.
fn take_processors(component: Component, out: &mut Vec<Option<Box<dyn AtomicProcessor>>>) {
    match component.into_kind() {
        ComponentKind::Atomic(processor) => out.push(Some(processor)),
        ComponentKind::Composite(composite) => {
            for child in composite.children {
                take_processors(child, out);
            }
        }
    }
}

/// Parameter slot assignment of a flattened graph.
#[derive(Default)]
struct ParameterLayout {
    bus: ParameterBus,
    /// Slot owned by each shared or double-buffered sender.
    sender_slot: BTreeMap<PortKey, usize>,
    /// Receiver queues fed by each message-queue sender.
    queues: BTreeMap<PortKey, Vec<usize>>,
    /// Slot read by each receiver.
    receiver_slot: BTreeMap<PortKey, usize>,
}

impl ParameterLayout {
    fn new(flat: &FlatGraph, registry: &ParameterRegistry) -> Self {
        let mut layout = Self::default();
        for (component, c) in flat.components.iter().enumerate() {
            let is_top = component == 0;
            if !is_top && !c.atomic {
                continue;
            }
            for (port, p) in c.parameter_ports.iter().enumerate() {
                let sends = if is_top {
                    p.direction() == PortDirection::Input
                } else {
                    p.direction() == PortDirection::Output
                };
                if !sends {
                    continue;
                }
                let key = PortKey { component, port };
                if p.protocol() == ProtocolType::MessageQueue {
                    layout.queues.insert(key, Vec::new());
                } else {
                    let initial = registry.create(p.parameter_type(), p.config());
                    let slot = layout.bus.push(ParameterSlot::new(
                        p.protocol(),
                        p.parameter_type(),
                        initial,
                    ));
                    layout.sender_slot.insert(key, slot);
                }
            }
        }

        for (&receiver, &source) in &flat.parameter_sources {
            let p = &flat.components[receiver.component].parameter_ports[receiver.port];
            let slot = match (p.protocol(), source) {
                (ProtocolType::MessageQueue, source) => {
                    let slot = layout.bus.push(ParameterSlot::new(
                        ProtocolType::MessageQueue,
                        p.parameter_type(),
                        None,
                    ));
                    if let Some(queues) = source.and_then(|s| layout.queues.get_mut(&s)) {
                        queues.push(slot);
                    }
                    slot
                }
                (_, Some(sender)) => layout.sender_slot[&sender],
                (protocol, None) => {
                    let initial = registry.create(p.parameter_type(), p.config());
                    layout
                        .bus
                        .push(ParameterSlot::new(protocol, p.parameter_type(), initial))
                }
            };
            layout.receiver_slot.insert(receiver, slot);
        }
        layout
    }

    fn port_slots(&self, key: PortKey, direction: PortDirection, protocol: ProtocolType) -> Vec<usize> {
        match (direction, protocol) {
            (PortDirection::Input, _) => vec![self.receiver_slot[&key]],
            (PortDirection::Output, ProtocolType::MessageQueue) => self.queues[&key].clone(),
            (PortDirection::Output, _) => vec![self.sender_slot[&key]],
        }
    }
}

impl AudioSignalFlow {
    /// Builds an executable flow from a component hierarchy.
    ///
    /// An atomic top-level component is wrapped into a composite with the
    /// same ports. All configuration and topology errors surface here.
    pub fn new(top: Component, registry: &ParameterRegistry) -> Result<Self> {
        let mut top = if top.is_atomic() {
            wrap_atomic(top)?
        } else {
            top
        };
        top.finalize();
        let context = top.context();
        let flat = flatten(&top, registry)?;
        let arena = ArenaLayout::new(&flat);
        let mut params = ParameterLayout::new(&flat, registry);

        let mut processors = Vec::with_capacity(flat.atoms.len());
        take_processors(top, &mut processors);
        let mut by_component: BTreeMap<usize, Option<Box<dyn AtomicProcessor>>> =
            flat.atoms.iter().copied().zip(processors).collect();

        let mut atoms = Vec::with_capacity(flat.schedule.len());
        for (&component, audio) in flat.schedule.iter().zip(arena.atoms) {
            let c = &flat.components[component];
            let Some(processor) = by_component.get_mut(&component).and_then(Option::take) else {
                continue;
            };
            let outputs: usize = c
                .audio_ports
                .iter()
                .filter(|p| p.direction() == PortDirection::Output)
                .map(|p| p.width())
                .sum();
            let parameters: Vec<ParameterPortSlots> = c
                .parameter_ports
                .iter()
                .enumerate()
                .map(|(port, p)| ParameterPortSlots {
                    direction: p.direction(),
                    protocol: p.protocol(),
                    parameter_type: p.parameter_type(),
                    slots: params.port_slots(PortKey { component, port }, p.direction(), p.protocol()),
                })
                .collect();
            atoms.push(ScheduledAtom {
                full_name: c.full_name.clone(),
                processor,
                out_end: audio.out_start + outputs,
                seen: vec![u64::MAX; parameters.len()],
                audio,
                parameters,
            });
        }

        let top = flat.top();
        let mut external_inputs = Vec::new();
        let mut external_outputs = Vec::new();
        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for (port, p) in top.parameter_ports.iter().enumerate() {
            let key = PortKey { component: 0, port };
            let mailbox = Mailbox::new(p.protocol(), p.parameter_type());
            match p.direction() {
                PortDirection::Input => {
                    let slots = params.port_slots(key, PortDirection::Output, p.protocol());
                    senders.push(ParameterSender::new(p.name().to_owned(), Arc::clone(&mailbox)));
                    external_inputs.push(ExternalInput {
                        name: p.name().to_owned(),
                        mailbox,
                        slots,
                    });
                }
                PortDirection::Output => {
                    receivers.push(ParameterReceiver::new(p.name().to_owned(), Arc::clone(&mailbox)));
                    external_outputs.push(ExternalOutput {
                        name: p.name().to_owned(),
                        mailbox,
                        slot: params.receiver_slot[&key],
                        seen: 0,
                    });
                }
            }
        }

        let port_names = |direction: PortDirection| -> Vec<String> {
            top.audio_ports
                .iter()
                .filter(|p| p.direction() == direction)
                .map(|p| p.name().to_owned())
                .collect()
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "signal flow ready: {} atoms, {} arena slots, {} parameter slots, {} in / {} out",
            atoms.len(),
            arena.slots,
            params.bus.len(),
            arena.capture,
            arena.playback.len()
        );

        Ok(Self {
            context,
            arena: vec![0.0; arena.slots * context.period()],
            capture_channels: arena.capture,
            playback_slots: arena.playback,
            capture_names: port_names(PortDirection::Input),
            playback_names: port_names(PortDirection::Output),
            atoms,
            bus: std::mem::take(&mut params.bus),
            external_inputs,
            external_outputs,
            senders,
            receivers,
            last_error: None,
        })
    }

    /// Renders one block.
    ///
    /// `capture` holds one slice per top-level input channel and `playback`
    /// one per top-level output channel, each exactly [`period`](Self::period)
    /// samples long. Does not allocate or block.
    pub fn process(&mut self, capture: &[&[f32]], playback: &mut [&mut [f32]]) -> CallbackResult {
        let period = self.context.period();
        if capture.len() != self.capture_channels
            || playback.len() != self.playback_slots.len()
            || capture.iter().any(|c| c.len() != period)
            || playback.iter().any(|p| p.len() != period)
        {
            return CallbackResult::Abort;
        }

        for (slot, input) in capture.iter().enumerate() {
            self.arena[slot * period..(slot + 1) * period].copy_from_slice(input);
        }
        if !self.run_schedule() {
            for out in playback.iter_mut() {
                out.fill(0.0);
            }
            return CallbackResult::Silenced;
        }
        for (out, &slot) in playback.iter_mut().zip(&self.playback_slots) {
            out.copy_from_slice(&self.arena[slot * period..(slot + 1) * period]);
        }
        CallbackResult::Continue
    }

    /// Renders one block from channel-major buffers.
    ///
    /// Channel `c` occupies `c * period..(c + 1) * period` of `capture` and
    /// `playback`. Same semantics as [`process`](Self::process), for callers
    /// that keep their block buffers contiguous.
    pub fn process_planar(&mut self, capture: &[f32], playback: &mut [f32]) -> CallbackResult {
        let period = self.context.period();
        if capture.len() != self.capture_channels * period
            || playback.len() != self.playback_slots.len() * period
        {
            return CallbackResult::Abort;
        }

        // Capture channels occupy the first arena slots.
        self.arena[..capture.len()].copy_from_slice(capture);
        if !self.run_schedule() {
            playback.fill(0.0);
            return CallbackResult::Silenced;
        }
        for (out, &slot) in playback.chunks_exact_mut(period.max(1)).zip(&self.playback_slots) {
            out.copy_from_slice(&self.arena[slot * period..(slot + 1) * period]);
        }
        CallbackResult::Continue
    }

    /// Runs every atom once. Returns `false` if a component failed.
    fn run_schedule(&mut self) -> bool {
        let period = self.context.period();
        let sample_rate = self.context.sample_rate();
        for input in &self.external_inputs {
            input.drain_into(&mut self.bus);
        }

        for (idx, atom) in self.atoms.iter_mut().enumerate() {
            let out_start = atom.audio.out_start;
            let (inputs, rest) = self.arena.split_at_mut(out_start * period);
            let outputs = &mut rest[..(atom.out_end - out_start) * period];
            let audio = AudioBlock::new(period, sample_rate, inputs, outputs, &atom.audio);
            let parameters = ParameterAccess::new(&atom.parameters, &mut atom.seen, &mut self.bus);
            let mut ctx = ProcessContext::new(audio, parameters);
            if let Err(err) = atom.processor.process(&mut ctx) {
                #[cfg(feature = "tracing")]
                tracing::error!(component = %atom.full_name, "processing failed, block silenced: {err}");
                self.last_error = Some((idx, err));
                return false;
            }
        }

        for output in &mut self.external_outputs {
            output.publish(&mut self.bus);
        }
        true
    }

    /// Sampling context.
    pub fn context(&self) -> SignalFlowContext {
        self.context
    }

    /// Samples per block.
    pub fn period(&self) -> usize {
        self.context.period()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.context.sample_rate()
    }

    /// Total width of the top-level audio inputs.
    pub fn number_of_capture_channels(&self) -> usize {
        self.capture_channels
    }

    /// Total width of the top-level audio outputs.
    pub fn number_of_playback_channels(&self) -> usize {
        self.playback_slots.len()
    }

    /// Names of the top-level audio input ports.
    pub fn capture_port_names(&self) -> &[String] {
        &self.capture_names
    }

    /// Names of the top-level audio output ports.
    pub fn playback_port_names(&self) -> &[String] {
        &self.playback_names
    }

    /// Full names of the atomic components in execution order.
    pub fn schedule(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.full_name.as_str()).collect()
    }

    /// Number of one-block slots in the sample arena.
    pub fn arena_slots(&self) -> usize {
        self.arena.len() / self.context.period().max(1)
    }

    /// Handle feeding the top-level parameter input `name`.
    pub fn parameter_sender(&self, name: &str) -> Option<ParameterSender> {
        self.senders.iter().find(|s| s.name() == name).cloned()
    }

    /// Handle reading the top-level parameter output `name`.
    pub fn parameter_receiver(&self, name: &str) -> Option<ParameterReceiver> {
        self.receivers.iter().find(|r| r.name() == name).cloned()
    }

    /// Component name and error of the most recent silenced block.
    pub fn take_last_error(&mut self) -> Option<(String, ProcessError)> {
        self.last_error
            .take()
            .map(|(idx, err)| (self.atoms[idx].full_name.clone(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{AudioPortId, ParameterPortId};
    use crate::parameter::{Parameter, ParameterConfig, VectorParameter};

    fn ctx() -> SignalFlowContext {
        SignalFlowContext::new(4, 48000.0)
    }

    struct Scale {
        input: AudioPortId,
        output: AudioPortId,
        gains: ParameterPortId,
    }

    impl AtomicProcessor for Scale {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
            let gains = ctx.parameters.read::<VectorParameter>(self.gains)?;
            let inputs = ctx.audio.inputs();
            for (ch, out) in ctx.audio.output_port(self.output).enumerate() {
                let g = gains.get(ch).copied().unwrap_or(0.0);
                for (o, i) in out.iter_mut().zip(inputs.input(self.input, ch)) {
                    *o = g * i;
                }
            }
            Ok(())
        }
    }

    fn scale(name: &str, width: usize, protocol: ProtocolType) -> Component {
        let mut b = ComponentBuilder::new(ctx(), name);
        let input = b.audio_input("in", width).unwrap();
        let output = b.audio_output("out", width).unwrap();
        let gains = b
            .parameter_input(
                "gains",
                VectorParameter::TYPE,
                protocol,
                ParameterConfig::Vector { size: width },
            )
            .unwrap();
        b.into_atomic(Scale {
            input,
            output,
            gains,
        })
    }

    struct Fail;

    impl AtomicProcessor for Fail {
        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
            Err(ProcessError::Component("boom".into()))
        }
    }

    #[test]
    fn atomic_top_level_is_wrapped() {
        let registry = ParameterRegistry::with_core_types();
        let mut flow = AudioSignalFlow::new(scale("gain", 2, ProtocolType::SharedData), &registry).unwrap();
        assert_eq!(flow.number_of_capture_channels(), 2);
        assert_eq!(flow.number_of_playback_channels(), 2);
        assert_eq!(flow.schedule(), vec!["gain"]);

        let sender = flow.parameter_sender("gains").unwrap();
        sender.send(VectorParameter(vec![0.5, 2.0])).unwrap();

        let a = [1.0; 4];
        let b = [3.0; 4];
        let mut o1 = [0.0; 4];
        let mut o2 = [0.0; 4];
        let result = flow.process(&[&a, &b], &mut [&mut o1, &mut o2]);
        assert_eq!(result, CallbackResult::Continue);
        assert_eq!(o1, [0.5; 4]);
        assert_eq!(o2, [6.0; 4]);
    }

    #[test]
    fn unconnected_gain_input_uses_default() {
        let mut b = ComponentBuilder::new(ctx(), "top");
        b.audio_input("input", 1).unwrap();
        b.audio_output("output", 1).unwrap();
        let mut top = b.into_composite();
        top.add_child(scale("g", 1, ProtocolType::SharedData)).unwrap();
        top.connect_audio_ports("this", "input", "g", "in").unwrap();
        top.connect_audio_ports("g", "out", "this", "output").unwrap();
        let mut flow = AudioSignalFlow::new(top, &ParameterRegistry::with_core_types()).unwrap();
        assert!(flow.parameter_sender("gains").is_none());
        let a = [1.0; 4];
        let mut o = [9.0; 4];
        assert_eq!(flow.process(&[&a], &mut [&mut o]), CallbackResult::Continue);
        // Default vector is all zeros.
        assert_eq!(o, [0.0; 4]);
    }

    #[test]
    fn shape_mismatch_aborts() {
        let registry = ParameterRegistry::with_core_types();
        let mut flow = AudioSignalFlow::new(scale("gain", 1, ProtocolType::SharedData), &registry).unwrap();
        let short = [0.0; 3];
        let mut o = [0.0; 4];
        assert_eq!(flow.process(&[&short], &mut [&mut o]), CallbackResult::Abort);
        assert_eq!(flow.process(&[], &mut [&mut o]), CallbackResult::Abort);
    }

    #[test]
    fn component_error_silences_block() {
        let mut b = ComponentBuilder::new(ctx(), "top");
        b.audio_input("input", 1).unwrap();
        b.audio_output("output", 1).unwrap();
        let mut top = b.into_composite();
        let mut fb = ComponentBuilder::new(ctx(), "broken");
        fb.audio_input("in", 1).unwrap();
        fb.audio_output("out", 1).unwrap();
        top.add_child(fb.into_atomic(Fail)).unwrap();
        top.connect_audio_ports("this", "input", "broken", "in").unwrap();
        top.connect_audio_ports("broken", "out", "this", "output").unwrap();
        let mut flow = AudioSignalFlow::new(top, &ParameterRegistry::with_core_types()).unwrap();

        let a = [1.0; 4];
        let mut o = [7.0; 4];
        assert_eq!(flow.process(&[&a], &mut [&mut o]), CallbackResult::Silenced);
        assert_eq!(o, [0.0; 4]);
        let (name, err) = flow.take_last_error().unwrap();
        assert_eq!(name, "broken");
        assert_eq!(err, ProcessError::Component("boom".into()));
        assert!(flow.take_last_error().is_none());
    }

    #[test]
    fn passthrough_copies_capture_to_playback() {
        let mut b = ComponentBuilder::new(ctx(), "top");
        b.audio_input("input", 2).unwrap();
        b.audio_output("output", 2).unwrap();
        let mut top = b.into_composite();
        top.audio_connection("this", "input", [0, 1], "this", "output", [1, 0])
            .unwrap();
        let mut flow = AudioSignalFlow::new(top, &ParameterRegistry::with_core_types()).unwrap();
        assert_eq!(flow.arena_slots(), 2);
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0; 4];
        let mut o1 = [0.0; 4];
        let mut o2 = [0.0; 4];
        flow.process(&[&a, &b], &mut [&mut o1, &mut o2]);
        assert_eq!(o1, b);
        assert_eq!(o2, a);
        assert_eq!(flow.capture_port_names(), ["input".to_owned()]);
    }

    #[test]
    fn planar_buffers_match_sliced_processing() {
        let registry = ParameterRegistry::with_core_types();
        let mut flow = AudioSignalFlow::new(scale("gain", 2, ProtocolType::SharedData), &registry).unwrap();
        flow.parameter_sender("gains")
            .unwrap()
            .send(VectorParameter(vec![2.0, -1.0]))
            .unwrap();

        let capture = [1.0, 2.0, 3.0, 4.0, 0.5, 0.5, 0.5, 0.5];
        let mut playback = [0.0; 8];
        assert_eq!(flow.process_planar(&capture, &mut playback), CallbackResult::Continue);
        assert_eq!(playback, [2.0, 4.0, 6.0, 8.0, -0.5, -0.5, -0.5, -0.5]);

        let mut short = [0.0; 7];
        assert_eq!(flow.process_planar(&capture, &mut short), CallbackResult::Abort);
    }
}
