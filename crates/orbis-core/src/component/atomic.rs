//! Atomic processors and the per-block processing context.
//!
//! An atomic component owns a boxed [`AtomicProcessor`]. Once per block the
//! runtime calls [`AtomicProcessor::process`] with a [`ProcessContext`] that
//! exposes exactly the audio channels and parameter slots bound to that
//! component's ports.
//!
//! The context is split into two independently borrowable halves so that a
//! processor can hold a parameter reference while writing audio:
//!
//! ```rust,ignore
//! fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
//!     let gains = ctx.parameters.read::<Matrix>(self.gains)?;
//!     let inputs = ctx.audio.inputs();
//!     for (row, out) in ctx.audio.output_port(self.output).enumerate() {
//!         out.fill(0.0);
//!         for col in 0..inputs.width(self.input) {
//!             let g = gains.get(row, col);
//!             for (o, i) in out.iter_mut().zip(inputs.input(self.input, col)) {
//!                 *o += g * i;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::slice::ChunksExactMut;

use super::port::{AudioPortId, ParameterPortId, PortDirection};
use crate::ProcessError;
use crate::parameter::{
    Parameter, ParameterBus, ParameterType, ProtocolType, downcast_boxed, downcast_mut,
    downcast_ref,
};

/// Block-processing behaviour of an atomic component.
///
/// Implementations must not allocate, lock or block in `process`. Failures
/// are reported through the returned [`ProcessError`]; the runtime silences
/// the affected block.
pub trait AtomicProcessor: Send {
    /// Processes one block.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError>;
}

/// Arena slots bound to one audio port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioPortSlots {
    /// One arena slot per channel.
    pub slots: Vec<usize>,
}

/// Arena slots bound to every audio port of one atomic component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AudioBinding {
    pub ports: Vec<AudioPortSlots>,
    /// First arena slot owned by the component's outputs.
    pub out_start: usize,
}

/// Parameter slots bound to one parameter port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParameterPortSlots {
    pub direction: PortDirection,
    pub protocol: ProtocolType,
    pub parameter_type: ParameterType,
    /// Input: the slot to read. Output: the slot written (shared protocols)
    /// or the queues of all receivers (message queues).
    pub slots: Vec<usize>,
}

/// Everything a processor may touch during one block.
pub struct ProcessContext<'a> {
    /// Audio inputs and outputs.
    pub audio: AudioBlock<'a>,
    /// Parameter ports.
    pub parameters: ParameterAccess<'a>,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(audio: AudioBlock<'a>, parameters: ParameterAccess<'a>) -> Self {
        Self { audio, parameters }
    }

    /// Samples per block.
    #[inline]
    pub fn period(&self) -> usize {
        self.audio.period
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.audio.sample_rate
    }
}

/// Read-only view of the signals feeding a component's input ports.
#[derive(Clone, Copy)]
pub struct AudioInputs<'a> {
    period: usize,
    arena: &'a [f32],
    binding: &'a AudioBinding,
}

impl<'a> AudioInputs<'a> {
    /// One block of samples of an input channel.
    ///
    /// # Panics
    ///
    /// Panics if `port` is not an input of this component or `channel` is
    /// not below its width.
    #[inline]
    pub fn input(&self, port: AudioPortId, channel: usize) -> &'a [f32] {
        let arena: &'a [f32] = self.arena;
        let slot = self.binding.ports[port.0].slots[channel];
        &arena[slot * self.period..(slot + 1) * self.period]
    }

    /// Number of channels of a port.
    #[inline]
    pub fn width(&self, port: AudioPortId) -> usize {
        self.binding.ports[port.0].slots.len()
    }
}

/// Audio side of a [`ProcessContext`].
pub struct AudioBlock<'a> {
    period: usize,
    sample_rate: f32,
    inputs: &'a [f32],
    outputs: &'a mut [f32],
    binding: &'a AudioBinding,
}

impl<'a> AudioBlock<'a> {
    pub(crate) fn new(
        period: usize,
        sample_rate: f32,
        inputs: &'a [f32],
        outputs: &'a mut [f32],
        binding: &'a AudioBinding,
    ) -> Self {
        Self {
            period,
            sample_rate,
            inputs,
            outputs,
            binding,
        }
    }

    /// Samples per block.
    #[inline]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Copyable view of all inputs, independent of the output borrow.
    #[inline]
    pub fn inputs(&self) -> AudioInputs<'a> {
        AudioInputs {
            period: self.period,
            arena: self.inputs,
            binding: self.binding,
        }
    }

    /// One block of samples of an input channel.
    #[inline]
    pub fn input(&self, port: AudioPortId, channel: usize) -> &'a [f32] {
        self.inputs().input(port, channel)
    }

    /// Number of channels of a port.
    #[inline]
    pub fn width(&self, port: AudioPortId) -> usize {
        self.binding.ports[port.0].slots.len()
    }

    /// Mutable block of an output channel.
    ///
    /// # Panics
    ///
    /// Panics if `port` is not an output of this component or `channel` is
    /// not below its width.
    #[inline]
    pub fn output(&mut self, port: AudioPortId, channel: usize) -> &mut [f32] {
        let rel = self.binding.ports[port.0].slots[channel] - self.binding.out_start;
        &mut self.outputs[rel * self.period..(rel + 1) * self.period]
    }

    /// All channels of an output port, one chunk per channel.
    pub fn output_port(&mut self, port: AudioPortId) -> ChunksExactMut<'_, f32> {
        let chunk = self.period.max(1);
        let binding: &'a AudioBinding = self.binding;
        let slots = &binding.ports[port.0].slots;
        let Some(&first) = slots.first() else {
            return self.outputs[..0].chunks_exact_mut(chunk);
        };
        let rel = first - self.binding.out_start;
        let range = rel * self.period..(rel + slots.len()) * self.period;
        self.outputs[range].chunks_exact_mut(chunk)
    }

    /// Zeroes every output channel of the component.
    pub fn clear_outputs(&mut self) {
        self.outputs.fill(0.0);
    }
}

/// Parameter side of a [`ProcessContext`].
pub struct ParameterAccess<'a> {
    ports: &'a [ParameterPortSlots],
    seen: &'a mut [u64],
    bus: &'a mut ParameterBus,
}

impl<'a> ParameterAccess<'a> {
    pub(crate) fn new(
        ports: &'a [ParameterPortSlots],
        seen: &'a mut [u64],
        bus: &'a mut ParameterBus,
    ) -> Self {
        Self { ports, seen, bus }
    }

    fn port<T: Parameter>(
        &self,
        port: ParameterPortId,
    ) -> Result<&'a ParameterPortSlots, ProcessError> {
        let ports: &'a [ParameterPortSlots] = self.ports;
        let slots = &ports[port.0];
        if slots.parameter_type != T::TYPE {
            return Err(ProcessError::ParameterType {
                expected: slots.parameter_type.name(),
                found: T::TYPE.name(),
            });
        }
        Ok(slots)
    }

    /// Takes the oldest pending message of a message-queue input.
    pub fn receive<T: Parameter>(
        &mut self,
        port: ParameterPortId,
    ) -> Result<Option<T>, ProcessError> {
        let binding = self.port::<T>(port)?;
        if binding.protocol != ProtocolType::MessageQueue {
            return Err(ProcessError::Protocol(binding.protocol.name()));
        }
        if binding.direction != PortDirection::Input {
            return Err(ProcessError::Direction("input"));
        }
        self.bus
            .slot_mut(binding.slots[0])
            .queue
            .pop_front()
            .map(downcast_boxed::<T>)
            .transpose()
    }

    /// Number of pending messages of a message-queue input.
    pub fn pending(&self, port: ParameterPortId) -> usize {
        let binding = &self.ports[port.0];
        match (binding.protocol, binding.direction) {
            (ProtocolType::MessageQueue, PortDirection::Input) => {
                self.bus.slot(binding.slots[0]).queue.len()
            }
            _ => 0,
        }
    }

    /// Sends a value from an output port.
    ///
    /// Message queues deliver a copy to every connected receiver; shared and
    /// double-buffered ports replace the stored value.
    pub fn send<T: Parameter>(
        &mut self,
        port: ParameterPortId,
        value: T,
    ) -> Result<(), ProcessError> {
        let binding = self.port::<T>(port)?;
        if binding.direction != PortDirection::Output {
            return Err(ProcessError::Direction("output"));
        }
        match binding.protocol {
            ProtocolType::MessageQueue => {
                if let Some((&last, rest)) = binding.slots.split_last() {
                    for &idx in rest {
                        self.bus.slot_mut(idx).queue.push_back(Box::new(value.clone()));
                    }
                    self.bus.slot_mut(last).queue.push_back(Box::new(value));
                }
            }
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                self.bus.slot_mut(binding.slots[0]).store(Box::new(value));
            }
        }
        Ok(())
    }

    /// Current value of a shared or double-buffered port.
    pub fn read<T: Parameter>(&self, port: ParameterPortId) -> Result<&T, ProcessError> {
        let binding = self.port::<T>(port)?;
        if binding.protocol == ProtocolType::MessageQueue {
            return Err(ProcessError::Protocol(binding.protocol.name()));
        }
        let value = self
            .bus
            .slot(binding.slots[0])
            .value
            .as_deref()
            .ok_or(ProcessError::NoValue)?;
        downcast_ref::<T>(value)
    }

    /// Mutable access to the value of a shared or double-buffered port.
    ///
    /// Marks the value as changed for every receiver.
    pub fn data_mut<T: Parameter>(
        &mut self,
        port: ParameterPortId,
    ) -> Result<&mut T, ProcessError> {
        let binding = self.port::<T>(port)?;
        if binding.protocol == ProtocolType::MessageQueue {
            return Err(ProcessError::Protocol(binding.protocol.name()));
        }
        let slot = self.bus.slot_mut(binding.slots[0]);
        slot.generation = slot.generation.wrapping_add(1);
        let value = slot.value.as_deref_mut().ok_or(ProcessError::NoValue)?;
        downcast_mut::<T>(value)
    }

    /// True if the port's value changed since the last [`reset_changed`](Self::reset_changed).
    ///
    /// Every port reports a change in the first block. Message-queue inputs
    /// report a change while messages are pending.
    pub fn changed(&self, port: ParameterPortId) -> bool {
        let binding = &self.ports[port.0];
        let Some(&idx) = binding.slots.first() else {
            return false;
        };
        let slot = self.bus.slot(idx);
        match binding.protocol {
            ProtocolType::MessageQueue => !slot.queue.is_empty(),
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                slot.generation != self.seen[port.0]
            }
        }
    }

    /// Acknowledges the current value of a port.
    pub fn reset_changed(&mut self, port: ParameterPortId) {
        let binding = &self.ports[port.0];
        if let Some(&idx) = binding.slots.first() {
            self.seen[port.0] = self.bus.slot(idx).generation;
        }
    }
}
