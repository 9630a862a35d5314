//! Parameter slots owned by the runtime.
//!
//! Every resolved parameter connection maps onto one [`ParameterSlot`]. The
//! slot layout is decided at flattening time:
//!
//! - `SharedData` and `DoubleBuffering`: one slot per sender, shared by all
//!   of its receivers.
//! - `MessageQueue`: one slot per receiver; the sender pushes into each.
//!
//! Slots are touched only from the audio thread, during the owning
//! component's scheduled turn.

use std::collections::VecDeque;

use super::{ParameterData, ParameterType, ProtocolType};

/// Initial queue capacity; queues grow only if a producer outpaces the consumer.
const QUEUE_CAPACITY: usize = 16;

/// Storage for one parameter connection.
#[derive(Debug)]
pub(crate) struct ParameterSlot {
    pub protocol: ProtocolType,
    pub parameter_type: ParameterType,
    /// Current value (`SharedData`, `DoubleBuffering`).
    pub value: Option<Box<dyn ParameterData>>,
    /// Pending messages (`MessageQueue`).
    pub queue: VecDeque<Box<dyn ParameterData>>,
    /// Incremented on every write; receivers compare against their last seen value.
    pub generation: u64,
}

impl ParameterSlot {
    pub fn new(
        protocol: ProtocolType,
        parameter_type: ParameterType,
        initial: Option<Box<dyn ParameterData>>,
    ) -> Self {
        let queue = if protocol == ProtocolType::MessageQueue {
            VecDeque::with_capacity(QUEUE_CAPACITY)
        } else {
            VecDeque::new()
        };
        Self {
            protocol,
            parameter_type,
            value: initial,
            queue,
            generation: 0,
        }
    }

    /// Stores a new value and bumps the generation.
    pub fn store(&mut self, value: Box<dyn ParameterData>) {
        self.value = Some(value);
        self.generation = self.generation.wrapping_add(1);
    }
}

/// All parameter slots of a signal flow.
#[derive(Debug, Default)]
pub(crate) struct ParameterBus {
    slots: Vec<ParameterSlot>,
}

impl ParameterBus {
    pub fn push(&mut self, slot: ParameterSlot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &ParameterSlot {
        &self.slots[index]
    }

    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> &mut ParameterSlot {
        &mut self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
