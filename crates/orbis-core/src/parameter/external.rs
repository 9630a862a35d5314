//! Thread-safe endpoints for the top-level parameter ports of a signal flow.
//!
//! Control threads (network receivers, head trackers, user interfaces) never
//! touch parameter slots directly. They hand values to a [`ParameterSender`]
//! mailbox; the audio thread drains it at the start of each block with
//! `try_lock`, so a control thread holding the lock delays delivery by one
//! block but never blocks the callback. Results flow back the same way
//! through a [`ParameterReceiver`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::bus::ParameterBus;
use super::{
    Parameter, ParameterData, ParameterType, ProtocolType, downcast_boxed,
};
use crate::ProcessError;

#[derive(Debug)]
pub(crate) struct Mailbox {
    protocol: ProtocolType,
    parameter_type: ParameterType,
    queue: Mutex<VecDeque<Box<dyn ParameterData>>>,
    latest: Mutex<Option<Box<dyn ParameterData>>>,
}

impl Mailbox {
    pub fn new(protocol: ProtocolType, parameter_type: ParameterType) -> Arc<Self> {
        Arc::new(Self {
            protocol,
            parameter_type,
            queue: Mutex::new(VecDeque::new()),
            latest: Mutex::new(None),
        })
    }
}

/// Handle feeding a top-level parameter input from another thread.
#[derive(Debug, Clone)]
pub struct ParameterSender {
    name: String,
    mailbox: Arc<Mailbox>,
}

impl ParameterSender {
    pub(crate) fn new(name: String, mailbox: Arc<Mailbox>) -> Self {
        Self { name, mailbox }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type carried by the port.
    pub fn parameter_type(&self) -> ParameterType {
        self.mailbox.parameter_type
    }

    /// Protocol of the port.
    pub fn protocol(&self) -> ProtocolType {
        self.mailbox.protocol
    }

    /// Hands a value to the signal flow.
    ///
    /// Queued ports deliver every value in order; double-buffered and shared
    /// ports keep only the most recent one.
    pub fn send<T: Parameter>(&self, value: T) -> Result<(), ProcessError> {
        if T::TYPE != self.mailbox.parameter_type {
            return Err(ProcessError::ParameterType {
                expected: self.mailbox.parameter_type.name(),
                found: T::TYPE.name(),
            });
        }
        match self.mailbox.protocol {
            ProtocolType::MessageQueue => self.mailbox.queue.lock().push_back(Box::new(value)),
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                *self.mailbox.latest.lock() = Some(Box::new(value));
            }
        }
        Ok(())
    }
}

/// Handle reading a top-level parameter output from another thread.
#[derive(Debug, Clone)]
pub struct ParameterReceiver {
    name: String,
    mailbox: Arc<Mailbox>,
}

impl ParameterReceiver {
    pub(crate) fn new(name: String, mailbox: Arc<Mailbox>) -> Self {
        Self { name, mailbox }
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type carried by the port.
    pub fn parameter_type(&self) -> ParameterType {
        self.mailbox.parameter_type
    }

    /// Takes the next value published by the signal flow.
    ///
    /// For queued ports this is the oldest pending message; otherwise the
    /// latest value published since the previous call.
    pub fn receive<T: Parameter>(&self) -> Result<Option<T>, ProcessError> {
        let next = match self.mailbox.protocol {
            ProtocolType::MessageQueue => self.mailbox.queue.lock().pop_front(),
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                self.mailbox.latest.lock().take()
            }
        };
        next.map(downcast_boxed::<T>).transpose()
    }

    /// Number of queued messages (always 0 or 1 for non-queued ports).
    pub fn pending(&self) -> usize {
        match self.mailbox.protocol {
            ProtocolType::MessageQueue => self.mailbox.queue.lock().len(),
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                usize::from(self.mailbox.latest.lock().is_some())
            }
        }
    }
}

/// Runtime side of a [`ParameterSender`].
#[derive(Debug)]
pub(crate) struct ExternalInput {
    pub name: String,
    pub mailbox: Arc<Mailbox>,
    /// Slots written when the mailbox is drained.
    pub slots: Vec<usize>,
}

impl ExternalInput {
    /// Moves pending values into the bus without blocking.
    pub fn drain_into(&self, bus: &mut ParameterBus) {
        match self.mailbox.protocol {
            ProtocolType::MessageQueue => {
                let Some(mut queue) = self.mailbox.queue.try_lock() else {
                    return;
                };
                while let Some(value) = queue.pop_front() {
                    distribute(bus, &self.slots, value, |slot, v| slot.queue.push_back(v));
                }
            }
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                let Some(mut latest) = self.mailbox.latest.try_lock() else {
                    return;
                };
                if let Some(value) = latest.take() {
                    distribute(bus, &self.slots, value, |slot, v| slot.store(v));
                }
            }
        }
    }
}

fn distribute(
    bus: &mut ParameterBus,
    slots: &[usize],
    value: Box<dyn ParameterData>,
    mut write: impl FnMut(&mut super::ParameterSlot, Box<dyn ParameterData>),
) {
    let Some((&last, rest)) = slots.split_last() else {
        return;
    };
    for &idx in rest {
        write(bus.slot_mut(idx), value.clone_boxed());
    }
    write(bus.slot_mut(last), value);
}

/// Runtime side of a [`ParameterReceiver`].
#[derive(Debug)]
pub(crate) struct ExternalOutput {
    pub name: String,
    pub mailbox: Arc<Mailbox>,
    pub slot: usize,
    pub seen: u64,
}

impl ExternalOutput {
    /// Publishes new values from the bus without blocking.
    pub fn publish(&mut self, bus: &mut ParameterBus) {
        let slot = bus.slot_mut(self.slot);
        match self.mailbox.protocol {
            ProtocolType::MessageQueue => {
                if slot.queue.is_empty() {
                    return;
                }
                if let Some(mut queue) = self.mailbox.queue.try_lock() {
                    queue.extend(slot.queue.drain(..));
                }
            }
            ProtocolType::DoubleBuffering | ProtocolType::SharedData => {
                if slot.generation == self.seen {
                    return;
                }
                let Some(value) = slot.value.as_ref() else {
                    return;
                };
                if let Some(mut latest) = self.mailbox.latest.try_lock() {
                    *latest = Some(value.clone_boxed());
                    self.seen = slot.generation;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ParameterSlot, StringParameter, VectorParameter};

    fn bus_with(protocol: ProtocolType, n: usize) -> ParameterBus {
        let mut bus = ParameterBus::default();
        for _ in 0..n {
            bus.push(ParameterSlot::new(protocol, StringParameter::TYPE, None));
        }
        bus
    }

    #[test]
    fn queued_values_fan_out_in_order() {
        let mailbox = Mailbox::new(ProtocolType::MessageQueue, StringParameter::TYPE);
        let sender = ParameterSender::new("in".into(), Arc::clone(&mailbox));
        sender.send(StringParameter::new("a")).unwrap();
        sender.send(StringParameter::new("b")).unwrap();

        let mut bus = bus_with(ProtocolType::MessageQueue, 2);
        let input = ExternalInput {
            name: "in".into(),
            mailbox,
            slots: vec![0, 1],
        };
        input.drain_into(&mut bus);
        for idx in 0..2 {
            let texts: Vec<_> = bus
                .slot(idx)
                .queue
                .iter()
                .map(|v| v.as_any().downcast_ref::<StringParameter>().unwrap().0.clone())
                .collect();
            assert_eq!(texts, ["a", "b"]);
        }
    }

    #[test]
    fn double_buffered_sender_keeps_latest() {
        let mailbox = Mailbox::new(ProtocolType::DoubleBuffering, StringParameter::TYPE);
        let sender = ParameterSender::new("in".into(), Arc::clone(&mailbox));
        sender.send(StringParameter::new("old")).unwrap();
        sender.send(StringParameter::new("new")).unwrap();
        let mut bus = bus_with(ProtocolType::DoubleBuffering, 1);
        ExternalInput {
            name: "in".into(),
            mailbox,
            slots: vec![0],
        }
        .drain_into(&mut bus);
        let slot = bus.slot(0);
        assert_eq!(slot.generation, 1);
        let v = slot.value.as_ref().unwrap();
        assert_eq!(v.as_any().downcast_ref::<StringParameter>().unwrap().as_str(), "new");
    }

    #[test]
    fn sender_rejects_wrong_type() {
        let mailbox = Mailbox::new(ProtocolType::MessageQueue, StringParameter::TYPE);
        let sender = ParameterSender::new("in".into(), mailbox);
        assert!(sender.send(VectorParameter::zeros(2)).is_err());
    }

    #[test]
    fn output_publishes_only_changes() {
        let mailbox = Mailbox::new(ProtocolType::SharedData, StringParameter::TYPE);
        let receiver = ParameterReceiver::new("out".into(), Arc::clone(&mailbox));
        let mut bus = bus_with(ProtocolType::SharedData, 1);
        let mut output = ExternalOutput {
            name: "out".into(),
            mailbox,
            slot: 0,
            seen: 0,
        };
        output.publish(&mut bus);
        assert_eq!(receiver.pending(), 0);

        bus.slot_mut(0).store(Box::new(StringParameter::new("x")));
        output.publish(&mut bus);
        let got: StringParameter = receiver.receive().unwrap().unwrap();
        assert_eq!(got.as_str(), "x");

        output.publish(&mut bus);
        assert_eq!(receiver.pending(), 0);
    }
}
