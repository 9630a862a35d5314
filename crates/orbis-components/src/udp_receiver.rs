//! UDP ingestion of scene messages.
//!
//! A background thread receives datagrams into a lock-protected queue. The
//! audio thread only drains that queue with `try_lock`, so a busy network
//! thread delays messages by a block instead of blocking the callback.
//! The queue is bounded; when it is full the oldest message is discarded.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use orbis_core::{
    AtomicProcessor, Component, ComponentBuilder, Parameter, ParameterConfig, ParameterPortId,
    ProcessContext, ProcessError, ProtocolType, SignalFlowContext, StringParameter,
};
use parking_lot::Mutex;

use crate::error::{ComponentError, Result};

/// Largest datagram accepted.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Default number of datagrams held between two blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receives datagrams on a UDP port.
///
/// Dropping the receiver stops and joins the network thread.
pub struct UdpReceiver {
    local_addr: SocketAddr,
    queue: Arc<Mutex<VecDeque<String>>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl UdpReceiver {
    /// Binds `0.0.0.0:port` and starts receiving. Port 0 picks a free port.
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_with_capacity(port, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`bind`](Self::bind), holding at most `capacity` (at least one)
    /// datagrams between two blocks.
    pub fn bind_with_capacity(port: u16, capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .and_then(|s| s.set_read_timeout(Some(POLL_INTERVAL)).map(|()| s))
            .map_err(|source| ComponentError::Bind { port, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ComponentError::Bind { port, source })?;

        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));
        let stop = Arc::new(AtomicBool::new(false));
        let thread = std::thread::Builder::new()
            .name(format!("orbis-udp-{}", local_addr.port()))
            .spawn({
                let queue = Arc::clone(&queue);
                let stop = Arc::clone(&stop);
                move || receive_loop(&socket, &queue, capacity, &stop)
            })
            .map_err(ComponentError::Thread)?;
        tracing::info!(%local_addr, "listening for scene messages");

        Ok(Self {
            local_addr,
            queue,
            stop,
            thread: Some(thread),
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of datagrams waiting for the next block.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Wraps the receiver into a component with the message-queue output
    /// `messageOutput`.
    pub fn into_component(self, context: SignalFlowContext, name: &str) -> Result<Component> {
        let mut b = ComponentBuilder::new(context, name);
        let output = b.parameter_output(
            "messageOutput",
            StringParameter::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )?;
        Ok(b.into_atomic(UdpReceiverProcessor {
            receiver: self,
            output,
        }))
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!(addr = %self.local_addr, "UDP receive thread panicked");
        }
    }
}

/// Appends a message, discarding the oldest one when `capacity` is reached.
/// Returns whether a message was discarded.
fn enqueue(queue: &mut VecDeque<String>, message: String, capacity: usize) -> bool {
    let overflow = queue.len() >= capacity;
    if overflow {
        queue.pop_front();
    }
    queue.push_back(message);
    overflow
}

fn receive_loop(
    socket: &UdpSocket,
    queue: &Mutex<VecDeque<String>>,
    capacity: usize,
    stop: &AtomicBool,
) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
    while !stop.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buffer) {
            Ok((len, from)) => {
                let message = String::from_utf8_lossy(&buffer[..len]).into_owned();
                tracing::trace!(%from, len, "datagram");
                if enqueue(&mut queue.lock(), message, capacity) {
                    tracing::warn!(%from, capacity, "scene message queue full, oldest message dropped");
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => tracing::warn!("UDP receive failed: {e}"),
        }
    }
}

struct UdpReceiverProcessor {
    receiver: UdpReceiver,
    output: ParameterPortId,
}

impl AtomicProcessor for UdpReceiverProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
        let Some(mut queue) = self.receiver.queue.try_lock() else {
            return Ok(());
        };
        while let Some(message) = queue.pop_front() {
            ctx.parameters.send(self.output, StringParameter(message))?;
        }
        Ok(())
    }
}
