//! Error types for graph construction, flattening and block processing.
//!
//! [`SignalFlowError`] covers everything that can go wrong before the first
//! audio block: duplicate names, unresolvable connection endpoints, width and
//! type mismatches, placeholder loops and dependency cycles. These errors are
//! fatal; a signal flow is never partially built.
//!
//! [`ProcessError`] is returned by [`AtomicProcessor::process`](crate::AtomicProcessor::process)
//! and consumed by the runtime boundary in
//! [`AudioSignalFlow::process`](crate::AudioSignalFlow::process).

use thiserror::Error;

/// Setup-time errors raised while building or flattening a component graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalFlowError {
    /// A port with this name already exists in the component.
    #[error("component \"{component}\": a port named \"{port}\" already exists")]
    DuplicatePort {
        /// Full name of the component.
        component: String,
        /// Offending port name.
        port: String,
    },

    /// A child with this name already exists in the composite.
    #[error("composite \"{composite}\": a component named \"{child}\" is already registered")]
    DuplicateComponent {
        /// Full name of the composite.
        composite: String,
        /// Offending child name.
        child: String,
    },

    /// The port width cannot change after the component was finalized.
    #[error("component \"{component}\": width of port \"{port}\" cannot be changed after initialisation")]
    PortFinalized {
        /// Full name of the component.
        component: String,
        /// Port name.
        port: String,
    },

    /// A connection or lookup named a port that does not exist.
    #[error("component \"{component}\": no port named \"{port}\"")]
    PortNotFound {
        /// Full name of the component.
        component: String,
        /// Port name.
        port: String,
    },

    /// A connection named a component that is neither the composite nor a direct child.
    #[error("composite \"{composite}\": no component named \"{component}\"")]
    ComponentNotFound {
        /// Full name of the composite declaring the connection.
        composite: String,
        /// Name that could not be resolved.
        component: String,
    },

    /// A composite-only operation was invoked on an atomic component.
    #[error("component \"{0}\" is not a composite component")]
    NotComposite(String),

    /// The sender endpoint is not a valid send port in the declaring composite.
    #[error(
        "Audio signal flow connection check: In component \"{composite}\", the send port \"{port}\" is not found."
    )]
    SendPortNotFound {
        /// Full name of the declaring composite.
        composite: String,
        /// `component:port` of the sender.
        port: String,
    },

    /// The receiver endpoint is not a valid receive port in the declaring composite.
    #[error(
        "Audio signal flow connection check: In component \"{composite}\", the receive port \"{port}\" is not found."
    )]
    ReceivePortNotFound {
        /// Full name of the declaring composite.
        composite: String,
        /// `component:port` of the receiver.
        port: String,
    },

    /// Sender and receiver channel lists have different lengths.
    #[error(
        "composite \"{composite}\": connection {sender} -> {receiver} has {sent} send channels but {received} receive channels"
    )]
    ChannelCountMismatch {
        /// Full name of the declaring composite.
        composite: String,
        /// `component:port` of the sender.
        sender: String,
        /// `component:port` of the receiver.
        receiver: String,
        /// Length of the send channel list.
        sent: usize,
        /// Length of the receive channel list.
        received: usize,
    },

    /// A channel index exceeds the width of its port.
    #[error("composite \"{composite}\": channel {channel} exceeds the width {width} of port \"{port}\"")]
    ChannelOutOfRange {
        /// Full name of the declaring composite.
        composite: String,
        /// `component:port` of the offending endpoint.
        port: String,
        /// Offending channel index.
        channel: usize,
        /// Declared port width.
        width: usize,
    },

    /// A whole-port connection between ports of different widths.
    #[error("composite \"{composite}\": cannot connect \"{sender}\" (width {sender_width}) to \"{receiver}\" (width {receiver_width})")]
    PortWidthMismatch {
        /// Full name of the declaring composite.
        composite: String,
        /// `component:port` of the sender.
        sender: String,
        /// `component:port` of the receiver.
        receiver: String,
        /// Sender width.
        sender_width: usize,
        /// Receiver width.
        receiver_width: usize,
    },

    /// A receive channel is driven by more than one sender.
    #[error("receive port \"{port}\" channel {channel} has more than one sender")]
    MultipleSenders {
        /// Full port path of the receiver.
        port: String,
        /// Receive channel (0 for parameter ports).
        channel: usize,
    },

    /// Following placeholder ports did not terminate.
    #[error("closed loop detected in placeholder port connections (at \"{port}\")")]
    ClosedLoop {
        /// Full port path where the loop was detected.
        port: String,
    },

    /// A receive channel has no sender after placeholder resolution.
    #[error("unconnected receive port \"{port}\" channel {channel}")]
    UnconnectedReceivePort {
        /// Full port path.
        port: String,
        /// Unconnected channel.
        channel: usize,
    },

    /// Two parameter ports disagree on type, protocol or configuration.
    #[error("parameter connection {sender} -> {receiver}: {reason}")]
    ParameterMismatch {
        /// Full port path of the sender.
        sender: String,
        /// Full port path of the receiver.
        receiver: String,
        /// What differs.
        reason: String,
    },

    /// A parameter port uses a type that the registry does not know.
    #[error("parameter port \"{port}\" uses unregistered parameter type \"{parameter_type}\"")]
    UnknownParameterType {
        /// Full port path.
        port: String,
        /// Type tag.
        parameter_type: String,
    },

    /// The atomic components form a dependency cycle.
    #[error("cycle detected among atomic components: {0}")]
    CycleDetected(String),

    /// A child was created with a different sampling context than its parent.
    #[error("component \"{component}\": sampling context differs from its parent")]
    ContextMismatch {
        /// Full name of the child.
        component: String,
    },
}

/// Per-block errors reported by atomic components.
///
/// These never abort the stream on their own; the runtime logs them and
/// silences the affected block.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessError {
    /// A parameter port carried a value of an unexpected type.
    #[error("parameter type mismatch: expected {expected}, found {found}")]
    ParameterType {
        /// Type the component asked for.
        expected: &'static str,
        /// Type stored in the slot.
        found: &'static str,
    },

    /// A parameter operation does not match the port's protocol.
    #[error("operation not supported by the {0} protocol")]
    Protocol(&'static str),

    /// The operation is not available for the port's direction.
    #[error("operation requires a parameter {0} port")]
    Direction(&'static str),

    /// A parameter port has no value yet.
    #[error("no value available on parameter port")]
    NoValue,

    /// An index carried in a parameter exceeds its admissible range.
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        /// What the index refers to.
        what: &'static str,
        /// Offending index.
        index: usize,
        /// Exclusive upper bound.
        limit: usize,
    },

    /// Component-specific failure.
    #[error("{0}")]
    Component(String),
}

/// Convenience result type for setup-time operations.
pub type Result<T> = std::result::Result<T, SignalFlowError>;
