//! Control-rate parameters and their communication protocols.
//!
//! Audio ports carry sample blocks; parameter ports carry typed control data
//! (gain matrices, object vectors, filter coefficients). Every parameter port
//! declares three things that must match across a connection:
//!
//! - a [`ParameterType`] tag naming the Rust type carried,
//! - a [`ProtocolType`] deciding how values move from sender to receiver,
//! - a [`ParameterConfig`] with the type-specific shape (matrix size, ...).
//!
//! Values are type-erased as [`ParameterData`] trait objects and recovered by
//! downcasting to the concrete [`Parameter`] type. New parameter types are
//! made known to a signal flow through a [`ParameterRegistry`].

mod bus;
mod external;
mod registry;
mod types;

use std::any::Any;
use std::fmt;

pub(crate) use bus::{ParameterBus, ParameterSlot};
pub use external::{ParameterReceiver, ParameterSender};
pub(crate) use external::{ExternalInput, ExternalOutput, Mailbox};
pub use registry::{ParameterFactory, ParameterRegistry, RegistryEntry};
pub use types::{IndexedValue, ListenerPosition, SignalRouting, StringParameter, VectorParameter};

/// Name tag identifying a parameter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterType(&'static str);

impl ParameterType {
    /// Creates a tag from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The tag's name.
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// How parameter values travel from a sender to its receivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolType {
    /// Receivers see the latest complete value and a per-receiver change flag.
    DoubleBuffering,
    /// FIFO queue per receiver; every sent value is delivered exactly once.
    MessageQueue,
    /// Sender and receivers access one shared value.
    SharedData,
}

impl ProtocolType {
    /// All protocols.
    pub const ALL: [ProtocolType; 3] = [
        ProtocolType::DoubleBuffering,
        ProtocolType::MessageQueue,
        ProtocolType::SharedData,
    ];

    /// Protocol name as used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Self::DoubleBuffering => "DoubleBuffering",
            Self::MessageQueue => "MessageQueue",
            Self::SharedData => "SharedData",
        }
    }

    /// Looks up a protocol by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific shape of a parameter port.
///
/// Two connected ports must carry equal configurations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterConfig {
    /// No shape information.
    #[default]
    Empty,
    /// Vector of the given length.
    Vector {
        /// Number of elements.
        size: usize,
    },
    /// Matrix of the given shape.
    Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        columns: usize,
    },
    /// Biquad coefficient matrix.
    Biquad {
        /// Number of filter channels.
        filters: usize,
        /// Sections per channel.
        sections: usize,
    },
}

/// Concrete parameter value type.
///
/// Implement this for every type that travels over parameter ports. The
/// blanket [`ParameterData`] impl takes care of type erasure.
pub trait Parameter: Clone + Any + Send + Sync + fmt::Debug {
    /// Tag of this type.
    const TYPE: ParameterType;
}

/// Type-erased parameter value.
pub trait ParameterData: Any + Send + Sync + fmt::Debug {
    /// Tag of the concrete type.
    fn parameter_type(&self) -> ParameterType;
    /// Clones into a new box.
    fn clone_boxed(&self) -> Box<dyn ParameterData>;
    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;
    /// Upcast for downcasting by mutable reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Upcast for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Parameter> ParameterData for T {
    fn parameter_type(&self) -> ParameterType {
        T::TYPE
    }

    fn clone_boxed(&self) -> Box<dyn ParameterData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Clone for Box<dyn ParameterData> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Downcasts a boxed value, reporting the stored type on mismatch.
pub(crate) fn downcast_boxed<T: Parameter>(
    value: Box<dyn ParameterData>,
) -> Result<T, crate::ProcessError> {
    let found = value.parameter_type();
    value
        .into_any()
        .downcast::<T>()
        .map(|b| *b)
        .map_err(|_| crate::ProcessError::ParameterType {
            expected: T::TYPE.name(),
            found: found.name(),
        })
}

/// Downcasts a reference, reporting the stored type on mismatch.
pub(crate) fn downcast_ref<T: Parameter>(
    value: &dyn ParameterData,
) -> Result<&T, crate::ProcessError> {
    value
        .as_any()
        .downcast_ref::<T>()
        .ok_or(crate::ProcessError::ParameterType {
            expected: T::TYPE.name(),
            found: value.parameter_type().name(),
        })
}

/// Downcasts a mutable reference, reporting the stored type on mismatch.
pub(crate) fn downcast_mut<T: Parameter>(
    value: &mut dyn ParameterData,
) -> Result<&mut T, crate::ProcessError> {
    let found = value.parameter_type().name();
    value
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or(crate::ProcessError::ParameterType {
            expected: T::TYPE.name(),
            found,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_names_round_trip() {
        for p in ProtocolType::ALL {
            assert_eq!(ProtocolType::from_name(p.name()), Some(p));
        }
        assert_eq!(
            ProtocolType::from_name("messagequeue"),
            Some(ProtocolType::MessageQueue)
        );
        assert_eq!(ProtocolType::from_name("udp"), None);
    }

    #[test]
    fn downcast_reports_both_types() {
        let boxed: Box<dyn ParameterData> = Box::new(StringParameter::new("x"));
        let err = downcast_boxed::<VectorParameter>(boxed).unwrap_err();
        assert_eq!(
            err,
            crate::ProcessError::ParameterType {
                expected: "Vector",
                found: "String"
            }
        );
    }
}
