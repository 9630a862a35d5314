//! Audio and parameter port descriptions.

use std::fmt;

use crate::parameter::{ParameterConfig, ParameterType, ProtocolType};

/// Direction of a port as seen from its owning component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Data flows into the component.
    Input,
    /// Data flows out of the component.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// Handle to an audio port of a component, valid for that component only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioPortId(pub(crate) usize);

impl AudioPortId {
    /// Position of the port in the component's audio port list.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a parameter port of a component, valid for that component only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParameterPortId(pub(crate) usize);

impl ParameterPortId {
    /// Position of the port in the component's parameter port list.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Multichannel audio port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPort {
    pub(crate) name: String,
    pub(crate) direction: PortDirection,
    pub(crate) width: usize,
}

impl AudioPort {
    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port direction.
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Number of channels.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Typed control-data port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPort {
    pub(crate) name: String,
    pub(crate) direction: PortDirection,
    pub(crate) parameter_type: ParameterType,
    pub(crate) protocol: ProtocolType,
    pub(crate) config: ParameterConfig,
}

impl ParameterPort {
    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port direction.
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Parameter type carried by the port.
    pub fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    /// Communication protocol.
    pub fn protocol(&self) -> ProtocolType {
        self.protocol
    }

    /// Type-specific configuration.
    pub fn config(&self) -> &ParameterConfig {
        &self.config
    }

    /// Describes the first difference to another port, if any.
    pub(crate) fn mismatch(&self, other: &ParameterPort) -> Option<String> {
        if self.parameter_type != other.parameter_type {
            Some(format!(
                "parameter types differ ({} vs {})",
                self.parameter_type, other.parameter_type
            ))
        } else if self.protocol != other.protocol {
            Some(format!(
                "protocols differ ({} vs {})",
                self.protocol, other.protocol
            ))
        } else if self.config != other.config {
            Some(format!(
                "configurations differ ({:?} vs {:?})",
                self.config, other.config
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(protocol: ProtocolType, config: ParameterConfig) -> ParameterPort {
        ParameterPort {
            name: "p".into(),
            direction: PortDirection::Input,
            parameter_type: ParameterType::new("Vector"),
            protocol,
            config,
        }
    }

    #[test]
    fn mismatch_reports_protocol_first_after_type() {
        let a = port(ProtocolType::SharedData, ParameterConfig::Vector { size: 2 });
        let b = port(ProtocolType::MessageQueue, ParameterConfig::Vector { size: 3 });
        let reason = a.mismatch(&b).unwrap();
        assert!(reason.contains("protocols differ"), "got: {reason}");
        assert!(a.mismatch(&a.clone()).is_none());
    }

    #[test]
    fn config_mismatch_detected() {
        let a = port(ProtocolType::SharedData, ParameterConfig::Vector { size: 2 });
        let b = port(ProtocolType::SharedData, ParameterConfig::Vector { size: 3 });
        assert!(a.mismatch(&b).unwrap().contains("configurations differ"));
    }
}
