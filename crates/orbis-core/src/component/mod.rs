//! Components, ports and composites.
//!
//! A [`Component`] is either atomic (it owns an [`AtomicProcessor`]) or a
//! composite (it owns child components plus the audio and parameter
//! connections between them). Ports are declared through a
//! [`ComponentBuilder`] before the component kind is chosen:
//!
//! ```rust,ignore
//! let ctx = SignalFlowContext::new(64, 48000.0);
//! let mut b = ComponentBuilder::new(ctx, "renderer");
//! b.audio_input("input", 2)?;
//! b.audio_output("output", 2)?;
//! let mut renderer = b.into_composite();
//! renderer.add_child(gain)?;
//! renderer.connect_audio_ports("this", "input", "gain", "in")?;
//! renderer.connect_audio_ports("gain", "out", "this", "output")?;
//! ```
//!
//! Inside a composite, `"this"` (or the empty string) names the composite
//! itself; its own ports are placeholders resolved during flattening.

pub mod atomic;
pub mod channel_list;
pub mod port;

pub use atomic::{AtomicProcessor, AudioBlock, AudioInputs, ParameterAccess, ProcessContext};
pub use channel_list::{ChannelList, ChannelRange, ParseChannelListError};
pub use port::{AudioPort, AudioPortId, ParameterPort, ParameterPortId, PortDirection};

use std::fmt;

use crate::context::SignalFlowContext;
use crate::error::{Result, SignalFlowError};
use crate::parameter::{ParameterConfig, ParameterType, ProtocolType};

/// Name that refers to the enclosing composite in connection declarations.
pub const THIS: &str = "this";

/// Node of a component hierarchy.
pub struct Component {
    name: String,
    full_name: String,
    has_parent: bool,
    context: SignalFlowContext,
    audio_ports: Vec<AudioPort>,
    parameter_ports: Vec<ParameterPort>,
    finalized: bool,
    kind: ComponentKind,
}

/// Atomic or composite payload of a [`Component`].
pub enum ComponentKind {
    /// Leaf with a block-processing callback.
    Atomic(Box<dyn AtomicProcessor>),
    /// Container of child components and their connections.
    Composite(Composite),
}

/// Children and connections of a composite component.
#[derive(Default)]
pub struct Composite {
    pub(crate) children: Vec<Component>,
    pub(crate) audio_connections: Vec<AudioConnection>,
    pub(crate) parameter_connections: Vec<ParameterConnection>,
}

/// Component and port names of one connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Child name, or `"this"` / `""` for the composite itself.
    pub component: String,
    /// Port name.
    pub port: String,
}

impl Endpoint {
    fn new(component: &str, port: &str) -> Self {
        Self {
            component: component.to_owned(),
            port: port.to_owned(),
        }
    }

    /// True if the endpoint refers to the enclosing composite.
    pub fn is_this(&self) -> bool {
        is_this(&self.component)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_this() {
            write!(f, "{THIS}:{}", self.port)
        } else {
            write!(f, "{}:{}", self.component, self.port)
        }
    }
}

/// Declared audio connection between channel lists of two ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConnection {
    /// Sending endpoint.
    pub sender: Endpoint,
    /// Sender channels.
    pub sender_channels: ChannelList,
    /// Receiving endpoint.
    pub receiver: Endpoint,
    /// Receiver channels, same length as `sender_channels`.
    pub receiver_channels: ChannelList,
}

/// Declared whole-port parameter connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterConnection {
    /// Sending endpoint.
    pub sender: Endpoint,
    /// Receiving endpoint.
    pub receiver: Endpoint,
}

fn is_this(name: &str) -> bool {
    name.is_empty() || name == THIS
}

/// Declares the ports of a component before its kind is fixed.
pub struct ComponentBuilder {
    name: String,
    context: SignalFlowContext,
    audio_ports: Vec<AudioPort>,
    parameter_ports: Vec<ParameterPort>,
}

impl ComponentBuilder {
    /// Starts a component with the given name and sampling context.
    pub fn new(context: SignalFlowContext, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context,
            audio_ports: Vec::new(),
            parameter_ports: Vec::new(),
        }
    }

    /// Sampling context of the component under construction.
    pub fn context(&self) -> SignalFlowContext {
        self.context
    }

    fn add_audio(&mut self, name: &str, direction: PortDirection, width: usize) -> Result<AudioPortId> {
        if self.audio_ports.iter().any(|p| p.name == name) {
            return Err(SignalFlowError::DuplicatePort {
                component: self.name.clone(),
                port: name.to_owned(),
            });
        }
        self.audio_ports.push(AudioPort {
            name: name.to_owned(),
            direction,
            width,
        });
        Ok(AudioPortId(self.audio_ports.len() - 1))
    }

    fn add_parameter(
        &mut self,
        name: &str,
        direction: PortDirection,
        parameter_type: ParameterType,
        protocol: ProtocolType,
        config: ParameterConfig,
    ) -> Result<ParameterPortId> {
        if self.parameter_ports.iter().any(|p| p.name == name) {
            return Err(SignalFlowError::DuplicatePort {
                component: self.name.clone(),
                port: name.to_owned(),
            });
        }
        self.parameter_ports.push(ParameterPort {
            name: name.to_owned(),
            direction,
            parameter_type,
            protocol,
            config,
        });
        Ok(ParameterPortId(self.parameter_ports.len() - 1))
    }

    /// Declares an audio input port.
    pub fn audio_input(&mut self, name: &str, width: usize) -> Result<AudioPortId> {
        self.add_audio(name, PortDirection::Input, width)
    }

    /// Declares an audio output port.
    pub fn audio_output(&mut self, name: &str, width: usize) -> Result<AudioPortId> {
        self.add_audio(name, PortDirection::Output, width)
    }

    /// Declares a parameter input port.
    pub fn parameter_input(
        &mut self,
        name: &str,
        parameter_type: ParameterType,
        protocol: ProtocolType,
        config: ParameterConfig,
    ) -> Result<ParameterPortId> {
        self.add_parameter(name, PortDirection::Input, parameter_type, protocol, config)
    }

    /// Declares a parameter output port.
    pub fn parameter_output(
        &mut self,
        name: &str,
        parameter_type: ParameterType,
        protocol: ProtocolType,
        config: ParameterConfig,
    ) -> Result<ParameterPortId> {
        self.add_parameter(name, PortDirection::Output, parameter_type, protocol, config)
    }

    fn build(self, kind: ComponentKind) -> Component {
        Component {
            full_name: self.name.clone(),
            name: self.name,
            has_parent: false,
            context: self.context,
            audio_ports: self.audio_ports,
            parameter_ports: self.parameter_ports,
            finalized: false,
            kind,
        }
    }

    /// Finishes an atomic component.
    pub fn into_atomic(self, processor: impl AtomicProcessor + 'static) -> Component {
        self.build(ComponentKind::Atomic(Box::new(processor)))
    }

    /// Finishes an empty composite component.
    pub fn into_composite(self) -> Component {
        self.build(ComponentKind::Composite(Composite::default()))
    }
}

impl Component {
    /// Local name, unique within the parent.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hierarchical name joined with `::`, excluding the top-level component.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// True once the component was added to a composite.
    pub fn has_parent(&self) -> bool {
        self.has_parent
    }

    /// Sampling context.
    pub fn context(&self) -> SignalFlowContext {
        self.context
    }

    /// True for atomic components.
    pub fn is_atomic(&self) -> bool {
        matches!(self.kind, ComponentKind::Atomic(_))
    }

    /// True for composite components.
    pub fn is_composite(&self) -> bool {
        !self.is_atomic()
    }

    /// Audio ports in declaration order.
    pub fn audio_ports(&self) -> &[AudioPort] {
        &self.audio_ports
    }

    /// Parameter ports in declaration order.
    pub fn parameter_ports(&self) -> &[ParameterPort] {
        &self.parameter_ports
    }

    /// Looks up an audio port by name.
    pub fn find_audio_port(&self, name: &str) -> Option<&AudioPort> {
        self.audio_ports.iter().find(|p| p.name == name)
    }

    /// Looks up a parameter port by name.
    pub fn find_parameter_port(&self, name: &str) -> Option<&ParameterPort> {
        self.parameter_ports.iter().find(|p| p.name == name)
    }

    pub(crate) fn audio_port_index(&self, name: &str) -> Option<usize> {
        self.audio_ports.iter().position(|p| p.name == name)
    }

    pub(crate) fn parameter_port_index(&self, name: &str) -> Option<usize> {
        self.parameter_ports.iter().position(|p| p.name == name)
    }

    /// Changes the width of an audio port. Fails after [`finalize`](Self::finalize).
    pub fn set_audio_port_width(&mut self, port: &str, width: usize) -> Result<()> {
        if self.finalized {
            return Err(SignalFlowError::PortFinalized {
                component: self.full_name.clone(),
                port: port.to_owned(),
            });
        }
        let full_name = &self.full_name;
        let p = self
            .audio_ports
            .iter_mut()
            .find(|p| p.name == port)
            .ok_or_else(|| SignalFlowError::PortNotFound {
                component: full_name.clone(),
                port: port.to_owned(),
            })?;
        p.width = width;
        Ok(())
    }

    /// Freezes port widths of this component and all descendants.
    pub fn finalize(&mut self) {
        self.finalized = true;
        if let ComponentKind::Composite(c) = &mut self.kind {
            for child in &mut c.children {
                child.finalize();
            }
        }
    }

    /// True once [`finalize`](Self::finalize) was called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Atomic or composite payload.
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub(crate) fn into_kind(self) -> ComponentKind {
        self.kind
    }

    /// Composite payload, if this is a composite.
    pub fn composite(&self) -> Option<&Composite> {
        match &self.kind {
            ComponentKind::Composite(c) => Some(c),
            ComponentKind::Atomic(_) => None,
        }
    }

    fn composite_mut(&mut self) -> Result<&mut Composite> {
        match &mut self.kind {
            ComponentKind::Composite(c) => Ok(c),
            ComponentKind::Atomic(_) => Err(SignalFlowError::NotComposite(self.full_name.clone())),
        }
    }

    fn require_composite(&self) -> Result<&Composite> {
        self.composite()
            .ok_or_else(|| SignalFlowError::NotComposite(self.full_name.clone()))
    }

    /// Recomputes the full names of this subtree below `prefix`.
    fn attach(&mut self, prefix: Option<&str>) {
        self.full_name = match prefix {
            Some(p) => format!("{p}::{}", self.name),
            None => self.name.clone(),
        };
        let own = self.full_name.clone();
        if let ComponentKind::Composite(c) = &mut self.kind {
            for child in &mut c.children {
                child.attach(Some(&own));
            }
        }
    }

    /// Adds a child component. Fails for atomic components, duplicate child
    /// names, names reserved for the composite itself (`""`, `"this"`) and
    /// children with a different sampling context.
    pub fn add_child(&mut self, mut child: Component) -> Result<()> {
        let prefix = self.has_parent.then(|| self.full_name.clone());
        let context = self.context;
        let composite_name = self.full_name.clone();
        let composite = self.composite_mut()?;
        if is_this(&child.name) || composite.children.iter().any(|c| c.name == child.name) {
            return Err(SignalFlowError::DuplicateComponent {
                composite: composite_name,
                child: child.name,
            });
        }
        if child.context != context {
            return Err(SignalFlowError::ContextMismatch {
                component: child.name,
            });
        }
        child.has_parent = true;
        child.attach(prefix.as_deref());
        #[cfg(feature = "tracing")]
        tracing::debug!("component_add: {} into {}", child.full_name, composite_name);
        composite.children.push(child);
        Ok(())
    }

    /// Direct child by name; `""` and `"this"` return the composite itself.
    pub fn find_component(&self, name: &str) -> Option<&Component> {
        if is_this(name) {
            return Some(self);
        }
        self.composite()?.children.iter().find(|c| c.name == name)
    }

    /// Child components (empty for atomic components).
    pub fn children(&self) -> &[Component] {
        self.composite()
            .map(|c| c.children.as_slice())
            .unwrap_or_default()
    }

    /// Declares an audio connection between channel lists.
    ///
    /// Endpoint names are resolved during flattening; only the lengths of
    /// the channel lists are checked here.
    pub fn audio_connection(
        &mut self,
        sender_component: &str,
        sender_port: &str,
        sender_channels: impl Into<ChannelList>,
        receiver_component: &str,
        receiver_port: &str,
        receiver_channels: impl Into<ChannelList>,
    ) -> Result<()> {
        let sender = Endpoint::new(sender_component, sender_port);
        let receiver = Endpoint::new(receiver_component, receiver_port);
        let sender_channels = sender_channels.into();
        let receiver_channels = receiver_channels.into();
        if sender_channels.len() != receiver_channels.len() {
            return Err(SignalFlowError::ChannelCountMismatch {
                composite: self.full_name.clone(),
                sender: sender.to_string(),
                receiver: receiver.to_string(),
                sent: sender_channels.len(),
                received: receiver_channels.len(),
            });
        }
        self.composite_mut()?.audio_connections.push(AudioConnection {
            sender,
            sender_channels,
            receiver,
            receiver_channels,
        });
        Ok(())
    }

    /// Connects all channels of two audio ports of equal width.
    pub fn connect_audio_ports(
        &mut self,
        sender_component: &str,
        sender_port: &str,
        receiver_component: &str,
        receiver_port: &str,
    ) -> Result<()> {
        self.require_composite()?;
        let sender = Endpoint::new(sender_component, sender_port);
        let receiver = Endpoint::new(receiver_component, receiver_port);
        let sender_width = self
            .find_component(sender_component)
            .and_then(|c| c.find_audio_port(sender_port))
            .map(AudioPort::width)
            .ok_or_else(|| SignalFlowError::SendPortNotFound {
                composite: self.full_name.clone(),
                port: sender.to_string(),
            })?;
        let receiver_width = self
            .find_component(receiver_component)
            .and_then(|c| c.find_audio_port(receiver_port))
            .map(AudioPort::width)
            .ok_or_else(|| SignalFlowError::ReceivePortNotFound {
                composite: self.full_name.clone(),
                port: receiver.to_string(),
            })?;
        if sender_width != receiver_width {
            return Err(SignalFlowError::PortWidthMismatch {
                composite: self.full_name.clone(),
                sender: sender.to_string(),
                receiver: receiver.to_string(),
                sender_width,
                receiver_width,
            });
        }
        self.audio_connection(
            sender_component,
            sender_port,
            ChannelList::all(sender_width),
            receiver_component,
            receiver_port,
            ChannelList::all(receiver_width),
        )
    }

    /// Declares a parameter connection.
    pub fn parameter_connection(
        &mut self,
        sender_component: &str,
        sender_port: &str,
        receiver_component: &str,
        receiver_port: &str,
    ) -> Result<()> {
        self.composite_mut()?
            .parameter_connections
            .push(ParameterConnection {
                sender: Endpoint::new(sender_component, sender_port),
                receiver: Endpoint::new(receiver_component, receiver_port),
            });
        Ok(())
    }

    /// Declared audio connections (empty for atomic components).
    pub fn audio_connections(&self) -> &[AudioConnection] {
        self.composite()
            .map(|c| c.audio_connections.as_slice())
            .unwrap_or_default()
    }

    /// Declared parameter connections (empty for atomic components).
    pub fn parameter_connections(&self) -> &[ParameterConnection] {
        self.composite()
            .map(|c| c.parameter_connections.as_slice())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("full_name", &self.full_name)
            .field("atomic", &self.is_atomic())
            .field("audio_ports", &self.audio_ports)
            .field("parameter_ports", &self.parameter_ports)
            .field("children", &self.children())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessError;

    struct Silence;

    impl AtomicProcessor for Silence {
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
            ctx.audio.clear_outputs();
            Ok(())
        }
    }

    fn ctx() -> SignalFlowContext {
        SignalFlowContext::new(32, 48000.0)
    }

    fn atom(name: &str) -> Component {
        let mut b = ComponentBuilder::new(ctx(), name);
        b.audio_input("in", 2).unwrap();
        b.audio_output("out", 2).unwrap();
        b.into_atomic(Silence)
    }

    #[test]
    fn duplicate_port_names_rejected() {
        let mut b = ComponentBuilder::new(ctx(), "c");
        b.audio_input("x", 1).unwrap();
        let err = b.audio_output("x", 1).unwrap_err();
        assert!(matches!(err, SignalFlowError::DuplicatePort { .. }));
        // Parameter ports have their own namespace.
        assert!(
            b.parameter_input(
                "x",
                ParameterType::new("Vector"),
                ProtocolType::SharedData,
                ParameterConfig::Empty
            )
            .is_ok()
        );
    }

    #[test]
    fn full_names_skip_top_level() {
        let mut inner = ComponentBuilder::new(ctx(), "inner").into_composite();
        inner.add_child(atom("leaf")).unwrap();
        assert_eq!(inner.children()[0].full_name(), "leaf");

        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        top.add_child(inner).unwrap();
        let inner = top.find_component("inner").unwrap();
        assert_eq!(inner.full_name(), "inner");
        assert_eq!(inner.children()[0].full_name(), "inner::leaf");
        assert_eq!(top.full_name(), "top");
    }

    #[test]
    fn find_component_this() {
        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        top.add_child(atom("a")).unwrap();
        assert_eq!(top.find_component("this").unwrap().name(), "top");
        assert_eq!(top.find_component("").unwrap().name(), "top");
        assert_eq!(top.find_component("a").unwrap().name(), "a");
        assert!(top.find_component("b").is_none());
    }

    #[test]
    fn duplicate_child_rejected() {
        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        top.add_child(atom("a")).unwrap();
        let err = top.add_child(atom("a")).unwrap_err();
        assert!(matches!(err, SignalFlowError::DuplicateComponent { .. }));
    }

    #[test]
    fn reserved_child_names_rejected() {
        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        for name in ["", "this"] {
            let err = top.add_child(atom(name)).unwrap_err();
            assert_eq!(
                err,
                SignalFlowError::DuplicateComponent {
                    composite: "top".to_owned(),
                    child: name.to_owned(),
                }
            );
        }
        assert!(top.children().is_empty());
    }

    #[test]
    fn context_mismatch_rejected() {
        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        let other = ComponentBuilder::new(SignalFlowContext::new(64, 48000.0), "x").into_composite();
        assert!(matches!(
            top.add_child(other),
            Err(SignalFlowError::ContextMismatch { .. })
        ));
    }

    #[test]
    fn atomic_rejects_composite_operations() {
        let mut a = atom("a");
        assert!(matches!(
            a.add_child(atom("b")),
            Err(SignalFlowError::NotComposite(_))
        ));
        assert!(matches!(
            a.parameter_connection("this", "p", "x", "q"),
            Err(SignalFlowError::NotComposite(_))
        ));
    }

    #[test]
    fn channel_lists_must_have_equal_length() {
        let mut top = ComponentBuilder::new(ctx(), "top").into_composite();
        top.add_child(atom("a")).unwrap();
        top.add_child(atom("b")).unwrap();
        let err = top
            .audio_connection("a", "out", [0, 1], "b", "in", [0])
            .unwrap_err();
        assert!(matches!(
            err,
            SignalFlowError::ChannelCountMismatch { sent: 2, received: 1, .. }
        ));
    }

    #[test]
    fn whole_port_connection_checks_widths() {
        let mut b = ComponentBuilder::new(ctx(), "top");
        b.audio_input("input", 3).unwrap();
        let mut top = b.into_composite();
        top.add_child(atom("a")).unwrap();
        assert!(matches!(
            top.connect_audio_ports("this", "input", "a", "in"),
            Err(SignalFlowError::PortWidthMismatch { sender_width: 3, receiver_width: 2, .. })
        ));
        assert!(matches!(
            top.connect_audio_ports("a", "nope", "this", "input"),
            Err(SignalFlowError::SendPortNotFound { .. })
        ));
        top.set_audio_port_width("input", 2).unwrap();
        top.connect_audio_ports("this", "input", "a", "in").unwrap();
        assert_eq!(top.audio_connections()[0].receiver_channels.as_slice(), &[0, 1]);
    }

    #[test]
    fn width_frozen_after_finalize() {
        let mut a = atom("a");
        a.set_audio_port_width("in", 4).unwrap();
        a.finalize();
        assert!(matches!(
            a.set_audio_port_width("in", 3),
            Err(SignalFlowError::PortFinalized { .. })
        ));
        assert_eq!(a.find_audio_port("in").unwrap().width(), 4);
    }
}
