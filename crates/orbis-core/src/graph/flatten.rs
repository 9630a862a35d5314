//! Flattening of a component hierarchy.
//!
//! [`flatten`] turns a nested composite into direct bindings between the
//! ports of atomic components (plus the top-level ports) and a linear
//! execution order:
//!
//! 1. Walk the hierarchy in pre-order and number every component.
//! 2. For each composite, check every declared connection against the ports
//!    visible at that level. A composite's own inputs act as senders and its
//!    own outputs as receivers.
//! 3. Record `receiver channel -> sender channel` in one table; a receiver
//!    channel with two senders is an error.
//! 4. Follow chains through placeholder ports (ports of non-top composites)
//!    until a genuine sender is reached. The walk is bounded by the table
//!    size, so loops through placeholders are reported instead of hanging.
//! 5. Order the atomic components topologically by their audio and
//!    parameter dependencies.
//!
//! The result is a pure function of the hierarchy: flattening the same
//! graph twice gives equal [`FlatGraph`]s.

use std::collections::BTreeMap;

use super::schedule::DependencyGraph;
use crate::component::{AudioPort, Component, Endpoint, ParameterPort, PortDirection};
use crate::error::{Result, SignalFlowError};
use crate::parameter::ParameterRegistry;

/// A port of a flattened component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct PortKey {
    /// Index into [`FlatGraph::components`].
    pub component: usize,
    /// Index into the component's audio or parameter port list.
    pub port: usize,
}

/// One audio channel of a port.
pub(crate) type ChannelKey = (PortKey, usize);

/// Component record of a flattened hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlatComponent {
    pub full_name: String,
    pub atomic: bool,
    pub audio_ports: Vec<AudioPort>,
    pub parameter_ports: Vec<ParameterPort>,
}

/// A resolved channel binding between two genuine ports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedConnection {
    /// `component:port` of the sender.
    pub sender: String,
    /// Sender channel.
    pub sender_channel: usize,
    /// `component:port` of the receiver.
    pub receiver: String,
    /// Receiver channel.
    pub receiver_channel: usize,
}

/// Result of flattening a component hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGraph {
    /// All components in pre-order; index 0 is the top level.
    pub(crate) components: Vec<FlatComponent>,
    /// Component indices of the atomic components in pre-order.
    pub(crate) atoms: Vec<usize>,
    /// Genuine audio receiver channel to its genuine sender channel.
    pub(crate) audio_sources: BTreeMap<ChannelKey, ChannelKey>,
    /// Genuine parameter receiver to its sender (`None` if unconnected).
    pub(crate) parameter_sources: BTreeMap<PortKey, Option<PortKey>>,
    /// Component indices of the atomic components in execution order.
    pub(crate) schedule: Vec<usize>,
}

impl FlatGraph {
    /// Full names of the atomic components in execution order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.schedule
            .iter()
            .map(|&c| self.components[c].full_name.as_str())
            .collect()
    }

    /// Number of atomic components.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Resolved audio bindings, ordered by receiver.
    pub fn audio_connections(&self) -> Vec<ResolvedConnection> {
        self.audio_sources
            .iter()
            .map(|(&(recv, rc), &(send, sc))| ResolvedConnection {
                sender: self.audio_port_path(send),
                sender_channel: sc,
                receiver: self.audio_port_path(recv),
                receiver_channel: rc,
            })
            .collect()
    }

    /// Resolved parameter bindings as `(sender, receiver)` paths.
    pub fn parameter_connections(&self) -> Vec<(String, String)> {
        self.parameter_sources
            .iter()
            .filter_map(|(&recv, &send)| {
                send.map(|s| (self.parameter_port_path(s), self.parameter_port_path(recv)))
            })
            .collect()
    }

    pub(crate) fn audio_port_path(&self, key: PortKey) -> String {
        let c = &self.components[key.component];
        format!("{}:{}", c.full_name, c.audio_ports[key.port].name())
    }

    pub(crate) fn parameter_port_path(&self, key: PortKey) -> String {
        let c = &self.components[key.component];
        format!("{}:{}", c.full_name, c.parameter_ports[key.port].name())
    }

    pub(crate) fn top(&self) -> &FlatComponent {
        &self.components[0]
    }
}

/// Pre-order table of the hierarchy with child indices per component.
struct Table<'c> {
    nodes: Vec<&'c Component>,
    children: Vec<Vec<usize>>,
}

impl<'c> Table<'c> {
    fn collect(&mut self, component: &'c Component) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(component);
        self.children.push(Vec::new());
        for child in component.children() {
            let child_idx = self.collect(child);
            self.children[idx].push(child_idx);
        }
        idx
    }

    fn is_placeholder(&self, component: usize) -> bool {
        component != 0 && self.nodes[component].is_composite()
    }

    fn audio_path(&self, key: PortKey) -> String {
        let c = self.nodes[key.component];
        format!("{}:{}", c.full_name(), c.audio_ports()[key.port].name())
    }

    fn parameter_path(&self, key: PortKey) -> String {
        let c = self.nodes[key.component];
        format!("{}:{}", c.full_name(), c.parameter_ports()[key.port].name())
    }

    /// Component an endpoint names from inside `composite`.
    fn endpoint_component(&self, composite: usize, endpoint: &Endpoint) -> Option<usize> {
        if endpoint.is_this() {
            return Some(composite);
        }
        self.children[composite]
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name() == endpoint.component)
    }

    /// Direction a port must have to act as sender/receiver inside `composite`.
    fn expected_direction(composite: usize, component: usize, sending: bool) -> PortDirection {
        match (component == composite, sending) {
            (true, true) | (false, false) => PortDirection::Input,
            (true, false) | (false, true) => PortDirection::Output,
        }
    }

    fn audio_endpoint(&self, composite: usize, endpoint: &Endpoint, sending: bool) -> Option<PortKey> {
        let component = self.endpoint_component(composite, endpoint)?;
        let port = self.nodes[component].audio_port_index(&endpoint.port)?;
        let direction = self.nodes[component].audio_ports()[port].direction();
        (direction == Self::expected_direction(composite, component, sending))
            .then_some(PortKey { component, port })
    }

    fn parameter_endpoint(&self, composite: usize, endpoint: &Endpoint, sending: bool) -> Option<PortKey> {
        let component = self.endpoint_component(composite, endpoint)?;
        let port = self.nodes[component].parameter_port_index(&endpoint.port)?;
        let direction = self.nodes[component].parameter_ports()[port].direction();
        (direction == Self::expected_direction(composite, component, sending))
            .then_some(PortKey { component, port })
    }

    fn audio_port(&self, key: PortKey) -> &AudioPort {
        &self.nodes[key.component].audio_ports()[key.port]
    }

    fn parameter_port(&self, key: PortKey) -> &ParameterPort {
        &self.nodes[key.component].parameter_ports()[key.port]
    }
}

/// End of a chain of placeholder connections.
enum Chain<K> {
    /// Reached a genuine sender.
    Sender(K),
    /// Reached a receiver without sender.
    Open(K),
    /// Exceeded the step bound.
    Loop(K),
}

fn follow<K: Ord + Copy>(map: &BTreeMap<K, K>, start: K, is_placeholder: impl Fn(K) -> bool) -> Chain<K> {
    let mut current = start;
    let mut steps = 0usize;
    loop {
        let Some(&sender) = map.get(&current) else {
            return Chain::Open(current);
        };
        if !is_placeholder(sender) {
            return Chain::Sender(sender);
        }
        steps += 1;
        if steps > map.len() {
            return Chain::Loop(sender);
        }
        current = sender;
    }
}

/// Flattens a composite hierarchy.
///
/// Every parameter type used by an atomic or top-level port must be known to
/// `registry`.
pub fn flatten(top: &Component, registry: &ParameterRegistry) -> Result<FlatGraph> {
    if top.is_atomic() {
        return Err(SignalFlowError::NotComposite(top.full_name().to_owned()));
    }
    let mut table = Table {
        nodes: Vec::new(),
        children: Vec::new(),
    };
    table.collect(top);

    let raw_audio = collect_audio_connections(&table)?;
    let raw_parameters = collect_parameter_connections(&table)?;

    let audio_sources = resolve_audio(&table, &raw_audio)?;
    let parameter_sources = resolve_parameters(&table, &raw_parameters)?;
    check_parameter_types(&table, registry)?;

    let atoms: Vec<usize> = (0..table.nodes.len())
        .filter(|&c| table.nodes[c].is_atomic())
        .collect();
    let mut ordinal = vec![usize::MAX; table.nodes.len()];
    for (i, &c) in atoms.iter().enumerate() {
        ordinal[c] = i;
    }

    let mut deps = DependencyGraph::new(atoms.len());
    let atomic = |c: usize| table.nodes[c].is_atomic();
    for (&(recv, _), &(send, _)) in &audio_sources {
        if atomic(recv.component) && atomic(send.component) {
            deps.add_edge(ordinal[send.component], ordinal[recv.component]);
        }
    }
    for (recv, send) in &parameter_sources {
        if let Some(send) = send {
            if atomic(recv.component) && atomic(send.component) {
                deps.add_edge(ordinal[send.component], ordinal[recv.component]);
            }
        }
    }

    let order = deps.kahn_sort().map_err(|stuck| {
        let names: Vec<&str> = stuck.iter().map(|&a| table.nodes[atoms[a]].full_name()).collect();
        SignalFlowError::CycleDetected(names.join(", "))
    })?;
    let schedule: Vec<usize> = order.iter().map(|&a| atoms[a]).collect();

    #[cfg(feature = "tracing")]
    {
        tracing::debug!(
            "flatten: {} components, {} atoms, {} audio bindings, {} dependencies",
            table.nodes.len(),
            atoms.len(),
            audio_sources.len(),
            deps.edge_count()
        );
        for (i, &c) in schedule.iter().enumerate() {
            tracing::debug!("  schedule[{i}]: {}", table.nodes[c].full_name());
        }
    }

    let components = table
        .nodes
        .iter()
        .map(|c| FlatComponent {
            full_name: c.full_name().to_owned(),
            atomic: c.is_atomic(),
            audio_ports: c.audio_ports().to_vec(),
            parameter_ports: c.parameter_ports().to_vec(),
        })
        .collect();

    Ok(FlatGraph {
        components,
        atoms,
        audio_sources,
        parameter_sources,
        schedule,
    })
}

fn collect_audio_connections(table: &Table<'_>) -> Result<BTreeMap<ChannelKey, ChannelKey>> {
    let mut map = BTreeMap::new();
    for (composite, node) in table.nodes.iter().enumerate() {
        let scope = node.full_name();
        for conn in node.audio_connections() {
            let sender = table
                .audio_endpoint(composite, &conn.sender, true)
                .ok_or_else(|| SignalFlowError::SendPortNotFound {
                    composite: scope.to_owned(),
                    port: conn.sender.to_string(),
                })?;
            let receiver = table
                .audio_endpoint(composite, &conn.receiver, false)
                .ok_or_else(|| SignalFlowError::ReceivePortNotFound {
                    composite: scope.to_owned(),
                    port: conn.receiver.to_string(),
                })?;
            if conn.sender_channels.len() != conn.receiver_channels.len() {
                return Err(SignalFlowError::ChannelCountMismatch {
                    composite: scope.to_owned(),
                    sender: conn.sender.to_string(),
                    receiver: conn.receiver.to_string(),
                    sent: conn.sender_channels.len(),
                    received: conn.receiver_channels.len(),
                });
            }
            for (endpoint, key, channels) in [
                (&conn.sender, sender, &conn.sender_channels),
                (&conn.receiver, receiver, &conn.receiver_channels),
            ] {
                let width = table.audio_port(key).width();
                if let Some(channel) = channels.iter().find(|&ch| ch >= width) {
                    return Err(SignalFlowError::ChannelOutOfRange {
                        composite: scope.to_owned(),
                        port: endpoint.to_string(),
                        channel,
                        width,
                    });
                }
            }
            for (sc, rc) in conn.sender_channels.iter().zip(conn.receiver_channels.iter()) {
                if map.insert((receiver, rc), (sender, sc)).is_some() {
                    return Err(SignalFlowError::MultipleSenders {
                        port: table.audio_path(receiver),
                        channel: rc,
                    });
                }
            }
        }
    }
    Ok(map)
}

fn collect_parameter_connections(table: &Table<'_>) -> Result<BTreeMap<PortKey, PortKey>> {
    let mut map = BTreeMap::new();
    for (composite, node) in table.nodes.iter().enumerate() {
        let scope = node.full_name();
        for conn in node.parameter_connections() {
            let sender = table
                .parameter_endpoint(composite, &conn.sender, true)
                .ok_or_else(|| SignalFlowError::SendPortNotFound {
                    composite: scope.to_owned(),
                    port: conn.sender.to_string(),
                })?;
            let receiver = table
                .parameter_endpoint(composite, &conn.receiver, false)
                .ok_or_else(|| SignalFlowError::ReceivePortNotFound {
                    composite: scope.to_owned(),
                    port: conn.receiver.to_string(),
                })?;
            if let Some(reason) = table.parameter_port(sender).mismatch(table.parameter_port(receiver)) {
                return Err(SignalFlowError::ParameterMismatch {
                    sender: table.parameter_path(sender),
                    receiver: table.parameter_path(receiver),
                    reason,
                });
            }
            if map.insert(receiver, sender).is_some() {
                return Err(SignalFlowError::MultipleSenders {
                    port: table.parameter_path(receiver),
                    channel: 0,
                });
            }
        }
    }
    Ok(map)
}

/// Genuine receivers: inputs of atomic components and outputs of the top level.
fn is_genuine_receiver(table: &Table<'_>, component: usize, direction: PortDirection) -> bool {
    if component == 0 {
        direction == PortDirection::Output
    } else {
        table.nodes[component].is_atomic() && direction == PortDirection::Input
    }
}

fn resolve_audio(
    table: &Table<'_>,
    raw: &BTreeMap<ChannelKey, ChannelKey>,
) -> Result<BTreeMap<ChannelKey, ChannelKey>> {
    let placeholder = |(key, _): ChannelKey| table.is_placeholder(key.component);
    let mut resolved = BTreeMap::new();

    for (component, node) in table.nodes.iter().enumerate() {
        for (port, p) in node.audio_ports().iter().enumerate() {
            if !is_genuine_receiver(table, component, p.direction()) {
                continue;
            }
            let key = PortKey { component, port };
            for channel in 0..p.width() {
                match follow(raw, (key, channel), placeholder) {
                    Chain::Sender(sender) => {
                        resolved.insert((key, channel), sender);
                    }
                    Chain::Open((open, ch)) => {
                        return Err(SignalFlowError::UnconnectedReceivePort {
                            port: table.audio_path(open),
                            channel: ch,
                        });
                    }
                    Chain::Loop((at, _)) => {
                        return Err(SignalFlowError::ClosedLoop {
                            port: table.audio_path(at),
                        });
                    }
                }
            }
        }
    }

    // Loops that no genuine receiver reaches are still configuration errors.
    for &start in raw.keys() {
        if let Chain::Loop((at, _)) = follow(raw, start, placeholder) {
            return Err(SignalFlowError::ClosedLoop {
                port: table.audio_path(at),
            });
        }
    }
    Ok(resolved)
}

fn resolve_parameters(
    table: &Table<'_>,
    raw: &BTreeMap<PortKey, PortKey>,
) -> Result<BTreeMap<PortKey, Option<PortKey>>> {
    let placeholder = |key: PortKey| table.is_placeholder(key.component);
    let mut resolved = BTreeMap::new();

    for (component, node) in table.nodes.iter().enumerate() {
        for (port, p) in node.parameter_ports().iter().enumerate() {
            if !is_genuine_receiver(table, component, p.direction()) {
                continue;
            }
            let key = PortKey { component, port };
            let source = match follow(raw, key, placeholder) {
                Chain::Sender(sender) => Some(sender),
                Chain::Open(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "parameter port {} is not connected, using a default value",
                        table.parameter_path(key)
                    );
                    None
                }
                Chain::Loop(at) => {
                    return Err(SignalFlowError::ClosedLoop {
                        port: table.parameter_path(at),
                    });
                }
            };
            resolved.insert(key, source);
        }
    }

    for &start in raw.keys() {
        if let Chain::Loop(at) = follow(raw, start, placeholder) {
            return Err(SignalFlowError::ClosedLoop {
                port: table.parameter_path(at),
            });
        }
    }
    Ok(resolved)
}

fn check_parameter_types(table: &Table<'_>, registry: &ParameterRegistry) -> Result<()> {
    for (component, node) in table.nodes.iter().enumerate() {
        if component != 0 && !node.is_atomic() {
            continue;
        }
        for (port, p) in node.parameter_ports().iter().enumerate() {
            if !registry.contains(p.parameter_type()) {
                return Err(SignalFlowError::UnknownParameterType {
                    port: table.parameter_path(PortKey { component, port }),
                    parameter_type: p.parameter_type().name().to_owned(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{AtomicProcessor, ComponentBuilder, ProcessContext};
    use crate::parameter::{Parameter, ParameterConfig, ProtocolType, VectorParameter};
    use crate::{ProcessError, SignalFlowContext};

    struct Nop;

    impl AtomicProcessor for Nop {
        fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> std::result::Result<(), ProcessError> {
            Ok(())
        }
    }

    fn ctx() -> SignalFlowContext {
        SignalFlowContext::new(16, 48000.0)
    }

    fn atom(name: &str, inputs: usize, outputs: usize) -> Component {
        let mut b = ComponentBuilder::new(ctx(), name);
        b.audio_input("in", inputs).unwrap();
        b.audio_output("out", outputs).unwrap();
        b.into_atomic(Nop)
    }

    fn top(inputs: usize, outputs: usize) -> Component {
        let mut b = ComponentBuilder::new(ctx(), "top");
        b.audio_input("input", inputs).unwrap();
        b.audio_output("output", outputs).unwrap();
        b.into_composite()
    }

    fn registry() -> ParameterRegistry {
        ParameterRegistry::with_core_types()
    }

    #[test]
    fn chain_is_scheduled_in_dependency_order() {
        let mut t = top(1, 1);
        // Declared out of order: b consumes a.
        t.add_child(atom("b", 1, 1)).unwrap();
        t.add_child(atom("a", 1, 1)).unwrap();
        t.connect_audio_ports("this", "input", "a", "in").unwrap();
        t.connect_audio_ports("a", "out", "b", "in").unwrap();
        t.connect_audio_ports("b", "out", "this", "output").unwrap();
        let flat = flatten(&t, &registry()).unwrap();
        assert_eq!(flat.execution_order(), vec!["a", "b"]);
        assert_eq!(flat.audio_connections().len(), 3);
    }

    #[test]
    fn placeholders_resolve_through_nesting() {
        let mut inner_b = ComponentBuilder::new(ctx(), "inner");
        inner_b.audio_input("in", 2).unwrap();
        inner_b.audio_output("out", 2).unwrap();
        let mut inner = inner_b.into_composite();
        inner.add_child(atom("leaf", 2, 2)).unwrap();
        inner.connect_audio_ports("this", "in", "leaf", "in").unwrap();
        inner.connect_audio_ports("leaf", "out", "this", "out").unwrap();

        let mut t = top(2, 2);
        t.add_child(inner).unwrap();
        t.connect_audio_ports("this", "input", "inner", "in").unwrap();
        t.connect_audio_ports("inner", "out", "this", "output").unwrap();

        let flat = flatten(&t, &registry()).unwrap();
        assert_eq!(flat.execution_order(), vec!["inner::leaf"]);
        let conns = flat.audio_connections();
        assert!(conns.contains(&ResolvedConnection {
            sender: "top:input".into(),
            sender_channel: 1,
            receiver: "inner::leaf:in".into(),
            receiver_channel: 1,
        }));
        assert!(conns.contains(&ResolvedConnection {
            sender: "inner::leaf:out".into(),
            sender_channel: 0,
            receiver: "top:output".into(),
            receiver_channel: 0,
        }));
    }

    #[test]
    fn channel_permutation_is_preserved() {
        let mut t = top(2, 2);
        t.add_child(atom("a", 2, 2)).unwrap();
        t.audio_connection("this", "input", [0, 1], "a", "in", [1, 0]).unwrap();
        t.connect_audio_ports("a", "out", "this", "output").unwrap();
        let flat = flatten(&t, &registry()).unwrap();
        let c = flat
            .audio_connections()
            .into_iter()
            .find(|c| c.receiver == "a:in" && c.receiver_channel == 0)
            .unwrap();
        assert_eq!(c.sender_channel, 1);
    }

    #[test]
    fn unknown_send_port_is_reported() {
        let mut t = top(1, 1);
        t.add_child(atom("a", 1, 1)).unwrap();
        t.audio_connection("a", "missing", 0, "this", "output", 0).unwrap();
        let err = flatten(&t, &registry()).unwrap_err();
        let msg = err.to_string();
        assert!(
            msg.contains("In component \"top\", the send port \"a:missing\" is not found."),
            "got: {msg}"
        );
    }

    #[test]
    fn wrong_direction_counts_as_missing() {
        let mut t = top(1, 1);
        t.add_child(atom("a", 1, 1)).unwrap();
        // An input cannot send.
        t.audio_connection("a", "in", 0, "this", "output", 0).unwrap();
        assert!(matches!(
            flatten(&t, &registry()),
            Err(SignalFlowError::SendPortNotFound { .. })
        ));
    }

    #[test]
    fn channel_out_of_range() {
        let mut t = top(1, 1);
        t.add_child(atom("a", 1, 1)).unwrap();
        t.audio_connection("this", "input", 0, "a", "in", 3).unwrap();
        assert!(matches!(
            flatten(&t, &registry()),
            Err(SignalFlowError::ChannelOutOfRange { channel: 3, width: 1, .. })
        ));
    }

    #[test]
    fn two_senders_for_one_channel() {
        let mut t = top(2, 1);
        t.add_child(atom("a", 1, 1)).unwrap();
        t.audio_connection("this", "input", 0, "a", "in", 0).unwrap();
        t.audio_connection("this", "input", 1, "a", "in", 0).unwrap();
        assert!(matches!(
            flatten(&t, &registry()),
            Err(SignalFlowError::MultipleSenders { channel: 0, .. })
        ));
    }

    #[test]
    fn unconnected_atom_input() {
        let mut t = top(1, 1);
        t.add_child(atom("a", 2, 1)).unwrap();
        t.audio_connection("this", "input", 0, "a", "in", 0).unwrap();
        t.connect_audio_ports("a", "out", "this", "output").unwrap();
        let err = flatten(&t, &registry()).unwrap_err();
        assert_eq!(
            err,
            SignalFlowError::UnconnectedReceivePort {
                port: "a:in".into(),
                channel: 1
            }
        );
    }

    #[test]
    fn atom_feedback_is_a_cycle() {
        let mut t = top(1, 1);
        t.add_child(atom("a", 2, 1)).unwrap();
        t.add_child(atom("b", 1, 1)).unwrap();
        t.audio_connection("this", "input", 0, "a", "in", 0).unwrap();
        t.audio_connection("b", "out", 0, "a", "in", 1).unwrap();
        t.connect_audio_ports("a", "out", "b", "in").unwrap();
        t.connect_audio_ports("b", "out", "this", "output").unwrap();
        let err = flatten(&t, &registry()).unwrap_err();
        assert_eq!(err, SignalFlowError::CycleDetected("a, b".into()));
    }

    #[test]
    fn placeholder_loop_is_detected() {
        // inner passes its input straight to its output; the parent feeds the
        // output back into the input.
        let mut inner_b = ComponentBuilder::new(ctx(), "inner");
        inner_b.audio_input("in", 1).unwrap();
        inner_b.audio_output("out", 1).unwrap();
        let mut inner = inner_b.into_composite();
        inner.connect_audio_ports("this", "in", "this", "out").unwrap();

        let mut t = top(1, 1);
        t.add_child(inner).unwrap();
        t.connect_audio_ports("inner", "out", "inner", "in").unwrap();
        t.connect_audio_ports("this", "input", "this", "output").unwrap();
        let err = flatten(&t, &registry()).unwrap_err();
        assert!(err.to_string().contains("closed loop detected"), "got: {err}");
    }

    fn param_atom(name: &str, direction: PortDirection, protocol: ProtocolType, size: usize) -> Component {
        let mut b = ComponentBuilder::new(ctx(), name);
        let config = ParameterConfig::Vector { size };
        match direction {
            PortDirection::Input => b.parameter_input("p", VectorParameter::TYPE, protocol, config),
            PortDirection::Output => b.parameter_output("p", VectorParameter::TYPE, protocol, config),
        }
        .unwrap();
        b.into_atomic(Nop)
    }

    #[test]
    fn parameter_connection_orders_sender_first() {
        let mut t = ComponentBuilder::new(ctx(), "top").into_composite();
        t.add_child(param_atom("rx", PortDirection::Input, ProtocolType::SharedData, 4)).unwrap();
        t.add_child(param_atom("tx", PortDirection::Output, ProtocolType::SharedData, 4)).unwrap();
        t.parameter_connection("tx", "p", "rx", "p").unwrap();
        let flat = flatten(&t, &registry()).unwrap();
        assert_eq!(flat.execution_order(), vec!["tx", "rx"]);
        assert_eq!(flat.parameter_connections(), vec![("tx:p".to_owned(), "rx:p".to_owned())]);
    }

    #[test]
    fn parameter_mismatch_is_rejected() {
        let mut t = ComponentBuilder::new(ctx(), "top").into_composite();
        t.add_child(param_atom("rx", PortDirection::Input, ProtocolType::SharedData, 4)).unwrap();
        t.add_child(param_atom("tx", PortDirection::Output, ProtocolType::SharedData, 3)).unwrap();
        t.parameter_connection("tx", "p", "rx", "p").unwrap();
        assert!(matches!(
            flatten(&t, &registry()),
            Err(SignalFlowError::ParameterMismatch { .. })
        ));
    }

    #[test]
    fn unconnected_parameter_input_is_allowed() {
        let mut t = ComponentBuilder::new(ctx(), "top").into_composite();
        t.add_child(param_atom("rx", PortDirection::Input, ProtocolType::DoubleBuffering, 2)).unwrap();
        let flat = flatten(&t, &registry()).unwrap();
        assert_eq!(flat.parameter_sources.values().copied().collect::<Vec<_>>(), vec![None]);
    }

    #[test]
    fn unregistered_parameter_type() {
        let mut t = ComponentBuilder::new(ctx(), "top").into_composite();
        t.add_child(param_atom("rx", PortDirection::Input, ProtocolType::SharedData, 2)).unwrap();
        let err = flatten(&t, &ParameterRegistry::new()).unwrap_err();
        assert!(matches!(err, SignalFlowError::UnknownParameterType { .. }));
    }

    #[test]
    fn atomic_top_level_is_rejected() {
        let a = atom("a", 1, 1);
        assert!(matches!(
            flatten(&a, &registry()),
            Err(SignalFlowError::NotComposite(_))
        ));
    }

    #[test]
    fn flattening_twice_is_identical() {
        let mut t = top(2, 2);
        t.add_child(atom("x", 2, 2)).unwrap();
        t.add_child(atom("y", 2, 2)).unwrap();
        t.connect_audio_ports("this", "input", "x", "in").unwrap();
        t.connect_audio_ports("this", "input", "y", "in").unwrap();
        t.connect_audio_ports("y", "out", "this", "output").unwrap();
        let a = flatten(&t, &registry()).unwrap();
        let b = flatten(&t, &registry()).unwrap();
        assert_eq!(a, b);
    }
}
