//! Integration tests for orbis-core signal flows.
//!
//! Builds small component hierarchies through the public API and checks the
//! rendered samples, the execution order, parameter transport between threads
//! and the topology errors reported at construction.

use orbis_core::{
    AtomicProcessor, AudioPortId, AudioSignalFlow, CallbackResult, Component, ComponentBuilder,
    ParameterConfig, ParameterPortId, ParameterRegistry, Parameter, ProcessContext, ProcessError,
    ProtocolType, SignalFlowContext, SignalFlowError, StringParameter, VectorParameter, flatten,
};

const PERIOD: usize = 8;

fn ctx() -> SignalFlowContext {
    SignalFlowContext::new(PERIOD, 48000.0)
}

fn registry() -> ParameterRegistry {
    ParameterRegistry::with_core_types()
}

// ============================================================================
// Test processors
// ============================================================================

/// Multiplies every channel by the matching entry of a gain vector.
struct Gain {
    input: AudioPortId,
    output: AudioPortId,
    gains: ParameterPortId,
}

impl AtomicProcessor for Gain {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let gains = ctx.parameters.read::<VectorParameter>(self.gains)?;
        let inputs = ctx.audio.inputs();
        for (ch, out) in ctx.audio.output_port(self.output).enumerate() {
            let g = gains.get(ch).copied().unwrap_or(0.0);
            for (o, &i) in out.iter_mut().zip(inputs.input(self.input, ch)) {
                *o = g * i;
            }
        }
        Ok(())
    }
}

fn gain(name: &str, width: usize) -> Component {
    let mut b = ComponentBuilder::new(ctx(), name);
    let input = b.audio_input("in", width).unwrap();
    let output = b.audio_output("out", width).unwrap();
    let gains = b
        .parameter_input(
            "gains",
            VectorParameter::TYPE,
            ProtocolType::DoubleBuffering,
            ParameterConfig::Vector { size: width },
        )
        .unwrap();
    b.into_atomic(Gain {
        input,
        output,
        gains,
    })
}

/// Sums all channels of its input into one output channel.
struct Sum {
    input: AudioPortId,
    output: AudioPortId,
}

impl AtomicProcessor for Sum {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let inputs = ctx.audio.inputs();
        let out = ctx.audio.output(self.output, 0);
        out.fill(0.0);
        for ch in 0..inputs.width(self.input) {
            for (o, &i) in out.iter_mut().zip(inputs.input(self.input, ch)) {
                *o += i;
            }
        }
        Ok(())
    }
}

fn sum(name: &str, width: usize) -> Component {
    let mut b = ComponentBuilder::new(ctx(), name);
    let input = b.audio_input("in", width).unwrap();
    let output = b.audio_output("out", 1).unwrap();
    b.into_atomic(Sum { input, output })
}

/// Emits a text message per block and publishes the block peak.
struct Meter {
    input: AudioPortId,
    events: ParameterPortId,
    peak: ParameterPortId,
    blocks: usize,
}

impl AtomicProcessor for Meter {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
        let peak = ctx
            .audio
            .input(self.input, 0)
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        self.blocks += 1;
        ctx.parameters
            .send(self.events, StringParameter::new(format!("block {}", self.blocks)))?;
        ctx.parameters.data_mut::<VectorParameter>(self.peak)?[0] = peak;
        Ok(())
    }
}

fn meter(name: &str) -> Component {
    let mut b = ComponentBuilder::new(ctx(), name);
    let input = b.audio_input("in", 1).unwrap();
    let events = b
        .parameter_output(
            "events",
            StringParameter::TYPE,
            ProtocolType::MessageQueue,
            ParameterConfig::Empty,
        )
        .unwrap();
    let peak = b
        .parameter_output(
            "peak",
            VectorParameter::TYPE,
            ProtocolType::SharedData,
            ParameterConfig::Vector { size: 1 },
        )
        .unwrap();
    b.into_atomic(Meter {
        input,
        events,
        peak,
        blocks: 0,
    })
}

fn composite(name: &str, inputs: usize, outputs: usize) -> Component {
    let mut b = ComponentBuilder::new(ctx(), name);
    b.audio_input("input", inputs).unwrap();
    b.audio_output("output", outputs).unwrap();
    b.into_composite()
}

// ============================================================================
// 1. Rendering through nested composites
// ============================================================================

fn gains_input(b: &mut ComponentBuilder) {
    b.parameter_input(
        "gains",
        VectorParameter::TYPE,
        ProtocolType::DoubleBuffering,
        ParameterConfig::Vector { size: 2 },
    )
    .unwrap();
}

/// `top { mix { gain -> sum } }` with the gain vector fed from outside.
///
/// Without `placeholder`, `mix` lacks the `gains` port that `top` connects to.
fn nested_mixer(placeholder: bool) -> Component {
    let mut b = ComponentBuilder::new(ctx(), "mix");
    b.audio_input("input", 2).unwrap();
    b.audio_output("output", 1).unwrap();
    if placeholder {
        gains_input(&mut b);
    }
    let mut mix = b.into_composite();
    mix.add_child(sum("sum", 2)).unwrap();
    mix.add_child(gain("gain", 2)).unwrap();
    mix.connect_audio_ports("this", "input", "gain", "in").unwrap();
    mix.connect_audio_ports("gain", "out", "sum", "in").unwrap();
    mix.connect_audio_ports("sum", "out", "this", "output").unwrap();
    if placeholder {
        mix.parameter_connection("this", "gains", "gain", "gains").unwrap();
    }

    let mut b = ComponentBuilder::new(ctx(), "top");
    b.audio_input("input", 2).unwrap();
    b.audio_output("output", 1).unwrap();
    gains_input(&mut b);
    let mut top = b.into_composite();
    top.add_child(mix).unwrap();
    top.connect_audio_ports("this", "input", "mix", "input").unwrap();
    top.connect_audio_ports("mix", "output", "this", "output").unwrap();
    top.parameter_connection("this", "gains", "mix", "gains").unwrap();
    top
}

#[test]
fn nested_composite_renders_in_dependency_order() {
    let mut flow = AudioSignalFlow::new(nested_mixer(true), &registry()).unwrap();
    assert_eq!(flow.schedule(), vec!["mix::gain", "mix::sum"]);
    assert_eq!(flow.number_of_capture_channels(), 2);
    assert_eq!(flow.number_of_playback_channels(), 1);

    flow.parameter_sender("gains")
        .unwrap()
        .send(VectorParameter(vec![0.25, 2.0]))
        .unwrap();

    let a = [1.0f32; PERIOD];
    let b = [0.5f32; PERIOD];
    let mut out = [0.0f32; PERIOD];
    assert_eq!(
        flow.process(&[&a, &b], &mut [&mut out]),
        CallbackResult::Continue
    );
    for s in out {
        assert!((s - 1.25).abs() < 1e-6, "got: {s}");
    }

    // Values persist until replaced.
    out.fill(0.0);
    flow.process(&[&a, &b], &mut [&mut out]);
    assert!((out[0] - 1.25).abs() < 1e-6);
}

#[test]
fn parameter_connection_to_missing_placeholder_is_rejected() {
    let err = AudioSignalFlow::new(nested_mixer(false), &registry()).unwrap_err();
    assert!(
        matches!(err, SignalFlowError::ReceivePortNotFound { .. }),
        "got: {err}"
    );
}

// ============================================================================
// 2. Parameter transport
// ============================================================================

#[test]
fn parameter_outputs_reach_external_receivers() {
    let mut b = ComponentBuilder::new(ctx(), "top");
    b.audio_input("input", 1).unwrap();
    b.parameter_output(
        "events",
        StringParameter::TYPE,
        ProtocolType::MessageQueue,
        ParameterConfig::Empty,
    )
    .unwrap();
    b.parameter_output(
        "peak",
        VectorParameter::TYPE,
        ProtocolType::SharedData,
        ParameterConfig::Vector { size: 1 },
    )
    .unwrap();
    let mut top = b.into_composite();
    top.add_child(meter("meter")).unwrap();
    top.connect_audio_ports("this", "input", "meter", "in").unwrap();
    top.parameter_connection("meter", "events", "this", "events").unwrap();
    top.parameter_connection("meter", "peak", "this", "peak").unwrap();

    let mut flow = AudioSignalFlow::new(top, &registry()).unwrap();
    let events = flow.parameter_receiver("events").unwrap();
    let peak = flow.parameter_receiver("peak").unwrap();

    let mut block = [0.0f32; PERIOD];
    block[3] = -0.75;
    for _ in 0..3 {
        assert_eq!(flow.process(&[&block], &mut []), CallbackResult::Continue);
    }

    assert_eq!(events.pending(), 3);
    let first: StringParameter = events.receive().unwrap().unwrap();
    assert_eq!(first.as_str(), "block 1");
    let latest: VectorParameter = peak.receive().unwrap().unwrap();
    assert_eq!(latest.0, vec![0.75]);
    assert!(peak.receive::<VectorParameter>().unwrap().is_none());
}

#[test]
fn sender_rejects_wrong_parameter_type() {
    let mut b = ComponentBuilder::new(ctx(), "top");
    b.parameter_input(
        "label",
        StringParameter::TYPE,
        ProtocolType::SharedData,
        ParameterConfig::Empty,
    )
    .unwrap();
    let flow = AudioSignalFlow::new(b.into_composite(), &registry()).unwrap();
    let sender = flow.parameter_sender("label").unwrap();
    let err = sender.send(VectorParameter::zeros(1)).unwrap_err();
    assert!(err.to_string().contains("expected String"), "got: {err}");
}

// ============================================================================
// 3. Topology errors
// ============================================================================

#[test]
fn cycle_between_atoms_is_reported() {
    let mut top = composite("top", 1, 1);
    top.add_child(gain("a", 1)).unwrap();
    top.add_child(gain("b", 1)).unwrap();
    top.connect_audio_ports("a", "out", "b", "in").unwrap();
    top.connect_audio_ports("b", "out", "a", "in").unwrap();
    top.connect_audio_ports("b", "out", "this", "output").unwrap();
    let err = AudioSignalFlow::new(top, &registry()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("cycle"), "got: {msg}");
    assert!(msg.contains("a, b"), "got: {msg}");
}

#[test]
fn placeholder_loop_is_reported() {
    let mut inner = composite("inner", 1, 1);
    inner.connect_audio_ports("this", "input", "this", "output").unwrap();
    let mut top = composite("top", 1, 1);
    top.add_child(inner).unwrap();
    top.connect_audio_ports("inner", "output", "inner", "input").unwrap();
    top.connect_audio_ports("inner", "output", "this", "output").unwrap();
    let err = AudioSignalFlow::new(top, &registry()).unwrap_err();
    assert!(matches!(err, SignalFlowError::ClosedLoop { .. }), "got: {err}");
    assert!(err.to_string().contains("closed loop"));
}

#[test]
fn unconnected_audio_input_is_reported() {
    let mut top = composite("top", 1, 1);
    top.add_child(gain("g", 2)).unwrap();
    top.audio_connection("this", "input", [0], "g", "in", [0]).unwrap();
    top.audio_connection("g", "out", [0], "this", "output", [0]).unwrap();
    let err = AudioSignalFlow::new(top, &registry()).unwrap_err();
    match err {
        SignalFlowError::UnconnectedReceivePort { port, channel } => {
            assert_eq!(port, "g:in");
            assert_eq!(channel, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn finalized_widths_are_frozen() {
    let mut top = composite("top", 2, 2);
    top.set_audio_port_width("input", 4).unwrap();
    assert_eq!(top.find_audio_port("input").unwrap().width(), 4);
    top.finalize();
    let err = top.set_audio_port_width("input", 2).unwrap_err();
    assert!(matches!(err, SignalFlowError::PortFinalized { .. }));
}

#[test]
fn flatten_reports_execution_order_without_running() {
    let mut top = composite("top", 1, 1);
    top.add_child(gain("late", 1)).unwrap();
    top.add_child(gain("early", 1)).unwrap();
    top.connect_audio_ports("this", "input", "early", "in").unwrap();
    top.connect_audio_ports("early", "out", "late", "in").unwrap();
    top.connect_audio_ports("late", "out", "this", "output").unwrap();
    let flat = flatten(&top, &registry()).unwrap();
    assert_eq!(flat.execution_order(), vec!["early", "late"]);
    assert_eq!(flat.atom_count(), 2);
    assert_eq!(flat.audio_connections().len(), 3);
}
