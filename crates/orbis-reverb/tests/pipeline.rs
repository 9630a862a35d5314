//! Drives the reverb parameter calculator and the late filter calculator as
//! components of one signal flow.

use orbis_core::{
    AudioSignalFlow, CallbackResult, ComponentBuilder, IndexedValue, Parameter, ParameterConfig,
    ParameterRegistry, ProtocolType, SignalFlowContext, VectorParameter,
};
use orbis_objects::{
    AudioObject, DiscreteReflection, LATE_REVERB_SUBBANDS, LateReverb, ObjectKind, ObjectVector,
    Position,
};
use orbis_panning::{LoudspeakerArray, Vector3};
use orbis_reverb::{LateReverbFilterCalculator, ReverbParameterCalculator, register_parameters};

const PERIOD: usize = 32;
const FS: f32 = 48000.0;

fn ctx() -> SignalFlowContext {
    SignalFlowContext::new(PERIOD, FS)
}

fn registry() -> ParameterRegistry {
    let mut registry = ParameterRegistry::with_core_types();
    orbis_objects::register_parameters(&mut registry);
    register_parameters(&mut registry);
    registry
}

fn triangle() -> LoudspeakerArray {
    LoudspeakerArray::builder()
        .speaker(1, 1, Vector3::new(1.0, 0.0, 0.0))
        .speaker(2, 2, Vector3::new(0.0, 1.0, 0.0))
        .speaker(3, 3, Vector3::new(0.0, 0.0, 1.0))
        .triplet(&[1, 2, 3])
        .build()
        .unwrap()
}

fn reverb_object(id: u32, level: f32) -> AudioObject {
    AudioObject::new(
        id,
        ObjectKind::PointSourceWithReverb {
            position: Position::new(1.0, 0.0, 0.0),
            reflections: vec![DiscreteReflection {
                position: Position::new(0.0, 0.0, 2.0),
                delay: 0.01,
                level: 0.5,
                filter: Vec::new(),
            }],
            late: LateReverb {
                onset_delay: 0.001,
                levels: [level; LATE_REVERB_SUBBANDS],
                decay_coeffs: [-20.0; LATE_REVERB_SUBBANDS],
                attack_times: [0.001; LATE_REVERB_SUBBANDS],
            },
        },
    )
    .with_channels(vec![0])
}

/// Composite with an object input, the late filters and the discrete gains
/// as external ports.
fn flow(max_updates: usize) -> AudioSignalFlow {
    let calc = ReverbParameterCalculator::new(&triangle(), 2, 1, 1).unwrap();
    let late = LateReverbFilterCalculator::new(2, 0.01, FS, LATE_REVERB_SUBBANDS, max_updates, 5)
        .unwrap();

    let mut b = ComponentBuilder::new(ctx(), "reverb");
    b.parameter_input(
        "objects",
        ObjectVector::TYPE,
        ProtocolType::DoubleBuffering,
        ParameterConfig::Empty,
    )
    .unwrap();
    b.parameter_output(
        "filters",
        IndexedValue::<Vec<f32>>::TYPE,
        ProtocolType::MessageQueue,
        ParameterConfig::Empty,
    )
    .unwrap();
    b.parameter_output(
        "gains",
        VectorParameter::TYPE,
        ProtocolType::DoubleBuffering,
        ParameterConfig::Vector { size: 2 },
    )
    .unwrap();
    let mut top = b.into_composite();
    top.add_child(calc.component(ctx(), "calculator").unwrap()).unwrap();
    top.add_child(late.component(ctx(), "late").unwrap()).unwrap();
    top.parameter_connection("this", "objects", "calculator", "objectInput")
        .unwrap();
    top.parameter_connection("calculator", "lateSubbandOutput", "late", "subbandInput")
        .unwrap();
    top.parameter_connection("late", "lateFilterOutput", "this", "filters")
        .unwrap();
    top.parameter_connection("calculator", "discreteGainOutput", "this", "gains")
        .unwrap();
    AudioSignalFlow::new(top, &registry()).unwrap()
}

#[test]
fn scene_changes_produce_filters() {
    let mut flow = flow(0);
    assert_eq!(flow.schedule(), vec!["calculator", "late"]);
    let objects = flow.parameter_sender("objects").unwrap();
    let filters = flow.parameter_receiver("filters").unwrap();
    let gains = flow.parameter_receiver("gains").unwrap();

    let scene: ObjectVector = [reverb_object(3, 0.2)].into_iter().collect();
    objects.send(scene.clone()).unwrap();
    assert_eq!(flow.process(&[], &mut []), CallbackResult::Continue);

    // One filter for the occupied channel, one clear for the empty one.
    assert_eq!(filters.pending(), 2);
    let first: IndexedValue<Vec<f32>> = filters.receive().unwrap().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(first.value.len(), 480);
    assert!(first.value.iter().any(|&x| x != 0.0));
    let second: IndexedValue<Vec<f32>> = filters.receive().unwrap().unwrap();
    assert_eq!(second.index, 1);
    assert!(second.value.iter().all(|&x| x == 0.0));

    let g: VectorParameter = gains.receive().unwrap().unwrap();
    assert_eq!(g.0, vec![0.5, 0.0]);

    // Re-sending the same scene does not resynthesize.
    objects.send(scene).unwrap();
    assert_eq!(flow.process(&[], &mut []), CallbackResult::Continue);
    assert_eq!(filters.pending(), 0);

    let changed: ObjectVector = [reverb_object(3, 0.4)].into_iter().collect();
    objects.send(changed).unwrap();
    flow.process(&[], &mut []);
    assert_eq!(filters.pending(), 1);
}

#[test]
fn filter_updates_are_spread_over_blocks() {
    let mut flow = flow(1);
    let objects = flow.parameter_sender("objects").unwrap();
    let filters = flow.parameter_receiver("filters").unwrap();

    let scene: ObjectVector = [reverb_object(1, 0.2), reverb_object(2, 0.3)]
        .into_iter()
        .collect();
    objects.send(scene).unwrap();
    flow.process(&[], &mut []);
    assert_eq!(filters.pending(), 1);
    flow.process(&[], &mut []);
    assert_eq!(filters.pending(), 2);
    flow.process(&[], &mut []);
    assert_eq!(filters.pending(), 2);
}

#[test]
fn overfull_scene_keeps_the_objects_that_fit() {
    let mut flow = flow(0);
    let objects = flow.parameter_sender("objects").unwrap();
    let filters = flow.parameter_receiver("filters").unwrap();
    let gains = flow.parameter_receiver("gains").unwrap();
    let scene: ObjectVector = (1..=3).map(|id| reverb_object(id, 0.1)).collect();
    objects.send(scene).unwrap();

    assert_eq!(flow.process(&[], &mut []), CallbackResult::Continue);
    assert!(flow.take_last_error().is_none());
    let g: VectorParameter = gains.receive().unwrap().unwrap();
    assert_eq!(g.0, vec![0.5, 0.5]);
    assert_eq!(filters.pending(), 2);
}
