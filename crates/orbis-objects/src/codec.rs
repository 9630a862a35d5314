//! JSON scene messages.
//!
//! ```json
//! {"objects": [
//!   {"type": "point", "id": 1, "channels": 0, "level": 0.5,
//!    "position": {"x": 1.0, "y": 2.0, "z": 0.0}},
//!   {"type": "plane", "id": 2, "channels": [1], "direction": {"az": 30, "el": 0}},
//!   {"type": "pointdiffuse", "id": 3, "channels": 2,
//!    "position": {"x": 0, "y": 1, "z": 0}, "diffuseness": 0.4},
//!   {"type": "pointreverb", "id": 4, "channels": 3, "position": {"x": 1, "y": 0, "z": 0},
//!    "room": {"ereflect": [{"position": {"x": -1, "y": 0, "z": 0}, "delay": 0.01,
//!                           "level": 0.3, "biquadsos": [{"b0": 1.0}]}],
//!             "lreverb": {"onsetdelay": 0.05, "level": [..9], "decayconst": [..9],
//!                         "attacktime": [..9]}}},
//!   {"type": "channel", "id": 5, "channels": [4, 5], "outputChannels": [0, 1]}
//! ]}
//! ```
//!
//! An entry whose id and type match an existing object updates that object:
//! absent fields keep their current values. Any other entry creates a new
//! object (replacing one with the same id but a different type), for which
//! `channels` and the type-specific fields are required.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use orbis_core::BiquadCoefficients;

use crate::error::{Result, SceneError};
use crate::object::{
    AudioObject, DiscreteReflection, GroupId, LATE_REVERB_SUBBANDS, LateReverb, ObjectId,
    ObjectKind, ObjectType, Position,
};
use crate::vector::ObjectVector;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WirePosition {
    x: f32,
    y: f32,
    z: f32,
}

impl From<WirePosition> for Position {
    fn from(p: WirePosition) -> Self {
        Position::new(p.x, p.y, p.z)
    }
}

impl From<Position> for WirePosition {
    fn from(p: Position) -> Self {
        WirePosition {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WireDirection {
    az: f32,
    el: f32,
    #[serde(default, rename = "refdist", skip_serializing_if = "Option::is_none")]
    reference_distance: Option<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WireBiquad {
    b0: f32,
    #[serde(default)]
    b1: f32,
    #[serde(default)]
    b2: f32,
    #[serde(default)]
    a1: f32,
    #[serde(default)]
    a2: f32,
}

impl From<WireBiquad> for BiquadCoefficients {
    fn from(b: WireBiquad) -> Self {
        BiquadCoefficients::new(b.b0, b.b1, b.b2, b.a1, b.a2)
    }
}

impl From<&BiquadCoefficients> for WireBiquad {
    fn from(c: &BiquadCoefficients) -> Self {
        WireBiquad {
            b0: c.b0,
            b1: c.b1,
            b2: c.b2,
            a1: c.a1,
            a2: c.a2,
        }
    }
}

/// A single index or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Channels {
    Single(usize),
    List(Vec<usize>),
}

impl Channels {
    fn into_vec(self) -> Vec<usize> {
        match self {
            Channels::Single(c) => vec![c],
            Channels::List(v) => v,
        }
    }

    fn from_slice(channels: &[usize]) -> Self {
        match channels {
            [single] => Channels::Single(*single),
            many => Channels::List(many.to_vec()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireReflection {
    position: WirePosition,
    #[serde(default)]
    delay: f32,
    #[serde(default)]
    level: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    biquadsos: Vec<WireBiquad>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireLateReverb {
    #[serde(default)]
    onsetdelay: f32,
    level: Vec<f32>,
    decayconst: Vec<f32>,
    attacktime: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRoom {
    #[serde(default)]
    ereflect: Vec<WireReflection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lreverb: Option<WireLateReverb>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireObject {
    #[serde(rename = "type")]
    type_name: String,
    id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channels: Option<Channels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    eq: Option<Vec<WireBiquad>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<WirePosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    direction: Option<WireDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    diffuseness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room: Option<WireRoom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_channels: Option<Channels>,
}

/// Outcome of applying one scene message.
#[derive(Debug, Default)]
pub struct SceneUpdate {
    /// Number of objects created or updated.
    pub applied: usize,
    /// Entries that were skipped, with the reason.
    pub rejected: Vec<SceneError>,
}

fn subbands(id: ObjectId, name: &str, values: Vec<f32>) -> Result<[f32; LATE_REVERB_SUBBANDS]> {
    let found = values.len();
    values.try_into().map_err(|_| {
        SceneError::invalid(
            id,
            format!("late reverb \"{name}\" needs {LATE_REVERB_SUBBANDS} subbands, found {found}"),
        )
    })
}

fn late_reverb(id: ObjectId, wire: WireLateReverb) -> Result<LateReverb> {
    Ok(LateReverb {
        onset_delay: wire.onsetdelay,
        levels: subbands(id, "level", wire.level)?,
        decay_coeffs: subbands(id, "decayconst", wire.decayconst)?,
        attack_times: subbands(id, "attacktime", wire.attacktime)?,
    })
}

fn required<T>(id: ObjectId, field: &'static str, value: Option<T>) -> Result<T> {
    value.ok_or(SceneError::MissingField { id, field })
}

/// Applies one wire entry on top of `base` (a clone of the existing object
/// of the same type, or `None` for a new object).
fn apply(wire: WireObject, object_type: ObjectType, base: Option<AudioObject>) -> Result<AudioObject> {
    let id = wire.id;
    let is_new = base.is_none();
    let mut object =
        base.unwrap_or_else(|| AudioObject::new(id, ObjectKind::default_for(object_type)));

    match wire.channels {
        Some(c) => object.channels = c.into_vec(),
        None if is_new => return Err(SceneError::MissingField { id, field: "channels" }),
        None => {}
    }
    if let Some(group) = wire.group {
        object.group = group;
    }
    if let Some(level) = wire.level {
        if !level.is_finite() || level < 0.0 {
            return Err(SceneError::invalid(id, format!("invalid level {level}")));
        }
        object.level = level;
    }
    if let Some(priority) = wire.priority {
        object.priority = priority;
    }
    if let Some(eq) = wire.eq {
        object.eq = eq.into_iter().map(Into::into).collect();
    }

    let position = wire.position.map(Position::from);
    let need = |field, value| if is_new { required(id, field, value).map(Some) } else { Ok(value) };

    match &mut object.kind {
        ObjectKind::PointSource { position: p } => {
            if let Some(new) = need("position", position)? {
                *p = new;
            }
        }
        ObjectKind::PlaneWave {
            azimuth,
            elevation,
            reference_distance,
        } => {
            let direction = if is_new {
                Some(required(id, "direction", wire.direction)?)
            } else {
                wire.direction
            };
            if let Some(d) = direction {
                *azimuth = d.az;
                *elevation = d.el;
                if let Some(r) = d.reference_distance {
                    *reference_distance = r;
                }
            }
        }
        ObjectKind::DiffuseSource => {}
        ObjectKind::PointSourceWithDiffuseness {
            position: p,
            diffuseness,
        } => {
            if let Some(new) = need("position", position)? {
                *p = new;
            }
            let value = if is_new {
                Some(required(id, "diffuseness", wire.diffuseness)?)
            } else {
                wire.diffuseness
            };
            if let Some(d) = value {
                if !(0.0..=1.0).contains(&d) {
                    return Err(SceneError::invalid(
                        id,
                        format!("diffuseness {d} outside [0, 1]"),
                    ));
                }
                *diffuseness = d;
            }
        }
        ObjectKind::PointSourceWithReverb {
            position: p,
            reflections,
            late,
        } => {
            if let Some(new) = need("position", position)? {
                *p = new;
            }
            let room = if is_new {
                Some(required(id, "room", wire.room)?)
            } else {
                wire.room
            };
            if let Some(room) = room {
                *reflections = room
                    .ereflect
                    .into_iter()
                    .map(|r| DiscreteReflection {
                        position: r.position.into(),
                        delay: r.delay,
                        level: r.level,
                        filter: r.biquadsos.into_iter().map(Into::into).collect(),
                    })
                    .collect();
                if let Some(l) = room.lreverb {
                    *late = late_reverb(id, l)?;
                }
            }
        }
        ObjectKind::ChannelObject { output_channels } => {
            let outputs = if is_new {
                Some(required(id, "outputChannels", wire.output_channels)?)
            } else {
                wire.output_channels
            };
            if let Some(o) = outputs {
                *output_channels = o.into_vec();
            }
        }
    }

    if let ObjectKind::ChannelObject { output_channels } = &object.kind {
        if output_channels.len() != object.channels.len() {
            return Err(SceneError::invalid(
                id,
                format!(
                    "{} output channels for {} object channels",
                    output_channels.len(),
                    object.channels.len()
                ),
            ));
        }
    }
    Ok(object)
}

fn decode_entry(index: usize, entry: Value, objects: &ObjectVector) -> Result<AudioObject> {
    let id = entry
        .get("id")
        .and_then(Value::as_u64)
        .and_then(|id| ObjectId::try_from(id).ok());
    let wire: WireObject = serde_json::from_value(entry).map_err(|e| match id {
        Some(id) => SceneError::invalid(id, e.to_string()),
        None => SceneError::MalformedEntry {
            index,
            message: e.to_string(),
        },
    })?;
    let object_type: ObjectType = wire.type_name.parse().map_err(|type_name| {
        SceneError::UnknownType {
            id: wire.id,
            type_name,
        }
    })?;
    let base = objects
        .get(wire.id)
        .filter(|existing| existing.object_type() == object_type)
        .cloned();
    apply(wire, object_type, base)
}

/// Merges a scene message into `objects`.
///
/// A message that is not valid JSON or has no `objects` array is rejected
/// as a whole and leaves `objects` unchanged. Malformed entries are skipped,
/// logged and reported in [`SceneUpdate::rejected`]; the remaining entries
/// are still applied.
pub fn update_object_vector(message: &str, objects: &mut ObjectVector) -> Result<SceneUpdate> {
    let mut root: Value = serde_json::from_str(message)?;
    let entries = match root.get_mut("objects").map(Value::take) {
        Some(Value::Array(entries)) => entries,
        _ => return Err(SceneError::MissingObjects),
    };

    let mut update = SceneUpdate::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(index, entry, objects) {
            Ok(object) => {
                objects.insert(object);
                update.applied += 1;
            }
            Err(e) => {
                tracing::warn!(object = ?e.object_id(), entry = index, "skipping scene object: {e}");
                update.rejected.push(e);
            }
        }
    }
    Ok(update)
}

/// Replaces the contents of `objects` with the objects of a message.
///
/// On a message-level error `objects` is left unchanged.
pub fn fill_object_vector(message: &str, objects: &mut ObjectVector) -> Result<SceneUpdate> {
    let mut fresh = ObjectVector::new();
    let update = update_object_vector(message, &mut fresh)?;
    objects.swap(&mut fresh);
    Ok(update)
}

fn encode_object(object: &AudioObject) -> WireObject {
    let mut wire = WireObject {
        type_name: object.object_type().tag().to_owned(),
        id: object.id,
        group: Some(object.group),
        channels: Some(Channels::from_slice(&object.channels)),
        level: Some(object.level),
        priority: Some(object.priority),
        eq: (!object.eq.is_empty()).then(|| object.eq.iter().map(WireBiquad::from).collect()),
        position: None,
        direction: None,
        diffuseness: None,
        room: None,
        output_channels: None,
    };
    match &object.kind {
        ObjectKind::PointSource { position } => wire.position = Some((*position).into()),
        ObjectKind::PlaneWave {
            azimuth,
            elevation,
            reference_distance,
        } => {
            wire.direction = Some(WireDirection {
                az: *azimuth,
                el: *elevation,
                reference_distance: Some(*reference_distance),
            });
        }
        ObjectKind::DiffuseSource => {}
        ObjectKind::PointSourceWithDiffuseness {
            position,
            diffuseness,
        } => {
            wire.position = Some((*position).into());
            wire.diffuseness = Some(*diffuseness);
        }
        ObjectKind::PointSourceWithReverb {
            position,
            reflections,
            late,
        } => {
            wire.position = Some((*position).into());
            wire.room = Some(WireRoom {
                ereflect: reflections
                    .iter()
                    .map(|r| WireReflection {
                        position: r.position.into(),
                        delay: r.delay,
                        level: r.level,
                        biquadsos: r.filter.iter().map(WireBiquad::from).collect(),
                    })
                    .collect(),
                lreverb: Some(WireLateReverb {
                    onsetdelay: late.onset_delay,
                    level: late.levels.to_vec(),
                    decayconst: late.decay_coeffs.to_vec(),
                    attacktime: late.attack_times.to_vec(),
                }),
            });
        }
        ObjectKind::ChannelObject { output_channels } => {
            wire.output_channels = Some(Channels::List(output_channels.clone()));
        }
    }
    wire
}

#[derive(Serialize)]
struct WireScene {
    objects: Vec<WireObject>,
}

/// Encodes an object vector as a scene message.
pub fn encode_object_vector(objects: &ObjectVector) -> Result<String> {
    let scene = WireScene {
        objects: objects.iter().map(encode_object).collect(),
    };
    Ok(serde_json::to_string(&scene)?)
}
