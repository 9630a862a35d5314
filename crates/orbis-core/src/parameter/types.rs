//! Parameter types shared by the component library.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use super::{Parameter, ParameterConfig, ParameterType};

/// Vector of `f32` values (gains, delays).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorParameter(pub Vec<f32>);

impl VectorParameter {
    /// Creates a zero-filled vector.
    pub fn zeros(size: usize) -> Self {
        Self(vec![0.0; size])
    }
}

impl Deref for VectorParameter {
    type Target = Vec<f32>;

    fn deref(&self) -> &Vec<f32> {
        &self.0
    }
}

impl DerefMut for VectorParameter {
    fn deref_mut(&mut self) -> &mut Vec<f32> {
        &mut self.0
    }
}

impl Parameter for VectorParameter {
    const TYPE: ParameterType = ParameterType::new("Vector");
}

pub(crate) fn create_vector(config: &ParameterConfig) -> VectorParameter {
    match *config {
        ParameterConfig::Vector { size } => VectorParameter::zeros(size),
        _ => VectorParameter::default(),
    }
}

/// Routing table from input signals to output signals.
///
/// Keyed by output index: every output is fed by at most one input, one
/// input may feed several outputs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalRouting {
    entries: BTreeMap<usize, usize>,
}

impl SignalRouting {
    /// Creates an empty routing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `input` to `output`, replacing any previous input of `output`.
    pub fn add_routing(&mut self, input: usize, output: usize) {
        self.entries.insert(output, input);
    }

    /// Removes the entry for `output`. Returns `true` if one existed.
    pub fn remove_entry(&mut self, output: usize) -> bool {
        self.entries.remove(&output).is_some()
    }

    /// Input feeding `output`.
    pub fn input_for(&self, output: usize) -> Option<usize> {
        self.entries.get(&output).copied()
    }

    /// First output fed by `input`.
    pub fn output_for(&self, input: usize) -> Option<usize> {
        self.entries
            .iter()
            .find_map(|(&out, &inp)| (inp == input).then_some(out))
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of routed outputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is routed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(input, output)` pairs ordered by output.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().map(|(&out, &inp)| (inp, out))
    }
}

impl Parameter for SignalRouting {
    const TYPE: ParameterType = ParameterType::new("SignalRouting");
}

/// A value addressed to one index (filter slot, channel).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexedValue<V> {
    /// Target index.
    pub index: usize,
    /// Payload.
    pub value: V,
}

impl<V> IndexedValue<V> {
    /// Creates an indexed value.
    pub fn new(index: usize, value: V) -> Self {
        Self { index, value }
    }
}

impl Parameter for IndexedValue<Vec<f32>> {
    const TYPE: ParameterType = ParameterType::new("IndexedVector");
}

/// Listener position and orientation for tracked reproduction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ListenerPosition {
    /// Position x (m).
    pub x: f32,
    /// Position y (m).
    pub y: f32,
    /// Position z (m).
    pub z: f32,
    /// Yaw (radians).
    pub yaw: f32,
    /// Pitch (radians).
    pub pitch: f32,
    /// Roll (radians).
    pub roll: f32,
}

impl ListenerPosition {
    /// Position without orientation.
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }
}

impl Parameter for ListenerPosition {
    const TYPE: ParameterType = ParameterType::new("ListenerPosition");
}

/// Text message (network datagrams, scene descriptions).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringParameter(pub String);

impl StringParameter {
    /// Creates a string parameter.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Parameter for StringParameter {
    const TYPE: ParameterType = ParameterType::new("String");
}
