//! Loudspeaker array model.
//!
//! A [`LoudspeakerArray`] holds the loudspeakers (regular ones with an output
//! channel, then virtual ones without), the triplets or pairs that partition
//! the sphere or circle into panning regions, optional subwoofers, the
//! rerouting of virtual loudspeakers and per-output adjustments.
//!
//! Arrays are created through an [`ArrayBuilder`], which both file loaders
//! use. [`ArrayBuilder::build`] validates everything at once, so a failed
//! load never leaves a partially constructed array.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use nalgebra::Vector3;
use orbis_core::{BiquadCoefficients, Matrix};

use crate::error::{ArrayError, Result};

/// Vertex marker for the unused third vertex of a 2-D pair.
pub const UNUSED_VERTEX: usize = usize::MAX;

/// Converts a level in dB to a linear gain.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Converts spherical coordinates (degrees) to cartesian coordinates.
///
/// Azimuth is measured counterclockwise from the x axis, elevation upwards
/// from the horizontal plane.
pub fn spherical_to_cartesian(azimuth_deg: f32, elevation_deg: f32, radius: f32) -> Vector3<f32> {
    let (az, el) = (azimuth_deg.to_radians(), elevation_deg.to_radians());
    let xy = radius * el.cos();
    Vector3::new(xy * az.cos(), xy * az.sin(), radius * el.sin())
}

/// One loudspeaker, regular or virtual.
#[derive(Debug, Clone, PartialEq)]
pub struct Loudspeaker {
    id: usize,
    position: Vector3<f32>,
    channel: Option<usize>,
    gain: f32,
    delay: f32,
    eq: Option<String>,
}

impl Loudspeaker {
    /// One-based id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Position in metres (or direction in infinite mode).
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Zero-based output channel, `None` for virtual loudspeakers.
    pub fn channel(&self) -> Option<usize> {
        self.channel
    }

    /// True for virtual (phantom) loudspeakers.
    pub fn is_virtual(&self) -> bool {
        self.channel.is_none()
    }

    /// Linear gain adjustment.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Delay adjustment in seconds.
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Name of the output equalisation filter, if any.
    pub fn eq(&self) -> Option<&str> {
        self.eq.as_deref()
    }
}

/// Panning region: three loudspeaker indices, or two plus [`UNUSED_VERTEX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triplet(pub [usize; 3]);

impl Triplet {
    /// The used vertices (two in 2-D, three in 3-D).
    pub fn vertices(&self) -> &[usize] {
        if self.0[2] == UNUSED_VERTEX {
            &self.0[..2]
        } else {
            &self.0
        }
    }
}

/// Subwoofer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Subwoofer {
    channel: usize,
    gain: f32,
    delay: f32,
    eq: Option<String>,
}

impl Subwoofer {
    /// Zero-based output channel.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Linear gain adjustment.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Delay adjustment in seconds.
    pub fn delay(&self) -> f32 {
        self.delay
    }
}

/// Validated loudspeaker array.
#[derive(Debug, Clone, PartialEq)]
pub struct LoudspeakerArray {
    speakers: Vec<Loudspeaker>,
    regular: usize,
    triplets: Vec<Triplet>,
    is_2d: bool,
    is_infinite: bool,
    subwoofers: Vec<Subwoofer>,
    subwoofer_gains: Matrix,
    rerouting: Matrix,
    output_eq: Option<Vec<Vec<BiquadCoefficients>>>,
}

impl LoudspeakerArray {
    /// Starts building an array.
    pub fn builder() -> ArrayBuilder {
        ArrayBuilder::default()
    }

    /// Loads an array file; `.xml` files use the XML format, everything else
    /// the line-oriented text format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| ArrayError::read_file(path, e))?;
        let is_xml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xml"));
        let array = if is_xml {
            Self::from_xml_str(&source)?
        } else {
            Self::from_text_str(&source)?
        };
        tracing::info!(
            path = %path.display(),
            speakers = array.number_of_speakers(),
            regular = array.number_of_regular_speakers(),
            triplets = array.number_of_triplets(),
            subwoofers = array.number_of_subwoofers(),
            "loudspeaker array loaded"
        );
        Ok(array)
    }

    /// Total number of loudspeakers, virtual ones included.
    pub fn number_of_speakers(&self) -> usize {
        self.speakers.len()
    }

    /// Number of loudspeakers with an output channel.
    pub fn number_of_regular_speakers(&self) -> usize {
        self.regular
    }

    /// Number of virtual loudspeakers.
    pub fn number_of_virtual_speakers(&self) -> usize {
        self.speakers.len() - self.regular
    }

    /// Number of triplets (or pairs in 2-D).
    pub fn number_of_triplets(&self) -> usize {
        self.triplets.len()
    }

    /// Number of subwoofers.
    pub fn number_of_subwoofers(&self) -> usize {
        self.subwoofers.len()
    }

    /// Number of outputs: regular loudspeakers plus subwoofers.
    pub fn number_of_outputs(&self) -> usize {
        self.regular + self.subwoofers.len()
    }

    /// True for horizontal-only arrays.
    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    /// True if loudspeakers are treated as infinitely distant.
    pub fn is_infinite(&self) -> bool {
        self.is_infinite
    }

    /// All loudspeakers; index `i` has id `i + 1`.
    pub fn speakers(&self) -> &[Loudspeaker] {
        &self.speakers
    }

    /// Position of loudspeaker `index`.
    pub fn position(&self, index: usize) -> Option<Vector3<f32>> {
        self.speakers.get(index).map(Loudspeaker::position)
    }

    /// Output channel of loudspeaker `index` (`None` for virtual ones).
    pub fn channel_index(&self, index: usize) -> Option<usize> {
        self.speakers.get(index).and_then(Loudspeaker::channel)
    }

    /// Output channels of the regular loudspeakers in index order.
    pub fn regular_channels(&self) -> Vec<usize> {
        self.speakers[..self.regular]
            .iter()
            .filter_map(Loudspeaker::channel)
            .collect()
    }

    /// Zero-based index of the loudspeaker with the one-based `id`.
    pub fn speaker_index_from_id(&self, id: usize) -> Option<usize> {
        (1..=self.speakers.len()).contains(&id).then(|| id - 1)
    }

    /// All triplets.
    pub fn triplets(&self) -> &[Triplet] {
        &self.triplets
    }

    /// Triplet `index`.
    pub fn triplet(&self, index: usize) -> Option<&Triplet> {
        self.triplets.get(index)
    }

    /// Subwoofers.
    pub fn subwoofers(&self) -> &[Subwoofer] {
        &self.subwoofers
    }

    /// Output channels of the subwoofers.
    pub fn subwoofer_channels(&self) -> Vec<usize> {
        self.subwoofers.iter().map(Subwoofer::channel).collect()
    }

    /// Mixing weights, subwoofers x regular loudspeakers.
    pub fn subwoofer_gains(&self) -> &Matrix {
        &self.subwoofer_gains
    }

    /// Rerouting gains, virtual x regular loudspeakers.
    pub fn rerouting(&self) -> &Matrix {
        &self.rerouting
    }

    /// Linear gain adjustments of all outputs (regular, then subwoofers).
    pub fn gain_adjustment(&self) -> Vec<f32> {
        self.speakers[..self.regular]
            .iter()
            .map(Loudspeaker::gain)
            .chain(self.subwoofers.iter().map(Subwoofer::gain))
            .collect()
    }

    /// Delay adjustments in seconds of all outputs (regular, then subwoofers).
    pub fn delay_adjustment(&self) -> Vec<f32> {
        self.speakers[..self.regular]
            .iter()
            .map(Loudspeaker::delay)
            .chain(self.subwoofers.iter().map(Subwoofer::delay))
            .collect()
    }

    /// Output equalisation sections per output, if configured.
    pub fn output_eq(&self) -> Option<&[Vec<BiquadCoefficients>]> {
        self.output_eq.as_deref()
    }
}

#[derive(Debug, Clone)]
struct SpeakerEntry {
    id: usize,
    position: Vector3<f32>,
    channel: Option<usize>,
    gain: f32,
    delay: f32,
    eq: Option<String>,
}

#[derive(Debug, Clone)]
struct SubwooferEntry {
    channel: usize,
    speakers: Vec<usize>,
    weights: Vec<f32>,
    gain: f32,
    delay: f32,
    eq: Option<String>,
}

/// Collects array entries and validates them in [`build`](Self::build).
///
/// Loudspeaker ids, channels and triplet vertices are one-based here and
/// converted to zero-based indices by `build`.
#[derive(Debug, Clone, Default)]
pub struct ArrayBuilder {
    is_2d: bool,
    is_infinite: bool,
    speakers: Vec<SpeakerEntry>,
    triplets: Vec<Vec<usize>>,
    subwoofers: Vec<SubwooferEntry>,
    routes: Vec<(usize, usize, f32)>,
    eq_sections: usize,
    eq_filters: BTreeMap<String, Vec<BiquadCoefficients>>,
}

impl ArrayBuilder {
    /// Horizontal-only array.
    pub fn two_d(mut self, is_2d: bool) -> Self {
        self.is_2d = is_2d;
        self
    }

    /// Infinite-distance (plane wave) array.
    pub fn infinite(mut self, is_infinite: bool) -> Self {
        self.is_infinite = is_infinite;
        self
    }

    pub(crate) fn set_2d(&mut self, is_2d: bool) {
        self.is_2d = is_2d;
    }

    pub(crate) fn set_infinite(&mut self, is_infinite: bool) {
        self.is_infinite = is_infinite;
    }

    /// Adds a regular loudspeaker with a one-based output channel.
    pub fn speaker(mut self, id: usize, channel: usize, position: Vector3<f32>) -> Self {
        self.push_speaker(id, Some(channel), position);
        self
    }

    /// Adds a virtual loudspeaker.
    pub fn virtual_speaker(mut self, id: usize, position: Vector3<f32>) -> Self {
        self.push_speaker(id, None, position);
        self
    }

    /// Adds a triplet (three ids) or a 2-D pair (two ids).
    pub fn triplet(mut self, ids: &[usize]) -> Self {
        self.push_triplet(ids.to_vec());
        self
    }

    pub(crate) fn push_speaker(&mut self, id: usize, channel: Option<usize>, position: Vector3<f32>) {
        self.speakers.push(SpeakerEntry {
            id,
            position,
            channel,
            gain: 1.0,
            delay: 0.0,
            eq: None,
        });
    }

    /// Sets gain (linear), delay (seconds) and equalisation of the last speaker.
    pub(crate) fn adjust_last_speaker(&mut self, gain: f32, delay: f32, eq: Option<String>) {
        if let Some(s) = self.speakers.last_mut() {
            s.gain = gain;
            s.delay = delay;
            s.eq = eq;
        }
    }

    pub(crate) fn push_triplet(&mut self, ids: Vec<usize>) {
        self.triplets.push(ids);
    }

    /// Routes virtual loudspeaker `virtual_id` to regular loudspeaker `speaker_id`.
    pub fn route(mut self, virtual_id: usize, speaker_id: usize, gain: f32) -> Self {
        self.push_route(virtual_id, speaker_id, gain);
        self
    }

    pub(crate) fn push_route(&mut self, virtual_id: usize, speaker_id: usize, gain: f32) {
        self.routes.push((virtual_id, speaker_id, gain));
    }

    /// Adds a subwoofer on a one-based channel fed by the given loudspeaker ids.
    ///
    /// `weights` holds one weight per loudspeaker, or a single weight for all.
    pub fn subwoofer(mut self, channel: usize, speaker_ids: &[usize], weights: &[f32]) -> Self {
        self.push_subwoofer(channel, speaker_ids.to_vec(), weights.to_vec(), 1.0, 0.0, None);
        self
    }

    pub(crate) fn push_subwoofer(
        &mut self,
        channel: usize,
        speakers: Vec<usize>,
        weights: Vec<f32>,
        gain: f32,
        delay: f32,
        eq: Option<String>,
    ) {
        self.subwoofers.push(SubwooferEntry {
            channel,
            speakers,
            weights,
            gain,
            delay,
            eq,
        });
    }

    pub(crate) fn set_eq_sections(&mut self, sections: usize) {
        self.eq_sections = sections;
    }

    pub(crate) fn push_eq_filter(&mut self, name: String, sections: Vec<BiquadCoefficients>) {
        self.eq_filters.insert(name, sections);
    }

    pub(crate) fn has_eq_configuration(&self) -> bool {
        self.eq_sections > 0 || !self.eq_filters.is_empty()
    }

    /// Validates all entries and produces the array.
    pub fn build(self) -> Result<LoudspeakerArray> {
        let mut by_id: BTreeMap<usize, SpeakerEntry> = BTreeMap::new();
        for entry in self.speakers {
            if entry.id == 0 {
                return Err(ArrayError::ZeroId);
            }
            let id = entry.id;
            if by_id.insert(id, entry).is_some() {
                return Err(ArrayError::DuplicateId(id));
            }
        }
        if let Some(missing) = (1..=by_id.len()).find(|id| !by_id.contains_key(id)) {
            return Err(ArrayError::MissingId(missing));
        }
        let total = by_id.len();

        let regular = by_id.values().take_while(|s| s.channel.is_some()).count();
        if let Some(late) = by_id.values().skip(regular).find(|s| s.channel.is_some()) {
            let first_virtual = by_id.values().nth(regular).map_or(late.id, |s| s.id);
            return Err(ArrayError::VirtualBeforeRegular(first_virtual));
        }
        if regular == 0 {
            return Err(ArrayError::Empty);
        }

        let mut channels = BTreeSet::new();
        let speakers: Vec<Loudspeaker> = by_id
            .into_values()
            .map(|s| {
                let channel = match s.channel {
                    Some(0) => {
                        return Err(ArrayError::structure(
                            "loudspeaker",
                            format!("id {}: channels are one-based", s.id),
                        ));
                    }
                    Some(c) => {
                        if !channels.insert(c - 1) {
                            return Err(ArrayError::DuplicateChannel(c - 1));
                        }
                        Some(c - 1)
                    }
                    None => None,
                };
                Ok(Loudspeaker {
                    id: s.id,
                    position: s.position,
                    channel,
                    gain: s.gain,
                    delay: s.delay,
                    eq: s.eq,
                })
            })
            .collect::<Result<_>>()?;

        let triplets = self
            .triplets
            .iter()
            .enumerate()
            .map(|(index, ids)| validate_triplet(index, ids, self.is_2d, total))
            .collect::<Result<Vec<_>>>()?;

        let virtuals = total - regular;
        let mut rerouting = Matrix::new(virtuals, regular);
        for &(virtual_id, speaker_id, gain) in &self.routes {
            if !(regular + 1..=total).contains(&virtual_id) {
                return Err(ArrayError::structure(
                    "route",
                    format!("id {virtual_id} is not a virtual loudspeaker"),
                ));
            }
            if !(1..=regular).contains(&speaker_id) {
                return Err(ArrayError::structure(
                    "route",
                    format!("target id {speaker_id} is not a regular loudspeaker"),
                ));
            }
            rerouting.set(virtual_id - regular - 1, speaker_id - 1, gain);
        }

        let mut subwoofer_gains = Matrix::new(self.subwoofers.len(), regular);
        let mut subwoofers = Vec::with_capacity(self.subwoofers.len());
        for (row, sub) in self.subwoofers.into_iter().enumerate() {
            if sub.channel == 0 {
                return Err(ArrayError::structure("subwoofer", "channels are one-based"));
            }
            if !channels.insert(sub.channel - 1) {
                return Err(ArrayError::DuplicateChannel(sub.channel - 1));
            }
            if sub.weights.len() != 1 && sub.weights.len() != sub.speakers.len() {
                return Err(ArrayError::structure(
                    "subwoofer",
                    format!(
                        "{} weights for {} loudspeakers",
                        sub.weights.len(),
                        sub.speakers.len()
                    ),
                ));
            }
            for (i, &id) in sub.speakers.iter().enumerate() {
                if !(1..=regular).contains(&id) {
                    return Err(ArrayError::structure(
                        "subwoofer",
                        format!("assigned id {id} is not a regular loudspeaker"),
                    ));
                }
                let weight = sub.weights.get(i).or(sub.weights.first()).copied().unwrap_or(1.0);
                subwoofer_gains.set(row, id - 1, weight);
            }
            subwoofers.push(Subwoofer {
                channel: sub.channel - 1,
                gain: sub.gain,
                delay: sub.delay,
                eq: sub.eq,
            });
        }

        let has_eq = self.eq_sections > 0 || !self.eq_filters.is_empty();
        let output_eq = if has_eq {
            let sections = self.eq_sections;
            let lookup = |eq: Option<&String>| -> Result<Vec<BiquadCoefficients>> {
                let mut out = match eq {
                    Some(name) => self
                        .eq_filters
                        .get(name)
                        .cloned()
                        .ok_or_else(|| ArrayError::UnknownEq(name.clone()))?,
                    None => Vec::new(),
                };
                if out.len() > sections {
                    return Err(ArrayError::structure(
                        "filterSpec",
                        format!("{} sections exceed the configured {sections}", out.len()),
                    ));
                }
                out.resize(sections, BiquadCoefficients::identity());
                Ok(out)
            };
            let mut eqs = Vec::with_capacity(regular + subwoofers.len());
            for s in &speakers[..regular] {
                eqs.push(lookup(s.eq.as_ref())?);
            }
            for s in &subwoofers {
                eqs.push(lookup(s.eq.as_ref())?);
            }
            Some(eqs)
        } else {
            None
        };

        Ok(LoudspeakerArray {
            speakers,
            regular,
            triplets,
            is_2d: self.is_2d,
            is_infinite: self.is_infinite,
            subwoofers,
            subwoofer_gains,
            rerouting,
            output_eq,
        })
    }
}

fn validate_triplet(index: usize, ids: &[usize], is_2d: bool, total: usize) -> Result<Triplet> {
    let needed = if is_2d { 2 } else { 3 };
    if ids.len() < needed {
        return Err(ArrayError::InvalidTriplet {
            index,
            message: format!("expected {needed} vertices, found {}", ids.len()),
        });
    }
    let mut vertices = [UNUSED_VERTEX; 3];
    for (slot, &id) in vertices.iter_mut().zip(&ids[..needed]) {
        if !(1..=total).contains(&id) {
            return Err(ArrayError::InvalidTriplet {
                index,
                message: format!("loudspeaker id {id} does not exist"),
            });
        }
        *slot = id - 1;
    }
    let used = &vertices[..needed];
    if (1..used.len()).any(|i| used[..i].contains(&used[i])) {
        return Err(ArrayError::InvalidTriplet {
            index,
            message: "repeated vertex".to_owned(),
        });
    }
    Ok(Triplet(vertices))
}
