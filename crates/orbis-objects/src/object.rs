//! Audio object model.
//!
//! An [`AudioObject`] carries the fields every object has (id, group, level,
//! priority, input channels, optional EQ) and an [`ObjectKind`] with the
//! type-specific description of the source.

use std::fmt;
use std::str::FromStr;

use orbis_core::BiquadCoefficients;

/// Object identifier, unique within an object vector.
pub type ObjectId = u32;

/// Group identifier.
pub type GroupId = u32;

/// Number of late reverberation subbands (octave bands 62.5 Hz to 16 kHz).
pub const LATE_REVERB_SUBBANDS: usize = 9;

/// Cartesian position in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Front.
    pub x: f32,
    /// Left.
    pub y: f32,
    /// Up.
    pub z: f32,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Converts azimuth/elevation (degrees) and radius to a position.
    pub fn from_spherical(azimuth_deg: f32, elevation_deg: f32, radius: f32) -> Self {
        let (az, el) = (azimuth_deg.to_radians(), elevation_deg.to_radians());
        let xy = radius * el.cos();
        Self::new(xy * az.cos(), xy * az.sin(), radius * el.sin())
    }

    /// Euclidean length.
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Type tag of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    /// Point source at a finite distance.
    PointSource,
    /// Plane wave from a direction.
    PlaneWave,
    /// Fully diffuse source.
    DiffuseSource,
    /// Point source with a diffuse part.
    PointSourceWithDiffuseness,
    /// Point source with discrete reflections and late reverberation.
    PointSourceWithReverb,
    /// Object routed directly to output channels.
    ChannelObject,
}

impl ObjectType {
    /// All types in tag order.
    pub const ALL: [ObjectType; 6] = [
        ObjectType::PointSource,
        ObjectType::PlaneWave,
        ObjectType::DiffuseSource,
        ObjectType::PointSourceWithDiffuseness,
        ObjectType::PointSourceWithReverb,
        ObjectType::ChannelObject,
    ];

    /// Tag used in scene messages.
    pub fn tag(self) -> &'static str {
        match self {
            ObjectType::PointSource => "point",
            ObjectType::PlaneWave => "plane",
            ObjectType::DiffuseSource => "diffuse",
            ObjectType::PointSourceWithDiffuseness => "pointdiffuse",
            ObjectType::PointSourceWithReverb => "pointreverb",
            ObjectType::ChannelObject => "channel",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| s.to_owned())
    }
}

/// One discrete (early) reflection of a reverb object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscreteReflection {
    /// Position of the image source.
    pub position: Position,
    /// Delay relative to the direct path in seconds.
    pub delay: f32,
    /// Linear level.
    pub level: f32,
    /// Wall absorption filter.
    pub filter: Vec<BiquadCoefficients>,
}

/// Late reverberation description in [`LATE_REVERB_SUBBANDS`] bands.
#[derive(Debug, Clone, PartialEq)]
pub struct LateReverb {
    /// Onset delay in seconds.
    pub onset_delay: f32,
    /// Linear level per subband.
    pub levels: [f32; LATE_REVERB_SUBBANDS],
    /// Exponential decay coefficient per subband (1/s, negative).
    pub decay_coeffs: [f32; LATE_REVERB_SUBBANDS],
    /// Attack time per subband in seconds.
    pub attack_times: [f32; LATE_REVERB_SUBBANDS],
}

impl Default for LateReverb {
    fn default() -> Self {
        Self {
            onset_delay: 0.0,
            levels: [0.0; LATE_REVERB_SUBBANDS],
            decay_coeffs: [0.0; LATE_REVERB_SUBBANDS],
            attack_times: [0.0; LATE_REVERB_SUBBANDS],
        }
    }
}

impl LateReverb {
    /// True if every field differs by at most `limit`.
    pub fn approx_eq(&self, other: &Self, limit: f32) -> bool {
        let max_diff = |a: &[f32], b: &[f32]| {
            a.iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0f32, f32::max)
        };
        (self.onset_delay - other.onset_delay).abs() <= limit
            && max_diff(&self.levels, &other.levels) <= limit
            && max_diff(&self.decay_coeffs, &other.decay_coeffs) <= limit
            && max_diff(&self.attack_times, &other.attack_times) <= limit
    }
}

/// Type-specific part of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// Point source.
    PointSource {
        /// Source position.
        position: Position,
    },
    /// Plane wave.
    PlaneWave {
        /// Azimuth in degrees.
        azimuth: f32,
        /// Elevation in degrees.
        elevation: f32,
        /// Reference distance in metres.
        reference_distance: f32,
    },
    /// Diffuse source.
    DiffuseSource,
    /// Point source with a diffuse part.
    PointSourceWithDiffuseness {
        /// Source position.
        position: Position,
        /// Diffuse fraction in `[0, 1]`.
        diffuseness: f32,
    },
    /// Point source with room description.
    PointSourceWithReverb {
        /// Source position.
        position: Position,
        /// Early reflections.
        reflections: Vec<DiscreteReflection>,
        /// Late reverberation.
        late: LateReverb,
    },
    /// Channel-based object.
    ChannelObject {
        /// Output channel for each object channel.
        output_channels: Vec<usize>,
    },
}

impl ObjectKind {
    /// Default description of a type, used when an object is first created.
    pub fn default_for(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::PointSource => ObjectKind::PointSource {
                position: Position::default(),
            },
            ObjectType::PlaneWave => ObjectKind::PlaneWave {
                azimuth: 0.0,
                elevation: 0.0,
                reference_distance: 1.0,
            },
            ObjectType::DiffuseSource => ObjectKind::DiffuseSource,
            ObjectType::PointSourceWithDiffuseness => ObjectKind::PointSourceWithDiffuseness {
                position: Position::default(),
                diffuseness: 0.0,
            },
            ObjectType::PointSourceWithReverb => ObjectKind::PointSourceWithReverb {
                position: Position::default(),
                reflections: Vec::new(),
                late: LateReverb::default(),
            },
            ObjectType::ChannelObject => ObjectKind::ChannelObject {
                output_channels: Vec::new(),
            },
        }
    }

    /// Type tag of this description.
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::PointSource { .. } => ObjectType::PointSource,
            ObjectKind::PlaneWave { .. } => ObjectType::PlaneWave,
            ObjectKind::DiffuseSource => ObjectType::DiffuseSource,
            ObjectKind::PointSourceWithDiffuseness { .. } => ObjectType::PointSourceWithDiffuseness,
            ObjectKind::PointSourceWithReverb { .. } => ObjectType::PointSourceWithReverb,
            ObjectKind::ChannelObject { .. } => ObjectType::ChannelObject,
        }
    }
}

/// One audio object.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioObject {
    /// Identifier.
    pub id: ObjectId,
    /// Group identifier.
    pub group: GroupId,
    /// Linear level.
    pub level: f32,
    /// Rendering priority, higher is more important.
    pub priority: u8,
    /// Renderer input channels carrying the object signal.
    pub channels: Vec<usize>,
    /// Object equalisation.
    pub eq: Vec<BiquadCoefficients>,
    /// Type-specific description.
    pub kind: ObjectKind,
}

impl AudioObject {
    /// Creates an object with unit level on no channels.
    pub fn new(id: ObjectId, kind: ObjectKind) -> Self {
        Self {
            id,
            group: 0,
            level: 1.0,
            priority: 0,
            channels: Vec::new(),
            eq: Vec::new(),
            kind,
        }
    }

    /// Point source on one input channel.
    pub fn point(id: ObjectId, channel: usize, position: Position) -> Self {
        Self::new(id, ObjectKind::PointSource { position }).with_channels(vec![channel])
    }

    /// Plane wave on one input channel.
    pub fn plane_wave(id: ObjectId, channel: usize, azimuth: f32, elevation: f32) -> Self {
        Self::new(
            id,
            ObjectKind::PlaneWave {
                azimuth,
                elevation,
                reference_distance: 1.0,
            },
        )
        .with_channels(vec![channel])
    }

    /// Sets the input channels.
    pub fn with_channels(mut self, channels: Vec<usize>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the level.
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    /// Type tag.
    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// Number of input channels.
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// First input channel, for single-channel objects.
    pub fn channel_index(&self) -> Option<usize> {
        self.channels.first().copied()
    }

    /// Position for point-like objects, unit direction for plane waves.
    pub fn position(&self) -> Option<Position> {
        match &self.kind {
            ObjectKind::PointSource { position }
            | ObjectKind::PointSourceWithDiffuseness { position, .. }
            | ObjectKind::PointSourceWithReverb { position, .. } => Some(*position),
            ObjectKind::PlaneWave {
                azimuth, elevation, ..
            } => Some(Position::from_spherical(*azimuth, *elevation, 1.0)),
            ObjectKind::DiffuseSource | ObjectKind::ChannelObject { .. } => None,
        }
    }

    /// Diffuse fraction: 1 for diffuse sources, the configured value for
    /// point sources with diffuseness, 0 otherwise.
    pub fn diffuseness(&self) -> f32 {
        match self.kind {
            ObjectKind::DiffuseSource => 1.0,
            ObjectKind::PointSourceWithDiffuseness { diffuseness, .. } => diffuseness,
            _ => 0.0,
        }
    }
}
