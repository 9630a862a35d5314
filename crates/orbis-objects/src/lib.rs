//! Orbis Objects - audio object model and scene messages
//!
//! - [`AudioObject`] / [`ObjectKind`] - One sound source: common fields plus
//!   a closed set of source types
//! - [`ObjectVector`] - The scene, keyed by object id; also a parameter type
//!   carried between renderer components
//! - [`update_object_vector`] / [`encode_object_vector`] - JSON scene codec
//!
//! Call [`register_parameters`] on the `ParameterRegistry` used to build a
//! signal flow that passes object vectors between components.

pub mod codec;
pub mod error;
pub mod object;
pub mod vector;

pub use codec::{SceneUpdate, encode_object_vector, fill_object_vector, update_object_vector};
pub use error::{Result, SceneError};
pub use object::{
    AudioObject, DiscreteReflection, GroupId, LATE_REVERB_SUBBANDS, LateReverb, ObjectId,
    ObjectKind, ObjectType, Position,
};
pub use vector::{ObjectVector, register_parameters};
