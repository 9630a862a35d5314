//! Error types for scene decoding.

use thiserror::Error;

use crate::object::ObjectId;

/// Errors raised while decoding or encoding scene messages.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The message is not valid JSON.
    #[error("invalid scene message: {0}")]
    Json(#[from] serde_json::Error),

    /// The message has no `objects` array.
    #[error("scene message has no \"objects\" array")]
    MissingObjects,

    /// An entry has no numeric `id` (or no `type`).
    #[error("object entry {index}: {message}")]
    MalformedEntry {
        /// Position of the entry in the `objects` array.
        index: usize,
        /// What is wrong with the entry.
        message: String,
    },

    /// An object has an unknown `type` tag.
    #[error("object {id}: unknown object type \"{type_name}\"")]
    UnknownType {
        /// Object id.
        id: ObjectId,
        /// The unrecognised tag.
        type_name: String,
    },

    /// A new object lacks a field required for its type.
    #[error("object {id}: missing field \"{field}\"")]
    MissingField {
        /// Object id.
        id: ObjectId,
        /// Name of the missing field.
        field: &'static str,
    },

    /// An object field has an invalid value.
    #[error("object {id}: {message}")]
    InvalidObject {
        /// Object id.
        id: ObjectId,
        /// What is wrong with the object.
        message: String,
    },
}

impl SceneError {
    /// Object id the error refers to, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            SceneError::UnknownType { id, .. }
            | SceneError::MissingField { id, .. }
            | SceneError::InvalidObject { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn invalid(id: ObjectId, message: impl Into<String>) -> Self {
        SceneError::InvalidObject {
            id,
            message: message.into(),
        }
    }
}

/// Convenience alias for scene codec results.
pub type Result<T> = std::result::Result<T, SceneError>;
