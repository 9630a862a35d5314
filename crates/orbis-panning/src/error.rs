//! Error types for loudspeaker arrays and panning.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a loudspeaker array.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// Failed to read an array file.
    #[error("failed to read array file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed line in the text format.
    #[error("line {line}: {message}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        message: String,
    },

    /// The XML document is not well formed.
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The XML document is well formed but has the wrong structure.
    #[error("element <{element}>: {message}")]
    Structure {
        /// Element name.
        element: String,
        /// What is wrong with the element.
        message: String,
    },

    /// Two loudspeakers share an id.
    #[error("loudspeaker id {0} is used more than once")]
    DuplicateId(usize),

    /// Loudspeaker ids do not form the sequence `1..=n`.
    #[error("loudspeaker ids are not contiguous: id {0} is missing")]
    MissingId(usize),

    /// A loudspeaker id of zero.
    #[error("loudspeaker ids are one-based, found id 0")]
    ZeroId,

    /// Two outputs share a channel.
    #[error("output channel {0} is assigned more than once")]
    DuplicateChannel(usize),

    /// A virtual loudspeaker precedes a regular one.
    #[error("virtual loudspeaker {0} must have a higher id than every regular loudspeaker")]
    VirtualBeforeRegular(usize),

    /// A triplet references a missing loudspeaker or repeats a vertex.
    #[error("triplet {index}: {message}")]
    InvalidTriplet {
        /// Zero-based triplet index.
        index: usize,
        /// What is wrong with the triplet.
        message: String,
    },

    /// An `eq` attribute names an unknown filter specification.
    #[error("unknown output equalisation filter \"{0}\"")]
    UnknownEq(String),

    /// The array contains no regular loudspeakers.
    #[error("the array contains no regular loudspeakers")]
    Empty,
}

impl ArrayError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArrayError::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        ArrayError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn structure(element: &str, message: impl Into<String>) -> Self {
        ArrayError::Structure {
            element: element.to_owned(),
            message: message.into(),
        }
    }
}

/// Errors raised while setting up panning or decoding.
#[derive(Debug, Error)]
pub enum PanningError {
    /// A triplet's loudspeaker vectors are linearly dependent.
    #[error("triplet {index} is singular (loudspeakers {vertices:?} are collinear or coplanar with the listener)")]
    SingularTriplet {
        /// Zero-based triplet index.
        index: usize,
        /// Zero-based loudspeaker indices of the triplet.
        vertices: Vec<usize>,
    },

    /// A matrix or buffer has the wrong size.
    #[error("{what}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which quantity has the wrong size.
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        found: usize,
    },

    /// Failed to read a decode gain file.
    #[error("failed to read decode gains '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A decode gain entry is not a number.
    #[error("invalid decode gain \"{0}\"")]
    InvalidNumber(String),
}

/// Convenience alias for array loading results.
pub type Result<T> = std::result::Result<T, ArrayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn read_file_exposes_source() {
        let err = ArrayError::read_file(
            "/arrays/cube.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "mock"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/arrays/cube.xml"), "got: {msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn syntax_display() {
        let err = ArrayError::syntax(4, "expected 5 fields");
        assert_eq!(err.to_string(), "line 4: expected 5 fields");
    }

    #[test]
    fn singular_triplet_display() {
        let err = PanningError::SingularTriplet {
            index: 2,
            vertices: vec![0, 1, 4],
        };
        let msg = err.to_string();
        assert!(msg.contains("triplet 2"), "got: {msg}");
        assert!(msg.contains("[0, 1, 4]"), "got: {msg}");
    }
}
