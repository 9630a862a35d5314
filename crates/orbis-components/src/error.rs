//! Error types for component construction.

use orbis_core::SignalFlowError;
use orbis_panning::PanningError;
use thiserror::Error;

/// Errors raised while creating components.
///
/// Per-block failures are reported as [`orbis_core::ProcessError`] instead.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Declaring ports failed.
    #[error(transparent)]
    SignalFlow(#[from] SignalFlowError),

    /// Panning setup failed.
    #[error("panning setup: {0}")]
    Panning(#[from] PanningError),

    /// A constructor argument is out of range.
    #[error("{component}: {message}")]
    InvalidArgument {
        /// Component kind.
        component: &'static str,
        /// What is wrong.
        message: String,
    },

    /// A filter does not fit into the filter matrix.
    #[error("filter {index} has {length} taps, the maximum is {max}")]
    FilterTooLong {
        /// Filter slot.
        index: usize,
        /// Taps of the filter.
        length: usize,
        /// Maximum length.
        max: usize,
    },

    /// The UDP socket could not be opened.
    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receive thread could not be started.
    #[error("failed to start receive thread: {0}")]
    Thread(#[source] std::io::Error),
}

impl ComponentError {
    pub(crate) fn invalid(component: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            component,
            message: message.into(),
        }
    }
}

/// Convenience alias for component construction results.
pub type Result<T> = std::result::Result<T, ComponentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_argument_names_the_component() {
        let err = ComponentError::invalid("DelayVector", "maximum delay must be positive");
        assert_eq!(err.to_string(), "DelayVector: maximum delay must be positive");
    }

    #[test]
    fn bind_error_keeps_source() {
        let err = ComponentError::Bind {
            port: 4242,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("4242"), "got: {msg}");
        assert!(err.source().is_some());
    }
}
