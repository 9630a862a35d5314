//! Error types for renderer construction.

use orbis_components::ComponentError;
use orbis_core::SignalFlowError;
use orbis_panning::PanningError;
use orbis_reverb::ReverbError;
use thiserror::Error;

/// Errors raised while assembling a renderer.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A child component could not be created.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// Declaring ports or connections failed.
    #[error(transparent)]
    SignalFlow(#[from] SignalFlowError),

    /// The reverb subgraph could not be set up.
    #[error("reverb renderer: {0}")]
    Reverb(#[from] ReverbError),

    /// Panning setup failed.
    #[error("panning setup: {0}")]
    Panning(#[from] PanningError),

    /// The loudspeaker array does not fit the output configuration.
    #[error("output configuration: {0}")]
    Outputs(String),

    /// A renderer option is out of range.
    #[error("invalid renderer option: {0}")]
    InvalidOption(String),
}

/// Convenience alias for renderer construction results.
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_errors_are_transparent() {
        let inner = ComponentError::InvalidArgument {
            component: "Add",
            message: "needs at least one input".to_owned(),
        };
        let expected = inner.to_string();
        assert_eq!(FlowError::from(inner).to_string(), expected);
    }

    #[test]
    fn output_errors_have_context() {
        let err = FlowError::Outputs("channel 9 exceeds 8 outputs".to_owned());
        assert_eq!(err.to_string(), "output configuration: channel 9 exceeds 8 outputs");
    }
}
