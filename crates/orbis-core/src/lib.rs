//! Orbis Core - component graph and block runtime for object-based rendering
//!
//! This crate provides the signal-flow machinery every orbis renderer is
//! built from: components with typed ports, composites that wire them
//! together, a flattening pass that resolves the hierarchy into a schedule,
//! and a runtime that executes that schedule once per audio block without
//! allocating.
//!
//! # Core Abstractions
//!
//! ## Components
//!
//! - [`ComponentBuilder`] - Declares ports, then becomes atomic or composite
//! - [`Component`] - Node of the hierarchy; composites hold children and connections
//! - [`AtomicProcessor`] - Block callback of an atomic component
//! - [`ChannelList`] - Channel selection for audio connections (`"0:4,7"`)
//!
//! ## Parameters
//!
//! - [`ParameterType`] / [`ProtocolType`] / [`ParameterConfig`] - What a parameter port carries and how
//! - [`ParameterRegistry`] - Known parameter types and their default factories
//! - [`Matrix`], [`VectorParameter`], [`BiquadMatrix`], ... - Core parameter types
//!
//! ## Execution
//!
//! - [`flatten`] - Resolves placeholder ports and computes the execution order
//! - [`AudioSignalFlow`] - Executable flow with the block entry point
//!   [`AudioSignalFlow::process`]
//!
//! # Example
//!
//! ```rust,ignore
//! use orbis_core::{AudioSignalFlow, CallbackResult, ParameterRegistry};
//!
//! let registry = ParameterRegistry::with_core_types();
//! let mut flow = AudioSignalFlow::new(renderer, &registry)?;
//!
//! let gains = flow.parameter_sender("gains").unwrap();
//! gains.send(VectorParameter(vec![0.5, 0.5]))?;
//!
//! // From the audio callback:
//! match flow.process(&capture, &mut playback) {
//!     CallbackResult::Continue => {}
//!     CallbackResult::Silenced => { /* component error, block is silent */ }
//!     CallbackResult::Abort => { /* buffer shape does not match the flow */ }
//! }
//! ```

pub mod biquad;
pub mod component;
pub mod context;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod parameter;
pub mod runtime;

pub use biquad::{Biquad, BiquadCoefficients, BiquadMatrix};
pub use component::{
    AtomicProcessor, AudioBlock, AudioInputs, AudioPort, AudioPortId, ChannelList, ChannelRange,
    Component, ComponentBuilder, ComponentKind, Composite, ParameterAccess, ParameterPort,
    ParameterPortId, ParseChannelListError, PortDirection, ProcessContext, THIS,
};
pub use context::SignalFlowContext;
pub use error::{ProcessError, Result, SignalFlowError};
pub use graph::{FlatGraph, ResolvedConnection, flatten};
pub use matrix::Matrix;
pub use parameter::{
    IndexedValue, ListenerPosition, Parameter, ParameterConfig, ParameterData, ParameterFactory,
    ParameterReceiver, ParameterRegistry, ParameterSender, ParameterType, ProtocolType,
    RegistryEntry, SignalRouting, StringParameter, VectorParameter,
};
pub use runtime::{AudioSignalFlow, CallbackResult};
