//! Registry of parameter types and their default-value factories.
//!
//! The registry is an ordinary value built once at start-up and handed to
//! [`AudioSignalFlow::new`](crate::AudioSignalFlow::new). Crates that define
//! their own parameter types expose a `register_parameters` function that
//! adds them:
//!
//! ```rust,ignore
//! let mut registry = ParameterRegistry::with_core_types();
//! orbis_objects::register_parameters(&mut registry);
//! let flow = AudioSignalFlow::new(renderer, &registry)?;
//! ```

use super::types::{
    IndexedValue, ListenerPosition, SignalRouting, StringParameter, create_vector,
};
use super::{Parameter, ParameterConfig, ParameterData, ParameterType};
use crate::biquad::{BiquadMatrix, create_biquad_matrix};
use crate::matrix::{Matrix, create_matrix};

/// Factory producing the default value of a parameter type for a configuration.
pub type ParameterFactory = fn(&ParameterConfig) -> Box<dyn ParameterData>;

/// One registered parameter type.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    /// Type tag.
    pub parameter_type: ParameterType,
    /// One-line description.
    pub description: &'static str,
    factory: ParameterFactory,
}

/// Table of known parameter types.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    entries: Vec<RegistryEntry>,
}

impl ParameterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the parameter types defined in this crate.
    pub fn with_core_types() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(16),
        };
        registry.register(Matrix::TYPE, "dense gain matrix", |c| {
            Box::new(create_matrix(c))
        });
        registry.register(
            super::VectorParameter::TYPE,
            "vector of gains or delays",
            |c| Box::new(create_vector(c)),
        );
        registry.register(BiquadMatrix::TYPE, "biquad coefficient matrix", |c| {
            Box::new(create_biquad_matrix(c))
        });
        registry.register(SignalRouting::TYPE, "input to output routing table", |_| {
            Box::new(SignalRouting::new())
        });
        registry.register(
            IndexedValue::<Vec<f32>>::TYPE,
            "vector addressed to an index",
            |_| Box::new(IndexedValue::<Vec<f32>>::default()),
        );
        registry.register(ListenerPosition::TYPE, "tracked listener position", |_| {
            Box::new(ListenerPosition::default())
        });
        registry.register(StringParameter::TYPE, "text message", |_| {
            Box::new(StringParameter::default())
        });
        registry
    }

    /// Registers a type. An existing entry with the same tag is replaced.
    pub fn register(
        &mut self,
        parameter_type: ParameterType,
        description: &'static str,
        factory: ParameterFactory,
    ) {
        let entry = RegistryEntry {
            parameter_type,
            description,
            factory,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.parameter_type == parameter_type)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// True if the type is registered.
    pub fn contains(&self, parameter_type: ParameterType) -> bool {
        self.get(parameter_type).is_some()
    }

    /// Entry for a type tag.
    pub fn get(&self, parameter_type: ParameterType) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.parameter_type == parameter_type)
    }

    /// Looks up an entry by tag name.
    pub fn find_by_name(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.parameter_type.name() == name)
    }

    /// Creates the default value of a type for a configuration.
    pub fn create(
        &self,
        parameter_type: ParameterType,
        config: &ParameterConfig,
    ) -> Option<Box<dyn ParameterData>> {
        self.get(parameter_type).map(|e| (e.factory)(config))
    }

    /// All registered entries in registration order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
