//! Type-id manifest a plugin module fills on startup.

use charlie_core::Simulation;
use indexmap::IndexMap;

/// Constructor for one plugin type.
pub type Factory = fn() -> Box<dyn Simulation>;

fn construct<T: Simulation + Default + 'static>() -> Box<dyn Simulation> {
    Box::new(T::default())
}

/// Registered simulation types, keyed by type identifier.
///
/// Identifiers are listed in registration order. Registering the same id
/// twice replaces the earlier factory.
#[derive(Clone, Default)]
pub struct Registry {
    entries: IndexMap<String, Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `type_id`; instances are built with `T::default()`.
    pub fn register<T: Simulation + Default + 'static>(&mut self, type_id: impl Into<String>) -> &mut Self {
        self.register_factory(type_id, construct::<T>)
    }

    /// Register an explicit constructor under `type_id`.
    pub fn register_factory(&mut self, type_id: impl Into<String>, factory: Factory) -> &mut Self {
        self.entries.insert(type_id.into(), factory);
        self
    }

    /// Constructor for `type_id`, if registered.
    pub fn factory(&self, type_id: &str) -> Option<Factory> {
        self.entries.get(type_id).copied()
    }

    /// Whether `type_id` is registered.
    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.contains_key(type_id)
    }

    /// Registered ids in registration order.
    pub fn type_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("type_ids", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
