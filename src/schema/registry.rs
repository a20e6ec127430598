use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MapperError, Result};
use crate::schema::{standard_types, EntityType, PredicateEntry};

/// Entity types by name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<String, Arc<dyn EntityType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard asset and OSCAL catalog
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for t in standard_types() {
            registry.register(t);
        }
        registry
    }

    /// Add or replace an entity type
    pub fn register(&mut self, entity_type: Arc<dyn EntityType>) {
        self.types.insert(entity_type.name().to_string(), entity_type);
    }

    pub fn get(&self, name: &str) -> Result<&dyn EntityType> {
        self.types
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| MapperError::UnknownEntityType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Predicate entry for `field` on `entity_type`, if both are known
    pub fn lookup(&self, entity_type: &str, field: &str) -> Option<&PredicateEntry> {
        self.types.get(entity_type).and_then(|t| t.schema().entry(field))
    }

    /// Registered type owning `iri`. When several types share an IRI space
    /// the one whose class names it wins.
    pub fn type_for_iri(&self, iri: &str) -> Option<&dyn EntityType> {
        let mut owners: Vec<&Arc<dyn EntityType>> = self
            .types
            .values()
            .filter(|t| t.schema().id_from_iri(iri).is_some())
            .collect();
        owners.sort_by_key(|t| t.name().to_string());
        let own_class = owners
            .iter()
            .find(|t| crate::value::strip_angles(iri).starts_with(&format!("{}-", t.schema().class_iri())));
        own_class.or(owners.first()).map(|t| &***t)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
