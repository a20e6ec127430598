//! Lazy relationship resolution
//!
//! A reduced entity carries relationship IRIs as hints. Resolving a field
//! issues one point lookup per hint whose IRI names one of the field's target
//! types; other hints are skipped.

use rayon::prelude::*;

use crate::engine::Engine;
use crate::error::{MapperError, Result};
use crate::reduce::Entity;
use crate::schema::PredicateEntry;
use crate::store::TripleStore;

impl<S: TripleStore> Engine<S> {
    fn relation_entry(&self, owner: &Entity, field: &str) -> Result<&PredicateEntry> {
        let entry = self.entity_type(owner.type_name())?.schema().require_entry(field)?;
        if !entry.is_relation() {
            return Err(MapperError::InvalidInput(format!(
                "'{}' of {} is not a relationship",
                field,
                owner.type_name()
            )));
        }
        Ok(entry)
    }

    /// Hint IRIs worth dereferencing, paired with the type to reduce them as
    fn resolvable<'a>(&self, entry: &PredicateEntry, owner: &'a Entity) -> Vec<(&'a str, String)> {
        owner
            .hint(entry.name())
            .into_iter()
            .filter_map(|iri| match entry.target_for_iri(iri) {
                Some(target) if self.registry.contains(&target.entity_type) => Some((iri, target.entity_type.clone())),
                Some(target) => {
                    tracing::debug!(iri, entity_type = %target.entity_type, "no registered type for hint");
                    None
                }
                None => {
                    tracing::debug!(iri, field = entry.name(), "skipping hint of unexpected type");
                    None
                }
            })
            .collect()
    }

    /// Dereference every hint of relationship `field` on `owner`, in hint
    /// order. Missing or filtered hints give an empty list.
    pub fn resolve(&self, owner: &Entity, field: &str, select: &[&str]) -> Result<Vec<Entity>> {
        let entry = self.relation_entry(owner, field)?;
        let mut resolved = Vec::new();
        for (iri, entity_type) in self.resolvable(entry, owner) {
            if let Some(entity) = self.get_by_iri(&entity_type, iri, select)? {
                resolved.push(entity);
            }
        }
        Ok(resolved)
    }

    /// Resolve a single-valued relationship. Several results are a
    /// constraint violation: the first is kept.
    pub fn resolve_one(&self, owner: &Entity, field: &str, select: &[&str]) -> Result<Option<Entity>> {
        let mut resolved = self.resolve(owner, field, select)?;
        if resolved.len() > 1 {
            tracing::warn!(
                iri = owner.iri(),
                field,
                count = resolved.len(),
                "CONSTRAINT-VIOLATION: single-valued relationship resolved to several entities"
            );
        }
        Ok(if resolved.is_empty() { None } else { Some(resolved.swap_remove(0)) })
    }
}

impl<S: TripleStore + Sync> Engine<S> {
    /// Same as [`Engine::resolve`], issuing the lookups concurrently. Result
    /// order still follows hint order.
    pub fn resolve_parallel(&self, owner: &Entity, field: &str, select: &[&str]) -> Result<Vec<Entity>> {
        let entry = self.relation_entry(owner, field)?;
        let found = self
            .resolvable(entry, owner)
            .into_par_iter()
            .map(|(iri, entity_type)| self.get_by_iri(&entity_type, iri, select))
            .collect::<Result<Vec<_>>>()?;
        Ok(found.into_iter().flatten().collect())
    }
}
