//! Engine: schema registry, query compiler, reducer and pager wired to a store
//!
//! Reads issue one lookup and reduce the rows; writes are sequences of
//! independent store calls (see [`mutation`]).

mod mutation;
mod resolve;

#[cfg(test)]
mod tests;

pub use mutation::MutationReport;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::page::{paginate, Connection, PageArgs};
use crate::query::{Projection, SelectQuery};
use crate::reduce::{Entity, Reducer};
use crate::schema::{EntityType, Registry};
use crate::store::TripleStore;

pub struct Engine<S> {
    store: S,
    registry: Arc<Registry>,
    config: EngineConfig,
}

impl<S: TripleStore> Engine<S> {
    pub fn new(store: S, registry: Arc<Registry>, config: EngineConfig) -> Self {
        Engine { store, registry, config }
    }

    /// Engine over the standard catalog with default configuration
    pub fn with_store(store: S) -> Self {
        Self::new(store, Arc::new(Registry::standard()), EngineConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn entity_type(&self, name: &str) -> Result<&dyn EntityType> {
        self.registry.get(name)
    }

    /// Point lookup by identifier. An empty selection projects every field.
    pub fn get(&self, entity_type: &str, id: &str, select: &[&str]) -> Result<Option<Entity>> {
        crate::identity::check_id(id)?;
        let iri = self.entity_type(entity_type)?.schema().entity_iri(id);
        self.get_by_iri(entity_type, &iri, select)
    }

    /// Point lookup of a known IRI
    pub fn get_by_iri(&self, entity_type: &str, iri: &str, select: &[&str]) -> Result<Option<Entity>> {
        crate::identity::check_iri(iri)?;
        let schema = self.entity_type(entity_type)?.schema();
        let projection = Projection::build(schema, select, &[], None);
        let query = SelectQuery::by_iri(schema, iri, &projection, &self.config.point_context);
        let label = query.label();
        tracing::debug!(db = %self.config.db_name, label = %label, "query_by_id");

        let solutions = self.store.query_by_id(&self.config.db_name, &query, &label)?;
        let mut entities = Reducer::new(schema, &projection).reduce_solutions(solutions);
        if entities.len() > 1 {
            tracing::warn!(iri, count = entities.len(), "point lookup returned several subjects; keeping the first");
        }
        Ok(if entities.is_empty() { None } else { Some(entities.swap_remove(0)) })
    }

    /// IRI of the `entity_type` instance whose stored id is `id`
    pub fn select_iri_by_id(&self, entity_type: &str, id: &str) -> Result<Option<String>> {
        let schema = self.entity_type(entity_type)?.schema();
        let projection = Projection::build(schema, &[crate::schema::IDENTITY_FIELD], &[], None);
        let query = SelectQuery::by_id(schema, id, &projection, &self.config.point_context);
        let label = query.label();
        tracing::debug!(db = %self.config.db_name, label = %label, "query_by_id");

        let solutions = self.store.query_by_id(&self.config.db_name, &query, &label)?;
        Ok(crate::reduce::group_rows(solutions).into_iter().next().map(|row| row.iri))
    }

    /// Scan, reduce and page every instance of `entity_type`
    pub fn list(&self, entity_type: &str, select: &[&str], args: &PageArgs) -> Result<Connection> {
        let schema = self.entity_type(entity_type)?.schema();
        let filter_keys = args.filter_keys();
        let projection = Projection::build(schema, select, &filter_keys, args.ordered_by.as_deref());
        let query = SelectQuery::scan(schema, &projection, &self.config.scan_context);
        let label = query.label();
        tracing::debug!(db = %self.config.db_name, label = %label, "query_all");

        let solutions = self.store.query_all(&self.config.db_name, &query, &label)?;
        let entities = Reducer::new(schema, &projection).reduce_solutions(solutions);
        let page = paginate(entities, args, self.config.skip_missing_id);
        tracing::debug!(
            entity_type,
            returned = page.edges.len(),
            global_count = page.page_info.global_count,
            "list complete"
        );
        Ok(page)
    }
}
