//! Create, edit, delete, attach and detach
//!
//! Every mutation is a fixed sequence of separate store calls. Steps that
//! reference IRIs come after the steps that produce them: owned sub-objects,
//! then the owner, then links, then inventory membership. Under
//! [`Atomicity::Compensating`] each applied step records its inverse and a
//! failure replays those inverses newest first.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::Atomicity;
use crate::engine::Engine;
use crate::error::{MapperError, Result};
use crate::identity;
use crate::input::{Delta, EditOperation, Input, InputValue};
use crate::query::{Object, Statement};
use crate::reduce::Entity;
use crate::schema::{OwnedDef, PredicateEntry, IDENTITY_FIELD};
use crate::store::TripleStore;
use crate::value::{strip_angles, Value};

/// Store entry point a step goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Edit,
    Delete,
}

/// Steps applied so far, and how to undo them
#[derive(Debug, Default)]
struct Journal {
    completed: Vec<String>,
    undo: Vec<(String, Statement)>,
}

/// Outcome of a delete: the removed id and the sub-object graphs dropped
/// with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub id: String,
    pub iri: String,
    pub removed_children: Vec<String>,
}

fn is_iri_like(s: &str) -> bool {
    s.starts_with('<') || s.contains("://")
}

impl<S: TripleStore> Engine<S> {
    fn write(&self, kind: WriteKind, statement: &Statement, label: &str) -> Result<()> {
        let db = &self.config.db_name;
        tracing::debug!(db = %db, label, ?kind, "store write");
        match kind {
            WriteKind::Create => self.store.create(db, statement, label),
            WriteKind::Edit => self.store.edit(db, statement, label),
            WriteKind::Delete => self.store.delete(db, statement, label),
        }
    }

    /// Apply one step, recording it and its inverse
    fn step(
        &self,
        journal: &mut Journal,
        kind: WriteKind,
        statement: Statement,
        label: String,
        undo: Option<Statement>,
    ) -> Result<()> {
        match self.write(kind, &statement, &label) {
            Ok(()) => {
                journal.completed.push(label.clone());
                if let Some(undo) = undo {
                    journal.undo.push((format!("Undo {}", label), undo));
                }
                Ok(())
            }
            Err(e) => Err(self.abort(journal, e)),
        }
    }

    /// Turn a mid-sequence failure into the error the caller sees
    fn abort(&self, journal: &mut Journal, error: MapperError) -> MapperError {
        if journal.completed.is_empty() {
            return error;
        }
        if self.config.atomicity == Atomicity::Compensating {
            while let Some((label, statement)) = journal.undo.pop() {
                let kind = match statement {
                    Statement::InsertData { .. } | Statement::AddToInventory { .. } => WriteKind::Create,
                    Statement::Replace { .. } => WriteKind::Edit,
                    _ => WriteKind::Delete,
                };
                if let Err(e) = self.write(kind, &statement, &label) {
                    tracing::warn!(label = %label, error = %e, "compensation failed");
                }
            }
        } else {
            tracing::warn!(
                completed = journal.completed.len(),
                error = %error,
                "mutation failed partway; applied steps remain"
            );
        }
        MapperError::PartialMutation {
            completed: std::mem::take(&mut journal.completed),
            source: Box::new(error),
        }
    }

    /// IRI for a relationship value: IRIs pass through, ids are looked up
    /// among the relationship's target types
    fn resolve_reference(&self, entry: &PredicateEntry, value: &Value) -> Result<String> {
        let raw = value.lexical();
        if matches!(value, Value::Iri(_)) || is_iri_like(&raw) {
            identity::check_iri(&raw)?;
            return Ok(strip_angles(&raw).to_string());
        }
        identity::check_id(&raw)?;
        for target in entry.targets() {
            if !self.registry.contains(&target.entity_type) {
                continue;
            }
            if let Some(iri) = self.select_iri_by_id(&target.entity_type, &raw)? {
                return Ok(iri);
            }
        }
        Err(MapperError::NotFound {
            entity_type: entry
                .targets()
                .first()
                .map(|t| t.entity_type.clone())
                .unwrap_or_default(),
            id: raw,
        })
    }

    /// Create an entity with its owned sub-objects and references.
    ///
    /// References are resolved before anything is written, so an unknown
    /// referenced id writes nothing.
    pub fn create(&self, entity_type: &str, input: Input) -> Result<Entity> {
        let et = self.entity_type(entity_type)?;
        let schema = et.schema();
        let input = input.normalized();
        let (id, iri) = identity::entity_iri(et, &input)?;
        let now = Utc::now();

        // Split input into plain fields, owned children and references
        let mut plain = Input::new();
        let mut children: Vec<(&OwnedDef, Input)> = Vec::new();
        let mut references: Vec<(&PredicateEntry, Vec<String>)> = Vec::new();
        for (key, value) in input.iter() {
            if let Some(def) = schema.owned_def(key) {
                children.extend(child_inputs(def, value)?.into_iter().map(|c| (def, c)));
                continue;
            }
            match schema.entry(key) {
                Some(entry) if entry.is_relation() => {
                    let iris = value
                        .values()
                        .into_iter()
                        .map(|v| self.resolve_reference(entry, v))
                        .collect::<Result<Vec<_>>>()?;
                    references.push((entry, iris));
                }
                _ => plain.set(key, value.clone()),
            }
        }

        // Compile every write before the first one is issued
        let mut child_steps = Vec::with_capacity(children.len());
        for (def, child) in &children {
            let child_type = self.entity_type(&def.child_type)?;
            let (child_id, child_iri) = identity::entity_iri(child_type, child)?;
            child_steps.push((
                *def,
                Statement::insert_entity(child_type, &child_id, child, now)?,
                Statement::drop_entity(&child_iri, child_type.schema().class_iri()),
                format!("Create {} {}", def.child_type, child_id),
                child_iri,
            ));
        }
        let insert = Statement::insert_entity(et, &id, &plain, now)?;

        let mut journal = Journal::default();
        let mut links: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (def, statement, undo, label, child_iri) in child_steps {
            self.step(&mut journal, WriteKind::Create, statement, label, Some(undo))?;
            let linked = links.entry(def.relation.clone()).or_default();
            if !linked.contains(&child_iri) {
                linked.push(child_iri);
            }
        }

        self.step(
            &mut journal,
            WriteKind::Create,
            insert,
            format!("Create {} {}", entity_type, id),
            Some(Statement::drop_entity(&iri, schema.class_iri())),
        )?;

        let child_links = links.into_iter().filter_map(|(relation, iris)| {
            schema.entry(&relation).map(|entry| (entry, iris))
        });
        for (entry, iris) in child_links.chain(references) {
            if iris.is_empty() {
                continue;
            }
            let predicate = single_predicate(entry)?;
            self.step(
                &mut journal,
                WriteKind::Create,
                Statement::attach(&iri, predicate, &iris),
                format!("Attach {} to {} {}", entry.name(), entity_type, id),
                Some(Statement::detach(&iri, predicate, &iris)),
            )?;
        }

        if schema.is_inventory_scoped() {
            self.step(
                &mut journal,
                WriteKind::Create,
                Statement::add_to_inventory(&iri),
                format!("Add {} {} to inventory", entity_type, id),
                Some(Statement::remove_from_inventory(&iri)),
            )?;
        }

        tracing::info!(entity_type, id = %id, steps = journal.completed.len(), "created");
        self.get_by_iri(entity_type, &iri, &[])?.ok_or(MapperError::NotFound {
            entity_type: entity_type.to_string(),
            id,
        })
    }

    /// Apply field deltas, then refresh `modified`.
    ///
    /// A delta without an operation is an add when the field is currently
    /// unset and a replace otherwise.
    pub fn edit(&self, entity_type: &str, id: &str, deltas: &[Delta]) -> Result<Entity> {
        identity::check_id(id)?;
        let et = self.entity_type(entity_type)?;
        let schema = et.schema();
        let iri = schema.entity_iri(id);

        let mut entries = Vec::with_capacity(deltas.len());
        for delta in deltas {
            if delta.key == IDENTITY_FIELD {
                return Err(MapperError::InvalidInput("the id of an entity cannot be edited".into()));
            }
            entries.push(schema.require_entry(&delta.key)?);
        }
        let mut keys: Vec<&str> = deltas.iter().map(|d| d.key.as_str()).collect();
        if schema.has_timestamps() {
            keys.push("modified");
        }
        let existing = self.get_by_iri(entity_type, &iri, &keys)?.ok_or_else(|| MapperError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })?;

        // Resolve references and compile every statement before the first write
        let mut planned = Vec::with_capacity(deltas.len() + 1);
        for (delta, entry) in deltas.iter().zip(entries) {
            let values = if entry.is_relation() {
                delta
                    .value
                    .iter()
                    .map(|v| self.resolve_reference(entry, v).map(Value::Iri))
                    .collect::<Result<Vec<_>>>()?
            } else {
                delta.value.clone()
            };
            let operation = delta.operation.unwrap_or(if existing.has(&delta.key) {
                EditOperation::Replace
            } else {
                EditOperation::Add
            });
            planned.push((
                Statement::update_field(&iri, entry, operation, &values)?,
                restore_statement(&existing, entry),
                format!("Update {} of {} {}", entry.name(), entity_type, id),
            ));
        }
        if schema.has_timestamps() {
            planned.push((
                Statement::touch(&iri, Utc::now()),
                schema.entry("modified").and_then(|entry| restore_statement(&existing, entry)),
                format!("Touch {} {}", entity_type, id),
            ));
        }

        let mut journal = Journal::default();
        for (statement, undo, label) in planned {
            self.step(&mut journal, WriteKind::Edit, statement, label, undo)?;
        }

        self.get_by_iri(entity_type, &iri, &[])?.ok_or_else(|| MapperError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Delete an entity, its owned sub-objects and its inventory membership.
    ///
    /// Deletions are never compensated; a failure reports the steps already
    /// applied.
    pub fn delete(&self, entity_type: &str, id: &str) -> Result<MutationReport> {
        identity::check_id(id)?;
        let et = self.entity_type(entity_type)?;
        let schema = et.schema();
        let iri = schema.entity_iri(id);
        let relations: Vec<&str> = schema.owned().iter().map(|o| o.relation.as_str()).collect();
        let existing = self.get_by_iri(entity_type, &iri, &relations)?.ok_or_else(|| MapperError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })?;

        let mut journal = Journal::default();
        let mut removed_children = Vec::new();
        for def in schema.owned() {
            let child_schema = self.entity_type(&def.child_type)?.schema();
            for child_iri in existing.hint(&def.relation) {
                if child_schema.id_from_iri(child_iri).is_none()
                    || identity::check_iri(child_iri).is_err()
                    || removed_children.iter().any(|c| c == child_iri)
                {
                    continue;
                }
                self.step(
                    &mut journal,
                    WriteKind::Delete,
                    Statement::drop_entity(child_iri, child_schema.class_iri()),
                    format!("Delete {} {}", def.child_type, child_iri),
                    None,
                )?;
                removed_children.push(child_iri.to_string());
            }
        }

        if schema.is_inventory_scoped() {
            self.step(
                &mut journal,
                WriteKind::Delete,
                Statement::remove_from_inventory(&iri),
                format!("Remove {} {} from inventory", entity_type, id),
                None,
            )?;
        }

        self.step(
            &mut journal,
            WriteKind::Delete,
            Statement::drop_entity(&iri, schema.class_iri()),
            format!("Delete {} {}", entity_type, id),
            None,
        )?;

        tracing::info!(entity_type, id, children = removed_children.len(), "deleted");
        Ok(MutationReport {
            id: id.to_string(),
            iri,
            removed_children,
        })
    }

    /// Link `targets` (IRIs or ids) to the entity through relationship `field`
    pub fn attach(&self, entity_type: &str, id: &str, field: &str, targets: &[&str]) -> Result<()> {
        let (iri, predicate, iris) = self.link_plan(entity_type, id, field, targets)?;
        self.write(
            WriteKind::Create,
            &Statement::attach(&iri, &predicate, &iris),
            &format!("Attach {} to {} {}", field, entity_type, id),
        )
    }

    /// Remove the links [`Engine::attach`] would add
    pub fn detach(&self, entity_type: &str, id: &str, field: &str, targets: &[&str]) -> Result<()> {
        let (iri, predicate, iris) = self.link_plan(entity_type, id, field, targets)?;
        self.write(
            WriteKind::Delete,
            &Statement::detach(&iri, &predicate, &iris),
            &format!("Detach {} from {} {}", field, entity_type, id),
        )
    }

    fn link_plan(&self, entity_type: &str, id: &str, field: &str, targets: &[&str]) -> Result<(String, String, Vec<String>)> {
        identity::check_id(id)?;
        let schema = self.entity_type(entity_type)?.schema();
        let entry = schema.require_entry(field)?;
        if !entry.is_relation() {
            return Err(MapperError::InvalidInput(format!(
                "'{}' of {} is not a relationship",
                field, entity_type
            )));
        }
        let predicate = single_predicate(entry)?.to_string();
        let iris = targets
            .iter()
            .map(|t| self.resolve_reference(entry, &Value::from(*t)))
            .collect::<Result<Vec<_>>>()?;
        Ok((schema.entity_iri(id), predicate, iris))
    }
}

/// Inputs for the children declared by `def`: nested objects as given,
/// bare scalars wrapped into the child's value field
fn child_inputs(def: &OwnedDef, value: &InputValue) -> Result<Vec<Input>> {
    match value {
        InputValue::Objects(objects) => Ok(objects.iter().cloned().map(Input::normalized).collect()),
        InputValue::Object(object) => Ok(vec![object.clone().normalized()]),
        InputValue::Scalar(_) | InputValue::List(_) => match &def.scalar_field {
            Some(field) => Ok(value
                .values()
                .into_iter()
                .filter(|v| !v.is_empty())
                .map(|v| Input::new().with(field, v.clone()))
                .collect()),
            None => Err(MapperError::InvalidInput(format!(
                "'{}' expects nested objects",
                def.input_field
            ))),
        },
        InputValue::Null => Ok(Vec::new()),
    }
}

fn single_predicate(entry: &PredicateEntry) -> Result<&str> {
    match entry.path() {
        [single] => Ok(single.as_str()),
        _ => Err(MapperError::InvalidInput(format!(
            "'{}' is stored behind a predicate path and cannot be written",
            entry.name()
        ))),
    }
}

/// Statement putting `entry` back to what `existing` holds
fn restore_statement(existing: &Entity, entry: &PredicateEntry) -> Option<Statement> {
    let predicate = match entry.path() {
        [single] => single.clone(),
        _ => return None,
    };
    let values = existing
        .lookup(entry.name())
        .map(|v| v.values().iter().map(|v| Object::from_value(v, entry.datatype())).collect())
        .unwrap_or_default();
    Some(Statement::Replace {
        graph: existing.iri().to_string(),
        subject: existing.iri().to_string(),
        predicate,
        values,
    })
}
