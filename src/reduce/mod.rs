//! Result reducer: flat store rows to typed domain objects
//!
//! Reduction is a pure function of the row. Fields without a binding are
//! absent from the object, and relationship fields are kept as IRI hints
//! under `<field>_iri` instead of being dereferenced.

mod row;

pub use row::{group_rows, FlatRow, Solution};

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::query::Projection;
use crate::schema::{Cardinality, EntitySchema, ENTITY_TYPE_FIELD, IDENTITY_FIELD};
use crate::value::{FieldValue, Value};

/// A reduced entity
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    iri: String,
    type_name: String,
    fields: BTreeMap<String, FieldValue>,
    hints: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(iri: &str, type_name: &str) -> Self {
        Entity {
            iri: iri.to_string(),
            type_name: type_name.to_string(),
            fields: BTreeMap::new(),
            hints: BTreeMap::new(),
        }
    }

    /// IRI of the entity; also its cursor and graph name
    pub fn iri(&self) -> &str {
        &self.iri
    }

    /// Registered entity type this object was reduced as
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str(IDENTITY_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field) || self.hints.contains_key(&format!("{}_iri", field))
    }

    /// Field value or relationship hint by the name a caller would use
    pub fn lookup(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .get(key)
            .or_else(|| self.hints.get(key))
            .or_else(|| self.hints.get(&format!("{}_iri", key)))
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Related IRIs recorded for relationship `field`
    pub fn hint(&self, field: &str) -> Vec<&str> {
        self.hints
            .get(&format!("{}_iri", field))
            .map(|v| v.values().iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn hints(&self) -> &BTreeMap<String, FieldValue> {
        &self.hints
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn set_hint(&mut self, key: &str, value: FieldValue) {
        self.hints.insert(key.to_string(), value);
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1 + self.fields.len() + self.hints.len()))?;
        map.serialize_entry("iri", &self.iri)?;
        for (k, v) in self.fields.iter().chain(self.hints.iter()) {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Reduces rows of one entity type under one projection
#[derive(Debug, Clone, Copy)]
pub struct Reducer<'a> {
    schema: &'a EntitySchema,
    projection: &'a Projection,
}

impl<'a> Reducer<'a> {
    pub fn new(schema: &'a EntitySchema, projection: &'a Projection) -> Self {
        Reducer { schema, projection }
    }

    pub fn reduce(&self, row: &FlatRow) -> Entity {
        let mut entity = Entity::new(&row.iri, self.schema.name());

        for entry in self.projection.entries(self.schema) {
            let terms = row.get(entry.name());
            if terms.is_empty() {
                continue;
            }
            let mut values: Vec<Value> = terms.iter().map(|t| Value::from_term(t, entry.datatype())).collect();
            let value = match entry.cardinality() {
                Cardinality::Many => FieldValue::Many(values),
                Cardinality::Single => {
                    if values.len() > 1 {
                        warn!(
                            iri = %row.iri,
                            field = entry.name(),
                            count = values.len(),
                            "CONSTRAINT-VIOLATION: single-valued field has multiple values, keeping the first"
                        );
                    }
                    FieldValue::One(values.swap_remove(0))
                }
            };
            if entry.is_relation() {
                entity.set_hint(&entry.hint_key(), value);
            } else {
                entity.set(entry.name(), value);
            }
        }

        if self.projection.wants_entity_type() {
            let entity_type = entity
                .get_str("object_type")
                .or_else(|| entity.get_str("asset_type"))
                .unwrap_or(self.schema.default_entity_type())
                .to_string();
            entity.set(ENTITY_TYPE_FIELD, FieldValue::One(Value::Str(entity_type)));
        }
        entity
    }

    /// Group raw solutions by subject, then reduce each group
    pub fn reduce_solutions(&self, solutions: Vec<Solution>) -> Vec<Entity> {
        group_rows(solutions).iter().map(|row| self.reduce(row)).collect()
    }
}
