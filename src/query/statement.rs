//! Graph-scoped write statements
//!
//! Every entity's triples live in the named graph keyed by its own IRI.
//! Statements are typed values so that a store can either render them with
//! [`Statement::to_sparql`] or interpret them directly.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::{MapperError, Result};
use crate::input::{EditOperation, Input, InputValue};
use crate::schema::{EntityType, PredicateEntry};
use crate::value::{strip_angles, Datatype, Term, Value};
use crate::vocab::{ASSET_INVENTORY, CREATED, ID, INVENTORY_ASSETS, MODIFIED, OBJECT_TYPE, RDF_TYPE, XSD};

/// Fields written by the compiler itself, never taken from input
const MANAGED_FIELDS: [&str; 4] = ["id", "object_type", "created", "modified"];

/// Object position of a ground triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Object {
    Iri { iri: String },
    Literal { lexical: String, datatype: Datatype },
}

impl Object {
    pub fn iri(iri: &str) -> Self {
        Object::Iri {
            iri: strip_angles(iri).to_string(),
        }
    }

    pub fn literal(lexical: impl Into<String>, datatype: Datatype) -> Self {
        Object::Literal {
            lexical: lexical.into(),
            datatype,
        }
    }

    /// Object for a value stored under `datatype`
    pub fn from_value(value: &Value, datatype: Datatype) -> Self {
        match (value, datatype) {
            (Value::Iri(iri), _) => Object::iri(iri),
            (v, Datatype::Iri) => Object::iri(&v.lexical()),
            (v, dt) => Object::literal(v.lexical(), dt),
        }
    }

    /// Term the store would return for this object
    pub fn to_term(&self) -> Term {
        match self {
            Object::Iri { iri } => Term::iri(iri.clone()),
            Object::Literal { lexical, datatype } => Term::typed(lexical.clone(), *datatype),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Object::Iri { iri } => format!("<{}>", iri),
            Object::Literal { lexical, datatype } => datatype.render(lexical),
        }
    }
}

/// One ground triple `<subject> <predicate> object`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Triple {
    pub fn new(subject: &str, predicate: &str, object: Object) -> Self {
        Triple {
            subject: strip_angles(subject).to_string(),
            predicate: strip_angles(predicate).to_string(),
            object,
        }
    }

    pub fn render(&self) -> String {
        format!("<{}> <{}> {}", self.subject, self.predicate, self.object.render())
    }
}

/// A write against the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "statement", rename_all = "camelCase")]
pub enum Statement {
    /// `INSERT DATA { GRAPH <g> { ... } }`
    InsertData { graph: String, triples: Vec<Triple> },
    /// `DELETE DATA { GRAPH <g> { ... } }`
    DeleteData { graph: String, triples: Vec<Triple> },
    /// Remove every value of `<subject> <predicate>` in the graph, then add
    /// `values`
    Replace {
        graph: String,
        subject: String,
        predicate: String,
        values: Vec<Object>,
    },
    /// Remove everything the graph says about instances of `class_iri`
    DropEntityGraph { graph: String, class_iri: String },
    /// Link `iri` into every asset inventory
    AddToInventory { iri: String },
    /// Unlink `iri` from every asset inventory
    RemoveFromInventory { iri: String },
}

impl Statement {
    /// Insert of a new entity: class hierarchy, identity, object_type,
    /// timestamps, then one triple per supplied field.
    ///
    /// `input` must already be normalized and carry relationship values as
    /// IRIs. Nested sub-object fields, unregistered fields and fields stored
    /// behind a sequence path are not written.
    pub fn insert_entity(entity_type: &dyn EntityType, id: &str, input: &Input, now: DateTime<Utc>) -> Result<Self> {
        let schema = entity_type.schema();
        let iri = schema.entity_iri(id);
        let object_type = entity_type.object_type(input)?;
        let mut triples = Vec::new();

        for class in schema.classes().iter().chain(entity_type.extra_classes(input)?.iter()) {
            let t = Triple::new(&iri, RDF_TYPE, Object::iri(class));
            if !triples.contains(&t) {
                triples.push(t);
            }
        }
        triples.push(Triple::new(&iri, ID, Object::literal(id, Datatype::String)));
        triples.push(Triple::new(&iri, OBJECT_TYPE, Object::literal(object_type, Datatype::String)));
        if schema.has_timestamps() {
            let ts = timestamp(now);
            triples.push(Triple::new(&iri, CREATED, Object::literal(ts.clone(), Datatype::DateTime)));
            triples.push(Triple::new(&iri, MODIFIED, Object::literal(ts, Datatype::DateTime)));
        }

        for (key, value) in input.iter() {
            if MANAGED_FIELDS.contains(&key.as_str()) || value.is_empty() {
                continue;
            }
            if matches!(value, InputValue::Objects(_) | InputValue::Object(_)) {
                continue;
            }
            let Some(entry) = schema.entry(key) else {
                warn!(entity_type = schema.name(), field = %key, "ignoring unregistered input field");
                continue;
            };
            let Some(predicate) = writable_predicate(entry) else {
                warn!(entity_type = schema.name(), field = %key, "ignoring input field behind a predicate path");
                continue;
            };
            for v in value.values() {
                triples.push(Triple::new(&iri, predicate, Object::from_value(v, entry.datatype())));
            }
        }

        Ok(Statement::InsertData { graph: iri, triples })
    }

    /// Relationship triples from `owner` to each target, in the owner's graph
    pub fn attach(owner: &str, predicate: &str, targets: &[String]) -> Self {
        Statement::InsertData {
            graph: strip_angles(owner).to_string(),
            triples: link_triples(owner, predicate, targets),
        }
    }

    /// Reverse of [`Statement::attach`]
    pub fn detach(owner: &str, predicate: &str, targets: &[String]) -> Self {
        Statement::DeleteData {
            graph: strip_angles(owner).to_string(),
            triples: link_triples(owner, predicate, targets),
        }
    }

    pub fn drop_entity(iri: &str, class_iri: &str) -> Self {
        Statement::DropEntityGraph {
            graph: strip_angles(iri).to_string(),
            class_iri: strip_angles(class_iri).to_string(),
        }
    }

    /// One field change on the entity at `iri`
    pub fn update_field(iri: &str, entry: &PredicateEntry, operation: EditOperation, values: &[Value]) -> Result<Self> {
        let predicate = writable_predicate(entry).ok_or_else(|| {
            MapperError::InvalidInput(format!("Field '{}' cannot be edited directly", entry.name()))
        })?;
        let graph = strip_angles(iri).to_string();
        let objects: Vec<Object> = values
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| Object::from_value(v, entry.datatype()))
            .collect();
        let triples = |objects: Vec<Object>| -> Vec<Triple> {
            objects.into_iter().map(|o| Triple::new(iri, predicate, o)).collect()
        };

        Ok(match operation {
            EditOperation::Add => Statement::InsertData {
                graph,
                triples: triples(objects),
            },
            EditOperation::Replace => Statement::Replace {
                graph,
                subject: strip_angles(iri).to_string(),
                predicate: predicate.to_string(),
                values: objects,
            },
            EditOperation::Remove if objects.is_empty() => Statement::Replace {
                graph,
                subject: strip_angles(iri).to_string(),
                predicate: predicate.to_string(),
                values: Vec::new(),
            },
            EditOperation::Remove => Statement::DeleteData {
                graph,
                triples: triples(objects),
            },
        })
    }

    /// Forced replace of the modification timestamp
    pub fn touch(iri: &str, now: DateTime<Utc>) -> Self {
        Statement::Replace {
            graph: strip_angles(iri).to_string(),
            subject: strip_angles(iri).to_string(),
            predicate: MODIFIED.to_string(),
            values: vec![Object::literal(timestamp(now), Datatype::DateTime)],
        }
    }

    pub fn add_to_inventory(iri: &str) -> Self {
        Statement::AddToInventory {
            iri: strip_angles(iri).to_string(),
        }
    }

    pub fn remove_from_inventory(iri: &str) -> Self {
        Statement::RemoveFromInventory {
            iri: strip_angles(iri).to_string(),
        }
    }

    /// Graph this statement writes into, when it names one
    pub fn graph(&self) -> Option<&str> {
        match self {
            Statement::InsertData { graph, .. }
            | Statement::DeleteData { graph, .. }
            | Statement::Replace { graph, .. }
            | Statement::DropEntityGraph { graph, .. } => Some(graph),
            Statement::AddToInventory { .. } | Statement::RemoveFromInventory { .. } => None,
        }
    }

    pub fn to_sparql(&self) -> String {
        let mut q = format!("PREFIX xsd: <{}>\n", XSD);
        match self {
            Statement::InsertData { graph, triples } => {
                let _ = write!(q, "INSERT DATA {{\n  GRAPH <{}> {{\n{}  }}\n}}", graph, render_block(triples));
            }
            Statement::DeleteData { graph, triples } => {
                let _ = write!(q, "DELETE DATA {{\n  GRAPH <{}> {{\n{}  }}\n}}", graph, render_block(triples));
            }
            Statement::Replace {
                graph,
                subject,
                predicate,
                values,
            } => {
                let _ = writeln!(q, "DELETE {{\n  GRAPH <{}> {{ <{}> <{}> ?o }}\n}}", graph, subject, predicate);
                if !values.is_empty() {
                    let inserts: Vec<Triple> = values
                        .iter()
                        .map(|o| Triple::new(subject, predicate, o.clone()))
                        .collect();
                    let _ = writeln!(q, "INSERT {{\n  GRAPH <{}> {{\n{}  }}\n}}", graph, render_block(&inserts));
                }
                let _ = write!(q, "WHERE {{\n  OPTIONAL {{ GRAPH <{}> {{ <{}> <{}> ?o }} }}\n}}", graph, subject, predicate);
            }
            Statement::DropEntityGraph { graph, class_iri } => {
                let _ = write!(
                    q,
                    "DELETE {{\n  GRAPH <{g}> {{ ?iri ?p ?o }}\n}} WHERE {{\n  GRAPH <{g}> {{\n    ?iri a <{c}> .\n    ?iri ?p ?o\n  }}\n}}",
                    g = graph,
                    c = class_iri
                );
            }
            Statement::AddToInventory { iri } => {
                let _ = write!(
                    q,
                    "INSERT {{\n  GRAPH ?g {{ ?inv <{a}> <{i}> }}\n}} WHERE {{\n  GRAPH ?g {{ ?inv a <{c}> }}\n}}",
                    a = INVENTORY_ASSETS,
                    i = iri,
                    c = ASSET_INVENTORY
                );
            }
            Statement::RemoveFromInventory { iri } => {
                let _ = write!(
                    q,
                    "DELETE {{\n  GRAPH ?g {{ ?inv <{a}> <{i}> }}\n}} WHERE {{\n  GRAPH ?g {{\n    ?inv a <{c}> .\n    ?inv <{a}> <{i}>\n  }}\n}}",
                    a = INVENTORY_ASSETS,
                    i = iri,
                    c = ASSET_INVENTORY
                );
            }
        }
        q
    }
}

/// Predicate to write for an entry; sequence paths are read-only
fn writable_predicate(entry: &PredicateEntry) -> Option<&str> {
    match entry.path() {
        [single] => Some(single.as_str()),
        _ => None,
    }
}

fn link_triples(owner: &str, predicate: &str, targets: &[String]) -> Vec<Triple> {
    targets
        .iter()
        .map(|t| Triple::new(owner, predicate, Object::iri(t)))
        .collect()
}

fn render_block(triples: &[Triple]) -> String {
    triples.iter().fold(String::new(), |mut out, t| {
        let _ = writeln!(out, "    {} .", t.render());
        out
    })
}

/// ISO-8601 UTC with milliseconds, the stored timestamp format
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Registry;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_software() {
        let registry = Registry::standard();
        let software = registry.get("software").unwrap();
        let input = Input::new()
            .with("name", "nginx")
            .with("version", "1.21")
            .with("is_scanned", true)
            .with("bogus", "x")
            .with("label_name", "ignored");
        let stmt = Statement::insert_entity(software, "abc", &input, now()).unwrap();
        let text = stmt.to_sparql();
        let iri = "http://scap.nist.gov/ns/asset-identification#Software-abc";

        assert_eq!(stmt.graph(), Some(iri));
        assert!(text.contains(&format!("GRAPH <{}> {{", iri)));
        assert!(text.contains(&format!(
            "<{}> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://csrc.nist.gov/ns/oscal/common#Component> .",
            iri
        )));
        assert!(text.contains("<http://darklight.ai/ns/common#object_type> \"software\" ."));
        assert!(text.contains("<http://darklight.ai/ns/common#created> \"2021-06-01T12:00:00.000Z\"^^xsd:dateTime ."));
        assert!(text.contains("<http://scap.nist.gov/ns/asset-identification#is_scanned> \"true\"^^xsd:boolean ."));
        assert!(!text.contains("bogus"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn test_insert_without_timestamps() {
        let registry = Registry::standard();
        let port = registry.get("port").unwrap();
        let input = Input::new().with("port_number", 443i64).with("protocols", vec!["tcp"]);
        let text = Statement::insert_entity(port, "p1", &input, now()).unwrap().to_sparql();
        assert!(!text.contains("common#created"));
        assert!(text.contains("\"443\"^^xsd:integer"));
    }

    #[test]
    fn test_attach_detach() {
        let owner = "<http://x.test#Device-1>";
        let targets = vec!["http://x.test#Port-1".to_string(), "<http://x.test#Port-2>".to_string()];
        let attach = Statement::attach(owner, "http://x.test#ports", &targets);
        let text = attach.to_sparql();
        assert!(text.contains("INSERT DATA {\n  GRAPH <http://x.test#Device-1> {"));
        assert!(text.contains("<http://x.test#Device-1> <http://x.test#ports> <http://x.test#Port-2> ."));
        assert!(Statement::detach(owner, "http://x.test#ports", &targets)
            .to_sparql()
            .contains("DELETE DATA"));
    }

    #[test]
    fn test_update_operations() {
        let registry = Registry::standard();
        let entry = registry.lookup("software", "version").unwrap();
        let iri = "http://x.test#Software-1";
        let add = Statement::update_field(iri, entry, EditOperation::Add, &[Value::from("2")]).unwrap();
        assert!(matches!(add, Statement::InsertData { ref triples, .. } if triples.len() == 1));

        let replace = Statement::update_field(iri, entry, EditOperation::Replace, &[Value::from("2")]).unwrap();
        let text = replace.to_sparql();
        assert!(text.contains("DELETE {\n  GRAPH <http://x.test#Software-1> { <http://x.test#Software-1> <http://scap.nist.gov/ns/asset-identification#version> ?o }"));
        assert!(text.contains("\"2\" ."));

        let clear = Statement::update_field(iri, entry, EditOperation::Remove, &[]).unwrap();
        assert!(matches!(clear, Statement::Replace { ref values, .. } if values.is_empty()));
        assert!(!clear.to_sparql().contains("INSERT"));

        let path = registry.lookup("software", "label_name").unwrap();
        assert!(Statement::update_field(iri, path, EditOperation::Add, &[Value::from("x")]).is_err());
    }

    #[test]
    fn test_drop_and_inventory_text() {
        let text = Statement::drop_entity("<http://x.test#Port-1>", "http://x.test#Port").to_sparql();
        assert!(text.contains("GRAPH <http://x.test#Port-1> {\n    ?iri a <http://x.test#Port> ."));
        let text = Statement::add_to_inventory("http://x.test#Software-1").to_sparql();
        assert!(text.contains("?inv <http://csrc.nist.gov/ns/oscal/common#assets> <http://x.test#Software-1>"));
    }
}
