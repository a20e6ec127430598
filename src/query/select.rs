//! SELECT compilation for point and scan lookups

use std::fmt::Write as _;

use crate::query::Projection;
use crate::schema::{EntitySchema, PredicateEntry};
use crate::value::{escape_literal, strip_angles};
use crate::vocab::{ASSET_INVENTORY, ID, INVENTORY_ASSETS};

/// How the subject variable `?iri` is constrained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// `BIND(<iri> AS ?iri)`
    Bound(String),
    /// `?iri <common#id> "id"`
    ById(String),
    /// Every instance of the class
    Any,
}

/// A compiled lookup against one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub entity_type: String,
    pub class_iri: String,
    pub subject: Subject,
    /// Projected predicates, each matched optionally
    pub patterns: Vec<PredicateEntry>,
    /// Restrict to members of an asset inventory
    pub inventory: bool,
    /// Dataset named in `FROM <...>`
    pub context: String,
}

impl SelectQuery {
    /// Point lookup of one known IRI
    pub fn by_iri(schema: &EntitySchema, iri: &str, projection: &Projection, context: &str) -> Self {
        Self::compile(schema, Subject::Bound(strip_angles(iri).to_string()), projection, false, context)
    }

    /// Lookup through the stored `id` literal
    pub fn by_id(schema: &EntitySchema, id: &str, projection: &Projection, context: &str) -> Self {
        Self::compile(schema, Subject::ById(id.to_string()), projection, false, context)
    }

    /// Scan of every instance; inventory-scoped types only see inventory members
    pub fn scan(schema: &EntitySchema, projection: &Projection, context: &str) -> Self {
        Self::compile(schema, Subject::Any, projection, schema.is_inventory_scoped(), context)
    }

    fn compile(schema: &EntitySchema, subject: Subject, projection: &Projection, inventory: bool, context: &str) -> Self {
        SelectQuery {
            entity_type: schema.name().to_string(),
            class_iri: schema.class_iri().to_string(),
            subject,
            patterns: projection.entries(schema).into_iter().cloned().collect(),
            inventory,
            context: context.to_string(),
        }
    }

    /// Variables bound by this query, `?iri` first
    pub fn variables(&self) -> Vec<String> {
        std::iter::once("iri".to_string())
            .chain(self.patterns.iter().map(|p| p.name().to_string()))
            .collect()
    }

    /// Short label for logs and store calls
    pub fn label(&self) -> String {
        match &self.subject {
            Subject::Bound(_) => format!("Select {} by IRI", self.entity_type),
            Subject::ById(_) => format!("Select {} by id", self.entity_type),
            Subject::Any => format!("Select {} list", self.entity_type),
        }
    }

    pub fn to_sparql(&self) -> String {
        let mut q = String::new();
        let vars: Vec<String> = self.variables().iter().map(|v| format!("?{}", v)).collect();
        let _ = writeln!(q, "SELECT DISTINCT {}", vars.join(" "));
        let _ = writeln!(q, "FROM <{}>", self.context);
        q.push_str("WHERE {\n");
        match &self.subject {
            Subject::Bound(iri) => {
                let _ = writeln!(q, "  BIND(<{}> AS ?iri)", iri);
            }
            Subject::ById(id) => {
                let _ = writeln!(q, "  ?iri <{}> \"{}\" .", ID, escape_literal(id));
            }
            Subject::Any => {}
        }
        let _ = writeln!(q, "  ?iri a <{}> .", self.class_iri);
        for p in &self.patterns {
            let _ = writeln!(q, "  {}", p.bind_optional("?iri", None));
        }
        if self.inventory {
            q.push_str("  {\n    SELECT DISTINCT ?iri\n    WHERE {\n");
            let _ = writeln!(q, "      ?inventory a <{}> ;", ASSET_INVENTORY);
            let _ = writeln!(q, "        <{}> ?iri .", INVENTORY_ASSETS);
            q.push_str("    }\n  }\n");
        }
        q.push('}');
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Registry;
    use crate::vocab::CONTEXT_LOCAL;

    #[test]
    fn test_point_lookup_text() {
        let registry = Registry::standard();
        let schema = registry.get("software").unwrap().schema();
        let projection = Projection::build(schema, &["name", "release_date"], &[], None);
        let iri = schema.entity_iri("abc");
        let q = SelectQuery::by_iri(schema, &format!("<{}>", iri), &projection, CONTEXT_LOCAL).to_sparql();

        assert!(q.starts_with("SELECT DISTINCT ?iri ?id ?name ?release_date\n"));
        assert!(q.contains("FROM <tag:stardog:api:context:local>"));
        assert!(q.contains(&format!("BIND(<{}> AS ?iri)", iri)));
        assert!(q.contains("?iri a <http://scap.nist.gov/ns/asset-identification#Software> ."));
        assert!(q.contains(
            "OPTIONAL { ?iri <http://scap.nist.gov/ns/asset-identification#release_date> ?release_date } ."
        ));
        assert!(!q.contains("AssetInventory"));
    }

    #[test]
    fn test_scan_constrains_inventory() {
        let registry = Registry::standard();
        let schema = registry.get("software").unwrap().schema();
        let q = SelectQuery::scan(schema, &Projection::build(schema, &["name"], &[], None), "ctx");
        assert!(q.inventory);
        let text = q.to_sparql();
        assert!(!text.contains("BIND("));
        assert!(text.contains("?inventory a <http://csrc.nist.gov/ns/oscal/common#AssetInventory> ;"));

        let party = registry.get("party").unwrap().schema();
        assert!(!SelectQuery::scan(party, &Projection::all(party), "ctx").inventory);
    }

    #[test]
    fn test_by_id_escapes() {
        let registry = Registry::standard();
        let schema = registry.get("role").unwrap().schema();
        let q = SelectQuery::by_id(schema, "a\"b", &Projection::all(schema), "ctx").to_sparql();
        assert!(q.contains("?iri <http://darklight.ai/ns/common#id> \"a\\\"b\" ."));
    }
}
