//! Select projection: which predicates a query must bind

use tracing::warn;

use crate::schema::{EntitySchema, PredicateEntry, ENTITY_TYPE_FIELD, IDENTITY_FIELD};

/// Closed set of logical fields to project, identity first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
    entity_type: bool,
}

impl Projection {
    /// Union of the requested fields, the filter keys and the sort key, plus
    /// the identity field.
    ///
    /// Names the schema does not know are dropped. An empty request projects
    /// every field. `entity_type` is computed from `object_type` and
    /// `asset_type`, so requesting it projects those instead, and a
    /// `<field>_iri` hint name projects `<field>`.
    pub fn build(schema: &EntitySchema, requested: &[&str], filter_keys: &[&str], order_by: Option<&str>) -> Self {
        if requested.is_empty() {
            let mut projection = Self::all(schema);
            for name in filter_keys.iter().chain(order_by.iter()) {
                projection.add(schema, name);
            }
            return projection;
        }

        let mut projection = Projection {
            fields: vec![IDENTITY_FIELD.to_string()],
            entity_type: false,
        };
        for name in requested.iter().chain(filter_keys).chain(order_by.iter()) {
            projection.add(schema, name);
        }
        projection
    }

    /// Every field the schema declares
    pub fn all(schema: &EntitySchema) -> Self {
        let mut fields = vec![IDENTITY_FIELD.to_string()];
        fields.extend(
            schema
                .entries()
                .iter()
                .map(|e| e.name().to_string())
                .filter(|n| n != IDENTITY_FIELD),
        );
        Projection { fields, entity_type: true }
    }

    fn add(&mut self, schema: &EntitySchema, name: &str) {
        if name == ENTITY_TYPE_FIELD {
            self.entity_type = true;
            for source in ["object_type", "asset_type"] {
                if schema.entry(source).is_some() {
                    self.push(source);
                }
            }
            return;
        }
        if schema.entry(name).is_some() {
            self.push(name);
            return;
        }
        if let Some(base) = name.strip_suffix("_iri") {
            if schema.entry(base).map_or(false, PredicateEntry::is_relation) {
                self.push(base);
                return;
            }
        }
        warn!(entity_type = schema.name(), field = name, "dropping unregistered field from projection");
    }

    fn push(&mut self, name: &str) {
        if !self.fields.iter().any(|f| f == name) {
            self.fields.push(name.to_string());
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Whether the computed `entity_type` field was asked for
    pub fn wants_entity_type(&self) -> bool {
        self.entity_type
    }

    /// Schema entries for the projected fields, in projection order
    pub fn entries<'a>(&self, schema: &'a EntitySchema) -> Vec<&'a PredicateEntry> {
        self.fields.iter().filter_map(|f| schema.entry(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Registry;
    use proptest::prelude::*;

    fn software() -> EntitySchema {
        Registry::standard().get("software").unwrap().schema().clone()
    }

    #[test]
    fn test_identity_always_first() {
        let p = Projection::build(&software(), &["name"], &[], None);
        assert_eq!(p.fields(), &["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_unknown_fields_dropped() {
        let p = Projection::build(&software(), &["name", "warp_factor"], &["flux"], Some("version"));
        assert_eq!(p.fields(), &["id", "name", "version"]);
    }

    #[test]
    fn test_entity_type_projects_sources() {
        let p = Projection::build(&software(), &["entity_type"], &[], None);
        assert!(p.wants_entity_type());
        assert!(p.contains("object_type"));
        assert!(p.contains("asset_type"));
    }

    #[test]
    fn test_hint_name_projects_relation() {
        let schema = Registry::standard().get("computing-device").unwrap().schema().clone();
        let p = Projection::build(&schema, &["installed_software_iri", "name_iri"], &[], None);
        assert!(p.contains("installed_software"));
        assert!(!p.contains("name"));
    }

    #[test]
    fn test_empty_request_is_everything() {
        let schema = software();
        let p = Projection::build(&schema, &[], &[], None);
        assert_eq!(p.fields().len(), schema.entries().len());
        assert!(p.wants_entity_type());
    }

    proptest! {
        #[test]
        fn prop_projection_closure(
            sel in proptest::sample::subsequence(vec!["name", "version", "vendor_name", "bogus", "entity_type"], 0..5),
            filters in proptest::sample::subsequence(vec!["asset_type", "cpe_identifier", "nope"], 0..3),
            order in proptest::option::of(proptest::sample::select(vec!["release_date", "name", "missing"])),
        ) {
            let schema = software();
            let p = Projection::build(&schema, &sel, &filters, order);
            prop_assert!(p.contains("id"));
            for name in sel.iter().chain(filters.iter()).chain(order.iter()) {
                if schema.entry(name).is_some() {
                    prop_assert!(p.contains(name));
                }
            }
            let mut seen = std::collections::HashSet::new();
            prop_assert!(p.fields().iter().all(|f| seen.insert(f.clone())));
        }
    }
}
