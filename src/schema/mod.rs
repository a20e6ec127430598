//! Predicate maps: per entity type, which logical field lives at which
//! predicate path and how its values are bound into query text.

mod catalog;
mod registry;

pub use catalog::*;
pub use registry::Registry;

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{MapperError, Result};
use crate::input::{Input, InputValue};
use crate::value::{strip_angles, Datatype, Value};

/// Logical name of the identity field, present on every entity type
pub const IDENTITY_FIELD: &str = "id";

/// Virtual field computed by the reducer from object_type / asset_type
pub const ENTITY_TYPE_FIELD: &str = "entity_type";

/// Declared cardinality of a predicate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    Many,
}

/// Entity type a relationship may point at, recognised by an IRI substring
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub entity_type: String,
    pub discriminator: String,
}

/// One logical field of an entity type
#[derive(Clone, Debug, PartialEq)]
pub struct PredicateEntry {
    name: String,
    path: Vec<String>,
    datatype: Datatype,
    cardinality: Cardinality,
    targets: Vec<Target>,
}

impl PredicateEntry {
    /// Single-valued string field at one predicate
    pub fn new(name: &str, predicate: impl Into<String>) -> Self {
        PredicateEntry {
            name: name.to_string(),
            path: vec![predicate.into()],
            datatype: Datatype::String,
            cardinality: Cardinality::Single,
            targets: Vec::new(),
        }
    }

    pub fn typed(mut self, datatype: Datatype) -> Self {
        self.datatype = datatype;
        self
    }

    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    /// Extend the predicate path by one step (sequence path `a/b`)
    pub fn via(mut self, predicate: impl Into<String>) -> Self {
        self.path.push(predicate.into());
        self
    }

    /// Mark this field as a relationship to `entity_type`, whose IRIs contain
    /// `discriminator`
    pub fn relation(mut self, entity_type: &str, discriminator: &str) -> Self {
        self.datatype = Datatype::Iri;
        self.targets.push(Target {
            entity_type: entity_type.to_string(),
            discriminator: discriminator.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn is_relation(&self) -> bool {
        !self.targets.is_empty()
    }

    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// Key under which a reduced object keeps this relationship's IRIs
    pub fn hint_key(&self) -> String {
        format!("{}_iri", self.name)
    }

    /// First registered target whose discriminator occurs in `iri`
    pub fn target_for_iri(&self, iri: &str) -> Option<&Target> {
        self.targets.iter().find(|t| iri.contains(&t.discriminator))
    }

    /// Predicate path as query text: `<a>` or `<a>/<b>`
    pub fn predicate_text(&self) -> String {
        self.path
            .iter()
            .map(|p| format!("<{}>", p))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Triple pattern binding `value` (or the field's own variable when
    /// absent) to `subject`
    pub fn bind(&self, subject: &str, value: Option<&Value>) -> String {
        let object = match value {
            Some(v) => v.render(self.datatype),
            None => format!("?{}", self.name),
        };
        format!("{} {} {}", subject_text(subject), self.predicate_text(), object)
    }

    /// Same pattern wrapped as non-mandatory
    pub fn bind_optional(&self, subject: &str, value: Option<&Value>) -> String {
        format!("OPTIONAL {{ {} }} .", self.bind(subject, value))
    }
}

/// `?var` passes through, anything else is treated as an IRI
pub fn subject_text(subject: &str) -> String {
    if subject.starts_with('?') {
        subject.to_string()
    } else {
        format!("<{}>", strip_angles(subject))
    }
}

/// Input field that contributes to the deterministic identifier, and the key
/// it is hashed under
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdField {
    pub field: String,
    pub key: String,
}

/// Sub-objects created and deleted together with their owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedDef {
    /// Field name in create input (e.g. `ipv4_address`)
    pub input_field: String,
    /// Relationship field on the owner that links to the children
    pub relation: String,
    /// Entity type of each child
    pub child_type: String,
    /// When the input carries bare scalars, the child field they populate
    pub scalar_field: Option<String>,
}

/// Static schema of one entity type
#[derive(Clone, Debug)]
pub struct EntitySchema {
    name: String,
    namespace: String,
    segment: String,
    class_iri: String,
    classes: Vec<String>,
    default_type: String,
    id_namespace: Uuid,
    id_fields: Vec<IdField>,
    inventory_scoped: bool,
    timestamps: bool,
    entries: Vec<PredicateEntry>,
    owned: Vec<OwnedDef>,
}

impl EntitySchema {
    /// Start a schema whose IRIs look like `<namespace><segment>-<id>` and
    /// whose class is `<namespace><segment>`
    pub fn new(name: &str, namespace: &str, segment: &str) -> Self {
        let class_iri = format!("{}{}", namespace, segment);
        EntitySchema {
            name: name.to_string(),
            namespace: namespace.to_string(),
            segment: segment.to_string(),
            classes: vec![class_iri.clone()],
            class_iri,
            default_type: name.to_string(),
            id_namespace: Uuid::NAMESPACE_OID,
            id_fields: Vec::new(),
            inventory_scoped: false,
            timestamps: true,
            entries: Vec::new(),
            owned: Vec::new(),
        }
    }

    /// Query class, when it differs from the IRI segment
    pub fn class(mut self, class_iri: impl Into<String>) -> Self {
        let class_iri = class_iri.into();
        self.classes.retain(|c| *c != self.class_iri);
        self.classes.insert(0, class_iri.clone());
        self.class_iri = class_iri;
        self
    }

    /// Additional superclasses asserted on insert
    pub fn superclasses(mut self, classes: &[String]) -> Self {
        for c in classes {
            if !self.classes.contains(c) {
                self.classes.push(c.clone());
            }
        }
        self
    }

    pub fn default_type(mut self, entity_type: &str) -> Self {
        self.default_type = entity_type.to_string();
        self
    }

    pub fn id_namespace(mut self, ns: Uuid) -> Self {
        self.id_namespace = ns;
        self
    }

    pub fn id_field(mut self, field: &str, key: &str) -> Self {
        self.id_fields.push(IdField {
            field: field.to_string(),
            key: key.to_string(),
        });
        self
    }

    pub fn inventory_scoped(mut self) -> Self {
        self.inventory_scoped = true;
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn field(mut self, entry: PredicateEntry) -> Self {
        self.entries.retain(|e| e.name != entry.name);
        self.entries.push(entry);
        self
    }

    pub fn fields(self, entries: Vec<PredicateEntry>) -> Self {
        entries.into_iter().fold(self, |s, e| s.field(e))
    }

    pub fn owns(mut self, input_field: &str, relation: &str, child_type: &str, scalar_field: Option<&str>) -> Self {
        self.owned.push(OwnedDef {
            input_field: input_field.to_string(),
            relation: relation.to_string(),
            child_type: child_type.to_string(),
            scalar_field: scalar_field.map(str::to_string),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_iri(&self) -> &str {
        &self.class_iri
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn default_entity_type(&self) -> &str {
        &self.default_type
    }

    pub fn id_namespace_uuid(&self) -> Uuid {
        self.id_namespace
    }

    pub fn id_fields(&self) -> &[IdField] {
        &self.id_fields
    }

    pub fn is_inventory_scoped(&self) -> bool {
        self.inventory_scoped
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn entries(&self) -> &[PredicateEntry] {
        &self.entries
    }

    pub fn owned(&self) -> &[OwnedDef] {
        &self.owned
    }

    pub fn entry(&self, name: &str) -> Option<&PredicateEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn owned_def(&self, input_field: &str) -> Option<&OwnedDef> {
        self.owned.iter().find(|o| o.input_field == input_field)
    }

    pub fn identity(&self) -> Option<&PredicateEntry> {
        self.entry(IDENTITY_FIELD)
    }

    /// Substring that marks an IRI as belonging to this type
    pub fn discriminator(&self) -> String {
        format!("{}-", self.segment)
    }

    /// Entity IRI (without angle brackets) for an identifier
    pub fn entity_iri(&self, id: &str) -> String {
        format!("{}{}-{}", self.namespace, self.segment, id)
    }

    /// Identifier part of an entity IRI of this type
    pub fn id_from_iri<'a>(&self, iri: &'a str) -> Option<&'a str> {
        strip_angles(iri)
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix(self.segment.as_str()))
            .and_then(|rest| rest.strip_prefix('-'))
    }

    pub fn require_entry(&self, name: &str) -> Result<&PredicateEntry> {
        self.entry(name).ok_or_else(|| MapperError::UnknownField {
            entity_type: self.name.clone(),
            field: name.to_string(),
        })
    }
}

/// Typed interface per entity type. Most types are pure schema; a few derive
/// classes or object_type from the input.
pub trait EntityType: Send + Sync + fmt::Debug {
    fn schema(&self) -> &EntitySchema;

    fn name(&self) -> &str {
        self.schema().name()
    }

    /// object_type literal stored on insert
    fn object_type(&self, _input: &Input) -> Result<String> {
        Ok(self.schema().default_entity_type().to_string())
    }

    /// Class IRIs asserted on insert in addition to the schema hierarchy
    fn extra_classes(&self, _input: &Input) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Canonical identifying material: id-field values keyed by their hash key
    fn id_material(&self, input: &Input) -> BTreeMap<String, serde_json::Value> {
        let mut material = BTreeMap::new();
        for IdField { field, key } in self.schema().id_fields() {
            let json = match input.get(field) {
                Some(InputValue::Scalar(v)) if !v.is_empty() => serde_json::Value::String(v.lexical()),
                Some(InputValue::List(vs)) if !vs.is_empty() => {
                    serde_json::Value::Array(vs.iter().map(|v| serde_json::Value::String(v.lexical())).collect())
                }
                _ => continue,
            };
            material.insert(key.clone(), json);
        }
        material
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{iri, ASSET};

    fn entry() -> PredicateEntry {
        PredicateEntry::new("release_date", iri(ASSET, "release_date")).typed(Datatype::DateTime)
    }

    #[test]
    fn test_bind_with_value() {
        let v = Value::parse_as("2021-01-01T00:00:00Z", Datatype::DateTime);
        assert_eq!(
            entry().bind("http://x.test#Software-1", Some(&v)),
            "<http://x.test#Software-1> <http://scap.nist.gov/ns/asset-identification#release_date> \"2021-01-01T00:00:00.000Z\"^^xsd:dateTime"
        );
    }

    #[test]
    fn test_bind_optional_variable() {
        assert_eq!(
            entry().bind_optional("?iri", None),
            "OPTIONAL { ?iri <http://scap.nist.gov/ns/asset-identification#release_date> ?release_date } ."
        );
    }

    #[test]
    fn test_sequence_path() {
        let e = PredicateEntry::new("label_name", "http://a.test#labels").via("http://a.test#name");
        assert_eq!(e.predicate_text(), "<http://a.test#labels>/<http://a.test#name>");
    }

    #[test]
    fn test_relation_targets() {
        let e = PredicateEntry::new("ip_address", iri(ASSET, "ip_address"))
            .multi()
            .relation("ipv4-addr", "IpV4Address")
            .relation("ipv6-addr", "IpV6Address");
        assert!(e.is_relation());
        assert_eq!(e.hint_key(), "ip_address_iri");
        assert_eq!(
            e.target_for_iri("http://x.test#IpV6Address-9").map(|t| t.entity_type.as_str()),
            Some("ipv6-addr")
        );
        assert!(e.target_for_iri("http://x.test#Port-9").is_none());
    }

    #[test]
    fn test_entity_iri_roundtrip() {
        let schema = EntitySchema::new("software", ASSET, "Software");
        let iri = schema.entity_iri("abc");
        assert_eq!(iri, "http://scap.nist.gov/ns/asset-identification#Software-abc");
        assert_eq!(schema.id_from_iri(&format!("<{}>", iri)), Some("abc"));
        assert!(iri.contains(&schema.discriminator()));
    }
}
