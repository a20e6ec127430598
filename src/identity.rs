//! Deterministic identifiers via UUIDv5

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::{MapperError, Result};
use crate::input::Input;
use crate::schema::EntityType;

/// Hash identifying material into `namespace`.
///
/// Material is serialized as canonical JSON (keys sorted, no whitespace), so
/// the same fields always give the same id regardless of input order.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use predmap::identity::generate_id;
///
/// let mut material = BTreeMap::new();
/// material.insert("name".to_string(), serde_json::json!("nginx"));
/// let a = generate_id(&material, uuid::Uuid::NAMESPACE_OID).unwrap();
/// let b = generate_id(&material, uuid::Uuid::NAMESPACE_OID).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn generate_id(material: &BTreeMap<String, serde_json::Value>, namespace: Uuid) -> Result<String> {
    if material.is_empty() {
        return Err(MapperError::InvalidInput("no identifying fields supplied".into()));
    }
    let canonical = serde_json::to_string(material)?;
    Ok(Uuid::new_v5(&namespace, canonical.as_bytes()).to_string())
}

/// Identifier of the entity `input` describes
pub fn derive_id(entity_type: &dyn EntityType, input: &Input) -> Result<String> {
    let material = entity_type.id_material(input);
    generate_id(&material, entity_type.schema().id_namespace_uuid()).map_err(|e| match e {
        MapperError::InvalidInput(_) => MapperError::InvalidInput(format!(
            "no identifying fields supplied for {} (expected one of: {})",
            entity_type.name(),
            entity_type
                .schema()
                .id_fields()
                .iter()
                .map(|f| f.field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
        other => other,
    })
}

fn forbidden_in_iri(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
}

/// Reject an identifier that cannot be embedded in an entity IRI
pub fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(MapperError::InvalidInput("identifier is empty".into()));
    }
    match id.chars().find(|c| forbidden_in_iri(*c)) {
        Some(c) => Err(MapperError::InvalidInput(format!(
            "identifier {:?} contains {:?}, which is not allowed in an IRI",
            id, c
        ))),
        None => Ok(()),
    }
}

/// Reject an IRI (with or without angle brackets) that would not render as
/// one `<...>` term
pub fn check_iri(iri: &str) -> Result<()> {
    let bare = crate::value::strip_angles(iri);
    if bare.is_empty() {
        return Err(MapperError::InvalidInput("IRI is empty".into()));
    }
    match bare.chars().find(|c| forbidden_in_iri(*c)) {
        Some(c) => Err(MapperError::InvalidInput(format!(
            "IRI {:?} contains {:?}, which is not allowed in an IRI",
            bare, c
        ))),
        None => Ok(()),
    }
}

/// Identifier and IRI together
pub fn entity_iri(entity_type: &dyn EntityType, input: &Input) -> Result<(String, String)> {
    let id = derive_id(entity_type, input)?;
    let iri = entity_type.schema().entity_iri(&id);
    Ok((id, iri))
}
