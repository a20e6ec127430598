//! Namespace and predicate constants shared by the catalog and the compiler

use uuid::Uuid;

/// Common object vocabulary (id, object_type, created, modified, labels)
pub const COMMON: &str = "http://darklight.ai/ns/common#";

/// Asset identification vocabulary (software, hardware, devices, addresses)
pub const ASSET: &str = "http://scap.nist.gov/ns/asset-identification#";

/// OSCAL common vocabulary (parties, roles, locations, inventory)
pub const OSCAL: &str = "http://csrc.nist.gov/ns/oscal/common#";

/// XML Schema datatypes
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const ID: &str = "http://darklight.ai/ns/common#id";
pub const OBJECT_TYPE: &str = "http://darklight.ai/ns/common#object_type";
pub const CREATED: &str = "http://darklight.ai/ns/common#created";
pub const MODIFIED: &str = "http://darklight.ai/ns/common#modified";

pub const ASSET_INVENTORY: &str = "http://csrc.nist.gov/ns/oscal/common#AssetInventory";
pub const INVENTORY_ASSETS: &str = "http://csrc.nist.gov/ns/oscal/common#assets";

/// Dataset contexts understood by the store
pub const CONTEXT_LOCAL: &str = "tag:stardog:api:context:local";
pub const CONTEXT_NAMED: &str = "tag:stardog:api:context:named";

/// Namespace for cyber-observable identities (STIX 2.1 SCO namespace)
pub const SCO_NAMESPACE: Uuid = Uuid::from_u128(0x00abedb4_aa42_466c_9c01_fed23315a9b7);

/// Namespace for OSCAL-modelled objects
pub fn oscal_namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, OSCAL.as_bytes())
}

/// Namespace for internal sub-objects (ports, addresses)
pub fn common_namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, COMMON.as_bytes())
}

/// Build a full IRI from a namespace and a local name
pub fn iri(namespace: &str, local: &str) -> String {
    format!("{}{}", namespace, local)
}
