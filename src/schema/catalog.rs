//! Standard entity-type catalog
//!
//! Field catalogs are configuration: each type is a schema plus, for a few
//! types, input-dependent class and object_type derivation.

use std::sync::Arc;

use crate::error::{MapperError, Result};
use crate::input::Input;
use crate::schema::{EntitySchema, EntityType, PredicateEntry};
use crate::value::Datatype;
use crate::vocab::{common_namespace, iri, oscal_namespace, ASSET, COMMON, OSCAL, SCO_NAMESPACE};

/// Entity type described entirely by its schema
#[derive(Debug)]
pub struct SchemaType(pub EntitySchema);

impl EntityType for SchemaType {
    fn schema(&self) -> &EntitySchema {
        &self.0
    }
}

/// Software assets: asset_type selects the concrete class
#[derive(Debug)]
pub struct SoftwareType(pub EntitySchema);

impl EntityType for SoftwareType {
    fn schema(&self) -> &EntitySchema {
        &self.0
    }

    fn object_type(&self, input: &Input) -> Result<String> {
        Ok(software_kind(input)?.0.to_string())
    }

    fn extra_classes(&self, input: &Input) -> Result<Vec<String>> {
        Ok(software_kind(input)?
            .1
            .map(|class| vec![iri(ASSET, class)])
            .unwrap_or_default())
    }
}

fn software_kind(input: &Input) -> Result<(&'static str, Option<&'static str>)> {
    match input.str_value("asset_type").as_deref() {
        None | Some("software") => Ok(("software", None)),
        Some("operating-system") | Some("operating_system") => Ok(("operating-system", Some("OperatingSystem"))),
        Some("application-software") | Some("application_software") => {
            Ok(("application-software", Some("ApplicationSoftware")))
        }
        Some(other) => Err(MapperError::InvalidInput(format!("Unsupported software type '{}'", other))),
    }
}

/// Parties: party_type becomes an additional class (person → Person)
#[derive(Debug)]
pub struct PartyType(pub EntitySchema);

impl EntityType for PartyType {
    fn schema(&self) -> &EntitySchema {
        &self.0
    }

    fn extra_classes(&self, input: &Input) -> Result<Vec<String>> {
        let party_type = input
            .str_value("party_type")
            .ok_or_else(|| MapperError::InvalidInput("party_type is required".into()))?;
        let mut chars = party_type.chars();
        let class = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => return Ok(Vec::new()),
        };
        Ok(vec![iri(OSCAL, &class)])
    }
}

fn common(local: &str) -> String {
    iri(COMMON, local)
}

fn asset(local: &str) -> String {
    iri(ASSET, local)
}

fn oscal(local: &str) -> String {
    iri(OSCAL, local)
}

/// Fields every stored object carries
fn object_fields() -> Vec<PredicateEntry> {
    vec![
        PredicateEntry::new("id", common("id")),
        PredicateEntry::new("object_type", common("object_type")),
        PredicateEntry::new("created", common("created")).typed(Datatype::DateTime),
        PredicateEntry::new("modified", common("modified")).typed(Datatype::DateTime),
        PredicateEntry::new("labels", common("labels")).multi().relation("label", "Label"),
        PredicateEntry::new("label_name", common("labels")).via(common("name")).multi(),
        PredicateEntry::new("notes", common("notes")).multi().relation("note", "Note"),
        PredicateEntry::new("external_references", common("external_references"))
            .multi()
            .relation("external-reference", "ExternalReference"),
    ]
}

/// Fields shared by every IT asset
fn it_asset_fields() -> Vec<PredicateEntry> {
    let mut fields = object_fields();
    fields.extend([
        PredicateEntry::new("asset_id", asset("asset_id")),
        PredicateEntry::new("name", asset("name")),
        PredicateEntry::new("description", asset("description")),
        PredicateEntry::new("locations", asset("locations")).multi().relation("location", "Location"),
        PredicateEntry::new("location_name", asset("locations")).via(common("name")).multi(),
        PredicateEntry::new("responsible_parties", asset("responsible_parties"))
            .multi()
            .relation("responsible-party", "ResponsibleParty"),
        PredicateEntry::new("asset_type", asset("asset_type")),
        PredicateEntry::new("asset_tag", asset("asset_tag")),
        PredicateEntry::new("serial_number", asset("serial_number")),
        PredicateEntry::new("vendor_name", asset("vendor_name")),
        PredicateEntry::new("version", asset("version")),
        PredicateEntry::new("release_date", asset("release_date")).typed(Datatype::DateTime),
        PredicateEntry::new("implementation_point", asset("implementation_point")),
        PredicateEntry::new("operational_status", asset("operational_status")),
        PredicateEntry::new("is_publicly_accessible", asset("is_publicly_accessible")).typed(Datatype::Boolean),
        PredicateEntry::new("is_scanned", asset("is_scanned")).typed(Datatype::Boolean),
        PredicateEntry::new("last_scanned", asset("last_scanned")).typed(Datatype::DateTime),
    ]);
    fields
}

fn software_fields() -> Vec<PredicateEntry> {
    vec![
        PredicateEntry::new("function", asset("function")),
        PredicateEntry::new("cpe_identifier", asset("cpe_identifier")),
        PredicateEntry::new("software_identifier", asset("software_identifier")),
        PredicateEntry::new("patch", asset("patch_level")),
        PredicateEntry::new("installation_id", asset("installation_id")),
        PredicateEntry::new("license_key", asset("license_key")),
    ]
}

fn hardware_fields() -> Vec<PredicateEntry> {
    vec![
        PredicateEntry::new("function", asset("function")),
        PredicateEntry::new("cpe_identifier", asset("cpe_identifier")),
        PredicateEntry::new("model", asset("model")),
        PredicateEntry::new("motherboard_id", asset("motherboard_id")),
        PredicateEntry::new("installation_id", asset("installation_id")),
        PredicateEntry::new("baseline_configuration_name", asset("baseline_configuration_name")),
        PredicateEntry::new("installed_hardware", asset("installed_hardware"))
            .multi()
            .relation("hardware", "Hardware"),
    ]
}

fn asset_classes() -> Vec<String> {
    vec![asset("ItAsset"), asset("Asset"), common("Object")]
}

fn software() -> EntitySchema {
    software_schema("software")
}

fn software_schema(name: &str) -> EntitySchema {
    EntitySchema::new(name, ASSET, "Software")
        .superclasses(&[oscal("Component")])
        .superclasses(&asset_classes())
        .id_namespace(SCO_NAMESPACE)
        .id_field("name", "name")
        .id_field("cpe_identifier", "cpe")
        .id_field("software_identifier", "swid")
        .id_field("vendor_name", "vendor")
        .id_field("version", "version")
        .inventory_scoped()
        .fields(it_asset_fields())
        .fields(software_fields())
}

/// Operating systems share the Software IRI space and are queried by class
fn operating_system() -> EntitySchema {
    software_schema("operating-system")
        .class(asset("OperatingSystem"))
        .superclasses(&[asset("Software")])
}

fn hardware() -> EntitySchema {
    EntitySchema::new("hardware", ASSET, "Hardware")
        .superclasses(&[oscal("Component")])
        .superclasses(&asset_classes())
        .id_namespace(SCO_NAMESPACE)
        .id_field("name", "name")
        .id_field("cpe_identifier", "cpe")
        .id_field("vendor_name", "vendor")
        .id_field("model", "model")
        .id_field("serial_number", "serial_number")
        .inventory_scoped()
        .fields(it_asset_fields())
        .fields(hardware_fields())
}

fn computing_device() -> EntitySchema {
    EntitySchema::new("computing-device", ASSET, "ComputingDevice")
        .superclasses(&[asset("Hardware"), oscal("InventoryItem")])
        .superclasses(&asset_classes())
        .id_namespace(SCO_NAMESPACE)
        .id_field("name", "name")
        .id_field("fqdn", "fqdn")
        .id_field("hostname", "hostname")
        .id_field("serial_number", "serial_number")
        .inventory_scoped()
        .fields(it_asset_fields())
        .fields(hardware_fields())
        .fields(vec![
            PredicateEntry::new("bios_id", asset("bios_id")),
            PredicateEntry::new("fqdn", asset("fqdn")),
            PredicateEntry::new("hostname", asset("hostname")),
            PredicateEntry::new("netbios_name", asset("netbios_name")),
            PredicateEntry::new("network_id", asset("network_id")),
            PredicateEntry::new("default_gateway", asset("default_gateway")),
            PredicateEntry::new("vlan_id", asset("vlan_id")),
            PredicateEntry::new("uri", asset("uri")).typed(Datatype::AnyUri),
            PredicateEntry::new("is_virtual", asset("is_virtual")).typed(Datatype::Boolean),
            PredicateEntry::new("installed_software", asset("installed_software"))
                .multi()
                .relation("software", "Software"),
            PredicateEntry::new("installed_operating_system", asset("installed_operating_system"))
                .relation("operating-system", "Software"),
            PredicateEntry::new("ip_address", asset("ip_address"))
                .multi()
                .relation("ipv4-addr", "IpV4Address")
                .relation("ipv6-addr", "IpV6Address"),
            PredicateEntry::new("mac_address", asset("mac_address"))
                .multi()
                .relation("mac-addr", "MACAddress"),
            PredicateEntry::new("ports", asset("ports")).multi().relation("port", "Port"),
            PredicateEntry::new("connected_to_network", asset("connected_to_network"))
                .relation("network", "Network"),
        ])
        .owns("ports", "ports", "port", None)
        .owns("ipv4_address", "ip_address", "ipv4-addr", Some("ip_address_value"))
        .owns("ipv6_address", "ip_address", "ipv6-addr", Some("ip_address_value"))
        .owns("mac_address", "mac_address", "mac-addr", Some("mac_address_value"))
}

fn network() -> EntitySchema {
    EntitySchema::new("network", ASSET, "Network")
        .superclasses(&asset_classes())
        .id_namespace(SCO_NAMESPACE)
        .id_field("name", "name")
        .id_field("network_id", "network_id")
        .inventory_scoped()
        .fields(it_asset_fields())
        .fields(vec![
            PredicateEntry::new("network_id", asset("network_id")),
            PredicateEntry::new("network_name", asset("network_name")),
            PredicateEntry::new("is_scanned", asset("is_scanned")).typed(Datatype::Boolean),
            PredicateEntry::new("network_address_range", asset("network_address_range"))
                .relation("ip-address-range", "IpAddressRange"),
        ])
}

fn port() -> EntitySchema {
    EntitySchema::new("port", ASSET, "Port")
        .superclasses(&[common("ComplexDatatype")])
        .id_namespace(common_namespace())
        .id_field("port_number", "port_number")
        .id_field("protocols", "protocols")
        .without_timestamps()
        .fields(vec![
            PredicateEntry::new("id", common("id")),
            PredicateEntry::new("object_type", common("object_type")),
            PredicateEntry::new("port_number", asset("port_number")).typed(Datatype::Integer),
            PredicateEntry::new("protocols", asset("protocols")).multi(),
        ])
}

fn ip_address(name: &str, segment: &str) -> EntitySchema {
    EntitySchema::new(name, ASSET, segment)
        .superclasses(&[asset("IpAddress"), common("ComplexDatatype")])
        .id_namespace(common_namespace())
        .id_field("ip_address_value", "value")
        .fields(vec![
            PredicateEntry::new("id", common("id")),
            PredicateEntry::new("object_type", common("object_type")),
            PredicateEntry::new("created", common("created")).typed(Datatype::DateTime),
            PredicateEntry::new("modified", common("modified")).typed(Datatype::DateTime),
            PredicateEntry::new("ip_address_value", asset("ip_address_value")),
        ])
}

fn mac_address() -> EntitySchema {
    EntitySchema::new("mac-addr", ASSET, "MACAddress")
        .superclasses(&[common("ComplexDatatype")])
        .id_namespace(common_namespace())
        .id_field("mac_address_value", "value")
        .fields(vec![
            PredicateEntry::new("id", common("id")),
            PredicateEntry::new("object_type", common("object_type")),
            PredicateEntry::new("created", common("created")).typed(Datatype::DateTime),
            PredicateEntry::new("modified", common("modified")).typed(Datatype::DateTime),
            PredicateEntry::new("mac_address_value", asset("mac_address_value")),
            PredicateEntry::new("is_virtual", asset("is_virtual")).typed(Datatype::Boolean),
        ])
}

/// Fields every OSCAL object carries
fn oscal_object_fields() -> Vec<PredicateEntry> {
    vec![
        PredicateEntry::new("id", common("id")),
        PredicateEntry::new("object_type", common("object_type")),
        PredicateEntry::new("created", common("created")).typed(Datatype::DateTime),
        PredicateEntry::new("modified", common("modified")).typed(Datatype::DateTime),
        PredicateEntry::new("labels", common("labels")).multi().relation("label", "Label"),
        PredicateEntry::new("label_name", common("labels")).via(common("name")).multi(),
        PredicateEntry::new("links", oscal("links")).multi().relation("external-reference", "ExternalReference"),
        PredicateEntry::new("remarks", oscal("remarks")).multi().relation("note", "Note"),
        PredicateEntry::new("name", oscal("name")),
        PredicateEntry::new("description", oscal("description")),
    ]
}

fn oscal_classes() -> Vec<String> {
    vec![oscal("Object"), common("Object")]
}

fn inventory_item() -> EntitySchema {
    EntitySchema::new("inventory-item", OSCAL, "InventoryItem")
        .superclasses(&oscal_classes())
        .id_namespace(oscal_namespace())
        .id_field("name", "name")
        .id_field("methods", "methods")
        .fields(oscal_object_fields())
        .fields(vec![
            PredicateEntry::new("asset_id", asset("asset_id")),
            PredicateEntry::new("asset_type", asset("asset_type")),
            PredicateEntry::new("asset_tag", asset("asset_tag")),
            PredicateEntry::new("serial_number", asset("serial_number")),
            PredicateEntry::new("vendor_name", asset("vendor_name")),
            PredicateEntry::new("version", asset("version")),
            PredicateEntry::new("fqdn", asset("fqdn")),
            PredicateEntry::new("hostname", asset("hostname")),
            PredicateEntry::new("allows_authenticated_scan", asset("allows_authenticated_scan"))
                .typed(Datatype::Boolean),
            PredicateEntry::new("is_publicly_accessible", asset("is_publicly_accessible")).typed(Datatype::Boolean),
            PredicateEntry::new("is_scanned", asset("is_scanned")).typed(Datatype::Boolean),
            PredicateEntry::new("last_scanned", asset("last_scanned")).typed(Datatype::DateTime),
            PredicateEntry::new("responsible_parties", oscal("responsible_parties"))
                .multi()
                .relation("responsible-party", "ResponsibleParty"),
            PredicateEntry::new("implemented_components", oscal("implemented_components"))
                .multi()
                .relation("software", "Software")
                .relation("hardware", "Hardware"),
            PredicateEntry::new("locations", asset("locations")).multi().relation("location", "Location"),
        ])
}

fn location() -> EntitySchema {
    EntitySchema::new("location", OSCAL, "Location")
        .superclasses(&oscal_classes())
        .id_namespace(oscal_namespace())
        .id_field("name", "name")
        .id_field("location_type", "location_type")
        .id_field("location_class", "location_class")
        .default_type("oscal-location")
        .fields(oscal_object_fields())
        .fields(vec![
            PredicateEntry::new("location_type", oscal("location_type")),
            PredicateEntry::new("location_class", oscal("location_class")),
            PredicateEntry::new("address", oscal("address")).relation("address", "Address"),
            PredicateEntry::new("email_addresses", oscal("email_addresses")).multi(),
            PredicateEntry::new("telephone_numbers", oscal("telephone_numbers"))
                .multi()
                .relation("telephone-number", "TelephoneNumber"),
            PredicateEntry::new("urls", oscal("urls")).multi().typed(Datatype::AnyUri),
        ])
}

fn party() -> EntitySchema {
    EntitySchema::new("party", OSCAL, "Party")
        .superclasses(&oscal_classes())
        .id_namespace(oscal_namespace())
        .id_field("name", "name")
        .id_field("party_type", "party_type")
        .id_field("short_name", "short_name")
        .default_type("oscal-party")
        .fields(oscal_object_fields())
        .fields(vec![
            PredicateEntry::new("short_name", oscal("short_name")),
            PredicateEntry::new("party_type", oscal("party_type")),
            PredicateEntry::new("email_addresses", oscal("email_addresses")).multi(),
            PredicateEntry::new("locations", oscal("locations")).multi().relation("location", "Location"),
            PredicateEntry::new("member_of_organizations", oscal("member_of_organizations"))
                .multi()
                .relation("party", "Party"),
            PredicateEntry::new("mail_stop", oscal("mail_stop")),
            PredicateEntry::new("office", oscal("office")),
            PredicateEntry::new("job_title", oscal("job_title")),
        ])
}

fn role() -> EntitySchema {
    EntitySchema::new("role", OSCAL, "Role")
        .superclasses(&oscal_classes())
        .id_namespace(oscal_namespace())
        .id_field("role_identifier", "role_identifier")
        .default_type("oscal-role")
        .fields(oscal_object_fields())
        .fields(vec![
            PredicateEntry::new("short_name", oscal("short_name")),
            PredicateEntry::new("role_identifier", oscal("role_identifier")),
        ])
}

fn responsible_party() -> EntitySchema {
    EntitySchema::new("responsible-party", OSCAL, "ResponsibleParty")
        .superclasses(&[oscal("ComplexDatatype"), common("ComplexDatatype")])
        .id_namespace(oscal_namespace())
        .id_field("role", "role")
        .default_type("oscal-responsible-party")
        .without_timestamps()
        .fields(vec![
            PredicateEntry::new("id", common("id")),
            PredicateEntry::new("object_type", common("object_type")),
            PredicateEntry::new("labels", common("labels")).multi().relation("label", "Label"),
            PredicateEntry::new("links", oscal("links")).multi().relation("external-reference", "ExternalReference"),
            PredicateEntry::new("remarks", oscal("remarks")).multi().relation("note", "Note"),
            PredicateEntry::new("name", oscal("name")),
            PredicateEntry::new("description", oscal("description")),
            PredicateEntry::new("role", oscal("role")).relation("role", "Role"),
            PredicateEntry::new("role_identifier", oscal("role")).via(oscal("role_identifier")),
            PredicateEntry::new("parties", oscal("parties")).multi().relation("party", "Party"),
        ])
}

/// Every entity type of the standard catalog
pub fn standard_types() -> Vec<Arc<dyn EntityType>> {
    vec![
        Arc::new(SoftwareType(software())),
        Arc::new(SchemaType(operating_system())),
        Arc::new(SchemaType(hardware())),
        Arc::new(SchemaType(computing_device())),
        Arc::new(SchemaType(network())),
        Arc::new(SchemaType(port())),
        Arc::new(SchemaType(ip_address("ipv4-addr", "IpV4Address"))),
        Arc::new(SchemaType(ip_address("ipv6-addr", "IpV6Address"))),
        Arc::new(SchemaType(mac_address())),
        Arc::new(SchemaType(inventory_item())),
        Arc::new(SchemaType(location())),
        Arc::new(PartyType(party())),
        Arc::new(SchemaType(role())),
        Arc::new(SchemaType(responsible_party())),
    ]
}
