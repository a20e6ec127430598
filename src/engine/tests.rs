//! Engine scenarios over the in-memory store

use std::sync::Arc;

use super::*;
use crate::config::Atomicity;
use crate::error::MapperError;
use crate::input::{Delta, EditOperation, Input, InputValue};
use crate::page::{Filter, FilterMode, FilterOperator, OrderMode};
use crate::query::Statement;
use crate::store::{ErrorResponse, MemoryStore};
use crate::value::{FieldValue, Value};

const INVENTORY: &str = "http://csrc.nist.gov/ns/oscal/common#AssetInventory-default";

fn engine() -> Engine<MemoryStore> {
    Engine::with_store(MemoryStore::with_inventory(INVENTORY))
}

fn engine_on(store: MemoryStore, atomicity: Atomicity) -> Engine<MemoryStore> {
    Engine::new(
        store,
        Arc::new(Registry::standard()),
        EngineConfig::default().with_atomicity(atomicity),
    )
}

fn nginx() -> Input {
    Input::new()
        .with("name", "nginx")
        .with("version", "1.21")
        .with("vendor_name", "F5")
}

fn port(number: i64) -> Input {
    Input::new()
        .with("port_number", number)
        .with("protocols", vec!["tcp"])
}

fn device_with_ports() -> Input {
    Input::new()
        .with("name", "web-01")
        .with("ports", vec![port(443)])
}

// ============================================================================
// Reads
// ============================================================================

mod read_tests {
    use super::*;

    #[test]
    fn test_round_trip_fields() {
        let engine = engine();
        let created = engine.create("software", nginx()).unwrap();
        let id = created.id().unwrap().to_string();

        let narrow = engine
            .get("software", &id, &["name", "version", "vendor_name"])
            .unwrap()
            .unwrap();
        let keys: Vec<&str> = narrow.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name", "vendor_name", "version"]);

        let full = engine.get("software", &id, &[]).unwrap().unwrap();
        let bookkeeping = ["id", "object_type", "entity_type", "created", "modified"];
        let mut scalars: Vec<&str> = full
            .fields()
            .keys()
            .map(String::as_str)
            .filter(|k| !bookkeeping.contains(k))
            .collect();
        scalars.sort_unstable();
        assert_eq!(scalars, vec!["name", "vendor_name", "version"]);
        assert_eq!(full.get_str("entity_type"), Some("software"));
        assert!(full.hints().is_empty());
    }

    #[test]
    fn test_get_missing_is_none() {
        let engine = engine();
        assert!(engine.get("software", "nope", &[]).unwrap().is_none());
        assert!(matches!(
            engine.get("warp-drive", "x", &[]),
            Err(MapperError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn test_backend_error_surfaces() {
        let store = MemoryStore::new()
            .fail_queries(ErrorResponse::new(400, "Bad Request").with_body("Unknown database", "0D0DU2"));
        let engine = engine_on(store, Atomicity::BestEffort);
        match engine.get("software", "x", &[]) {
            Err(MapperError::Backend {
                status,
                status_text,
                code,
                detail,
            }) => {
                assert_eq!(status, 400);
                assert_eq!(status_text, "Bad Request");
                assert_eq!(code, "0D0DU2");
                assert_eq!(detail, "Unknown database");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_inventory_members_only() {
        let engine = engine();
        engine.create("software", nginx()).unwrap();
        // Written straight to the store, never linked into the inventory
        let stray = crate::identity::derive_id(engine.registry().get("software").unwrap(), &Input::new().with("name", "stray")).unwrap();
        let stmt = Statement::insert_entity(
            engine.registry().get("software").unwrap(),
            &stray,
            &Input::new().with("name", "stray"),
            chrono::Utc::now(),
        )
        .unwrap();
        engine.store().create("db", &stmt, "stray").unwrap();

        let page = engine.list("software", &["name"], &PageArgs::default()).unwrap();
        assert_eq!(page.page_info.global_count, 1);
        assert_eq!(page.edges[0].node.get_str("name"), Some("nginx"));
        assert_eq!(page.edges[0].cursor, page.edges[0].node.iri());
    }

    #[test]
    fn test_list_filter_by_entity_type() {
        let engine = engine();
        engine.create("software", nginx()).unwrap();
        engine
            .create(
                "software",
                Input::new().with("name", "Debian").with("version", "12").with("asset_type", "operating-system"),
            )
            .unwrap();

        let args = PageArgs::default()
            .filter(Filter::new("entity_type", &["software"], FilterOperator::Eq))
            .filter_mode(FilterMode::And);
        let page = engine.list("software", &["name"], &args).unwrap();
        let names: Vec<&str> = page.nodes().filter_map(|n| n.get_str("name")).collect();
        assert_eq!(names, vec!["nginx"]);
        assert_eq!(page.page_info.global_count, 1);
    }

    #[test]
    fn test_list_sorted_window() {
        let engine = engine();
        for name in ["delta", "alpha", "echo", "charlie", "bravo"] {
            engine
                .create("party", Input::new().with("name", name).with("party_type", "organization"))
                .unwrap();
        }
        let args = PageArgs::default().order_by("name", OrderMode::Asc).offset(1).first(2);
        let page = engine.list("party", &["name"], &args).unwrap();
        let names: Vec<&str> = page.nodes().filter_map(|n| n.get_str("name")).collect();
        assert_eq!(names, vec!["bravo", "charlie"]);
        assert!(page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
        assert_eq!(page.page_info.global_count, 5);
    }
}

// ============================================================================
// Mutations
// ============================================================================

mod mutation_tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent_in_identity() {
        let engine = engine();
        let a = engine.create("software", nginx()).unwrap();
        let b = engine.create("software", nginx().with("description", "")).unwrap();
        assert_eq!(a.iri(), b.iri());
        let page = engine.list("software", &["name"], &PageArgs::default()).unwrap();
        assert_eq!(page.edges.len(), 1);

        // A repeated create inserts a second created/modified pair into the
        // same graph; reads keep the first one written
        let created = crate::vocab::iri(crate::vocab::COMMON, "created");
        assert!((1..=2).contains(&engine.store().objects(a.iri(), &created).len()));
        let reread = engine.get("software", a.id().unwrap(), &["created"]).unwrap().unwrap();
        assert!(matches!(reread.get("created"), Some(FieldValue::One(_))));
        assert_eq!(reread.get("created"), a.get("created"));
        assert_eq!(b.get("created"), a.get("created"));
    }

    #[test]
    fn test_create_writes_classes_and_inventory() {
        let engine = engine();
        let os = engine
            .create("software", Input::new().with("name", "Debian").with("asset_type", "operating_system"))
            .unwrap();
        assert_eq!(os.get_str("object_type"), Some("operating-system"));
        let os_view = engine.get_by_iri("operating-system", os.iri(), &["name"]).unwrap();
        assert!(os_view.is_some());

        let labels: Vec<String> = engine.store().statements().into_iter().map(|(l, _)| l).collect();
        assert!(labels.last().unwrap().contains("to inventory"));
    }

    #[test]
    fn test_create_with_owned_children() {
        let engine = engine();
        let input = device_with_ports()
            .with("ipv4_address", vec!["10.0.0.1"])
            .with("ipv6_address", vec!["fe80::1"])
            .with("mac_address", vec!["00:1a:2b:3c:4d:5e"]);
        let device = engine.create("computing-device", input).unwrap();

        assert_eq!(device.hint("ports").len(), 1);
        assert_eq!(device.hint("ip_address").len(), 2);
        assert_eq!(device.hint("mac_address").len(), 1);
        for iri in device.hint("ports").into_iter().chain(device.hint("ip_address")) {
            assert!(engine.store().graph_exists(iri));
        }
    }

    #[test]
    fn test_unknown_reference_writes_nothing() {
        let engine = engine();
        let err = engine
            .create(
                "computing-device",
                device_with_ports().with("installed_software", vec!["does-not-exist"]),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(engine.store().statements().is_empty());
    }

    #[test]
    fn test_references_resolved_by_id() {
        let engine = engine();
        let software = engine.create("software", nginx()).unwrap();
        let device = engine
            .create(
                "computing-device",
                Input::new()
                    .with("name", "web-01")
                    .with("installed_software", InputValue::List(vec![Value::from(software.id().unwrap())])),
            )
            .unwrap();
        assert_eq!(device.hint("installed_software"), vec![software.iri()]);
    }

    #[test]
    fn test_edit_infers_operation() {
        let engine = engine();
        let created = engine.create("software", nginx()).unwrap();
        let id = created.id().unwrap().to_string();
        let before = engine.store().statements().len();

        let edited = engine
            .edit(
                "software",
                &id,
                &[Delta::new("version", "1.22"), Delta::new("description", "web server")],
            )
            .unwrap();
        assert_eq!(edited.get_str("version"), Some("1.22"));
        assert_eq!(edited.get_str("description"), Some("web server"));
        assert!(edited.get("modified").is_some());

        let applied: Vec<Statement> = engine.store().statements()[before..].iter().map(|(_, s)| s.clone()).collect();
        assert!(matches!(applied[0], Statement::Replace { .. }));
        assert!(matches!(applied[1], Statement::InsertData { .. }));
        assert!(matches!(&applied[2], Statement::Replace { predicate, .. } if predicate.ends_with("#modified")));
    }

    #[test]
    fn test_edit_remove_and_errors() {
        let engine = engine();
        let id = engine.create("software", nginx()).unwrap().id().unwrap().to_string();

        let edited = engine
            .edit(
                "software",
                &id,
                &[Delta {
                    key: "vendor_name".to_string(),
                    value: Vec::new(),
                    operation: Some(EditOperation::Remove),
                }],
            )
            .unwrap();
        assert!(edited.get("vendor_name").is_none());

        let err = engine.edit("software", "missing", &[Delta::new("version", "2")]).unwrap_err();
        assert_eq!(err.to_string(), "Entity does not exist with ID missing");
        assert!(matches!(
            engine.edit("software", &id, &[Delta::new("warp", "9")]),
            Err(MapperError::UnknownField { .. })
        ));
        assert!(matches!(
            engine.edit("software", &id, &[Delta::new("id", "other")]),
            Err(MapperError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_edit_rejected_delta_writes_nothing() {
        for atomicity in [Atomicity::BestEffort, Atomicity::Compensating] {
            let engine = engine_on(MemoryStore::with_inventory(INVENTORY), atomicity);
            let id = engine.create("software", nginx()).unwrap().id().unwrap().to_string();
            let writes = engine.store().statements().len();

            let err = engine
                .edit(
                    "software",
                    &id,
                    &[Delta::new("version", "9.9"), Delta::new("label_name", "x")],
                )
                .unwrap_err();
            assert!(matches!(err, MapperError::InvalidInput(_)), "{:?}", err);
            assert_eq!(engine.store().statements().len(), writes);

            let current = engine.get("software", &id, &["version"]).unwrap().unwrap();
            assert_eq!(current.get_str("version"), Some("1.21"));
        }
    }

    #[test]
    fn test_edit_store_failure_is_compensated() {
        // 1: owner insert, 2: inventory, 3: version update, 4: touch
        let store = MemoryStore::with_inventory(INVENTORY).fail_on_write(4);
        let engine = engine_on(store, Atomicity::Compensating);
        let id = engine.create("software", nginx()).unwrap().id().unwrap().to_string();

        let err = engine.edit("software", &id, &[Delta::new("version", "9.9")]).unwrap_err();
        assert!(matches!(err, MapperError::PartialMutation { ref completed, .. } if completed.len() == 1));
        let current = engine.get("software", &id, &["version"]).unwrap().unwrap();
        assert_eq!(current.get_str("version"), Some("1.21"));
    }

    #[test]
    fn test_unsafe_ids_and_iris_rejected() {
        let engine = engine();
        let device = engine.create("computing-device", Input::new().with("name", "web-01")).unwrap();
        let device_id = device.id().unwrap();
        let breakout = "x> ?p ?o } ; DROP ALL ; SELECT * WHERE { <y";

        let invalid = |r: &MapperError| matches!(r, MapperError::InvalidInput(_));
        assert!(invalid(&engine.get("software", breakout, &[]).unwrap_err()));
        assert!(invalid(&engine.get_by_iri("software", &format!("http://x.test#Software-{}", breakout), &[]).unwrap_err()));
        assert!(invalid(&engine.edit("software", breakout, &[Delta::new("version", "2")]).unwrap_err()));
        assert!(invalid(&engine.delete("software", breakout).unwrap_err()));
        assert!(invalid(
            &engine
                .attach("computing-device", breakout, "installed_software", &["http://x.test#Software-1"])
                .unwrap_err()
        ));

        let writes = engine.store().statements().len();
        let hostile_iri = "http://x.test#Software-1> } ; DROP ALL ; INSERT DATA { <z";
        assert!(invalid(
            &engine
                .attach("computing-device", device_id, "installed_software", &[hostile_iri])
                .unwrap_err()
        ));
        assert!(invalid(
            &engine
                .create(
                    "computing-device",
                    Input::new().with("name", "web-02").with("installed_software", vec![hostile_iri]),
                )
                .unwrap_err()
        ));
        assert!(invalid(&engine.create("computing-device", Input::new().with("name", "web-03").with("installed_software", vec!["a b"])).unwrap_err()));
        assert_eq!(engine.store().statements().len(), writes);
    }

    #[test]
    fn test_delete_cascades() {
        let engine = engine();
        let device = engine
            .create("computing-device", device_with_ports().with("ipv4_address", vec!["10.0.0.1"]))
            .unwrap();
        let id = device.id().unwrap().to_string();
        let children: Vec<String> = device
            .hint("ports")
            .into_iter()
            .chain(device.hint("ip_address"))
            .map(str::to_string)
            .collect();

        let report = engine.delete("computing-device", &id).unwrap();
        assert_eq!(report.removed_children.len(), 2);
        assert!(!engine.store().graph_exists(device.iri()));
        for child in &children {
            assert!(!engine.store().graph_exists(child));
        }
        assert!(engine
            .list("computing-device", &[], &PageArgs::default())
            .unwrap()
            .is_empty());
        assert!(engine.delete("computing-device", &id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_attach_detach() {
        let engine = engine();
        let software = engine.create("software", nginx()).unwrap();
        let device = engine
            .create("computing-device", Input::new().with("name", "web-01"))
            .unwrap();
        let device_id = device.id().unwrap();

        engine
            .attach("computing-device", device_id, "installed_software", &[software.id().unwrap()])
            .unwrap();
        let linked = engine.get("computing-device", device_id, &["installed_software"]).unwrap().unwrap();
        assert_eq!(linked.hint("installed_software"), vec![software.iri()]);

        engine
            .detach("computing-device", device_id, "installed_software", &[software.iri()])
            .unwrap();
        let unlinked = engine.get("computing-device", device_id, &["installed_software"]).unwrap().unwrap();
        assert!(unlinked.hint("installed_software").is_empty());

        assert!(matches!(
            engine.attach("computing-device", device_id, "name", &["x"]),
            Err(MapperError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.attach("computing-device", device_id, "nonsense", &["x"]),
            Err(MapperError::UnknownField { .. })
        ));
    }
}

// ============================================================================
// Partial failure
// ============================================================================

mod atomicity_tests {
    use super::*;

    #[test]
    fn test_orphaned_child_when_attach_fails() {
        // 1: port graph, 2: device graph, 3: attach ports
        let engine = engine_on(MemoryStore::with_inventory(INVENTORY).fail_on_write(3), Atomicity::BestEffort);
        let err = engine.create("computing-device", device_with_ports()).unwrap_err();
        match &err {
            MapperError::PartialMutation { completed, source } => {
                assert_eq!(completed.len(), 2);
                assert!(matches!(**source, MapperError::Backend { status: 500, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }

        let port_type = engine.registry().get("port").unwrap();
        let (_, port_iri) = crate::identity::entity_iri(port_type, &port(443)).unwrap();
        assert!(engine.store().graph_exists(&port_iri));

        let device_type = engine.registry().get("computing-device").unwrap();
        let (device_id, _) = crate::identity::entity_iri(device_type, &device_with_ports().normalized()).unwrap();
        let device = engine.get("computing-device", &device_id, &["ports"]).unwrap().unwrap();
        assert!(device.hint("ports").is_empty());
    }

    #[test]
    fn test_orphaned_child_when_owner_insert_fails() {
        let engine = engine_on(MemoryStore::with_inventory(INVENTORY).fail_on_write(2), Atomicity::BestEffort);
        assert!(engine.create("computing-device", device_with_ports()).is_err());
        let graphs: Vec<String> = engine.store().quads().into_iter().map(|q| q.graph).collect();
        assert!(graphs.iter().any(|g| g.contains("#Port-")));
        assert!(!graphs.iter().any(|g| g.contains("#ComputingDevice-")));
    }

    #[test]
    fn test_compensation_removes_applied_steps() {
        let engine = engine_on(MemoryStore::with_inventory(INVENTORY).fail_on_write(3), Atomicity::Compensating);
        let err = engine.create("computing-device", device_with_ports()).unwrap_err();
        assert!(matches!(err, MapperError::PartialMutation { ref completed, .. } if completed.len() == 2));

        let graphs: Vec<String> = engine.store().quads().into_iter().map(|q| q.graph).collect();
        assert!(graphs.iter().all(|g| g == INVENTORY), "left behind: {:?}", graphs);
    }

    #[test]
    fn test_first_write_failure_is_plain() {
        let engine = engine_on(MemoryStore::with_inventory(INVENTORY).fail_on_write(1), Atomicity::Compensating);
        let err = engine.create("software", nginx()).unwrap_err();
        assert!(matches!(err, MapperError::Backend { .. }));
    }
}

// ============================================================================
// Relationship resolution
// ============================================================================

mod resolve_tests {
    use super::*;

    fn linked_device(engine: &Engine<MemoryStore>) -> Entity {
        let a = engine.create("software", nginx()).unwrap();
        let b = engine
            .create("software", Input::new().with("name", "openssl").with("version", "3.0"))
            .unwrap();
        engine
            .create(
                "computing-device",
                Input::new()
                    .with("name", "web-01")
                    .with("installed_software", vec![a.iri(), b.iri()])
                    .with("ipv4_address", vec!["10.0.0.1"])
                    .with("ipv6_address", vec!["fe80::1"]),
            )
            .unwrap()
    }

    #[test]
    fn test_resolve_hints() {
        let engine = engine();
        let device = linked_device(&engine);
        let software = engine.resolve(&device, "installed_software", &["name"]).unwrap();
        let mut names: Vec<&str> = software.iter().filter_map(|s| s.get_str("name")).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["nginx", "openssl"]);

        let addresses = engine.resolve(&device, "ip_address", &["ip_address_value"]).unwrap();
        let mut kinds: Vec<&str> = addresses.iter().map(|a| a.type_name()).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["ipv4-addr", "ipv6-addr"]);
    }

    #[test]
    fn test_resolve_skips_mistyped_hints() {
        let engine = engine();
        let device = engine.create("computing-device", device_with_ports()).unwrap();
        let port_iri = device.hint("ports")[0].to_string();
        engine
            .attach("computing-device", device.id().unwrap(), "installed_software", &[port_iri.as_str()])
            .unwrap();
        let device = engine.get_by_iri("computing-device", device.iri(), &[]).unwrap().unwrap();
        assert_eq!(device.hint("installed_software").len(), 1);

        let before = engine.store().query_count();
        assert!(engine.resolve(&device, "installed_software", &[]).unwrap().is_empty());
        assert_eq!(engine.store().query_count(), before);
        assert!(engine.resolve(&device, "connected_to_network", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_one_and_parallel() {
        let engine = engine();
        let device = linked_device(&engine);
        let sequential = engine.resolve(&device, "installed_software", &["name"]).unwrap();
        let parallel = engine.resolve_parallel(&device, "installed_software", &["name"]).unwrap();
        assert_eq!(sequential, parallel);

        assert!(engine.resolve_one(&device, "installed_operating_system", &[]).unwrap().is_none());
        assert!(matches!(
            engine.resolve(&device, "name", &[]),
            Err(MapperError::InvalidInput(_))
        ));
    }
}
