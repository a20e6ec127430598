//! predmap-compile - print the SPARQL a request compiles to
//!
//! Reads one JSON request (from a file, or stdin when the path is `-` or
//! missing) and writes the compiled query or update statements to stdout.
//! Nothing is sent to a store.
//!
//! Usage:
//!   predmap-compile [request.json] [--config predmap.toml]
//!
//! Example request:
//!   {"cmd": "select", "entityType": "software", "id": "…", "select": ["name"]}

use std::io::Read;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use predmap::identity;
use predmap::query::{Projection, SelectQuery, Statement};
use predmap::schema::{EntityType, Registry};
use predmap::{Delta, EngineConfig, Input};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
enum Request {
    Select {
        #[serde(rename = "entityType")]
        entity_type: String,
        id: Option<String>,
        iri: Option<String>,
        #[serde(default)]
        select: Vec<String>,
    },
    List {
        #[serde(rename = "entityType")]
        entity_type: String,
        #[serde(default)]
        select: Vec<String>,
    },
    Insert {
        #[serde(rename = "entityType")]
        entity_type: String,
        input: Input,
    },
    Update {
        #[serde(rename = "entityType")]
        entity_type: String,
        id: String,
        deltas: Vec<Delta>,
    },
    Delete {
        #[serde(rename = "entityType")]
        entity_type: String,
        id: String,
    },
    Attach {
        #[serde(rename = "entityType")]
        entity_type: String,
        id: String,
        field: String,
        targets: Vec<String>,
    },
    Detach {
        #[serde(rename = "entityType")]
        entity_type: String,
        id: String,
        field: String,
        targets: Vec<String>,
    },
}

// ============================================================================
// Compilation
// ============================================================================

fn select_query(et: &dyn EntityType, select: &[String], config: &EngineConfig, subject: Option<(&str, bool)>) -> String {
    let schema = et.schema();
    let select: Vec<&str> = select.iter().map(String::as_str).collect();
    let projection = Projection::build(schema, &select, &[], None);
    let query = match subject {
        Some((iri, true)) => SelectQuery::by_iri(schema, iri, &projection, &config.point_context),
        Some((id, false)) => SelectQuery::by_id(schema, id, &projection, &config.point_context),
        None => SelectQuery::scan(schema, &projection, &config.scan_context),
    };
    format!("# {}\n{}", query.label(), query.to_sparql())
}

fn link_statements(et: &dyn EntityType, id: &str, field: &str, targets: &[String], attach: bool) -> anyhow::Result<Vec<Statement>> {
    identity::check_id(id)?;
    for target in targets {
        identity::check_iri(target)?;
    }
    let schema = et.schema();
    let entry = schema.require_entry(field)?;
    if !entry.is_relation() {
        bail!("'{}' of {} is not a relationship", field, schema.name());
    }
    let [predicate] = entry.path() else {
        bail!("'{}' is stored behind a predicate path", field);
    };
    let iri = schema.entity_iri(id);
    Ok(vec![if attach {
        Statement::attach(&iri, predicate, targets)
    } else {
        Statement::detach(&iri, predicate, targets)
    }])
}

fn compile(request: Request, registry: &Registry, config: &EngineConfig) -> anyhow::Result<String> {
    let statements = match request {
        Request::Select {
            entity_type,
            id,
            iri,
            select,
        } => {
            let et = registry.get(&entity_type)?;
            if let Some(iri) = &iri {
                identity::check_iri(iri)?;
            }
            if let Some(id) = &id {
                identity::check_id(id)?;
            }
            let subject = match (&iri, &id) {
                (Some(iri), _) => Some((iri.as_str(), true)),
                (None, Some(id)) => Some((id.as_str(), false)),
                (None, None) => None,
            };
            return Ok(select_query(et, &select, config, subject));
        }
        Request::List { entity_type, select } => {
            return Ok(select_query(registry.get(&entity_type)?, &select, config, None));
        }
        Request::Insert { entity_type, input } => {
            let et = registry.get(&entity_type)?;
            let input = input.normalized();
            let (id, iri) = identity::entity_iri(et, &input)?;
            let mut statements = vec![Statement::insert_entity(et, &id, &input, chrono::Utc::now())?];
            if et.schema().is_inventory_scoped() {
                statements.push(Statement::add_to_inventory(&iri));
            }
            statements
        }
        Request::Update {
            entity_type,
            id,
            deltas,
        } => {
            identity::check_id(&id)?;
            let schema = registry.get(&entity_type)?.schema();
            let iri = schema.entity_iri(&id);
            let mut statements = Vec::with_capacity(deltas.len() + 1);
            for delta in &deltas {
                let entry = schema.require_entry(&delta.key)?;
                // No existing entity to inspect, so an unspecified operation replaces
                let operation = delta.operation.unwrap_or(predmap::input::EditOperation::Replace);
                statements.push(Statement::update_field(&iri, entry, operation, &delta.value)?);
            }
            if schema.has_timestamps() {
                statements.push(Statement::touch(&iri, chrono::Utc::now()));
            }
            statements
        }
        Request::Delete { entity_type, id } => {
            identity::check_id(&id)?;
            let schema = registry.get(&entity_type)?.schema();
            let iri = schema.entity_iri(&id);
            let mut statements = Vec::new();
            if schema.is_inventory_scoped() {
                statements.push(Statement::remove_from_inventory(&iri));
            }
            statements.push(Statement::drop_entity(&iri, schema.class_iri()));
            statements
        }
        Request::Attach {
            entity_type,
            id,
            field,
            targets,
        } => link_statements(registry.get(&entity_type)?, &id, &field, &targets, true)?,
        Request::Detach {
            entity_type,
            id,
            field,
            targets,
        } => link_statements(registry.get(&entity_type)?, &id, &field, &targets, false)?,
    };

    Ok(statements
        .iter()
        .map(Statement::to_sparql)
        .collect::<Vec<_>>()
        .join("\n;\n"))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: predmap-compile [request.json|-] [--config <path>]");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  request.json   JSON request (default: stdin)");
        eprintln!("  --config       TOML engine configuration");
        return Ok(());
    }

    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .map(|i| args.get(i + 1).context("--config needs a path"))
        .transpose()?;
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default().with_env_overrides()?,
    };

    let input_path = args
        .iter()
        .skip(1)
        .enumerate()
        .find(|(i, a)| !a.starts_with("--") && (*i == 0 || args[*i] != "--config"))
        .map(|(_, a)| a.as_str());
    let raw = match input_path {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?,
    };

    let request: Request = serde_json::from_str(&raw).context("malformed request")?;
    tracing::debug!(?request, "compiling");
    let registry = Registry::standard();
    println!("{}", compile(request, &registry, &config)?);
    Ok(())
}
