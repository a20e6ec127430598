//! predmap - predicate-map query compiler and object reducer for RDF asset inventories
//!
//! # Architecture
//!
//! - **Predicate maps**: per entity type, logical field name → predicate path
//! - **Query compiler**: projections become SPARQL SELECTs with OPTIONAL patterns
//! - **Reducer**: flat solution rows grouped by subject into typed objects
//! - **Pager**: in-memory sort, filter and offset/limit over reduced objects
//! - **Mutations**: create/edit/delete as ordered store calls with optional compensation
//! - **Deterministic IDs**: UUIDv5 over canonical identifying fields
//!
//! # Usage example
//!
//! ```no_run
//! use predmap::{Engine, Input, MemoryStore, PageArgs};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::with_store(MemoryStore::new());
//!
//! let created = engine.create(
//!     "software",
//!     Input::new().with("name", "nginx").with("version", "1.21"),
//! )?;
//! println!("created {}", created.iri());
//!
//! let page = engine.list("software", &["name", "version"], &PageArgs::default().first(10))?;
//! println!("{} of {}", page.edges.len(), page.page_info.global_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod input;
pub mod page;
pub mod query;
pub mod reduce;
pub mod schema;
pub mod store;
pub mod value;
pub mod vocab;

pub use config::{Atomicity, EngineConfig};
pub use engine::{Engine, MutationReport};
pub use error::{MapperError, Result};
pub use input::{Delta, EditOperation, Input, InputValue};
pub use page::{Connection, Edge, Filter, FilterMode, FilterOperator, OrderMode, PageArgs, PageInfo};
pub use reduce::Entity;
pub use schema::{EntitySchema, EntityType, Registry};
pub use store::{ErrorResponse, MemoryStore, TripleStore};
pub use value::{Datatype, FieldValue, Term, Value};
