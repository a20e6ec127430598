//! Query text compiler
//!
//! Turns a schema plus a projection into typed lookups ([`SelectQuery`]) and
//! writes ([`Statement`]). Both carry everything a store needs and render to
//! SPARQL text on demand.

mod projection;
mod select;
mod statement;

pub use projection::Projection;
pub use select::{SelectQuery, Subject};
pub use statement::{timestamp, Object, Statement, Triple};
