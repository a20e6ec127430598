//! Store client seam
//!
//! The engine talks to the triple store only through [`TripleStore`]: discrete
//! request/response calls against a named database, each tagged with a
//! human-readable label. Transport, retries and timeouts belong to the
//! implementation.

mod memory;

pub use memory::{MemoryStore, Quad};

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};
use crate::query::{SelectQuery, Statement};
use crate::reduce::Solution;

/// Entry points of the store protocol
pub trait TripleStore {
    /// Point lookup; returns zero or more solutions for one subject
    fn query_by_id(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>>;

    /// Scan lookup
    fn query_all(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>>;

    fn create(&self, db: &str, statement: &Statement, label: &str) -> Result<()>;

    fn edit(&self, db: &str, statement: &Statement, label: &str) -> Result<()>;

    fn delete(&self, db: &str, statement: &Statement, label: &str) -> Result<()>;
}

impl<T: TripleStore + ?Sized> TripleStore for &T {
    fn query_by_id(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>> {
        (**self).query_by_id(db, query, label)
    }

    fn query_all(&self, db: &str, query: &SelectQuery, label: &str) -> Result<Vec<Solution>> {
        (**self).query_all(db, query, label)
    }

    fn create(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        (**self).create(db, statement, label)
    }

    fn edit(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        (**self).edit(db, statement, label)
    }

    fn delete(&self, db: &str, statement: &Statement, label: &str) -> Result<()> {
        (**self).delete(db, statement, label)
    }
}

/// Object-shaped error response from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub body: ErrorBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: u16, status_text: &str) -> Self {
        ErrorResponse {
            status,
            status_text: status_text.to_string(),
            body: ErrorBody::default(),
        }
    }

    pub fn with_body(mut self, message: &str, code: &str) -> Self {
        self.body = ErrorBody {
            message: Some(message.to_string()),
            code: Some(code.to_string()),
        };
        self
    }
}

impl From<ErrorResponse> for MapperError {
    fn from(resp: ErrorResponse) -> Self {
        MapperError::Backend {
            detail: resp.body.message.unwrap_or_else(|| resp.status_text.clone()),
            code: resp.body.code.unwrap_or_else(|| "N/A".to_string()),
            status: resp.status,
            status_text: resp.status_text,
        }
    }
}
