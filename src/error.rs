//! Error types for the query compiler and mutation engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Unsupported entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Field '{field}' is not registered for entity type '{entity_type}'")]
    UnknownField { entity_type: String, field: String },

    #[error("Entity does not exist with ID {id}")]
    NotFound { entity_type: String, id: String },

    #[error("{status_text} (status {status}, code {code}): {detail}")]
    Backend {
        status: u16,
        status_text: String,
        code: String,
        detail: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Mutation failed after {} completed step(s): {source}", completed.len())]
    PartialMutation {
        /// Labels of the store calls that were applied before the failure
        completed: Vec<String>,
        #[source]
        source: Box<MapperError>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl MapperError {
    /// Whether this error is (or wraps) a missing-identity error
    pub fn is_not_found(&self) -> bool {
        match self {
            MapperError::NotFound { .. } => true,
            MapperError::PartialMutation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Innermost error, unwrapping partial-mutation context
    pub fn root(&self) -> &MapperError {
        match self {
            MapperError::PartialMutation { source, .. } => source.root(),
            other => other,
        }
    }
}
