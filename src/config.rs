//! Engine configuration
//!
//! ```toml
//! db_name = "cyio"
//! point_context = "tag:stardog:api:context:local"
//! scan_context = "tag:stardog:api:context:named"
//! atomicity = "compensating"
//! skip_missing_id = true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, Result};
use crate::vocab::{CONTEXT_LOCAL, CONTEXT_NAMED};

pub const ENV_DB_NAME: &str = "PREDMAP_DB_NAME";
pub const ENV_ATOMICITY: &str = "PREDMAP_ATOMICITY";

/// What happens when a multi-step mutation fails partway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atomicity {
    /// Applied steps stay applied; the error lists them
    #[default]
    BestEffort,
    /// Applied steps are undone in reverse order before the error returns
    Compensating,
}

impl std::str::FromStr for Atomicity {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(Atomicity::BestEffort),
            "compensating" => Ok(Atomicity::Compensating),
            other => Err(MapperError::Config(format!("unknown atomicity '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database passed on every store call
    pub db_name: String,
    /// Dataset for point lookups
    pub point_context: String,
    /// Dataset for scan lookups
    pub scan_context: String,
    pub atomicity: Atomicity,
    /// Skip list candidates that carry no `id`
    pub skip_missing_id: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            db_name: "cyio".to_string(),
            point_context: CONTEXT_LOCAL.to_string(),
            scan_context: CONTEXT_NAMED.to_string(),
            atomicity: Atomicity::BestEffort,
            skip_missing_id: true,
        }
    }
}

impl EngineConfig {
    /// Read a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| MapperError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)?.with_env_overrides()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| MapperError::Config(e.to_string()))
    }

    /// Apply `PREDMAP_DB_NAME` and `PREDMAP_ATOMICITY` when set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(db) = lookup(ENV_DB_NAME).filter(|v| !v.is_empty()) {
            self.db_name = db;
        }
        if let Some(mode) = lookup(ENV_ATOMICITY).filter(|v| !v.is_empty()) {
            self.atomicity = mode.parse()?;
        }
        Ok(self)
    }

    pub fn with_atomicity(mut self, atomicity: Atomicity) -> Self {
        self.atomicity = atomicity;
        self
    }

    pub fn with_db_name(mut self, db_name: &str) -> Self {
        self.db_name = db_name.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.point_context, "tag:stardog:api:context:local");
        assert_eq!(config.atomicity, Atomicity::BestEffort);
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "db_name = \"assets\"\natomicity = \"compensating\"\nskip_missing_id = false").unwrap();
        let config = EngineConfig::from_toml_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.db_name, "assets");
        assert_eq!(config.atomicity, Atomicity::Compensating);
        assert!(!config.skip_missing_id);
        assert!(EngineConfig::load(file.path()).is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, MapperError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::default()
            .with_overrides(|name| match name {
                ENV_DB_NAME => Some("other".to_string()),
                ENV_ATOMICITY => Some("Compensating".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.db_name, "other");
        assert_eq!(config.atomicity, Atomicity::Compensating);

        let bad = EngineConfig::default().with_overrides(|name| (name == ENV_ATOMICITY).then(|| "sometimes".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("atomicity = \"maybe\""),
            Err(MapperError::Config(_))
        ));
    }
}
