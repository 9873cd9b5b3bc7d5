//! Load-run configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one reconciliation or load run against a production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Production release name, e.g. "fuji" or "iron".
    pub production: String,
    /// Rows per insert chunk when bulk-loading.
    pub chunk_size: usize,
    /// Optional cap on rows loaded per table, for dry runs.
    pub max_rows: Option<usize>,
    /// Where the incremental-load tile cache lives; `None` disables caching
    /// and every tile is treated as new.
    pub cache_path: Option<PathBuf>,
    /// Allow patch artifacts to replace files from an earlier run.
    pub overwrite_artifacts: bool,
}

impl ProductionConfig {
    pub fn new(production: &str) -> ProductionConfig {
        ProductionConfig {
            production: production.to_string(),
            chunk_size: 50_000,
            max_rows: None,
            cache_path: None,
            overwrite_artifacts: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_overwrite_artifacts(mut self, overwrite: bool) -> Self {
        self.overwrite_artifacts = overwrite;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.production.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "production",
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                value: "0".to_string(),
                reason: "chunk size must be positive".to_string(),
            });
        }
        if self.max_rows == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_rows",
                value: "0".to_string(),
                reason: "row cap must be positive when set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProductionConfig::new("iron").validate().is_ok());
    }

    #[test]
    fn test_invalid_configs_rejected() {
        assert!(ProductionConfig::new("").validate().is_err());
        assert!(ProductionConfig::new("iron")
            .with_chunk_size(0)
            .validate()
            .is_err());
        assert!(ProductionConfig::new("iron")
            .with_max_rows(0)
            .validate()
            .is_err());
    }
}
