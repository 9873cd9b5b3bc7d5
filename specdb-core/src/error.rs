//! Error types for specdb operations

use thiserror::Error;

/// Failure to parse a label string (survey, program, camera, ...).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unrecognized {kind} label: '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub fn new(kind: &'static str, value: &str) -> ParseLabelError {
        ParseLabelError {
            kind,
            value: value.to_string(),
        }
    }
}

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Row not found in {table}: key {key}")]
    NotFound { table: &'static str, key: String },

    #[error("Unique constraint violated in {table}: key {key}")]
    UniqueViolation { table: &'static str, key: String },

    #[error("Insert into {table} failed: {reason}")]
    InsertFailed { table: &'static str, reason: String },

    #[error("Update of {table} key {key} failed: {reason}")]
    UpdateFailed {
        table: &'static str,
        key: String,
        reason: String,
    },

    #[error("Transaction failed on {table}: {reason}")]
    TransactionFailed { table: &'static str, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Load sequencing and consistency-pass errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Stage {stage} for tile {tileid} requires {missing} rows to be loaded first")]
    MissingPrecondition {
        stage: &'static str,
        tileid: i32,
        missing: &'static str,
    },

    #[error("Target {targetid} ({survey}/{program}) was flagged anomalous but has no assignment rows")]
    RepairPrecondition {
        targetid: i64,
        survey: crate::Survey,
        program: crate::Program,
    },

    #[error("Primary selection tie could not be broken for target {targetid}")]
    TieExhausted { targetid: i64 },

    #[error("Tile cache at {path} could not be read: {reason}")]
    CacheUnreadable { path: String, reason: String },

    #[error("Tile cache at {path} could not be written: {reason}")]
    CacheWriteFailed { path: String, reason: String },
}

/// Malformed column batches from the record-conversion side.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Column {column} has {actual} rows, batch has {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("No column named {column} in batch")]
    UnknownColumn { column: String },

    #[error("Column {column} is {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: &'static str },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("No profile defined for production '{production}'")]
    UnknownProduction { production: String },
}

/// Master error type for all specdb errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecdbError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Label error: {0}")]
    Label(#[from] ParseLabelError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Result type alias for specdb operations.
pub type SpecdbResult<T> = Result<T, SpecdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_unique_violation() {
        let err = StoreError::UniqueViolation {
            table: "exposure",
            key: "12345".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unique constraint"));
        assert!(msg.contains("exposure"));
        assert!(msg.contains("12345"));
    }

    #[test]
    fn test_load_error_display_missing_precondition() {
        let err = LoadError::MissingPrecondition {
            stage: "redshifts",
            tileid: 80615,
            missing: "target",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("80615"));
        assert!(msg.contains("redshifts"));
    }

    #[test]
    fn test_specdb_error_from_variants() {
        let store = SpecdbError::from(StoreError::LockPoisoned);
        assert!(matches!(store, SpecdbError::Store(_)));

        let load = SpecdbError::from(LoadError::TieExhausted { targetid: 7 });
        assert!(matches!(load, SpecdbError::Load(_)));

        let config = SpecdbError::from(ConfigError::UnknownProduction {
            production: "everest".to_string(),
        });
        assert!(matches!(config, SpecdbError::Config(_)));
    }
}
