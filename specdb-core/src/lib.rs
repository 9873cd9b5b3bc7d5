//! # specdb-core
//!
//! Core record types for the spectroscopic production database: the typed
//! entities the reconciliation engine operates on, the label enums and
//! packed row ids that key them, the targeting-bitmask column family, and
//! the shared error taxonomy.
//!
//! This crate holds data and invariant-free helpers only; the merge, repair,
//! and load logic lives in `specdb-patch` and `specdb-load`.

pub mod columns;
pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod ids;
pub mod target_bits;

pub use columns::{ColumnValues, TableBatch};
pub use config::ProductionConfig;
pub use entities::{
    valid_value, Exposure, Fiberassign, Frame, ObjectKey, Potential, Target, Tile, VersionRecord,
    Zpix, Ztile,
};
pub use enums::{Arm, Camera, Program, SpectralGroup, Survey, ZWarn};
pub use error::{
    BatchError, ConfigError, LoadError, ParseLabelError, SpecdbError, SpecdbResult, StoreError,
};
pub use target_bits::{TargetBits, TargetColumn};
