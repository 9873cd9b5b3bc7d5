//! # specdb-load
//!
//! Incremental tile-at-a-time loading and the post-load consistency passes:
//! the targeting bitmask reconciler, the primary observation selector, and
//! the upsert/load sequencer that keeps entity ordering preconditions
//! honest across runs.

pub mod primary;
pub mod profile;
pub mod reconcile;
pub mod sequencer;

pub use primary::{
    select_zpix_primaries, select_ztile_primaries, PrimaryPolicy, PrimaryStats, TieBreak,
    ZCatalogRow,
};
pub use profile::ReconcileProfile;
pub use reconcile::{expected_bits, reconcile_target_bits, ReconcileStats};
pub use sequencer::{LoadSequencer, LoadStage, TileBundle, TileLoadSummary};
