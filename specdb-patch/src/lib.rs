//! # specdb-patch
//!
//! The table patch merger: fills gaps in a still-accumulating production's
//! summary tables (tiles, exposures, frames) from a finalized production,
//! recomputes the tile aggregates the fill may have changed, and writes the
//! result to inspectable CSV artifacts together with a structured report of
//! every inconsistency found.

pub mod artifact;
pub mod merge;
pub mod report;

pub use artifact::{artifact_name, ArtifactError, ArtifactPaths, ArtifactWriter};
pub use merge::{
    back_patch, backfill_frame_mjd, patch_exposures, patch_frames, patch_production, patch_tiles,
    ProductionTables,
};
pub use report::{Inconsistency, PatchReport, Patchability};
