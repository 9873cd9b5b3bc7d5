//! Patch diagnostics
//!
//! A patch sweep never stops at the first data-quality problem; everything
//! it finds is collected here so one run reports every issue in the
//! production.

use serde::Serialize;
use specdb_core::{Camera, Program, Survey};

/// How much of an orphaned tile the source production can repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Patchability {
    /// Every exposure of the tile has usable source-side data.
    Full,
    /// Some exposures are covered by the source, some are not.
    Partial,
    /// The source production has nothing for this tile.
    Unpatchable,
}

/// One data-quality finding from a patch sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Inconsistency {
    /// An exposure's labels disagree with its owning tile, so it was
    /// excluded from the tile's aggregate.
    LabelMismatch {
        tileid: i32,
        expid: i64,
        tile_survey: Survey,
        tile_program: Program,
        exposure_survey: Survey,
        exposure_program: Program,
    },

    /// The stored tile aggregate differed from the value recomputed over
    /// its label-consistent exposures; the recomputed value was written.
    AggregateDrift {
        tileid: i32,
        stored: Option<f64>,
        computed: f64,
    },

    /// A tile claims non-zero effective time but no exposure backs it up.
    /// Hard inconsistency; reported with everything a human needs to triage.
    OrphanEffectiveTime {
        tileid: i32,
        efftime_spec: f64,
        exposure_ids: Vec<i64>,
        source_covered: Vec<i64>,
        patchability: Patchability,
    },

    /// A frame or exposure still has no usable MJD after both the forward
    /// fill and the parent back-fill.
    MissingMjd { expid: i64, camera: Option<Camera> },

    /// The source row disagreed with an already-present destination label
    /// that patching must never change. The destination value was kept.
    LabelChanged {
        expid: i64,
        column: &'static str,
        destination: String,
        source: String,
    },

    /// A cell was still masked after the forward fill and was zero-filled.
    ResidualMask {
        table: &'static str,
        key: String,
        column: &'static str,
    },

    /// A tile carried a non-standard survey label and was normalized.
    SurveyNormalized { tileid: i32, normalized_to: Survey },
}

impl Inconsistency {
    /// Hard inconsistencies need human triage before the patched tables
    /// are loaded; the rest are informational.
    pub fn is_hard(&self) -> bool {
        matches!(self, Inconsistency::OrphanEffectiveTime { .. })
    }
}

/// Everything one patch sweep found and changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatchReport {
    pub inconsistencies: Vec<Inconsistency>,
    pub frames_patched: usize,
    pub exposures_patched: usize,
    pub tiles_patched: usize,
}

impl PatchReport {
    pub fn new() -> PatchReport {
        PatchReport::default()
    }

    pub fn push(&mut self, finding: Inconsistency) {
        self.inconsistencies.push(finding);
    }

    pub fn len(&self) -> usize {
        self.inconsistencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inconsistencies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inconsistency> {
        self.inconsistencies.iter()
    }

    pub fn hard_count(&self) -> usize {
        self.inconsistencies.iter().filter(|i| i.is_hard()).count()
    }

    pub fn has_hard_inconsistencies(&self) -> bool {
        self.inconsistencies.iter().any(Inconsistency::is_hard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_classification() {
        let mut report = PatchReport::new();
        report.push(Inconsistency::MissingMjd {
            expid: 12345,
            camera: None,
        });
        assert!(!report.has_hard_inconsistencies());

        report.push(Inconsistency::OrphanEffectiveTime {
            tileid: 80615,
            efftime_spec: 120.0,
            exposure_ids: vec![12345],
            source_covered: vec![],
            patchability: Patchability::Unpatchable,
        });
        assert!(report.has_hard_inconsistencies());
        assert_eq!(report.hard_count(), 1);
        assert_eq!(report.len(), 2);
    }
}
