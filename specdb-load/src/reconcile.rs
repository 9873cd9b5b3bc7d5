//! Targeting bitmask reconciliation
//!
//! Targeting bitmasks are recorded once per tile assignment but should be
//! identical for every assignment of the same object. This pass finds
//! objects whose per-tile rows disagree and overwrites the canonical
//! redshift records with the bitwise OR across all of the object's rows.
//! ORing identical values changes nothing, so the pass can be re-run
//! against a live store at any time.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use specdb_core::ids::is_sentinel_too;
use specdb_core::{LoadError, ObjectKey, Program, SpecdbResult, Survey, TargetBits};
use specdb_storage::RecordStore;

use crate::profile::ReconcileProfile;

/// What one reconciliation pass found and did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Objects assigned to more than one tile.
    pub candidates: usize,
    /// Objects with at least one disagreeing bitmask column.
    pub anomalous: usize,
    /// Objects flagged through the sentinel-id defect.
    pub sentinel: usize,
    /// Objects whose canonical records were rewritten.
    pub repaired: usize,
    /// Objects whose repair transaction failed and was skipped.
    pub failed: usize,
}

/// Find and repair bitmask disagreements for every (survey, program)
/// combination in the profile.
pub fn reconcile_target_bits(
    store: &dyn RecordStore,
    profile: &ReconcileProfile,
) -> SpecdbResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    for (survey, program) in profile.combinations() {
        let combination = reconcile_combination(store, profile, survey, program)?;
        stats.candidates += combination.candidates;
        stats.anomalous += combination.anomalous;
        stats.sentinel += combination.sentinel;
        stats.repaired += combination.repaired;
        stats.failed += combination.failed;
    }
    info!(
        production = %profile.production,
        candidates = stats.candidates,
        anomalous = stats.anomalous,
        sentinel = stats.sentinel,
        repaired = stats.repaired,
        failed = stats.failed,
        "bitmask reconciliation complete"
    );
    Ok(stats)
}

fn reconcile_combination(
    store: &dyn RecordStore,
    profile: &ReconcileProfile,
    survey: Survey,
    program: Program,
) -> SpecdbResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    // Objects assigned on more than one tile are the only ones that can
    // disagree with themselves.
    let candidates = store.multi_tile_targetids(survey, program)?;
    stats.candidates = candidates.len();

    let mut anomalous: BTreeSet<i64> = BTreeSet::new();
    for targetid in candidates {
        let key = ObjectKey::new(targetid, survey, program);
        let rows = store.targets_for_object(&key)?;
        for column in survey.detection_columns() {
            let distinct: BTreeSet<i64> = rows.iter().map(|t| t.bits.get(*column)).collect();
            if distinct.len() > 1 {
                debug!(
                    targetid,
                    survey = %survey,
                    program = %program,
                    column = column.name(),
                    values = distinct.len(),
                    "bitmask disagreement"
                );
                anomalous.insert(targetid);
            }
        }
    }
    stats.anomalous = anomalous.len();

    // Sentinel-encoded target-of-opportunity ids from affected productions
    // join the worklist even without a detected disagreement; the OR repair
    // restores their zeroed bitmasks from the assignment rows.
    let mut sentinels: BTreeSet<i64> = BTreeSet::new();
    if profile.repair_zeroed_sentinels {
        for zpix in store.zpix_all()? {
            if zpix.survey == survey && zpix.program == program && is_sentinel_too(zpix.targetid) {
                sentinels.insert(zpix.targetid);
            }
        }
    }
    stats.sentinel = sentinels.len();

    // Consolidate before repairing: an object anomalous in several column
    // families is repaired exactly once, over the union of its rows.
    let worklist: BTreeSet<i64> = anomalous.union(&sentinels).copied().collect();

    for targetid in worklist {
        let key = ObjectKey::new(targetid, survey, program);
        let rows = store.targets_for_object(&key)?;
        if rows.is_empty() {
            if anomalous.contains(&targetid) {
                // Disagreement detection just saw these rows; their absence
                // means the store is malformed, which is worth stopping on.
                return Err(LoadError::RepairPrecondition {
                    targetid,
                    survey,
                    program,
                }
                .into());
            }
            // A sentinel object with no assignment rows has nothing to OR.
            warn!(targetid, "sentinel object has no assignment rows, skipping");
            continue;
        }

        let merged = TargetBits::or_reduce(rows.iter().map(|t| &t.bits));
        match commit_repair(store, &key, merged) {
            Ok(()) => stats.repaired += 1,
            Err(e) => {
                // One object's failure must not discard unrelated repairs.
                error!(targetid, error = %e, "bitmask repair failed, skipping object");
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}

/// One object's repair; each store call commits on its own.
fn commit_repair(store: &dyn RecordStore, key: &ObjectKey, merged: TargetBits) -> SpecdbResult<()> {
    let zpix_updated = store.zpix_update_bits(key, merged)?;
    let ztile_updated = store.ztile_update_bits(key, merged)?;
    if zpix_updated == 0 && ztile_updated == 0 {
        warn!(targetid = key.targetid, "no canonical redshift record for repaired object");
    }
    Ok(())
}

/// The bitwise OR of every bitmask column over an object's rows, exposed
/// for tests asserting repair completeness.
pub fn expected_bits(store: &dyn RecordStore, key: &ObjectKey) -> SpecdbResult<TargetBits> {
    let rows = store.targets_for_object(key)?;
    Ok(TargetBits::or_reduce(rows.iter().map(|t| &t.bits)))
}
