//! specdb Storage - Record Store Trait and In-Memory Implementation
//!
//! Defines the persistence abstraction the reconciliation passes run
//! against. A relational implementation lives outside this workspace; the
//! in-memory store here backs tests and dry runs.

pub mod cache;

pub use cache::{TileCache, TileState};

use specdb_core::{
    Exposure, Fiberassign, Frame, ObjectKey, Potential, Program, SpecdbResult, StoreError, Survey,
    Target, TargetBits, Tile, VersionRecord, Zpix, Ztile,
};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for tiles. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TileUpdate {
    pub lastnight: Option<i32>,
    pub efftime_spec: Option<f64>,
    pub survey: Option<Survey>,
    pub program: Option<Program>,
    pub faprgrm: Option<String>,
    pub faflavor: Option<String>,
    pub goaltype: Option<String>,
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Primary-selection fields written back onto a redshift row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryUpdate {
    pub zcat_nspec: i32,
    pub zcat_primary: bool,
    pub sv_nspec: i32,
    pub sv_primary: bool,
    pub main_nspec: i32,
    pub main_primary: bool,
}

/// What an upsert did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The incoming row was identical to the stored one; nothing written.
    Unchanged,
}

impl UpsertOutcome {
    pub fn rows_affected(self) -> usize {
        match self {
            UpsertOutcome::Inserted | UpsertOutcome::Updated => 1,
            UpsertOutcome::Unchanged => 0,
        }
    }
}

// ============================================================================
// RECORD STORE TRAIT
// ============================================================================

/// Persistence contract for specdb entities.
///
/// Bulk inserts are atomic: if any row would violate a key constraint, no
/// row from the batch is written and the offending key is reported. Each
/// call is its own transaction; the consistency passes rely on this to
/// commit one object's repair at a time.
pub trait RecordStore: Send + Sync {
    // === Exposure Operations ===

    fn exposure_insert_many(&self, rows: &[Exposure]) -> SpecdbResult<()>;
    fn exposure_get(&self, expid: i64) -> SpecdbResult<Option<Exposure>>;
    fn exposure_upsert(&self, row: &Exposure) -> SpecdbResult<UpsertOutcome>;
    fn exposures_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Exposure>>;

    // === Frame Operations ===

    fn frame_insert_many(&self, rows: &[Frame]) -> SpecdbResult<()>;
    fn frame_upsert(&self, row: &Frame) -> SpecdbResult<UpsertOutcome>;
    fn frames_for_exposure(&self, expid: i64) -> SpecdbResult<Vec<Frame>>;

    // === Tile Operations ===

    fn tile_insert_many(&self, rows: &[Tile]) -> SpecdbResult<()>;
    fn tile_get(&self, tileid: i32) -> SpecdbResult<Option<Tile>>;
    fn tile_update(&self, tileid: i32, update: TileUpdate) -> SpecdbResult<()>;
    fn tile_upsert(&self, row: &Tile) -> SpecdbResult<UpsertOutcome>;

    // === Target Operations ===

    fn target_insert_many(&self, rows: &[Target]) -> SpecdbResult<()>;
    fn target_upsert(&self, row: &Target) -> SpecdbResult<UpsertOutcome>;
    fn targets_for_object(&self, key: &ObjectKey) -> SpecdbResult<Vec<Target>>;
    fn targets_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Target>>;

    /// Target ids within (survey, program) that are fiber-assigned on more
    /// than one distinct tile. These are the bitmask-anomaly candidates.
    fn multi_tile_targetids(&self, survey: Survey, program: Program) -> SpecdbResult<Vec<i64>>;

    // === Assignment Operations ===

    fn fiberassign_insert_many(&self, rows: &[Fiberassign]) -> SpecdbResult<()>;
    fn fiberassign_upsert(&self, row: &Fiberassign) -> SpecdbResult<UpsertOutcome>;
    fn potential_insert_many(&self, rows: &[Potential]) -> SpecdbResult<()>;
    fn potential_upsert(&self, row: &Potential) -> SpecdbResult<UpsertOutcome>;

    // === Zpix Operations ===

    fn zpix_insert_many(&self, rows: &[Zpix]) -> SpecdbResult<()>;
    fn zpix_upsert(&self, row: &Zpix) -> SpecdbResult<UpsertOutcome>;
    fn zpix_all(&self) -> SpecdbResult<Vec<Zpix>>;
    fn zpix_for_object(&self, key: &ObjectKey) -> SpecdbResult<Option<Zpix>>;
    fn zpix_update_bits(&self, key: &ObjectKey, bits: TargetBits) -> SpecdbResult<usize>;
    fn zpix_update_primary(&self, id: u128, update: PrimaryUpdate) -> SpecdbResult<()>;

    // === Ztile Operations ===

    fn ztile_insert_many(&self, rows: &[Ztile]) -> SpecdbResult<()>;
    fn ztile_upsert(&self, row: &Ztile) -> SpecdbResult<UpsertOutcome>;
    fn ztile_all(&self) -> SpecdbResult<Vec<Ztile>>;
    fn ztile_for_object(&self, key: &ObjectKey) -> SpecdbResult<Vec<Ztile>>;
    fn ztile_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Ztile>>;
    fn ztile_update_bits(&self, key: &ObjectKey, bits: TargetBits) -> SpecdbResult<usize>;
    fn ztile_update_primary(&self, id: u128, update: PrimaryUpdate) -> SpecdbResult<()>;

    // === Version Operations ===

    fn version_upsert(&self, row: &VersionRecord) -> SpecdbResult<UpsertOutcome>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory record store, keyed by each entity's natural key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    exposures: Arc<RwLock<BTreeMap<i64, Exposure>>>,
    frames: Arc<RwLock<BTreeMap<i64, Frame>>>,
    tiles: Arc<RwLock<BTreeMap<i32, Tile>>>,
    targets: Arc<RwLock<BTreeMap<u128, Target>>>,
    fiberassign: Arc<RwLock<BTreeMap<u128, Fiberassign>>>,
    potential: Arc<RwLock<BTreeMap<u128, Potential>>>,
    zpix: Arc<RwLock<BTreeMap<u128, Zpix>>>,
    ztile: Arc<RwLock<BTreeMap<u128, Ztile>>>,
    versions: Arc<RwLock<BTreeMap<String, VersionRecord>>>,
}

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read().map_err(|_| StoreError::LockPoisoned)
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write().map_err(|_| StoreError::LockPoisoned)
}

/// Check every key before writing any row, so a conflict leaves the table
/// untouched.
fn insert_many_atomic<K: Ord + ToString, V: Clone>(
    map: &mut BTreeMap<K, V>,
    table: &'static str,
    rows: impl Iterator<Item = (K, V)>,
) -> Result<(), StoreError> {
    let staged: Vec<(K, V)> = rows.collect();
    for (key, _) in &staged {
        if map.contains_key(key) {
            return Err(StoreError::UniqueViolation {
                table,
                key: key.to_string(),
            });
        }
    }
    for (key, value) in staged {
        map.insert(key, value);
    }
    Ok(())
}

fn upsert_row<K: Ord, V: Clone + PartialEq>(
    map: &mut BTreeMap<K, V>,
    key: K,
    row: &V,
) -> UpsertOutcome {
    match map.get(&key) {
        Some(existing) if existing == row => UpsertOutcome::Unchanged,
        Some(_) => {
            map.insert(key, row.clone());
            UpsertOutcome::Updated
        }
        None => {
            map.insert(key, row.clone());
            UpsertOutcome::Inserted
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) -> SpecdbResult<()> {
        write_lock(&self.exposures)?.clear();
        write_lock(&self.frames)?.clear();
        write_lock(&self.tiles)?.clear();
        write_lock(&self.targets)?.clear();
        write_lock(&self.fiberassign)?.clear();
        write_lock(&self.potential)?.clear();
        write_lock(&self.zpix)?.clear();
        write_lock(&self.ztile)?.clear();
        write_lock(&self.versions)?.clear();
        Ok(())
    }

    pub fn exposure_count(&self) -> SpecdbResult<usize> {
        Ok(read_lock(&self.exposures)?.len())
    }

    pub fn target_count(&self) -> SpecdbResult<usize> {
        Ok(read_lock(&self.targets)?.len())
    }

    pub fn zpix_count(&self) -> SpecdbResult<usize> {
        Ok(read_lock(&self.zpix)?.len())
    }

    pub fn ztile_count(&self) -> SpecdbResult<usize> {
        Ok(read_lock(&self.ztile)?.len())
    }
}

impl RecordStore for MemoryStore {
    // === Exposure Operations ===

    fn exposure_insert_many(&self, rows: &[Exposure]) -> SpecdbResult<()> {
        let mut exposures = write_lock(&self.exposures)?;
        insert_many_atomic(
            &mut exposures,
            "exposure",
            rows.iter().map(|r| (r.expid, r.clone())),
        )?;
        Ok(())
    }

    fn exposure_get(&self, expid: i64) -> SpecdbResult<Option<Exposure>> {
        Ok(read_lock(&self.exposures)?.get(&expid).cloned())
    }

    fn exposure_upsert(&self, row: &Exposure) -> SpecdbResult<UpsertOutcome> {
        let mut exposures = write_lock(&self.exposures)?;
        Ok(upsert_row(&mut exposures, row.expid, row))
    }

    fn exposures_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Exposure>> {
        Ok(read_lock(&self.exposures)?
            .values()
            .filter(|e| e.tileid == Some(tileid))
            .cloned()
            .collect())
    }

    // === Frame Operations ===

    fn frame_insert_many(&self, rows: &[Frame]) -> SpecdbResult<()> {
        let mut frames = write_lock(&self.frames)?;
        insert_many_atomic(
            &mut frames,
            "frame",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn frame_upsert(&self, row: &Frame) -> SpecdbResult<UpsertOutcome> {
        let mut frames = write_lock(&self.frames)?;
        Ok(upsert_row(&mut frames, row.row_id(), row))
    }

    fn frames_for_exposure(&self, expid: i64) -> SpecdbResult<Vec<Frame>> {
        Ok(read_lock(&self.frames)?
            .values()
            .filter(|f| f.expid == expid)
            .cloned()
            .collect())
    }

    // === Tile Operations ===

    fn tile_insert_many(&self, rows: &[Tile]) -> SpecdbResult<()> {
        let mut tiles = write_lock(&self.tiles)?;
        insert_many_atomic(
            &mut tiles,
            "tile",
            rows.iter().map(|r| (r.tileid, r.clone())),
        )?;
        Ok(())
    }

    fn tile_get(&self, tileid: i32) -> SpecdbResult<Option<Tile>> {
        Ok(read_lock(&self.tiles)?.get(&tileid).cloned())
    }

    fn tile_update(&self, tileid: i32, update: TileUpdate) -> SpecdbResult<()> {
        let mut tiles = write_lock(&self.tiles)?;
        let tile = tiles.get_mut(&tileid).ok_or(StoreError::NotFound {
            table: "tile",
            key: tileid.to_string(),
        })?;

        if let Some(lastnight) = update.lastnight {
            tile.lastnight = lastnight;
        }
        if let Some(efftime_spec) = update.efftime_spec {
            tile.efftime_spec = Some(efftime_spec);
        }
        if let Some(survey) = update.survey {
            tile.survey = survey;
        }
        if let Some(program) = update.program {
            tile.program = program;
        }
        if let Some(faprgrm) = update.faprgrm {
            tile.faprgrm = Some(faprgrm);
        }
        if let Some(faflavor) = update.faflavor {
            tile.faflavor = Some(faflavor);
        }
        if let Some(goaltype) = update.goaltype {
            tile.goaltype = Some(goaltype);
        }
        if let Some(updated) = update.updated {
            tile.updated = updated;
        }

        Ok(())
    }

    fn tile_upsert(&self, row: &Tile) -> SpecdbResult<UpsertOutcome> {
        let mut tiles = write_lock(&self.tiles)?;
        Ok(upsert_row(&mut tiles, row.tileid, row))
    }

    // === Target Operations ===

    fn target_insert_many(&self, rows: &[Target]) -> SpecdbResult<()> {
        let mut targets = write_lock(&self.targets)?;
        insert_many_atomic(
            &mut targets,
            "target",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn target_upsert(&self, row: &Target) -> SpecdbResult<UpsertOutcome> {
        let mut targets = write_lock(&self.targets)?;
        Ok(upsert_row(&mut targets, row.row_id(), row))
    }

    fn targets_for_object(&self, key: &ObjectKey) -> SpecdbResult<Vec<Target>> {
        Ok(read_lock(&self.targets)?
            .values()
            .filter(|t| t.object_key() == *key)
            .cloned()
            .collect())
    }

    fn targets_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Target>> {
        Ok(read_lock(&self.targets)?
            .values()
            .filter(|t| t.tileid == tileid)
            .cloned()
            .collect())
    }

    fn multi_tile_targetids(&self, survey: Survey, program: Program) -> SpecdbResult<Vec<i64>> {
        let targets = read_lock(&self.targets)?;
        let fiberassign = read_lock(&self.fiberassign)?;
        let assigned: BTreeSet<(i64, i32)> = fiberassign
            .values()
            .map(|f| (f.targetid, f.tileid))
            .collect();

        let mut tiles_per_target: BTreeMap<i64, BTreeSet<i32>> = BTreeMap::new();
        for target in targets.values() {
            if target.survey == survey
                && target.program == program
                && assigned.contains(&(target.targetid, target.tileid))
            {
                tiles_per_target
                    .entry(target.targetid)
                    .or_default()
                    .insert(target.tileid);
            }
        }
        Ok(tiles_per_target
            .into_iter()
            .filter(|(_, tiles)| tiles.len() > 1)
            .map(|(targetid, _)| targetid)
            .collect())
    }

    // === Assignment Operations ===

    fn fiberassign_insert_many(&self, rows: &[Fiberassign]) -> SpecdbResult<()> {
        let mut fiberassign = write_lock(&self.fiberassign)?;
        insert_many_atomic(
            &mut fiberassign,
            "fiberassign",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn fiberassign_upsert(&self, row: &Fiberassign) -> SpecdbResult<UpsertOutcome> {
        let mut fiberassign = write_lock(&self.fiberassign)?;
        Ok(upsert_row(&mut fiberassign, row.row_id(), row))
    }

    fn potential_insert_many(&self, rows: &[Potential]) -> SpecdbResult<()> {
        let mut potential = write_lock(&self.potential)?;
        insert_many_atomic(
            &mut potential,
            "potential",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn potential_upsert(&self, row: &Potential) -> SpecdbResult<UpsertOutcome> {
        let mut potential = write_lock(&self.potential)?;
        Ok(upsert_row(&mut potential, row.row_id(), row))
    }

    // === Zpix Operations ===

    fn zpix_insert_many(&self, rows: &[Zpix]) -> SpecdbResult<()> {
        let mut zpix = write_lock(&self.zpix)?;
        insert_many_atomic(
            &mut zpix,
            "zpix",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn zpix_upsert(&self, row: &Zpix) -> SpecdbResult<UpsertOutcome> {
        let mut zpix = write_lock(&self.zpix)?;
        Ok(upsert_row(&mut zpix, row.row_id(), row))
    }

    fn zpix_all(&self) -> SpecdbResult<Vec<Zpix>> {
        Ok(read_lock(&self.zpix)?.values().cloned().collect())
    }

    fn zpix_for_object(&self, key: &ObjectKey) -> SpecdbResult<Option<Zpix>> {
        let id = specdb_core::ids::zpix_row_id(key.targetid, key.survey, key.program);
        Ok(read_lock(&self.zpix)?.get(&id).cloned())
    }

    fn zpix_update_bits(&self, key: &ObjectKey, bits: TargetBits) -> SpecdbResult<usize> {
        let id = specdb_core::ids::zpix_row_id(key.targetid, key.survey, key.program);
        let mut zpix = write_lock(&self.zpix)?;
        match zpix.get_mut(&id) {
            Some(row) => {
                row.bits = bits;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn zpix_update_primary(&self, id: u128, update: PrimaryUpdate) -> SpecdbResult<()> {
        let mut zpix = write_lock(&self.zpix)?;
        let row = zpix.get_mut(&id).ok_or(StoreError::NotFound {
            table: "zpix",
            key: id.to_string(),
        })?;
        apply_primary_zpix(row, update);
        Ok(())
    }

    // === Ztile Operations ===

    fn ztile_insert_many(&self, rows: &[Ztile]) -> SpecdbResult<()> {
        let mut ztile = write_lock(&self.ztile)?;
        insert_many_atomic(
            &mut ztile,
            "ztile",
            rows.iter().map(|r| (r.row_id(), r.clone())),
        )?;
        Ok(())
    }

    fn ztile_upsert(&self, row: &Ztile) -> SpecdbResult<UpsertOutcome> {
        let mut ztile = write_lock(&self.ztile)?;
        Ok(upsert_row(&mut ztile, row.row_id(), row))
    }

    fn ztile_all(&self) -> SpecdbResult<Vec<Ztile>> {
        Ok(read_lock(&self.ztile)?.values().cloned().collect())
    }

    fn ztile_for_object(&self, key: &ObjectKey) -> SpecdbResult<Vec<Ztile>> {
        Ok(read_lock(&self.ztile)?
            .values()
            .filter(|z| z.object_key() == *key)
            .cloned()
            .collect())
    }

    fn ztile_for_tile(&self, tileid: i32) -> SpecdbResult<Vec<Ztile>> {
        Ok(read_lock(&self.ztile)?
            .values()
            .filter(|z| z.tileid == tileid)
            .cloned()
            .collect())
    }

    fn ztile_update_bits(&self, key: &ObjectKey, bits: TargetBits) -> SpecdbResult<usize> {
        let mut ztile = write_lock(&self.ztile)?;
        let mut updated = 0;
        for row in ztile.values_mut() {
            if row.object_key() == *key {
                row.bits = bits;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn ztile_update_primary(&self, id: u128, update: PrimaryUpdate) -> SpecdbResult<()> {
        let mut ztile = write_lock(&self.ztile)?;
        let row = ztile.get_mut(&id).ok_or(StoreError::NotFound {
            table: "ztile",
            key: id.to_string(),
        })?;
        apply_primary_ztile(row, update);
        Ok(())
    }

    // === Version Operations ===

    fn version_upsert(&self, row: &VersionRecord) -> SpecdbResult<UpsertOutcome> {
        let mut versions = write_lock(&self.versions)?;
        Ok(upsert_row(&mut versions, row.package.clone(), row))
    }
}

fn apply_primary_zpix(row: &mut Zpix, update: PrimaryUpdate) {
    row.zcat_nspec = update.zcat_nspec;
    row.zcat_primary = update.zcat_primary;
    row.sv_nspec = update.sv_nspec;
    row.sv_primary = update.sv_primary;
    row.main_nspec = update.main_nspec;
    row.main_primary = update.main_primary;
}

fn apply_primary_ztile(row: &mut Ztile, update: PrimaryUpdate) {
    row.zcat_nspec = update.zcat_nspec;
    row.zcat_primary = update.zcat_primary;
    row.sv_nspec = update.sv_nspec;
    row.sv_primary = update.sv_primary;
    row.main_nspec = update.main_nspec;
    row.main_primary = update.main_primary;
}

#[cfg(test)]
mod tests {
    use super::*;
    use specdb_core::{Program, SpecdbError, Survey};

    fn make_test_target(targetid: i64, tileid: i32) -> Target {
        Target::new(targetid, Survey::Sv1, Program::Bright, tileid)
    }

    fn make_test_assignment(targetid: i64, tileid: i32) -> Fiberassign {
        Fiberassign::new(tileid, targetid, 500, 250)
    }

    #[test]
    fn test_insert_many_is_atomic() {
        let store = MemoryStore::new();
        store
            .tile_insert_many(&[Tile::new(80615, Survey::Sv1, Program::Bright, 20210610)])
            .unwrap();

        // Second batch collides on 80615; 80616 must not land either.
        let err = store
            .tile_insert_many(&[
                Tile::new(80616, Survey::Sv1, Program::Bright, 20210611),
                Tile::new(80615, Survey::Sv1, Program::Bright, 20210612),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            SpecdbError::Store(StoreError::UniqueViolation { table: "tile", ref key }) if key == "80615"
        ));
        assert!(store.tile_get(80616).unwrap().is_none());
    }

    #[test]
    fn test_upsert_outcomes() {
        let store = MemoryStore::new();
        let tile = Tile::new(80615, Survey::Sv1, Program::Bright, 20210610).with_efftime_spec(120.0);

        assert_eq!(store.tile_upsert(&tile).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.tile_upsert(&tile).unwrap(), UpsertOutcome::Unchanged);

        let changed = tile.clone().with_efftime_spec(240.0);
        assert_eq!(store.tile_upsert(&changed).unwrap(), UpsertOutcome::Updated);
        assert_eq!(
            store.tile_get(80615).unwrap().unwrap().efftime_spec,
            Some(240.0)
        );
    }

    #[test]
    fn test_tile_update_subset() {
        let store = MemoryStore::new();
        store
            .tile_insert_many(&[Tile::new(80615, Survey::Sv1, Program::Bright, 20210610)])
            .unwrap();
        store
            .tile_update(
                80615,
                TileUpdate {
                    efftime_spec: Some(120.0),
                    ..TileUpdate::default()
                },
            )
            .unwrap();
        let tile = store.tile_get(80615).unwrap().unwrap();
        assert_eq!(tile.efftime_spec, Some(120.0));
        assert_eq!(tile.lastnight, 20210610);

        assert!(store.tile_update(99999, TileUpdate::default()).is_err());
    }

    #[test]
    fn test_multi_tile_targetids_requires_assignment() {
        let store = MemoryStore::new();
        store
            .target_insert_many(&[
                make_test_target(100, 1),
                make_test_target(100, 2),
                make_test_target(200, 1),
                make_test_target(300, 1),
                make_test_target(300, 2),
            ])
            .unwrap();
        // Target 300 is only assigned on one tile; target 100 on both.
        store
            .fiberassign_insert_many(&[
                make_test_assignment(100, 1),
                make_test_assignment(100, 2),
                make_test_assignment(200, 1),
                make_test_assignment(300, 1),
            ])
            .unwrap();

        let anomalous = store
            .multi_tile_targetids(Survey::Sv1, Program::Bright)
            .unwrap();
        assert_eq!(anomalous, vec![100]);

        // Different program: no candidates.
        let other = store
            .multi_tile_targetids(Survey::Sv1, Program::Dark)
            .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_zpix_update_bits() {
        let store = MemoryStore::new();
        let zpix = Zpix::new(100, Survey::Sv1, Program::Bright, 1234);
        store.zpix_insert_many(&[zpix.clone()]).unwrap();

        let mut bits = TargetBits::default();
        bits.sv1_desi_target = 4;
        let key = zpix.object_key();
        assert_eq!(store.zpix_update_bits(&key, bits).unwrap(), 1);
        assert_eq!(
            store.zpix_for_object(&key).unwrap().unwrap().bits.sv1_desi_target,
            4
        );

        let missing = ObjectKey::new(999, Survey::Sv1, Program::Bright);
        assert_eq!(store.zpix_update_bits(&missing, bits).unwrap(), 0);
    }

    #[test]
    fn test_version_upsert_replaces() {
        let store = MemoryStore::new();
        let v1 = VersionRecord::new("specdb", "0.1.0");
        let v2 = VersionRecord::new("specdb", "0.2.0");
        assert_eq!(store.version_upsert(&v1).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.version_upsert(&v2).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.version_upsert(&v2).unwrap(), UpsertOutcome::Unchanged);
    }
}
