//! Tile-granularity incremental loading
//!
//! Loads one tile's rows in dependency order: exposures and frames first,
//! then targets, then redshift records, then assignment rows. The tile
//! cache decides whether a tile takes the insert-only path, the upsert
//! path, or is skipped outright.

use tracing::{debug, info};

use specdb_core::ids::is_loadable_target;
use specdb_core::{
    Exposure, Fiberassign, Frame, LoadError, Potential, ProductionConfig, SpecdbResult, Target,
    Tile, VersionRecord, Zpix, Ztile,
};
use specdb_storage::{RecordStore, TileCache, TileState, UpsertOutcome};

/// The ordered stages of a tile load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadStage {
    Exposures,
    Targets,
    Redshifts,
    Assignments,
}

impl LoadStage {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStage::Exposures => "exposures",
            LoadStage::Targets => "targets",
            LoadStage::Redshifts => "redshifts",
            LoadStage::Assignments => "assignments",
        }
    }
}

/// Everything the record-conversion collaborator produced for one tile.
#[derive(Debug, Clone, Default)]
pub struct TileBundle {
    pub tile: Option<Tile>,
    pub exposures: Vec<Exposure>,
    pub frames: Vec<Frame>,
    pub targets: Vec<Target>,
    pub zpix: Vec<Zpix>,
    pub ztile: Vec<Ztile>,
    pub fiberassign: Vec<Fiberassign>,
    pub potential: Vec<Potential>,
}

impl TileBundle {
    pub fn new(tile: Tile) -> TileBundle {
        TileBundle {
            tile: Some(tile),
            ..TileBundle::default()
        }
    }
}

/// Outcome of loading one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoadSummary {
    pub tileid: i32,
    pub state: TileState,
    pub rows_inserted: usize,
    pub rows_updated: usize,
    pub rows_unchanged: usize,
    /// Redshift rows rejected by the target-id row filter.
    pub rows_filtered: usize,
}

impl TileLoadSummary {
    fn skipped(tileid: i32) -> TileLoadSummary {
        TileLoadSummary {
            tileid,
            state: TileState::Unchanged,
            rows_inserted: 0,
            rows_updated: 0,
            rows_unchanged: 0,
            rows_filtered: 0,
        }
    }
}

/// Applies tile bundles to the store in stage order with upsert semantics.
pub struct LoadSequencer<'a> {
    store: &'a dyn RecordStore,
    config: ProductionConfig,
    cache: TileCache,
}

impl<'a> LoadSequencer<'a> {
    pub fn new(store: &'a dyn RecordStore, config: ProductionConfig, cache: TileCache) -> LoadSequencer<'a> {
        LoadSequencer {
            store,
            config,
            cache,
        }
    }

    /// Build a sequencer from the run configuration, opening the tile cache
    /// at `config.cache_path`. With no cache path every tile classifies as
    /// new within each run.
    pub fn open(
        store: &'a dyn RecordStore,
        config: ProductionConfig,
    ) -> SpecdbResult<LoadSequencer<'a>> {
        let cache = match &config.cache_path {
            Some(path) => TileCache::load(path)?,
            None => TileCache::in_memory(),
        };
        Ok(LoadSequencer {
            store,
            config,
            cache,
        })
    }

    /// Record software versions once, at the start of a load run.
    pub fn record_versions(&self, versions: &[VersionRecord]) -> SpecdbResult<()> {
        for version in versions {
            self.store.version_upsert(version)?;
        }
        Ok(())
    }

    /// Load one tile's rows, honoring stage preconditions and the cache.
    ///
    /// An unchanged tile is a no-op and does not touch the store. The cache
    /// entry advances only after every row has committed, so a failed load
    /// is retried on the next run.
    pub fn load_tile(&mut self, bundle: &TileBundle) -> SpecdbResult<TileLoadSummary> {
        let tile = bundle.tile.as_ref().ok_or(LoadError::MissingPrecondition {
            stage: LoadStage::Exposures.as_str(),
            tileid: 0,
            missing: "tile",
        })?;
        let tileid = tile.tileid;

        let state = self.cache.classify(tileid, tile.updated);
        if state == TileState::Unchanged {
            debug!(tileid, "tile unchanged since last load, skipping");
            return Ok(TileLoadSummary::skipped(tileid));
        }
        self.check_preconditions(tileid, bundle)?;

        let mut summary = TileLoadSummary {
            tileid,
            state,
            rows_inserted: 0,
            rows_updated: 0,
            rows_unchanged: 0,
            rows_filtered: 0,
        };

        self.apply(&mut summary, state, std::slice::from_ref(tile),
            |rows| self.store.tile_insert_many(rows),
            |row| self.store.tile_upsert(row))?;
        self.apply(&mut summary, state, &self.capped(&bundle.exposures),
            |rows| self.store.exposure_insert_many(rows),
            |row| self.store.exposure_upsert(row))?;
        self.apply(&mut summary, state, &self.capped(&bundle.frames),
            |rows| self.store.frame_insert_many(rows),
            |row| self.store.frame_upsert(row))?;
        self.apply(&mut summary, state, &self.capped(&bundle.targets),
            |rows| self.store.target_insert_many(rows),
            |row| self.store.target_upsert(row))?;

        let zpix = self.filter_redshifts(&bundle.zpix, |z| z.targetid, &mut summary);
        self.apply(&mut summary, state, &zpix,
            |rows| self.store.zpix_insert_many(rows),
            |row| self.store.zpix_upsert(row))?;
        let ztile = self.filter_redshifts(&bundle.ztile, |z| z.targetid, &mut summary);
        self.apply(&mut summary, state, &ztile,
            |rows| self.store.ztile_insert_many(rows),
            |row| self.store.ztile_upsert(row))?;

        self.apply(&mut summary, state, &self.capped(&bundle.fiberassign),
            |rows| self.store.fiberassign_insert_many(rows),
            |row| self.store.fiberassign_upsert(row))?;
        self.apply(&mut summary, state, &self.capped(&bundle.potential),
            |rows| self.store.potential_insert_many(rows),
            |row| self.store.potential_upsert(row))?;

        self.cache.record(tileid, tile.updated);
        self.cache.save()?;
        info!(
            tileid,
            ?state,
            inserted = summary.rows_inserted,
            updated = summary.rows_updated,
            filtered = summary.rows_filtered,
            "tile loaded"
        );
        Ok(summary)
    }

    /// Later stages need earlier-stage rows, either in this bundle or
    /// already in the store from a previous load.
    fn check_preconditions(&self, tileid: i32, bundle: &TileBundle) -> SpecdbResult<()> {
        let has_exposures =
            !bundle.exposures.is_empty() || !self.store.exposures_for_tile(tileid)?.is_empty();
        let has_targets =
            !bundle.targets.is_empty() || !self.store.targets_for_tile(tileid)?.is_empty();

        if !bundle.targets.is_empty() && !has_exposures {
            return Err(LoadError::MissingPrecondition {
                stage: LoadStage::Targets.as_str(),
                tileid,
                missing: "exposure",
            }
            .into());
        }
        if (!bundle.zpix.is_empty() || !bundle.ztile.is_empty()) && !has_targets {
            return Err(LoadError::MissingPrecondition {
                stage: LoadStage::Redshifts.as_str(),
                tileid,
                missing: "target",
            }
            .into());
        }
        if (!bundle.fiberassign.is_empty() || !bundle.potential.is_empty()) && !has_targets {
            return Err(LoadError::MissingPrecondition {
                stage: LoadStage::Assignments.as_str(),
                tileid,
                missing: "target",
            }
            .into());
        }
        Ok(())
    }

    /// New tiles take chunked bulk inserts; changed tiles take row-wise
    /// upserts that leave identical rows untouched.
    fn apply<T: Clone>(
        &self,
        summary: &mut TileLoadSummary,
        state: TileState,
        rows: &[T],
        insert_many: impl Fn(&[T]) -> SpecdbResult<()>,
        upsert: impl Fn(&T) -> SpecdbResult<UpsertOutcome>,
    ) -> SpecdbResult<()> {
        match state {
            TileState::New => {
                for chunk in rows.chunks(self.config.chunk_size) {
                    insert_many(chunk)?;
                    summary.rows_inserted += chunk.len();
                }
            }
            TileState::Changed => {
                for row in rows {
                    match upsert(row)? {
                        UpsertOutcome::Inserted => summary.rows_inserted += 1,
                        UpsertOutcome::Updated => summary.rows_updated += 1,
                        UpsertOutcome::Unchanged => summary.rows_unchanged += 1,
                    }
                }
            }
            TileState::Unchanged => {}
        }
        Ok(())
    }

    fn capped<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        match self.config.max_rows {
            Some(cap) => rows.iter().take(cap).cloned().collect(),
            None => rows.to_vec(),
        }
    }

    fn filter_redshifts<T: Clone>(
        &self,
        rows: &[T],
        targetid: impl Fn(&T) -> i64,
        summary: &mut TileLoadSummary,
    ) -> Vec<T> {
        let kept: Vec<T> = rows
            .iter()
            .filter(|r| is_loadable_target(targetid(r)))
            .cloned()
            .collect();
        summary.rows_filtered += rows.len() - kept.len();
        self.capped(&kept)
    }

    /// The cache, for callers that want to inspect or persist it.
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }
}
