//! Primary observation selection
//!
//! Every object observed more than once needs exactly one canonical
//! observation. Selection is a pure function of the catalog snapshot: best
//! effective exposure time wins, recency breaks ties, and a stable row-id
//! ordering breaks the rest. The pass is global because a newly loaded
//! observation can displace a previously primary one.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::info;

use specdb_core::{LoadError, ObjectKey, SpecdbResult, Zpix, Ztile};
use specdb_storage::{PrimaryUpdate, RecordStore};

/// Final tie-break once exposure time and recency are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Highest row id wins.
    #[default]
    RowIdDescending,
    /// Lowest row id wins.
    RowIdAscending,
}

/// Selection policy; the ordering before the tie-break is fixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryPolicy {
    pub tie_break: TieBreak,
}

/// A redshift catalog row, as the selector sees it.
pub trait ZCatalogRow {
    fn object_key(&self) -> ObjectKey;
    fn row_id(&self) -> u128;
    fn efftime(&self) -> f64;
    /// Later observations win ties; per-healpix rows use the latest coadded
    /// MJD, per-tile rows the coadd group value (the night, for cumulative
    /// coadds).
    fn recency(&self) -> f64;
}

impl ZCatalogRow for Zpix {
    fn object_key(&self) -> ObjectKey {
        Zpix::object_key(self)
    }

    fn row_id(&self) -> u128 {
        Zpix::row_id(self)
    }

    fn efftime(&self) -> f64 {
        self.efftime_spec
    }

    fn recency(&self) -> f64 {
        self.max_mjd
    }
}

impl ZCatalogRow for Ztile {
    fn object_key(&self) -> ObjectKey {
        Ztile::object_key(self)
    }

    fn row_id(&self) -> u128 {
        Ztile::row_id(self)
    }

    fn efftime(&self) -> f64 {
        self.efftime_spec
    }

    fn recency(&self) -> f64 {
        f64::from(self.spgrpval)
    }
}

/// What one selection pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimaryStats {
    pub groups: usize,
    pub rows_updated: usize,
}

/// Ordering of `a` relative to `b`; `Greater` means `a` is the better
/// observation.
fn preference<R: ZCatalogRow>(a: &R, b: &R, policy: &PrimaryPolicy) -> Ordering {
    a.efftime()
        .total_cmp(&b.efftime())
        .then_with(|| a.recency().total_cmp(&b.recency()))
        .then_with(|| match policy.tie_break {
            TieBreak::RowIdDescending => a.row_id().cmp(&b.row_id()),
            TieBreak::RowIdAscending => b.row_id().cmp(&a.row_id()),
        })
}

/// Index of the best row among `indices`, or an error on a true tie, which
/// is impossible with unique row ids and indicates malformed input.
fn select_winner<R: ZCatalogRow>(
    rows: &[R],
    indices: &[usize],
    policy: &PrimaryPolicy,
) -> Result<usize, LoadError> {
    let mut winner = indices[0];
    for &i in &indices[1..] {
        match preference(&rows[i], &rows[winner], policy) {
            Ordering::Greater => winner = i,
            Ordering::Equal => {
                return Err(LoadError::TieExhausted {
                    targetid: rows[i].object_key().targetid,
                })
            }
            Ordering::Less => {}
        }
    }
    Ok(winner)
}

/// Compute primary flags and counters for a full catalog snapshot.
fn compute_updates<R: ZCatalogRow>(
    rows: &[R],
    policy: &PrimaryPolicy,
) -> Result<(Vec<(u128, PrimaryUpdate)>, usize), LoadError> {
    let mut groups: BTreeMap<ObjectKey, Vec<usize>> = BTreeMap::new();
    let mut sv_groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    let mut main_groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = row.object_key();
        groups.entry(key).or_default().push(i);
        if key.survey.is_sv() {
            sv_groups.entry(key.targetid).or_default().push(i);
        }
        if key.survey == specdb_core::Survey::Main {
            main_groups.entry(key.targetid).or_default().push(i);
        }
    }

    let mut zcat: BTreeMap<usize, (i32, bool)> = BTreeMap::new();
    for indices in groups.values() {
        let winner = select_winner(rows, indices, policy)?;
        for &i in indices {
            zcat.insert(i, (indices.len() as i32, i == winner));
        }
    }

    let mut sv: BTreeMap<usize, (i32, bool)> = BTreeMap::new();
    for indices in sv_groups.values() {
        let winner = select_winner(rows, indices, policy)?;
        for &i in indices {
            sv.insert(i, (indices.len() as i32, i == winner));
        }
    }

    let mut main: BTreeMap<usize, (i32, bool)> = BTreeMap::new();
    for indices in main_groups.values() {
        let winner = select_winner(rows, indices, policy)?;
        for &i in indices {
            main.insert(i, (indices.len() as i32, i == winner));
        }
    }

    let updates = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (zcat_nspec, zcat_primary) = zcat.get(&i).copied().unwrap_or((0, false));
            let (sv_nspec, sv_primary) = sv.get(&i).copied().unwrap_or((0, false));
            let (main_nspec, main_primary) = main.get(&i).copied().unwrap_or((0, false));
            (
                row.row_id(),
                PrimaryUpdate {
                    zcat_nspec,
                    zcat_primary,
                    sv_nspec,
                    sv_primary,
                    main_nspec,
                    main_primary,
                },
            )
        })
        .collect();
    Ok((updates, groups.len()))
}

/// Recompute primary flags over every per-healpix redshift row.
pub fn select_zpix_primaries(
    store: &dyn RecordStore,
    policy: &PrimaryPolicy,
) -> SpecdbResult<PrimaryStats> {
    let rows = store.zpix_all()?;
    let (updates, groups) = compute_updates(&rows, policy)?;
    let mut stats = PrimaryStats {
        groups,
        rows_updated: 0,
    };
    for (id, update) in updates {
        store.zpix_update_primary(id, update)?;
        stats.rows_updated += 1;
    }
    info!(groups = stats.groups, rows = stats.rows_updated, "zpix primary selection complete");
    Ok(stats)
}

/// Recompute primary flags over every per-tile redshift row.
pub fn select_ztile_primaries(
    store: &dyn RecordStore,
    policy: &PrimaryPolicy,
) -> SpecdbResult<PrimaryStats> {
    let rows = store.ztile_all()?;
    let (updates, groups) = compute_updates(&rows, policy)?;
    let mut stats = PrimaryStats {
        groups,
        rows_updated: 0,
    };
    for (id, update) in updates {
        store.ztile_update_primary(id, update)?;
        stats.rows_updated += 1;
    }
    info!(groups = stats.groups, rows = stats.rows_updated, "ztile primary selection complete");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use specdb_core::{Program, SpectralGroup, Survey};
    use specdb_storage::MemoryStore;

    fn make_test_ztile(targetid: i64, tileid: i32, night: i32, efftime: f64) -> Ztile {
        Ztile::new(
            targetid,
            Survey::Sv1,
            Program::Bright,
            tileid,
            SpectralGroup::Cumulative,
            night,
        )
        .with_efftime_spec(efftime)
    }

    #[test]
    fn test_highest_efftime_wins() {
        let store = MemoryStore::new();
        store
            .ztile_insert_many(&[
                make_test_ztile(7, 100, 20210610, 120.0),
                make_test_ztile(7, 200, 20210620, 80.0),
            ])
            .unwrap();
        let stats = select_ztile_primaries(&store, &PrimaryPolicy::default()).unwrap();
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.rows_updated, 2);

        let key = ObjectKey::new(7, Survey::Sv1, Program::Bright);
        let rows = store.ztile_for_object(&key).unwrap();
        for row in &rows {
            assert_eq!(row.zcat_nspec, 2);
            assert_eq!(row.zcat_primary, row.tileid == 100);
        }
    }

    #[test]
    fn test_recency_breaks_efftime_tie() {
        let store = MemoryStore::new();
        store
            .ztile_insert_many(&[
                make_test_ztile(7, 100, 20210610, 120.0),
                make_test_ztile(7, 200, 20210620, 120.0),
            ])
            .unwrap();
        select_ztile_primaries(&store, &PrimaryPolicy::default()).unwrap();
        let key = ObjectKey::new(7, Survey::Sv1, Program::Bright);
        let primary: Vec<i32> = store
            .ztile_for_object(&key)
            .unwrap()
            .iter()
            .filter(|r| r.zcat_primary)
            .map(|r| r.tileid)
            .collect();
        assert_eq!(primary, vec![200]);
    }

    #[test]
    fn test_new_observation_displaces_primary() {
        let store = MemoryStore::new();
        store
            .ztile_insert_many(&[make_test_ztile(7, 100, 20210610, 80.0)])
            .unwrap();
        select_ztile_primaries(&store, &PrimaryPolicy::default()).unwrap();

        store
            .ztile_insert_many(&[make_test_ztile(7, 200, 20210620, 120.0)])
            .unwrap();
        select_ztile_primaries(&store, &PrimaryPolicy::default()).unwrap();

        let key = ObjectKey::new(7, Survey::Sv1, Program::Bright);
        for row in store.ztile_for_object(&key).unwrap() {
            assert_eq!(row.zcat_primary, row.tileid == 200);
            assert_eq!(row.zcat_nspec, 2);
        }
    }

    #[test]
    fn test_sv_and_main_counters_span_surveys() {
        let store = MemoryStore::new();
        store
            .zpix_insert_many(&[
                Zpix::new(7, Survey::Sv1, Program::Bright, 1).with_observation(80.0, 59370.0),
                Zpix::new(7, Survey::Sv3, Program::Bright, 1).with_observation(120.0, 59380.0),
                Zpix::new(7, Survey::Main, Program::Bright, 1).with_observation(60.0, 59390.0),
            ])
            .unwrap();
        select_zpix_primaries(&store, &PrimaryPolicy::default()).unwrap();

        let rows = store.zpix_all().unwrap();
        for row in &rows {
            // Each (targetid, survey, program) group is a singleton.
            assert_eq!(row.zcat_nspec, 1);
            assert!(row.zcat_primary);
            match row.survey {
                Survey::Sv1 => {
                    assert_eq!(row.sv_nspec, 2);
                    assert!(!row.sv_primary);
                    assert_eq!(row.main_nspec, 0);
                }
                Survey::Sv3 => {
                    assert_eq!(row.sv_nspec, 2);
                    assert!(row.sv_primary);
                }
                Survey::Main => {
                    assert_eq!(row.main_nspec, 1);
                    assert!(row.main_primary);
                    assert_eq!(row.sv_nspec, 0);
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn test_tie_break_policy_is_deterministic() {
        let rows = vec![
            make_test_ztile(7, 100, 20210610, 120.0),
            make_test_ztile(7, 200, 20210610, 120.0),
        ];
        let descending = PrimaryPolicy::default();
        let ascending = PrimaryPolicy {
            tie_break: TieBreak::RowIdAscending,
        };
        let (desc_updates, _) = compute_updates(&rows, &descending).unwrap();
        let (asc_updates, _) = compute_updates(&rows, &ascending).unwrap();
        let desc_primary: Vec<bool> = desc_updates.iter().map(|(_, u)| u.zcat_primary).collect();
        let asc_primary: Vec<bool> = asc_updates.iter().map(|(_, u)| u.zcat_primary).collect();
        assert_ne!(desc_primary, asc_primary);
        assert_eq!(desc_primary.iter().filter(|p| **p).count(), 1);
        assert_eq!(asc_primary.iter().filter(|p| **p).count(), 1);
    }

    #[test]
    fn test_true_tie_is_fatal() {
        // Duplicate row ids cannot come out of the store; feed them in
        // directly to exercise the defense.
        let rows = vec![
            make_test_ztile(7, 100, 20210610, 120.0),
            make_test_ztile(7, 100, 20210610, 120.0),
        ];
        let err = compute_updates(&rows, &PrimaryPolicy::default()).unwrap_err();
        assert!(matches!(err, LoadError::TieExhausted { targetid: 7 }));
    }

    proptest! {
        #[test]
        fn prop_exactly_one_primary_per_group(
            efftimes in proptest::collection::vec((1i64..5, 0.0f64..500.0, 20210601i32..20210630), 1..30),
        ) {
            let store = MemoryStore::new();
            for (i, (targetid, efftime, night)) in efftimes.iter().enumerate() {
                let row = make_test_ztile(*targetid, i as i32 + 1, *night, *efftime);
                store.ztile_insert_many(&[row]).unwrap();
            }
            select_ztile_primaries(&store, &PrimaryPolicy::default()).unwrap();

            let mut primaries: BTreeMap<ObjectKey, usize> = BTreeMap::new();
            let mut sizes: BTreeMap<ObjectKey, usize> = BTreeMap::new();
            for row in store.ztile_all().unwrap() {
                *sizes.entry(row.object_key()).or_default() += 1;
                if row.zcat_primary {
                    *primaries.entry(row.object_key()).or_default() += 1;
                }
            }
            for (key, size) in sizes {
                prop_assert_eq!(primaries.get(&key), Some(&1usize), "group {:?} of size {}", key, size);
            }
        }
    }
}
