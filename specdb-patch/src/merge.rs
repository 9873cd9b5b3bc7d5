//! Cross-production table patching
//!
//! Merges a finalized production's tables (the source) into a still
//! accumulating production's tables (the destination). Every destination
//! row is kept; masked or non-finite destination cells are filled from the
//! matching source row. A backward pass then recomputes tile aggregates
//! from the corrected exposures, since forward filling can change what the
//! correct aggregate is.
//!
//! The destination data is assumed clean enough that one forward plus one
//! backward sweep converges; residual problems are reported, not iterated.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use specdb_core::{valid_value, Exposure, Frame, Program, Survey, Tile};

use crate::report::{Inconsistency, PatchReport, Patchability};

/// Aggregate comparison tolerance. Sums recomputed from the same cells can
/// pick up float noise without representing real drift.
const EFFTIME_TOLERANCE: f64 = 1e-6;

/// The three patchable summary tables of one production.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionTables {
    pub production: String,
    pub tiles: Vec<Tile>,
    pub exposures: Vec<Exposure>,
    pub frames: Vec<Frame>,
}

impl ProductionTables {
    pub fn new(production: &str) -> ProductionTables {
        ProductionTables {
            production: production.to_string(),
            tiles: Vec::new(),
            exposures: Vec::new(),
            frames: Vec::new(),
        }
    }
}

fn differs(stored: Option<f64>, computed: f64) -> bool {
    match valid_value(stored) {
        Some(v) => (v - computed).abs() > EFFTIME_TOLERANCE,
        None => true,
    }
}

/// Patch frame rows, matching on (exposure id, camera).
pub fn patch_frames(src: &[Frame], dst: &[Frame], report: &mut PatchReport) -> Vec<Frame> {
    let src_by_id: BTreeMap<i64, &Frame> = src.iter().map(|f| (f.row_id(), f)).collect();
    let mut patched = Vec::with_capacity(dst.len());
    for frame in dst {
        let mut frame = frame.clone();
        if let Some(src_frame) = src_by_id.get(&frame.row_id()) {
            let mut changed = false;
            if valid_value(frame.mjd).is_none() && valid_value(src_frame.mjd).is_some() {
                debug!(expid = frame.expid, camera = %frame.camera, "patching frame MJD");
                frame.mjd = src_frame.mjd;
                changed = true;
            }
            if frame.survey == Survey::Unknown && src_frame.survey != Survey::Unknown {
                frame.survey = src_frame.survey;
                frame.program = src_frame.program;
                changed = true;
            }
            if changed {
                report.frames_patched += 1;
            }
        }
        patched.push(frame);
    }
    patched
}

/// Back-fill frame MJDs from their owning exposure.
///
/// Runs after exposure patching so the parent value is as good as it gets.
/// Frames whose exposure also has no usable MJD are reported.
pub fn backfill_frame_mjd(frames: &mut [Frame], exposures: &[Exposure], report: &mut PatchReport) {
    let by_expid: BTreeMap<i64, &Exposure> = exposures.iter().map(|e| (e.expid, e)).collect();
    for frame in frames.iter_mut() {
        if valid_value(frame.mjd).is_some() {
            continue;
        }
        match by_expid.get(&frame.expid).and_then(|e| valid_value(e.mjd)) {
            Some(mjd) => {
                debug!(expid = frame.expid, camera = %frame.camera, mjd, "back-filling frame MJD from exposure");
                frame.mjd = Some(mjd);
                report.frames_patched += 1;
            }
            None => report.push(Inconsistency::MissingMjd {
                expid: frame.expid,
                camera: Some(frame.camera),
            }),
        }
    }
}

/// Patch exposure rows, matching on exposure id.
///
/// Labels that identify what was observed (program, fiberassign program and
/// flavor) must survive patching unchanged; a source row that disagrees
/// with a present destination label is reported and the destination value
/// kept. Cells still masked after the fill are zeroed, also with a report.
pub fn patch_exposures(src: &[Exposure], dst: &[Exposure], report: &mut PatchReport) -> Vec<Exposure> {
    let src_by_id: BTreeMap<i64, &Exposure> = src.iter().map(|e| (e.expid, e)).collect();
    let mut patched = Vec::with_capacity(dst.len());
    for exposure in dst {
        let mut exposure = exposure.clone();
        if let Some(src_exposure) = src_by_id.get(&exposure.expid) {
            let mut changed = false;
            if exposure.tileid.is_none() && src_exposure.tileid.is_some() {
                exposure.tileid = src_exposure.tileid;
                changed = true;
            }
            if valid_value(exposure.mjd).is_none() && valid_value(src_exposure.mjd).is_some() {
                info!(expid = exposure.expid, "patching exposure MJD");
                exposure.mjd = src_exposure.mjd;
                changed = true;
            }
            if valid_value(exposure.efftime_spec).is_none()
                && valid_value(src_exposure.efftime_spec).is_some()
            {
                exposure.efftime_spec = src_exposure.efftime_spec;
                changed = true;
            }
            if exposure.survey == Survey::Unknown && src_exposure.survey != Survey::Unknown {
                exposure.survey = src_exposure.survey;
                changed = true;
            }
            if exposure.faprgrm.is_none() && src_exposure.faprgrm.is_some() {
                exposure.faprgrm = src_exposure.faprgrm.clone();
                changed = true;
            }
            if exposure.faflavor.is_none() && src_exposure.faflavor.is_some() {
                exposure.faflavor = src_exposure.faflavor.clone();
                changed = true;
            }
            if changed {
                report.exposures_patched += 1;
            }

            if exposure.program != src_exposure.program {
                report.push(Inconsistency::LabelChanged {
                    expid: exposure.expid,
                    column: "program",
                    destination: exposure.program.to_string(),
                    source: src_exposure.program.to_string(),
                });
            }
            if let (Some(dst_prgrm), Some(src_prgrm)) = (&exposure.faprgrm, &src_exposure.faprgrm) {
                if dst_prgrm != src_prgrm {
                    report.push(Inconsistency::LabelChanged {
                        expid: exposure.expid,
                        column: "faprgrm",
                        destination: dst_prgrm.clone(),
                        source: src_prgrm.clone(),
                    });
                }
            }
            if let (Some(dst_flavor), Some(src_flavor)) = (&exposure.faflavor, &src_exposure.faflavor) {
                if dst_flavor != src_flavor {
                    report.push(Inconsistency::LabelChanged {
                        expid: exposure.expid,
                        column: "faflavor",
                        destination: dst_flavor.clone(),
                        source: src_flavor.clone(),
                    });
                }
            }
        }

        // Residual masked effective time means no production ever measured
        // it; zero is the conservative fill. MJD is left masked because a
        // fake date would poison recency ordering downstream.
        if exposure.efftime_spec.is_none() {
            exposure.efftime_spec = Some(0.0);
            report.push(Inconsistency::ResidualMask {
                table: "exposure",
                key: exposure.expid.to_string(),
                column: "efftime_spec",
            });
        }
        if valid_value(exposure.mjd).is_none() {
            report.push(Inconsistency::MissingMjd {
                expid: exposure.expid,
                camera: None,
            });
        }
        patched.push(exposure);
    }
    patched
}

/// Patch tile rows, matching on tile id.
///
/// The tile program is rederived from the fiberassign flavor, and the
/// placeholder survey label left by early operations data is normalized to
/// the commissioning survey.
pub fn patch_tiles(src: &[Tile], dst: &[Tile], report: &mut PatchReport) -> Vec<Tile> {
    let src_by_id: BTreeMap<i32, &Tile> = src.iter().map(|t| (t.tileid, t)).collect();
    let mut patched = Vec::with_capacity(dst.len());
    for tile in dst {
        let mut tile = tile.clone();
        if let Some(src_tile) = src_by_id.get(&tile.tileid) {
            let mut changed = false;
            if valid_value(tile.efftime_spec).is_none()
                && valid_value(src_tile.efftime_spec).is_some()
            {
                tile.efftime_spec = src_tile.efftime_spec;
                changed = true;
            }
            if tile.faprgrm.is_none() && src_tile.faprgrm.is_some() {
                tile.faprgrm = src_tile.faprgrm.clone();
                changed = true;
            }
            if tile.faflavor.is_none() && src_tile.faflavor.is_some() {
                tile.faflavor = src_tile.faflavor.clone();
                changed = true;
            }
            if tile.goaltype.is_none() && src_tile.goaltype.is_some() {
                tile.goaltype = src_tile.goaltype.clone();
                changed = true;
            }
            if changed {
                report.tiles_patched += 1;
            }
        }

        if let Some(faflavor) = &tile.faflavor {
            tile.program = Program::from_flavor(faflavor);
        }
        if tile.survey == Survey::Unknown {
            warn!(tileid = tile.tileid, "normalizing placeholder survey label");
            tile.survey = Survey::Cmx;
            report.push(Inconsistency::SurveyNormalized {
                tileid: tile.tileid,
                normalized_to: Survey::Cmx,
            });
        }
        patched.push(tile);
    }
    patched
}

/// Backward pass: recompute each tile's effective-time aggregate from its
/// label-consistent exposures and push corrections back onto the rows.
///
/// A tile claiming non-zero effective time with no qualifying exposure at
/// all is a hard inconsistency, classified by how much of the tile the
/// source production could still repair.
pub fn back_patch(
    tiles: &mut [Tile],
    exposures: &mut [Exposure],
    src_exposures: &[Exposure],
    report: &mut PatchReport,
) {
    let src_by_id: BTreeMap<i64, &Exposure> =
        src_exposures.iter().map(|e| (e.expid, e)).collect();

    let mut by_tile: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, exposure) in exposures.iter().enumerate() {
        if let Some(tileid) = exposure.tileid {
            by_tile.entry(tileid).or_default().push(i);
        }
    }

    for tile in tiles.iter_mut() {
        let indices = by_tile.get(&tile.tileid).cloned().unwrap_or_default();

        // Exposures inheriting the placeholder survey take their tile's.
        for &i in &indices {
            if exposures[i].survey == Survey::Unknown {
                exposures[i].survey = tile.survey;
                report.exposures_patched += 1;
            }
        }

        let mut consistent = Vec::new();
        for &i in &indices {
            let exposure = &exposures[i];
            if exposure.survey == tile.survey && exposure.program == tile.program {
                consistent.push(i);
            } else {
                report.push(Inconsistency::LabelMismatch {
                    tileid: tile.tileid,
                    expid: exposure.expid,
                    tile_survey: tile.survey,
                    tile_program: tile.program,
                    exposure_survey: exposure.survey,
                    exposure_program: exposure.program,
                });
            }
        }

        let qualifying = consistent.iter().any(|&i| exposures[i].qualifies());
        let claimed = valid_value(tile.efftime_spec).unwrap_or(0.0);

        if !qualifying && claimed > 0.0 {
            let exposure_ids: Vec<i64> = indices.iter().map(|&i| exposures[i].expid).collect();
            let source_covered: Vec<i64> = exposure_ids
                .iter()
                .copied()
                .filter(|expid| {
                    src_by_id
                        .get(expid)
                        .is_some_and(|e| valid_value(e.efftime_spec).is_some())
                })
                .collect();
            let patchability = if !exposure_ids.is_empty() && source_covered.len() == exposure_ids.len() {
                Patchability::Full
            } else if !source_covered.is_empty() {
                Patchability::Partial
            } else {
                Patchability::Unpatchable
            };
            warn!(
                tileid = tile.tileid,
                efftime_spec = claimed,
                ?patchability,
                "tile claims effective time with no qualifying exposure"
            );
            report.push(Inconsistency::OrphanEffectiveTime {
                tileid: tile.tileid,
                efftime_spec: claimed,
                exposure_ids,
                source_covered,
                patchability,
            });
            continue;
        }

        let computed: f64 = consistent
            .iter()
            .filter_map(|&i| valid_value(exposures[i].efftime_spec))
            .sum();
        if differs(tile.efftime_spec, computed) {
            report.push(Inconsistency::AggregateDrift {
                tileid: tile.tileid,
                stored: tile.efftime_spec,
                computed,
            });
            tile.efftime_spec = Some(computed);
            report.tiles_patched += 1;
        }
    }
}

/// One full patch sweep: forward fill all three tables, then back-patch.
pub fn patch_production(
    src: &ProductionTables,
    dst: &ProductionTables,
) -> (ProductionTables, PatchReport) {
    info!(
        source = %src.production,
        destination = %dst.production,
        "patching production tables"
    );
    let mut report = PatchReport::new();
    let mut frames = patch_frames(&src.frames, &dst.frames, &mut report);
    let mut exposures = patch_exposures(&src.exposures, &dst.exposures, &mut report);
    let mut tiles = patch_tiles(&src.tiles, &dst.tiles, &mut report);
    backfill_frame_mjd(&mut frames, &exposures, &mut report);
    back_patch(&mut tiles, &mut exposures, &src.exposures, &mut report);
    info!(
        tiles = report.tiles_patched,
        exposures = report.exposures_patched,
        frames = report.frames_patched,
        findings = report.len(),
        "patch sweep complete"
    );
    (
        ProductionTables {
            production: dst.production.clone(),
            tiles,
            exposures,
            frames,
        },
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use specdb_core::{Arm, Camera};

    fn make_test_exposure(expid: i64, tileid: i32, efftime: f64) -> Exposure {
        Exposure::new(expid, 20210610, Survey::Sv1, Program::Bright)
            .with_tileid(tileid)
            .with_mjd(59375.5)
            .with_efftime_spec(efftime)
            .with_flavor("bright", "sv1bgsbright")
    }

    fn make_test_tile(tileid: i32, efftime: f64) -> Tile {
        Tile::new(tileid, Survey::Sv1, Program::Bright, 20210610)
            .with_efftime_spec(efftime)
            .with_flavor("bright", "sv1bgsbright")
    }

    fn make_test_frame(expid: i64, camera: Camera) -> Frame {
        Frame::new(expid, camera, 20210610)
            .with_labels(Survey::Sv1, Program::Bright)
    }

    fn make_test_productions() -> (ProductionTables, ProductionTables) {
        let mut src = ProductionTables::new("jura");
        src.exposures = vec![make_test_exposure(1, 80615, 120.0), make_test_exposure(2, 80615, 0.0)];
        src.tiles = vec![make_test_tile(80615, 120.0)];
        src.frames = vec![
            make_test_frame(1, Camera::new(Arm::B, 0)).with_mjd(59375.5),
            make_test_frame(2, Camera::new(Arm::B, 0)).with_mjd(59375.6),
        ];

        let mut dst = ProductionTables::new("daily");
        let mut dst_exp_1 = make_test_exposure(1, 80615, 120.0);
        dst_exp_1.mjd = None;
        let dst_exp_2 = make_test_exposure(2, 80615, 0.0);
        let mut dst_tile = make_test_tile(80615, 120.0);
        dst_tile.efftime_spec = None;
        dst.exposures = vec![dst_exp_1, dst_exp_2];
        dst.tiles = vec![dst_tile];
        dst.frames = vec![
            make_test_frame(1, Camera::new(Arm::B, 0)),
            make_test_frame(2, Camera::new(Arm::B, 0)),
        ];
        (src, dst)
    }

    #[test]
    fn test_forward_fill_from_source() {
        let (src, dst) = make_test_productions();
        let (patched, _report) = patch_production(&src, &dst);
        assert_eq!(patched.exposures[0].mjd, Some(59375.5));
        assert_eq!(patched.tiles[0].efftime_spec, Some(120.0));
        // Frame MJD comes from the matching source frame.
        assert_eq!(patched.frames[0].mjd, Some(59375.5));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let (src, dst) = make_test_productions();
        let (once, _) = patch_production(&src, &dst);
        let (twice, report) = patch_production(&src, &once);
        assert_eq!(once, twice);
        assert_eq!(report.tiles_patched, 0);
        assert_eq!(report.exposures_patched, 0);
        assert_eq!(report.frames_patched, 0);
    }

    #[test]
    fn test_tile_80615_aggregate() {
        // Two exposures, 120.0 and 0.0; the aggregate must be 120.0 and
        // only the non-zero exposure qualifies for load.
        let (src, dst) = make_test_productions();
        let (patched, _) = patch_production(&src, &dst);
        assert_eq!(patched.tiles[0].efftime_spec, Some(120.0));
        let qualifying: Vec<i64> = patched
            .exposures
            .iter()
            .filter(|e| e.qualifies())
            .map(|e| e.expid)
            .collect();
        assert_eq!(qualifying, vec![1]);
    }

    #[test]
    fn test_label_mismatch_excluded_from_aggregate() {
        let mut tiles = vec![make_test_tile(80615, 200.0)];
        let mut exposures = vec![
            make_test_exposure(1, 80615, 120.0),
            Exposure::new(2, 20210610, Survey::Sv1, Program::Dark)
                .with_tileid(80615)
                .with_mjd(59375.6)
                .with_efftime_spec(80.0),
        ];
        let mut report = PatchReport::new();
        back_patch(&mut tiles, &mut exposures, &[], &mut report);

        assert_eq!(tiles[0].efftime_spec, Some(120.0));
        assert!(report
            .iter()
            .any(|i| matches!(i, Inconsistency::LabelMismatch { expid: 2, .. })));
    }

    #[test]
    fn test_orphan_tile_classification() {
        // Tile claims time but every exposure has zero; source covers one
        // of the two exposures.
        let mut tiles = vec![make_test_tile(80615, 120.0)];
        let mut exposures = vec![
            make_test_exposure(1, 80615, 0.0),
            make_test_exposure(2, 80615, 0.0),
        ];
        let src = vec![make_test_exposure(1, 80615, 120.0)];
        let mut report = PatchReport::new();
        back_patch(&mut tiles, &mut exposures, &src, &mut report);

        assert!(report.has_hard_inconsistencies());
        match report.iter().find(|i| i.is_hard()) {
            Some(Inconsistency::OrphanEffectiveTime {
                tileid,
                exposure_ids,
                source_covered,
                patchability,
                ..
            }) => {
                assert_eq!(*tileid, 80615);
                assert_eq!(exposure_ids, &vec![1, 2]);
                assert_eq!(source_covered, &vec![1]);
                assert_eq!(*patchability, Patchability::Partial);
            }
            other => panic!("expected orphan finding, got {:?}", other),
        }
        // The claimed aggregate is left for a human, not zeroed.
        assert_eq!(tiles[0].efftime_spec, Some(120.0));
    }

    #[test]
    fn test_tile_program_rederived_and_survey_normalized() {
        let mut tile = Tile::new(1, Survey::Unknown, Program::Other, 20201215)
            .with_flavor("bright", "cmxm450")
            .with_efftime_spec(0.0);
        tile.faflavor = Some("sv1elg".to_string());
        let mut report = PatchReport::new();
        let patched = patch_tiles(&[], &[tile], &mut report);
        assert_eq!(patched[0].program, Program::Dark);
        assert_eq!(patched[0].survey, Survey::Cmx);
        assert!(report
            .iter()
            .any(|i| matches!(i, Inconsistency::SurveyNormalized { tileid: 1, .. })));
    }

    #[test]
    fn test_residual_efftime_zero_filled() {
        let exposure = Exposure::new(5, 20210610, Survey::Sv1, Program::Bright)
            .with_tileid(80615)
            .with_mjd(59375.5);
        let mut report = PatchReport::new();
        let patched = patch_exposures(&[], &[exposure], &mut report);
        assert_eq!(patched[0].efftime_spec, Some(0.0));
        assert!(report
            .iter()
            .any(|i| matches!(i, Inconsistency::ResidualMask { column: "efftime_spec", .. })));
    }

    #[test]
    fn test_label_disagreement_reported_not_applied() {
        let src = vec![make_test_exposure(1, 80615, 120.0).with_flavor("dark", "sv1elg")];
        let dst = vec![make_test_exposure(1, 80615, 120.0)];
        let mut report = PatchReport::new();
        let patched = patch_exposures(&src, &dst, &mut report);
        assert_eq!(patched[0].faprgrm.as_deref(), Some("bright"));
        assert!(report
            .iter()
            .any(|i| matches!(i, Inconsistency::LabelChanged { column: "faprgrm", .. })));
    }

    proptest! {
        // After back-patching, every tile without a hard inconsistency
        // carries exactly the sum over its label-consistent exposures.
        #[test]
        fn prop_aggregate_matches_exposures(
            efftimes in proptest::collection::vec(0.0f64..1000.0, 1..8),
            claimed in 0.0f64..2000.0,
        ) {
            let mut tiles = vec![make_test_tile(80615, claimed)];
            let mut exposures: Vec<Exposure> = efftimes
                .iter()
                .enumerate()
                .map(|(i, &t)| make_test_exposure(i as i64 + 1, 80615, t))
                .collect();
            let mut report = PatchReport::new();
            back_patch(&mut tiles, &mut exposures, &[], &mut report);

            if !report.has_hard_inconsistencies() {
                let expected: f64 = efftimes.iter().sum();
                let stored = tiles[0].efftime_spec.unwrap();
                prop_assert!((stored - expected).abs() <= EFFTIME_TOLERANCE);
            }
        }
    }
}
