//! Packed composite row ids
//!
//! Several tables have no single-column natural key, so a 128-bit surrogate
//! is packed from the key tuple with shift-and-or. The layouts are arbitrary
//! but fixed; ids stored in one production must decode in the next.

use crate::{Camera, Program, SpectralGroup, Survey};

/// Bit position of the sky-target flag inside a target id.
const SKY_BIT: i64 = 1 << 59;

/// Sentinel value encoded in bits 42..58 of defective target-of-opportunity
/// target ids.
const TOO_SENTINEL: i64 = 9999;

// ==== FRAME IDS ====

/// Integer key for a frame row: `100 * expid + camera id`.
pub fn frame_row_id(expid: i64, camera: Camera) -> i64 {
    100 * expid + i64::from(camera.id())
}

/// Split a frame row id back into exposure id and camera.
pub fn decode_frame_row_id(id: i64) -> (i64, Option<Camera>) {
    (id / 100, Camera::from_id((id % 100) as i32))
}

// ==== 128-BIT ROW IDS ====

/// Row id for a target (tile-assignment) row.
///
/// Layout: `survey << 96 | tileid << 64 | targetid`. An unknown survey packs
/// as code 0; such rows are normalized away before loading.
pub fn target_row_id(targetid: i64, tileid: i32, survey: Survey) -> u128 {
    (survey.code().unwrap_or(0) as u128) << 96
        | (tileid as u32 as u128) << 64
        | targetid as u64 as u128
}

/// Decode a target row id into (targetid, tileid, survey).
pub fn decode_target_row_id(id: u128) -> (i64, i32, Option<Survey>) {
    let targetid = id as u64 as i64;
    let tileid = (id >> 64) as u32 as i32;
    let survey = Survey::from_code((id >> 96) as i64);
    (targetid, tileid, survey)
}

/// Row id for a per-healpix redshift row.
///
/// Layout: `program << 96 | survey << 64 | targetid`.
pub fn zpix_row_id(targetid: i64, survey: Survey, program: Program) -> u128 {
    (program.code() as u128) << 96
        | (survey.code().unwrap_or(0) as u64 as u128) << 64
        | targetid as u64 as u128
}

/// Decode a per-healpix redshift row id into (targetid, survey, program).
pub fn decode_zpix_row_id(id: u128) -> (i64, Option<Survey>, Option<Program>) {
    let targetid = id as u64 as i64;
    let survey = Survey::from_code((id >> 64) as u32 as i64);
    let program = Program::from_code((id >> 96) as i64);
    (targetid, survey, program)
}

/// Row id for a per-tile redshift row.
///
/// The spectral group and its value share the top 32 bits, with the group
/// code above bit 27 so group values up to 2^27 fit below it.
pub fn ztile_row_id(targetid: i64, spgrp: SpectralGroup, spgrpval: i32, tileid: i32) -> u128 {
    let grouped = (spgrp.code() << 27) | i64::from(spgrpval);
    (grouped as u128) << 96 | (tileid as u32 as u128) << 64 | targetid as u64 as u128
}

/// Decode a per-tile redshift row id into (targetid, spgrp, spgrpval, tileid).
pub fn decode_ztile_row_id(id: u128) -> (i64, Option<SpectralGroup>, i32, i32) {
    let targetid = id as u64 as i64;
    let tileid = (id >> 64) as u32 as i32;
    let grouped = (id >> 96) as i64;
    let spgrp = SpectralGroup::from_code(grouped >> 27);
    let spgrpval = (grouped & ((1 << 27) - 1)) as i32;
    (targetid, spgrp, spgrpval, tileid)
}

/// Row id for a fiber-assignment or potential-assignment row.
///
/// Layout: `location << 96 | tileid << 64 | targetid`.
pub fn assignment_row_id(targetid: i64, tileid: i32, location: i32) -> u128 {
    (location as u32 as u128) << 96
        | (tileid as u32 as u128) << 64
        | targetid as u64 as u128
}

// ==== TARGET ID PREDICATES ====

/// Known defect: target-of-opportunity ids minted with a sentinel in bits
/// 42..58. Affected rows can carry all-zero targeting bitmasks.
pub fn is_sentinel_too(targetid: i64) -> bool {
    (targetid >> 42) & 0xffff == TOO_SENTINEL
}

/// Row filter for redshift loading: positive id with the sky bit clear.
pub fn is_loadable_target(targetid: i64) -> bool {
    targetid > 0 && targetid & SKY_BIT == 0
}
