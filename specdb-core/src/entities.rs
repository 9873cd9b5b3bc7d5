//! Core entity structures
//!
//! One struct per table in the production database. Keyed fields are set by
//! upstream processing and never change; the reconciliation passes only
//! update the specific non-key fields called out on each type.
//!
//! Numeric fields that upstream tables can mask are `Option`: `None` means
//! the cell was masked, while a stored NaN or infinity means the value was
//! present but unusable. [`valid_value`] collapses the two cases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids;
use crate::{Camera, Program, SpectralGroup, Survey, TargetBits, ZWarn};

/// A masked (`None`) or non-finite value is unusable and eligible for
/// patching; anything else passes through.
pub fn valid_value(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Identity of an astronomical object within one production.
///
/// Targeting bitmasks and primary selection both group by this key, not by
/// tile, because the same object is observed on many tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub targetid: i64,
    pub survey: Survey,
    pub program: Program,
}

impl ObjectKey {
    pub fn new(targetid: i64, survey: Survey, program: Program) -> ObjectKey {
        ObjectKey {
            targetid,
            survey,
            program,
        }
    }
}

/// Exposure - one telescope pointing and readout.
///
/// The survey/program/flavor labels of an exposure with a tile id must match
/// its owning tile; mismatches are surfaced by the patch pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub expid: i64,
    pub night: i32,
    pub tileid: Option<i32>,
    pub mjd: Option<f64>,
    pub survey: Survey,
    pub program: Program,
    pub faprgrm: Option<String>,
    pub faflavor: Option<String>,
    pub efftime_spec: Option<f64>,
}

impl Exposure {
    pub fn new(expid: i64, night: i32, survey: Survey, program: Program) -> Exposure {
        Exposure {
            expid,
            night,
            tileid: None,
            mjd: None,
            survey,
            program,
            faprgrm: None,
            faflavor: None,
            efftime_spec: None,
        }
    }

    pub fn with_tileid(mut self, tileid: i32) -> Self {
        self.tileid = Some(tileid);
        self
    }

    pub fn with_mjd(mut self, mjd: f64) -> Self {
        self.mjd = Some(mjd);
        self
    }

    pub fn with_efftime_spec(mut self, efftime_spec: f64) -> Self {
        self.efftime_spec = Some(efftime_spec);
        self
    }

    pub fn with_flavor(mut self, faprgrm: &str, faflavor: &str) -> Self {
        self.faprgrm = Some(faprgrm.to_string());
        self.faflavor = Some(faflavor.to_string());
        self
    }

    /// An exposure contributes to its tile's aggregate only when it has
    /// usable, non-zero effective time.
    pub fn qualifies(&self) -> bool {
        valid_value(self.efftime_spec).is_some_and(|t| t > 0.0)
    }
}

/// Frame - one camera's data product from one exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub expid: i64,
    pub camera: Camera,
    pub night: i32,
    pub mjd: Option<f64>,
    pub survey: Survey,
    pub program: Program,
}

impl Frame {
    pub fn new(expid: i64, camera: Camera, night: i32) -> Frame {
        Frame {
            expid,
            camera,
            night,
            mjd: None,
            survey: Survey::Unknown,
            program: Program::Other,
        }
    }

    pub fn with_mjd(mut self, mjd: f64) -> Self {
        self.mjd = Some(mjd);
        self
    }

    pub fn with_labels(mut self, survey: Survey, program: Program) -> Self {
        self.survey = survey;
        self.program = program;
        self
    }

    pub fn row_id(&self) -> i64 {
        ids::frame_row_id(self.expid, self.camera)
    }
}

/// Tile - one sky-coverage unit.
///
/// `efftime_spec` is an aggregate over the tile's qualifying exposures and
/// is recomputed by the back-patch pass whenever exposure values change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub tileid: i32,
    pub survey: Survey,
    pub program: Program,
    pub faprgrm: Option<String>,
    pub faflavor: Option<String>,
    pub goaltype: Option<String>,
    pub lastnight: i32,
    pub efftime_spec: Option<f64>,
    pub updated: DateTime<Utc>,
}

impl Tile {
    pub fn new(tileid: i32, survey: Survey, program: Program, lastnight: i32) -> Tile {
        Tile {
            tileid,
            survey,
            program,
            faprgrm: None,
            faflavor: None,
            goaltype: None,
            lastnight,
            efftime_spec: None,
            updated: Utc::now(),
        }
    }

    pub fn with_efftime_spec(mut self, efftime_spec: f64) -> Self {
        self.efftime_spec = Some(efftime_spec);
        self
    }

    pub fn with_flavor(mut self, faprgrm: &str, faflavor: &str) -> Self {
        self.faprgrm = Some(faprgrm.to_string());
        self.faflavor = Some(faflavor.to_string());
        self
    }

    pub fn with_goaltype(mut self, goaltype: &str) -> Self {
        self.goaltype = Some(goaltype.to_string());
        self
    }

    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = updated;
        self
    }
}

/// Target - one object's tile-assignment record.
///
/// The bitmask columns are expected to be identical across every row sharing
/// an [`ObjectKey`]; the reconciler exists because they sometimes are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub targetid: i64,
    pub survey: Survey,
    pub program: Program,
    pub tileid: i32,
    pub bits: TargetBits,
    pub obsconditions: i64,
    pub priority_init: i64,
    pub numobs_init: i64,
}

impl Target {
    pub fn new(targetid: i64, survey: Survey, program: Program, tileid: i32) -> Target {
        Target {
            targetid,
            survey,
            program,
            tileid,
            bits: TargetBits::default(),
            obsconditions: 0,
            priority_init: 0,
            numobs_init: 0,
        }
    }

    pub fn with_bits(mut self, bits: TargetBits) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_priority(mut self, priority_init: i64, numobs_init: i64) -> Self {
        self.priority_init = priority_init;
        self.numobs_init = numobs_init;
        self
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.targetid, self.survey, self.program)
    }

    pub fn row_id(&self) -> u128 {
        ids::target_row_id(self.targetid, self.tileid, self.survey)
    }
}

/// Fiberassign - one fiber actually assigned to a target on a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiberassign {
    pub tileid: i32,
    pub targetid: i64,
    pub location: i32,
    pub fiber: i32,
}

impl Fiberassign {
    pub fn new(tileid: i32, targetid: i64, location: i32, fiber: i32) -> Fiberassign {
        Fiberassign {
            tileid,
            targetid,
            location,
            fiber,
        }
    }

    pub fn row_id(&self) -> u128 {
        ids::assignment_row_id(self.targetid, self.tileid, self.location)
    }
}

/// Potential - a target reachable by a fiber on a tile, assigned or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Potential {
    pub tileid: i32,
    pub targetid: i64,
    pub location: i32,
}

impl Potential {
    pub fn new(tileid: i32, targetid: i64, location: i32) -> Potential {
        Potential {
            tileid,
            targetid,
            location,
        }
    }

    pub fn row_id(&self) -> u128 {
        ids::assignment_row_id(self.targetid, self.tileid, self.location)
    }
}

/// Zpix - canonical per-healpix redshift record, one per object.
///
/// The reconciler overwrites `bits`; the primary selector owns the `*_nspec`
/// and `*_primary` fields. Everything else is immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zpix {
    pub targetid: i64,
    pub survey: Survey,
    pub program: Program,
    pub healpix: i32,
    pub z: f64,
    pub zerr: f64,
    pub zwarn: ZWarn,
    pub spectype: String,
    pub subtype: String,
    pub bits: TargetBits,
    /// Latest MJD among the coadded observations, used as the recency
    /// tie-break in primary selection.
    pub max_mjd: f64,
    pub efftime_spec: f64,
    pub zcat_nspec: i32,
    pub zcat_primary: bool,
    pub sv_nspec: i32,
    pub sv_primary: bool,
    pub main_nspec: i32,
    pub main_primary: bool,
}

impl Zpix {
    pub fn new(targetid: i64, survey: Survey, program: Program, healpix: i32) -> Zpix {
        Zpix {
            targetid,
            survey,
            program,
            healpix,
            z: 0.0,
            zerr: 0.0,
            zwarn: ZWarn::empty(),
            spectype: String::new(),
            subtype: String::new(),
            bits: TargetBits::default(),
            max_mjd: 0.0,
            efftime_spec: 0.0,
            zcat_nspec: 0,
            zcat_primary: false,
            sv_nspec: 0,
            sv_primary: false,
            main_nspec: 0,
            main_primary: false,
        }
    }

    pub fn with_redshift(mut self, z: f64, zerr: f64, zwarn: ZWarn) -> Self {
        self.z = z;
        self.zerr = zerr;
        self.zwarn = zwarn;
        self
    }

    pub fn with_spectype(mut self, spectype: &str, subtype: &str) -> Self {
        self.spectype = spectype.to_string();
        self.subtype = subtype.to_string();
        self
    }

    pub fn with_bits(mut self, bits: TargetBits) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_observation(mut self, efftime_spec: f64, max_mjd: f64) -> Self {
        self.efftime_spec = efftime_spec;
        self.max_mjd = max_mjd;
        self
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.targetid, self.survey, self.program)
    }

    pub fn row_id(&self) -> u128 {
        ids::zpix_row_id(self.targetid, self.survey, self.program)
    }
}

/// Ztile - per-tile redshift record, one per object per tile per coadd
/// grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ztile {
    pub targetid: i64,
    pub survey: Survey,
    pub program: Program,
    pub tileid: i32,
    pub spgrp: SpectralGroup,
    /// Group-dependent value; the night for cumulative coadds.
    pub spgrpval: i32,
    pub z: f64,
    pub zerr: f64,
    pub zwarn: ZWarn,
    pub spectype: String,
    pub subtype: String,
    pub bits: TargetBits,
    pub efftime_spec: f64,
    pub zcat_nspec: i32,
    pub zcat_primary: bool,
    pub sv_nspec: i32,
    pub sv_primary: bool,
    pub main_nspec: i32,
    pub main_primary: bool,
}

impl Ztile {
    pub fn new(
        targetid: i64,
        survey: Survey,
        program: Program,
        tileid: i32,
        spgrp: SpectralGroup,
        spgrpval: i32,
    ) -> Ztile {
        Ztile {
            targetid,
            survey,
            program,
            tileid,
            spgrp,
            spgrpval,
            z: 0.0,
            zerr: 0.0,
            zwarn: ZWarn::empty(),
            spectype: String::new(),
            subtype: String::new(),
            bits: TargetBits::default(),
            efftime_spec: 0.0,
            zcat_nspec: 0,
            zcat_primary: false,
            sv_nspec: 0,
            sv_primary: false,
            main_nspec: 0,
            main_primary: false,
        }
    }

    pub fn with_redshift(mut self, z: f64, zerr: f64, zwarn: ZWarn) -> Self {
        self.z = z;
        self.zerr = zerr;
        self.zwarn = zwarn;
        self
    }

    pub fn with_bits(mut self, bits: TargetBits) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_efftime_spec(mut self, efftime_spec: f64) -> Self {
        self.efftime_spec = efftime_spec;
        self
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.targetid, self.survey, self.program)
    }

    pub fn row_id(&self) -> u128 {
        ids::ztile_row_id(self.targetid, self.spgrp, self.spgrpval, self.tileid)
    }
}

/// Version - software version metadata recorded at the start of a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub package: String,
    pub version: String,
}

impl VersionRecord {
    pub fn new(package: &str, version: &str) -> VersionRecord {
        VersionRecord {
            package: package.to_string(),
            version: version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arm;

    #[test]
    fn test_valid_value() {
        assert_eq!(valid_value(Some(120.0)), Some(120.0));
        assert_eq!(valid_value(Some(0.0)), Some(0.0));
        assert_eq!(valid_value(Some(f64::NAN)), None);
        assert_eq!(valid_value(Some(f64::INFINITY)), None);
        assert_eq!(valid_value(None), None);
    }

    #[test]
    fn test_exposure_qualifies() {
        let exposure = Exposure::new(1, 20210610, Survey::Sv1, Program::Bright)
            .with_tileid(80615)
            .with_efftime_spec(120.0);
        assert!(exposure.qualifies());

        let zero = Exposure::new(2, 20210610, Survey::Sv1, Program::Bright)
            .with_tileid(80615)
            .with_efftime_spec(0.0);
        assert!(!zero.qualifies());

        let masked = Exposure::new(3, 20210610, Survey::Sv1, Program::Bright);
        assert!(!masked.qualifies());
    }

    #[test]
    fn test_frame_row_id() {
        let frame = Frame::new(12345, Camera::new(Arm::R, 3), 20210610);
        assert_eq!(frame.row_id(), 1234513);
    }

    #[test]
    fn test_target_object_key() {
        let target = Target::new(616089230483458, Survey::Sv1, Program::Bright, 80615);
        let key = target.object_key();
        assert_eq!(key.targetid, 616089230483458);
        assert_eq!(key.survey, Survey::Sv1);
        assert_eq!(key.program, Program::Bright);
    }

    #[test]
    fn test_zpix_row_id_distinct_per_program() {
        let dark = Zpix::new(616089230483458, Survey::Main, Program::Dark, 1234);
        let bright = Zpix::new(616089230483458, Survey::Main, Program::Bright, 1234);
        assert_ne!(dark.row_id(), bright.row_id());
    }
}
