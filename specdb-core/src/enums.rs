//! Label enums shared by every record type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseLabelError;

/// Survey era a tile or observation belongs to.
///
/// The integer codes are arbitrary but fixed; they participate in packed
/// composite row ids and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    Cmx,
    Special,
    Sv1,
    Sv2,
    Sv3,
    Main,
    /// Placeholder carried by early operations data; normalized away during
    /// tile patching.
    Unknown,
}

impl Survey {
    /// All surveys that can appear in validated, loadable data.
    pub const KNOWN: [Survey; 6] = [
        Survey::Cmx,
        Survey::Special,
        Survey::Sv1,
        Survey::Sv2,
        Survey::Sv3,
        Survey::Main,
    ];

    /// Small integer code used in packed row ids.
    pub fn code(self) -> Option<i64> {
        match self {
            Survey::Cmx => Some(1),
            Survey::Special => Some(2),
            Survey::Sv1 => Some(3),
            Survey::Sv2 => Some(4),
            Survey::Sv3 => Some(5),
            Survey::Main => Some(6),
            Survey::Unknown => None,
        }
    }

    /// Decode a packed survey code.
    pub fn from_code(code: i64) -> Option<Survey> {
        match code {
            1 => Some(Survey::Cmx),
            2 => Some(Survey::Special),
            3 => Some(Survey::Sv1),
            4 => Some(Survey::Sv2),
            5 => Some(Survey::Sv3),
            6 => Some(Survey::Main),
            _ => None,
        }
    }

    /// Whether this is one of the survey-validation eras.
    pub fn is_sv(self) -> bool {
        matches!(self, Survey::Sv1 | Survey::Sv2 | Survey::Sv3)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Survey::Cmx => "cmx",
            Survey::Special => "special",
            Survey::Sv1 => "sv1",
            Survey::Sv2 => "sv2",
            Survey::Sv3 => "sv3",
            Survey::Main => "main",
            Survey::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Survey {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cmx" => Ok(Survey::Cmx),
            "special" => Ok(Survey::Special),
            "sv1" => Ok(Survey::Sv1),
            "sv2" => Ok(Survey::Sv2),
            "sv3" => Ok(Survey::Sv3),
            "main" => Ok(Survey::Main),
            "unknown" => Ok(Survey::Unknown),
            _ => Err(ParseLabelError::new("survey", s)),
        }
    }
}

/// Observing program of a tile or observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Program {
    Backup,
    Bright,
    Dark,
    Other,
}

impl Program {
    pub const ALL: [Program; 4] = [
        Program::Backup,
        Program::Bright,
        Program::Dark,
        Program::Other,
    ];

    /// Small integer code used in packed row ids.
    pub fn code(self) -> i64 {
        match self {
            Program::Backup => 1,
            Program::Bright => 2,
            Program::Dark => 3,
            Program::Other => 4,
        }
    }

    /// Decode a packed program code.
    pub fn from_code(code: i64) -> Option<Program> {
        match code {
            1 => Some(Program::Backup),
            2 => Some(Program::Bright),
            3 => Some(Program::Dark),
            4 => Some(Program::Other),
            _ => None,
        }
    }

    /// Derive the program from a fiberassign flavor label.
    ///
    /// The flavor carries a survey-era prefix (`sv1bright`, `maindark`, ...)
    /// which is stripped before classification. Dark-time tracer flavors
    /// (`elg`, `lrg`, `qso`, `lya`) all map to the dark program.
    pub fn from_flavor(faflavor: &str) -> Program {
        let mut stripped = faflavor;
        for prefix in ["cmx", "sv1", "sv2", "sv3", "main", "special"] {
            if let Some(rest) = stripped.strip_prefix(prefix) {
                stripped = rest;
                break;
            }
        }
        if stripped.contains("bright") {
            Program::Bright
        } else if stripped.contains("backup") {
            Program::Backup
        } else if stripped.contains("dark")
            || stripped.contains("elg")
            || stripped.contains("lrg")
            || stripped.contains("qso")
            || stripped.contains("lya")
        {
            Program::Dark
        } else {
            Program::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Program::Backup => "backup",
            Program::Bright => "bright",
            Program::Dark => "dark",
            Program::Other => "other",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backup" => Ok(Program::Backup),
            "bright" => Ok(Program::Bright),
            "dark" => Ok(Program::Dark),
            "other" => Ok(Program::Other),
            _ => Err(ParseLabelError::new("program", s)),
        }
    }
}

/// Spectral coadd grouping of a redshift catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralGroup {
    #[serde(rename = "1x_depth")]
    OneXDepth,
    #[serde(rename = "4x_depth")]
    FourXDepth,
    Cumulative,
    Lowspeed,
    Perexp,
    Pernight,
    Healpix,
}

impl SpectralGroup {
    /// Small integer code used in packed row ids.
    pub fn code(self) -> i64 {
        match self {
            SpectralGroup::OneXDepth => 1,
            SpectralGroup::FourXDepth => 2,
            SpectralGroup::Cumulative => 3,
            SpectralGroup::Lowspeed => 4,
            SpectralGroup::Perexp => 5,
            SpectralGroup::Pernight => 6,
            SpectralGroup::Healpix => 7,
        }
    }

    /// Decode a packed spectral-group code.
    pub fn from_code(code: i64) -> Option<SpectralGroup> {
        match code {
            1 => Some(SpectralGroup::OneXDepth),
            2 => Some(SpectralGroup::FourXDepth),
            3 => Some(SpectralGroup::Cumulative),
            4 => Some(SpectralGroup::Lowspeed),
            5 => Some(SpectralGroup::Perexp),
            6 => Some(SpectralGroup::Pernight),
            7 => Some(SpectralGroup::Healpix),
            _ => None,
        }
    }
}

/// Spectrograph arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    B,
    R,
    Z,
}

impl Arm {
    fn index(self) -> u8 {
        match self {
            Arm::B => 0,
            Arm::R => 1,
            Arm::Z => 2,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Arm::B => 'b',
            Arm::R => 'r',
            Arm::Z => 'z',
        }
    }
}

/// One of the 30 cameras: an arm paired with a spectrograph number (0-9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Camera {
    pub arm: Arm,
    pub spectrograph: u8,
}

impl Camera {
    pub fn new(arm: Arm, spectrograph: u8) -> Camera {
        debug_assert!(spectrograph < 10);
        Camera { arm, spectrograph }
    }

    /// Arbitrary but fixed integer in [0, 29], used to compose frame ids.
    pub fn id(self) -> i32 {
        i32::from(self.arm.index()) * 10 + i32::from(self.spectrograph)
    }

    /// Decode a camera id produced by [`Camera::id`].
    pub fn from_id(id: i32) -> Option<Camera> {
        if !(0..30).contains(&id) {
            return None;
        }
        let arm = match id / 10 {
            0 => Arm::B,
            1 => Arm::R,
            _ => Arm::Z,
        };
        Some(Camera::new(arm, (id % 10) as u8))
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.arm.as_char(), self.spectrograph)
    }
}

impl FromStr for Camera {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let arm = match chars.next() {
            Some('b') => Arm::B,
            Some('r') => Arm::R,
            Some('z') => Arm::Z,
            _ => return Err(ParseLabelError::new("camera", s)),
        };
        let spectrograph = chars
            .as_str()
            .parse::<u8>()
            .ok()
            .filter(|n| *n < 10)
            .ok_or_else(|| ParseLabelError::new("camera", s))?;
        Ok(Camera::new(arm, spectrograph))
    }
}

impl Serialize for Camera {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Camera {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

bitflags::bitflags! {
    /// Redshift fit warning flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ZWarn: i64 {
        const SMALL_DELTA_CHI2 = 1 << 0;
        const LITTLE_COVERAGE = 1 << 1;
        const UNPLUGGED = 1 << 2;
        const BAD_TARGET = 1 << 3;
        const NODATA = 1 << 9;
    }
}
