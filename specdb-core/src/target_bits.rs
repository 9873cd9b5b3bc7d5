//! Targeting bitmask column family
//!
//! One integer bitmask column exists per survey era and target class. The
//! values are expected to be invariant per object but are recorded once per
//! tile assignment, which is where cross-tile disagreements creep in.

use serde::{Deserialize, Serialize};

use crate::Survey;

/// The generation-specific targeting bitmask columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetColumn {
    Cmx,
    Desi,
    Bgs,
    Mws,
    Scnd,
    Sv1Desi,
    Sv1Bgs,
    Sv1Mws,
    Sv1Scnd,
    Sv2Desi,
    Sv2Bgs,
    Sv2Mws,
    Sv2Scnd,
    Sv3Desi,
    Sv3Bgs,
    Sv3Mws,
    Sv3Scnd,
}

impl TargetColumn {
    pub const ALL: [TargetColumn; 17] = [
        TargetColumn::Cmx,
        TargetColumn::Desi,
        TargetColumn::Bgs,
        TargetColumn::Mws,
        TargetColumn::Scnd,
        TargetColumn::Sv1Desi,
        TargetColumn::Sv1Bgs,
        TargetColumn::Sv1Mws,
        TargetColumn::Sv1Scnd,
        TargetColumn::Sv2Desi,
        TargetColumn::Sv2Bgs,
        TargetColumn::Sv2Mws,
        TargetColumn::Sv2Scnd,
        TargetColumn::Sv3Desi,
        TargetColumn::Sv3Bgs,
        TargetColumn::Sv3Mws,
        TargetColumn::Sv3Scnd,
    ];

    /// Column name as it appears in upstream tables.
    pub fn name(self) -> &'static str {
        match self {
            TargetColumn::Cmx => "cmx_target",
            TargetColumn::Desi => "desi_target",
            TargetColumn::Bgs => "bgs_target",
            TargetColumn::Mws => "mws_target",
            TargetColumn::Scnd => "scnd_target",
            TargetColumn::Sv1Desi => "sv1_desi_target",
            TargetColumn::Sv1Bgs => "sv1_bgs_target",
            TargetColumn::Sv1Mws => "sv1_mws_target",
            TargetColumn::Sv1Scnd => "sv1_scnd_target",
            TargetColumn::Sv2Desi => "sv2_desi_target",
            TargetColumn::Sv2Bgs => "sv2_bgs_target",
            TargetColumn::Sv2Mws => "sv2_mws_target",
            TargetColumn::Sv2Scnd => "sv2_scnd_target",
            TargetColumn::Sv3Desi => "sv3_desi_target",
            TargetColumn::Sv3Bgs => "sv3_bgs_target",
            TargetColumn::Sv3Mws => "sv3_mws_target",
            TargetColumn::Sv3Scnd => "sv3_scnd_target",
        }
    }
}

impl Survey {
    /// The bitmask columns a survey era writes during target selection.
    ///
    /// This static table drives anomaly detection: disagreement is only
    /// meaningful in the columns the survey actually populates. Repair still
    /// ORs every column, which is a no-op for columns outside this set.
    pub fn detection_columns(self) -> &'static [TargetColumn] {
        match self {
            Survey::Cmx => &[TargetColumn::Cmx],
            Survey::Sv1 => &[
                TargetColumn::Sv1Desi,
                TargetColumn::Sv1Bgs,
                TargetColumn::Sv1Mws,
            ],
            Survey::Sv2 => &[
                TargetColumn::Sv2Desi,
                TargetColumn::Sv2Bgs,
                TargetColumn::Sv2Mws,
            ],
            Survey::Sv3 => &[
                TargetColumn::Sv3Desi,
                TargetColumn::Sv3Bgs,
                TargetColumn::Sv3Mws,
            ],
            Survey::Main | Survey::Special => &[
                TargetColumn::Desi,
                TargetColumn::Bgs,
                TargetColumn::Mws,
            ],
            Survey::Unknown => &[],
        }
    }
}

/// Value holder for all 17 targeting bitmask columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBits {
    pub cmx_target: i64,
    pub desi_target: i64,
    pub bgs_target: i64,
    pub mws_target: i64,
    pub scnd_target: i64,
    pub sv1_desi_target: i64,
    pub sv1_bgs_target: i64,
    pub sv1_mws_target: i64,
    pub sv1_scnd_target: i64,
    pub sv2_desi_target: i64,
    pub sv2_bgs_target: i64,
    pub sv2_mws_target: i64,
    pub sv2_scnd_target: i64,
    pub sv3_desi_target: i64,
    pub sv3_bgs_target: i64,
    pub sv3_mws_target: i64,
    pub sv3_scnd_target: i64,
}

impl TargetBits {
    pub fn get(&self, column: TargetColumn) -> i64 {
        match column {
            TargetColumn::Cmx => self.cmx_target,
            TargetColumn::Desi => self.desi_target,
            TargetColumn::Bgs => self.bgs_target,
            TargetColumn::Mws => self.mws_target,
            TargetColumn::Scnd => self.scnd_target,
            TargetColumn::Sv1Desi => self.sv1_desi_target,
            TargetColumn::Sv1Bgs => self.sv1_bgs_target,
            TargetColumn::Sv1Mws => self.sv1_mws_target,
            TargetColumn::Sv1Scnd => self.sv1_scnd_target,
            TargetColumn::Sv2Desi => self.sv2_desi_target,
            TargetColumn::Sv2Bgs => self.sv2_bgs_target,
            TargetColumn::Sv2Mws => self.sv2_mws_target,
            TargetColumn::Sv2Scnd => self.sv2_scnd_target,
            TargetColumn::Sv3Desi => self.sv3_desi_target,
            TargetColumn::Sv3Bgs => self.sv3_bgs_target,
            TargetColumn::Sv3Mws => self.sv3_mws_target,
            TargetColumn::Sv3Scnd => self.sv3_scnd_target,
        }
    }

    pub fn set(&mut self, column: TargetColumn, value: i64) {
        match column {
            TargetColumn::Cmx => self.cmx_target = value,
            TargetColumn::Desi => self.desi_target = value,
            TargetColumn::Bgs => self.bgs_target = value,
            TargetColumn::Mws => self.mws_target = value,
            TargetColumn::Scnd => self.scnd_target = value,
            TargetColumn::Sv1Desi => self.sv1_desi_target = value,
            TargetColumn::Sv1Bgs => self.sv1_bgs_target = value,
            TargetColumn::Sv1Mws => self.sv1_mws_target = value,
            TargetColumn::Sv1Scnd => self.sv1_scnd_target = value,
            TargetColumn::Sv2Desi => self.sv2_desi_target = value,
            TargetColumn::Sv2Bgs => self.sv2_bgs_target = value,
            TargetColumn::Sv2Mws => self.sv2_mws_target = value,
            TargetColumn::Sv2Scnd => self.sv2_scnd_target = value,
            TargetColumn::Sv3Desi => self.sv3_desi_target = value,
            TargetColumn::Sv3Bgs => self.sv3_bgs_target = value,
            TargetColumn::Sv3Mws => self.sv3_mws_target = value,
            TargetColumn::Sv3Scnd => self.sv3_scnd_target = value,
        }
    }

    /// Bitwise-OR every column from `other` into `self`.
    ///
    /// ORing identical values is the identity, which is what makes the
    /// bitmask repair pass safely re-runnable.
    pub fn or_assign(&mut self, other: &TargetBits) {
        for column in TargetColumn::ALL {
            self.set(column, self.get(column) | other.get(column));
        }
    }

    /// Bitwise-OR reduction over any number of bitmask rows.
    pub fn or_reduce<'a, I: IntoIterator<Item = &'a TargetBits>>(rows: I) -> TargetBits {
        let mut merged = TargetBits::default();
        for row in rows {
            merged.or_assign(row);
        }
        merged
    }

    /// True when every column is zero.
    pub fn is_zero(&self) -> bool {
        TargetColumn::ALL.iter().all(|c| self.get(*c) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip() {
        let mut bits = TargetBits::default();
        for (i, column) in TargetColumn::ALL.iter().enumerate() {
            bits.set(*column, 1 << i);
        }
        for (i, column) in TargetColumn::ALL.iter().enumerate() {
            assert_eq!(bits.get(*column), 1 << i);
        }
    }

    #[test]
    fn test_or_assign_is_idempotent() {
        let mut a = TargetBits {
            sv1_desi_target: 0b0101,
            ..TargetBits::default()
        };
        let b = TargetBits {
            sv1_desi_target: 0b0011,
            mws_target: 4,
            ..TargetBits::default()
        };
        a.or_assign(&b);
        let once = a;
        a.or_assign(&b);
        assert_eq!(a, once);
        assert_eq!(a.sv1_desi_target, 0b0111);
        assert_eq!(a.mws_target, 4);
    }

    #[test]
    fn test_or_reduce() {
        let rows = [
            TargetBits {
                sv1_desi_target: 4,
                ..TargetBits::default()
            },
            TargetBits {
                sv1_desi_target: 0,
                ..TargetBits::default()
            },
        ];
        let merged = TargetBits::or_reduce(rows.iter());
        assert_eq!(merged.sv1_desi_target, 4);
    }

    #[test]
    fn test_is_zero() {
        assert!(TargetBits::default().is_zero());
        let bits = TargetBits {
            cmx_target: 1,
            ..TargetBits::default()
        };
        assert!(!bits.is_zero());
    }

    #[test]
    fn test_detection_columns_exclude_secondary() {
        for survey in Survey::KNOWN {
            for column in survey.detection_columns() {
                assert!(!matches!(
                    column,
                    TargetColumn::Scnd
                        | TargetColumn::Sv1Scnd
                        | TargetColumn::Sv2Scnd
                        | TargetColumn::Sv3Scnd
                ));
            }
        }
    }
}
