//! Per-production reconciliation profiles
//!
//! Which (survey, program) combinations exist in a production is fixed when
//! the production is finalized, so the combinations are data here rather
//! than discovered by querying.

use std::collections::BTreeMap;

use specdb_core::{ConfigError, Program, Survey};

/// The survey and program combinations to reconcile for one production,
/// plus which known defect classes apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileProfile {
    pub production: String,
    survey_programs: BTreeMap<Survey, Vec<Program>>,
    /// Whether this production minted target-of-opportunity ids with the
    /// sentinel encoding and zeroed bitmasks.
    pub repair_zeroed_sentinels: bool,
}

impl ReconcileProfile {
    pub fn new(production: &str) -> ReconcileProfile {
        ReconcileProfile {
            production: production.to_string(),
            survey_programs: BTreeMap::new(),
            repair_zeroed_sentinels: false,
        }
    }

    pub fn with_combination(mut self, survey: Survey, programs: &[Program]) -> Self {
        self.survey_programs.insert(survey, programs.to_vec());
        self
    }

    pub fn with_sentinel_repair(mut self, repair: bool) -> Self {
        self.repair_zeroed_sentinels = repair;
        self
    }

    /// The profile for a known production release.
    pub fn for_production(production: &str) -> Result<ReconcileProfile, ConfigError> {
        use Program::{Backup, Bright, Dark, Other};
        match production {
            "fuji" => Ok(ReconcileProfile::new("fuji")
                .with_combination(Survey::Cmx, &[Other])
                .with_combination(Survey::Special, &[Dark])
                .with_combination(Survey::Sv1, &[Backup, Bright, Dark, Other])
                .with_combination(Survey::Sv2, &[Backup, Bright, Dark])
                .with_combination(Survey::Sv3, &[Backup, Bright, Dark])
                .with_sentinel_repair(true)),
            "guadalupe" => Ok(ReconcileProfile::new("guadalupe")
                .with_combination(Survey::Special, &[Bright, Dark])
                .with_combination(Survey::Main, &[Bright, Dark])),
            "iron" => Ok(ReconcileProfile::new("iron")
                .with_combination(Survey::Cmx, &[Other])
                .with_combination(Survey::Main, &[Backup, Bright, Dark])
                .with_combination(Survey::Special, &[Backup, Bright, Dark, Other])
                .with_combination(Survey::Sv1, &[Backup, Bright, Dark, Other])
                .with_combination(Survey::Sv2, &[Backup, Bright, Dark])
                .with_combination(Survey::Sv3, &[Backup, Bright, Dark])),
            _ => Err(ConfigError::UnknownProduction {
                production: production.to_string(),
            }),
        }
    }

    /// Every (survey, program) combination in the profile, in a stable
    /// order.
    pub fn combinations(&self) -> Vec<(Survey, Program)> {
        self.survey_programs
            .iter()
            .flat_map(|(survey, programs)| programs.iter().map(move |p| (*survey, *p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_productions() {
        let fuji = ReconcileProfile::for_production("fuji").unwrap();
        assert!(fuji.repair_zeroed_sentinels);
        assert!(fuji
            .combinations()
            .contains(&(Survey::Sv1, Program::Other)));
        assert!(!fuji.combinations().iter().any(|(s, _)| *s == Survey::Main));

        let iron = ReconcileProfile::for_production("iron").unwrap();
        assert!(!iron.repair_zeroed_sentinels);
        assert!(iron
            .combinations()
            .contains(&(Survey::Main, Program::Backup)));

        assert!(ReconcileProfile::for_production("everest").is_err());
    }

    #[test]
    fn test_builder_combinations() {
        let profile = ReconcileProfile::new("test")
            .with_combination(Survey::Sv1, &[Program::Bright, Program::Dark]);
        assert_eq!(
            profile.combinations(),
            vec![(Survey::Sv1, Program::Bright), (Survey::Sv1, Program::Dark)]
        );
    }
}
