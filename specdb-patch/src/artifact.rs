//! Durable patch artifacts
//!
//! Patched tables are written to CSV files for inspection before anything
//! is committed to the store. File names carry both production names and a
//! date stamp, and existing files are never replaced unless overwriting is
//! explicitly requested.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use specdb_core::ProductionConfig;

use crate::merge::ProductionTables;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact {0} already exists and overwriting was not requested")]
    AlreadyExists(PathBuf),

    #[error("I/O error writing artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error writing artifact: {0}")]
    Csv(#[from] csv::Error),
}

/// Where one patch sweep's artifacts landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub tiles: PathBuf,
    pub exposures: PathBuf,
    pub frames: PathBuf,
}

/// Deterministic artifact name, e.g.
/// `tiles-daily-patched-with-jura-20240321.csv`.
pub fn artifact_name(table: &str, dst: &str, src: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}-patched-with-{}-{}.csv",
        table,
        dst,
        src,
        date.format("%Y%m%d")
    )
}

/// Writes patched production tables as CSV files.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    overwrite: bool,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> ArtifactWriter {
        ArtifactWriter {
            output_dir: output_dir.into(),
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// A writer honoring the run configuration's overwrite setting.
    pub fn from_config(output_dir: impl Into<PathBuf>, config: &ProductionConfig) -> ArtifactWriter {
        ArtifactWriter::new(output_dir).with_overwrite(config.overwrite_artifacts)
    }

    /// Write the tile, exposure, and frame tables for `patched`, naming the
    /// files after the source production and `date`.
    ///
    /// All destination paths are checked before any file is written, so a
    /// collision leaves the output directory untouched.
    pub fn write(
        &self,
        patched: &ProductionTables,
        src_production: &str,
        date: NaiveDate,
    ) -> Result<ArtifactPaths, ArtifactError> {
        let paths = ArtifactPaths {
            tiles: self.output_dir.join(artifact_name(
                "tiles",
                &patched.production,
                src_production,
                date,
            )),
            exposures: self.output_dir.join(artifact_name(
                "exposures",
                &patched.production,
                src_production,
                date,
            )),
            frames: self.output_dir.join(artifact_name(
                "frames",
                &patched.production,
                src_production,
                date,
            )),
        };

        for path in [&paths.tiles, &paths.exposures, &paths.frames] {
            if path.exists() {
                if self.overwrite {
                    warn!(path = %path.display(), "artifact exists and will be overwritten");
                } else {
                    return Err(ArtifactError::AlreadyExists(path.clone()));
                }
            }
        }

        write_csv(&paths.tiles, &patched.tiles)?;
        write_csv(&paths.exposures, &patched.exposures)?;
        write_csv(&paths.frames, &patched.frames)?;
        info!(
            tiles = patched.tiles.len(),
            exposures = patched.exposures.len(),
            frames = patched.frames.len(),
            directory = %self.output_dir.display(),
            "wrote patch artifacts"
        );
        Ok(paths)
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ArtifactError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use specdb_core::{Program, Survey, Tile};

    fn make_test_tables() -> ProductionTables {
        let mut tables = ProductionTables::new("daily");
        tables.tiles = vec![
            Tile::new(80615, Survey::Sv1, Program::Bright, 20210610).with_efftime_spec(120.0)
        ];
        tables
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 21).unwrap()
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name("tiles", "daily", "jura", test_date()),
            "tiles-daily-patched-with-jura-20240321.csv"
        );
    }

    #[test]
    fn test_write_and_refuse_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let tables = make_test_tables();

        let paths = writer.write(&tables, "jura", test_date()).unwrap();
        assert!(paths.tiles.exists());
        assert!(paths.exposures.exists());
        assert!(paths.frames.exists());
        let contents = std::fs::read_to_string(&paths.tiles).unwrap();
        assert!(contents.contains("80615"));

        let err = writer.write(&tables, "jura", test_date()).unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyExists(_)));

        let forced = ArtifactWriter::new(dir.path()).with_overwrite(true);
        assert!(forced.write(&tables, "jura", test_date()).is_ok());
    }

    #[test]
    fn test_from_config_honors_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let tables = make_test_tables();

        let refusing =
            ArtifactWriter::from_config(dir.path(), &ProductionConfig::new("daily"));
        refusing.write(&tables, "jura", test_date()).unwrap();
        assert!(matches!(
            refusing.write(&tables, "jura", test_date()),
            Err(ArtifactError::AlreadyExists(_))
        ));

        let config = ProductionConfig::new("daily").with_overwrite_artifacts(true);
        let forced = ArtifactWriter::from_config(dir.path(), &config);
        assert!(forced.write(&tables, "jura", test_date()).is_ok());
    }

    #[test]
    fn test_distinct_dates_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let tables = make_test_tables();
        writer.write(&tables, "jura", test_date()).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 3, 22).unwrap();
        assert!(writer.write(&tables, "jura", next).is_ok());
    }
}
