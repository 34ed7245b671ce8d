//! Reads the raw dataset, splits it and writes the three CSV snapshots.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    config::IngestionConfig,
    error::IngestionError,
    schema::{GemRecord, RAW_COLUMNS},
    telemetry::{self, PipelineTelemetry},
};

/// File name of the unsplit copy of the dataset.
pub const RAW_FILE: &str = "raw.csv";
/// File name of the training split.
pub const TRAIN_FILE: &str = "train.csv";
/// File name of the test split.
pub const TEST_FILE: &str = "test.csv";

/// Paths and sizes produced by one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutput {
    /// Copy of the full dataset.
    pub raw_path: PathBuf,
    /// Training split.
    pub train_path: PathBuf,
    /// Test split.
    pub test_path: PathBuf,
    /// Rows in the training split.
    pub train_rows: usize,
    /// Rows in the test split.
    pub test_rows: usize,
}

/// Ingestion stage bound to its configuration.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    config: IngestionConfig,
}

impl DataIngestion {
    /// Creates the stage.
    #[must_use]
    pub const fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    /// Reads the source CSV, shuffles it with the configured seed and writes
    /// `raw.csv`, `train.csv` and `test.csv` into the artifacts directory.
    pub fn run(
        &self,
        telemetry: Option<&PipelineTelemetry>,
    ) -> Result<IngestionOutput, IngestionError> {
        let source = &self.config.source;
        telemetry::record(telemetry, LogLevel::Info, "reading dataset", || {
            json!({ "source": source })
        });
        let records = read_records(source)?;
        let (train_idx, test_idx) = split_indices(records.len(), self.config.test_ratio, self.config.seed);
        if train_idx.is_empty() || test_idx.is_empty() {
            return Err(IngestionError::TooSmall(source.clone()));
        }

        let dir = &self.config.artifacts_dir;
        fs::create_dir_all(dir).map_err(|source| IngestionError::Io {
            path: dir.clone(),
            source,
        })?;
        let output = IngestionOutput {
            raw_path: dir.join(RAW_FILE),
            train_path: dir.join(TRAIN_FILE),
            test_path: dir.join(TEST_FILE),
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
        };
        write_records(&output.raw_path, records.iter())?;
        write_records(&output.train_path, train_idx.iter().map(|&i| &records[i]))?;
        write_records(&output.test_path, test_idx.iter().map(|&i| &records[i]))?;

        telemetry::record(telemetry, LogLevel::Info, "train test split written", || {
            json!({
                "rows": records.len(),
                "train_rows": output.train_rows,
                "test_rows": output.test_rows,
                "train_path": output.train_path,
                "test_path": output.test_path,
            })
        });
        Ok(output)
    }
}

/// Partitions `0..rows` into shuffled train and test indices.
///
/// The test side gets `floor(rows * test_ratio)` rows and the train side the
/// rest, so a 0.30 ratio yields `ceil(0.7 N)` / `floor(0.3 N)`.
#[must_use]
pub fn split_indices(rows: usize, test_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let test_rows = ((rows as f64).mul_add(test_ratio, 1e-9).floor() as usize).min(rows);
    let train = order.split_off(test_rows);
    (train, order)
}

/// Reads a dataset CSV, requiring the exact raw header.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<GemRecord>, IngestionError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IngestionError::MissingSource(path.to_path_buf()));
    }
    let csv_error = |source| IngestionError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let header = reader.headers().map_err(csv_error)?;
    if header.iter().ne(RAW_COLUMNS.iter().copied()) {
        return Err(IngestionError::Header {
            path: path.to_path_buf(),
            expected: RAW_COLUMNS.iter().map(ToString::to_string).collect(),
            found: header.iter().map(str::to_string).collect(),
        });
    }
    reader
        .deserialize()
        .collect::<Result<Vec<GemRecord>, _>>()
        .map_err(csv_error)
}

/// Writes records with the raw header. Missing values become empty fields.
pub fn write_records<'a>(
    path: impl AsRef<Path>,
    records: impl IntoIterator<Item = &'a GemRecord>,
) -> Result<(), IngestionError> {
    let path = path.as_ref();
    let csv_error = |source| IngestionError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    writer.write_record(RAW_COLUMNS).map_err(csv_error)?;
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn config(dir: &Path, rows: usize) -> IngestionConfig {
        let source = dir.join("gemstone.csv");
        write_records(&source, &GemRecord::synthetic(rows, 3)).unwrap();
        IngestionConfig {
            source,
            artifacts_dir: dir.join("artifacts"),
            ..IngestionConfig::default()
        }
    }

    #[test]
    fn split_sizes_follow_ratio() {
        for rows in [3, 10, 11, 99, 100, 1_001] {
            let (train, test) = split_indices(rows, 0.30, 42);
            assert_eq!(test.len(), rows * 3 / 10, "rows = {rows}");
            assert_eq!(train.len(), rows - rows * 3 / 10);
            let all: HashSet<usize> = train.iter().chain(&test).copied().collect();
            assert_eq!(all.len(), rows);
        }
    }

    #[test]
    fn split_is_deterministic_per_seed() {
        assert_eq!(split_indices(50, 0.3, 42), split_indices(50, 0.3, 42));
        assert_ne!(split_indices(50, 0.3, 42), split_indices(50, 0.3, 7));
    }

    #[test]
    fn run_writes_three_files() {
        let dir = tempdir().unwrap();
        let output = DataIngestion::new(config(dir.path(), 20)).run(None).unwrap();
        assert_eq!((output.train_rows, output.test_rows), (14, 6));
        assert_eq!(read_records(&output.raw_path).unwrap().len(), 20);
        assert_eq!(read_records(&output.train_path).unwrap().len(), 14);
        assert_eq!(read_records(&output.test_path).unwrap().len(), 6);
    }

    #[test]
    fn missing_values_round_trip_as_empty_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("holes.csv");
        let mut records = GemRecord::synthetic(2, 1);
        records[0].depth = None;
        records[1].cut = None;
        write_records(&path, &records).unwrap();
        let back = read_records(&path).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn rejects_wrong_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "carat,cut,price\n0.3,Ideal,400\n").unwrap();
        assert!(matches!(
            read_records(&path).unwrap_err(),
            IngestionError::Header { .. }
        ));
    }

    #[test]
    fn reports_missing_and_tiny_sources() {
        let dir = tempdir().unwrap();
        let absent = IngestionConfig {
            source: dir.path().join("absent.csv"),
            ..IngestionConfig::default()
        };
        assert!(matches!(
            DataIngestion::new(absent).run(None).unwrap_err(),
            IngestionError::MissingSource(_)
        ));
        let tiny = config(dir.path(), 2);
        assert!(matches!(
            DataIngestion::new(tiny).run(None).unwrap_err(),
            IngestionError::TooSmall(_)
        ));
    }
}
