//! TOML configuration for training runs.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    models::ModelSpec,
};

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Dataset locations and split parameters.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Log destination.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Candidate regressors, evaluated in order.
    #[serde(default = "default_models")]
    pub models: Vec<NamedModel>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingestion: IngestionConfig::default(),
            logging: LoggingConfig::default(),
            models: default_models(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a TOML file. Relative paths resolve against the
    /// file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.ingestion.source = resolve(&base, &config.ingestion.source);
        config.ingestion.artifacts_dir = resolve(&base, &config.ingestion.artifacts_dir);
        config.logging.dir = resolve(&base, &config.logging.dir);
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and candidate names.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.ingestion.test_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::Invalid(format!("test_ratio {ratio} must be in (0, 1)")).into());
        }
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("at least one model is required".into()).into());
        }
        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(
                    ConfigError::Invalid(format!("duplicate model name {}", model.name)).into(),
                );
            }
            model.spec.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}

fn resolve(base: &Path, candidate: &Path) -> PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Where the data lives and how it is split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Raw dataset CSV.
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Directory receiving split CSVs and fitted artifacts.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// Fraction of rows held out for scoring.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    /// Shuffle seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            artifacts_dir: default_artifacts_dir(),
            test_ratio: default_test_ratio(),
            seed: default_seed(),
        }
    }
}

/// Log destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving one log file per run.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

/// A candidate regressor with its report name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModel {
    /// Name used in reports and for tie-breaking order.
    pub name: String,
    /// Algorithm and hyperparameters.
    #[serde(flatten)]
    pub spec: ModelSpec,
}

impl NamedModel {
    /// Pairs a name with a spec.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: ModelSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("notebooks/data/gemstone.csv")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

const fn default_test_ratio() -> f64 {
    0.30
}

const fn default_seed() -> u64 {
    42
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// The five candidates evaluated by a default run.
#[must_use]
pub fn default_models() -> Vec<NamedModel> {
    vec![
        NamedModel::new("LinearRegression", ModelSpec::LinearRegression),
        NamedModel::new("Lasso", ModelSpec::Lasso { alpha: 1.0 }),
        NamedModel::new("Ridge", ModelSpec::Ridge { alpha: 1.0 }),
        NamedModel::new(
            "Elasticnet",
            ModelSpec::ElasticNet {
                alpha: 1.0,
                l1_ratio: 0.5,
            },
        ),
        NamedModel::new(
            "DecisionTree",
            ModelSpec::DecisionTree {
                max_depth: None,
                min_samples_split: 2,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn empty_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert!((config.ingestion.test_ratio - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.ingestion.seed, 42);
        assert_eq!(config.models.len(), 5);
        assert_eq!(config.ingestion.artifacts_dir, dir.path().join("artifacts"));
    }

    #[test]
    fn parses_model_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
            [ingestion]
            source = "/data/gemstone.csv"
            test_ratio = 0.25

            [[models]]
            name = "Ridge"
            kind = "ridge"
            alpha = 0.5

            [[models]]
            name = "Tree"
            kind = "decision_tree"
            max_depth = 6
            "#,
        )
        .unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.ingestion.source, PathBuf::from("/data/gemstone.csv"));
        assert_eq!(
            config.models,
            vec![
                NamedModel::new("Ridge", ModelSpec::Ridge { alpha: 0.5 }),
                NamedModel::new(
                    "Tree",
                    ModelSpec::DecisionTree {
                        max_depth: Some(6),
                        min_samples_split: 2
                    }
                ),
            ]
        );
    }

    #[test]
    fn rejects_bad_ratio_and_duplicates() {
        let mut config = PipelineConfig::default();
        config.ingestion.test_ratio = 1.0;
        assert!(matches!(
            config.validate().unwrap_err().kind(),
            ErrorKind::Config(ConfigError::Invalid(_))
        ));

        let mut config = PipelineConfig::default();
        config.models.push(NamedModel::new("Lasso", ModelSpec::Lasso { alpha: 0.1 }));
        assert!(config.validate().is_err());
    }
}
