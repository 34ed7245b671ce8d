//! Error types for every pipeline layer.
//!
//! Each layer owns a `thiserror` enum. Crossing into [`PipelineError`] via `?`
//! records where the conversion happened, so a failure reports both its cause
//! and its origin.

use std::{fmt, panic::Location, path::PathBuf};

use thiserror::Error;

/// Raised while reading, splitting or writing CSV datasets.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The source dataset does not exist.
    #[error("dataset not found: {0}")]
    MissingSource(PathBuf),
    /// Filesystem failure on a dataset or its directory.
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Malformed CSV content.
    #[error("csv error in {path}: {source}")]
    Csv {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
    /// Header differs from the fixed schema.
    #[error("unexpected header in {path}: expected {expected:?}, found {found:?}")]
    Header {
        /// File involved.
        path: PathBuf,
        /// Required header.
        expected: Vec<String>,
        /// Header actually present.
        found: Vec<String>,
    },
    /// The dataset has too few rows to split.
    #[error("dataset {0} has too few rows to split")]
    TooSmall(PathBuf),
}

/// Raised while fitting or applying the preprocessor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// A category outside the column's vocabulary.
    #[error("unknown {column} category {value:?}")]
    UnknownCategory {
        /// Column name.
        column: &'static str,
        /// Offending value.
        value: String,
    },
    /// No observed value to fit an imputer on.
    #[error("column {0} has no observed values to fit on")]
    EmptyColumn(&'static str),
    /// Fitting needs at least one row.
    #[error("cannot fit on an empty frame")]
    EmptyFrame,
    /// A loaded preprocessor lists columns in a different order.
    #[error("preprocessor column layout {found:?} does not match {expected:?}")]
    ColumnLayout {
        /// Required layout.
        expected: Vec<String>,
        /// Layout found in the artifact.
        found: Vec<String>,
    },
}

/// Raised by a single regressor.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// Input width differs from what the model was fit on.
    #[error("expected {expected} features, got {found}")]
    FeatureCount {
        /// Width seen at fit time.
        expected: usize,
        /// Width supplied.
        found: usize,
    },
    /// Target length differs from the number of rows.
    #[error("{rows} rows but {targets} targets")]
    TargetLength {
        /// Rows in the feature matrix.
        rows: usize,
        /// Length of the target vector.
        targets: usize,
    },
    /// Fit called with no rows.
    #[error("cannot fit on zero rows")]
    NoRows,
    /// Model produced NaN or infinity.
    #[error("model produced a non-finite value")]
    NonFinite,
}

/// Raised by the model selection loop.
#[derive(Debug, Error, PartialEq)]
pub enum EvaluationError {
    /// Every candidate failed.
    #[error("no candidate model could be evaluated ({failures} failed)")]
    NoViableModel {
        /// Number of failed candidates.
        failures: usize,
    },
    /// The candidate list is empty.
    #[error("no candidate models configured")]
    NoCandidates,
    /// Two candidates share a name.
    #[error("duplicate candidate name {0}")]
    DuplicateName(String),
}

/// Raised while persisting or loading artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact has not been written yet.
    #[error("artifact not found: {0}")]
    Missing(PathBuf),
    /// Filesystem failure.
    #[error("io error on artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file exists but does not decode.
    #[error("corrupt artifact {path}: {source}")]
    Corrupt {
        /// Artifact path.
        path: PathBuf,
        /// Decoding error.
        source: serde_json::Error,
    },
    /// The file decodes but its contents cannot be served.
    #[error("invalid artifact {path}: {reason}")]
    Invalid {
        /// Artifact path.
        path: PathBuf,
        /// What the structural check found.
        reason: String,
    },
}

/// Raised when a serving record is incomplete or malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required attribute is absent or blank.
    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),
    /// A numeric attribute does not parse as a finite number.
    #[error("attribute {field} is not a number: {value:?}")]
    InvalidNumber {
        /// Attribute name.
        field: &'static str,
        /// Submitted text.
        value: String,
    },
}

/// Raised while loading the pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("reading config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for the schema.
    #[error("parsing config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Layer-specific cause carried by [`PipelineError`].
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Ingestion failure.
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    /// Preprocessing failure.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// Regressor failure.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Selection failure.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// Artifact failure.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// Input validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error returned by every public pipeline operation.
#[derive(Debug)]
pub struct PipelineError {
    kind: ErrorKind,
    location: &'static Location<'static>,
}

impl PipelineError {
    /// The layer-specific cause.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Consumes the error, returning the cause.
    #[must_use]
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Source position where the error entered the pipeline layer.
    #[must_use]
    pub const fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// True when the caller supplied bad input rather than the system failing.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Validation(_) | ErrorKind::Transform(TransformError::UnknownCategory { .. })
        )
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}:{}]",
            self.kind,
            self.location.file(),
            self.location.line()
        )
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

macro_rules! located_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for PipelineError {
                #[track_caller]
                fn from(err: $source) -> Self {
                    Self {
                        kind: ErrorKind::from(err),
                        location: Location::caller(),
                    }
                }
            }
        )+
    };
}

located_from!(
    IngestionError,
    TransformError,
    ModelError,
    EvaluationError,
    ArtifactError,
    ValidationError,
    ConfigError,
);

impl From<ErrorKind> for PipelineError {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: Location::caller(),
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
