#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions)]

//! Gemstone price regression: dataset ingestion, feature preprocessing,
//! candidate model evaluation, artifact persistence and serving.

/// Artifact persistence and caching.
pub mod artifacts;
/// TOML pipeline configuration.
pub mod config;
/// Layered error types.
pub mod error;
/// Candidate scoring and selection.
pub mod evaluation;
/// CSV ingestion and train/test split.
pub mod ingestion;
/// Regressors.
pub mod models;
/// Serving path.
pub mod prediction;
/// Dataset schema and record types.
pub mod schema;
/// Structured stage logging.
pub mod telemetry;
/// Training orchestration.
pub mod trainer;
/// Feature preprocessing.
pub mod transformation;

pub use artifacts::{ArtifactCache, ArtifactPaths, LoadedArtifacts};
pub use config::{NamedModel, PipelineConfig};
pub use error::{ErrorKind, PipelineError, Result};
pub use evaluation::{evaluate_models, EvaluationReport, ModelScore};
pub use ingestion::{DataIngestion, IngestionOutput};
pub use models::{FittedModel, ModelSpec, Regressor};
pub use prediction::PredictPipeline;
pub use schema::{CustomData, GemFeatures, GemRecord};
pub use telemetry::PipelineTelemetry;
pub use trainer::{TrainingPipeline, TrainingSummary};
pub use transformation::{DataTransformation, FittedPreprocessor};
