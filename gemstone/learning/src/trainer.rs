//! Training run: ingest, preprocess, evaluate, select, persist.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    artifacts::{save_object, ArtifactPaths, EVALUATION_FILE},
    config::PipelineConfig,
    error::Result,
    evaluation::{evaluate_models, CandidateFailure, ModelScore},
    ingestion::{read_records, DataIngestion},
    schema::{GemFeatures, GemRecord},
    telemetry::{self, PipelineTelemetry},
    transformation::DataTransformation,
};

/// Outcome of a training run, also written as `evaluation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Completion time.
    pub trained_at: DateTime<Utc>,
    /// Rows used for fitting.
    pub train_rows: usize,
    /// Rows used for scoring.
    pub test_rows: usize,
    /// Metrics per successful candidate, in evaluation order.
    pub scores: IndexMap<String, ModelScore>,
    /// Candidates that failed.
    pub failures: Vec<CandidateFailure>,
    /// Name of the selected model.
    pub best_model: String,
    /// Metrics of the selected model.
    pub best_score: ModelScore,
    /// Written preprocessor artifact.
    pub preprocessor_path: PathBuf,
    /// Written model artifact.
    pub model_path: PathBuf,
}

impl TrainingSummary {
    /// One-line rendering for logs and terminals.
    #[must_use]
    pub fn summary(&self) -> String {
        let scores = self
            .scores
            .iter()
            .map(|(name, score)| format!("{name}={:.4}", score.r2))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "run {}: best {} (r2 {:.4}) on {} train / {} test rows; scores [{scores}]; {} failed",
            self.run_id,
            self.best_model,
            self.best_score.r2,
            self.train_rows,
            self.test_rows,
            self.failures.len()
        )
    }
}

/// Drives one full training pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingPipeline;

impl TrainingPipeline {
    /// Runs every stage and writes `preprocessor.json`, `model.json` and
    /// `evaluation.json` into the artifacts directory.
    pub fn run(
        self,
        config: &PipelineConfig,
        telemetry: Option<&PipelineTelemetry>,
    ) -> Result<TrainingSummary> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        telemetry::record(telemetry, LogLevel::Info, "training started", || {
            json!({ "run_id": run_id, "candidates": config.models.len() })
        });

        let ingestion_log = telemetry.map(|t| t.scoped("ingestion"));
        let split = DataIngestion::new(config.ingestion.clone()).run(ingestion_log.as_ref())?;
        let train = read_records(&split.train_path)?;
        let test = read_records(&split.test_path)?;
        let (train_frame, y_train) = frame_and_target(&train);
        let (test_frame, y_test) = frame_and_target(&test);

        let transform_log = telemetry.map(|t| t.scoped("transformation"));
        let (preprocessor, x_train) = DataTransformation.fit_transform(&train_frame)?;
        let x_test = preprocessor.transform(&test_frame)?;
        telemetry::record(transform_log.as_ref(), LogLevel::Info, "preprocessor fitted", || {
            json!({ "train_shape": x_train.shape(), "test_shape": x_test.shape() })
        });

        let evaluation_log = telemetry.map(|t| t.scoped("evaluation"));
        let report = evaluate_models(&x_train, &y_train, &x_test, &y_test, &config.models)?;
        for failure in &report.failures {
            telemetry::record(evaluation_log.as_ref(), LogLevel::Warn, "candidate failed", || {
                json!({ "model": failure.name, "error": failure.error })
            });
        }
        let scores = report.metrics();
        let failures = report.failures.clone();
        telemetry::record(evaluation_log.as_ref(), LogLevel::Info, "candidates scored", || {
            json!({ "scores": report.scores() })
        });
        let best = report.into_best()?;

        let paths = ArtifactPaths::in_dir(&config.ingestion.artifacts_dir);
        save_object(&paths.preprocessor, &preprocessor)?;
        save_object(&paths.model, &best.model)?;
        let summary = TrainingSummary {
            run_id,
            trained_at: Utc::now(),
            train_rows: split.train_rows,
            test_rows: split.test_rows,
            scores,
            failures,
            best_model: best.name,
            best_score: best.score,
            preprocessor_path: paths.preprocessor,
            model_path: paths.model,
        };
        save_object(config.ingestion.artifacts_dir.join(EVALUATION_FILE), &summary)?;
        telemetry::record(telemetry, LogLevel::Info, "training finished", || {
            json!({ "run_id": run_id, "summary": summary.summary() })
        });
        Ok(summary)
    }
}

fn frame_and_target(records: &[GemRecord]) -> (Vec<GemFeatures>, Array1<f64>) {
    let frame = records.iter().map(GemRecord::features).collect();
    let target = records.iter().map(|record| record.price).collect();
    (frame, target)
}
