//! Serving path: persisted preprocessor, then persisted model.

use std::sync::Arc;

use ndarray::Array1;
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    artifacts::{ArtifactCache, ArtifactPaths, LoadedArtifacts},
    error::{ModelError, Result},
    models::Regressor,
    schema::{CustomData, GemFeatures},
    telemetry::{self, PipelineTelemetry},
};

enum Source {
    Disk(ArtifactPaths),
    Cached(ArtifactCache),
}

/// Predicts prices with the artifacts written by the last training run.
pub struct PredictPipeline {
    source: Source,
    telemetry: Option<PipelineTelemetry>,
}

impl PredictPipeline {
    /// Reads both artifacts from disk on every call.
    #[must_use]
    pub const fn new(paths: ArtifactPaths) -> Self {
        Self {
            source: Source::Disk(paths),
            telemetry: None,
        }
    }

    /// Keeps the loaded artifacts in memory until a file changes on disk.
    #[must_use]
    pub fn cached(paths: ArtifactPaths) -> Self {
        Self {
            source: Source::Cached(ArtifactCache::new(paths)),
            telemetry: None,
        }
    }

    /// Logs artifact loads, transforms and predictions under the `prediction` module.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: &PipelineTelemetry) -> Self {
        self.telemetry = Some(telemetry.scoped("prediction"));
        self
    }

    /// Artifact locations.
    #[must_use]
    pub const fn paths(&self) -> &ArtifactPaths {
        match &self.source {
            Source::Disk(paths) => paths,
            Source::Cached(cache) => cache.paths(),
        }
    }

    fn artifacts(&self) -> Result<Arc<LoadedArtifacts>> {
        let (loaded, source) = match &self.source {
            Source::Disk(paths) => (LoadedArtifacts::load(paths).map(Arc::new), "disk"),
            Source::Cached(cache) => (cache.get(), "cache"),
        };
        let log = self.telemetry.as_ref();
        match &loaded {
            Ok(_) => telemetry::record(log, LogLevel::Debug, "artifacts loaded", || {
                json!({ "source": source })
            }),
            Err(err) => telemetry::record(log, LogLevel::Error, "artifact load failed", || {
                json!({ "source": source, "error": err.to_string() })
            }),
        }
        loaded
    }

    /// Price of one complete record. Negative model output is clamped to 0.
    ///
    /// Non-finite or blank fields are rejected; nothing is imputed here.
    pub fn predict(&self, data: &CustomData) -> Result<f64> {
        data.validate()?;
        let artifacts = self.artifacts()?;
        let row = artifacts.preprocessor.transform_one(&data.to_features())?;
        telemetry::record(self.telemetry.as_ref(), LogLevel::Debug, "record transformed", || {
            json!({ "features": row.ncols() })
        });
        let prediction = artifacts.model.predict(&row)?;
        let raw = prediction.first().copied().ok_or(ModelError::NoRows)?;
        let price = raw.max(0.0);
        telemetry::record(self.telemetry.as_ref(), LogLevel::Info, "prediction made", || {
            json!({ "raw": raw, "price": price })
        });
        Ok(price)
    }

    /// Prices for many rows; missing values are imputed like in training.
    pub fn predict_batch(&self, frame: &[GemFeatures]) -> Result<Array1<f64>> {
        let artifacts = self.artifacts()?;
        let matrix = artifacts.preprocessor.transform(frame)?;
        let prediction = artifacts.model.predict(&matrix)?;
        telemetry::record(self.telemetry.as_ref(), LogLevel::Info, "batch predicted", || {
            json!({ "rows": prediction.len() })
        });
        Ok(prediction.mapv(|price| price.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::save_object,
        error::{ArtifactError, ErrorKind, TransformError, ValidationError},
        models::{FittedModel, LinearModel},
        schema::{GemRecord, FEATURE_COUNT},
        transformation::DataTransformation,
    };
    use tempfile::{tempdir, TempDir};

    fn sample() -> CustomData {
        CustomData {
            carat: 0.3,
            depth: 62.1,
            table: 58.0,
            x: 4.3,
            y: 4.2,
            z: 2.6,
            cut: "Ideal".into(),
            color: "E".into(),
            clarity: "VS1".into(),
        }
    }

    fn write_artifacts(intercept: f64) -> (TempDir, ArtifactPaths) {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let frame: Vec<_> = GemRecord::synthetic(25, 9).iter().map(GemRecord::features).collect();
        let preprocessor = DataTransformation.fit(&frame).unwrap();
        let mut weights = Array1::zeros(FEATURE_COUNT);
        weights[0] = 1_000.0;
        let model = FittedModel::Linear(LinearModel::new(weights, intercept));
        save_object(&paths.preprocessor, &preprocessor).unwrap();
        save_object(&paths.model, &model).unwrap();
        (dir, paths)
    }

    #[test]
    fn predicts_finite_non_negative_price() {
        let (_dir, paths) = write_artifacts(4_000.0);
        let price = PredictPipeline::new(paths).predict(&sample()).unwrap();
        assert!(price.is_finite());
        assert!(price > 0.0);
    }

    #[test]
    fn clamps_negative_output() {
        let (_dir, paths) = write_artifacts(-1e9);
        let pipeline = PredictPipeline::cached(paths);
        assert!(pipeline.predict(&sample()).unwrap().abs() < f64::EPSILON);
        let batch = pipeline.predict_batch(&[sample().to_features()]).unwrap();
        assert!(batch[0].abs() < f64::EPSILON);
    }

    #[test]
    fn batch_and_single_agree() {
        let (_dir, paths) = write_artifacts(4_000.0);
        let pipeline = PredictPipeline::new(paths);
        let single = pipeline.predict(&sample()).unwrap();
        let batch = pipeline
            .predict_batch(&[sample().to_features(), GemFeatures::default()])
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].to_bits(), single.to_bits());
    }

    #[test]
    fn unknown_category_is_rejected() {
        let (_dir, paths) = write_artifacts(4_000.0);
        let mut data = sample();
        data.cut = "Unknown".into();
        let err = PredictPipeline::new(paths).predict(&data).unwrap_err();
        assert!(err.is_user_error());
        assert!(matches!(
            err.kind(),
            ErrorKind::Transform(TransformError::UnknownCategory { column: "cut", .. })
        ));
    }

    #[test]
    fn non_finite_record_is_rejected_before_imputation() {
        let (_dir, paths) = write_artifacts(4_000.0);
        let pipeline = PredictPipeline::new(paths);
        let data = CustomData {
            carat: f64::NAN,
            ..sample()
        };
        let err = pipeline.predict(&data).unwrap_err();
        assert!(err.is_user_error());
        assert!(matches!(
            err.kind(),
            ErrorKind::Validation(ValidationError::InvalidNumber { field: "carat", .. })
        ));

        // The batch path still treats a missing value as missing.
        let mut row = sample().to_features();
        row.carat = None;
        assert!(pipeline.predict_batch(&[row]).unwrap()[0].is_finite());
    }

    #[test]
    fn telemetry_records_each_prediction() {
        let (dir, paths) = write_artifacts(4_000.0);
        let telemetry = PipelineTelemetry::for_run(dir.path().join("logs"), "application").unwrap();
        let pipeline = PredictPipeline::cached(paths).with_telemetry(&telemetry);
        let price = pipeline.predict(&sample()).unwrap();
        let records = telemetry.logger().read_back().unwrap();
        let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["artifacts loaded", "record transformed", "prediction made"]);
        assert!(records.iter().all(|r| r.module == "prediction"));
        assert_eq!(records[0].metadata["source"], "cache");
        assert_eq!(records[2].metadata["price"].as_f64().unwrap().to_bits(), price.to_bits());
    }

    #[test]
    fn missing_artifacts_fail_loudly() {
        let dir = tempdir().unwrap();
        let err = PredictPipeline::new(ArtifactPaths::in_dir(dir.path()))
            .predict(&sample())
            .unwrap_err();
        assert!(!err.is_user_error());
        assert!(matches!(err.kind(), ErrorKind::Artifact(ArtifactError::Missing(_))));
    }
}
