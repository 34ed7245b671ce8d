//! Column-wise feature preprocessing.
//!
//! Numeric columns are median-imputed then standardized. Graded columns are
//! imputed with their most frequent value, ordinal-encoded, then standardized.
//! Output columns follow [`FEATURE_NAMES`].

/// Ordinal encoding of graded columns.
pub mod encoder;
/// Median and most-frequent imputation.
pub mod imputer;
/// Standardization.
pub mod scaler;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    error::TransformError,
    schema::{CategoricalColumn, GemFeatures, NumericColumn, FEATURE_COUNT, FEATURE_NAMES},
};
use scaler::StandardScaler;

/// Unfitted preprocessor. Fitting yields an immutable [`FittedPreprocessor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DataTransformation;

impl DataTransformation {
    /// Learns imputation values and scaling from the training frame.
    pub fn fit(self, frame: &[GemFeatures]) -> Result<FittedPreprocessor, TransformError> {
        if frame.is_empty() {
            return Err(TransformError::EmptyFrame);
        }
        let numeric = NumericColumn::ALL
            .into_iter()
            .map(|column| NumericPipeline::fit(column, frame))
            .collect::<Result<Vec<_>, _>>()?;
        let categorical = CategoricalColumn::ALL
            .into_iter()
            .map(|column| CategoricalPipeline::fit(column, frame))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FittedPreprocessor {
            numeric,
            categorical,
        })
    }

    /// Fits on `frame` and transforms it with the result.
    pub fn fit_transform(
        self,
        frame: &[GemFeatures],
    ) -> Result<(FittedPreprocessor, Array2<f64>), TransformError> {
        let fitted = self.fit(frame)?;
        let matrix = fitted.transform(frame)?;
        Ok((fitted, matrix))
    }
}

/// Fitted numeric sub-pipeline for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericPipeline {
    /// Source column.
    pub column: NumericColumn,
    /// Training median used for missing values.
    pub median: f64,
    /// Standardization fitted on imputed training values.
    pub scaler: StandardScaler,
}

impl NumericPipeline {
    fn fit(column: NumericColumn, frame: &[GemFeatures]) -> Result<Self, TransformError> {
        let median = imputer::median(frame.iter().map(|row| row.numeric(column)))
            .ok_or(TransformError::EmptyColumn(column.name()))?;
        let imputed: Vec<f64> = frame
            .iter()
            .map(|row| Self::impute(row.numeric(column), median))
            .collect();
        Ok(Self {
            column,
            median,
            scaler: StandardScaler::fit(&imputed),
        })
    }

    fn impute(value: Option<f64>, median: f64) -> f64 {
        value.filter(|v| !v.is_nan()).unwrap_or(median)
    }

    fn apply(&self, row: &GemFeatures) -> f64 {
        self.scaler
            .apply(Self::impute(row.numeric(self.column), self.median))
    }
}

/// Fitted categorical sub-pipeline for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalPipeline {
    /// Source column.
    pub column: CategoricalColumn,
    /// Training mode used for missing values.
    pub most_frequent: String,
    /// Standardization fitted on the ordinal codes.
    pub scaler: StandardScaler,
}

impl CategoricalPipeline {
    fn fit(column: CategoricalColumn, frame: &[GemFeatures]) -> Result<Self, TransformError> {
        let most_frequent =
            imputer::most_frequent(frame.iter().map(|row| row.categorical(column)))
                .ok_or(TransformError::EmptyColumn(column.name()))?;
        let codes = frame
            .iter()
            .map(|row| {
                let value = row.categorical(column).unwrap_or(most_frequent.as_str());
                encoder::encode(column, value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            column,
            most_frequent,
            scaler: StandardScaler::fit(&codes),
        })
    }

    fn apply(&self, row: &GemFeatures) -> Result<f64, TransformError> {
        let value = row.categorical(self.column).unwrap_or(self.most_frequent.as_str());
        Ok(self.scaler.apply(encoder::encode(self.column, value)?))
    }
}

/// Fitted preprocessor. Applying it never changes its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    numeric: Vec<NumericPipeline>,
    categorical: Vec<CategoricalPipeline>,
}

impl FittedPreprocessor {
    /// Transforms a batch into an `n x 9` matrix.
    pub fn transform(&self, frame: &[GemFeatures]) -> Result<Array2<f64>, TransformError> {
        let mut matrix = Array2::zeros((frame.len(), FEATURE_COUNT));
        for (mut out, row) in matrix.rows_mut().into_iter().zip(frame) {
            let mut idx = 0;
            for pipeline in &self.numeric {
                out[idx] = pipeline.apply(row);
                idx += 1;
            }
            for pipeline in &self.categorical {
                out[idx] = pipeline.apply(row)?;
                idx += 1;
            }
        }
        Ok(matrix)
    }

    /// Transforms a single row into a `1 x 9` matrix.
    pub fn transform_one(&self, row: &GemFeatures) -> Result<Array2<f64>, TransformError> {
        self.transform(std::slice::from_ref(row))
    }

    /// Verifies the column layout, e.g. after loading from disk.
    pub fn check_layout(&self) -> Result<(), TransformError> {
        let found: Vec<&str> = self
            .numeric
            .iter()
            .map(|p| p.column.name())
            .chain(self.categorical.iter().map(|p| p.column.name()))
            .collect();
        if found == FEATURE_NAMES {
            Ok(())
        } else {
            Err(TransformError::ColumnLayout {
                expected: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
                found: found.into_iter().map(str::to_string).collect(),
            })
        }
    }

    /// Numeric sub-pipelines in output order.
    #[must_use]
    pub fn numeric(&self) -> &[NumericPipeline] {
        &self.numeric
    }

    /// Categorical sub-pipelines in output order.
    #[must_use]
    pub fn categorical(&self) -> &[CategoricalPipeline] {
        &self.categorical
    }
}
