//! Candidate regressors.

/// Lasso and elastic-net by coordinate descent.
pub mod coordinate_descent;
/// Least squares and ridge in closed form.
pub mod linear;
/// CART regression tree.
pub mod tree;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
pub use linear::LinearModel;
pub use tree::RegressionTree;

/// Prediction interface shared by every fitted regressor.
pub trait Regressor {
    /// Feature width seen at fit time.
    fn n_features(&self) -> usize;

    /// Predicts one already-validated row.
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Predicts every row of `x`, rejecting wrong widths and non-finite output.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::FeatureCount {
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        let predictions: Array1<f64> = x.rows().into_iter().map(|row| self.predict_row(row)).collect();
        if predictions.iter().all(|value| value.is_finite()) {
            Ok(predictions)
        } else {
            Err(ModelError::NonFinite)
        }
    }
}

/// Algorithm choice plus hyperparameters, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Ordinary least squares with intercept.
    LinearRegression,
    /// L1-penalised least squares.
    Lasso {
        /// Penalty strength.
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    /// L2-penalised least squares.
    Ridge {
        /// Penalty strength.
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
    /// Mixed L1/L2 penalty.
    ElasticNet {
        /// Penalty strength.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Share of the penalty that is L1.
        #[serde(default = "default_l1_ratio")]
        l1_ratio: f64,
    },
    /// Regression tree minimising squared error.
    DecisionTree {
        /// Depth limit; unbounded when absent.
        #[serde(default)]
        max_depth: Option<usize>,
        /// Smallest node that may still be split.
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
    },
}

const fn default_alpha() -> f64 {
    1.0
}

const fn default_l1_ratio() -> f64 {
    0.5
}

const fn default_min_samples_split() -> usize {
    2
}

impl ModelSpec {
    /// Checks hyperparameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        let check_alpha = |alpha: f64| {
            if alpha.is_finite() && alpha >= 0.0 {
                Ok(())
            } else {
                Err(format!("alpha {alpha} must be finite and non-negative"))
            }
        };
        match *self {
            Self::LinearRegression => Ok(()),
            Self::Lasso { alpha } | Self::Ridge { alpha } => check_alpha(alpha),
            Self::ElasticNet { alpha, l1_ratio } => {
                check_alpha(alpha)?;
                if (0.0..=1.0).contains(&l1_ratio) {
                    Ok(())
                } else {
                    Err(format!("l1_ratio {l1_ratio} must be in [0, 1]"))
                }
            }
            Self::DecisionTree {
                max_depth,
                min_samples_split,
            } => {
                if max_depth == Some(0) {
                    Err("max_depth must be at least 1".into())
                } else if min_samples_split < 2 {
                    Err("min_samples_split must be at least 2".into())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Fits a fresh model. Each call is independent of every other.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::NoRows);
        }
        if x.nrows() != y.len() {
            return Err(ModelError::TargetLength {
                rows: x.nrows(),
                targets: y.len(),
            });
        }
        let model = match *self {
            Self::LinearRegression => FittedModel::Linear(linear::fit_least_squares(x, y, 0.0)),
            Self::Ridge { alpha } => FittedModel::Linear(linear::fit_least_squares(x, y, alpha)),
            Self::Lasso { alpha } => {
                FittedModel::Linear(coordinate_descent::fit_elastic_net(x, y, alpha, 1.0))
            }
            Self::ElasticNet { alpha, l1_ratio } => {
                FittedModel::Linear(coordinate_descent::fit_elastic_net(x, y, alpha, l1_ratio))
            }
            Self::DecisionTree {
                max_depth,
                min_samples_split,
            } => FittedModel::Tree(RegressionTree::fit(x, y, max_depth, min_samples_split)),
        };
        if model.is_finite() {
            Ok(model)
        } else {
            Err(ModelError::NonFinite)
        }
    }
}

/// A fitted regressor, persisted as the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    /// Any of the linear families.
    Linear(LinearModel),
    /// Regression tree.
    Tree(RegressionTree),
}

impl FittedModel {
    /// Structural checks for a model read back from disk. `n_features` is the
    /// width the preprocessor produces.
    pub fn check(&self, n_features: usize) -> Result<(), String> {
        if self.n_features() != n_features {
            return Err(format!(
                "model expects {} features, preprocessor produces {n_features}",
                self.n_features()
            ));
        }
        match self {
            Self::Linear(_) => Ok(()),
            Self::Tree(model) => model.check(),
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Self::Linear(model) => model.is_finite(),
            Self::Tree(model) => model.is_finite(),
        }
    }
}

impl Regressor for FittedModel {
    fn n_features(&self) -> usize {
        match self {
            Self::Linear(model) => model.n_features(),
            Self::Tree(model) => model.n_features(),
        }
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::Linear(model) => model.predict_row(row),
            Self::Tree(model) => model.predict_row(row),
        }
    }
}
