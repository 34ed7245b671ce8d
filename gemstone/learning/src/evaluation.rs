//! Fits every candidate once and scores it on the held-out split.

use std::collections::HashSet;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{
    config::NamedModel,
    error::{EvaluationError, ModelError},
    models::{FittedModel, Regressor},
};

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
#[must_use]
pub fn r2_score(truth: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let mean = truth.mean().unwrap_or(0.0);
    let residual: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let total: f64 = truth.iter().map(|t| (t - mean).powi(2)).sum();
    if total == 0.0 {
        if residual == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - residual / total
    }
}

/// Mean absolute error.
#[must_use]
pub fn mean_absolute_error(truth: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    (truth - predicted).mapv(f64::abs).mean().unwrap_or(0.0)
}

/// Root mean squared error.
#[must_use]
pub fn root_mean_squared_error(truth: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    (truth - predicted)
        .mapv(|d| d * d)
        .mean()
        .unwrap_or(0.0)
        .sqrt()
}

/// Held-out accuracy of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    /// R² on the test split; the selection criterion.
    pub r2: f64,
    /// Mean absolute error on the test split.
    pub mae: f64,
    /// Root mean squared error on the test split.
    pub rmse: f64,
}

/// A candidate that fitted and scored successfully.
#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    /// Candidate name.
    pub name: String,
    /// Test-split accuracy.
    pub score: ModelScore,
    /// The fitted model, kept so the winner need not be refit.
    pub model: FittedModel,
}

/// A candidate that failed to fit or predict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Candidate name.
    pub name: String,
    /// Rendered cause.
    pub error: String,
}

/// Result of one evaluation pass, in candidate order.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    /// Successful candidates.
    pub outcomes: Vec<CandidateOutcome>,
    /// Failed candidates.
    pub failures: Vec<CandidateFailure>,
}

impl EvaluationReport {
    /// Candidate name to R², in evaluation order.
    #[must_use]
    pub fn scores(&self) -> IndexMap<String, f64> {
        self.outcomes
            .iter()
            .map(|outcome| (outcome.name.clone(), outcome.score.r2))
            .collect()
    }

    /// Candidate name to full metrics, in evaluation order.
    #[must_use]
    pub fn metrics(&self) -> IndexMap<String, ModelScore> {
        self.outcomes
            .iter()
            .map(|outcome| (outcome.name.clone(), outcome.score))
            .collect()
    }

    /// Highest R²; the first candidate wins a tie.
    #[must_use]
    pub fn best(&self) -> Option<&CandidateOutcome> {
        self.best_index().map(|index| &self.outcomes[index])
    }

    /// Takes ownership of the winner.
    pub fn into_best(mut self) -> Result<CandidateOutcome, EvaluationError> {
        let index = self.best_index().ok_or(EvaluationError::NoViableModel {
            failures: self.failures.len(),
        })?;
        Ok(self.outcomes.swap_remove(index))
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, outcome) in self.outcomes.iter().enumerate() {
            if best.map_or(true, |top| outcome.score.r2 > self.outcomes[top].score.r2) {
                best = Some(index);
            }
        }
        best
    }
}

/// Fits each candidate on the training split and scores it on the test split.
///
/// A candidate that errors is recorded in [`EvaluationReport::failures`] and
/// the remaining candidates still run.
pub fn evaluate_models(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    candidates: &[NamedModel],
) -> Result<EvaluationReport, EvaluationError> {
    if candidates.is_empty() {
        return Err(EvaluationError::NoCandidates);
    }
    let mut names = HashSet::new();
    if let Some(dup) = candidates.iter().find(|c| !names.insert(c.name.as_str())) {
        return Err(EvaluationError::DuplicateName(dup.name.clone()));
    }

    let mut report = EvaluationReport::default();
    for candidate in candidates {
        match fit_and_score(candidate, x_train, y_train, x_test, y_test) {
            Ok((model, score)) => report.outcomes.push(CandidateOutcome {
                name: candidate.name.clone(),
                score,
                model,
            }),
            Err(err) => report.failures.push(CandidateFailure {
                name: candidate.name.clone(),
                error: err.to_string(),
            }),
        }
    }
    Ok(report)
}

fn fit_and_score(
    candidate: &NamedModel,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<(FittedModel, ModelScore), ModelError> {
    if x_test.nrows() != y_test.len() {
        return Err(ModelError::TargetLength {
            rows: x_test.nrows(),
            targets: y_test.len(),
        });
    }
    let model = candidate.spec.fit(x_train, y_train)?;
    let predicted = model.predict(x_test)?;
    let score = ModelScore {
        r2: r2_score(y_test, &predicted),
        mae: mean_absolute_error(y_test, &predicted),
        rmse: root_mean_squared_error(y_test, &predicted),
    };
    Ok((model, score))
}
