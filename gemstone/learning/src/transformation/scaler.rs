use serde::{Deserialize, Serialize};

/// Per-column standardization parameters: `(value - mean) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Training mean.
    pub mean: f64,
    /// Training population standard deviation, or 1.0 for a constant column.
    pub scale: f64,
}

impl StandardScaler {
    /// Fits on a column of imputed values. `values` must not be empty.
    #[must_use]
    pub fn fit(values: &[f64]) -> Self {
        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let variance = values
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / count;
        let std = variance.sqrt();
        Self {
            mean,
            scale: if std > f64::EPSILON * mean.abs().max(1.0) {
                std
            } else {
                1.0
            },
        }
    }

    /// Standardizes one value.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}
