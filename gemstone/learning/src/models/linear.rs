use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::Regressor;

/// Linear model `y = coefficients · x + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Builds a model from fitted parameters.
    #[must_use]
    pub const fn new(coefficients: Array1<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// Fitted weights, one per feature.
    #[must_use]
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Fitted intercept.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.coefficients.iter().all(|c| c.is_finite())
    }
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.coefficients) + self.intercept
    }
}

/// Column means of `x`, mean of `y`, and both centered copies.
pub(crate) fn center(x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64, Array2<f64>, Array1<f64>) {
    let x_mean = x
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()));
    let y_mean = y.mean().unwrap_or(0.0);
    let xc = x - &x_mean;
    let yc = y - y_mean;
    (x_mean, y_mean, xc, yc)
}

/// Solves `(XᵀX + alpha·I) w = Xᵀy` on centered data, so the intercept is not
/// penalised. `alpha = 0` gives ordinary least squares.
#[must_use]
pub fn fit_least_squares(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> LinearModel {
    let (x_mean, y_mean, xc, yc) = center(x, y);
    let mut gram = xc.t().dot(&xc);
    if alpha > 0.0 {
        gram.diag_mut().mapv_inplace(|d| d + alpha);
    }
    let rhs = xc.t().dot(&yc);
    let coefficients = solve_normal_equations(gram, rhs);
    let intercept = y_mean - x_mean.dot(&coefficients);
    LinearModel::new(coefficients, intercept)
}

/// Gaussian elimination on a symmetric positive semi-definite system.
///
/// Directions with a vanishing pivot (constant or exactly collinear columns)
/// get a zero coefficient instead of failing.
fn solve_normal_equations(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let largest = a.diag().iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
    let tolerance = largest * 1e-12;
    let mut degenerate = vec![false; n];
    for k in 0..n {
        let pivot = a[[k, k]];
        if pivot <= tolerance {
            degenerate[k] = true;
            continue;
        }
        for i in (k + 1)..n {
            let factor = a[[i, k]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                a[[i, j]] -= factor * a[[k, j]];
            }
            b[i] -= factor * b[k];
        }
    }
    let mut solution = Array1::zeros(n);
    for k in (0..n).rev() {
        if degenerate[k] {
            continue;
        }
        let tail: f64 = ((k + 1)..n).map(|j| a[[k, j]] * solution[j]).sum();
        solution[k] = (b[k] - tail) / a[[k, k]];
    }
    solution
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn recovers_exact_linear_relation() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 5.0], [4.0, 3.0], [5.0, 0.0]];
        let y = x.map_axis(Axis(1), |row| 3.0 * row[0] - 2.0 * row[1] + 7.0);
        let model = fit_least_squares(&x, &y, 0.0);
        assert!((model.coefficients()[0] - 3.0).abs() < 1e-9);
        assert!((model.coefficients()[1] + 2.0).abs() < 1e-9);
        assert!((model.intercept() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let ols = fit_least_squares(&x, &y, 0.0);
        let ridge = fit_least_squares(&x, &y, 5.0);
        assert!(ridge.coefficients()[0] < ols.coefficients()[0]);
        assert!(ridge.coefficients()[0] > 0.0);
    }

    #[test]
    fn constant_column_gets_zero_weight() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        let y = array![1.0, 2.0, 3.0];
        let model = fit_least_squares(&x, &y, 0.0);
        assert!(model.coefficients()[1].abs() < f64::EPSILON);
        assert!((model.predict_row(array![4.0, 0.0].view()) - 4.0).abs() < 1e-9);
    }
}
