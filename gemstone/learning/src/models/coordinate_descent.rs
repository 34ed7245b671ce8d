use ndarray::{Array1, Array2, Axis};

use super::linear::{center, LinearModel};

const MAX_ITER: usize = 1_000;
const TOLERANCE: f64 = 1e-4;

/// Minimises `1/(2n)·‖y − Xw‖² + alpha·l1_ratio·‖w‖₁ + alpha·(1 − l1_ratio)/2·‖w‖²`
/// by cyclic coordinate descent on centered data. `l1_ratio = 1` is the lasso.
#[must_use]
pub fn fit_elastic_net(x: &Array2<f64>, y: &Array1<f64>, alpha: f64, l1_ratio: f64) -> LinearModel {
    let (x_mean, y_mean, xc, yc) = center(x, y);
    let rows = xc.nrows() as f64;
    let l1_penalty = alpha * l1_ratio * rows;
    let l2_penalty = alpha * (1.0 - l1_ratio) * rows;
    let norms = xc.map_axis(Axis(0), |column| column.dot(&column));

    let mut weights = Array1::<f64>::zeros(xc.ncols());
    let mut residual = yc;
    for _ in 0..MAX_ITER {
        let mut largest_step = 0.0_f64;
        let mut largest_weight = 0.0_f64;
        for (j, column) in xc.columns().into_iter().enumerate() {
            let denominator = norms[j] + l2_penalty;
            if denominator <= 0.0 {
                continue;
            }
            let previous = weights[j];
            let rho = column.dot(&residual) + norms[j] * previous;
            let updated = soft_threshold(rho, l1_penalty) / denominator;
            if updated != previous {
                residual.scaled_add(previous - updated, &column);
                weights[j] = updated;
            }
            largest_step = largest_step.max((updated - previous).abs());
            largest_weight = largest_weight.max(updated.abs());
        }
        if largest_weight == 0.0 || largest_step / largest_weight < TOLERANCE {
            break;
        }
    }
    let intercept = y_mean - x_mean.dot(&weights);
    LinearModel::new(weights, intercept)
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}
