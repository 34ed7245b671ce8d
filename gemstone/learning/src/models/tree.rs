use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::Regressor;

/// Node of a fitted tree, stored in a flat arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Terminal node predicting the mean target of its samples.
    Leaf {
        /// Predicted value.
        value: f64,
    },
    /// Internal node; rows with `x[feature] <= threshold` go left.
    Split {
        /// Feature index.
        feature: usize,
        /// Split point.
        threshold: f64,
        /// Arena index of the left child.
        left: usize,
        /// Arena index of the right child.
        right: usize,
    },
}

/// CART regression tree minimising squared error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    n_features: usize,
    nodes: Vec<TreeNode>,
}

struct Pending {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grows a tree on `(x, y)`. `x` must have at least one row.
    #[must_use]
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        max_depth: Option<usize>,
        min_samples_split: usize,
    ) -> Self {
        let mut nodes = vec![TreeNode::Leaf { value: 0.0 }];
        let mut stack = vec![Pending {
            node: 0,
            rows: (0..x.nrows()).collect(),
            depth: 0,
        }];
        while let Some(Pending { node, rows, depth }) = stack.pop() {
            let value = rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64;
            nodes[node] = TreeNode::Leaf { value };
            let may_split = rows.len() >= min_samples_split.max(2)
                && max_depth.map_or(true, |limit| depth < limit)
                && !is_pure(&rows, y);
            if !may_split {
                continue;
            }
            let Some(choice) = best_split(x, y, &rows) else {
                continue;
            };
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&r| x[[r, choice.feature]] <= choice.threshold);
            let left = nodes.len();
            let right = left + 1;
            nodes.push(TreeNode::Leaf { value });
            nodes.push(TreeNode::Leaf { value });
            nodes[node] = TreeNode::Split {
                feature: choice.feature,
                threshold: choice.threshold,
                left,
                right,
            };
            stack.push(Pending {
                node: right,
                rows: right_rows,
                depth: depth + 1,
            });
            stack.push(Pending {
                node: left,
                rows: left_rows,
                depth: depth + 1,
            });
        }
        Self {
            n_features: x.ncols(),
            nodes,
        }
    }

    /// Number of nodes, leaves included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let TreeNode::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Verifies the arena shape a deserialized tree relies on: a non-empty
    /// arena, children stored after their parent and inside the arena, and
    /// split features within the fitted width. Forward-only links rule out
    /// cycles.
    pub fn check(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature, left, right, ..
            } = *node
            {
                if feature >= self.n_features {
                    return Err(format!(
                        "node {idx} splits on feature {feature} of {}",
                        self.n_features
                    ));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!(
                            "node {idx} links to child {child} outside {}..{}",
                            idx + 1,
                            self.nodes.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.nodes.iter().all(|node| match node {
            TreeNode::Leaf { value } => value.is_finite(),
            TreeNode::Split { threshold, .. } => threshold.is_finite(),
        })
    }
}

impl Regressor for RegressionTree {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

fn is_pure(rows: &[usize], y: &Array1<f64>) -> bool {
    let first = y[rows[0]];
    rows.iter().all(|&r| (y[r] - first).abs() <= f64::EPSILON * first.abs().max(1.0))
}

/// Finds the split maximising `Σleft²/n_left + Σright²/n_right`, which is the
/// same as minimising the children's summed squared error.
fn best_split(x: &Array2<f64>, y: &Array1<f64>, rows: &[usize]) -> Option<SplitChoice> {
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let count = rows.len() as f64;
    let parent_score = total * total / count;
    let mut best: Option<SplitChoice> = None;
    let mut ordered: Vec<(f64, f64)> = Vec::with_capacity(rows.len());
    for feature in 0..x.ncols() {
        ordered.clear();
        ordered.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut left_sum = 0.0;
        for split in 1..ordered.len() {
            left_sum += ordered[split - 1].1;
            let (below, above) = (ordered[split - 1].0, ordered[split].0);
            if below >= above {
                continue;
            }
            let left_n = split as f64;
            let right_n = count - left_n;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n + right_sum * right_sum / right_n;
            let improves = score > parent_score + parent_score.abs() * 1e-12;
            if improves && best.as_ref().map_or(true, |b| score > b.score) {
                let mid = below + (above - below) / 2.0;
                let threshold = if mid >= above { below } else { mid };
                best = Some(SplitChoice {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fits_step_function_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let tree = RegressionTree::fit(&x, &y, None, 2);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 1);
        let predictions = tree.predict(&array![[0.0], [6.0], [7.0], [100.0]]).unwrap();
        assert_eq!(predictions, array![5.0, 5.0, 20.0, 20.0]);
    }

    #[test]
    fn respects_depth_limit() {
        let x = Array2::from_shape_fn((32, 2), |(r, c)| (r * (c + 1)) as f64);
        let y = Array1::from_shape_fn(32, |r| (r * r) as f64);
        let stump = RegressionTree::fit(&x, &y, Some(1), 2);
        assert_eq!(stump.depth(), 1);
        let deep = RegressionTree::fit(&x, &y, None, 2);
        assert!(deep.depth() > 1);
        // Unlimited depth memorises distinct training points.
        let train = deep.predict(&x).unwrap();
        assert_eq!(train, y);
    }

    #[test]
    fn fitted_tree_passes_check() {
        let x = Array2::from_shape_fn((20, 3), |(r, c)| ((r * 7 + c * 3) % 11) as f64);
        let y = Array1::from_shape_fn(20, |r| (r % 5) as f64);
        assert_eq!(RegressionTree::fit(&x, &y, None, 2).check(), Ok(()));
    }

    #[test]
    fn check_rejects_broken_arenas() {
        let split = |feature: usize, left: usize, right: usize| TreeNode::Split {
            feature,
            threshold: 0.5,
            left,
            right,
        };
        let leaf = TreeNode::Leaf { value: 1.0 };
        let tree = |nodes: Vec<TreeNode>| RegressionTree {
            n_features: 2,
            nodes,
        };

        assert!(tree(vec![]).check().is_err());
        let out_of_range = tree(vec![split(0, 7, 8)]).check().unwrap_err();
        assert!(out_of_range.contains("child 7"), "{out_of_range}");
        let cycle = tree(vec![split(0, 1, 2), split(1, 0, 2), leaf.clone()]).check().unwrap_err();
        assert!(cycle.contains("node 1"), "{cycle}");
        let wide = tree(vec![split(2, 1, 2), leaf.clone(), leaf.clone()]).check().unwrap_err();
        assert!(wide.contains("feature 2"), "{wide}");
        assert_eq!(tree(vec![split(1, 1, 2), leaf.clone(), leaf]).check(), Ok(()));
    }

    #[test]
    fn constant_features_yield_single_leaf() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let y = array![1.0, 2.0, 3.0];
        let tree = RegressionTree::fit(&x, &y, None, 2);
        assert_eq!(tree.node_count(), 1);
        let prediction = tree.predict(&array![[4.0, 4.0]]).unwrap();
        assert!((prediction[0] - 2.0).abs() < f64::EPSILON);
    }
}
