//! Дерево регрессии (слабый ученик для бустинга)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Дерево по критерию MSE с полным перебором порогов.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    max_depth: usize,
    min_samples_split: usize,
    root: Option<TreeNode>,
    /// Суммарное снижение SSE по каждому признаку.
    impurity_decrease: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    pub fn new(max_depth: usize, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            root: None,
            impurity_decrease: Vec::new(),
        }
    }

    /// `indices` может содержать повторы (бутстрэп-выборка).
    pub fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>) -> Result<()> {
        if indices.is_empty() || X.nrows() == 0 {
            return Err(PipelineError::Training("Empty dataset".to_string()));
        }
        if X.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "features have {} rows, targets {}",
                X.nrows(),
                y.len()
            )));
        }

        self.impurity_decrease = vec![0.0; X.ncols()];
        let root = self.build_tree(X, y, 0, indices);
        self.root = Some(root);
        Ok(())
    }

    fn build_tree(&mut self, X: &Array2<f64>, y: &Array1<f64>, depth: usize, indices: Vec<usize>) -> TreeNode {
        let (mean, sse) = mean_sse(indices.iter().map(|&i| y[i]));

        if depth >= self.max_depth || indices.len() < self.min_samples_split || sse <= 1e-12 {
            return TreeNode::Leaf { value: mean };
        }

        let best = match self.best_split(X, y, &indices) {
            Some(best) => best,
            None => return TreeNode::Leaf { value: mean },
        };

        self.impurity_decrease[best.feature] += (sse - best.sse).max(0.0);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| X[[i, best.feature]] < best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build_tree(X, y, depth + 1, left_indices)),
            right: Box::new(self.build_tree(X, y, depth + 1, right_indices)),
        }
    }

    fn best_split(&self, X: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..X.ncols() {
            sorted.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..sorted.len() - 1 {
                let yi = y[sorted[k]];
                left_sum += yi;
                left_sq += yi * yi;

                let current = X[[sorted[k], feature]];
                let next = X[[sorted[k + 1], feature]];
                if next - current <= 1e-12 {
                    continue;
                }

                let n_left = (k + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left).max(0.0)
                    + (right_sq - right_sum * right_sum / n_right).max(0.0);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (current + next) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::Evaluation("Model not trained".to_string()))?;
        Ok(X.rows().into_iter().map(|row| predict_single(root, row)).collect())
    }

    pub fn impurity_decrease(&self) -> &[f64] {
        &self.impurity_decrease
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

fn predict_single(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
    match node {
        TreeNode::Leaf { value } => *value,
        TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if sample[*feature] < *threshold {
                predict_single(left, sample)
            } else {
                predict_single(right, sample)
            }
        }
    }
}

fn mean_sse(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut sum, mut sq) = (0.0, 0.0, 0.0);
    for v in values {
        n += 1.0;
        sum += v;
        sq += v * v;
    }
    if n == 0.0 {
        return (0.0, 0.0);
    }
    (sum / n, (sq - sum * sum / n).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fits_step_function_exactly() {
        let X = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = RegressionTree::new(3, 2);
        tree.fit(&X, &y, (0..4).collect()).unwrap();

        assert_eq!(tree.predict(&X).unwrap(), y);
        assert_eq!(tree.depth(), 1);
        assert!(tree.impurity_decrease()[0] > 0.0);
    }

    #[test]
    fn respects_max_depth() {
        let X = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![1.0, 4.0, 2.0, 8.0, 3.0, 9.0, 0.0, 5.0];
        let mut tree = RegressionTree::new(2, 2);
        tree.fit(&X, &y, (0..8).collect()).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn constant_features_give_mean_leaf() {
        let X = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut tree = RegressionTree::new(3, 2);
        tree.fit(&X, &y, vec![0, 1, 2]).unwrap();
        assert_eq!(tree.predict(&array![[5.0]]).unwrap(), array![2.0]);
    }

    #[test]
    fn predict_requires_fit() {
        assert!(RegressionTree::new(3, 2).predict(&array![[1.0]]).is_err());
    }
}
