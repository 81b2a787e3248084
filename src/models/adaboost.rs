//! AdaBoost.R2 регрессор над деревьями регрессии

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::regression_tree::RegressionTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for AdaBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 1.0,
            max_depth: 3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    config: AdaBoostConfig,
    estimators: Vec<RegressionTree>,
    estimator_weights: Vec<f64>,
    estimator_errors: Vec<f64>,
    n_features: usize,
}

impl AdaBoostRegressor {
    pub fn new(config: AdaBoostConfig) -> Self {
        Self {
            config,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            estimator_errors: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &AdaBoostConfig {
        &self.config
    }

    pub fn n_estimators(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    pub fn estimator_errors(&self) -> &[f64] {
        &self.estimator_errors
    }

    pub fn is_trained(&self) -> bool {
        !self.estimators.is_empty()
    }

    pub fn fit(&mut self, X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = X.nrows();
        if n_samples == 0 || X.ncols() == 0 {
            return Err(PipelineError::Training("Empty dataset".to_string()));
        }
        if n_samples != y.len() {
            return Err(PipelineError::Training(format!(
                "features have {} rows, targets {}",
                n_samples,
                y.len()
            )));
        }
        if self.config.n_estimators == 0 || self.config.learning_rate <= 0.0 {
            return Err(PipelineError::Training("invalid boosting configuration".to_string()));
        }

        let lr = self.config.learning_rate;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut sample_weight = vec![1.0 / n_samples as f64; n_samples];

        self.estimators.clear();
        self.estimator_weights.clear();
        self.estimator_errors.clear();
        self.n_features = X.ncols();

        for iboost in 0..self.config.n_estimators {
            // Бутстрэп по текущим весам
            let sampler = WeightedIndex::new(&sample_weight)
                .map_err(|e| PipelineError::Training(format!("invalid sample weights: {}", e)))?;
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = RegressionTree::new(self.config.max_depth, 2);
            tree.fit(X, y, bootstrap)?;
            let predictions = tree.predict(X)?;

            // Линейная функция потерь, нормированная на максимум
            let mut loss: Vec<f64> = predictions.iter().zip(y).map(|(p, t)| (p - t).abs()).collect();
            let loss_max = loss.iter().copied().fold(0.0, f64::max);
            if loss_max > 0.0 {
                loss.iter_mut().for_each(|l| *l /= loss_max);
            }

            let estimator_error: f64 = sample_weight.iter().zip(&loss).map(|(w, l)| w * l).sum();

            if estimator_error <= 0.0 {
                // Идеальное совпадение: дальше бустить нечего
                self.push(tree, 1.0, 0.0);
                break;
            }
            if estimator_error >= 0.5 {
                // Хуже случайного; оставляем только если это единственный ученик
                if self.estimators.is_empty() {
                    self.push(tree, 1.0, estimator_error);
                }
                tracing::debug!("Boosting stopped at round {}: error {:.4}", iboost, estimator_error);
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            let estimator_weight = lr * (1.0 / beta).ln();
            self.push(tree, estimator_weight, estimator_error);

            if iboost + 1 < self.config.n_estimators {
                for (w, l) in sample_weight.iter_mut().zip(&loss) {
                    *w *= beta.powf((1.0 - l) * lr);
                }
                let total: f64 = sample_weight.iter().sum();
                if !(total > 0.0) {
                    break;
                }
                sample_weight.iter_mut().for_each(|w| *w /= total);
            }
        }

        tracing::info!(
            "AdaBoost trained: {} estimators (requested {})",
            self.estimators.len(),
            self.config.n_estimators
        );
        Ok(())
    }

    fn push(&mut self, tree: RegressionTree, weight: f64, error: f64) {
        self.estimators.push(tree);
        self.estimator_weights.push(weight);
        self.estimator_errors.push(error);
    }

    /// Взвешенная медиана предсказаний слабых учеников.
    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_trained() {
            return Err(PipelineError::Evaluation("Model not trained".to_string()));
        }
        if X.ncols() != self.n_features {
            return Err(PipelineError::Evaluation(format!(
                "expected {} features, got {}",
                self.n_features,
                X.ncols()
            )));
        }

        let per_estimator = self
            .estimators
            .iter()
            .map(|tree| tree.predict(X))
            .collect::<Result<Vec<_>>>()?;
        let total_weight: f64 = self.estimator_weights.iter().sum();

        let mut predictions = Array1::zeros(X.nrows());
        let mut column: Vec<(f64, f64)> = Vec::with_capacity(self.estimators.len());
        for i in 0..X.nrows() {
            column.clear();
            column.extend(
                per_estimator
                    .iter()
                    .zip(&self.estimator_weights)
                    .map(|(pred, &w)| (pred[i], w)),
            );
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let half = 0.5 * total_weight;
            let mut cumulative = 0.0;
            let mut median = column[0].0;
            for &(value, weight) in column.iter() {
                cumulative += weight;
                if cumulative >= half {
                    median = value;
                    break;
                }
            }
            predictions[i] = median;
        }

        Ok(predictions)
    }

    /// Важность признаков: взвешенное снижение SSE, нормированное к единице.
    pub fn feature_importances(&self) -> Array1<f64> {
        let mut importances = Array1::<f64>::zeros(self.n_features);
        let total_weight: f64 = self.estimator_weights.iter().sum();
        if total_weight <= 0.0 {
            return importances;
        }

        for (tree, weight) in self.estimators.iter().zip(&self.estimator_weights) {
            let decrease = tree.impurity_decrease();
            let tree_total: f64 = decrease.iter().sum();
            if tree_total <= 0.0 {
                continue;
            }
            for (imp, d) in importances.iter_mut().zip(decrease) {
                *imp += weight * d / tree_total;
            }
        }

        let sum = importances.sum();
        if sum > 0.0 {
            importances /= sum;
        }
        importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let X = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = X.column(0).mapv(|v| 0.5 * v + 1.0);
        (X, y)
    }

    #[test]
    fn training_is_deterministic() {
        let (X, y) = linear_data();
        let mut a = AdaBoostRegressor::new(AdaBoostConfig { n_estimators: 20, ..Default::default() });
        let mut b = AdaBoostRegressor::new(AdaBoostConfig { n_estimators: 20, ..Default::default() });
        a.fit(&X, &y).unwrap();
        b.fit(&X, &y).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(&X).unwrap(), b.predict(&X).unwrap());
    }

    #[test]
    fn fits_monotone_signal() {
        let (X, y) = linear_data();
        let mut model = AdaBoostRegressor::new(AdaBoostConfig::default());
        model.fit(&X, &y).unwrap();

        assert!(model.n_estimators() >= 1 && model.n_estimators() <= 100);
        let pred = model.predict(&X).unwrap();
        let mae = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 2.0, "mae = {}", mae);

        let importances = model.feature_importances();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn perfect_fit_stops_early() {
        let X = array![[0.0], [0.0], [1.0], [1.0]];
        let y = array![2.0, 2.0, 2.0, 2.0];
        let mut model = AdaBoostRegressor::new(AdaBoostConfig::default());
        model.fit(&X, &y).unwrap();
        assert_eq!(model.n_estimators(), 1);
        assert_eq!(model.predict(&X).unwrap(), y);
    }

    #[test]
    fn rejects_empty_and_mismatched_input() {
        let mut model = AdaBoostRegressor::new(AdaBoostConfig::default());
        assert!(model.fit(&Array2::zeros((0, 3)), &Array1::zeros(0)).is_err());
        assert!(model.fit(&Array2::zeros((2, 1)), &Array1::zeros(3)).is_err());
        assert!(model.predict(&Array2::zeros((1, 1))).is_err());
    }
}
