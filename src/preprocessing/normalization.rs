//! Нормализация числовых признаков

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataNormalizer {
    mean: Option<Array1<f64>>,
    std: Option<Array1<f64>>,
}

impl DataNormalizer {
    pub fn new() -> Self {
        Self { mean: None, std: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.std.is_some()
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(PipelineError::Training("Empty dataset".to_string()));
        }

        // Среднее и стандартное отклонение (ddof = 0) по каждому признаку
        let mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::Training("Failed to compute mean".to_string()))?;
        let mut std = X.std_axis(Axis(0), 0.0);

        // Избегаем деления на ноль
        for val in std.iter_mut() {
            if *val < 1e-10 {
                *val = 1.0;
            }
        }

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, std) = match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => (mean, std),
            _ => return Err(PipelineError::Evaluation("Normalizer not fitted".to_string())),
        };
        if X.ncols() != mean.len() {
            return Err(PipelineError::Evaluation(format!(
                "expected {} numeric features, got {}",
                mean.len(),
                X.ncols()
            )));
        }

        // (X - mean) / std
        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - mean[i]) / std[i];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
