//! Оценка модели на отложенной выборке

#![allow(non_snake_case)]

use linfa::prelude::SingleTargetRegression;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::productivity::ProductivityModel;
use crate::types::RecordTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Вырожденные значения (например, R² при нулевой дисперсии) не маскируются.
pub fn evaluate_model(model: &ProductivityModel, X_test: &RecordTable, y_test: &[f64]) -> Result<RegressionMetrics> {
    if X_test.n_rows() != y_test.len() {
        return Err(PipelineError::Evaluation(format!(
            "test partition has {} rows but {} targets",
            X_test.n_rows(),
            y_test.len()
        )));
    }
    if y_test.is_empty() {
        return Err(PipelineError::Evaluation("Empty test partition".to_string()));
    }

    let predictions = model.predict(X_test)?;
    let metrics = regression_metrics(&predictions, &Array1::from(y_test.to_vec()))?;

    tracing::info!(
        "Evaluation: RMSE={:.4} MAE={:.4} R2={:.4}",
        metrics.rmse,
        metrics.mae,
        metrics.r2
    );
    Ok(metrics)
}

pub fn regression_metrics(predictions: &Array1<f64>, truth: &Array1<f64>) -> Result<RegressionMetrics> {
    // ndarray растянул бы выборку длины 1, поэтому длины сверяем заранее
    if predictions.len() != truth.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} predictions for {} targets",
            predictions.len(),
            truth.len()
        )));
    }
    let metric_error = |e: linfa::Error| PipelineError::Evaluation(format!("metric computation failed: {}", e));

    let mse = predictions.mean_squared_error(truth).map_err(metric_error)?;
    let mae = predictions.mean_absolute_error(truth).map_err(metric_error)?;
    let r2 = predictions.r2(truth).map_err(metric_error)?;

    Ok(RegressionMetrics {
        rmse: mse.sqrt(),
        mae,
        r2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn perfect_predictions() {
        let y = array![0.5, 0.7, 0.9];
        let metrics = regression_metrics(&y, &y).unwrap();
        assert_eq!(metrics.rmse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert!((metrics.r2 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn known_errors() {
        let pred = array![1.0, 2.0, 3.0, 4.0];
        let truth = array![2.0, 2.0, 3.0, 6.0];
        let metrics = regression_metrics(&pred, &truth).unwrap();
        // квадраты ошибок: 1, 0, 0, 4
        assert!((metrics.rmse - (5.0f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((metrics.mae - 0.75).abs() < 1e-12);
        assert!(metrics.r2 < 1.0);
    }

    #[test]
    fn mismatched_lengths_are_evaluation_errors() {
        let result = regression_metrics(&array![1.0, 2.0], &array![1.0]);
        assert!(matches!(result, Err(PipelineError::Evaluation(_))));
    }
}
