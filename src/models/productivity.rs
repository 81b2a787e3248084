//! Модель продуктивности: препроцессор + ансамбль как единое целое

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::adaboost::{AdaBoostConfig, AdaBoostRegressor};
use crate::preprocessing::Preprocessor;
use crate::types::RecordTable;

/// Модель никогда не применяется к сырым данным: только через свой препроцессор.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityModel {
    preprocessor: Preprocessor,
    regressor: AdaBoostRegressor,
}

impl ProductivityModel {
    pub fn predict(&self, X: &RecordTable) -> Result<Array1<f64>> {
        let features = self.preprocessor.transform(X)?;
        self.regressor.predict(&features)
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn regressor(&self) -> &AdaBoostRegressor {
        &self.regressor
    }

    /// Пары (признак, важность), по убыванию важности.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .preprocessor
            .feature_names()
            .into_iter()
            .zip(self.regressor.feature_importances().to_vec())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn validate(&self) -> Result<()> {
        if !self.preprocessor.is_fitted() || !self.regressor.is_trained() {
            return Err(PipelineError::Evaluation("model artifact is not fitted".to_string()));
        }
        Ok(())
    }
}

/// Обучает препроцессор на обучающей части и ансамбль на преобразованных данных.
pub fn train_model(X_train: &RecordTable, y_train: &[f64], preprocessor: &Preprocessor) -> Result<ProductivityModel> {
    train_model_with(X_train, y_train, preprocessor, AdaBoostConfig::default())
}

pub fn train_model_with(
    X_train: &RecordTable,
    y_train: &[f64],
    preprocessor: &Preprocessor,
    config: AdaBoostConfig,
) -> Result<ProductivityModel> {
    if X_train.n_rows() == 0 {
        return Err(PipelineError::Training("Empty training partition".to_string()));
    }
    if X_train.n_rows() != y_train.len() {
        return Err(PipelineError::Training(format!(
            "training partition has {} rows but {} targets",
            X_train.n_rows(),
            y_train.len()
        )));
    }

    let mut preprocessor = preprocessor.clone();
    let features = preprocessor.fit_transform(X_train)?;
    ensure_finite(&features, y_train)?;

    let mut regressor = AdaBoostRegressor::new(config);
    regressor.fit(&features, &Array1::from(y_train.to_vec()))?;

    tracing::info!("Model training complete.");
    Ok(ProductivityModel { preprocessor, regressor })
}

fn ensure_finite(features: &Array2<f64>, targets: &[f64]) -> Result<()> {
    if let Some(((row, col), _)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(PipelineError::Training(format!(
            "non-finite feature value at row {}, column {}",
            row, col
        )));
    }
    if let Some(row) = targets.iter().position(|v| !v.is_finite()) {
        return Err(PipelineError::Training(format!("non-finite target at row {}", row)));
    }
    Ok(())
}
