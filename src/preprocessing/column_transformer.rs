//! Составное преобразование: стандартизация числовых + one-hot категориальных признаков

#![allow(non_snake_case)]

use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::preprocessing::encoding::OneHotEncoder;
use crate::preprocessing::normalization::DataNormalizer;
use crate::types::{ColumnData, RecordTable};

/// Создаётся пустым, обучается один раз на обучающей выборке и затем только применяется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    scaler: DataNormalizer,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    pub fn new(numeric_columns: Vec<String>, categorical_columns: Vec<String>) -> Self {
        Self {
            numeric_columns,
            categorical_columns,
            scaler: DataNormalizer::new(),
            encoder: OneHotEncoder::new(),
        }
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_fitted() && self.encoder.is_fitted()
    }

    pub fn fit(&mut self, X: &RecordTable) -> Result<()> {
        if self.is_fitted() {
            return Err(PipelineError::Training("Preprocessor is already fitted".to_string()));
        }
        if X.n_rows() == 0 {
            return Err(PipelineError::Training("Empty training partition".to_string()));
        }

        let numeric = self.numeric_matrix(X).map_err(as_training)?;
        self.scaler.fit(&numeric)?;

        let categorical = categorical_slices(&self.categorical_columns, X).map_err(as_training)?;
        self.encoder.fit(&categorical)?;
        Ok(())
    }

    pub fn transform(&self, X: &RecordTable) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::Evaluation("Preprocessor not fitted".to_string()));
        }
        let numeric = self.scaler.transform(&self.numeric_matrix(X)?)?;
        let categorical = self.encoder
            .transform(&categorical_slices(&self.categorical_columns, X)?, X.n_rows())?;

        concatenate(Axis(1), &[numeric.view(), categorical.view()])
            .map_err(|e| PipelineError::Evaluation(format!("cannot assemble features: {}", e)))
    }

    pub fn fit_transform(&mut self, X: &RecordTable) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X).map_err(as_training)
    }

    /// Имена выходных признаков в порядке колонок матрицы.
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric_columns
            .iter()
            .cloned()
            .chain(self.encoder.feature_names())
            .collect()
    }

    fn numeric_matrix(&self, X: &RecordTable) -> Result<Array2<f64>> {
        let mut matrix = Array2::zeros((X.n_rows(), self.numeric_columns.len()));
        for (j, name) in self.numeric_columns.iter().enumerate() {
            for (i, value) in X.numeric(name)?.iter().enumerate() {
                matrix[[i, j]] = value.ok_or_else(|| {
                    PipelineError::Evaluation(format!("missing value in '{}' at row {}", name, i))
                })?;
            }
        }
        Ok(matrix)
    }
}

fn categorical_slices<'a>(
    columns: &'a [String],
    X: &'a RecordTable,
) -> Result<Vec<(&'a str, &'a [Option<String>])>> {
    columns
        .iter()
        .map(|name| match &X.require(name)?.data {
            ColumnData::Categorical(values) => Ok((name.as_str(), values.as_slice())),
            _ => Err(PipelineError::Evaluation(format!("column '{}' is not categorical", name))),
        })
        .collect()
}

fn as_training(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Evaluation(msg) | PipelineError::DataSource(msg) => PipelineError::Training(msg),
        other => other,
    }
}
