//! Разбиение на обучающую и отложенную выборки

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::preprocessing::column_transformer::Preprocessor;
use crate::types::{ColumnData, RecordTable, CATEGORICAL_COLUMNS, DATE, TARGET};

pub const SPLIT_SEED: u64 = 42;
pub const TEST_SIZE: f64 = 0.2;

/// Результат этапа prepare: четыре согласованные части + необученный препроцессор.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedData {
    pub x_train: RecordTable,
    pub x_test: RecordTable,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
    pub preprocessor: Preprocessor,
}

impl PreparedData {
    pub fn validate(&self) -> Result<()> {
        self.x_train.validate()?;
        self.x_test.validate()?;
        if self.x_train.n_rows() != self.y_train.len() || self.x_test.n_rows() != self.y_test.len() {
            return Err(PipelineError::DataSource(format!(
                "partition sizes disagree: x_train={}, y_train={}, x_test={}, y_test={}",
                self.x_train.n_rows(),
                self.y_train.len(),
                self.x_test.n_rows(),
                self.y_test.len()
            )));
        }
        Ok(())
    }
}

/// Индексы (train, test) для детерминированного разбиения.
pub fn train_test_indices(n_rows: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let n_test = ((n_rows as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n_rows);

    let mut permutation: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    permutation.shuffle(&mut rng);

    let train = permutation[n_test..].to_vec();
    permutation.truncate(n_test);
    (train, permutation)
}

pub fn prepare_data(table: &RecordTable) -> Result<PreparedData> {
    let targets: Vec<f64> = table
        .numeric(TARGET)?
        .iter()
        .enumerate()
        .map(|(i, v)| match v {
            Some(y) if y.is_finite() => Ok(*y),
            Some(y) => Err(PipelineError::DataSource(format!("non-finite target {} at row {}", y, i))),
            None => Err(PipelineError::DataSource(format!("missing target at row {}", i))),
        })
        .collect::<Result<_>>()?;

    let features = table.without_columns(&[TARGET, DATE]);
    for name in CATEGORICAL_COLUMNS {
        features.require(name)?;
    }
    ensure_finite_features(&features)?;

    let categorical_columns: Vec<String> = CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
    let numeric_columns: Vec<String> = features
        .column_names()
        .into_iter()
        .filter(|name| !CATEGORICAL_COLUMNS.contains(name))
        .map(str::to_string)
        .collect();

    let preprocessor = Preprocessor::new(numeric_columns, categorical_columns);

    let (train_idx, test_idx) = train_test_indices(features.n_rows(), TEST_SIZE, SPLIT_SEED);
    let prepared = PreparedData {
        x_train: features.select_rows(&train_idx),
        x_test: features.select_rows(&test_idx),
        y_train: train_idx.iter().map(|&i| targets[i]).collect(),
        y_test: test_idx.iter().map(|&i| targets[i]).collect(),
        preprocessor,
    };

    tracing::info!(
        "Data preparation complete. Train: {}, test: {}",
        prepared.x_train.n_rows(),
        prepared.x_test.n_rows()
    );
    Ok(prepared)
}

/// JSON не хранит inf/NaN: такие значения отсекаются до записи артефакта.
fn ensure_finite_features(features: &RecordTable) -> Result<()> {
    for column in features.columns() {
        if let ColumnData::Numeric(values) = &column.data {
            let bad = values.iter().enumerate().find_map(|(i, v)| match v {
                Some(x) if !x.is_finite() => Some((i, *x)),
                _ => None,
            });
            if let Some((row, value)) = bad {
                return Err(PipelineError::DataSource(format!(
                    "non-finite value {} in '{}' at row {}",
                    value, column.name, row
                )));
            }
        }
    }
    Ok(())
}
