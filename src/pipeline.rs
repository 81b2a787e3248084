//! Этапы конвейера: prepare → train → evaluate

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingestion::{explore_dataset, load_dataset};
use crate::models::{evaluate_model, train_model, ProductivityModel, RegressionMetrics};
use crate::persistence::{load_model, load_prepared_data, save_model, save_prepared_data};
use crate::preprocessing::{prepare_data, DataCleaner, FeatureEngineer, PreparedData};
use crate::types::RecordTable;

/// Какие этапы запускать.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stages {
    pub prepare: bool,
    pub train: bool,
    pub evaluate: bool,
}

impl Stages {
    pub const ALL: Stages = Stages { prepare: true, train: true, evaluate: true };
    pub const PREPARE: Stages = Stages { prepare: true, train: false, evaluate: false };
    pub const TRAIN: Stages = Stages { prepare: false, train: true, evaluate: false };
    pub const EVALUATE: Stages = Stages { prepare: false, train: false, evaluate: true };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub train_rows: Option<usize>,
    pub test_rows: Option<usize>,
    pub n_estimators: Option<usize>,
    pub metrics: Option<RegressionMetrics>,
    /// Инструкция пользователю, если этап остановлен из-за отсутствующего артефакта.
    pub halted: Option<String>,
}

/// Очистка, признаки и разбиение без ввода-вывода.
pub fn prepare_table(table: &RecordTable) -> Result<PreparedData> {
    let cleaned = DataCleaner::clean(table)?;
    let featured = FeatureEngineer::engineer_features(&cleaned)?;
    prepare_data(&featured)
}

/// Артефакт пишется только после успешной подготовки всех частей.
pub fn prepare(config: &PipelineConfig) -> Result<PreparedData> {
    tracing::info!("Using dataset from: {}", config.data_path.display());
    let table = load_dataset(&config.data_path)?;
    explore_dataset(&table);

    let prepared = prepare_table(&table)?;
    save_prepared_data(&config.prepared_data_path(), &prepared)?;
    Ok(prepared)
}

pub fn train(config: &PipelineConfig) -> Result<ProductivityModel> {
    let prepared = load_prepared_data(&config.prepared_data_path())?;
    let model = train_model(&prepared.x_train, &prepared.y_train, &prepared.preprocessor)?;
    save_model(&config.model_path(), &model)?;
    Ok(model)
}

pub fn evaluate(config: &PipelineConfig) -> Result<RegressionMetrics> {
    let model = load_model(&config.model_path())?;
    let prepared = load_prepared_data(&config.prepared_data_path())?;
    evaluate_model(&model, &prepared.x_test, &prepared.y_test)
}

pub fn run(config: &PipelineConfig, stages: Stages) -> Result<PipelineReport> {
    let mut report = PipelineReport::default();

    if stages.prepare {
        tracing::info!("STEP 1: Preparing Data...");
        let prepared = prepare(config)?;
        report.train_rows = Some(prepared.x_train.n_rows());
        report.test_rows = Some(prepared.x_test.n_rows());
    }

    if stages.train {
        tracing::info!("STEP 2: Training Model...");
        match halt_on_missing(train(config))? {
            Ok(model) => report.n_estimators = Some(model.regressor().n_estimators()),
            Err(instruction) => {
                report.halted = Some(instruction);
                return Ok(report);
            }
        }
    }

    if stages.evaluate {
        tracing::info!("STEP 3: Evaluating Model...");
        match halt_on_missing(evaluate(config))? {
            Ok(metrics) => report.metrics = Some(metrics),
            Err(instruction) => {
                report.halted = Some(instruction);
                return Ok(report);
            }
        }
    }

    tracing::info!("Pipeline completed successfully!");
    Ok(report)
}

pub fn run_all(config: &PipelineConfig) -> Result<PipelineReport> {
    run(config, Stages::ALL)
}

/// Отсутствие артефакта превращается в инструкцию, остальные ошибки пробрасываются.
fn halt_on_missing<T>(result: Result<T>) -> Result<std::result::Result<T, String>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err @ PipelineError::StateHandoff { .. }) => {
            tracing::warn!("{}", err);
            Ok(Err(err.handoff_instruction().unwrap_or_else(|| err.to_string())))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_without_prepare_halts_with_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path().join("data.csv"), dir.path());
        let report = run(&config, Stages::TRAIN).unwrap();
        assert_eq!(
            report.halted.as_deref(),
            Some("No prepared data found. Please run `prepare` first.")
        );
        assert!(!config.model_path().exists());
    }

    #[test]
    fn evaluate_without_model_halts_with_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path().join("data.csv"), dir.path());
        let report = run(&config, Stages::EVALUATE).unwrap();
        assert!(report.halted.unwrap().contains("`train`"));
        assert!(report.metrics.is_none());
    }

    #[test]
    fn prepare_with_missing_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path().join("absent.csv"), dir.path());
        assert!(matches!(run(&config, Stages::ALL), Err(PipelineError::DataSource(_))));
        assert!(!config.prepared_data_path().exists());
    }
}
