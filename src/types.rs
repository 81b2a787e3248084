//! Типы данных: табличные записи производственных команд

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEPARTMENT: &str = "department";
pub const QUARTER: &str = "quarter";
pub const DAY: &str = "day";
pub const DATE: &str = "date";
pub const WIP: &str = "wip";
pub const NO_OF_WORKERS: &str = "no_of_workers";
pub const IDLE_TIME: &str = "idle_time";
pub const IDLE_MEN: &str = "idle_men";
pub const OVER_TIME: &str = "over_time";
pub const TARGET: &str = "actual_productivity";

pub const WIP_PER_WORKER: &str = "wip_per_worker";
pub const OVER_TIME_PER_WORKER: &str = "over_time_per_worker";
pub const IDLE_TIME_PER_WORKER: &str = "idle_time_per_worker";

/// Строковые категориальные колонки (порядок как у кодировщика).
pub const CATEGORICAL_COLUMNS: [&str; 3] = [DAY, DEPARTMENT, QUARTER];

/// Колонки, без которых конвейер не работает.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    DEPARTMENT,
    QUARTER,
    DAY,
    DATE,
    WIP,
    NO_OF_WORKERS,
    IDLE_TIME,
    IDLE_MEN,
    OVER_TIME,
    TARGET,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.map_or(true, f64::is_nan)).count(),
            ColumnData::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Date(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut flags = keep.iter();
            values.retain(|_| flags.next().copied().unwrap_or(false));
        }
        match self {
            ColumnData::Numeric(v) => filter(v, keep),
            ColumnData::Categorical(v) => filter(v, keep),
            ColumnData::Date(v) => filter(v, keep),
        }
    }

    fn select(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::Date(v) => ColumnData::Date(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: &str, values: Vec<Option<f64>>) -> Self {
        Self { name: name.to_string(), data: ColumnData::Numeric(values) }
    }

    pub fn categorical(name: &str, values: Vec<Option<String>>) -> Self {
        Self { name: name.to_string(), data: ColumnData::Categorical(values) }
    }

    pub fn date(name: &str, values: Vec<Option<NaiveDate>>) -> Self {
        Self { name: name.to_string(), data: ColumnData::Date(values) }
    }
}

/// Упорядоченная таблица записей, хранится по колонкам.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl RecordTable {
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.data.len());
        let table = Self { columns, n_rows };
        table.validate()?;
        Ok(table)
    }

    /// Проверка согласованности длин и уникальности имён (после десериализации тоже).
    pub fn validate(&self) -> Result<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if column.data.len() != self.n_rows {
                return Err(PipelineError::DataSource(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    self.n_rows
                )));
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(PipelineError::DataSource(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| PipelineError::DataSource(format!("missing required column '{}'", name)))
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match &self.require(name)?.data {
            ColumnData::Numeric(values) => Ok(values),
            _ => Err(PipelineError::DataSource(format!("column '{}' is not numeric", name))),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        match &self.require(name)?.data {
            ColumnData::Categorical(values) => Ok(values),
            _ => Err(PipelineError::DataSource(format!("column '{}' is not categorical", name))),
        }
    }

    pub fn null_count(&self, name: &str) -> Result<usize> {
        Ok(self.require(name)?.data.null_count())
    }

    /// Заменяет колонку с тем же именем или добавляет новую в конец.
    pub fn set_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.data.len() != self.n_rows {
            return Err(PipelineError::DataSource(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.data.len(),
                self.n_rows
            )));
        }
        if self.columns.is_empty() {
            self.n_rows = column.data.len();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn without_columns(&self, names: &[&str]) -> RecordTable {
        RecordTable {
            columns: self
                .columns
                .iter()
                .filter(|c| !names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
            n_rows: self.n_rows,
        }
    }

    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.data.retain(keep);
        }
        self.n_rows = keep.iter().take(self.n_rows).filter(|&&k| k).count();
    }

    pub fn select_rows(&self, indices: &[usize]) -> RecordTable {
        RecordTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column { name: c.name.clone(), data: c.data.select(indices) })
                .collect(),
            n_rows: indices.len(),
        }
    }
}

/// Сводка по набору данных для лога этапа prepare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub missing: Vec<(String, usize)>,
    pub numeric_stats: Vec<NumericStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericStats {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}
