//! Загрузка набора данных из CSV

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::ReaderBuilder;

use crate::error::{PipelineError, Result};
use crate::types::{Column, ColumnData, DatasetSummary, NumericStats, RecordTable, CATEGORICAL_COLUMNS, DATE};

/// Значения, которые считаются пропусками.
const NULL_MARKERS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

fn is_null_marker(raw: &str) -> bool {
    NULL_MARKERS.contains(&raw.trim())
}

pub fn load_dataset(path: &Path) -> Result<RecordTable> {
    let file = File::open(path).map_err(|e| {
        PipelineError::DataSource(format!("cannot open {}: {}", path.display(), e))
    })?;
    let table = read_table(BufReader::new(file))?;
    tracing::info!(
        "Dataset loaded successfully. Shape: ({}, {})",
        table.n_rows(),
        table.n_cols()
    );
    Ok(table)
}

/// Чтение таблицы из любого источника с заголовком.
pub fn read_table<R: std::io::Read>(reader: R) -> Result<RecordTable> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(PipelineError::DataSource("missing header row".to_string()));
    }

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (i, field) in record.iter().enumerate() {
            raw[i].push(field.to_string());
        }
    }

    let columns = headers
        .iter()
        .zip(raw)
        .map(|(name, cells)| infer_column(name, cells))
        .collect();
    RecordTable::from_columns(columns)
}

fn infer_column(name: &str, cells: Vec<String>) -> Column {
    let forced_text = name == DATE || CATEGORICAL_COLUMNS.contains(&name);

    if !forced_text {
        let parsed: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|cell| {
                if is_null_marker(cell) {
                    Some(None)
                } else {
                    cell.trim().parse::<f64>().ok().map(Some)
                }
            })
            .collect();
        if let Some(values) = parsed {
            return Column::numeric(name, values);
        }
    }

    let values = cells
        .into_iter()
        .map(|cell| if is_null_marker(&cell) { None } else { Some(cell) })
        .collect();
    Column::categorical(name, values)
}

/// Обзор данных: размеры, пропуски, базовая статистика числовых колонок.
pub fn explore_dataset(table: &RecordTable) -> DatasetSummary {
    let missing = table
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.data.null_count()))
        .collect();

    let numeric_stats = table
        .columns()
        .iter()
        .filter_map(|c| match &c.data {
            ColumnData::Numeric(values) => {
                let present: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
                let count = present.len();
                let mean = if count > 0 {
                    present.iter().sum::<f64>() / count as f64
                } else {
                    f64::NAN
                };
                Some(NumericStats {
                    column: c.name.clone(),
                    count,
                    mean,
                    min: present.iter().copied().fold(f64::INFINITY, f64::min),
                    max: present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                })
            }
            _ => None,
        })
        .collect();

    let summary = DatasetSummary {
        n_rows: table.n_rows(),
        n_cols: table.n_cols(),
        missing,
        numeric_stats,
    };

    tracing::info!("Dataset shape: ({}, {})", summary.n_rows, summary.n_cols);
    for (column, count) in summary.missing.iter().filter(|(_, n)| *n > 0) {
        tracing::info!("  missing {}: {}", column, count);
    }
    for stats in &summary.numeric_stats {
        tracing::debug!(
            "  {}: count={} mean={:.4} min={} max={}",
            stats.column,
            stats.count,
            stats.mean,
            stats.min,
            stats.max
        );
    }

    summary
}

/// Копия исходного файла рядом с ним: `<stem>_backup_<timestamp>.<ext>`.
pub fn backup_dataset(path: &Path) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PipelineError::DataSource(format!("invalid dataset path {}", path.display())))?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S_%f");
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_backup_{}.{}", stem, stamp, ext),
        None => format!("{}_backup_{}", stem, stamp),
    };
    let backup = path.with_file_name(file_name);

    std::fs::copy(path, &backup).map_err(|e| {
        PipelineError::DataSource(format!("cannot back up {}: {}", path.display(), e))
    })?;
    tracing::info!("Dataset backed up to {}", backup.display());
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "department,quarter,day,date,wip,no_of_workers,idle_time,idle_men,over_time,actual_productivity\n\
A,Quarter1,Mon,2020-01-01,10,2,1,1,5,7.5\n\
B,Quarter1,Tue,2020-01-02,,3,0,1,6,8.0\n";

    #[test]
    fn infers_numeric_and_text_columns() {
        let table = read_table(SMALL.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 10);
        assert_eq!(table.numeric("wip").unwrap(), &[Some(10.0), None]);
        assert!(table.categorical("date").is_ok());
        assert!(table.categorical("quarter").is_ok());
        assert_eq!(table.numeric("actual_productivity").unwrap(), &[Some(7.5), Some(8.0)]);
    }

    #[test]
    fn mixed_column_falls_back_to_text() {
        let table = read_table("team,x\n1,a\n2,3\n".as_bytes()).unwrap();
        assert!(table.numeric("team").is_ok());
        assert!(table.categorical("x").is_ok());
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let result = read_table("a,b\n1,2\n3\n".as_bytes());
        assert!(matches!(result, Err(PipelineError::DataSource(_))));
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let result = load_dataset(Path::new("/nonexistent/garment.csv"));
        assert!(matches!(result, Err(PipelineError::DataSource(_))));
    }

    #[test]
    fn backup_creates_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("small.csv");
        std::fs::write(&source, SMALL).unwrap();

        let backup = backup_dataset(&source).unwrap();
        assert!(backup.exists());
        assert_ne!(backup, source);
        assert_eq!(std::fs::read_to_string(backup).unwrap(), SMALL);
    }

    #[test]
    fn summary_counts_missing() {
        let table = read_table(SMALL.as_bytes()).unwrap();
        let summary = explore_dataset(&table);
        let wip_missing = summary.missing.iter().find(|(c, _)| c == "wip").unwrap().1;
        assert_eq!(wip_missing, 1);
        assert!(summary.numeric_stats.iter().any(|s| s.column == "over_time"));
    }
}
