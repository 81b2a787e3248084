//! Очистка данных: категории, пропуски, выбросы

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::types::{
    Column, ColumnData, RecordTable, CATEGORICAL_COLUMNS, DATE, OVER_TIME, QUARTER,
    REQUIRED_COLUMNS, TARGET, WIP,
};

/// Допустимые значения квартала.
pub const VALID_QUARTERS: [&str; 4] = ["Quarter1", "Quarter2", "Quarter3", "Quarter4"];

/// Фиксированная замена некорректных меток квартала.
pub const QUARTER_FOLDS: [(&str, &str); 1] = [("Quarter5", "Quarter4")];

/// Границы допустимых сверхурочных (включительно).
pub const OVER_TIME_BOUNDS: (f64, f64) = (-6840.0, 15240.0);

/// Колонка с тяжёлым хвостом, заполняется медианой.
pub const MEDIAN_COLUMN: &str = WIP;

const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

pub struct DataCleaner;

impl DataCleaner {
    pub fn clean(table: &RecordTable) -> Result<RecordTable> {
        for name in REQUIRED_COLUMNS {
            table.require(name)?;
        }

        let mut cleaned = table.clone();
        let before = cleaned.n_rows();

        Self::normalize_labels(&mut cleaned)?;
        Self::parse_dates(&mut cleaned)?;
        Self::impute_means(&mut cleaned)?;
        Self::impute_modes(&mut cleaned)?;
        Self::impute_median(&mut cleaned, MEDIAN_COLUMN)?;
        Self::drop_missing_target(&mut cleaned)?;
        Self::filter_outliers(&mut cleaned, OVER_TIME, OVER_TIME_BOUNDS)?;

        tracing::info!(
            "Data cleaning complete. Rows: {} -> {}",
            before,
            cleaned.n_rows()
        );
        Ok(cleaned)
    }

    /// Обрезка пробелов и исправление меток квартала.
    fn normalize_labels(table: &mut RecordTable) -> Result<()> {
        for name in CATEGORICAL_COLUMNS {
            let values: Vec<Option<String>> = text_values(table, name)?
                .into_iter()
                .map(|v| {
                    v.map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty() && s != "nan")
                })
                .map(|v| if name == QUARTER { v.map(fold_quarter) } else { v })
                .collect();
            table.set_column(Column::categorical(name, values))?;
        }
        Ok(())
    }

    /// Неразбираемая дата становится пустой, а не ошибкой.
    fn parse_dates(table: &mut RecordTable) -> Result<()> {
        let dates = match &table.require(DATE)?.data {
            ColumnData::Date(_) => return Ok(()),
            ColumnData::Categorical(values) => values
                .iter()
                .map(|v| v.as_deref().and_then(parse_date))
                .collect(),
            ColumnData::Numeric(values) => vec![None; values.len()],
        };
        table.set_column(Column::date(DATE, dates))
    }

    /// Средние считаются один раз по текущему состоянию, затем заполняются.
    fn impute_means(table: &mut RecordTable) -> Result<()> {
        let targets: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| matches!(c.data, ColumnData::Numeric(_)))
            .map(|c| c.name.clone())
            .filter(|name| name != MEDIAN_COLUMN && name != TARGET)
            .collect();

        let mut fills = Vec::with_capacity(targets.len());
        for name in &targets {
            let values = table.numeric(name)?;
            if values.iter().any(is_missing) {
                let mean = mean(values).ok_or_else(|| no_statistic(name))?;
                fills.push((name.clone(), mean));
            }
        }

        for (name, mean) in fills {
            let filled = fill_numeric(table.numeric(&name)?, mean);
            table.set_column(Column::numeric(&name, filled))?;
        }
        Ok(())
    }

    /// Мода; при равенстве частот побеждает первое встреченное значение.
    fn impute_modes(table: &mut RecordTable) -> Result<()> {
        for name in CATEGORICAL_COLUMNS {
            let values = table.categorical(name)?;
            if values.iter().all(Option::is_some) {
                continue;
            }
            let mode = mode(values).ok_or_else(|| no_statistic(name))?;
            let filled = values
                .iter()
                .map(|v| Some(v.clone().unwrap_or_else(|| mode.clone())))
                .collect();
            table.set_column(Column::categorical(name, filled))?;
        }
        Ok(())
    }

    fn impute_median(table: &mut RecordTable, name: &str) -> Result<()> {
        let values = table.numeric(name)?;
        if !values.iter().any(is_missing) {
            return Ok(());
        }
        let median = median(values).ok_or_else(|| no_statistic(name))?;
        let filled = fill_numeric(values, median);
        table.set_column(Column::numeric(name, filled))
    }

    /// Целевая переменная не заполняется: строки без неё удаляются.
    fn drop_missing_target(table: &mut RecordTable) -> Result<()> {
        let keep: Vec<bool> = table.numeric(TARGET)?.iter().map(|v| !is_missing(v)).collect();
        table.retain_rows(&keep);
        Ok(())
    }

    fn filter_outliers(table: &mut RecordTable, name: &str, (low, high): (f64, f64)) -> Result<()> {
        let keep: Vec<bool> = table
            .numeric(name)?
            .iter()
            .map(|v| v.map_or(false, |x| x >= low && x <= high))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            tracing::debug!("Dropped {} outlier rows on '{}'", dropped, name);
        }
        table.retain_rows(&keep);
        Ok(())
    }
}

fn text_values(table: &RecordTable, name: &str) -> Result<Vec<Option<String>>> {
    Ok(match &table.require(name)?.data {
        ColumnData::Categorical(values) => values.clone(),
        // Числовые метки (например, коды отделов) приводятся к строкам.
        ColumnData::Numeric(values) => values.iter().map(|v| v.map(|x| x.to_string())).collect(),
        ColumnData::Date(values) => values.iter().map(|v| v.map(|d| d.to_string())).collect(),
    })
}

pub fn fold_quarter(label: String) -> String {
    QUARTER_FOLDS
        .iter()
        .find(|(from, _)| *from == label)
        .map(|(_, to)| to.to_string())
        .unwrap_or(label)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn is_missing(value: &Option<f64>) -> bool {
    value.map_or(true, f64::is_nan)
}

fn no_statistic(name: &str) -> PipelineError {
    PipelineError::DataSource(format!("column '{}' has no observed values to impute from", name))
}

fn fill_numeric(values: &[Option<f64>], fill: f64) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| if is_missing(v) { Some(fill) } else { *v })
        .collect()
}

fn observed(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter(|v| !is_missing(v)).flatten().copied().collect()
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present = observed(values);
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present = observed(values);
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));
    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new(); // (частота, первая позиция)
    for (pos, value) in values.iter().enumerate() {
        if let Some(v) = value {
            counts.entry(v.as_str()).or_insert((0, pos)).0 += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn raw_table() -> RecordTable {
        RecordTable::from_columns(vec![
            Column::categorical("quarter", vec![s(" Quarter1"), s("Quarter5"), None, s("Quarter2 "), s("Quarter1")]),
            Column::categorical("department", vec![s("sweing"), s("finishing "), s("sweing"), None, s("finishing")]),
            Column::categorical("day", vec![s("Monday"), s("Tuesday"), s("  "), s("Monday"), s("Sunday")]),
            Column::categorical("date", vec![s("1/1/2015"), s("2015-01-02"), s("garbage"), None, s("1/5/2015")]),
            Column::numeric("team", vec![Some(1.0), None, Some(3.0), Some(2.0), Some(4.0)]),
            Column::numeric("wip", vec![Some(100.0), None, Some(1000.0), Some(10.0), Some(200.0)]),
            Column::numeric("no_of_workers", vec![Some(10.0), Some(20.0), None, Some(30.0), Some(40.0)]),
            Column::numeric("idle_time", vec![Some(0.0); 5]),
            Column::numeric("idle_men", vec![Some(0.0); 5]),
            Column::numeric("over_time", vec![Some(0.0), Some(15240.0), Some(-6840.0), Some(15241.0), Some(100.0)]),
            Column::numeric("actual_productivity", vec![Some(0.8), Some(0.7), Some(0.9), Some(0.6), None]),
        ])
        .unwrap()
    }

    #[test]
    fn cleaned_table_has_no_missing_features_or_target() {
        let cleaned = DataCleaner::clean(&raw_table()).unwrap();
        for column in cleaned.columns() {
            if column.name == DATE {
                continue;
            }
            assert_eq!(column.data.null_count(), 0, "column {}", column.name);
        }
    }

    #[test]
    fn quarter_labels_are_trimmed_and_folded() {
        let cleaned = DataCleaner::clean(&raw_table()).unwrap();
        let quarters = cleaned.categorical(QUARTER).unwrap();
        // строки 3 (выброс) и 4 (нет целевой) удалены
        assert_eq!(quarters, &[s("Quarter1"), s("Quarter4"), s("Quarter1")]);
        for q in quarters.iter().flatten() {
            assert!(VALID_QUARTERS.contains(&q.as_str()));
        }
        assert_eq!(fold_quarter("Quarter3".into()), "Quarter3");
    }

    #[test]
    fn outlier_bounds_are_inclusive() {
        let cleaned = DataCleaner::clean(&raw_table()).unwrap();
        let over_time = cleaned.numeric(OVER_TIME).unwrap();
        assert!(over_time.contains(&Some(15240.0)));
        assert!(over_time.contains(&Some(-6840.0)));
        assert!(!over_time.contains(&Some(15241.0)));
    }

    #[test]
    fn value_below_lower_bound_is_dropped() {
        let mut table = raw_table();
        let over_time = vec![Some(-6841.0), Some(15240.0), Some(-6840.0), Some(0.0), Some(100.0)];
        table.set_column(Column::numeric(OVER_TIME, over_time)).unwrap();

        let cleaned = DataCleaner::clean(&table).unwrap();
        // строка 0 за нижней границей, строка 4 без целевой
        assert_eq!(
            cleaned.numeric(OVER_TIME).unwrap(),
            &[Some(15240.0), Some(-6840.0), Some(0.0)]
        );
    }

    #[test]
    fn imputes_with_column_strategies() {
        let cleaned = DataCleaner::clean(&raw_table()).unwrap();
        // wip: медиана из {100, 1000, 10, 200} = 150
        assert_eq!(cleaned.numeric(WIP).unwrap()[1], Some(150.0));
        // team: среднее из {1, 3, 2, 4} = 2.5
        assert_eq!(cleaned.numeric("team").unwrap()[1], Some(2.5));
        // no_of_workers: среднее из {10, 20, 30, 40} = 25
        assert_eq!(cleaned.numeric("no_of_workers").unwrap()[2], Some(25.0));
        // day: мода с учётом всей таблицы: "Monday"
        assert_eq!(cleaned.categorical("day").unwrap()[2], s("Monday"));
    }

    #[test]
    fn unparseable_dates_become_null() {
        let cleaned = DataCleaner::clean(&raw_table()).unwrap();
        match &cleaned.require(DATE).unwrap().data {
            ColumnData::Date(dates) => {
                assert_eq!(dates[0], NaiveDate::from_ymd_opt(2015, 1, 1));
                assert_eq!(dates[1], NaiveDate::from_ymd_opt(2015, 1, 2));
                assert_eq!(dates[2], None);
            }
            other => panic!("date not parsed: {:?}", other),
        }
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = DataCleaner::clean(&raw_table()).unwrap();
        let twice = DataCleaner::clean(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let table = raw_table().without_columns(&["idle_men"]);
        assert!(matches!(DataCleaner::clean(&table), Err(PipelineError::DataSource(_))));
    }

    #[test]
    fn mode_ties_break_on_first_seen() {
        assert_eq!(mode(&[s("b"), s("a"), s("a"), s("b"), None]), s("b"));
        assert_eq!(mode(&[None, None]), None);
    }
}
