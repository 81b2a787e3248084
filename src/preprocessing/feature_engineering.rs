//! Feature engineering: нормированные на работника показатели

use crate::error::Result;
use crate::types::{
    Column, RecordTable, IDLE_MEN, IDLE_TIME, IDLE_TIME_PER_WORKER, NO_OF_WORKERS, OVER_TIME,
    OVER_TIME_PER_WORKER, WIP, WIP_PER_WORKER,
};

pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Добавляет (или пересчитывает) три производных признака.
    pub fn engineer_features(table: &RecordTable) -> Result<RecordTable> {
        let wip = table.numeric(WIP)?;
        let workers = table.numeric(NO_OF_WORKERS)?;
        let over_time = table.numeric(OVER_TIME)?;
        let idle_time = table.numeric(IDLE_TIME)?;
        let idle_men = table.numeric(IDLE_MEN)?;

        let wip_per_worker = ratio(wip, workers, |d| d);
        let over_time_per_worker = ratio(over_time, workers, |d| d);
        // Нулевой знаменатель заменяется на 1
        let idle_time_per_worker = ratio(idle_time, idle_men, |d| if d == 0.0 { 1.0 } else { d });

        let mut featured = table.clone();
        featured.set_column(Column::numeric(WIP_PER_WORKER, wip_per_worker))?;
        featured.set_column(Column::numeric(OVER_TIME_PER_WORKER, over_time_per_worker))?;
        featured.set_column(Column::numeric(IDLE_TIME_PER_WORKER, idle_time_per_worker))?;

        tracing::info!("Feature engineering complete.");
        Ok(featured)
    }
}

fn ratio(
    numerator: &[Option<f64>],
    denominator: &[Option<f64>],
    guard: impl Fn(f64) -> f64,
) -> Vec<Option<f64>> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(n, d)| Some((*n)? / guard((*d)?)))
        .collect()
}
