//! One-hot кодирование категориальных признаков

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Словарь категорий одной колонки; первая (по сортировке) категория опорная и не кодируется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoryVocabulary {
    fn encoded(&self) -> &[String] {
        self.categories.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocabularies: Option<Vec<CategoryVocabulary>>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self { vocabularies: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.vocabularies.is_some()
    }

    /// `columns`: пары (имя колонки, значения).
    pub fn fit(&mut self, columns: &[(&str, &[Option<String>])]) -> Result<()> {
        let vocabularies = columns
            .iter()
            .map(|(name, values)| {
                let categories: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
                if categories.is_empty() {
                    return Err(PipelineError::Training(format!(
                        "no categories observed in '{}'",
                        name
                    )));
                }
                Ok(CategoryVocabulary {
                    column: name.to_string(),
                    categories: categories.into_iter().map(str::to_string).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.vocabularies = Some(vocabularies);
        Ok(())
    }

    pub fn n_outputs(&self) -> usize {
        self.vocabularies
            .as_ref()
            .map_or(0, |v| v.iter().map(|voc| voc.encoded().len()).sum())
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.vocabularies
            .iter()
            .flatten()
            .flat_map(|voc| voc.encoded().iter().map(move |c| format!("{}_{}", voc.column, c)))
            .collect()
    }

    /// Неизвестная (или опорная) категория кодируется нулями.
    pub fn transform(&self, columns: &[(&str, &[Option<String>])], n_rows: usize) -> Result<Array2<f64>> {
        let vocabularies = self
            .vocabularies
            .as_ref()
            .ok_or_else(|| PipelineError::Evaluation("Encoder not fitted".to_string()))?;
        if vocabularies.len() != columns.len() {
            return Err(PipelineError::Evaluation(format!(
                "expected {} categorical columns, got {}",
                vocabularies.len(),
                columns.len()
            )));
        }

        let mut encoded = Array2::zeros((n_rows, self.n_outputs()));
        let mut offset = 0;
        for (voc, (name, values)) in vocabularies.iter().zip(columns) {
            if voc.column != *name {
                return Err(PipelineError::Evaluation(format!(
                    "expected categorical column '{}', got '{}'",
                    voc.column, name
                )));
            }
            let slots = voc.encoded();
            for (row, value) in values.iter().enumerate().take(n_rows) {
                if let Some(pos) = value.as_ref().and_then(|v| slots.iter().position(|c| c == v)) {
                    encoded[[row, offset + pos]] = 1.0;
                }
            }
            offset += slots.len();
        }

        Ok(encoded)
    }
}
