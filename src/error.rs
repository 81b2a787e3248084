//! Ошибки конвейера

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Этап конвейера, который должен быть выполнен раньше текущего.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Train,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Prepare => "prepare",
            Stage::Train => "train",
        };
        f.write_str(name)
    }
}

/// Почему не удалось принять состояние от предыдущего этапа.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffReason {
    Missing,
    Corrupt(String),
    SchemaMismatch { expected: String, found: String },
}

impl fmt::Display for HandoffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffReason::Missing => f.write_str("artifact not found"),
            HandoffReason::Corrupt(detail) => write!(f, "artifact unreadable: {}", detail),
            HandoffReason::SchemaMismatch { expected, found } => {
                write!(f, "schema mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data source error: {0}")]
    DataSource(String),

    #[error("state handoff error for {}: {} (run `{}` first)", .path.display(), .reason, .requires)]
    StateHandoff {
        path: PathBuf,
        reason: HandoffReason,
        requires: Stage,
    },

    #[error("training error: {0}")]
    Training(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl PipelineError {
    /// Короткая инструкция для пользователя, если не выполнен предыдущий этап.
    pub fn handoff_instruction(&self) -> Option<String> {
        match self {
            PipelineError::StateHandoff { requires, .. } => Some(match requires {
                Stage::Prepare => "No prepared data found. Please run `prepare` first.".to_string(),
                Stage::Train => "Model or data not found. Please run `train` first.".to_string(),
            }),
            _ => None,
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::DataSource(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_instruction_names_missing_stage() {
        let err = PipelineError::StateHandoff {
            path: PathBuf::from("prepared_data.json"),
            reason: HandoffReason::Missing,
            requires: Stage::Prepare,
        };
        let hint = err.handoff_instruction().unwrap();
        assert!(hint.contains("prepare"));

        let err = PipelineError::StateHandoff {
            path: PathBuf::from("productivity_model.json"),
            reason: HandoffReason::Corrupt("eof".into()),
            requires: Stage::Train,
        };
        assert!(err.handoff_instruction().unwrap().contains("`train`"));
    }

    #[test]
    fn other_errors_have_no_instruction() {
        assert!(PipelineError::Training("empty".into()).handoff_instruction().is_none());
    }
}
