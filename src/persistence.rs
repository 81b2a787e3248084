//! Артефакты этапов на диске: версионированные JSON-конверты

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{HandoffReason, PipelineError, Result, Stage};
use crate::models::ProductivityModel;
use crate::preprocessing::PreparedData;

pub const SCHEMA_VERSION: u32 = 1;
pub const PREPARED_DATA_FORMAT: &str = "garment-productivity/prepared-data";
pub const MODEL_FORMAT: &str = "garment-productivity/model";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    format: String,
    schema_version: u32,
    created_at: DateTime<Utc>,
    payload: T,
}

/// Заголовок читается отдельно, чтобы несовпадение схемы не маскировалось ошибкой разбора.
#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    format: String,
    schema_version: u32,
}

pub fn save_prepared_data(path: &Path, data: &PreparedData) -> Result<()> {
    write_atomic(path, PREPARED_DATA_FORMAT, data).map_err(PipelineError::DataSource)?;
    tracing::info!("Prepared data saved to {}", path.display());
    Ok(())
}

pub fn load_prepared_data(path: &Path) -> Result<PreparedData> {
    let data: PreparedData = read_envelope(path, PREPARED_DATA_FORMAT, Stage::Prepare)?;
    data.validate().map_err(|e| handoff(path, HandoffReason::Corrupt(e.to_string()), Stage::Prepare))?;
    Ok(data)
}

pub fn save_model(path: &Path, model: &ProductivityModel) -> Result<()> {
    write_atomic(path, MODEL_FORMAT, model).map_err(PipelineError::Training)?;
    tracing::info!("Model saved as '{}'", path.display());
    Ok(())
}

pub fn load_model(path: &Path) -> Result<ProductivityModel> {
    let model: ProductivityModel = read_envelope(path, MODEL_FORMAT, Stage::Train)?;
    model
        .validate()
        .map_err(|e| handoff(path, HandoffReason::Corrupt(e.to_string()), Stage::Train))?;
    tracing::info!("Model loaded from '{}'", path.display());
    Ok(model)
}

fn handoff(path: &Path, reason: HandoffReason, requires: Stage) -> PipelineError {
    PipelineError::StateHandoff {
        path: path.to_path_buf(),
        reason,
        requires,
    }
}

/// Запись во временный файл и переименование: артефакт либо целый, либо отсутствует.
fn write_atomic<T: Serialize>(path: &Path, format: &str, payload: &T) -> std::result::Result<(), String> {
    let envelope = Envelope {
        format: format.to_string(),
        schema_version: SCHEMA_VERSION,
        created_at: Utc::now(),
        payload,
    };
    let bytes = serde_json::to_vec(&envelope).map_err(|e| format!("cannot serialize {}: {}", format, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {}", parent.display(), e))?;
    }
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &bytes).map_err(|e| format!("cannot write {}: {}", temp_path.display(), e))?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        format!("cannot move artifact into {}: {}", path.display(), e)
    })
}

fn read_envelope<T: DeserializeOwned>(path: &Path, format: &str, requires: Stage) -> Result<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(handoff(path, HandoffReason::Missing, requires))
        }
        Err(e) => return Err(handoff(path, HandoffReason::Corrupt(e.to_string()), requires)),
    };

    let header: EnvelopeHeader = serde_json::from_slice(&bytes)
        .map_err(|e| handoff(path, HandoffReason::Corrupt(e.to_string()), requires))?;
    if header.format != format || header.schema_version != SCHEMA_VERSION {
        return Err(handoff(
            path,
            HandoffReason::SchemaMismatch {
                expected: format!("{} v{}", format, SCHEMA_VERSION),
                found: format!("{} v{}", header.format, header.schema_version),
            },
            requires,
        ));
    }

    let envelope: Envelope<T> = serde_json::from_slice(&bytes)
        .map_err(|e| handoff(path, HandoffReason::Corrupt(e.to_string()), requires))?;
    Ok(envelope.payload)
}
