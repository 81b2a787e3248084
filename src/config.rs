//! Конфигурация конвейера и webhook-слушателя

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_PATH: &str = "dataProductivity-Prediction-of-Garment-Employeese.csv";
pub const PREPARED_DATA_FILE: &str = "prepared_data.json";
pub const MODEL_FILE: &str = "productivity_model.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub artifact_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            artifact_dir: PathBuf::from("."),
        }
    }
}

impl PipelineConfig {
    pub fn new(data_path: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn prepared_data_path(&self) -> PathBuf {
        self.artifact_dir.join(PREPARED_DATA_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(MODEL_FILE)
    }

    /// Относительные пути разрешаются от `base` (вместо смены рабочего каталога процесса).
    pub fn resolved_against(&self, base: &Path) -> Self {
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };
        Self {
            data_path: resolve(&self.data_path),
            artifact_dir: resolve(&self.artifact_dir),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub listen_addr: SocketAddr,
    pub project_dir: PathBuf,
    pub git_pull: bool,
    pub pipeline: PipelineConfig,
}

impl WebhookConfig {
    /// Конфигурация конвейера с путями относительно каталога проекта.
    pub fn pipeline_config(&self) -> PipelineConfig {
        self.pipeline.resolved_against(&self.project_dir)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            project_dir: PathBuf::from("."),
            git_pull: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_live_in_artifact_dir() {
        let config = PipelineConfig::new("data.csv", "/tmp/artifacts");
        assert_eq!(config.prepared_data_path(), PathBuf::from("/tmp/artifacts/prepared_data.json"));
        assert_eq!(config.model_path(), PathBuf::from("/tmp/artifacts/productivity_model.json"));
    }

    #[test]
    fn relative_paths_resolve_against_project_dir() {
        let webhook = WebhookConfig {
            project_dir: PathBuf::from("/srv/project"),
            pipeline: PipelineConfig::new("data.csv", "/var/artifacts"),
            ..Default::default()
        };
        let resolved = webhook.pipeline_config();
        assert_eq!(resolved.data_path, PathBuf::from("/srv/project/data.csv"));
        assert_eq!(resolved.artifact_dir, PathBuf::from("/var/artifacts"));
    }
}
