//! Webhook-слушатель: перезапуск конвейера по push-событию

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{PipelineConfig, WebhookConfig};
use crate::error::Result;
use crate::pipeline::{self, PipelineReport};

pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Шов между слушателем и конвейером.
pub trait PipelineRunner: Send + Sync + 'static {
    fn run(&self, config: &PipelineConfig) -> Result<PipelineReport>;
}

/// Запуск всех трёх этапов в текущем процессе.
pub struct InProcessRunner;

impl PipelineRunner for InProcessRunner {
    fn run(&self, config: &PipelineConfig) -> Result<PipelineReport> {
        pipeline::run_all(config)
    }
}

/// Блокировки запусков по каталогу артефактов: один конвейер на каталог одновременно.
#[derive(Default)]
pub struct RunLocks {
    locks: std::sync::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunLocks {
    pub fn lock_for(&self, artifact_dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(artifact_dir.to_path_buf()).or_default().clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<WebhookConfig>,
    runner: Arc<dyn PipelineRunner>,
    locks: Arc<RunLocks>,
}

impl AppState {
    pub fn new(config: WebhookConfig, runner: Arc<dyn PipelineRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            locks: Arc::new(RunLocks::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    repository: Repository,
    head_commit: Option<HeadCommit>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct HeadCommit {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn serve(config: WebhookConfig, runner: Arc<dyn PipelineRunner>) -> std::io::Result<()> {
    let addr = config.listen_addr;
    let app = router(AppState::new(config, runner));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting webhook listener on http://{}", addr);
    axum::serve(listener, app).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "ML Pipeline Webhook" }))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match event {
        "ping" => {
            tracing::info!("Received ping event from GitHub");
            (
                StatusCode::OK,
                Json(json!({ "status": "success", "message": "Webhook is working!" })),
            )
        }
        "push" => {
            tracing::info!("Received push event from GitHub");
            let push: PushEvent = match serde_json::from_slice(&body) {
                Ok(push) => push,
                Err(e) => {
                    tracing::error!("Webhook error: {}", e);
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "status": "error", "message": e.to_string() })),
                    );
                }
            };
            let commit = push
                .head_commit
                .map(|c| c.message)
                .unwrap_or_else(|| "No commit message".to_string());
            tracing::info!("Push to {}: {}", push.repository.full_name, commit);

            dispatch_run(&state);

            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "ML pipeline triggered successfully",
                    "repository": push.repository.full_name,
                    "commit": commit,
                })),
            )
        }
        other => {
            tracing::info!("Ignored event: {}", other);
            (
                StatusCode::OK,
                Json(json!({ "status": "ignored", "message": format!("Event {} not handled", other) })),
            )
        }
    }
}

/// Один запуск конвейера в фоне; запуски по одним артефактам идут строго по очереди.
pub fn dispatch_run(state: &AppState) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        let pipeline_config = state.config.pipeline_config();
        let lock = state.locks.lock_for(&pipeline_config.artifact_dir);
        let _guard = lock.lock_owned().await;

        tracing::info!("Starting ML pipeline execution...");
        if state.config.git_pull {
            git_pull(&state.config.project_dir).await;
        }

        let runner = state.runner.clone();
        match tokio::task::spawn_blocking(move || runner.run(&pipeline_config)).await {
            Ok(Ok(report)) => match report.halted {
                Some(instruction) => tracing::warn!("ML pipeline halted: {}", instruction),
                None => tracing::info!("ML pipeline completed successfully! {:?}", report.metrics),
            },
            Ok(Err(e)) => tracing::error!("ML pipeline failed: {}", e),
            Err(e) => tracing::error!("Pipeline execution error: {}", e),
        }
    })
}

async fn git_pull(project_dir: &Path) {
    tracing::info!("Pulling latest code...");
    let output = tokio::process::Command::new("git")
        .arg("pull")
        .current_dir(project_dir)
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => {}
        Ok(out) => tracing::error!("Git pull failed: {}", String::from_utf8_lossy(&out.stderr)),
        Err(e) => tracing::error!("Git pull failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct CountingRunner {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl PipelineRunner for CountingRunner {
        fn run(&self, _config: &PipelineConfig) -> Result<PipelineReport> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(PipelineReport::default())
        }
    }

    fn state(runner: Arc<CountingRunner>) -> AppState {
        AppState::new(WebhookConfig::default(), runner)
    }

    async fn send(app: Router, event: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(EVENT_HEADER, event)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn wait_for_runs(runner: &CountingRunner, expected: usize) {
        for _ in 0..200 {
            if runner.runs.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn ping_is_acknowledged_without_running() {
        let runner = Arc::new(CountingRunner::default());
        let (status, body) = send(router(state(runner.clone())), "ping", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Webhook is working!");
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn push_triggers_exactly_one_run() {
        let runner = Arc::new(CountingRunner::default());
        let payload = r#"{"repository":{"full_name":"acme/garments"},"head_commit":{"message":"retrain"}}"#;
        let (status, body) = send(router(state(runner.clone())), "push", payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["repository"], "acme/garments");
        assert_eq!(body["commit"], "retrain");
        wait_for_runs(&runner, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn push_without_head_commit_uses_placeholder() {
        let runner = Arc::new(CountingRunner::default());
        let payload = r#"{"repository":{"full_name":"acme/garments"}}"#;
        let (_, body) = send(router(state(runner.clone())), "push", payload).await;
        assert_eq!(body["commit"], "No commit message");
    }

    #[tokio::test]
    async fn malformed_push_is_rejected() {
        let runner = Arc::new(CountingRunner::default());
        let (status, body) = send(router(state(runner.clone())), "push", "{\"nope\":1}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let runner = Arc::new(CountingRunner::default());
        let (status, body) = send(router(state(runner.clone())), "issues", "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
    }

    #[tokio::test]
    async fn runs_on_same_artifacts_never_overlap() {
        let runner = Arc::new(CountingRunner::default());
        let app_state = state(runner.clone());
        let handles: Vec<_> = (0..3).map(|_| dispatch_run(&app_state)).collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
        assert_eq!(runner.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn health_reports_service() {
        let app = router(state(Arc::new(CountingRunner::default())));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
