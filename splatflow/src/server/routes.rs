//! HTTP routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::config::lesson_dir_name;
use crate::errors::Result;
use crate::storage::{object_key_from_url, splat_object_key};
use crate::utils::validate_path_segment;

/// File name of the source video inside a lesson's working directory.
pub const VIDEO_FILE_NAME: &str = "video.mp4";

/// Body of `POST /extract_ply`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractPlyRequest {
    /// Lesson identifier.
    pub lesson_id: Option<String>,
    /// Lesson name.
    pub lesson_name: Option<String>,
    /// Shared-download URL of the source video.
    pub video_url: Option<String>,
    /// Discard existing output and recompute every stage.
    #[serde(default)]
    pub start_over: bool,
    /// Run only data preparation, training and export.
    #[serde(default)]
    pub only_training: bool,
}

/// Response of `POST /extract_ply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractPlyResponse {
    /// Public URL of the uploaded point cloud.
    pub ply_url: String,
}

#[derive(Debug, Clone)]
struct Lesson {
    dir_name: String,
    video_url: String,
    start_over: bool,
    only_training: bool,
}

impl ExtractPlyRequest {
    fn into_lesson(self) -> Result<Lesson> {
        let lesson_id = self.lesson_id.unwrap_or_default();
        let lesson_name = self.lesson_name.unwrap_or_default();
        let video_url = self.video_url.unwrap_or_default();
        validate_path_segment("lesson_id", &lesson_id)?;
        validate_path_segment("lesson_name", &lesson_name)?;
        if video_url.trim().is_empty() {
            return Err(crate::errors::SplatflowError::invalid_job("video_url must not be empty"));
        }

        Ok(Lesson {
            dir_name: lesson_dir_name(&lesson_name, &lesson_id),
            video_url,
            start_over: self.start_over,
            only_training: self.only_training,
        })
    }
}

/// Mounts all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/extract_ply", post(extract_ply))
}

/// GET / -- liveness probe kept for existing clients.
async fn root() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

/// GET /health -- service status and the number of running jobs.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_jobs": state.workspaces.len(),
    }))
}

/// POST /extract_ply -- turns a lesson video into an uploaded splat.
///
/// The job runs on its own task so a disconnecting client does not abort a
/// half-finished stage; the working-directory claim travels with it.
async fn extract_ply(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ExtractPlyRequest>, JsonRejection>,
) -> ApiResult<Json<ExtractPlyResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let lesson = request.into_lesson()?;
    let root = state.config.lessons_root().join(&lesson.dir_name);
    let claim = state.workspaces.claim(&root, lesson.dir_name.clone())?;

    tracing::info!(
        lesson = %lesson.dir_name,
        start_over = lesson.start_over,
        only_training = lesson.only_training,
        "Accepted extraction request"
    );

    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let _claim = claim;
        process_lesson(&task_state, &lesson, &root).await
    });

    let ply_url = handle
        .await
        .map_err(|e| ApiError::Internal(format!("pipeline task failed: {e}")))??;
    Ok(Json(ExtractPlyResponse { ply_url }))
}

async fn process_lesson(state: &AppState, lesson: &Lesson, root: &Path) -> Result<String> {
    fs::create_dir_all(root).await?;
    let video = fetch_video(state, lesson, root).await?;

    let job = state
        .config
        .pipeline
        .job(&video, root)
        .with_start_over(lesson.start_over)
        .with_only_training(lesson.only_training);
    let outcome = state.supervisor.execute(&job).await?;

    let stored = state
        .store
        .put(&splat_object_key(&lesson.dir_name), outcome.artifact())
        .await?;
    tracing::info!(
        lesson = %lesson.dir_name,
        run_id = %outcome.run_id,
        attempts = outcome.attempts,
        url = %stored.url,
        size = stored.size,
        "Uploaded splat"
    );

    if state.config.cleanup_after_success {
        // The upload already succeeded; a leftover directory is not a failure.
        if let Err(e) = fs::remove_dir_all(root).await {
            tracing::warn!(root = %root.display(), error = %e, "Failed to remove working directory");
        }
    }
    Ok(stored.url)
}

/// Downloads the source video unless an earlier request already did.
async fn fetch_video(state: &AppState, lesson: &Lesson, root: &Path) -> Result<PathBuf> {
    let video = root.join(VIDEO_FILE_NAME);
    if video.is_file() {
        tracing::info!(video = %video.display(), "Reusing downloaded video");
        return Ok(video);
    }

    let key = object_key_from_url(&lesson.video_url)?;
    let partial = root.join(format!("{VIDEO_FILE_NAME}.part"));
    let bytes = state.store.fetch(&key, &partial).await?;
    fs::rename(&partial, &video).await?;
    tracing::info!(key = %key, bytes, "Downloaded video");
    Ok(video)
}
