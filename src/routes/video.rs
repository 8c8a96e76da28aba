use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::AppError;
use crate::services::heygen::{VideoSpec, VideoStatus};
use crate::services::s3::{ArchivedVideo, VIDEO_PREFIX};
use crate::services::waiter::{wait_for_completion, WaitConfig, WaitStatus};
use crate::state::AppState;

const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFF";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

#[derive(Deserialize, ToSchema)]
pub struct GenerateVideoRequest {
    /// Narration text the avatar speaks. Required and non-empty.
    pub text: String,
    pub avatar_id: Option<String>,
    pub voice_id: Option<String>,
    pub background_color: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct VideoJobResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ArchiveListResponse {
    pub videos: Vec<ArchivedVideo>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage_reachable: bool,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ArchiveListQuery {
    /// Key prefix to filter by; defaults to the video archive prefix.
    pub prefix: Option<String>,
}

fn build_spec(config: &Config, request: GenerateVideoRequest) -> Result<VideoSpec, AppError> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest(
            "narration text must not be empty".to_string(),
        ));
    }

    Ok(VideoSpec {
        text,
        avatar_id: request
            .avatar_id
            .unwrap_or_else(|| config.default_avatar_id.clone()),
        voice_id: request
            .voice_id
            .unwrap_or_else(|| config.default_voice_id.clone()),
        background_color: request
            .background_color
            .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
        width: request.width.unwrap_or(DEFAULT_WIDTH),
        height: request.height.unwrap_or(DEFAULT_HEIGHT),
    })
}

// POST /video/generate
#[utoipa::path(
    post,
    path = "/video/generate",
    request_body = GenerateVideoRequest,
    responses(
        (status = 200, description = "Generation job submitted", body = VideoJobResponse),
        (status = 400, description = "Missing narration text"),
        (status = 502, description = "Provider rejected or unreachable")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Video"
)]
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<GenerateVideoRequest>,
) -> Result<Json<VideoJobResponse>, AppError> {
    let spec = build_spec(&state.config, request)?;
    let job_id = state.heygen.submit(&spec).await?;

    info!(%job_id, "video generation submitted");

    Ok(Json(VideoJobResponse {
        job_id,
        status: VideoStatus::Processing.as_str().to_string(),
        message: "Video generation started successfully".to_string(),
        video_url: None,
        archived_url: None,
    }))
}

// POST /video/generate-and-wait
#[utoipa::path(
    post,
    path = "/video/generate-and-wait",
    request_body = GenerateVideoRequest,
    responses(
        (status = 200, description = "Terminal wait outcome, including timeout", body = VideoJobResponse),
        (status = 400, description = "Missing narration text"),
        (status = 502, description = "Provider rejected or unreachable at submit time")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Video"
)]
pub async fn generate_and_wait(
    State(state): State<AppState>,
    Json(request): Json<GenerateVideoRequest>,
) -> Result<Json<VideoJobResponse>, AppError> {
    let spec = build_spec(&state.config, request)?;
    let job_id = state.heygen.submit(&spec).await?;

    let config = WaitConfig::new(
        state.config.poll_interval_secs,
        state.config.wait_deadline_secs,
    );
    info!(%job_id, deadline_secs = state.config.wait_deadline_secs, "waiting for video completion");

    let outcome = wait_for_completion(&state.heygen, &state.storage, &job_id, config).await;

    let response = match outcome.status {
        WaitStatus::Completed => {
            let message = if outcome.archived_url.is_some() {
                "Video generation completed and archived".to_string()
            } else {
                "Video generation completed; archival unavailable, remote URL may expire"
                    .to_string()
            };
            VideoJobResponse {
                job_id: outcome.job_id,
                status: "completed".to_string(),
                message,
                video_url: outcome.video_url,
                archived_url: outcome.archived_url,
            }
        }
        WaitStatus::Failed => VideoJobResponse {
            job_id: outcome.job_id,
            status: "failed".to_string(),
            message: "Video generation failed".to_string(),
            video_url: None,
            archived_url: None,
        },
        WaitStatus::TimedOut => VideoJobResponse {
            job_id: outcome.job_id,
            status: "timeout".to_string(),
            message: format!(
                "No terminal status within {}s; the job may still complete, check its status later",
                state.config.wait_deadline_secs
            ),
            video_url: None,
            archived_url: None,
        },
    };

    Ok(Json(response))
}

// GET /video/status/{job_id}
#[utoipa::path(
    get,
    path = "/video/status/{job_id}",
    params(
        ("job_id" = String, Path, description = "Provider-assigned job id")
    ),
    responses(
        (status = 200, description = "Current normalized status", body = VideoJobResponse),
        (status = 502, description = "Provider rejected or unreachable")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Video"
)]
pub async fn video_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<VideoJobResponse>, AppError> {
    let poll = state.heygen.poll(&job_id).await?;

    let response = match poll.status {
        VideoStatus::Completed => {
            // Opportunistically archive so repeated status checks populate
            // the durable copy. A failure here must not fail the request.
            let archived_url = match poll.video_url.as_deref() {
                Some(url) => state.storage.archive_from_url(url, &job_id).await,
                None => None,
            };
            let message = if archived_url.is_some() {
                "Video generation completed and archived".to_string()
            } else {
                "Video generation completed".to_string()
            };
            VideoJobResponse {
                job_id,
                status: "completed".to_string(),
                message,
                video_url: poll.video_url,
                archived_url,
            }
        }
        VideoStatus::Failed => VideoJobResponse {
            job_id,
            status: "failed".to_string(),
            message: "Video generation failed".to_string(),
            video_url: None,
            archived_url: None,
        },
        _ => VideoJobResponse {
            job_id,
            status: "processing".to_string(),
            message: "Video is still being generated".to_string(),
            video_url: None,
            archived_url: None,
        },
    };

    Ok(Json(response))
}

// GET /video/archive
#[utoipa::path(
    get,
    path = "/video/archive",
    params(
        ArchiveListQuery
    ),
    responses(
        (status = 200, description = "Archived videos", body = ArchiveListResponse)
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Video"
)]
pub async fn list_archive(
    State(state): State<AppState>,
    Query(query): Query<ArchiveListQuery>,
) -> Json<ArchiveListResponse> {
    let prefix = query.prefix.unwrap_or_else(|| VIDEO_PREFIX.to_string());
    let videos = state.storage.list_videos(&prefix).await;

    Json(ArchiveListResponse {
        count: videos.len(),
        videos,
    })
}

// DELETE /video/archive/{key}
#[utoipa::path(
    delete,
    path = "/video/archive/{key}",
    params(
        ("key" = String, Path, description = "Full storage key of the archived video")
    ),
    responses(
        (status = 200, description = "Archived video deleted"),
        (status = 404, description = "No such archived video")
    ),
    security(
        ("api_key" = [])
    ),
    tag = "Video"
)]
pub async fn delete_archive(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.storage.delete_video(&key).await {
        return Err(AppError::NotFound(format!(
            "Archived video not found: {key}"
        )));
    }

    Ok(Json(serde_json::json!({
        "message": "Archived video deleted",
        "key": key,
    })))
}

// GET /video/health
#[utoipa::path(
    get,
    path = "/video/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Video"
)]
pub async fn video_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        storage_reachable: state.storage.check_connection().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8090,
            gateway_api_key: "gw-key".to_string(),
            heygen_api_key: "hg-key".to_string(),
            heygen_base_url: "https://api.heygen.com/v2".to_string(),
            heygen_status_url: "https://api.heygen.com/v1".to_string(),
            default_avatar_id: "avatar-default".to_string(),
            default_voice_id: "voice-default".to_string(),
            assistant_api_key: "as-key".to_string(),
            assistant_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            assistant_model: "gemma-3-27b-it".to_string(),
            s3_access_key: "ak".to_string(),
            s3_secret_key: "sk".to_string(),
            s3_region: "nyc3".to_string(),
            s3_bucket_name: "bucket".to_string(),
            s3_endpoint: "https://nyc3.digitaloceanspaces.com".to_string(),
            poll_interval_secs: 10,
            wait_deadline_secs: 300,
        }
    }

    fn request(text: &str) -> GenerateVideoRequest {
        GenerateVideoRequest {
            text: text.to_string(),
            avatar_id: None,
            voice_id: None,
            background_color: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn deserializes_with_only_text() {
        let request: GenerateVideoRequest =
            serde_json::from_str(r#"{"text": "hello world"}"#).unwrap();
        assert_eq!(request.text, "hello world");
        assert!(request.avatar_id.is_none());
        assert!(request.width.is_none());
    }

    #[test]
    fn spec_defaults_fill_omitted_fields() {
        let spec = build_spec(&test_config(), request("hello world")).unwrap();
        assert_eq!(spec.text, "hello world");
        assert_eq!(spec.avatar_id, "avatar-default");
        assert_eq!(spec.voice_id, "voice-default");
        assert_eq!(spec.background_color, "#FFFFFF");
        assert_eq!(spec.width, 1280);
        assert_eq!(spec.height, 720);
    }

    #[test]
    fn spec_keeps_caller_overrides() {
        let mut req = request("  hi  ");
        req.avatar_id = Some("custom-avatar".to_string());
        req.width = Some(640);
        let spec = build_spec(&test_config(), req).unwrap();
        assert_eq!(spec.text, "hi");
        assert_eq!(spec.avatar_id, "custom-avatar");
        assert_eq!(spec.width, 640);
        assert_eq!(spec.height, 720);
    }

    #[test]
    fn blank_text_is_rejected_before_any_remote_call() {
        let result = build_spec(&test_config(), request("   "));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn response_omits_absent_urls() {
        let response = VideoJobResponse {
            job_id: "abc123".to_string(),
            status: "processing".to_string(),
            message: "Video generation started successfully".to_string(),
            video_url: None,
            archived_url: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("video_url").is_none());
        assert!(value.get("archived_url").is_none());
        assert_eq!(value["status"], "processing");
    }
}
