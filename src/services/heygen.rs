use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{excerpt, ProviderError};
use crate::services::waiter::JobPoller;

/// Normalized video job status.
///
/// `Submitted` is what the client observes right after a successful submit;
/// the other three are derived from whatever status string the provider
/// reports. Transitions only move forward, and `Completed`/`Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    /// Maps a provider status string onto the normalized vocabulary.
    ///
    /// Only the exact strings "completed", "failed" and "error" terminate a
    /// job; anything else (including unrecognized values) counts as still
    /// processing, so a waiter keeps waiting instead of terminating on a
    /// status it does not understand.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "completed" => VideoStatus::Completed,
            "failed" | "error" => VideoStatus::Failed,
            _ => VideoStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Submitted => "submitted",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }
}

/// Result of a single status poll.
#[derive(Debug, Clone)]
pub struct JobPoll {
    pub status: VideoStatus,
    /// Provider-hosted, time-limited URL. Present only when completed.
    pub video_url: Option<String>,
}

/// Fully resolved generation parameters, defaults already applied.
#[derive(Debug, Clone)]
pub struct VideoSpec {
    pub text: String,
    pub avatar_id: String,
    pub voice_id: String,
    pub background_color: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct HeygenClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    status_url: String,
}

#[derive(Serialize)]
struct GeneratePayload<'a> {
    video_inputs: Vec<VideoInput<'a>>,
    dimension: Dimension,
}

#[derive(Serialize)]
struct VideoInput<'a> {
    character: Character<'a>,
    voice: Voice<'a>,
    background: Background<'a>,
}

#[derive(Serialize)]
struct Character<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    avatar_id: &'a str,
    avatar_style: &'a str,
}

#[derive(Serialize)]
struct Voice<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    input_text: &'a str,
    voice_id: &'a str,
}

#[derive(Serialize)]
struct Background<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct Dimension {
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    data: Option<GenerateData>,
}

#[derive(Deserialize)]
struct GenerateData {
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    data: Option<StatusData>,
}

#[derive(Deserialize)]
struct StatusData {
    status: Option<String>,
    video_url: Option<String>,
}

impl HeygenClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.heygen_api_key.clone(),
            base_url: config.heygen_base_url.trim_end_matches('/').to_string(),
            status_url: config.heygen_status_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submits a generation job and returns the provider-assigned job id,
    /// the sole correlation key for all subsequent polls.
    pub async fn submit(&self, spec: &VideoSpec) -> Result<String, ProviderError> {
        let payload = GeneratePayload {
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "avatar",
                    avatar_id: &spec.avatar_id,
                    avatar_style: "normal",
                },
                voice: Voice {
                    kind: "text",
                    input_text: &spec.text,
                    voice_id: &spec.voice_id,
                },
                background: Background {
                    kind: "color",
                    value: &spec.background_color,
                },
            }],
            dimension: Dimension {
                width: spec.width,
                height: spec.height,
            },
        };

        let response = self
            .http
            .post(format!("{}/video/generate", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Rejected(format!(
                "video generate returned {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::protocol(format!("malformed generate response: {e}"), &body))?;

        parsed
            .data
            .and_then(|d| d.video_id)
            .ok_or_else(|| {
                ProviderError::Rejected(format!(
                    "generate response missing video_id: {}",
                    excerpt(&body)
                ))
            })
    }

    /// Single non-blocking status check for a previously submitted job.
    pub async fn poll(&self, job_id: &str) -> Result<JobPoll, ProviderError> {
        let response = self
            .http
            .get(format!("{}/video_status.get", self.status_url))
            .query(&[("video_id", job_id)])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Rejected(format!(
                "video status returned {}: {}",
                status,
                excerpt(&body)
            )));
        }

        let parsed: StatusResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::protocol(format!("malformed status response: {e}"), &body))?;

        let data = parsed
            .data
            .ok_or_else(|| ProviderError::protocol("status response missing data", &body))?;
        let provider_status = data
            .status
            .ok_or_else(|| ProviderError::protocol("status response missing status", &body))?;

        let status = VideoStatus::from_provider(&provider_status);
        let video_url = if status == VideoStatus::Completed {
            data.video_url
        } else {
            None
        };

        Ok(JobPoll { status, video_url })
    }
}

#[async_trait]
impl JobPoller for HeygenClient {
    async fn poll(&self, job_id: &str) -> Result<JobPoll, ProviderError> {
        HeygenClient::poll(self, job_id).await
    }
}
