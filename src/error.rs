use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures talking to an upstream provider (HeyGen, the assistant model).
///
/// `Request` is a transport-level failure and is safe to retry inside a
/// polling loop. `Protocol` and `Rejected` mean the provider answered, so
/// retrying the identical request is pointless.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected provider response: {detail} ({excerpt})")]
    Protocol { detail: String, excerpt: String },
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl ProviderError {
    pub fn protocol(detail: impl Into<String>, body: &str) -> Self {
        ProviderError::Protocol {
            detail: detail.into(),
            excerpt: excerpt(body),
        }
    }
}

/// Trims a raw provider body down to a loggable excerpt.
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    let mut out: String = trimmed.chars().take(200).collect();
    if trimmed.chars().count() > 200 {
        out.push_str("...");
    }
    out
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    BadGateway(ProviderError),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(err) => {
                tracing::error!(error = %err, "upstream provider call failed");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("internal server error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        AppError::BadGateway(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_passes_short_bodies_through() {
        assert_eq!(excerpt("  {\"ok\":true}  "), "{\"ok\":true}");
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = excerpt(&body);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
    }
}
