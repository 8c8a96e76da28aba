use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Shared-credential check: every protected route requires the gateway API
/// key in `x-api-key`. Digests are compared rather than the raw strings.
pub async fn api_key_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = headers
        .get("x-api-key")
        .ok_or(AppError::Unauthorized("Missing API Key".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid API Key format".to_string()))?;

    if digest(presented) != digest(&state.config.gateway_api_key) {
        return Err(AppError::Unauthorized("Invalid API Key".to_string()));
    }

    Ok(next.run(request).await)
}

fn digest(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_distinguishes_keys() {
        assert_eq!(digest("secret"), digest("secret"));
        assert_ne!(digest("secret"), digest("Secret"));
    }
}
