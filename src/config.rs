use std::env;

/// Runtime configuration, loaded once at startup and passed explicitly to the
/// clients that need it. Credentials are required; everything else falls back
/// to a sensible default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Shared credential callers must present in `x-api-key`.
    pub gateway_api_key: String,

    pub heygen_api_key: String,
    pub heygen_base_url: String,
    pub heygen_status_url: String,
    pub default_avatar_id: String,
    pub default_voice_id: String,

    pub assistant_api_key: String,
    pub assistant_base_url: String,
    pub assistant_model: String,

    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_region: String,
    pub s3_bucket_name: String,
    pub s3_endpoint: String,

    pub poll_interval_secs: u64,
    pub wait_deadline_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let gateway_api_key = env::var("GATEWAY_API_KEY").expect("GATEWAY_API_KEY must be set");
        let heygen_api_key = env::var("HEYGEN_API_KEY").expect("HEYGEN_API_KEY must be set");
        let assistant_api_key =
            env::var("ASSISTANT_API_KEY").expect("ASSISTANT_API_KEY must be set");
        let s3_access_key = env::var("S3_ACCESS_KEY").expect("S3_ACCESS_KEY must be set");
        let s3_secret_key = env::var("S3_SECRET_KEY").expect("S3_SECRET_KEY must be set");

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_or("PORT", "8090").parse().unwrap_or(8090),
            gateway_api_key,
            heygen_api_key,
            heygen_base_url: env_or("HEYGEN_BASE_URL", "https://api.heygen.com/v2"),
            heygen_status_url: env_or("HEYGEN_STATUS_URL", "https://api.heygen.com/v1"),
            default_avatar_id: env_or("DEFAULT_AVATAR_ID", "Daisy-inskirt-20220818"),
            default_voice_id: env_or("DEFAULT_VOICE_ID", "2d5b0e6cf36f460aa7fc47e3eee4ba54"),
            assistant_api_key,
            assistant_base_url: env_or(
                "ASSISTANT_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            assistant_model: env_or("ASSISTANT_MODEL", "gemma-3-27b-it"),
            s3_access_key,
            s3_secret_key,
            s3_region: env_or("S3_REGION", "nyc3"),
            s3_bucket_name: env_or("S3_BUCKET_NAME", "smtech-space"),
            s3_endpoint: env_or("S3_ENDPOINT", "https://nyc3.digitaloceanspaces.com"),
            poll_interval_secs: env_or("VIDEO_POLL_INTERVAL_SECS", "10").parse().unwrap_or(10),
            wait_deadline_secs: env_or("VIDEO_WAIT_DEADLINE_SECS", "300")
                .parse()
                .unwrap_or(300),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
