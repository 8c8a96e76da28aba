use std::sync::Arc;

use crate::config::Config;
use crate::services::assistant::AssistantClient;
use crate::services::heygen::HeygenClient;
use crate::services::s3::S3Service;

/// Shared handler state. Every client is constructed once from config and
/// cloned per request; all of them are cheap to clone and safe to use
/// concurrently.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub heygen: HeygenClient,
    pub storage: S3Service,
    pub assistant: AssistantClient,
}

impl AppState {
    pub async fn from_config(config: Config) -> Self {
        let heygen = HeygenClient::new(&config);
        let storage = S3Service::new(&config).await;
        let assistant = AssistantClient::new(&config);

        Self {
            config: Arc::new(config),
            heygen,
            storage,
            assistant,
        }
    }
}
