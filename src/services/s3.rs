use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::AppError;
use crate::services::waiter::AssetArchiver;

/// Prefix under which finished videos are archived in the bucket.
pub const VIDEO_PREFIX: &str = "heygen_videos/";

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// One archived object, as reported by a live bucket listing. Size and
/// modification time come from the provider; nothing is tracked locally.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArchivedVideo {
    pub key: String,
    pub url: String,
    pub size: i64,
    pub last_modified: Option<String>,
}

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    http: reqwest::Client,
    pub bucket_name: String,
    endpoint: String,
}

impl S3Service {
    pub async fn new(config: &Config) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.s3_access_key.clone(),
            config.s3_secret_key.clone(),
            None,
            None,
            "manual_config",
        );

        let region = aws_sdk_s3::config::Region::new(config.s3_region.clone());

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        Self {
            client,
            http: reqwest::Client::new(),
            bucket_name: config.s3_bucket_name.clone(),
            endpoint: config.s3_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Downloads a provider-hosted asset and writes it into the bucket under
    /// a timestamped key that embeds the job id, so archived objects can be
    /// correlated back to jobs without a local index.
    ///
    /// Returns `None` on any failure (download, upload, or otherwise): none
    /// of those is recoverable by retry within the same request, and callers
    /// treat all of them as "archival unavailable". The remote URL stays
    /// usable either way.
    pub async fn archive_from_url(&self, remote_url: &str, job_id: &str) -> Option<String> {
        if Url::parse(remote_url).is_err() {
            warn!(job_id, remote_url, "refusing to archive malformed asset URL");
            return None;
        }

        let key = archive_key(&Utc::now(), job_id);
        info!(job_id, key = %key, "downloading finished video for archival");

        let response = match self.http.get(remote_url).send().await {
            Ok(r) => match r.error_for_status() {
                Ok(r) => r,
                Err(e) => {
                    error!(job_id, error = %e, "asset download rejected");
                    return None;
                }
            },
            Err(e) => {
                error!(job_id, error = %e, "asset download failed");
                return None;
            }
        };

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                error!(job_id, error = %e, "asset download interrupted");
                return None;
            }
        };

        if let Err(e) = self.put_object(&key, bytes.to_vec(), VIDEO_CONTENT_TYPE).await {
            error!(job_id, key = %key, error = ?e, "failed to archive video");
            return None;
        }

        let url = self.public_url(&key);
        info!(job_id, url = %url, "video archived");
        Some(url)
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                AppError::InternalServerError(format!("Failed to upload file to S3: {e}"))
            })?;

        Ok(())
    }

    /// Live listing of archived objects. A provider failure yields an empty
    /// list rather than an error, so listing stays non-fatal for callers.
    pub async fn list_videos(&self, prefix: &str) -> Vec<ArchivedVideo> {
        let response = match self
            .client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(prefix)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(prefix, error = %e, "failed to list archived videos");
                return Vec::new();
            }
        };

        response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ArchivedVideo {
                    url: self.public_url(&key),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().map(|t| t.to_string()),
                    key,
                })
            })
            .collect()
    }

    /// Deletes one archived object. True only on confirmed deletion;
    /// a key that does not exist reports false so the handler can 404.
    pub async fn delete_video(&self, key: &str) -> bool {
        // DeleteObject succeeds even for keys that never existed.
        let exists = self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .is_ok();

        if !exists {
            info!(key, "archived video not found, nothing to delete");
            return false;
        }

        match self
            .client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {
                info!(key, "archived video deleted");
                true
            }
            Err(e) => {
                error!(key, error = %e, "failed to delete archived video");
                false
            }
        }
    }

    /// Lightweight bucket reachability probe, used for health reporting only.
    pub async fn check_connection(&self) -> bool {
        match self
            .client
            .head_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(bucket = %self.bucket_name, error = %e, "storage connection check failed");
                false
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket_name, key)
    }
}

#[async_trait]
impl AssetArchiver for S3Service {
    async fn archive(&self, remote_url: &str, job_id: &str) -> Option<String> {
        self.archive_from_url(remote_url, job_id).await
    }
}

/// Builds the storage key for an archive operation. Second-granularity
/// timestamp plus the job id keeps concurrent archives of the same job from
/// overwriting each other outside a one-second collision window.
fn archive_key(now: &DateTime<Utc>, job_id: &str) -> String {
    format!("{}{}_{}.mp4", VIDEO_PREFIX, now.format("%Y%m%d_%H%M%S"), job_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn archive_key_embeds_timestamp_and_job_id() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            archive_key(&ts, "abc123"),
            "heygen_videos/20250314_092653_abc123.mp4"
        );
    }

    #[test]
    fn archive_keys_for_distinct_seconds_never_collide() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        assert_ne!(archive_key(&a, "job"), archive_key(&b, "job"));
    }
}
