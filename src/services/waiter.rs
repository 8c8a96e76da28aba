use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::services::heygen::{JobPoll, VideoStatus};

/// Single non-blocking status check for a submitted job.
#[async_trait]
pub trait JobPoller: Send + Sync {
    async fn poll(&self, job_id: &str) -> Result<JobPoll, ProviderError>;
}

/// Transfers a finished remote asset into durable storage. `None` means
/// "archival unavailable"; the caller keeps the remote URL regardless.
#[async_trait]
pub trait AssetArchiver: Send + Sync {
    async fn archive(&self, remote_url: &str, job_id: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Provider-recommended polling cadence.
    pub poll_interval: Duration,
    /// Maximum wall-clock wait before the job is abandoned as timed out.
    pub deadline: Duration,
}

impl WaitConfig {
    pub fn new(poll_interval_secs: u64, deadline_secs: u64) -> Self {
        Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            deadline: Duration::from_secs(deadline_secs),
        }
    }
}

/// Terminal outcome of a wait. `Failed` is the provider declaring the job
/// unrecoverable; `TimedOut` means no terminal status arrived in time and
/// the job may still complete later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub job_id: String,
    pub status: WaitStatus,
    pub video_url: Option<String>,
    pub archived_url: Option<String>,
}

impl WaitOutcome {
    fn terminal(job_id: &str, status: WaitStatus) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            video_url: None,
            archived_url: None,
        }
    }
}

/// Polls a submitted job until it reaches a terminal state or the deadline
/// elapses, then archives the finished asset.
///
/// Transport and protocol errors during a poll are transient: the wait
/// suspends for one interval and retries, and only the deadline bounds how
/// many retries happen. A provider-reported failure terminates immediately.
/// A storage failure after completion downgrades the outcome to completed
/// without an archived URL; it never turns a completed job into a failure.
///
/// Suspension is cooperative; dropping the returned future (for example when
/// the client connection goes away) cancels the loop mid-wait.
pub async fn wait_for_completion<P, A>(
    poller: &P,
    archiver: &A,
    job_id: &str,
    config: WaitConfig,
) -> WaitOutcome
where
    P: JobPoller + ?Sized,
    A: AssetArchiver + ?Sized,
{
    let mut elapsed = Duration::ZERO;

    let video_url = loop {
        if elapsed >= config.deadline {
            info!(
                job_id,
                elapsed_secs = elapsed.as_secs(),
                "deadline reached before video job finished"
            );
            return WaitOutcome::terminal(job_id, WaitStatus::TimedOut);
        }

        match poller.poll(job_id).await {
            Ok(poll) => match poll.status {
                VideoStatus::Completed => break poll.video_url,
                VideoStatus::Failed => {
                    info!(job_id, "provider reported video job failure");
                    return WaitOutcome::terminal(job_id, WaitStatus::Failed);
                }
                _ => {}
            },
            Err(e) => {
                // Remote instability must not abort an otherwise-healthy
                // wait; the deadline is the only bound.
                warn!(job_id, error = %e, "status poll failed, retrying after interval");
            }
        }

        sleep(config.poll_interval).await;
        elapsed += config.poll_interval;
    };

    let archived_url = match video_url.as_deref() {
        Some(url) => archiver.archive(url, job_id).await,
        None => None,
    };

    WaitOutcome {
        job_id: job_id.to_string(),
        status: WaitStatus::Completed,
        video_url,
        archived_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct ScriptedPoller {
        responses: Mutex<VecDeque<Result<JobPoll, ProviderError>>>,
        polls: AtomicUsize,
    }

    impl ScriptedPoller {
        fn new(responses: Vec<Result<JobPoll, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                polls: AtomicUsize::new(0),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobPoller for ScriptedPoller {
        async fn poll(&self, _job_id: &str) -> Result<JobPoll, ProviderError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(processing()))
        }
    }

    struct StubArchiver {
        result: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubArchiver {
        fn returning(result: Option<String>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AssetArchiver for StubArchiver {
        async fn archive(&self, remote_url: &str, job_id: &str) -> Option<String> {
            self.calls
                .lock()
                .unwrap()
                .push((remote_url.to_string(), job_id.to_string()));
            self.result.clone()
        }
    }

    fn processing() -> JobPoll {
        JobPoll {
            status: VideoStatus::Processing,
            video_url: None,
        }
    }

    fn completed(url: &str) -> JobPoll {
        JobPoll {
            status: VideoStatus::Completed,
            video_url: Some(url.to_string()),
        }
    }

    fn failed() -> JobPoll {
        JobPoll {
            status: VideoStatus::Failed,
            video_url: None,
        }
    }

    fn poll_error() -> ProviderError {
        ProviderError::protocol("malformed status response", "<html>bad gateway</html>")
    }

    fn config(interval: u64, deadline: u64) -> WaitConfig {
        WaitConfig::new(interval, deadline)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_and_archives_after_processing_polls() {
        let poller = ScriptedPoller::new(vec![
            Ok(processing()),
            Ok(processing()),
            Ok(completed("https://provider/x.mp4")),
        ]);
        let archiver = StubArchiver::returning(Some(
            "https://bucket/heygen_videos/20250101_000000_abc123.mp4".to_string(),
        ));
        let start = Instant::now();

        let outcome = wait_for_completion(&poller, &archiver, "abc123", config(10, 300)).await;

        assert_eq!(outcome.status, WaitStatus::Completed);
        assert_eq!(outcome.video_url.as_deref(), Some("https://provider/x.mp4"));
        assert_eq!(
            outcome.archived_url.as_deref(),
            Some("https://bucket/heygen_videos/20250101_000000_abc123.mp4")
        );
        // Two processing polls then the terminal one, no poll after that.
        assert_eq!(poller.poll_count(), 3);
        // Two suspensions of one interval each.
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(
            archiver.calls(),
            vec![("https://provider/x.mp4".to_string(), "abc123".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_terminates_after_one_poll() {
        let poller = ScriptedPoller::new(vec![Ok(failed())]);
        let archiver = StubArchiver::returning(None);
        let start = Instant::now();

        let outcome = wait_for_completion(&poller, &archiver, "job-1", config(10, 300)).await;

        assert_eq!(outcome.status, WaitStatus::Failed);
        assert!(outcome.video_url.is_none());
        assert!(outcome.archived_url.is_none());
        assert_eq!(poller.poll_count(), 1);
        // No waiting out the remaining deadline.
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(archiver.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn endless_processing_times_out_after_exact_poll_count() {
        let poller = ScriptedPoller::new(Vec::new());
        let archiver = StubArchiver::returning(None);

        let outcome = wait_for_completion(&poller, &archiver, "job-2", config(10, 30)).await;

        assert_eq!(outcome.status, WaitStatus::TimedOut);
        assert_eq!(poller.poll_count(), 3);
        assert!(archiver.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_do_not_abort_the_wait() {
        let poller = ScriptedPoller::new(vec![
            Err(poll_error()),
            Err(poll_error()),
            Ok(completed("https://provider/y.mp4")),
        ]);
        let archiver = StubArchiver::returning(Some("https://bucket/k.mp4".to_string()));

        let outcome = wait_for_completion(&poller, &archiver, "job-3", config(10, 300)).await;

        assert_eq!(outcome.status, WaitStatus::Completed);
        assert_eq!(poller.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn storage_failure_downgrades_to_completed_without_archive() {
        let poller = ScriptedPoller::new(vec![Ok(completed("https://provider/z.mp4"))]);
        let archiver = StubArchiver::returning(None);

        let outcome = wait_for_completion(&poller, &archiver, "job-4", config(10, 300)).await;

        assert_eq!(outcome.status, WaitStatus::Completed);
        assert_eq!(outcome.video_url.as_deref(), Some("https://provider/z.mp4"));
        assert!(outcome.archived_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_statuses_keep_the_wait_alive() {
        let poller = ScriptedPoller::new(vec![
            Ok(JobPoll {
                status: VideoStatus::from_provider("pending"),
                video_url: None,
            }),
            Ok(JobPoll {
                status: VideoStatus::from_provider("Completed"),
                video_url: None,
            }),
            Ok(completed("https://provider/w.mp4")),
        ]);
        let archiver = StubArchiver::returning(None);

        let outcome = wait_for_completion(&poller, &archiver, "job-5", config(5, 300)).await;

        assert_eq!(outcome.status, WaitStatus::Completed);
        assert_eq!(poller.poll_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_times_out_without_polling() {
        let poller = ScriptedPoller::new(Vec::new());
        let archiver = StubArchiver::returning(None);

        let outcome = wait_for_completion(&poller, &archiver, "job-6", config(10, 0)).await;

        assert_eq!(outcome.status, WaitStatus::TimedOut);
        assert_eq!(poller.poll_count(), 0);
    }
}
