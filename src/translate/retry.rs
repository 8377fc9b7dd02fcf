use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Linear backoff: the wait after failed attempt `attempt` (1-based).
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    base.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
}

pub(crate) async fn wait_with_backoff(
    attempt: usize,
    max_attempts: usize,
    base: Duration,
    reason: &str,
) -> Duration {
    let wait = backoff_delay(base, attempt);
    warn!(
        "translation attempt {}/{} failed: {}; waiting {:.1}s",
        attempt,
        max_attempts,
        reason,
        wait.as_secs_f32()
    );
    sleep(wait).await;
    wait
}
