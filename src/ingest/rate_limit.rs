use std::time::Duration;

use reqwest::StatusCode;

pub const MAX_RETRIES: u32 = 3;
const BACKOFF_SECONDS: &[u64] = &[60, 120, 240];

pub fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

/// Wait before retry number `attempt` (0-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = BACKOFF_SECONDS
        .get(attempt as usize)
        .copied()
        .unwrap_or(240);
    Duration::from_secs(secs)
}

pub async fn backoff_sleep(attempt: u32) {
    let wait = backoff_delay(attempt);
    log::warn!(
        "Rate limited (429). Waiting {}s before retry {}/{}",
        wait.as_secs(),
        attempt + 1,
        MAX_RETRIES
    );
    tokio::time::sleep(wait).await;
}
