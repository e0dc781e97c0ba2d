use std::time::{Duration, SystemTime, UNIX_EPOCH};

use failtrace_ai::parse_retry_after_ms;
use reqwest::header::HeaderMap;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 30_000;

/// When and how long to wait before repeating a GitHub read.
///
/// GitHub signals both primary and secondary rate limits with `403` or `429`,
/// so those are only retried when the response says how long to wait
/// (`Retry-After`, or an exhausted `x-ratelimit-remaining` with its reset time).
/// A plain `403` is a permission problem and fails at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GithubRetryPolicy {
    /// Total attempts, the first request included.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    /// No single wait exceeds this. A longer server hint means give up.
    pub max_delay_ms: u64,
}

impl Default for GithubRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl GithubRetryPolicy {
    /// Wait before the next attempt after a non-success `status`, or `None` to stop.
    /// `attempt` is one-based.
    pub fn status_delay(&self, attempt: usize, status: u16, headers: &HeaderMap) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        if status >= 500 {
            return Some(self.backoff(attempt));
        }
        if status != 403 && status != 429 {
            return None;
        }

        let hinted_ms = parse_retry_after_ms(headers).or_else(|| rate_limit_reset_ms(headers));
        match hinted_ms {
            Some(wait_ms) if wait_ms <= self.max_delay_ms => {
                Some(Duration::from_millis(wait_ms.max(self.base_delay_ms)))
            }
            Some(_) => None,
            None if status == 429 => Some(self.backoff(attempt)),
            None => None,
        }
    }

    /// Wait before the next attempt after a transport failure, or `None` to stop.
    pub fn transport_delay(&self, attempt: usize, error: &reqwest::Error) -> Option<Duration> {
        let transient = error.is_timeout() || error.is_connect() || error.is_request();
        (attempt < self.max_attempts && transient).then(|| self.backoff(attempt))
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let delay_ms = self.base_delay_ms.saturating_mul(1_u64 << exponent);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Milliseconds until the primary rate-limit window reopens, once it is used up.
fn rate_limit_reset_ms(headers: &HeaderMap) -> Option<u64> {
    let remaining = headers.get(RATE_LIMIT_REMAINING)?.to_str().ok()?;
    if remaining.trim() != "0" {
        return None;
    }
    let reset_secs = headers
        .get(RATE_LIMIT_RESET)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    Some(reset_secs.saturating_mul(1_000).saturating_sub(now_ms))
}
