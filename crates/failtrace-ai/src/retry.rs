use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const BASE_BACKOFF_MS: u64 = 200;
const MAX_BACKOFF_SHIFT: usize = 6;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);
static JITTER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Retry limits applied to a single model completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRetryPolicy {
    pub max_retries: usize,
    pub jitter: bool,
}

impl Default for ProviderRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            jitter: true,
        }
    }
}

impl ProviderRetryPolicy {
    pub fn should_retry_status(status: u16) -> bool {
        matches!(status, 408 | 409 | 425 | 429) || status >= 500
    }

    pub fn should_retry_transport(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
    }

    /// Delay before the retry following `attempt` (zero-based), never below a
    /// server-provided `Retry-After`.
    pub fn delay_ms(&self, attempt: usize, retry_after_ms: Option<u64>) -> u64 {
        let backoff_ms = backoff_ms(attempt, self.jitter);
        retry_after_ms.map_or(backoff_ms, |floor| backoff_ms.max(floor))
    }
}

fn deterministic_backoff_ms(attempt: usize) -> u64 {
    BASE_BACKOFF_MS.saturating_mul(1_u64 << attempt.min(MAX_BACKOFF_SHIFT))
}

fn backoff_ms(attempt: usize, jitter: bool) -> u64 {
    let base = deterministic_backoff_ms(attempt);
    if !jitter {
        return base;
    }

    // Jitter stays within [50%, 100%] of the deterministic delay.
    let low = base / 2;
    let width = base - low;
    let seed = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17);
    low + mixed % (width + 1)
}

/// `Retry-After` as milliseconds, from either delta-seconds or an HTTP date.
pub fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1_000));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at
        .signed_duration_since(Utc::now())
        .num_milliseconds();
    Some(u64::try_from(delay_ms).unwrap_or(0))
}

pub(crate) fn new_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("failtrace-{millis}-{count}")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{
        backoff_ms, deterministic_backoff_ms, new_request_id, parse_retry_after_ms,
        ProviderRetryPolicy,
    };

    #[test]
    fn unit_retryable_statuses_cover_throttling_and_server_errors() {
        assert!(ProviderRetryPolicy::should_retry_status(429));
        assert!(ProviderRetryPolicy::should_retry_status(408));
        assert!(ProviderRetryPolicy::should_retry_status(503));
        assert!(!ProviderRetryPolicy::should_retry_status(400));
        assert!(!ProviderRetryPolicy::should_retry_status(404));
    }

    #[test]
    fn unit_deterministic_backoff_doubles_and_caps() {
        assert_eq!(deterministic_backoff_ms(0), 200);
        assert_eq!(deterministic_backoff_ms(1), 400);
        assert_eq!(deterministic_backoff_ms(2), 800);
        assert_eq!(deterministic_backoff_ms(50), deterministic_backoff_ms(6));
    }

    #[test]
    fn functional_jittered_backoff_stays_within_half_to_full_delay() {
        let base = deterministic_backoff_ms(3);
        for _ in 0..64 {
            let value = backoff_ms(3, true);
            assert!(value >= base / 2, "expected {value} >= {}", base / 2);
            assert!(value <= base, "expected {value} <= {base}");
        }
    }

    #[test]
    fn regression_delay_honors_retry_after_floor() {
        let policy = ProviderRetryPolicy {
            max_retries: 2,
            jitter: false,
        };
        assert_eq!(policy.delay_ms(0, None), 200);
        assert_eq!(policy.delay_ms(2, Some(100)), 800);
        assert_eq!(policy.delay_ms(0, Some(1_500)), 1_500);
    }


    #[test]
    fn unit_parse_retry_after_accepts_seconds_and_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after_ms(&headers), Some(3_000));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after_ms(&headers), None);

        let raw = (Utc::now() + Duration::seconds(2))
            .to_rfc2822()
            .replace("+0000", "GMT");
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&raw).expect("retry-after date"),
        );
        let delay = parse_retry_after_ms(&headers).expect("delay from date");
        assert!(delay <= 2_500, "delay should be close to 2s, got {delay}");
    }

    #[test]
    fn unit_request_ids_are_unique_and_prefixed() {
        let first = new_request_id();
        let second = new_request_id();
        assert_ne!(first, second);
        assert!(first.starts_with("failtrace-"));
    }
}
