//! # Error Classification
//!
//! Sorts stage-execution failures into a small taxonomy that drives retry
//! and cascade decisions:
//!
//! - `network`: transient transport problems (timeouts, DNS, refused
//!   connections, 5xx-style upstream trouble). Retryable with exponential
//!   backoff.
//! - `http_client`: definitive 4xx-style rejections. Not retryable, but the
//!   failure says nothing about other stages, so cascading stays open.
//! - `permanent`: the item itself cannot be processed (unsupported scheme,
//!   malformed URL). Never retried and never cascaded past.
//! - `unknown`: nothing matched. Treated as retryable once, permanent after.
//!
//! Classification prefers a typed [`HttpStatusError`] found anywhere in the
//! error chain; message heuristics are the fallback for collaborators that
//! only surface strings.
//!
//! The backoff formula reports a delay for schedulers to honor. The core
//! never sleeps on it itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BackoffConfig;
use crate::constants::system::{BACKOFF_BASE_DELAY_MS, BACKOFF_MAX_DELAY_MS, BACKOFF_MULTIPLIER};

/// Broad category assigned to a stage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transient transport or upstream availability problem
    Network,
    /// Definitive rejection of the request (4xx-style)
    HttpClient,
    /// The item can never be processed by this stage
    Permanent,
    /// Unrecognized failure
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::HttpClient => "http_client",
            Self::Permanent => "permanent",
            Self::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Typed HTTP failure a stage executor can return for precise classification.
///
/// When present in an error chain it takes priority over message heuristics:
/// 408 and 429 are timeout/rate conditions and classify as `network`, other
/// 4xx as `http_client`, everything else (5xx and unusual codes) as
/// `network`.
#[derive(Debug, thiserror::Error)]
#[error("HTTP status {status}: {message}")]
pub struct HttpStatusError {
    pub status: u16,
    pub message: String,
}

impl HttpStatusError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self.status {
            408 | 429 => ErrorCategory::Network,
            400..=499 => ErrorCategory::HttpClient,
            _ => ErrorCategory::Network,
        }
    }
}

/// Outcome of classifying one failure
#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    /// Whether a future attempt at the same stage is worthwhile
    pub retryable: bool,
    /// Suggested wait before that future attempt; zero outside `network`
    pub retry_delay: Duration,
    /// Human-readable failure summary, including the error chain
    pub message: String,
}

impl ErrorClassification {
    /// Whether this failure rules out automatic continuation to a later stage.
    ///
    /// Permanent failures always block. Unknown failures block once their
    /// single retry allowance is spent. Network and client rejections leave
    /// the rest of the pipeline open.
    pub fn blocks_cascade(&self) -> bool {
        match self.category {
            ErrorCategory::Permanent => true,
            ErrorCategory::Unknown => !self.retryable,
            ErrorCategory::Network | ErrorCategory::HttpClient => false,
        }
    }
}

/// Exponential backoff parameters: `base * multiplier^(attempt - 1)`, capped
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: BACKOFF_BASE_DELAY_MS,
            max_delay_ms: BACKOFF_MAX_DELAY_MS,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            multiplier: config.multiplier,
        }
    }
}

impl BackoffPolicy {
    /// Delay before re-attempting after a failure of `category` on the
    /// 1-based `attempt`. Only network failures earn a delay; everything
    /// else either retries immediately (unknown, first attempt) or not at
    /// all.
    pub fn delay(&self, category: ErrorCategory, attempt: u32) -> Duration {
        if category != ErrorCategory::Network {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw = (self.base_delay_ms as f64) * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Delay under the default backoff policy (2s base, doubling, 60s cap)
pub fn retry_delay(category: ErrorCategory, attempt: u32) -> Duration {
    BackoffPolicy::default().delay(category, attempt)
}

/// Classifies stage failures into [`ErrorClassification`]s
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    backoff: BackoffPolicy,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }

    /// Classify `error` from the 1-based `attempt` at a stage.
    ///
    /// Downcasts to [`HttpStatusError`] first, then falls back to message
    /// heuristics over the lowercased error chain.
    pub fn classify(&self, error: &anyhow::Error, attempt: u32) -> ErrorClassification {
        let message = format!("{error:#}");
        let category = if let Some(http) = error.downcast_ref::<HttpStatusError>() {
            http.category()
        } else {
            categorize_message(&message.to_lowercase())
        };

        let retryable = match category {
            ErrorCategory::Network => true,
            ErrorCategory::HttpClient | ErrorCategory::Permanent => false,
            ErrorCategory::Unknown => attempt <= 1,
        };

        ErrorClassification {
            category,
            retryable,
            retry_delay: self.backoff.delay(category, attempt),
            message,
        }
    }
}

const NETWORK_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "dns",
    "unreachable",
    "refused",
    "reset by peer",
    "broken pipe",
    "temporarily unavailable",
    "service unavailable",
    "bad gateway",
    "rate limit",
    "too many requests",
];

const HTTP_CLIENT_MARKERS: &[&str] = &[
    "not found",
    "404",
    "unauthorized",
    "401",
    "forbidden",
    "403",
    "bad request",
    "400",
    "gone",
    "410",
];

const PERMANENT_MARKERS: &[&str] = &[
    "unsupported",
    "malformed",
    "invalid url",
    "cannot be processed",
    "permanently",
];

// Network markers go first: connectivity terms are specific, while words
// like "not found" also show up in DNS failures.
fn categorize_message(lowercased: &str) -> ErrorCategory {
    if NETWORK_MARKERS.iter().any(|m| lowercased.contains(m)) {
        ErrorCategory::Network
    } else if HTTP_CLIENT_MARKERS.iter().any(|m| lowercased.contains(m)) {
        ErrorCategory::HttpClient
    } else if PERMANENT_MARKERS.iter().any(|m| lowercased.contains(m)) {
        ErrorCategory::Permanent
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn classify(error: anyhow::Error, attempt: u32) -> ErrorClassification {
        ErrorClassifier::new().classify(&error, attempt)
    }

    #[test]
    fn test_network_errors_are_retryable_with_backoff() {
        let classification = classify(anyhow!("connection refused by host"), 1);
        assert_eq!(classification.category, ErrorCategory::Network);
        assert!(classification.retryable);
        assert_eq!(classification.retry_delay, Duration::from_millis(2_000));
    }

    #[test]
    fn test_backoff_doubles_per_attempt_and_caps() {
        let expected = [2_000_u64, 4_000, 8_000, 16_000];
        for (index, millis) in expected.into_iter().enumerate() {
            let attempt = (index + 1) as u32;
            assert_eq!(
                retry_delay(ErrorCategory::Network, attempt),
                Duration::from_millis(millis),
                "attempt {attempt}"
            );
        }
        assert_eq!(
            retry_delay(ErrorCategory::Network, 10),
            Duration::from_millis(60_000)
        );
        assert_eq!(
            retry_delay(ErrorCategory::Network, 63),
            Duration::from_millis(60_000)
        );
    }

    #[test]
    fn test_non_network_categories_never_delay() {
        for category in [
            ErrorCategory::HttpClient,
            ErrorCategory::Permanent,
            ErrorCategory::Unknown,
        ] {
            for attempt in 1..=5 {
                assert_eq!(retry_delay(category, attempt), Duration::ZERO);
            }
        }
    }

    #[test]
    fn test_http_status_downcast_beats_heuristics() {
        // The message alone would read as network; the typed status wins.
        let error = anyhow::Error::new(HttpStatusError::new(404, "connection closed"));
        let classification = classify(error, 1);
        assert_eq!(classification.category, ErrorCategory::HttpClient);
        assert!(!classification.retryable);
    }

    #[test]
    fn test_http_timeout_statuses_classify_as_network() {
        for status in [408_u16, 429, 500, 503] {
            let error = anyhow::Error::new(HttpStatusError::new(status, "upstream"));
            assert_eq!(
                classify(error, 1).category,
                ErrorCategory::Network,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_client_rejections_do_not_block_cascade() {
        let classification = classify(anyhow!("HTTP 404 not found"), 1);
        assert_eq!(classification.category, ErrorCategory::HttpClient);
        assert!(!classification.blocks_cascade());
    }

    #[test]
    fn test_permanent_errors_block_cascade() {
        let classification = classify(anyhow!("unsupported URL scheme 'ftp'"), 1);
        assert_eq!(classification.category, ErrorCategory::Permanent);
        assert!(classification.blocks_cascade());
        assert!(!classification.retryable);
    }

    #[test]
    fn test_unknown_errors_get_one_retry() {
        let first = classify(anyhow!("something odd happened"), 1);
        assert_eq!(first.category, ErrorCategory::Unknown);
        assert!(first.retryable);
        assert!(!first.blocks_cascade());

        let second = classify(anyhow!("something odd happened"), 2);
        assert!(!second.retryable);
        assert!(second.blocks_cascade());
    }

    #[test]
    fn test_dns_failures_read_as_network_despite_not_found_wording() {
        let classification = classify(anyhow!("dns error: host not found"), 1);
        assert_eq!(classification.category, ErrorCategory::Network);
    }

    #[test]
    fn test_message_includes_error_chain() {
        let inner = anyhow!("socket closed");
        let error = inner.context("identifier lookup failed");
        let classification = classify(error, 1);
        assert!(classification.message.contains("identifier lookup failed"));
        assert!(classification.message.contains("socket closed"));
    }

    #[test]
    fn test_policy_from_config_respects_overrides() {
        let config = BackoffConfig {
            base_delay_ms: 100,
            max_delay_ms: 350,
            multiplier: 3.0,
        };
        let policy = BackoffPolicy::from(&config);
        assert_eq!(
            policy.delay(ErrorCategory::Network, 1),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.delay(ErrorCategory::Network, 2),
            Duration::from_millis(300)
        );
        assert_eq!(
            policy.delay(ErrorCategory::Network, 3),
            Duration::from_millis(350)
        );
    }
}
