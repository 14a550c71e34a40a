//! Shared blocking HTTP plumbing: agents, failure classification and the
//! bounded retry loop every provider goes through.

use std::io::Read;
use std::time::Duration;

use log::info;

use crate::providers::ProviderError;
use crate::rate_limiter::Clock;

pub const USER_AGENT: &str = concat!(
    "anime-nfo-updater/",
    env!("CARGO_PKG_VERSION"),
    " (metadata enrichment)"
);

/// Why one HTTP attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpFailureKind {
    Timeout,
    Network,
    RateLimited,
    Hard,
}

impl HttpFailureKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Hard)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: HttpFailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: HttpFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn hard(message: impl Into<String>) -> Self {
        Self::new(HttpFailureKind::Hard, message)
    }
}

/// Attempt cap and backoff schedule for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub rate_limited_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            rate_limited_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, kind: HttpFailureKind, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        if kind == HttpFailureKind::RateLimited {
            delay.max(self.rate_limited_delay)
        } else {
            delay
        }
    }
}

pub fn build_agent(read_timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(read_timeout)
        .timeout_write(Duration::from_secs(10))
        .user_agent(USER_AGENT)
        .build()
}

pub fn classify_ureq_failure(error: &ureq::Error) -> HttpFailureKind {
    match error {
        ureq::Error::Status(code, _) => match code {
            429 => HttpFailureKind::RateLimited,
            408 | 500..=599 => HttpFailureKind::Timeout,
            _ => HttpFailureKind::Hard,
        },
        ureq::Error::Transport(transport) => {
            let lowered = transport.to_string().to_ascii_lowercase();
            if lowered.contains("timed out") || lowered.contains("timeout") {
                HttpFailureKind::Timeout
            } else {
                HttpFailureKind::Network
            }
        }
    }
}

fn classify_io_timeout(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    ) || error.to_string().to_ascii_lowercase().contains("timed out")
}

/// Turns a ureq call result into the response body or a classified failure.
pub fn read_body(result: Result<ureq::Response, ureq::Error>) -> Result<String, RequestFailure> {
    let response = result.map_err(|error| {
        RequestFailure::new(
            classify_ureq_failure(&error),
            format!("Request failed: {error}"),
        )
    })?;
    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(|error| {
            let kind = if classify_io_timeout(&error) {
                HttpFailureKind::Timeout
            } else {
                HttpFailureKind::Network
            };
            RequestFailure::new(kind, format!("Failed to read response: {error}"))
        })?;
    Ok(body)
}

pub fn query_string(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Runs `operation` until it succeeds, fails hard, or the attempt cap is hit.
pub fn execute_with_backoff<T, F>(
    provider: &'static str,
    label: &str,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, RequestFailure>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(failure) if !failure.kind.is_retryable() => {
                return Err(ProviderError::fatal(provider, failure.message));
            }
            Err(failure) if attempt < max_attempts => {
                let backoff = policy.backoff_delay(failure.kind, attempt);
                info!(
                    "{provider}: {label} attempt {attempt} failed ({}), retrying in {:?}",
                    failure.message, backoff
                );
                clock.sleep(backoff);
                attempt = attempt.saturating_add(1);
            }
            Err(failure) => {
                return Err(ProviderError::Transient {
                    provider,
                    attempts: attempt,
                    message: failure.message,
                });
            }
        }
    }
}
