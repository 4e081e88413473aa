// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager configuration.

use std::time::Duration;

/// Retry schedule for transient refresh failures.
///
/// Attempt `n` (one-based) waits `step × n` before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    step: Duration,
}

impl RetryPolicy {
    /// Default number of retries after the first attempt.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default backoff step.
    pub const DEFAULT_STEP: Duration = Duration::from_secs(1);

    /// Creates a retry policy.
    #[must_use]
    pub fn new(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the number of retries after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the wait before the one-based `retry`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.step.saturating_mul(retry)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_STEP)
    }
}

/// Configuration for a [`SessionTokenManager`](super::SessionTokenManager).
///
/// # Examples
///
/// ```
/// use brewlink::auth::{AuthConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = AuthConfig::new("https://cloud.example.com/api")
///     .with_refresh_buffer(Duration::from_secs(120))
///     .with_retry(RetryPolicy::new(5, Duration::from_millis(500)));
///
/// assert_eq!(config.base_url(), "https://cloud.example.com/api");
/// assert_eq!(config.monitor_interval(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct AuthConfig {
    base_url: String,
    request_timeout: Duration,
    refresh_buffer: Duration,
    monitor_interval: Duration,
    retry: RetryPolicy,
}

impl AuthConfig {
    /// Default timeout for each auth request.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default window before expiry in which tokens are refreshed.
    pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);
    /// Default interval of the proactive expiry check.
    pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(60);

    /// Creates a configuration for the auth server at `base_url`.
    ///
    /// A trailing slash is removed.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            refresh_buffer: Self::DEFAULT_REFRESH_BUFFER,
            monitor_interval: Self::DEFAULT_MONITOR_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the refresh window before expiry.
    #[must_use]
    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Sets the proactive check interval.
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Sets the retry policy for transient refresh failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the auth server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the refresh window before expiry.
    #[must_use]
    pub fn refresh_buffer(&self) -> Duration {
        self.refresh_buffer
    }

    /// Returns the proactive check interval.
    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        self.monitor_interval
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}
