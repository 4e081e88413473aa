// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, ProtocolError};

// ============================================================================
// ConnectionMode
// ============================================================================

/// Where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Straight to the controller on the local network.
    Direct {
        /// Host and optional port, e.g. `192.168.1.40` or `brew.local:8080`.
        host: String,
        /// Use `wss` instead of `ws`.
        secure: bool,
        /// Path of the WebSocket endpoint.
        endpoint: String,
    },
    /// Through the cloud relay. Requires a bearer token.
    Cloud {
        /// Relay host.
        relay_host: String,
        /// Device to attach to.
        device_id: String,
        /// Allow plain `ws` for local development.
        allow_insecure: bool,
    },
}

impl ConnectionMode {
    /// Default WebSocket path on the controller.
    pub const DEFAULT_ENDPOINT: &'static str = "/ws";
    /// WebSocket path on the relay.
    pub const RELAY_PATH: &'static str = "/ws/client";

    /// Direct connection over plain `ws` to the default endpoint.
    #[must_use]
    pub fn direct(host: impl Into<String>) -> Self {
        Self::Direct {
            host: host.into(),
            secure: false,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Cloud relay connection over `wss`.
    #[must_use]
    pub fn cloud(relay_host: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self::Cloud {
            relay_host: relay_host.into(),
            device_id: device_id.into(),
            allow_insecure: false,
        }
    }

    /// Returns `true` if opening the link needs a bearer token.
    #[must_use]
    pub fn requires_token(&self) -> bool {
        matches!(self, Self::Cloud { .. })
    }

    /// Builds the connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] for cloud mode without a token and
    /// [`ProtocolError::InvalidAddress`] for an empty host.
    ///
    /// # Examples
    ///
    /// ```
    /// use brewlink::connection::ConnectionMode;
    ///
    /// let url = ConnectionMode::direct("192.168.1.40").url(None).unwrap();
    /// assert_eq!(url, "ws://192.168.1.40/ws");
    ///
    /// let url = ConnectionMode::cloud("relay.example.com", "BRW 1")
    ///     .url(Some("t0k"))
    ///     .unwrap();
    /// assert_eq!(url, "wss://relay.example.com/ws/client?token=t0k&device=BRW%201");
    /// ```
    pub fn url(&self, token: Option<&str>) -> Result<String, Error> {
        match self {
            Self::Direct {
                host,
                secure,
                endpoint,
            } => {
                if host.is_empty() {
                    return Err(ProtocolError::InvalidAddress("empty host".to_string()).into());
                }
                let scheme = if *secure { "wss" } else { "ws" };
                let path = if endpoint.starts_with('/') {
                    endpoint.clone()
                } else {
                    format!("/{endpoint}")
                };
                Ok(format!("{scheme}://{host}{path}"))
            }
            Self::Cloud {
                relay_host,
                device_id,
                allow_insecure,
            } => {
                if relay_host.is_empty() {
                    return Err(
                        ProtocolError::InvalidAddress("empty relay host".to_string()).into(),
                    );
                }
                let token = token.ok_or(Error::NotAuthenticated)?;
                let scheme = if *allow_insecure { "ws" } else { "wss" };
                Ok(format!(
                    "{scheme}://{relay_host}{}?token={}&device={}",
                    Self::RELAY_PATH,
                    urlencoding::encode(token),
                    urlencoding::encode(device_id)
                ))
            }
        }
    }
}

/// Displays the target without credentials, for logs.
impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { host, .. } => write!(f, "direct:{host}"),
            Self::Cloud {
                relay_host,
                device_id,
                ..
            } => write!(f, "cloud:{relay_host}/{device_id}"),
        }
    }
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Exponential reconnect backoff.
///
/// The delay starts at `base_delay`, doubles after each scheduled attempt
/// and is capped at `max_delay`. It returns to `base_delay` whenever a link
/// opens.
///
/// # Examples
///
/// ```
/// use brewlink::connection::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::default();
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectPolicy {
    /// Default first delay.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
    /// Default delay cap.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

    /// Creates a policy. `max_delay` is raised to `base_delay` if smaller.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Returns the first delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Returns the delay cap.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the delay after `current`.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }

    /// Returns the delay before the zero-based `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_DELAY, Self::DEFAULT_MAX_DELAY)
    }
}

// ============================================================================
// StalenessPolicy
// ============================================================================

/// Silent-link detection derived from the publisher's status cadence.
///
/// The link is declared dead when nothing arrives for
/// `cadence × multiplier`. The watchdog checks every `2 × cadence` unless
/// overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    cadence: Duration,
    multiplier: u32,
    check_interval: Option<Duration>,
}

impl StalenessPolicy {
    /// Default publisher cadence.
    pub const DEFAULT_CADENCE: Duration = Duration::from_millis(500);
    /// Default number of missed cadences tolerated.
    pub const DEFAULT_MULTIPLIER: u32 = 10;

    /// Creates a policy for a publisher emitting every `cadence`.
    #[must_use]
    pub fn from_cadence(cadence: Duration) -> Self {
        Self {
            cadence,
            multiplier: Self::DEFAULT_MULTIPLIER,
            check_interval: None,
        }
    }

    /// Sets how many cadences of silence are tolerated. Minimum 1.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Overrides the watchdog check interval.
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Returns the publisher cadence.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Returns the silence after which the link is considered dead.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.cadence.saturating_mul(self.multiplier)
    }

    /// Returns how often the watchdog checks.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        self.check_interval
            .unwrap_or_else(|| self.cadence.saturating_mul(2))
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::from_cadence(Self::DEFAULT_CADENCE)
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Configuration for a [`ConnectionManager`](super::ConnectionManager).
///
/// # Examples
///
/// ```
/// use brewlink::connection::{ConnectionConfig, ConnectionMode, ReconnectPolicy, StalenessPolicy};
/// use std::time::Duration;
///
/// let config = ConnectionConfig::new(ConnectionMode::direct("brew.local"))
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_reconnect(ReconnectPolicy::new(Duration::from_millis(500), Duration::from_secs(10)))
///     .with_staleness(StalenessPolicy::from_cadence(Duration::from_secs(1)));
///
/// assert_eq!(config.staleness().threshold(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    mode: ConnectionMode,
    connect_timeout: Duration,
    reconnect: ReconnectPolicy,
    staleness: StalenessPolicy,
    outbound_capacity: usize,
}

impl ConnectionConfig {
    /// Default time allowed for a link to open.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default outbound queue length.
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

    /// Creates a configuration with default policies.
    #[must_use]
    pub fn new(mode: ConnectionMode) -> Self {
        Self {
            mode,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            staleness: StalenessPolicy::default(),
            outbound_capacity: Self::DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    /// Sets the time allowed for a link to open.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect backoff.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the staleness policy.
    #[must_use]
    pub fn with_staleness(mut self, policy: StalenessPolicy) -> Self {
        self.staleness = policy;
        self
    }

    /// Sets the outbound queue length used by transports.
    #[must_use]
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Returns the connection mode.
    #[must_use]
    pub fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    /// Returns the open timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the reconnect policy.
    #[must_use]
    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }

    /// Returns the staleness policy.
    #[must_use]
    pub fn staleness(&self) -> StalenessPolicy {
        self.staleness
    }

    /// Returns the outbound queue length.
    #[must_use]
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }
}
