// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session lifecycle with single-flight refresh.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{AuthBackend, AuthConfig, Session, SessionStore};
use crate::connection::TokenProvider;
use crate::error::AuthError;
use crate::subscription::{CallbackRegistry, Subscription};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user signed out.
    Logout,
    /// The server rejected the refresh token.
    Rejected,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session was established.
    SignedIn(Session),
    /// The session's tokens were rotated.
    Refreshed(Session),
    /// The session was cleared.
    SignedOut(SignOutReason),
}

/// Outcome slot shared by the callers of one refresh.
///
/// `None` while the refresh is running, then `Some(result)`.
type Outcome = Option<Option<Session>>;

struct Inner {
    config: AuthConfig,
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    session: Mutex<Option<Session>>,
    in_flight: Mutex<Option<watch::Receiver<Outcome>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    events: Arc<CallbackRegistry<SessionEvent>>,
}

/// Keeps a cloud session valid.
///
/// At most one refresh request is in flight at any time: concurrent callers
/// of [`get_valid_token`](Self::get_valid_token) or [`refresh`](Self::refresh)
/// share its result. While a session exists a monitor task refreshes it
/// before it enters the expiry buffer.
///
/// Refresh failures are classified:
///
/// - HTTP 401/403 is terminal: the session is cleared locally and in the
///   store, and a [`SessionEvent::SignedOut`] with
///   [`SignOutReason::Rejected`] is emitted.
/// - Anything else (timeouts, 5xx, unreachable server) is retried with
///   linear backoff and then reported as `None`, leaving the session in
///   place.
///
/// The manager must be created inside a Tokio runtime for the monitor to run.
///
/// # Examples
///
/// ```no_run
/// use brewlink::auth::{AuthConfig, FileSessionStore, SessionTokenManager};
///
/// # async fn example() -> brewlink::Result<()> {
/// let store = FileSessionStore::default_location()?;
/// let auth = SessionTokenManager::new(AuthConfig::new("https://cloud.example.com"), store)?;
///
/// if let Some(token) = auth.get_valid_token().await {
///     println!("bearer {token}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionTokenManager {
    inner: Arc<Inner>,
}

impl SessionTokenManager {
    /// Creates a manager talking to the auth server over HTTP.
    ///
    /// Any session found in `store` is restored.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    #[cfg(feature = "http")]
    pub fn new(
        config: AuthConfig,
        store: impl SessionStore + 'static,
    ) -> Result<Self, crate::error::ProtocolError> {
        let backend = super::AuthClient::new(&config)?;
        Ok(Self::with_backend(config, backend, store))
    }

    /// Creates a manager with a custom backend.
    ///
    /// Any session found in `store` is restored.
    pub fn with_backend(
        config: AuthConfig,
        backend: impl AuthBackend + 'static,
        store: impl SessionStore + 'static,
    ) -> Self {
        let restored = match store.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load stored session");
                None
            }
        };

        let inner = Arc::new(Inner {
            config,
            backend: Arc::new(backend),
            store: Arc::new(store),
            session: Mutex::new(None),
            in_flight: Mutex::new(None),
            monitor: Mutex::new(None),
            events: Arc::new(CallbackRegistry::new()),
        });

        if let Some(session) = restored {
            tracing::info!(expires_at = %session.expires_at, "Restored stored session");
            *inner.session.lock() = Some(session);
            inner.start_monitor();
        }

        Self { inner }
    }

    // ========== Session Access ==========

    /// Returns a copy of the current session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.session.lock().clone()
    }

    /// Returns `true` if a session exists.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// Returns `true` while the proactive refresh monitor is running.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Returns an access token that is outside the expiry buffer.
    ///
    /// Refreshes first if the current token is about to expire. Returns
    /// `None` if there is no session or the refresh failed.
    pub async fn get_valid_token(&self) -> Option<String> {
        let session = self.current_session()?;
        if !session.needs_refresh(self.inner.config.refresh_buffer()) {
            return Some(session.access_token);
        }
        self.refresh().await.map(|s| s.access_token)
    }

    /// Refreshes the session, joining any refresh already in flight.
    ///
    /// Returns the refreshed session, or `None` on failure or if there is
    /// no session.
    pub async fn refresh(&self) -> Option<Session> {
        self.inner.refresh().await
    }

    // ========== Sign In / Out ==========

    /// Exchanges a third-party credential and stores the resulting session.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the exchange fails.
    pub async fn sign_in(&self, provider: &str, credential: &str) -> Result<Session, AuthError> {
        let session = self.inner.backend.exchange(provider, credential).await?;
        self.set_session(session.clone());
        Ok(session)
    }

    /// Installs `session`, replacing any existing one.
    ///
    /// A refresh still in flight for the previous session will not
    /// overwrite it.
    pub fn set_session(&self, session: Session) {
        *self.inner.session.lock() = Some(session.clone());
        self.inner.persist(&session);
        self.inner.start_monitor();
        tracing::info!(expires_at = %session.expires_at, "Signed in");
        self.inner.events.dispatch(&SessionEvent::SignedIn(session));
    }

    /// Revokes the session on the server and clears it locally.
    ///
    /// Revocation is best-effort; the local session is cleared even if the
    /// server cannot be reached.
    pub async fn logout(&self) {
        self.sign_out(false).await;
    }

    /// Revokes every session of the user and clears the local one.
    pub async fn logout_all(&self) {
        self.sign_out(true).await;
    }

    async fn sign_out(&self, everywhere: bool) {
        let Some(session) = self.current_session() else {
            tracing::debug!("Logout without session");
            return;
        };

        let revoked = if everywhere {
            self.inner.backend.logout_all(&session.access_token).await
        } else {
            self.inner.backend.logout(&session.access_token).await
        };
        if let Err(e) = revoked {
            tracing::warn!(error = %e, "Server-side logout failed, clearing locally");
        }

        self.inner.clear(SignOutReason::Logout);
    }

    // ========== Events ==========

    /// Registers a callback for session lifecycle events.
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }
}

impl fmt::Debug for SessionTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokenManager")
            .field("base_url", &self.inner.config.base_url())
            .field("authenticated", &self.is_authenticated())
            .field("refreshing", &self.inner.in_flight.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenProvider for SessionTokenManager {
    async fn valid_token(&self) -> Option<String> {
        self.get_valid_token().await
    }
}

impl Inner {
    async fn refresh(self: &Arc<Self>) -> Option<Session> {
        let mut outcome = {
            let mut in_flight = self.in_flight.lock();
            if let Some(rx) = in_flight.as_ref() {
                tracing::trace!("Joining refresh in flight");
                rx.clone()
            } else {
                let session = self.session.lock().clone()?;
                let (tx, rx) = watch::channel(None);
                *in_flight = Some(rx.clone());

                // Spawned so that a cancelled caller does not cancel the
                // request for everyone else.
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    let result = inner.run_refresh(session).await;
                    *inner.in_flight.lock() = None;
                    let _ = tx.send(Some(result));
                });
                rx
            }
        };

        let settled = outcome.wait_for(Option::is_some).await.ok()?;
        let result: Outcome = (*settled).clone();
        result.flatten()
    }

    async fn run_refresh(&self, session: Session) -> Option<Session> {
        let retry = self.config.retry();
        let mut attempt = 0;

        loop {
            match self.backend.refresh(&session.refresh_token).await {
                Ok(pair) => return self.install_refreshed(&session, pair),
                Err(e) if e.is_terminal() => {
                    tracing::error!(error = %e, "Refresh token rejected");
                    if self.is_current(&session) {
                        self.clear(SignOutReason::Rejected);
                    }
                    return None;
                }
                Err(e) => {
                    if attempt >= retry.max_retries() {
                        tracing::warn!(error = %e, attempts = attempt + 1, "Refresh failed, keeping session");
                        return None;
                    }
                    attempt += 1;
                    let delay = retry.delay_for_retry(attempt);
                    tracing::debug!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Refresh failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn install_refreshed(&self, used: &Session, pair: super::TokenPair) -> Option<Session> {
        let refreshed = {
            let mut current = self.session.lock();
            match current.as_ref() {
                Some(s) if s.refresh_token == used.refresh_token => {}
                _ => {
                    tracing::debug!("Session changed during refresh, discarding result");
                    return current.clone();
                }
            }
            let refreshed = used.clone().rotated(pair);
            *current = Some(refreshed.clone());
            refreshed
        };

        self.persist(&refreshed);
        tracing::info!(expires_at = %refreshed.expires_at, "Session refreshed");
        self.events
            .dispatch(&SessionEvent::Refreshed(refreshed.clone()));
        Some(refreshed)
    }

    fn is_current(&self, session: &Session) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.refresh_token == session.refresh_token)
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(session) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
    }

    fn clear(&self, reason: SignOutReason) {
        if self.session.lock().take().is_none() {
            return;
        }
        self.stop_monitor();
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear stored session");
        }
        tracing::info!(reason = ?reason, "Signed out");
        self.events.dispatch(&SessionEvent::SignedOut(reason));
    }

    // ========== Monitor ==========

    fn start_monitor(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No Tokio runtime, proactive refresh disabled");
            return;
        };

        let task = runtime.spawn(monitor_loop(
            Arc::downgrade(self),
            self.config.monitor_interval(),
        ));
        if let Some(previous) = self.monitor.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_monitor(&self) {
        if let Some(task) = self.monitor.lock().take() {
            task.abort();
        }
    }

    async fn check_expiry(self: &Arc<Self>) {
        let due = self
            .session
            .lock()
            .as_ref()
            .map(|s| s.needs_refresh(self.config.refresh_buffer()));

        match due {
            None => {}
            Some(false) => tracing::trace!("Session fresh"),
            Some(true) => {
                tracing::debug!("Session near expiry, refreshing");
                self.refresh().await;
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.monitor.get_mut().take() {
            task.abort();
        }
    }
}

async fn monitor_loop(inner: Weak<Inner>, interval: std::time::Duration) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.check_expiry().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::auth::{MemorySessionStore, RetryPolicy, TokenPair};

    #[derive(Default)]
    struct Scripted {
        refreshes: AtomicUsize,
        status: Option<u16>,
    }

    #[async_trait]
    impl AuthBackend for Scripted {
        async fn exchange(&self, _: &str, credential: &str) -> Result<Session, AuthError> {
            Ok(session(credential, 3600))
        }

        async fn refresh(&self, _: &str) -> Result<TokenPair, AuthError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(status) => Err(AuthError::from_status(status)),
                None => Ok(TokenPair {
                    access_token: format!("access-{n}"),
                    refresh_token: format!("refresh-{n}"),
                    expires_at: Utc::now() + TimeDelta::hours(1),
                }),
            }
        }

        async fn logout(&self, _: &str) -> Result<(), AuthError> {
            Err(AuthError::Server { status: 500 })
        }

        async fn logout_all(&self, _: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn session(token: &str, ttl_secs: i64) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: format!("{token}-refresh"),
            expires_at: Utc::now() + TimeDelta::seconds(ttl_secs),
            user: None,
        }
    }

    fn config() -> AuthConfig {
        AuthConfig::new("http://localhost").with_retry(RetryPolicy::none())
    }

    #[test]
    fn starts_signed_out() {
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted::default(),
            MemorySessionStore::new(),
        );
        assert!(!auth.is_authenticated());
        assert!(auth.current_session().is_none());
    }

    #[tokio::test]
    async fn restores_from_store() {
        let stored = session("stored", 3600);
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted::default(),
            MemorySessionStore::with_session(stored.clone()),
        );
        assert_eq!(auth.current_session(), Some(stored));
        assert!(auth.is_monitoring());
    }

    #[tokio::test]
    async fn fresh_token_skips_refresh() {
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted::default(),
            MemorySessionStore::with_session(session("fresh", 3600)),
        );
        assert_eq!(auth.get_valid_token().await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn near_expiry_token_is_refreshed() {
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted::default(),
            MemorySessionStore::with_session(session("old", 10)),
        );
        assert_eq!(auth.get_valid_token().await.as_deref(), Some("access-0"));
        assert_eq!(
            auth.current_session().map(|s| s.refresh_token).as_deref(),
            Some("refresh-0")
        );
    }

    #[tokio::test]
    async fn rejection_signs_out() {
        let store = Arc::new(MemorySessionStore::with_session(session("old", 10)));
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted {
                status: Some(401),
                ..Scripted::default()
            },
            Arc::clone(&store),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = auth.on_event(move |e| sink.lock().push(e.clone()));

        assert!(auth.get_valid_token().await.is_none());
        assert!(!auth.is_authenticated());
        assert!(!auth.is_monitoring());
        assert!(store.load().unwrap().is_none());
        assert_eq!(
            *events.lock(),
            vec![SessionEvent::SignedOut(SignOutReason::Rejected)]
        );
    }

    #[tokio::test]
    async fn transient_failure_keeps_session() {
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted {
                status: Some(503),
                ..Scripted::default()
            },
            MemorySessionStore::with_session(session("old", 10)),
        );
        assert!(auth.refresh().await.is_none());
        assert_eq!(
            auth.current_session().map(|s| s.access_token).as_deref(),
            Some("old")
        );
    }

    #[tokio::test]
    async fn logout_clears_despite_server_error() {
        let auth = SessionTokenManager::with_backend(
            config(),
            Scripted::default(),
            MemorySessionStore::new(),
        );
        auth.sign_in("google", "cred").await.unwrap();
        assert!(auth.is_monitoring());

        auth.logout().await;
        assert!(!auth.is_authenticated());
        assert!(!auth.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_refreshes_before_expiry() {
        let config = config()
            .with_monitor_interval(Duration::from_secs(60))
            .with_refresh_buffer(Duration::from_secs(300));
        let auth = SessionTokenManager::with_backend(
            config,
            Scripted::default(),
            MemorySessionStore::with_session(session("old", 200)),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            auth.current_session().map(|s| s.access_token).as_deref(),
            Some("access-0")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_when_refresh_is_rejected() {
        let config = config()
            .with_monitor_interval(Duration::from_secs(60))
            .with_refresh_buffer(Duration::from_secs(300));
        let store = Arc::new(MemorySessionStore::with_session(session("old", 200)));
        let auth = SessionTokenManager::with_backend(
            config,
            Scripted {
                status: Some(401),
                ..Scripted::default()
            },
            Arc::clone(&store),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = auth.on_event(move |e| sink.lock().push(e.clone()));
        assert!(auth.is_monitoring());

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *events.lock(),
            vec![SessionEvent::SignedOut(SignOutReason::Rejected)]
        );
        assert!(!auth.is_monitoring());
        assert!(!auth.is_authenticated());
        assert!(store.load().unwrap().is_none());

        // No further ticks once stopped.
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(events.lock().len(), 1);
    }
}
