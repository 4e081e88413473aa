// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resilient client connection.
//!
//! ```text
//! disconnected --connect()--> connecting --open--> connected
//! connected --abnormal close | stale--> reconnecting --open--> connected
//! connecting | connected --transport error--> error
//! any --disconnect()--> disconnected
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::transport::{
    Connector, NORMAL_CLOSURE, Outbound, STALE_CLOSURE, TransportChannels, TransportEvent,
};
use super::{ConnectionConfig, ConnectionState};
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{WireMessage, encode};
use crate::subscription::{CallbackRegistry, Subscription};

/// Supplies bearer tokens for authenticated connections.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token that is valid now, or `None` if there is no session.
    async fn valid_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Explicit,
    Reconnect,
}

type StateCallback = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

/// A queued state notification.
enum Notice {
    /// Delivered to every state subscriber.
    Changed(ConnectionState),
    /// Delivered only to a new subscriber.
    Replay(StateCallback, ConnectionState),
}

struct ActiveLink {
    id: Uuid,
    generation: u64,
    outgoing: tokio::sync::mpsc::Sender<Outbound>,
    reader: JoinHandle<()>,
}

impl ActiveLink {
    fn close(self, code: u16, reason: &str) {
        let _ = self.outgoing.try_send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
        self.reader.abort();
    }
}

struct Shared {
    state: ConnectionState,
    link: Option<ActiveLink>,
    generation: u64,
    /// Bumped by `disconnect()`; in-flight opens from an older epoch are discarded.
    epoch: u64,
    /// Epoch of the open currently in flight.
    opening: Option<u64>,
    last_message_at: Instant,
    reconnect_delay: Duration,
    reconnect_task: Option<JoinHandle<()>>,
    watchdog_task: Option<JoinHandle<()>>,
    /// Notifications in the order their changes were made.
    notices: VecDeque<Notice>,
    /// Some thread is draining `notices`.
    delivering: bool,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
            self.notices.push_back(Notice::Changed(next));
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(task) = self.reconnect_task.take() {
            task.abort();
        }
        if let Some(task) = self.watchdog_task.take() {
            task.abort();
        }
    }
}

struct Inner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    tokens: Option<Arc<dyn TokenProvider>>,
    shared: Mutex<Shared>,
    messages: Arc<CallbackRegistry<WireMessage>>,
    states: Arc<CallbackRegistry<ConnectionState>>,
}

impl Inner {
    /// Drains queued state notifications outside the lock.
    ///
    /// Only one caller drains at a time, so subscribers see transitions in
    /// the order they were made. A caller that finds another thread (or an
    /// outer frame on its own stack) draining leaves its notices to it.
    fn deliver(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.delivering || shared.notices.is_empty() {
                return;
            }
            shared.delivering = true;
        }

        loop {
            let notice = {
                let mut shared = self.shared.lock();
                match shared.notices.pop_front() {
                    Some(notice) => notice,
                    None => {
                        shared.delivering = false;
                        return;
                    }
                }
            };
            match notice {
                Notice::Changed(state) => self.states.dispatch(&state),
                Notice::Replay(callback, state) => callback(&state),
            }
        }
    }

    async fn build_url(&self) -> Result<String> {
        let token = if self.config.mode().requires_token() {
            let provider = self.tokens.as_ref().ok_or(Error::NotAuthenticated)?;
            Some(
                provider
                    .valid_token()
                    .await
                    .ok_or(Error::NotAuthenticated)?,
            )
        } else {
            None
        };
        self.config.mode().url(token.as_deref())
    }

    // =========================================================================
    // Opening
    // =========================================================================

    async fn open(self: &Arc<Self>, epoch: u64, kind: OpenKind) -> Result<()> {
        let url = match self.build_url().await {
            Ok(url) => url,
            Err(e) => {
                self.open_failed(epoch, kind);
                return Err(e);
            }
        };

        let timeout = self.config.connect_timeout();
        let channels = match tokio::time::timeout(timeout, self.connector.open(&url)).await {
            Ok(Ok(channels)) => channels,
            Ok(Err(e)) => {
                self.open_failed(epoch, kind);
                return Err(e.into());
            }
            Err(_) => {
                self.open_failed(epoch, kind);
                let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(ProtocolError::Timeout(millis).into());
            }
        };

        self.install(epoch, channels)
    }

    fn install(self: &Arc<Self>, epoch: u64, channels: TransportChannels) -> Result<()> {
        let TransportChannels { outgoing, incoming } = channels;
        {
            let mut shared = self.shared.lock();
            if shared.opening == Some(epoch) {
                shared.opening = None;
            }
            if shared.epoch != epoch {
                drop(shared);
                tracing::debug!("Discarding link opened after disconnect");
                let _ = outgoing.try_send(Outbound::Close {
                    code: NORMAL_CLOSURE,
                    reason: "superseded".to_string(),
                });
                return Err(ProtocolError::Aborted.into());
            }

            shared.generation += 1;
            let generation = shared.generation;
            let id = Uuid::new_v4();
            let weak = Arc::downgrade(self);

            let reader = tokio::spawn(read_loop(weak.clone(), generation, incoming));
            if let Some(stale) = shared.link.replace(ActiveLink {
                id,
                generation,
                outgoing,
                reader,
            }) {
                stale.close(NORMAL_CLOSURE, "replaced");
            }

            shared.reconnect_delay = self.config.reconnect().base_delay();
            shared.last_message_at = Instant::now();
            if let Some(task) = shared.reconnect_task.take() {
                task.abort();
            }
            if let Some(task) = shared.watchdog_task.take() {
                task.abort();
            }
            shared.watchdog_task = Some(tokio::spawn(watchdog_loop(
                weak,
                generation,
                self.config.staleness().check_interval(),
            )));
            shared.set_state(ConnectionState::Connected);

            tracing::info!(link = %id, endpoint = %self.config.mode(), "Connected");
        }
        self.deliver();
        Ok(())
    }

    fn open_failed(self: &Arc<Self>, epoch: u64, kind: OpenKind) {
        {
            let mut shared = self.shared.lock();
            if shared.opening == Some(epoch) {
                shared.opening = None;
            }
            if shared.epoch != epoch {
                return;
            }
            shared.set_state(ConnectionState::Error);
            if kind == OpenKind::Reconnect {
                self.schedule_reconnect(&mut shared);
            }
        }
        self.deliver();
    }

    // =========================================================================
    // Reconnection
    // =========================================================================

    fn schedule_reconnect(self: &Arc<Self>, shared: &mut Shared) {
        if let Some(task) = shared.reconnect_task.take() {
            task.abort();
        }

        let delay = shared.reconnect_delay;
        shared.reconnect_delay = self.config.reconnect().next_delay(delay);
        let epoch = shared.epoch;
        let weak = Arc::downgrade(self);

        shared.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.reconnect(epoch).await;
            }
        }));
        shared.set_state(ConnectionState::Reconnecting);

        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnect scheduled"
        );
    }

    async fn reconnect(self: &Arc<Self>, epoch: u64) {
        {
            let mut shared = self.shared.lock();
            if shared.epoch != epoch || shared.opening.is_some() || shared.link.is_some() {
                return;
            }
            // The timer has fired; this task is no longer cancellable as a timer.
            shared.reconnect_task = None;
            shared.opening = Some(epoch);
        }

        tracing::debug!("Attempting reconnect");
        if let Err(e) = self.open(epoch, OpenKind::Reconnect).await {
            tracing::warn!(error = %e, "Reconnect attempt failed");
        }
    }

    // =========================================================================
    // Link events
    // =========================================================================

    fn handle_message(&self, generation: u64, text: &str) {
        {
            let mut shared = self.shared.lock();
            if !shared.is_current(generation) {
                return;
            }
            shared.last_message_at = Instant::now();
        }

        match WireMessage::from_json(text) {
            Ok(message) => {
                tracing::debug!(kind = %message.kind(), "Received message");
                self.messages.dispatch(&message);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed message");
            }
        }
    }

    fn handle_error(&self, generation: u64, reason: &str) {
        {
            let mut shared = self.shared.lock();
            if !shared.is_current(generation) {
                return;
            }
            tracing::warn!(reason = %reason, "Transport error");
            shared.set_state(ConnectionState::Error);
        }
        self.deliver();
    }

    fn handle_close(self: &Arc<Self>, generation: u64, code: Option<u16>, reason: &str) {
        {
            let mut shared = self.shared.lock();
            if !shared.is_current(generation) {
                return;
            }
            // Called from the link's own reader task, so the handle is detached, not aborted.
            shared.link = None;
            if let Some(task) = shared.watchdog_task.take() {
                task.abort();
            }

            if code == Some(NORMAL_CLOSURE) {
                tracing::info!(reason = %reason, "Connection closed by peer");
                shared.set_state(ConnectionState::Disconnected);
            } else {
                tracing::warn!(code = ?code, reason = %reason, "Connection lost");
                self.schedule_reconnect(&mut shared);
            }
        }
        self.deliver();
    }

    /// Returns `true` when the watchdog for `generation` should stop.
    fn check_staleness(self: &Arc<Self>, generation: u64) -> bool {
        let threshold = self.config.staleness().threshold();
        {
            let mut shared = self.shared.lock();
            if !shared.is_current(generation) {
                return true;
            }
            let silence = shared.last_message_at.elapsed();
            if silence <= threshold {
                return false;
            }

            tracing::warn!(
                silence_ms = u64::try_from(silence.as_millis()).unwrap_or(u64::MAX),
                threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX),
                "Link silent past threshold, forcing close"
            );
            if let Some(link) = shared.link.take() {
                link.close(STALE_CLOSURE, "stale connection");
            }
            // This task is the watchdog; it exits once we return.
            shared.watchdog_task = None;
            self.schedule_reconnect(&mut shared);
        }
        self.deliver();
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        shared.cancel_timers();
        if let Some(link) = shared.link.take() {
            link.close(NORMAL_CLOSURE, "client dropped");
        }
    }
}

async fn read_loop(
    weak: Weak<Inner>,
    generation: u64,
    mut incoming: tokio::sync::mpsc::Receiver<TransportEvent>,
) {
    while let Some(event) = incoming.recv().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Message(text) => inner.handle_message(generation, &text),
            TransportEvent::Error(reason) => inner.handle_error(generation, &reason),
            TransportEvent::Closed { code, reason } => {
                inner.handle_close(generation, code, &reason);
                return;
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.handle_close(generation, None, "transport dropped");
    }
}

async fn watchdog_loop(weak: Weak<Inner>, generation: u64, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if inner.check_staleness(generation) {
            return;
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Keeps one logical link to the publisher alive.
///
/// The manager owns at most one transport link, a staleness watchdog and a
/// reconnect timer. Inbound messages are decoded and dispatched to
/// [`on_message`](Self::on_message) subscribers in delivery order.
///
/// Cloning is cheap and every clone drives the same link. Dropping the last
/// clone cancels all timers and closes the link.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager that opens links with `connector`.
    pub fn new(config: ConnectionConfig, connector: impl Connector + 'static) -> Self {
        Self::build(config, Arc::new(connector), None)
    }

    /// Creates a manager whose cloud connections authenticate with `tokens`.
    pub fn with_token_provider(
        config: ConnectionConfig,
        connector: impl Connector + 'static,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self::build(config, Arc::new(connector), Some(tokens))
    }

    /// Creates a manager over a WebSocket connector.
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn websocket(config: ConnectionConfig) -> Self {
        let connector = super::WebSocketConnector::with_capacity(config.outbound_capacity());
        Self::new(config, connector)
    }

    fn build(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Self {
        let shared = Shared {
            state: ConnectionState::Disconnected,
            link: None,
            generation: 0,
            epoch: 0,
            opening: None,
            last_message_at: Instant::now(),
            reconnect_delay: config.reconnect().base_delay(),
            reconnect_task: None,
            watchdog_task: None,
            notices: VecDeque::new(),
            delivering: false,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                tokens,
                shared: Mutex::new(shared),
                messages: Arc::new(CallbackRegistry::new()),
                states: Arc::new(CallbackRegistry::new()),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens the link.
    ///
    /// Does nothing if the manager is already connecting or connected, if
    /// a reconnect attempt is opening a link, or if a link that reported an
    /// error is still held (its close schedules the reconnect). A pending
    /// reconnect timer is superseded. On success the reconnect delay returns
    /// to its base value and the staleness watchdog starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the link fails to open or times out; the state
    /// becomes `Error` and no reconnect is scheduled. Returns
    /// [`Error::NotAuthenticated`] in cloud mode without a valid token.
    pub async fn connect(&self) -> Result<()> {
        let epoch = {
            let mut shared = self.inner.shared.lock();
            if shared.opening.is_some() || shared.state.is_active() || shared.link.is_some() {
                tracing::debug!(state = %shared.state, "Connect ignored, link already held");
                return Ok(());
            }
            if let Some(task) = shared.reconnect_task.take() {
                task.abort();
            }
            shared.opening = Some(shared.epoch);
            shared.set_state(ConnectionState::Connecting);
            shared.epoch
        };
        self.inner.deliver();

        tracing::info!(endpoint = %self.inner.config.mode(), "Connecting");
        self.inner.open(epoch, OpenKind::Explicit).await
    }

    /// Closes the link with a normal closure and cancels all timers.
    ///
    /// This is the only way to stop automatic reconnection.
    pub fn disconnect(&self) {
        {
            let mut shared = self.inner.shared.lock();
            shared.epoch += 1;
            shared.opening = None;
            shared.cancel_timers();
            if let Some(link) = shared.link.take() {
                tracing::info!(link = %link.id, "Disconnecting");
                link.close(NORMAL_CLOSURE, "client disconnect");
            }
            shared.reconnect_delay = self.inner.config.reconnect().base_delay();
            shared.set_state(ConnectionState::Disconnected);
        }
        self.inner.deliver();
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Sends `{"type": kind, ...payload}` if connected.
    ///
    /// Messages are never queued across disconnects: while not connected,
    /// or when the outbound queue is full, the message is dropped and
    /// `false` is returned.
    pub fn send<P: Serialize>(&self, kind: &str, payload: P) -> bool {
        let text = match encode(kind, payload) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        let shared = self.inner.shared.lock();
        let Some(link) = shared.link.as_ref() else {
            tracing::debug!(kind = %kind, "Dropping message, not connected");
            return false;
        };
        if shared.state != ConnectionState::Connected {
            tracing::debug!(kind = %kind, state = %shared.state, "Dropping message, not connected");
            return false;
        }
        match link.outgoing.try_send(Outbound::Text(text)) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Dropping message, outbound queue unavailable");
                false
            }
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Subscribes to decoded inbound messages.
    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        self.inner.messages.subscribe(callback)
    }

    /// Subscribes to state transitions.
    ///
    /// The callback is invoked with the current state first, then with
    /// every later transition in the order it happened.
    pub fn on_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let callback: StateCallback = Arc::new(callback);
        let registered = Arc::clone(&callback);
        let subscription = {
            let mut shared = self.inner.shared.lock();
            let subscription = self
                .inner
                .states
                .subscribe(move |state: &ConnectionState| registered(state));
            let current = shared.state;
            shared.notices.push_back(Notice::Replay(callback, current));
            subscription
        };
        self.inner.deliver();
        subscription
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Returns `true` if the link is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the delay the next scheduled reconnect will use.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        self.inner.shared.lock().reconnect_delay
    }

    /// Returns the identifier of the open link.
    #[must_use]
    pub fn link_id(&self) -> Option<Uuid> {
        self.inner.shared.lock().link.as_ref().map(|link| link.id)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Returns a handle for consumers that observe and send but do not own
    /// the connection.
    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("target", &self.inner.config.mode().to_string())
            .field("state", &shared.state)
            .field("link", &shared.link.as_ref().map(|link| link.id))
            .field("reconnect_delay", &shared.reconnect_delay)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Non-owning access to a [`ConnectionManager`].
///
/// A handle cannot connect or disconnect, and does not keep the manager
/// alive. Once the manager is dropped, the handle reports `Disconnected`,
/// drops sends and returns `None` from subscription methods.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Weak<Inner>,
}

impl ConnectionHandle {
    fn manager(&self) -> Option<ConnectionManager> {
        self.inner.upgrade().map(|inner| ConnectionManager { inner })
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.manager()
            .map_or(ConnectionState::Disconnected, |manager| manager.state())
    }

    /// Returns `true` if the link is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Sends a message; see [`ConnectionManager::send`].
    pub fn send<P: Serialize>(&self, kind: &str, payload: P) -> bool {
        self.manager()
            .is_some_and(|manager| manager.send(kind, payload))
    }

    /// Subscribes to decoded inbound messages.
    pub fn on_message<F>(&self, callback: F) -> Option<Subscription>
    where
        F: Fn(&WireMessage) + Send + Sync + 'static,
    {
        self.manager().map(|manager| manager.on_message(callback))
    }

    /// Subscribes to state transitions, replaying the current state.
    pub fn on_state_change<F>(&self, callback: F) -> Option<Subscription>
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.manager()
            .map(|manager| manager.on_state_change(callback))
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("state", &self.state())
            .finish()
    }
}
