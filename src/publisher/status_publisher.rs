// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Detector-driven status publishing.

use std::time::Duration;

use tokio::sync::mpsc;

use super::SnapshotSource;
use crate::protocol::{KEEPALIVE, REQUEST_STATE, StatusMessage, WireMessage, encode};
use crate::state::ChangeDetector;

/// Turns sampled snapshots into `status` deltas.
///
/// # Examples
///
/// ```
/// use brewlink::publisher::{SimulatedMachine, StatusPublisher};
///
/// let mut publisher = StatusPublisher::new(SimulatedMachine::new());
///
/// // A new observer gets identity plus a full snapshot
/// let greeting = publisher.on_observer_connected();
/// assert_eq!(greeting[0].kind(), "device_info");
/// assert_eq!(greeting[1].kind(), "status");
/// ```
#[derive(Debug)]
pub struct StatusPublisher<S> {
    source: S,
    detector: ChangeDetector,
    cadence: Duration,
    keepalive: Duration,
}

impl<S: SnapshotSource> StatusPublisher<S> {
    /// Default interval between status ticks.
    pub const DEFAULT_CADENCE: Duration = Duration::from_millis(500);
    /// Default silence after which an idle publisher sends `keepalive`.
    pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(3);

    /// Creates a publisher over `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            detector: ChangeDetector::new(),
            cadence: Self::DEFAULT_CADENCE,
            keepalive: Self::DEFAULT_KEEPALIVE,
        }
    }

    /// Sets the interval between status ticks.
    #[must_use]
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Sets the silence after which a `keepalive` is sent.
    ///
    /// Must stay below the observers' staleness threshold.
    #[must_use]
    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Returns the keepalive interval.
    #[must_use]
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    /// Returns the interval between status ticks.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Returns the underlying source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the underlying source mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Samples the source and returns a delta if anything changed.
    pub fn next_status(&mut self) -> Option<StatusMessage> {
        let snapshot = self.source.sample();
        let detection = self.detector.detect(&snapshot);
        detection
            .changed
            .then(|| StatusMessage::from_snapshot(&snapshot, detection.mask))
    }

    /// Resets change detection and returns the greeting for a new observer:
    /// `device_info` followed by a full `status`.
    pub fn on_observer_connected(&mut self) -> Vec<WireMessage> {
        self.detector.reset();
        let mut messages = vec![WireMessage::from(self.source.device_info())];
        messages.extend(self.next_status().map(WireMessage::from));
        tracing::debug!("Sending full sync to new observer");
        messages
    }

    /// Handles an inbound command, returning any replies.
    ///
    /// `request_state` triggers the same full sync as a new connection.
    /// Other commands are left to the caller.
    pub fn handle_command(&mut self, command: &WireMessage) -> Vec<WireMessage> {
        match command {
            WireMessage::Other { kind, .. } if kind == REQUEST_STATE => {
                self.on_observer_connected()
            }
            _ => Vec::new(),
        }
    }

    /// Publishes to `outgoing` on every tick until the receiver is dropped.
    ///
    /// The first tick sends the new-observer greeting; later ticks send a
    /// delta when something changed, or a `keepalive` once nothing has been
    /// sent for the keepalive interval.
    pub async fn run(mut self, outgoing: mpsc::Sender<String>) {
        let mut ticker = tokio::time::interval(self.cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut greeted = false;
        let mut last_sent = tokio::time::Instant::now();
        loop {
            ticker.tick().await;
            if outgoing.is_closed() {
                tracing::debug!("Status receiver dropped, publisher stopping");
                return;
            }

            let mut texts = Vec::new();
            let messages = if greeted {
                self.next_status()
                    .map(WireMessage::from)
                    .into_iter()
                    .collect()
            } else {
                greeted = true;
                self.on_observer_connected()
            };
            for message in messages {
                match message.to_json() {
                    Ok(text) => texts.push(text),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode status"),
                }
            }

            if texts.is_empty() && last_sent.elapsed() >= self.keepalive {
                match encode(KEEPALIVE, ()) {
                    Ok(text) => texts.push(text),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode keepalive"),
                }
            }

            for text in texts {
                if outgoing.send(text).await.is_err() {
                    tracing::debug!("Status receiver dropped, publisher stopping");
                    return;
                }
                last_sent = tokio::time::Instant::now();
            }
        }
    }
}
