// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport abstraction used by the connection manager.
//!
//! A [`Connector`] opens one link and hands back a pair of channels. The
//! link delivers whole text messages in order and reports its end exactly
//! once with [`TransportEvent::Closed`]; a transport fault is reported as
//! [`TransportEvent::Error`] followed by `Closed`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// Standard "normal closure" close code.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code used when the staleness watchdog gives up on a silent link.
pub const STALE_CLOSURE: u16 = 4000;

/// Frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text message.
    Text(String),
    /// Close the link with the given code.
    Close {
        /// Close code.
        code: u16,
        /// Human-readable reason.
        reason: String,
    },
}

/// Event read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A whole text message.
    Message(String),
    /// A transport fault. Always followed by `Closed`.
    Error(String),
    /// The link ended. `code` is `None` when no close frame was received.
    Closed {
        /// Close code from the peer.
        code: Option<u16>,
        /// Close reason from the peer.
        reason: String,
    },
}

/// Channels of one open link.
#[derive(Debug)]
pub struct TransportChannels {
    /// Frames to write.
    pub outgoing: mpsc::Sender<Outbound>,
    /// Events read from the link.
    pub incoming: mpsc::Receiver<TransportEvent>,
}

/// Opens transport links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one link to `url`.
    ///
    /// Resolves once the link is open.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the link cannot be opened.
    async fn open(&self, url: &str) -> Result<TransportChannels, ProtocolError>;
}
