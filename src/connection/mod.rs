// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client connection to the publisher.
//!
//! The [`ConnectionManager`] keeps a single logical link alive across an
//! unreliable transport:
//!
//! - **Staleness watchdog**: the publisher emits status at a known cadence,
//!   so prolonged silence means the link is dead even when the transport
//!   reports nothing. The watchdog force-closes such a link with
//!   [`STALE_CLOSURE`] and reconnects.
//! - **Backoff**: abnormal closures schedule a reconnect whose delay doubles
//!   up to a cap and resets once a link opens.
//! - **At-most-once sends**: commands issued while not connected are dropped.
//!
//! Transports plug in through the [`Connector`] trait; the
//! [`WebSocketConnector`] is provided with the `websocket` feature.
//!
//! # Examples
//!
//! ```no_run
//! use brewlink::connection::{ConnectionConfig, ConnectionManager, ConnectionMode};
//! use brewlink::protocol::WireMessage;
//!
//! # async fn example() -> brewlink::Result<()> {
//! let manager = ConnectionManager::websocket(ConnectionConfig::new(
//!     ConnectionMode::direct("192.168.1.40"),
//! ));
//!
//! let _state = manager.on_state_change(|state| println!("link {state}"));
//! let _messages = manager.on_message(|message| {
//!     if let WireMessage::Status(status) = message {
//!         println!("groups: {}", status.groups());
//!     }
//! });
//!
//! manager.connect().await?;
//! manager.send("request_state", ());
//! # Ok(())
//! # }
//! ```

mod config;
mod manager;
mod state;
mod transport;
#[cfg(feature = "websocket")]
mod websocket;

pub use config::{ConnectionConfig, ConnectionMode, ReconnectPolicy, StalenessPolicy};
pub use manager::{ConnectionHandle, ConnectionManager, TokenProvider};
pub use state::ConnectionState;
pub use transport::{
    Connector, NORMAL_CLOSURE, Outbound, STALE_CLOSURE, TransportChannels, TransportEvent,
};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
