// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Brewlink - State synchronization for networked espresso machines.
//!
//! A machine controller publishes its state as JSON messages over a
//! WebSocket, either directly on the local network or through a cloud
//! relay. This library provides both ends of that link:
//!
//! - **Publisher side**: a [`ChangeDetector`](state::ChangeDetector) that
//!   turns sampled snapshots into compact deltas, and a
//!   [`StatusPublisher`](publisher::StatusPublisher) that emits them at a
//!   fixed cadence.
//! - **Observer side**: a [`ConnectionManager`](connection::ConnectionManager)
//!   that keeps the link alive through silent failures and backs off when
//!   reconnecting, and a [`SessionTokenManager`](auth::SessionTokenManager)
//!   that keeps the cloud session valid.
//!
//! # Features
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `http` (default): auth server client via `reqwest`
//!
//! # Quick Start
//!
//! ## Local Connection
//!
//! ```no_run
//! use brewlink::connection::{ConnectionConfig, ConnectionManager, ConnectionMode};
//! use brewlink::protocol::WireMessage;
//! use brewlink::state::DeviceStateSnapshot;
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> brewlink::Result<()> {
//!     let manager = ConnectionManager::websocket(ConnectionConfig::new(
//!         ConnectionMode::direct("192.168.1.40"),
//!     ));
//!
//!     // Mirror the machine state from status deltas
//!     let mirror = Arc::new(Mutex::new(DeviceStateSnapshot::default()));
//!     let sink = Arc::clone(&mirror);
//!     let _sub = manager.on_message(move |message| {
//!         if let WireMessage::Status(status) = message {
//!             if let Ok(mut snapshot) = sink.lock() {
//!                 status.apply_to(&mut snapshot);
//!             }
//!         }
//!     });
//!
//!     manager.connect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Cloud Connection
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use brewlink::auth::{AuthConfig, FileSessionStore, SessionTokenManager};
//! use brewlink::connection::{
//!     ConnectionConfig, ConnectionManager, ConnectionMode, WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> brewlink::Result<()> {
//!     let auth = SessionTokenManager::new(
//!         AuthConfig::new("https://cloud.example.com/api"),
//!         FileSessionStore::default_location()?,
//!     )?;
//!
//!     let manager = ConnectionManager::with_token_provider(
//!         ConnectionConfig::new(ConnectionMode::cloud("relay.example.com", "BRW-0042")),
//!         WebSocketConnector::new(),
//!         Arc::new(auth),
//!     );
//!
//!     manager.connect().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod publisher;
pub mod state;
pub mod subscription;

pub use auth::{AuthConfig, Session, SessionTokenManager};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionMode, ConnectionState};
pub use error::{AuthError, Error, ParseError, ProtocolError, Result, StorageError};
pub use protocol::{DeviceInfo, StatusMessage, WireMessage};
pub use state::{ChangeDetector, ChangeMask, DeviceStateSnapshot, StatusGroup};
pub use subscription::{CallbackRegistry, Subscription, SubscriptionId};
