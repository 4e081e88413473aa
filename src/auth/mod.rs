// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud session management.
//!
//! [`SessionTokenManager`] owns the signed-in [`Session`], persists it
//! through a [`SessionStore`], and hands out access tokens that are
//! guaranteed to be outside the refresh buffer. Refreshes are
//! single-flight and classified as terminal (HTTP 401/403, the user is
//! signed out) or transient (anything else, the session is kept).
//!
//! The manager implements [`TokenProvider`](crate::connection::TokenProvider)
//! so it can be plugged straight into a cloud
//! [`ConnectionManager`](crate::connection::ConnectionManager).

mod client;
mod config;
mod manager;
mod session;
mod store;

#[cfg(feature = "http")]
pub use client::AuthClient;
pub use client::AuthBackend;
pub use config::{AuthConfig, RetryPolicy};
pub use manager::{SessionEvent, SessionTokenManager, SignOutReason};
pub use session::{Session, SessionUser, TokenPair};
pub use store::{FileSessionStore, MemorySessionStore, SESSION_KEY, SessionStore};
