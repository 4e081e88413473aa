// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `brewlink` library.
//!
//! The hierarchy mirrors the failure taxonomy of the synchronization layer:
//! transport faults ([`ProtocolError`]), decoding faults ([`ParseError`]),
//! credential faults ([`AuthError`]) and local persistence faults
//! ([`StorageError`]).

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred on the transport.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while decoding a message.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred while exchanging or refreshing credentials.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Error occurred while persisting client state.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A cloud connection was requested but no valid bearer token is available.
    #[error("no valid session for cloud connection")]
    NotAuthenticated,
}

/// Errors related to transport communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// WebSocket handshake or I/O failed.
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection to the device or relay failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation timed out.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The attempt was superseded by a disconnect before it completed.
    #[error("connection attempt aborted")]
    Aborted,
}

/// Errors related to decoding wire messages.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the message.
    #[error("missing field in message: {0}")]
    MissingField(String),

    /// Unexpected message format.
    #[error("unexpected message format: {0}")]
    UnexpectedFormat(String),
}

/// Errors related to the credential exchange surface.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server explicitly refused the credential (HTTP 401 or 403).
    #[error("credential rejected by server (HTTP {status})")]
    Rejected {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// The server failed with a non-authorization status.
    #[error("server error (HTTP {status})")]
    Server {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// The request could not reach the server.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No session is available for the operation.
    #[error("no session")]
    NoSession,
}

impl AuthError {
    /// Returns `true` if this failure must end the session.
    ///
    /// Only an explicit authorization rejection is terminal; every other
    /// failure is treated as transient connectivity loss.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Classifies an HTTP status code returned by the auth server.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        if status == 401 || status == 403 {
            Self::Rejected { status }
        } else {
            Self::Server { status }
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors related to durable client storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No storage location could be determined.
    #[error("no storage location available")]
    NoLocation,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
