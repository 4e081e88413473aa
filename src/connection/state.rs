// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// Lifecycle state of a [`ConnectionManager`](super::ConnectionManager).
///
/// `Error` is not terminal: a reconnect may still be pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link and nothing scheduled.
    #[default]
    Disconnected,
    /// An explicit connect is opening the transport.
    Connecting,
    /// Link is open.
    Connected,
    /// Link was lost; a reconnect attempt is scheduled or running.
    Reconnecting,
    /// The last open attempt or the transport failed.
    Error,
}

impl ConnectionState {
    /// Returns `true` for `Connecting` and `Connected`.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}
