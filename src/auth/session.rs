// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session records.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Account identifier.
    pub id: String,
    /// Account email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A fresh token pair returned by `POST /auth/refresh`.
///
/// The refresh token rotates: the one used for the request is no longer
/// valid once this pair is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token.
    pub access_token: String,
    /// Replacement refresh token.
    pub refresh_token: String,
    /// Expiry of `access_token`, in milliseconds since the Unix epoch.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// An authenticated session.
///
/// Serialized as camelCase JSON with `expiresAt` in epoch milliseconds,
/// matching both the auth server's responses and the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token.
    pub access_token: String,
    /// Token used to obtain the next pair.
    pub refresh_token: String,
    /// Expiry of `access_token`.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Signed-in user, if the server reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

impl Session {
    /// Returns `true` if the access token expires within `buffer`.
    #[must_use]
    pub fn needs_refresh(&self, buffer: Duration) -> bool {
        let buffer = TimeDelta::from_std(buffer).unwrap_or(TimeDelta::MAX);
        Utc::now()
            .checked_add_signed(buffer)
            .is_none_or(|deadline| deadline >= self.expires_at)
    }

    /// Returns `true` if the access token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns the time until expiry, zero if already expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Returns this session with its tokens replaced by `pair`.
    #[must_use]
    pub fn rotated(self, pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.expires_at,
            user: self.user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_expiring_in(secs: i64) -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now() + TimeDelta::seconds(secs),
            user: None,
        }
    }

    #[test]
    fn refresh_window() {
        let buffer = Duration::from_secs(300);
        assert!(!session_expiring_in(3600).needs_refresh(buffer));
        assert!(session_expiring_in(120).needs_refresh(buffer));
        assert!(session_expiring_in(-5).needs_refresh(buffer));
        assert!(session_expiring_in(-5).is_expired());
    }

    #[test]
    fn remaining_is_zero_when_expired() {
        assert_eq!(session_expiring_in(-60).remaining(), Duration::ZERO);
        assert!(session_expiring_in(600).remaining() > Duration::from_secs(590));
    }

    #[test]
    fn wire_format() {
        let session: Session = serde_json::from_value(json!({
            "accessToken": "acc",
            "refreshToken": "ref",
            "expiresAt": 1_767_225_600_000_i64,
            "user": {"id": "u1", "email": "a@b.c"}
        }))
        .unwrap();

        assert_eq!(session.expires_at.timestamp(), 1_767_225_600);
        assert_eq!(session.user.as_ref().unwrap().email.as_deref(), Some("a@b.c"));

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["expiresAt"], 1_767_225_600_000_i64);
        assert_eq!(value["user"]["id"], "u1");
    }

    #[test]
    fn rotation_keeps_user() {
        let mut session = session_expiring_in(10);
        session.user = Some(SessionUser {
            id: "u1".to_string(),
            ..SessionUser::default()
        });
        let pair = TokenPair {
            access_token: "a2".to_string(),
            refresh_token: "r2".to_string(),
            expires_at: Utc::now() + TimeDelta::hours(1),
        };

        let rotated = session.rotated(pair);
        assert_eq!(rotated.refresh_token, "r2");
        assert_eq!(rotated.user.unwrap().id, "u1");
    }
}
