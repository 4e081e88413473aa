// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Auth REST surface.

use async_trait::async_trait;
#[cfg(feature = "http")]
use reqwest::Client;
#[cfg(feature = "http")]
use serde::Serialize;

use super::{Session, TokenPair};
#[cfg(feature = "http")]
use super::AuthConfig;
use crate::error::AuthError;
#[cfg(feature = "http")]
use crate::error::ProtocolError;

/// Server operations the session manager relies on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchanges a third-party credential for a session.
    async fn exchange(&self, provider: &str, credential: &str) -> Result<Session, AuthError>;

    /// Trades a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Revokes the session owning `access_token`.
    async fn logout(&self, access_token: &str) -> Result<(), AuthError>;

    /// Revokes every session of the user owning `access_token`.
    async fn logout_all(&self, access_token: &str) -> Result<(), AuthError>;
}

/// HTTP client for the auth server.
///
/// | Operation | Request |
/// |---|---|
/// | exchange | `POST /auth/<provider>` `{credential}` |
/// | refresh | `POST /auth/refresh` `{refreshToken}` |
/// | logout | `POST /auth/logout` with bearer token |
/// | logout all | `POST /auth/logout-all` with bearer token |
///
/// HTTP 401 and 403 map to [`AuthError::Rejected`]; other failures are
/// transient.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    client: Client,
}

#[cfg(feature = "http")]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[cfg(feature = "http")]
#[derive(Serialize)]
struct ExchangeRequest<'a> {
    credential: &'a str,
}

#[cfg(feature = "http")]
impl AuthClient {
    /// Creates a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &AuthConfig) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/{path}", self.base_url)
    }

    async fn post_revoke(&self, path: &str, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response).map(|_| ())
    }
}

#[cfg(feature = "http")]
fn check(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AuthError::from_status(status.as_u16()))
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl AuthBackend for AuthClient {
    async fn exchange(&self, provider: &str, credential: &str) -> Result<Session, AuthError> {
        let url = self.url(&urlencoding::encode(provider));
        tracing::debug!(provider = %provider, "Exchanging credential");

        let response = self
            .client
            .post(url)
            .json(&ExchangeRequest { credential })
            .send()
            .await?;
        Ok(check(response)?.json::<Session>().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let response = self
            .client
            .post(self.url("refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        Ok(check(response)?.json::<TokenPair>().await?)
    }

    async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        self.post_revoke("logout", access_token).await
    }

    async fn logout_all(&self, access_token: &str) -> Result<(), AuthError> {
        self.post_revoke("logout-all", access_token).await
    }
}
