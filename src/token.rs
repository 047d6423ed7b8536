//! Authentication against the SWEET-CROSS API.
//!
//! [`TokenClient`] obtains and refreshes access tokens. In normal use it is
//! not constructed directly: [`crate::CrossClient`] carries one internally
//! and attaches a current token to every request.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::error::error_from_response;
use crate::util::urljoin;

/// Authentication token as returned by the API: the access token itself,
/// the refresh token, the token type and the two expiry windows, both
/// counted in seconds from `created_at`.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Set client-side at parse time; the server does not send it.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

impl Token {
    /// Whether the access token has expired.
    pub fn is_expired(&self) -> bool {
        window_elapsed(self.created_at, self.expires_in)
    }

    /// Whether the refresh token has expired.
    pub fn is_refresh_expired(&self) -> bool {
        window_elapsed(self.created_at, self.refresh_expires_in)
    }

    /// Value for the `Authorization` header, e.g. `Bearer <access_token>`.
    pub(crate) fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Checked variant of `now >= created_at + window`; server-supplied windows
/// can exceed what `TimeDelta`/`DateTime` arithmetic represents.
fn window_elapsed(created_at: DateTime<Utc>, window_seconds: i64) -> bool {
    match TimeDelta::try_seconds(window_seconds)
        .and_then(|window| created_at.checked_add_signed(window))
    {
        Some(deadline) => Utc::now() >= deadline,
        // Out of range: a huge positive window never elapses, a huge
        // negative one already has.
        None => window_seconds < 0,
    }
}

/// Issues and refreshes [`Token`]s for one set of credentials.
///
/// The client keeps the most recent token; [`TokenClient::current`] hands
/// out request-scoped copies and replaces the cached token when it has
/// expired: through the refresh endpoint while the refresh token is live,
/// otherwise through a fresh password login.
#[derive(Debug)]
pub struct TokenClient {
    username: String,
    password: String,
    base_url: String,
    http: HttpClient,
    token: Mutex<Option<Token>>,
}

impl TokenClient {
    /// Creates a standalone token client with its own HTTP handle.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = crate::client::build_http(std::time::Duration::from_secs(60), true)?;
        Ok(Self::with_http(username, password, base_url, http))
    }

    pub(crate) fn with_http(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
        http: HttpClient,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: base_url.into(),
            http,
            token: Mutex::new(None),
        }
    }

    fn auth_url(&self) -> String {
        urljoin(&self.base_url, "/login/access_token")
    }

    fn refresh_url(&self) -> String {
        urljoin(&self.base_url, "/login/refresh_token")
    }

    /// Returns a token that is valid right now.
    ///
    /// The cached token is reused while valid; the lock is held across a
    /// replacement fetch so concurrent callers cannot trigger duplicate
    /// logins.
    pub fn current(&self) -> Result<Token> {
        let mut cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);

        match cached.as_ref() {
            Some(token) if !token.is_expired() => return Ok(token.clone()),
            Some(token) if !token.is_refresh_expired() => {
                match self.refresh(&token.refresh_token) {
                    Ok(fresh) => {
                        *cached = Some(fresh.clone());
                        return Ok(fresh);
                    }
                    Err(err) => {
                        warn!("token refresh failed, falling back to password login: {err:#}");
                    }
                }
            }
            _ => {}
        }

        let fresh = self.authenticate()?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Performs a password login and returns the issued token.
    ///
    /// Does not touch the cached token; use [`TokenClient::current`] for
    /// cached access.
    pub fn authenticate(&self) -> Result<Token> {
        let url = self.auth_url();
        debug!("requesting access token for '{}'", self.username);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .context("could not reach the authentication endpoint")?;

        let token = parse_token_response(resp, &url).context("failed to obtain access token")?;
        info!(
            "access token acquired for '{}' (expires_in={}s)",
            self.username, token.expires_in
        );
        Ok(token)
    }

    fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let url = self.refresh_url();
        debug!("refreshing access token for '{}'", self.username);
        let resp = self
            .http
            .post(&url)
            .form(&[("refresh_token", refresh_token)])
            .send()
            .context("could not reach the token refresh endpoint")?;

        parse_token_response(resp, &url).context("failed to refresh access token")
    }
}

fn parse_token_response(resp: Response, url: &str) -> Result<Token> {
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        return Err(error_from_response(status, url, &text));
    }

    serde_json::from_str::<Token>(&text)
        .with_context(|| format!("failed to parse token response (url={}, status={})", url, status))
}
