//! Sign-in
//!
//! Exchanges account credentials for the session token sent with
//! `set_auth_token`. Without credentials the chart endpoint accepts a fixed
//! anonymous token, which limits history depth.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::REFERER;
use serde::Deserialize;

use crate::infrastructure::config::Credentials;

/// Account sign-in endpoint.
pub const SIGN_IN_URL: &str = "https://www.tradingview.com/accounts/signin/";

/// Token sent when not signed in.
pub const ANONYMOUS_TOKEN: &str = "unauthorized_user_token";

const REFERER_VALUE: &str = "https://www.tradingview.com";

// =============================================================================
// Token
// =============================================================================

/// Token for the chart session.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionToken {
    /// Token issued at sign-in.
    Authenticated(String),
    /// No account; limited data.
    Anonymous,
}

impl SessionToken {
    /// Value sent on the wire.
    #[must_use]
    pub fn wire_value(&self) -> &str {
        match self {
            Self::Authenticated(token) => token,
            Self::Anonymous => ANONYMOUS_TOKEN,
        }
    }

    /// Whether this token came from a sign-in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(_) => f.write_str("Authenticated([REDACTED])"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(_) => f.write_str("authenticated"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Sign-in failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Request could not be sent or the body not read.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("sign-in returned HTTP {0}")]
    Status(u16),

    /// Response body was not the expected JSON.
    #[error("malformed sign-in response: {0}")]
    MalformedResponse(String),

    /// Server refused the credentials.
    #[error("sign-in rejected: {0}")]
    Rejected(String),

    /// Response had no token.
    #[error("sign-in response carried no auth token")]
    MissingToken,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(default)]
    user: Option<SignInUser>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignInUser {
    #[serde(default)]
    auth_token: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Form-post sign-in client.
#[derive(Debug, Clone)]
pub struct SignInClient {
    client: Client,
    url: String,
}

impl SignInClient {
    /// Create a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        Self::with_url(SIGN_IN_URL, timeout)
    }

    /// Create a client against another endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Sign in and return the issued token.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, a
    /// rejection, or a response without a token.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        let form = [
            ("username", credentials.username()),
            ("password", credentials.password()),
            ("remember", "on"),
        ];

        let response = self
            .client
            .post(&self.url)
            .header(REFERER, REFERER_VALUE)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        if let Some(message) = body.error.filter(|m| !m.is_empty()) {
            return Err(AuthError::Rejected(message));
        }

        body.user
            .and_then(|user| user.auth_token)
            .filter(|token| !token.is_empty())
            .map(SessionToken::Authenticated)
            .ok_or(AuthError::MissingToken)
    }

    /// Sign in when credentials are present, otherwise run anonymously.
    ///
    /// A failed sign-in is logged and also falls back to anonymous.
    pub async fn token_or_anonymous(&self, credentials: Option<&Credentials>) -> SessionToken {
        let Some(credentials) = credentials else {
            tracing::warn!("No credentials configured, using anonymous access; data may be limited");
            return SessionToken::Anonymous;
        };

        match self.sign_in(credentials).await {
            Ok(token) => {
                tracing::info!(username = credentials.username(), "Signed in");
                token
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed, using anonymous access");
                SessionToken::Anonymous
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_wire_value() {
        assert_eq!(SessionToken::Anonymous.wire_value(), "unauthorized_user_token");
        assert!(!SessionToken::Anonymous.is_authenticated());
    }

    #[test]
    fn authenticated_token_is_redacted() {
        let token = SessionToken::Authenticated("secret-token".into());
        assert_eq!(token.wire_value(), "secret-token");
        assert!(token.is_authenticated());
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(token.to_string(), "authenticated");
    }

    #[test]
    fn parses_sign_in_body() {
        let body: SignInResponse =
            serde_json::from_str(r#"{"user":{"username":"u","auth_token":"tok"}}"#).unwrap();
        assert_eq!(body.user.unwrap().auth_token.as_deref(), Some("tok"));

        let rejected: SignInResponse =
            serde_json::from_str(r#"{"error":"Invalid username or password","code":"invalid_credentials"}"#)
                .unwrap();
        assert!(rejected.user.is_none());
        assert_eq!(rejected.error.as_deref(), Some("Invalid username or password"));
    }
}
