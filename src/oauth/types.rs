//! OAuth 2 core types and data structures.
//!
//! Defines clients, issued tokens, grant and response types, and the request and
//! response bodies of the token and userinfo endpoints.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OAuthError;

/// OAuth 2 Grant Types accepted at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Password,
    RefreshToken,
}

impl std::str::FromStr for GrantType {
    type Err = OAuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "password" => Ok(GrantType::Password),
            "refresh_token" => Ok(GrantType::RefreshToken),
            "" => Err(OAuthError::InvalidRequest(
                "Missing grant_type".to_string(),
            )),
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }
}

/// OAuth 2 Response Types accepted at the authorization endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
}

impl std::str::FromStr for ResponseType {
    type Err = OAuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            "" => Err(OAuthError::InvalidRequest(
                "Missing response_type".to_string(),
            )),
            other => Err(OAuthError::UnsupportedResponseType(other.to_string())),
        }
    }
}

/// OAuth 2 Token Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Bearer,
}

/// What an issued token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AuthorizationCode,
    AccessToken,
    RefreshToken,
}

/// A registered client application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier
    pub id: String,
    /// Client secret; empty for clients that never authenticate
    pub secret: String,
    /// Permitted redirect origin, e.g. `localhost:8080` or `https://app.example.com`
    pub domain: String,
}

impl Client {
    pub fn new(id: impl Into<String>, secret: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            domain: domain.into(),
        }
    }

    /// Whether the client holds a secret and so can authenticate itself
    pub fn is_confidential(&self) -> bool {
        !self.secret.is_empty()
    }
}

/// A resource-owner password bound to one client
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An issued authorization code, access token or refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Opaque token value presented by the bearer
    pub value: String,
    pub kind: TokenKind,
    /// Owning client
    pub client_id: String,
    /// Resource owner
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Seconds remaining until expiry, never negative
    pub fn expires_in(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }

    /// Shortened value suitable for log lines
    pub fn redacted(&self) -> String {
        redact(&self.value)
    }
}

/// Token Exchange Request
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// Grant type
    pub grant_type: GrantType,
    /// Authorization code (for authorization_code grant)
    pub code: Option<String>,
    /// Refresh token (for refresh_token grant)
    pub refresh_token: Option<String>,
    /// Resource owner name (for password grant)
    pub username: Option<String>,
    /// Resource owner password (for password grant)
    pub password: Option<String>,
}

/// Client identity presented at the token endpoint, via HTTP Basic or form fields
#[derive(Clone, Default)]
pub struct ClientAuthentication {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for ClientAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAuthentication")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Token Response (RFC 6749 Section 5.1)
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type
    pub token_type: TokenType,
    /// Expires in seconds
    pub expires_in: u64,
    /// Refresh token (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn new(access_token: &Token, refresh_token: Option<&Token>) -> Self {
        Self {
            access_token: access_token.value.clone(),
            token_type: TokenType::Bearer,
            expires_in: access_token.expires_in(access_token.issued_at),
            refresh_token: refresh_token.map(|token| token.value.clone()),
        }
    }
}

/// Claims bound to an access token, as reported by the userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub client_id: String,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Seconds remaining at the time of introspection
    pub expires_in: u64,
}

impl TokenClaims {
    pub fn project(token: &Token, now: DateTime<Utc>) -> Self {
        Self {
            user_id: token.user_id.clone(),
            client_id: token.client_id.clone(),
            kind: token.kind,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            expires_in: token.expires_in(now),
        }
    }
}

/// OAuth Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code
    pub error: String,
    /// Error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Generate a secure random token value carrying 256 bits of entropy
pub fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Keep the first few characters of a secret value for diagnostics
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(6).collect();
    format!("{prefix}...")
}
