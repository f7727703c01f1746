//! Standardized error types following the `error-isolenta-<domain>-<number>` format.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use thiserror::Error;

use crate::oauth::types::OAuthErrorResponse;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when the configuration file cannot be read
    #[error("error-isolenta-config-1 Unable to read configuration file '{0}': {1}")]
    ReadFailed(String, std::io::Error),

    /// Error when the configuration file is not valid TOML
    #[error("error-isolenta-config-2 Unable to parse configuration file '{0}': {1}")]
    ParseFailed(String, toml::de::Error),

    /// Error when duration string cannot be parsed
    #[error("error-isolenta-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a duration is zero or out of range
    #[error("error-isolenta-config-4 Duration '{0}' must be positive")]
    DurationNotPositive(String),

    /// Error when the listen address is empty
    #[error("error-isolenta-config-5 serve-at must not be empty")]
    ServeAtRequired,

    /// Error when a client entry has no id
    #[error("error-isolenta-config-6 Client entry {0} has an empty id")]
    ClientIdRequired(usize),

    /// Error when two client entries share an id
    #[error("error-isolenta-config-7 Duplicate client id '{0}'")]
    DuplicateClientId(String),
}

/// Classification of every failure the core can signal.
///
/// Callers rely on telling these apart: only `Internal` is a server fault, the
/// rest are caller mistakes or refusals and are never retried by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent an unparsable or incomplete request
    Malformed,
    /// Authentication or authorization failed
    Denied,
    /// The referenced token or code does not exist or has expired
    NotFound,
    /// Unexpected fault inside the server
    Internal,
}

/// OAuth-related errors
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Invalid request
    #[error("error-isolenta-oauth-1 Invalid request: {0}")]
    InvalidRequest(String),

    /// Access denied
    #[error("error-isolenta-oauth-2 Access denied: {0}")]
    AccessDenied(String),

    /// Invalid client credentials
    #[error("error-isolenta-oauth-3 Invalid client credentials: {0}")]
    InvalidClient(String),

    /// Invalid, expired or reused grant
    #[error("error-isolenta-oauth-4 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Unsupported grant type
    #[error("error-isolenta-oauth-5 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Unsupported response type
    #[error("error-isolenta-oauth-6 Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    /// Token not found or expired
    #[error("error-isolenta-oauth-7 Invalid token: {0}")]
    InvalidToken(String),

    /// Server error
    #[error("error-isolenta-oauth-8 Server error: {0}")]
    ServerError(String),

    /// Authorization request without a client id; malformed, but reported as
    /// `access_denied` on the wire
    #[error("error-isolenta-oauth-9 Missing client_id")]
    MissingClientId,
}

impl OAuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::InvalidRequest(_)
            | OAuthError::MissingClientId
            | OAuthError::UnsupportedGrantType(_)
            | OAuthError::UnsupportedResponseType(_) => ErrorKind::Malformed,
            OAuthError::AccessDenied(_)
            | OAuthError::InvalidClient(_)
            | OAuthError::InvalidGrant(_) => ErrorKind::Denied,
            OAuthError::InvalidToken(_) => ErrorKind::NotFound,
            OAuthError::ServerError(_) => ErrorKind::Internal,
        }
    }

    /// Wire error code (RFC 6749 Section 5.2 and RFC 6750 Section 3.1)
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::AccessDenied(_) | OAuthError::MissingClientId => "access_denied",
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuthError::InvalidToken(_) => "invalid_token",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OAuthError::InvalidClient(_) | OAuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            OAuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// The error body returned to the caller. Internal faults carry no description.
    pub fn to_response_body(&self) -> OAuthErrorResponse {
        let error_description = match self.kind() {
            ErrorKind::Internal => None,
            _ => Some(self.to_string()),
        };
        OAuthErrorResponse {
            error: self.error_code().to_string(),
            error_description,
        }
    }
}

impl From<StorageError> for OAuthError {
    fn from(err: StorageError) -> Self {
        OAuthError::ServerError(err.to_string())
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = ?self, "internal server error");
            }
            kind => {
                tracing::warn!(?kind, code = self.error_code(), error = %self, "request refused");
            }
        }

        let status = self.status_code();
        let mut response = (status, Json(self.to_response_body())).into_response();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match &self {
                OAuthError::InvalidToken(_) => "Bearer error=\"invalid_token\"",
                _ => "Basic",
            };
            response.headers_mut().insert(
                http::header::WWW_AUTHENTICATE,
                http::HeaderValue::from_static(challenge),
            );
        }
        response
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when a lock guarding in-memory state is poisoned
    #[error("error-isolenta-storage-1 Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Error when data validation fails
    #[error("error-isolenta-storage-2 Invalid data: {0}")]
    InvalidData(String),
}
