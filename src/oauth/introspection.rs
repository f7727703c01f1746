//! Access token introspection for resource servers.

use std::sync::Arc;

use chrono::Utc;

use crate::errors::OAuthError;
use crate::oauth::types::{TokenClaims, TokenKind};
use crate::storage::traits::{OAuthStorage, TokenStore};

/// Resolves presented access tokens to the claims bound to them
#[derive(Clone)]
pub struct TokenIntrospector {
    storage: Arc<dyn OAuthStorage>,
}

impl TokenIntrospector {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }

    /// Look up a live access token. Unknown, expired, revoked and non-access
    /// tokens all report `invalid_token`.
    pub async fn introspect(&self, value: &str) -> Result<TokenClaims, OAuthError> {
        if value.is_empty() {
            return Err(OAuthError::InvalidToken("Empty access token".to_string()));
        }

        let token = self
            .storage
            .load_token(value)
            .await?
            .filter(|token| token.kind == TokenKind::AccessToken)
            .ok_or_else(|| OAuthError::InvalidToken("Invalid or expired access token".to_string()))?;

        Ok(TokenClaims::project(&token, Utc::now()))
    }
}
