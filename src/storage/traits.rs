//! Storage trait definitions for clients, credentials and tokens.

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;
use chrono::Duration;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving registered clients
#[async_trait]
pub trait ClientStore {
    /// Insert a client, replacing any entry with the same id
    async fn store_client(&self, client: &Client) -> Result<()>;

    /// Retrieve a client by ID
    async fn get_client(&self, client_id: &str) -> Result<Option<Client>>;
}

/// Trait for storing resource-owner passwords, at most one per client
#[async_trait]
pub trait CredentialStore {
    /// Insert a credential, replacing any entry for the same client
    async fn store_credential(&self, credential: &Credential) -> Result<()>;

    /// Retrieve the credential for a client
    async fn get_credential(&self, client_id: &str) -> Result<Option<Credential>>;

    /// Remove the credential for a client, if any
    async fn remove_credential(&self, client_id: &str) -> Result<()>;
}

/// Trait for issuing and retrieving tokens
#[async_trait]
pub trait TokenStore {
    /// Mint and store a token with a fresh unique value, valid for `ttl`
    async fn create_token(
        &self,
        kind: TokenKind,
        client_id: &str,
        user_id: &str,
        ttl: Duration,
    ) -> Result<Token>;

    /// Retrieve a live token; expired tokens are reported as absent
    async fn load_token(&self, value: &str) -> Result<Option<Token>>;

    /// Remove and return a live token of the given kind in one step
    async fn consume_token(&self, value: &str, kind: TokenKind) -> Result<Option<Token>>;

    /// Remove a token unconditionally
    async fn revoke_token(&self, value: &str) -> Result<()>;

    /// Clean up expired tokens
    async fn cleanup_expired_tokens(&self) -> Result<usize>;
}

/// Combined OAuth storage trait
pub trait OAuthStorage: ClientStore + CredentialStore + TokenStore + Send + Sync {}
