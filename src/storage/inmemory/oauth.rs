//! In-memory OAuth storage implementation
//!
//! All state is volatile and rebuilt from configuration on restart.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation for OAuth storage
#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: RwLock<HashMap<String, Client>>,
    credentials: RwLock<HashMap<String, Credential>>,
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored token records, expired or not
    pub fn token_count(&self) -> Result<usize> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;
        Ok(tokens.len())
    }
}

impl OAuthStorage for MemoryOAuthStorage {}

#[async_trait]
impl ClientStore for MemoryOAuthStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let mut clients = self
            .clients
            .write()
            .map_err(|e| StorageError::LockPoisoned(format!("clients: {}", e)))?;
        clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let clients = self
            .clients
            .read()
            .map_err(|e| StorageError::LockPoisoned(format!("clients: {}", e)))?;
        Ok(clients.get(client_id).cloned())
    }
}

#[async_trait]
impl CredentialStore for MemoryOAuthStorage {
    async fn store_credential(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|e| StorageError::LockPoisoned(format!("credentials: {}", e)))?;
        credentials.insert(credential.client_id.clone(), credential.clone());
        Ok(())
    }

    async fn get_credential(&self, client_id: &str) -> Result<Option<Credential>> {
        let credentials = self
            .credentials
            .read()
            .map_err(|e| StorageError::LockPoisoned(format!("credentials: {}", e)))?;
        Ok(credentials.get(client_id).cloned())
    }

    async fn remove_credential(&self, client_id: &str) -> Result<()> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|e| StorageError::LockPoisoned(format!("credentials: {}", e)))?;
        credentials.remove(client_id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryOAuthStorage {
    async fn create_token(
        &self,
        kind: TokenKind,
        client_id: &str,
        user_id: &str,
        ttl: Duration,
    ) -> Result<Token> {
        if ttl <= Duration::zero() {
            return Err(StorageError::InvalidData(format!(
                "Token lifetime must be positive, got {}",
                ttl
            )));
        }

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::InvalidData("Token lifetime out of range".to_string()))?;

        let mut tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;

        // Values are unique among stored tokens
        let mut value = generate_token();
        while tokens.contains_key(&value) {
            value = generate_token();
        }

        let token = Token {
            value: value.clone(),
            kind,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at,
        };
        tokens.insert(value, token.clone());

        Ok(token)
    }

    async fn load_token(&self, value: &str) -> Result<Option<Token>> {
        let tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;

        match tokens.get(value) {
            Some(token) if !token.is_expired() => Ok(Some(token.clone())),
            _ => Ok(None),
        }
    }

    async fn consume_token(&self, value: &str, kind: TokenKind) -> Result<Option<Token>> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;

        let live = match tokens.get(value) {
            Some(token) if token.kind == kind => !token.is_expired(),
            _ => return Ok(None),
        };

        let token = tokens.remove(value);
        if live { Ok(token) } else { Ok(None) }
    }

    async fn revoke_token(&self, value: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;
        tokens.remove(value);
        Ok(())
    }

    async fn cleanup_expired_tokens(&self) -> Result<usize> {
        let mut tokens = self
            .tokens
            .lock()
            .map_err(|e| StorageError::LockPoisoned(format!("tokens: {}", e)))?;

        let now = Utc::now();
        let initial_count = tokens.len();
        tokens.retain(|_, token| !token.is_expired_at(now));

        Ok(initial_count - tokens.len())
    }
}
