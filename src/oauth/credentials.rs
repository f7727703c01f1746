//! Resource-owner password verification for the password grant.

use std::sync::Arc;

use crate::errors::OAuthError;
use crate::storage::traits::{CredentialStore, OAuthStorage};

/// Checks resource-owner passwords against the configured credential table.
///
/// Credentials are keyed by client id only. The username is not looked up; it is
/// carried along for diagnostics, and the resolved user id is the client id.
#[derive(Clone)]
pub struct CredentialVerifier {
    storage: Arc<dyn OAuthStorage>,
}

impl CredentialVerifier {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }

    /// Verify a password and resolve the user id it authenticates.
    pub async fn verify(
        &self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<String, OAuthError> {
        let credential = self.storage.get_credential(client_id).await?;

        match credential {
            Some(credential) if credential.password == password => Ok(credential.client_id),
            Some(_) => {
                tracing::debug!(%client_id, %username, "password mismatch");
                Err(OAuthError::AccessDenied(format!("{:?}", username)))
            }
            None => {
                tracing::debug!(%client_id, %username, "password grant not enabled for client");
                Err(OAuthError::AccessDenied(format!("{:?}", username)))
            }
        }
    }
}
