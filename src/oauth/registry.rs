//! Registry of client applications known to the server.

use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::types::{Client, Credential};
use crate::storage::traits::{ClientStore, CredentialStore, OAuthStorage};

/// Client registry backed by the shared storage.
///
/// Registration happens once at startup; afterwards clients are read-only.
#[derive(Clone)]
pub struct ClientRegistry {
    storage: Arc<dyn OAuthStorage>,
}

impl ClientRegistry {
    pub fn new(storage: Arc<dyn OAuthStorage>) -> Self {
        Self { storage }
    }

    /// Register a client, replacing any client with the same id, together with
    /// the resource-owner password that enables the password grant for it.
    pub async fn register(&self, client: Client, password: Option<String>) -> Result<(), OAuthError> {
        if client.id.is_empty() {
            return Err(OAuthError::InvalidRequest(
                "Client id must not be empty".to_string(),
            ));
        }

        self.storage.store_client(&client).await?;

        match password.filter(|p| !p.is_empty()) {
            Some(password) => {
                self.storage
                    .store_credential(&Credential {
                        client_id: client.id.clone(),
                        password,
                    })
                    .await?
            }
            None => self.storage.remove_credential(&client.id).await?,
        }

        tracing::debug!(client_id = %client.id, domain = %client.domain, "registered client");
        Ok(())
    }

    /// Look up a client by id; unknown ids are `invalid_client`.
    pub async fn lookup(&self, client_id: &str) -> Result<Client, OAuthError> {
        self.storage
            .get_client(client_id)
            .await?
            .ok_or_else(|| OAuthError::InvalidClient(format!("Client {:?} not found", client_id)))
    }

    /// Look up a client and check a presented secret against the registered one.
    ///
    /// A client presenting no secret is accepted; a presented secret that does not
    /// match a confidential client's secret is `invalid_client`. Public clients
    /// have nothing to check against.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<Client, OAuthError> {
        let client = self.lookup(client_id).await?;

        if let Some(provided_secret) = client_secret.filter(|_| client.is_confidential()) {
            if provided_secret != client.secret {
                return Err(OAuthError::InvalidClient(format!(
                    "Invalid client secret for {:?}",
                    client_id
                )));
            }
        }

        Ok(client)
    }
}
