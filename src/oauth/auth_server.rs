//! OAuth 2 authorization server handling the authorization and token endpoints.
//!
//! Supports the authorization code grant (with `code` and `token` response types),
//! the resource owner password grant, and refresh token reissuance.

use crate::errors::OAuthError;
use crate::oauth::{credentials::CredentialVerifier, registry::ClientRegistry, types::*};
use crate::storage::traits::{OAuthStorage, TokenStore};
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use url::{Url, form_urlencoded};

/// How long each kind of issued token stays valid
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub authorization_code: Duration,
    pub access_token: Duration,
    pub refresh_token: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            authorization_code: Duration::minutes(10),
            access_token: Duration::hours(2),
            refresh_token: Duration::days(3),
        }
    }
}

/// OAuth 2 Authorization Server
pub struct AuthorizationServer {
    storage: Arc<dyn OAuthStorage>,
    registry: ClientRegistry,
    verifier: CredentialVerifier,
    lifetimes: TokenLifetimes,
}

impl AuthorizationServer {
    /// Create a new authorization server
    pub fn new(storage: Arc<dyn OAuthStorage>, lifetimes: TokenLifetimes) -> Self {
        Self {
            registry: ClientRegistry::new(storage.clone()),
            verifier: CredentialVerifier::new(storage.clone()),
            storage,
            lifetimes,
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Handle authorization requests (RFC 6749 Sections 4.1.1 and 4.2.1)
    ///
    /// Requests are approved without an interactive consent step.
    pub async fn authorize(&self, query: AuthorizeQuery) -> Result<AuthorizeResponse, OAuthError> {
        let client_id = query.client_id.as_deref().unwrap_or_default();
        if client_id.is_empty() {
            return Err(OAuthError::MissingClientId);
        }

        let response_type: ResponseType = query.response_type.as_deref().unwrap_or_default().parse()?;

        let user_id = self.resolve_user(client_id);

        let client = self.registry.lookup(client_id).await?;

        let mut redirect_url = resolve_redirect_uri(&client, query.redirect_uri.as_deref())?;

        match response_type {
            ResponseType::Code => {
                let code = self
                    .storage
                    .create_token(
                        TokenKind::AuthorizationCode,
                        &client.id,
                        &user_id,
                        self.lifetimes.authorization_code,
                    )
                    .await?;

                tracing::info!(client_id = %client.id, %user_id, code = %code.redacted(), "issued authorization code");

                redirect_url.query_pairs_mut().append_pair("code", &code.value);
                if let Some(state) = query.state.as_deref() {
                    redirect_url.query_pairs_mut().append_pair("state", state);
                }
            }
            ResponseType::Token => {
                let access_token = self
                    .storage
                    .create_token(
                        TokenKind::AccessToken,
                        &client.id,
                        &user_id,
                        self.lifetimes.access_token,
                    )
                    .await?;

                tracing::info!(client_id = %client.id, %user_id, token = %access_token.redacted(), "issued implicit access token");

                let mut fragment = form_urlencoded::Serializer::new(String::new());
                fragment
                    .append_pair("access_token", &access_token.value)
                    .append_pair("token_type", "Bearer")
                    .append_pair(
                        "expires_in",
                        &access_token.expires_in(access_token.issued_at).to_string(),
                    );
                if let Some(state) = query.state.as_deref() {
                    fragment.append_pair("state", state);
                }
                redirect_url.set_fragment(Some(&fragment.finish()));
            }
        }

        Ok(AuthorizeResponse::Redirect(redirect_url.to_string()))
    }

    /// Decide which resource owner an authorization request acts for.
    ///
    /// There are no user sessions: the owner is the client itself.
    // TODO: bind to an authenticated session once a login/consent page exists.
    fn resolve_user(&self, client_id: &str) -> String {
        client_id.to_string()
    }

    /// Handle token requests (RFC 6749 Section 4.1.3, 4.3.2 and 6)
    pub async fn token(
        &self,
        request: TokenRequest,
        client_auth: ClientAuthentication,
    ) -> Result<TokenResponse, OAuthError> {
        match request.grant_type {
            GrantType::AuthorizationCode => {
                self.handle_authorization_code_grant(request, client_auth)
                    .await
            }
            GrantType::Password => self.handle_password_grant(request, client_auth).await,
            GrantType::RefreshToken => {
                self.handle_refresh_token_grant(request, client_auth)
                    .await
            }
        }
    }

    /// Handle authorization code grant
    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
        client_auth: ClientAuthentication,
    ) -> Result<TokenResponse, OAuthError> {
        let code = request
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing authorization code".to_string()))?;

        // Authenticate the presenting client, if it identified itself
        if let Some(client_id) = client_auth.client_id.as_deref() {
            self.registry
                .authenticate(client_id, client_auth.client_secret.as_deref())
                .await?;
        }

        // Consume authorization code; a second exchange finds nothing
        let auth_code = self
            .storage
            .consume_token(code, TokenKind::AuthorizationCode)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid authorization code".to_string()))?;

        if let Some(client_id) = client_auth.client_id.as_deref() {
            if client_id != auth_code.client_id {
                return Err(OAuthError::InvalidGrant(
                    "Authorization code was issued to another client".to_string(),
                ));
            }
        }

        let client = self.registry.lookup(&auth_code.client_id).await?;

        self.issue_tokens(&client.id, &auth_code.user_id, GrantType::AuthorizationCode)
            .await
    }

    /// Handle resource owner password credentials grant
    async fn handle_password_grant(
        &self,
        request: TokenRequest,
        client_auth: ClientAuthentication,
    ) -> Result<TokenResponse, OAuthError> {
        let client_id = client_auth
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing client_id".to_string()))?;

        let username = request
            .username
            .as_deref()
            .filter(|username| !username.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing username".to_string()))?;

        let password = request
            .password
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("Missing password".to_string()))?;

        let client = self
            .registry
            .authenticate(client_id, client_auth.client_secret.as_deref())
            .await?;

        let user_id = self
            .verifier
            .verify(&client.id, username, password)
            .await
            .inspect_err(|e| {
                tracing::warn!(client_id = %client.id, %username, error = %e, "password grant denied");
            })?;

        self.issue_tokens(&client.id, &user_id, GrantType::Password)
            .await
    }

    /// Handle refresh token grant
    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
        client_auth: ClientAuthentication,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = request
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh token".to_string()))?;

        if let Some(client_id) = client_auth.client_id.as_deref() {
            self.registry
                .authenticate(client_id, client_auth.client_secret.as_deref())
                .await?;
        }

        let refresh_token_record = self
            .storage
            .consume_token(refresh_token, TokenKind::RefreshToken)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("Invalid refresh token".to_string()))?;

        if let Some(client_id) = client_auth.client_id.as_deref() {
            if client_id != refresh_token_record.client_id {
                return Err(OAuthError::InvalidGrant(
                    "Refresh token was issued to another client".to_string(),
                ));
            }
        }

        self.issue_tokens(
            &refresh_token_record.client_id,
            &refresh_token_record.user_id,
            GrantType::RefreshToken,
        )
        .await
    }

    /// Mint an access token and a companion refresh token
    async fn issue_tokens(
        &self,
        client_id: &str,
        user_id: &str,
        grant_type: GrantType,
    ) -> Result<TokenResponse, OAuthError> {
        let access_token = self
            .storage
            .create_token(
                TokenKind::AccessToken,
                client_id,
                user_id,
                self.lifetimes.access_token,
            )
            .await?;

        let refresh_token = self
            .storage
            .create_token(
                TokenKind::RefreshToken,
                client_id,
                user_id,
                self.lifetimes.refresh_token,
            )
            .await?;

        tracing::info!(
            %client_id,
            %user_id,
            ?grant_type,
            token = %access_token.redacted(),
            "issued access token"
        );

        Ok(TokenResponse::new(&access_token, Some(&refresh_token)))
    }
}

/// Build the redirect target for a client.
///
/// Without a `redirect_uri` the registered domain is used. A supplied
/// `redirect_uri` must point at the same host and port as the registered domain.
pub fn resolve_redirect_uri(client: &Client, redirect_uri: Option<&str>) -> Result<Url, OAuthError> {
    let base = domain_url(&client.domain).map_err(|e| {
        OAuthError::ServerError(format!(
            "Client {:?} has an unusable domain {:?}: {}",
            client.id, client.domain, e
        ))
    })?;

    let Some(redirect_uri) = redirect_uri.filter(|uri| !uri.is_empty()) else {
        return Ok(base);
    };

    let redirect = Url::parse(redirect_uri)
        .map_err(|e| OAuthError::InvalidRequest(format!("Invalid redirect URI: {}", e)))?;

    if redirect.host_str() != base.host_str()
        || redirect.port_or_known_default() != base.port_or_known_default()
    {
        return Err(OAuthError::InvalidRequest(
            "Redirect URI does not match the registered domain".to_string(),
        ));
    }

    Ok(redirect)
}

/// Parse a registered domain, which may omit its scheme
fn domain_url(domain: &str) -> Result<Url, url::ParseError> {
    if domain.contains("://") {
        Url::parse(domain)
    } else {
        Url::parse(&format!("http://{}", domain))
    }
}

/// Authorization response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeResponse {
    Redirect(String),
}

/// Query parameters for authorization endpoint
#[derive(Default, Deserialize)]
#[cfg_attr(any(debug_assertions, test), derive(Debug))]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

/// Form data for token endpoint
#[derive(Default, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub grant_type: String,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl std::fmt::Debug for TokenForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenForm")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl TryFrom<TokenForm> for TokenRequest {
    type Error = OAuthError;

    fn try_from(form: TokenForm) -> Result<Self, Self::Error> {
        Ok(Self {
            grant_type: form.grant_type.parse()?,
            code: form.code,
            refresh_token: form.refresh_token,
            username: form.username,
            password: form.password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::storage::MemoryOAuthStorage;

    async fn test_server() -> (Arc<MemoryOAuthStorage>, AuthorizationServer) {
        let storage = Arc::new(MemoryOAuthStorage::new());
        let auth_server = AuthorizationServer::new(storage.clone(), TokenLifetimes::default());
        auth_server
            .registry()
            .register(
                Client::new("1234", "test-secret", "localhost:8080"),
                Some("test-password".to_string()),
            )
            .await
            .unwrap();
        (storage, auth_server)
    }

    fn code_query(client_id: &str) -> AuthorizeQuery {
        AuthorizeQuery {
            response_type: Some("code".to_string()),
            client_id: Some(client_id.to_string()),
            ..Default::default()
        }
    }

    fn extract_param(url: &str, name: &str) -> Option<String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.to_string())
    }

    fn password_request(password: &str) -> TokenRequest {
        TokenRequest {
            grant_type: GrantType::Password,
            code: None,
            refresh_token: None,
            username: Some("anything".to_string()),
            password: Some(password.to_string()),
        }
    }

    fn client_auth(client_id: &str) -> ClientAuthentication {
        ClientAuthentication {
            client_id: Some(client_id.to_string()),
            client_secret: None,
        }
    }

    #[tokio::test]
    async fn test_authorization_code_flow() {
        let (storage, auth_server) = test_server().await;

        let mut query = code_query("1234");
        query.state = Some("xyz".to_string());
        let AuthorizeResponse::Redirect(url) = auth_server.authorize(query).await.unwrap();

        assert!(url.starts_with("http://localhost:8080/"));
        assert_eq!(extract_param(&url, "state").as_deref(), Some("xyz"));
        let code = extract_param(&url, "code").expect("code in redirect");

        let stored = storage.load_token(&code).await.unwrap().unwrap();
        assert_eq!(stored.kind, TokenKind::AuthorizationCode);
        assert_eq!(stored.expires_at - stored.issued_at, Duration::minutes(10));

        let request = TokenRequest {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code.clone()),
            refresh_token: None,
            username: None,
            password: None,
        };
        let response = auth_server
            .token(request.clone(), ClientAuthentication::default())
            .await
            .unwrap();

        assert!(!response.access_token.is_empty());
        assert_eq!(response.token_type, TokenType::Bearer);
        assert_eq!(response.expires_in, 7200);
        assert!(response.refresh_token.is_some());

        let access = storage.load_token(&response.access_token).await.unwrap().unwrap();
        assert_eq!(access.kind, TokenKind::AccessToken);
        assert_eq!(access.client_id, "1234");
        assert_eq!(access.user_id, "1234");

        // The code is gone after one exchange
        assert!(storage.load_token(&code).await.unwrap().is_none());
        let err = auth_server
            .token(request, ClientAuthentication::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));
        assert_eq!(err.kind(), ErrorKind::Denied);
    }

    #[tokio::test]
    async fn test_implicit_token_response_type() {
        let (storage, auth_server) = test_server().await;

        let query = AuthorizeQuery {
            response_type: Some("token".to_string()),
            client_id: Some("1234".to_string()),
            redirect_uri: Some("http://localhost:8080/callback".to_string()),
            state: Some("s1".to_string()),
        };
        let AuthorizeResponse::Redirect(url) = auth_server.authorize(query).await.unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/callback");
        let fragment: Vec<(String, String)> =
            form_urlencoded::parse(parsed.fragment().unwrap().as_bytes())
                .into_owned()
                .collect();
        let access_token = fragment
            .iter()
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(fragment.contains(&("token_type".to_string(), "Bearer".to_string())));
        assert!(fragment.contains(&("state".to_string(), "s1".to_string())));

        let token = storage.load_token(&access_token).await.unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::AccessToken);
    }

    #[tokio::test]
    async fn test_authorize_rejections() {
        let (_storage, auth_server) = test_server().await;

        let err = auth_server.authorize(code_query("")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.error_code(), "access_denied");
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);

        let err = auth_server
            .authorize(AuthorizeQuery {
                response_type: Some("code".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::MissingClientId));

        let err = auth_server.authorize(code_query("unknown")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Denied);

        let mut query = code_query("1234");
        query.response_type = Some("id_token".to_string());
        let err = auth_server.authorize(query).await.unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedResponseType(_)));

        let mut query = code_query("1234");
        query.redirect_uri = Some("https://evil.example.com/callback".to_string());
        let err = auth_server.authorize(query).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_password_grant() {
        let (storage, auth_server) = test_server().await;

        let response = auth_server
            .token(password_request("test-password"), client_auth("1234"))
            .await
            .unwrap();
        let token = storage.load_token(&response.access_token).await.unwrap().unwrap();
        assert_eq!(token.user_id, "1234");
        assert_eq!(token.client_id, "1234");

        let err = auth_server
            .token(password_request("wrong"), client_auth("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::AccessDenied(_)));

        let err = auth_server
            .token(password_request("test-password"), client_auth("5678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Denied);

        let err = auth_server
            .token(password_request("test-password"), ClientAuthentication::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_password_grant_client_secret() {
        let (_storage, auth_server) = test_server().await;

        let auth = ClientAuthentication {
            client_id: Some("1234".to_string()),
            client_secret: Some("test-secret".to_string()),
        };
        assert!(
            auth_server
                .token(password_request("test-password"), auth)
                .await
                .is_ok()
        );

        let auth = ClientAuthentication {
            client_id: Some("1234".to_string()),
            client_secret: Some("not-the-secret".to_string()),
        };
        let err = auth_server
            .token(password_request("test-password"), auth)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient(_)));
    }

    #[tokio::test]
    async fn test_code_bound_to_client() {
        let (_storage, auth_server) = test_server().await;
        auth_server
            .registry()
            .register(Client::new("5678", "", "localhost:9090"), None)
            .await
            .unwrap();

        let AuthorizeResponse::Redirect(url) =
            auth_server.authorize(code_query("1234")).await.unwrap();
        let code = extract_param(&url, "code").unwrap();

        let request = TokenRequest {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code),
            refresh_token: None,
            username: None,
            password: None,
        };
        let err = auth_server
            .token(request, client_auth("5678"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_grant() {
        let (storage, auth_server) = test_server().await;

        let first = auth_server
            .token(password_request("test-password"), client_auth("1234"))
            .await
            .unwrap();
        let refresh_token = first.refresh_token.clone().unwrap();

        let request = TokenRequest {
            grant_type: GrantType::RefreshToken,
            code: None,
            refresh_token: Some(refresh_token.clone()),
            username: None,
            password: None,
        };
        let second = auth_server
            .token(request.clone(), ClientAuthentication::default())
            .await
            .unwrap();
        assert_ne!(second.access_token, first.access_token);
        assert_ne!(second.refresh_token, first.refresh_token);

        let token = storage.load_token(&second.access_token).await.unwrap().unwrap();
        assert_eq!(token.user_id, "1234");

        // Refresh tokens are single use
        let err = auth_server
            .token(request, ClientAuthentication::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));

        // An access token cannot be used as a refresh token
        let request = TokenRequest {
            grant_type: GrantType::RefreshToken,
            code: None,
            refresh_token: Some(second.access_token),
            username: None,
            password: None,
        };
        let err = auth_server
            .token(request, ClientAuthentication::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn test_expired_code_is_invalid_grant() {
        let storage = Arc::new(MemoryOAuthStorage::new());
        let auth_server = AuthorizationServer::new(
            storage.clone(),
            TokenLifetimes {
                authorization_code: Duration::milliseconds(20),
                ..TokenLifetimes::default()
            },
        );
        auth_server
            .registry()
            .register(Client::new("1234", "", "localhost:8080"), None)
            .await
            .unwrap();

        let AuthorizeResponse::Redirect(url) =
            auth_server.authorize(code_query("1234")).await.unwrap();
        let code = extract_param(&url, "code").unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let request = TokenRequest {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code),
            refresh_token: None,
            username: None,
            password: None,
        };
        let err = auth_server
            .token(request, ClientAuthentication::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidGrant(_)));
    }

    #[test]
    fn test_token_form_conversion() {
        let form = TokenForm {
            grant_type: "password".to_string(),
            username: Some("alice".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        let request = TokenRequest::try_from(form).unwrap();
        assert_eq!(request.grant_type, GrantType::Password);

        let form = TokenForm {
            grant_type: "client_credentials".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            TokenRequest::try_from(form),
            Err(OAuthError::UnsupportedGrantType(_))
        ));
    }

    #[test]
    fn test_resolve_redirect_uri() {
        let client = Client::new("1234", "", "localhost:8080");
        assert_eq!(
            resolve_redirect_uri(&client, None).unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert_eq!(
            resolve_redirect_uri(&client, Some("http://localhost:8080/cb?x=1"))
                .unwrap()
                .as_str(),
            "http://localhost:8080/cb?x=1"
        );
        assert!(resolve_redirect_uri(&client, Some("http://localhost:9999/cb")).is_err());
        assert!(resolve_redirect_uri(&client, Some("not a url")).is_err());

        let client = Client::new("1234", "", "https://app.example.com");
        assert!(resolve_redirect_uri(&client, Some("https://app.example.com/cb")).is_ok());
        assert!(resolve_redirect_uri(&client, Some("http://app.example.com/cb")).is_err());
    }
}
