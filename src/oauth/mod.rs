//! OAuth 2 authorization server core: client registry, credential checks, grant
//! engine and token introspection.

pub mod auth_server;
pub mod credentials;
pub mod introspection;
pub mod registry;
pub mod types;

// Re-export frequently used items from each module
pub use crate::storage::{
    inmemory::MemoryOAuthStorage,
    traits::{ClientStore, CredentialStore, OAuthStorage, TokenStore},
};
pub use auth_server::{
    AuthorizationServer, AuthorizeQuery, AuthorizeResponse, TokenForm, TokenLifetimes,
};
pub use credentials::CredentialVerifier;
pub use introspection::TokenIntrospector;
pub use registry::ClientRegistry;
pub use types::{
    Client, ClientAuthentication, Credential, GrantType, OAuthErrorResponse, ResponseType, Token,
    TokenClaims, TokenKind, TokenRequest, TokenResponse, TokenType, generate_token,
};
