//! Application state shared by all request handlers.

use std::sync::Arc;

use crate::oauth::{AuthorizationServer, TokenIntrospector};

#[derive(Clone)]
pub struct AppState {
    /// Grant engine behind `/authorize` and `/token`
    pub auth_server: Arc<AuthorizationServer>,
    /// Token lookup behind `/userinfo`
    pub introspector: TokenIntrospector,
}
