//! Handles GET /authorize - Issues authorization codes or implicit access tokens

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::context::AppState;
use crate::errors::OAuthError;
use crate::oauth::{AuthorizeQuery, AuthorizeResponse};

/// Handle OAuth authorization requests
/// GET /authorize - Redirects to the client's domain carrying a code or token
pub async fn handle_oauth_authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, OAuthError> {
    match state.auth_server.authorize(query).await? {
        AuthorizeResponse::Redirect(url) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
        }
    }
}
