//! Handles POST /token - Exchanges grants for bearer access tokens

use axum::{
    Form, Json,
    extract::{Query, State, rejection::FormRejection},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};

use super::{context::AppState, utils_oauth::extract_client_auth};
use crate::errors::OAuthError;
use crate::oauth::{TokenForm, TokenRequest};

/// Handle OAuth token requests
/// POST /token - Form-encoded grant request
pub async fn handle_oauth_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Response, OAuthError> {
    let Form(form) = form.map_err(|e| OAuthError::InvalidRequest(e.body_text()))?;
    exchange(&state, &headers, form).await
}

/// Handle OAuth token requests carried in the query string
/// GET /token - Same parameters as the POST form
pub async fn handle_oauth_token_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(form): Query<TokenForm>,
) -> Result<Response, OAuthError> {
    exchange(&state, &headers, form).await
}

async fn exchange(
    state: &AppState,
    headers: &HeaderMap,
    form: TokenForm,
) -> Result<Response, OAuthError> {
    tracing::debug!(?form, "token request");

    // Extract client authentication from Authorization header or form
    let client_auth = extract_client_auth(headers, &form)?;
    let request = TokenRequest::try_from(form)?;

    let response = state.auth_server.token(request, client_auth).await?;

    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response())
}
