//! Handles GET /userinfo - Reports the claims bound to an access token

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;

use super::{context::AppState, utils_oauth::extract_access_token};
use crate::errors::OAuthError;
use crate::oauth::TokenClaims;

#[derive(Default, Deserialize)]
pub struct UserinfoQuery {
    pub access_token: Option<String>,
}

/// Get the claims of an access token
/// GET /userinfo?access_token=... or with `Authorization: Bearer ...`
pub async fn get_userinfo_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserinfoQuery>,
) -> Result<Json<TokenClaims>, OAuthError> {
    let access_token = extract_access_token(&headers, query.access_token.as_deref())?;

    let claims = state.introspector.introspect(&access_token).await?;
    tracing::debug!(client_id = %claims.client_id, user_id = %claims.user_id, "userinfo");

    Ok(Json(claims))
}
