//! Request parsing helpers shared by the OAuth handlers.

use axum::http::HeaderMap;
use base64::prelude::*;
use url::form_urlencoded;

use crate::errors::OAuthError;
use crate::oauth::{ClientAuthentication, TokenForm};

/// Extract client authentication from the Authorization header or the form.
///
/// HTTP Basic credentials take precedence over `client_id`/`client_secret` form
/// fields (RFC 6749 Section 2.3.1). A malformed Basic header is `invalid_client`.
pub fn extract_client_auth(
    headers: &HeaderMap,
    form: &TokenForm,
) -> Result<ClientAuthentication, OAuthError> {
    if let Some((client_id, client_secret)) = basic_credentials(headers)? {
        if let Some(form_client_id) = form.client_id.as_deref() {
            if form_client_id != client_id {
                return Err(OAuthError::InvalidRequest(
                    "client_id does not match the Authorization header".to_string(),
                ));
            }
        }
        return Ok(ClientAuthentication {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
        });
    }

    // Fall back to form parameters
    Ok(ClientAuthentication {
        client_id: form.client_id.clone().filter(|id| !id.is_empty()),
        client_secret: form.client_secret.clone().filter(|secret| !secret.is_empty()),
    })
}

/// Decode `Authorization: Basic` credentials, if the header is present
fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, OAuthError> {
    let Some(auth_header) = headers.get(http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let Some(encoded) = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Basic "))
    else {
        return Ok(None);
    };

    let malformed = || OAuthError::InvalidClient("Malformed Basic authorization header".to_string());

    let decoded = BASE64_STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let credentials = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (client_id, client_secret) = credentials.split_once(':').ok_or_else(malformed)?;

    Ok(Some((form_decode(client_id), form_decode(client_secret))))
}

/// Undo the form-urlencoding applied to Basic credentials
fn form_decode(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(key, rest)| {
            if rest.is_empty() {
                key.into_owned()
            } else {
                format!("{}={}", key, rest)
            }
        })
        .unwrap_or_default()
}

/// Extract a bearer token from the Authorization header or a query parameter.
///
/// The scheme name is matched case-insensitively (RFC 7235 Section 2.1). A request
/// carrying no token at all is `invalid_token`, like an unknown one.
pub fn extract_access_token(
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<String, OAuthError> {
    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|e| {
            OAuthError::InvalidRequest(format!("Invalid Authorization header: {}", e))
        })?;

        if let Some((scheme, token)) = auth_str.split_once(' ') {
            if scheme.eq_ignore_ascii_case("Bearer") {
                return Ok(token.trim().to_string());
            }
        }
    }

    query_token
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .ok_or_else(|| OAuthError::InvalidToken("Missing access token".to_string()))
}
