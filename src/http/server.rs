//! Main router configuration assembling the OAuth endpoints.

use axum::{
    Router,
    routing::get,
};
use tower_http::trace::TraceLayer;

use super::{
    context::AppState,
    handler_authorize::handle_oauth_authorize,
    handler_token::{handle_oauth_token, handle_oauth_token_query},
    handler_userinfo::get_userinfo_handler,
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    Router::new()
        .route("/authorize", get(handle_oauth_authorize))
        .route(
            "/token",
            get(handle_oauth_token_query).post(handle_oauth_token),
        )
        .route("/userinfo", get(get_userinfo_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
