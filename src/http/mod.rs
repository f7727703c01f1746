//! Axum HTTP server handlers for the OAuth 2 endpoints.

pub mod context;
mod handler_authorize;
mod handler_token;
mod handler_userinfo;
pub mod listener;
pub mod server;
mod utils_oauth;

pub use context::AppState;
pub use listener::serve;
pub use server::build_router;
