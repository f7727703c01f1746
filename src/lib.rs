//! Isolenta library crate.
//!
//! Provides a small OAuth 2 authorization server: a client registry, a volatile
//! token store, and the grant engine behind the `/authorize`, `/token` and
//! `/userinfo` endpoints.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
