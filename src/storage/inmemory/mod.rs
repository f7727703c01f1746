//! In-memory storage implementations
//!
//! This module provides in-memory implementations of all storage traits.

mod oauth;

pub use oauth::MemoryOAuthStorage;
