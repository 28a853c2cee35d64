//! Authentication module for session token verification.

mod extractor;

pub use extractor::SessionAuth;

/// Header scheme used by the REST API and the WebSocket upgrade.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Pull the bearer token out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix(BEARER_PREFIX).filter(|t| !t.is_empty())
}
