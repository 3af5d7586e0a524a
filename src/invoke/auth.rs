//! API key extraction.
//!
//! Clients pass their Invocation Service key as
//! `Authorization: Bearer <uuid>:<secret>`; the proxy presents it to the
//! service as HTTP basic credentials.

use axum::http::{header, HeaderMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,

    #[error("invalid authorization header: expected 'Bearer <uuid>:<key>'")]
    Malformed,
}

/// An Invocation Service API key split into its basic-auth halves.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub user: String,
    pub secret: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("user", &self.user)
            .field("secret", &"***")
            .finish()
    }
}

/// Extract the API key from the request headers.
pub fn extract_api_key(headers: &HeaderMap) -> Result<ApiKey, AuthError> {
    let value = headers.get(header::AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value.to_str().map_err(|_| AuthError::Malformed)?.trim();

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed);
    }

    match token.trim().split_once(':') {
        Some((user, secret)) if !user.is_empty() && !secret.is_empty() => Ok(ApiKey {
            user: user.to_string(),
            secret: secret.to_string(),
        }),
        _ => Err(AuthError::Malformed),
    }
}
