//! Shared-secret check for the service endpoints.
//!
//! Callers put the secret in the `APISECRET` header. Both sides are hashed
//! with SHA-512 before a constant-time comparison, so neither the content
//! nor the length of the secret leaks through timing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::{ServerError, server::ServerState};

pub(crate) static APISECRET_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("apisecret");

#[derive(Clone)]
pub struct ApiSecret {
    digest: Vec<u8>,
}

impl ApiSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha512::digest(secret.as_bytes()).to_vec(),
        }
    }

    pub fn matches(&self, presented: &[u8]) -> bool {
        let digest = Sha512::digest(presented);
        digest.as_slice().ct_eq(self.digest.as_slice()).into()
    }
}

impl std::fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiSecret(..)")
    }
}

/// A missing header counts as the empty string.
pub(crate) async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let presented = request
        .headers()
        .get(&APISECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if !state.api_secret.matches(presented) {
        tracing::warn!("Called with invalid API key");
        return Err(ServerError::Forbidden("Invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}
