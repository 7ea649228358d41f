//! Bearer token authentication
//!
//! Provides:
//! - `authenticate` middleware that attaches an [`Identity`] to every request
//! - `ClaimSet` extractor for handlers
//!
//! Authentication never rejects a request on its own. A missing or invalid
//! token yields an anonymous identity and the authorization layer decides.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

use crate::policy::{ClaimSet, Identity};
use crate::state::HasAuthz;

/// Reasons a bearer token could not be extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerError {
    /// No Authorization header present
    Missing,
    /// Header present but not a usable `Bearer` credential
    Malformed,
}

/// Extract the Bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(BearerError::Missing)?
        .to_str()
        .map_err(|_| BearerError::Malformed)?;

    let (scheme, token) = value.split_once(' ').ok_or(BearerError::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(BearerError::Malformed);
    }
    Ok(token)
}

/// Resolve the caller's identity from request headers
pub fn identify<S: HasAuthz>(state: &S, headers: &HeaderMap) -> Identity {
    let token = match extract_bearer_token(headers) {
        Ok(token) => token,
        Err(BearerError::Missing) => return Identity::anonymous(),
        Err(BearerError::Malformed) => {
            tracing::debug!("Malformed Authorization header; treating caller as anonymous");
            return Identity::anonymous();
        }
    };

    match state.jwt_manager().verify_identity(token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected; treating caller as anonymous");
            Identity::anonymous()
        }
    }
}

/// Authentication middleware; install with `axum::middleware::from_fn_with_state`.
pub async fn authenticate<S: HasAuthz>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = identify(&state, request.headers());
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Handler access to the caller's claims.
///
/// Prefers the set already built by the authorization layer; otherwise reads
/// it from the identity attached by [`authenticate`].
impl<S> FromRequestParts<S> for ClaimSet
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<ClaimSet>() {
            return Ok(claims.clone());
        }
        Ok(ClaimSet::from_identity(parts.extensions.get::<Identity>()))
    }
}
