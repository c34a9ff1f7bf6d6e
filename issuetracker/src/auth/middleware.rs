//! Per-request authentication.
//!
//! [`authenticate`] runs in front of every API route. It never rejects a
//! request: a missing, malformed, tampered or expired token, or a subject that
//! no longer exists, all leave the request anonymous. Rejection happens later,
//! in the guard, for routes that need a principal.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, instrument, trace, warn};

use crate::{
    AppState,
    auth::{current_user::RequestContext, principal::ResolveError, token::TokenError},
    types::abbrev_uuid,
};

/// Middleware that establishes the [`RequestContext`] for the request.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let ctx = establish_context(&state, request.headers()).await;
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

/// Work out who is calling from the request headers.
#[instrument(skip_all)]
pub(crate) async fn establish_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let Some(token) = bearer_token(headers) else {
        trace!("No bearer token presented");
        return RequestContext::anonymous();
    };

    let claims = match state.token_codec.validate(token, state.clock.now()) {
        Ok(claims) => claims,
        Err(e @ TokenError::SignatureMismatch) => {
            warn!(kind = %e, "Rejected bearer token");
            return RequestContext::anonymous();
        }
        Err(e) => {
            debug!(kind = %e, "Rejected bearer token");
            return RequestContext::anonymous();
        }
    };

    match state.resolver.resolve(&claims.sub).await {
        Ok(principal) => {
            debug!(user_id = %abbrev_uuid(&principal.id), "Authenticated request");
            RequestContext::authenticated(principal)
        }
        Err(ResolveError::UserNotFound) => {
            debug!(kind = "user not found", "Token subject did not resolve");
            RequestContext::anonymous()
        }
        Err(ResolveError::Store(e)) => {
            error!(error = %e, "Failed to resolve token subject");
            RequestContext::anonymous()
        }
    }
}

/// The token from an `Authorization: Bearer <token>` header, if there is one.
///
/// Other schemes and unreadable header values count as no token.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?;
    let value = match value.to_str() {
        Ok(v) => v,
        Err(_) => {
            debug!("Authorization header is not valid UTF-8");
            return None;
        }
    };

    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        debug!(scheme, "Ignoring non-bearer authorization scheme");
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
