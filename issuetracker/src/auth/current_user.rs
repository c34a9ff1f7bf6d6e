//! Extractors for the request-scoped identity.
//!
//! The authenticate middleware leaves a [`RequestContext`] in the request
//! extensions. Handlers either take the context itself (optional auth) or
//! [`CurrentPrincipal`], which rejects anonymous requests with 401.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use crate::{
    auth::{guard, principal::Principal},
    errors::Error,
};

/// Identity of one request. Owned by that request and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// The principal established for this request, if any.
    pub fn current_principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Routes outside the authenticate layer are simply anonymous
        let ctx = parts.extensions.get::<RequestContext>().cloned().unwrap_or_else(|| {
            trace!("No request context in extensions");
            RequestContext::anonymous()
        });
        Ok(ctx)
    }
}

/// The authenticated principal; rejects with 401 when there is none.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(ctx) = RequestContext::from_request_parts(parts, state).await;
        let principal = guard::require_authenticated(&ctx)?;
        Ok(CurrentPrincipal(principal.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use axum::http::{Request, StatusCode};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn alice() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            roles: BTreeSet::from([Role::User]),
        }
    }

    #[tokio::test]
    async fn test_context_from_extensions() {
        let principal = alice();
        let mut request = Request::builder().uri("/").body(()).unwrap();
        request.extensions_mut().insert(RequestContext::authenticated(principal.clone()));
        let (mut parts, _) = request.into_parts();

        let Ok(ctx) = RequestContext::from_request_parts(&mut parts, &()).await;
        assert_eq!(ctx.current_principal(), Some(&principal));

        let CurrentPrincipal(extracted) = CurrentPrincipal::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, principal);
    }

    #[tokio::test]
    async fn test_missing_context_is_anonymous() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();

        let Ok(ctx) = RequestContext::from_request_parts(&mut parts, &()).await;
        assert!(ctx.current_principal().is_none());

        let err = CurrentPrincipal::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
