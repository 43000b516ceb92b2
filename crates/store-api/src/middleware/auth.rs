//! Bearer-token authentication middleware and extractors.
//!
//! `authenticate` rejects the request with the shared 401 body when no
//! customer can be resolved. `optional_authenticate` makes the same
//! attempt and lets the request through anonymously on any failure.
//! Both leave an [`AuthenticatedCustomer`] in the request extensions on
//! success, which handlers read through [`RequireCustomer`] or
//! [`OptionalCustomer`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, trace, warn};

use crate::error::{AppError, set_sentry_user};
use crate::models::AuthenticatedCustomer;
use crate::services::ResolveError;
use crate::state::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. A missing header, another
/// scheme, or an empty token yields `None`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}

/// Verify the bearer token and resolve it to a customer.
///
/// # Errors
///
/// Returns `ResolveError::Unauthenticated` when no bearer token is
/// present, `ResolveError::InvalidToken` when verification fails, and the
/// resolver's error when no customer matches.
pub async fn resolve_customer(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedCustomer, ResolveError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| ResolveError::Unauthenticated("missing bearer token".to_string()))?;

    let claims = state.tokens().verify(token)?;
    let resolved = state.resolver().resolve(&claims).await?;

    debug!(
        customer_id = %resolved.customer.id,
        step = ?resolved.step,
        "Customer resolved"
    );

    Ok(resolved.authenticated())
}

fn attach(request: &mut Request, customer: AuthenticatedCustomer) {
    set_sentry_user(&customer.customer_id, Some(customer.email.as_str()));
    request.extensions_mut().insert(customer);
}

/// Mandatory authentication. Unresolvable requests get a 401 and never
/// reach the handler.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_customer(&state, request.headers()).await {
        Ok(customer) => {
            attach(&mut request, customer);
            next.run(request).await
        }
        Err(e) => {
            match &e {
                ResolveError::UpstreamLookup(_) => warn!(error = %e, "Authentication failed"),
                _ => debug!(error = %e, "Authentication failed"),
            }
            AppError::Unauthorized.into_response()
        }
    }
}

/// Optional authentication. Failures are logged and the request
/// continues without a customer.
pub async fn optional_authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_customer(&state, request.headers()).await {
        Ok(customer) => attach(&mut request, customer),
        Err(ResolveError::Unauthenticated(reason)) => trace!(%reason, "No customer on request"),
        Err(e) => debug!(error = %e, "Continuing anonymously"),
    }

    next.run(request).await
}

/// Extractor for routes behind [`authenticate`].
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCustomer(customer): RequireCustomer) -> String {
///     customer.email.to_string()
/// }
/// ```
pub struct RequireCustomer(pub AuthenticatedCustomer);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedCustomer>()
            .cloned()
            .map(Self)
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor for routes behind [`optional_authenticate`]. Never rejects.
pub struct OptionalCustomer(pub Option<AuthenticatedCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthenticatedCustomer>().cloned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{
        Router,
        body::Body,
        http::{HeaderValue, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::config::{JwtConfig, StoreConfig};

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    /// Collects formatted log lines in memory.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_optional_mode_traces_missing_header() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let state = AppState::in_memory(StoreConfig::new(JwtConfig::new(
            "middleware-test-secret-with-enough-entropy-7hQz",
            Duration::from_secs(60),
        )));
        let app = Router::new()
            .route(
                "/",
                get(|OptionalCustomer(customer): OptionalCustomer| async move {
                    customer.is_none().to_string()
                }),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                optional_authenticate,
            ))
            .with_state(state);

        let response = app
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"true");

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("No customer on request"))
            .unwrap();
        assert!(line.contains("TRACE"));
        assert!(line.contains("missing bearer token"));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("Bearer   abc  ")), Some("abc"));
    }

    #[test]
    fn test_extract_bearer_token_rejects() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(extract_bearer_token(&headers("Basic abc")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&headers("abc")), None);
    }
}
