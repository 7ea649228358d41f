//! Route-level policy enforcement
//!
//! [`RequirePolicyLayer`] is attached to a single route with
//! `MethodRouter::route_layer`, so path parameters are already matched when
//! it runs. It builds the [`RequestContext`], evaluates the named policy and
//! either forwards the request or answers 401/403/400.

use axum::{
    body::Body,
    extract::{rejection::RawPathParamsRejection, FromRequestParts, RawPathParams},
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
    routing::MethodRouter,
    Router,
};
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::error::AppError;
use crate::policy::{ClaimSet, Decision, DenyReason, Identity, PolicyRegistry, RequestContext};

/// Tower Layer enforcing one named policy
#[derive(Clone, Debug)]
pub struct RequirePolicyLayer {
    registry: Arc<PolicyRegistry>,
    policy: Arc<str>,
}

impl RequirePolicyLayer {
    pub fn new(registry: Arc<PolicyRegistry>, policy: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            policy: policy.into(),
        }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }
}

impl<S> Layer<S> for RequirePolicyLayer {
    type Service = RequirePolicy<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePolicy {
            inner,
            registry: self.registry.clone(),
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequirePolicy<S> {
    inner: S,
    registry: Arc<PolicyRegistry>,
    policy: Arc<str>,
}

impl<S> Service<Request<Body>> for RequirePolicy<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let registry = self.registry.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let context = match request_context(&mut parts).await {
                Ok(context) => context,
                Err(reason) => return Ok(AppError::from(reason).into_response()),
            };

            match registry.evaluate(&policy, &context) {
                Decision::Allow => {
                    parts.extensions.insert(context.claims);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Decision::Deny(reason) => Ok(AppError::from(reason).into_response()),
            }
        })
    }
}

/// Build the evaluation input from matched path parameters, the query string
/// and the identity attached by the authentication middleware.
///
/// A path parameter that cannot be decoded is malformed; the query string is
/// never consulted in its place.
pub async fn request_context(parts: &mut Parts) -> Result<RequestContext, DenyReason> {
    let route_parameters = match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(RawPathParamsRejection::MissingPathParams(_)) => HashMap::new(),
        Err(rejection) => {
            tracing::info!(
                path = %parts.uri.path(),
                error = %rejection,
                "Rejecting request with undecodable path parameter"
            );
            return Err(DenyReason::MalformedParameter {
                parameter: "path".to_string(),
            });
        }
    };

    Ok(RequestContext {
        route_parameters,
        query_parameters: parse_query(parts.uri.query()),
        claims: ClaimSet::from_identity(parts.extensions.get::<Identity>()),
    })
}

/// Decode a query string; the first occurrence of a repeated name wins.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut parameters = HashMap::new();
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            parameters
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }
    parameters
}

/// Attach a policy to a route entry
pub trait ProtectedRouteExt<S> {
    fn protected_route(
        self,
        path: &str,
        method_router: MethodRouter<S>,
        policy: RequirePolicyLayer,
    ) -> Self;
}

impl<S> ProtectedRouteExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn protected_route(
        self,
        path: &str,
        method_router: MethodRouter<S>,
        policy: RequirePolicyLayer,
    ) -> Self {
        self.route(path, method_router.route_layer(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyRequirement, RoutePolicy};
    use axum::{http::StatusCode, routing::get};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn registry() -> Arc<PolicyRegistry> {
        let mut registry = PolicyRegistry::new();
        registry.insert(RoutePolicy::new(
            "ViewBerths",
            vec![
                PolicyRequirement::any_permission(&["ViewPorts"]),
                PolicyRequirement::port_access(),
            ],
        ));
        Arc::new(registry)
    }

    fn app() -> Router {
        let layer = RequirePolicyLayer::new(registry(), "ViewBerths");
        Router::new().protected_route(
            "/ports/{portId}/berths",
            get(|claims: ClaimSet| async move { format!("{:?}", claims.user_id) }),
            layer,
        )
    }

    fn request(uri: &str, identity: Option<Identity>) -> Request<Body> {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        if let Some(identity) = identity {
            request.extensions_mut().insert(identity);
        }
        request
    }

    fn operator(port: &str) -> Identity {
        Identity::authenticated(vec![
            crate::policy::Claim::new("permission", "ViewPorts"),
            crate::policy::Claim::new("PortId", port),
            crate::policy::Claim::new("UserId", "42"),
        ])
    }

    #[test]
    fn test_parse_query_decodes_and_keeps_first() {
        let params = parse_query(Some("portId=3&name=Port%20A&portId=9&flag"));
        assert_eq!(params.get("portId").map(String::as_str), Some("3"));
        assert_eq!(params.get("name").map(String::as_str), Some("Port A"));
        assert_eq!(params.get("flag").map(String::as_str), Some(""));
        assert!(parse_query(None).is_empty());
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler_with_claims() {
        let response = app()
            .oneshot(request("/ports/3/berths", Some(operator("3"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Some(42)");
    }

    #[tokio::test]
    async fn test_anonymous_request_is_unauthorized() {
        let response = app()
            .oneshot(request("/ports/3/berths", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_other_port_is_forbidden() {
        let response = app()
            .oneshot(request("/ports/4/berths", Some(operator("3"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_non_numeric_port_is_bad_request() {
        let response = app()
            .oneshot(request("/ports/main/berths", Some(operator("3"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_port_is_bad_request_despite_query() {
        let response = app()
            .oneshot(request("/ports/%FF/berths?portId=3", Some(operator("3"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_context_rejects_undecodable_path_parameter() {
        let app: Router = Router::new().route(
            "/ports/{portId}",
            get(|request: Request<Body>| async move {
                let (mut parts, _) = request.into_parts();
                match request_context(&mut parts).await {
                    Ok(context) => format!("{:?}", context.resolve_parameter("portId")),
                    Err(reason) => reason.label().to_string(),
                }
            }),
        );

        let decoded = app
            .clone()
            .oneshot(request("/ports/%33?portId=9", None))
            .await
            .unwrap();
        let body = axum::body::to_bytes(decoded.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Some(\"3\")");

        let undecodable = app
            .oneshot(request("/ports/%FF?portId=9", None))
            .await
            .unwrap();
        let body = axum::body::to_bytes(undecodable.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"bad_request");
    }

    #[tokio::test]
    async fn test_unknown_policy_fails_closed() {
        let app: Router = Router::new().protected_route(
            "/secret",
            get(|| async { "secret" }),
            RequirePolicyLayer::new(registry(), "Missing"),
        );

        let response = app
            .oneshot(request("/secret", Some(operator("3"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
