//! HTTP observability middleware
//!
//! Tower Layer/Service pairing request id propagation with request metrics.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tower Layer for HTTP observability (request id + metrics)
#[derive(Clone, Debug, Default)]
pub struct ObservabilityLayer;

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityMiddleware { inner }
    }
}

#[derive(Clone, Debug)]
pub struct ObservabilityMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ObservabilityMiddleware<S>
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
        let method = request.method().to_string();
        let path = normalize_path(request.uri().path());

        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        gauge!("porttrack_http_requests_in_flight").increment(1.0);
        let start = Instant::now();

        // Take the service that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let span = tracing::info_span!("request", request_id = %request_id);

        Box::pin(
            async move {
                let result = inner.call(request).await;
                gauge!("porttrack_http_requests_in_flight").decrement(1.0);
                let mut response = result?;

                let status = response.status().as_u16().to_string();
                counter!(
                    "porttrack_http_requests_total",
                    "method" => method.clone(),
                    "path" => path.clone(),
                    "status" => status
                )
                .increment(1);
                histogram!(
                    "porttrack_http_request_duration_seconds",
                    "method" => method,
                    "path" => path
                )
                .record(start.elapsed().as_secs_f64());

                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Collapse id-like path segments to `{id}` to keep label cardinality bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| if is_id_segment(seg) { "{id}" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_id_segment(seg: &str) -> bool {
    let numeric = !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit());
    let uuid = seg.len() == 36 && seg.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    numeric || uuid
}
