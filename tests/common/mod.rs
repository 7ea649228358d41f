//! Common test utilities
//!
//! HTTP tests run the real middleware and handlers in-process through
//! `tower::ServiceExt::oneshot`; no network or external services.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use porttrack_core::config::{AuthzConfig, Config, JwtConfig, ServerConfig, TelemetryConfig};
use porttrack_core::jwt::{AccessTokenRequest, JwtManager};
use porttrack_core::policy::PolicyRegistry;
use porttrack_core::state::HasAuthz;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-for-http-testing";

pub fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        http_host: "127.0.0.1".to_string(),
        http_port: 3000,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            issuer: "https://porttrack.test".to_string(),
            audience: None,
            leeway_secs: 5,
            access_token_ttl_secs: 3600,
            private_key_pem: None,
            public_key_pem: None,
        },
        telemetry: TelemetryConfig::default(),
        authz: AuthzConfig::default(),
        server: ServerConfig::default(),
    }
}

/// Test state implementing `HasAuthz` without metrics
#[derive(Clone)]
pub struct TestAppState {
    pub config: Arc<Config>,
    pub jwt_manager: JwtManager,
    pub policies: Arc<PolicyRegistry>,
}

impl TestAppState {
    pub fn new() -> Self {
        Self::with_registry(PolicyRegistry::defaults())
    }

    pub fn with_registry(registry: PolicyRegistry) -> Self {
        let config = test_config();
        let jwt_manager = JwtManager::new(config.jwt.clone()).unwrap();
        Self {
            config: Arc::new(config),
            jwt_manager,
            policies: Arc::new(registry),
        }
    }

    pub fn token(&self, request: AccessTokenRequest) -> String {
        self.jwt_manager.create_access_token(&request).unwrap()
    }
}

impl HasAuthz for TestAppState {
    fn config(&self) -> &Config {
        &self.config
    }

    fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    fn policies(&self) -> &Arc<PolicyRegistry> {
        &self.policies
    }
}

/// Token request builder for the common caller shapes
pub fn caller(sub: &str) -> AccessTokenRequest {
    AccessTokenRequest {
        sub: sub.to_string(),
        ..Default::default()
    }
}

pub fn with_roles(mut request: AccessTokenRequest, roles: &[&str]) -> AccessTokenRequest {
    request.roles = roles.iter().map(|r| r.to_string()).collect();
    request
}

pub fn with_permissions(mut request: AccessTokenRequest, permissions: &[&str]) -> AccessTokenRequest {
    request.permissions = permissions.iter().map(|p| p.to_string()).collect();
    request
}

async fn send<R: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, Option<R>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();

    if body_bytes.is_empty() {
        return (status, None);
    }

    match serde_json::from_slice(&body_bytes) {
        Ok(data) => (status, Some(data)),
        Err(_) => (status, None),
    }
}

pub async fn get_json<R: DeserializeOwned>(
    app: &Router,
    path: &str,
    token: Option<&str>,
) -> (StatusCode, Option<R>) {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json<T: Serialize, R: DeserializeOwned>(
    app: &Router,
    path: &str,
    body: &T,
    token: Option<&str>,
) -> (StatusCode, Option<R>) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    send(
        app,
        builder
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
}
