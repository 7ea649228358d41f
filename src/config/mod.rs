//! Configuration management for PortTrack Core

use anyhow::{bail, Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment (`development`, `production`, ...)
    pub environment: String,
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// JWT verification configuration
    pub jwt: JwtConfig,
    /// Logging, metrics and tracing
    pub telemetry: TelemetryConfig,
    /// Policy definition sources
    pub authz: AuthzConfig,
    /// HTTP server behaviour
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    /// Expected `aud`; audience is not validated when unset
    pub audience: Option<String>,
    pub leeway_secs: u64,
    pub access_token_ttl_secs: i64,
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `json` or anything else for the human-readable format
    pub log_format: String,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            tracing_enabled: false,
            otlp_endpoint: None,
            service_name: "porttrack-core".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthzConfig {
    /// Path to a JSON policy file (`AUTHZ_POLICIES_FILE`)
    pub policies_file: Option<String>,
    /// Inline JSON policies (`AUTHZ_POLICIES`); applied after the file
    pub policies_json: Option<String>,
}

impl AuthzConfig {
    /// Policy sources only; needs no credentials
    pub fn from_env() -> Self {
        Self {
            policies_file: non_empty("AUTHZ_POLICIES_FILE"),
            policies_json: non_empty("AUTHZ_POLICIES"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub request_timeout_secs: u64,
    /// Allowed CORS origins; empty means any origin
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            cors_allowed_origins: vec![],
        }
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(false)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let public_key_pem = non_empty("JWT_PUBLIC_KEY").map(|value| value.replace("\\n", "\n"));
        let secret = match non_empty("JWT_SECRET") {
            Some(secret) => secret,
            None if public_key_pem.is_some() => String::new(),
            None => bail!("JWT_SECRET is required unless JWT_PUBLIC_KEY is set"),
        };

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            jwt: JwtConfig {
                secret,
                issuer: env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "https://porttrack.local".to_string()),
                audience: non_empty("JWT_AUDIENCE"),
                leeway_secs: env::var("JWT_LEEWAY_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("Invalid JWT_LEEWAY_SECS")?,
                access_token_ttl_secs: env::var("JWT_ACCESS_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
                private_key_pem: non_empty("JWT_PRIVATE_KEY")
                    .map(|value| value.replace("\\n", "\n")),
                public_key_pem,
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: flag("METRICS_ENABLED"),
                tracing_enabled: flag("OTEL_TRACING_ENABLED"),
                otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
                service_name: env::var("OTEL_SERVICE_NAME")
                    .unwrap_or_else(|_| "porttrack-core".to_string()),
            },
            authz: AuthzConfig::from_env(),
            server: ServerConfig {
                request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_SECS")?,
                cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(|o| o.trim().to_string())
                            .filter(|o| !o.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            environment: "test".to_string(),
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
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

    #[test]
    fn test_config_http_addr() {
        assert_eq!(test_config().http_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_http_addr_ipv6() {
        let mut config = test_config();
        config.http_host = "[::1]".to_string();
        config.http_port = 3000;
        assert_eq!(config.http_addr(), "[::1]:3000");
    }

    #[test]
    fn test_is_production() {
        let mut config = test_config();
        assert!(!config.is_production());
        config.environment = "Production".to_string();
        assert!(config.is_production());
    }

    #[test]
    fn test_defaults() {
        let telemetry = TelemetryConfig::default();
        assert!(!telemetry.metrics_enabled);
        assert!(!telemetry.tracing_enabled);
        assert_eq!(telemetry.service_name, "porttrack-core");

        let server = ServerConfig::default();
        assert_eq!(server.request_timeout_secs, 30);
        assert!(server.cors_allowed_origins.is_empty());

        let authz = AuthzConfig::default();
        assert!(authz.policies_file.is_none());
        assert!(authz.policies_json.is_none());
    }

    #[test]
    fn test_config_debug() {
        let debug = format!("{:?}", test_config());
        assert!(debug.contains("Config"));
        assert!(debug.contains("porttrack.test"));
    }
}
