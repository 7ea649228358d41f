//! JWT token handling
//!
//! Verifies bearer tokens and flattens their payload into the raw claims bag
//! the policy engine reads. Token minting exists for development and tests.

use crate::config::JwtConfig;
use crate::error::{AppError, Result};
use crate::policy::claims::{Claim, Identity};
use anyhow::{anyhow, bail, Context};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registered claims that never become part of the claims bag
const REGISTERED_CLAIMS: &[&str] = &["exp", "iat", "nbf", "iss", "aud", "jti"];

/// Claims written into minted access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission: Vec<String>,
    #[serde(rename = "UserId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(rename = "PortId", skip_serializing_if = "Option::is_none")]
    pub port_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

/// Input for [`JwtManager::create_access_token`]
#[derive(Debug, Clone, Default)]
pub struct AccessTokenRequest {
    pub sub: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub user_id: Option<i64>,
    pub port_id: Option<i64>,
    /// Overrides the configured access token TTL
    pub ttl_secs: Option<i64>,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> anyhow::Result<Self> {
        let uses_rsa = config.public_key_pem.is_some() || config.private_key_pem.is_some();

        let (algorithm, encoding_key, decoding_key) = if uses_rsa {
            let public_key = config
                .public_key_pem
                .as_ref()
                .context("JWT_PUBLIC_KEY is required when JWT_PRIVATE_KEY is set")?;
            let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())
                .context("Failed to load JWT public key")?;
            let encoding_key = config
                .private_key_pem
                .as_ref()
                .map(|key| EncodingKey::from_rsa_pem(key.as_bytes()))
                .transpose()
                .context("Failed to load JWT private key")?;
            (Algorithm::RS256, encoding_key, decoding_key)
        } else {
            if config.secret.is_empty() {
                bail!("JWT_SECRET must not be empty");
            }
            (
                Algorithm::HS256,
                Some(EncodingKey::from_secret(config.secret.as_bytes())),
                DecodingKey::from_secret(config.secret.as_bytes()),
            )
        };

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            algorithm,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.config.leeway_secs;
        validation.set_issuer(&[&self.config.issuer]);
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Verify a bearer token and flatten its payload into an authenticated identity
    pub fn verify_identity(&self, token: &str) -> Result<Identity> {
        let token_data =
            decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation())?;
        Ok(Identity::authenticated(flatten_claims(&token_data.claims)))
    }

    /// Mint an access token; development and test helper
    pub fn create_access_token(&self, request: &AccessTokenRequest) -> Result<String> {
        let encoding_key = self.encoding_key.as_ref().ok_or_else(|| {
            AppError::Internal(anyhow!("Token signing requires JWT_SECRET or JWT_PRIVATE_KEY"))
        })?;

        let now = Utc::now();
        let ttl = request.ttl_secs.unwrap_or(self.config.access_token_ttl_secs);
        let exp = Duration::try_seconds(ttl)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::BadRequest(format!("Token lifetime of {} seconds is out of range", ttl))
            })?;

        let claims = AccessClaims {
            sub: request.sub.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            role: request.roles.clone(),
            permission: request.permissions.clone(),
            user_id: request.user_id,
            port_id: request.port_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(self.algorithm);
        encode(&header, &claims, encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    pub fn access_token_ttl(&self) -> i64 {
        self.config.access_token_ttl_secs
    }

    pub fn uses_rsa(&self) -> bool {
        self.algorithm == Algorithm::RS256
    }
}

/// Flatten a verified JSON payload into one claim per scalar value
pub fn flatten_claims(payload: &Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::new();
    for (kind, value) in payload {
        if REGISTERED_CLAIMS.contains(&kind.as_str()) {
            continue;
        }
        match value {
            Value::Array(items) => {
                claims.extend(items.iter().filter_map(scalar).map(|v| Claim::new(kind, v)))
            }
            other => {
                if let Some(v) = scalar(other) {
                    claims.push(Claim::new(kind, v));
                }
            }
        }
    }
    claims
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
