//! Authorization API: caller claims, decision checks and the policy registry

use crate::api::SuccessResponse;
use crate::error::{AppError, Result};
use crate::policy::{ClaimSet, Decision, RequestContext};
use crate::state::HasAuthz;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// GET /api/v1/authz/claims
pub async fn get_claims(claims: ClaimSet) -> Result<Json<SuccessResponse<ClaimSet>>> {
    if !claims.is_authenticated {
        return Err(AppError::Unauthorized("Authentication required".to_string()));
    }
    Ok(Json(SuccessResponse::new(claims)))
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckRequest {
    #[validate(length(min = 1, max = 128))]
    pub policy: String,
    #[serde(default)]
    pub route_params: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub policy: String,
    pub allowed: bool,
    /// Denial reason label; absent when allowed
    pub reason: Option<&'static str>,
    /// Status the guarded operation would answer with
    pub status: u16,
}

/// POST /api/v1/authz/check
///
/// Evaluates a named policy for the caller against the supplied parameters.
/// Always answers 200 with the verdict; unknown policies are denied.
pub async fn check<S: HasAuthz>(
    State(state): State<S>,
    claims: ClaimSet,
    Json(input): Json<CheckRequest>,
) -> Result<Json<SuccessResponse<CheckResponse>>> {
    input.validate()?;

    let context = RequestContext {
        route_parameters: input.route_params,
        query_parameters: input.query_params,
        claims,
    };
    let decision = state.policies().evaluate(&input.policy, &context);

    let reason = match &decision {
        Decision::Allow => None,
        Decision::Deny(reason) => Some(reason.label()),
    };

    Ok(Json(SuccessResponse::new(CheckResponse {
        policy: input.policy,
        allowed: decision.is_allowed(),
        reason,
        status: decision.status_code().as_u16(),
    })))
}

/// GET /api/v1/authz/policies
pub async fn list_policies<S: HasAuthz>(
    State(state): State<S>,
) -> Json<SuccessResponse<serde_json::Value>> {
    Json(SuccessResponse::new(state.policies().to_json()))
}
