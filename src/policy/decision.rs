//! Decisions and the decision combinator

use super::context::RequestContext;
use super::evaluator::evaluate;
use super::requirement::PolicyRequirement;
use crate::error::AppError;
use axum::http::StatusCode;
use serde::Serialize;

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    /// No valid identity
    Unauthenticated,
    /// Valid identity, insufficient rights
    Forbidden,
    /// Scoping parameter missing or not an integer
    MalformedParameter { parameter: String },
}

impl DenyReason {
    /// Status the host pipeline answers with
    pub fn status_code(&self) -> StatusCode {
        match self {
            DenyReason::Unauthenticated => StatusCode::UNAUTHORIZED,
            DenyReason::Forbidden => StatusCode::FORBIDDEN,
            DenyReason::MalformedParameter { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Short outcome label for logs, metrics and API responses
    pub fn label(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Forbidden => "forbidden",
            DenyReason::MalformedParameter { .. } => "bad_request",
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => {
                AppError::Unauthorized("Authentication required".to_string())
            }
            DenyReason::Forbidden => AppError::Forbidden("Insufficient permissions".to_string()),
            DenyReason::MalformedParameter { parameter } => AppError::BadRequest(format!(
                "Parameter '{}' is missing or is not a valid integer id",
                parameter
            )),
        }
    }
}

/// Outcome of evaluating one requirement or a whole policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub(crate) fn malformed(parameter: &str) -> Self {
        Decision::Deny(DenyReason::MalformedParameter {
            parameter: parameter.to_string(),
        })
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny(reason) => reason.label(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Decision::Allow => StatusCode::OK,
            Decision::Deny(reason) => reason.status_code(),
        }
    }

    /// Translate into the error the handler pipeline propagates
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

/// Combine every requirement of an operation with logical AND.
///
/// Requirements run in declaration order and the first denial is returned
/// unchanged. An empty list is a configuration fault and is denied.
pub fn combine(requirements: &[PolicyRequirement], context: &RequestContext) -> Decision {
    if requirements.is_empty() {
        tracing::error!("Protected operation has no requirements attached; denying");
        return if context.claims.is_authenticated {
            Decision::Deny(DenyReason::Forbidden)
        } else {
            Decision::Deny(DenyReason::Unauthenticated)
        };
    }

    for requirement in requirements {
        let decision = evaluate(requirement, context);
        if let Decision::Deny(reason) = decision {
            tracing::debug!(
                requirement = requirement.kind(),
                outcome = reason.label(),
                "Requirement denied"
            );
            return Decision::Deny(reason);
        }
    }

    Decision::Allow
}
