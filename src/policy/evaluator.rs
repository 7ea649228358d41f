//! Rule evaluators for the four requirement kinds

use super::context::RequestContext;
use super::decision::{Decision, DenyReason};
use super::requirement::{MatchMode, PolicyRequirement};
use std::collections::BTreeSet;

/// Role that bypasses port and ownership scoping
pub const ADMIN_ROLE: &str = "Admin";
/// Permission granting access to every port
pub const GLOBAL_PORT_ACCESS: &str = "GlobalPortAccess";
/// Permission granting management of every port
pub const MANAGE_ALL_PORTS: &str = "ManageAllPorts";

/// Evaluate a single requirement against the request context.
///
/// Unauthenticated callers are denied before anything else is looked at.
pub fn evaluate(requirement: &PolicyRequirement, context: &RequestContext) -> Decision {
    if !context.claims.is_authenticated {
        return Decision::Deny(DenyReason::Unauthenticated);
    }

    match requirement {
        PolicyRequirement::Permission { values, mode } => {
            match_values(&context.claims.permissions, values, *mode, "permission")
        }
        PolicyRequirement::Role { values, mode } => {
            match_values(&context.claims.roles, values, *mode, "role")
        }
        PolicyRequirement::PortAccess {
            parameter,
            allow_global_override,
        } => evaluate_port_access(context, parameter, *allow_global_override),
        PolicyRequirement::Ownership {
            parameter,
            allow_admin_override,
        } => evaluate_ownership(context, parameter, *allow_admin_override),
    }
}

fn match_values(
    have: &BTreeSet<String>,
    need: &[String],
    mode: MatchMode,
    kind: &'static str,
) -> Decision {
    if need.is_empty() {
        // Vacuous match: nothing is required, so nothing can be missing.
        tracing::warn!(kind, ?mode, "Requirement lists no values; allowing");
        return Decision::Allow;
    }

    let satisfied = match mode {
        MatchMode::Any => need.iter().any(|v| have.contains(v)),
        MatchMode::All => need.iter().all(|v| have.contains(v)),
    };

    if satisfied {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::Forbidden)
    }
}

fn evaluate_port_access(
    context: &RequestContext,
    parameter: &str,
    allow_global_override: bool,
) -> Decision {
    // Parsing happens before the override so a malformed id is always reported.
    let Some(port_id) = context.resolve_id(parameter) else {
        return Decision::malformed(parameter);
    };

    let claims = &context.claims;
    if allow_global_override
        && (claims.roles.contains(ADMIN_ROLE)
            || claims.permissions.contains(GLOBAL_PORT_ACCESS)
            || claims.permissions.contains(MANAGE_ALL_PORTS))
    {
        return Decision::Allow;
    }

    if claims.port_id == Some(port_id) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::Forbidden)
    }
}

fn evaluate_ownership(
    context: &RequestContext,
    parameter: &str,
    allow_admin_override: bool,
) -> Decision {
    let Some(user_id) = context.resolve_id(parameter) else {
        return Decision::malformed(parameter);
    };

    if allow_admin_override && context.claims.roles.contains(ADMIN_ROLE) {
        return Decision::Allow;
    }

    if context.claims.user_id == Some(user_id) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::Forbidden)
    }
}
