//! Centralized authorization policy engine for HTTP handlers.
//!
//! A request is authorized by turning the caller's identity into a
//! [`ClaimSet`], collecting route and query parameters into a
//! [`RequestContext`], and combining every requirement of the operation's
//! [`RoutePolicy`] into a single [`Decision`].

pub mod claims;
pub mod context;
pub mod decision;
pub mod evaluator;
pub mod registry;
pub mod requirement;

pub use claims::{Claim, ClaimSet, Identity};
pub use context::RequestContext;
pub use decision::{combine, Decision, DenyReason};
pub use evaluator::evaluate;
pub use registry::{PolicyRegistry, RoutePolicy, MANAGE_AUTHORIZATION_POLICY};
pub use requirement::{MatchMode, PolicyRequirement};

use crate::error::AppError;

pub type PolicyResult<T> = std::result::Result<T, AppError>;

/// Enforce a policy from inside a handler.
///
/// Same outcome as the route layer: 401 for anonymous callers, 403 when a
/// right is missing, 400 when a scoping parameter is malformed.
pub fn enforce(policy: &RoutePolicy, context: &RequestContext) -> PolicyResult<()> {
    policy.evaluate(context).into_result()
}
