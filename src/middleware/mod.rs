//! HTTP middleware for PortTrack Core
//!
//! - Bearer token authentication and the `ClaimSet` extractor
//! - Route-level policy enforcement
//! - JSON error bodies for framework rejections
//! - Request observability (request id, metrics)
//! - Sanitized request spans

pub mod auth;
pub mod authorize;
pub mod error_response;
pub mod metrics;
pub mod trace;

pub use auth::authenticate;
pub use authorize::{ProtectedRouteExt, RequirePolicyLayer};
pub use error_response::normalize_error_response;
pub use metrics::ObservabilityLayer;
pub use trace::SanitizedMakeSpan;
