//! PortTrack Core - Authorization Decision Engine
//!
//! Decides whether an authenticated caller may perform an operation on the
//! port-tracking API, based on the caller's claims, the operation's policy
//! and the request's route and query parameters.

pub mod api;
pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod policy;
pub mod server;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
