//! Per-request evaluation input and parameter resolution

use super::claims::ClaimSet;
use std::collections::HashMap;

/// Read-only input to a policy evaluation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub route_parameters: HashMap<String, String>,
    pub query_parameters: HashMap<String, String>,
    pub claims: ClaimSet,
}

impl RequestContext {
    pub fn new(claims: ClaimSet) -> Self {
        Self {
            claims,
            ..Default::default()
        }
    }

    pub fn with_route_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_query_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(name.into(), value.into());
        self
    }

    /// Look up a named parameter. Route parameters win over query parameters.
    pub fn resolve_parameter(&self, name: &str) -> Option<&str> {
        self.route_parameters
            .get(name)
            .or_else(|| self.query_parameters.get(name))
            .map(String::as_str)
    }

    /// Resolve a parameter as an integer id; missing or non-numeric values are `None`.
    pub fn resolve_id(&self, name: &str) -> Option<i64> {
        self.resolve_parameter(name)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
    }
}
