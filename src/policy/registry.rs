//! Named policies attached to routes
//!
//! A policy is a named, non-empty list of requirements combined with AND.
//! The registry is built once at startup (built-in defaults, then JSON
//! overrides) and shared read-only between requests.

use super::context::RequestContext;
use super::decision::{combine, Decision, DenyReason};
use super::requirement::PolicyRequirement;
use crate::config::AuthzConfig;
use anyhow::{bail, Context, Result};
use metrics::counter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Policy guarding the registry listing endpoint
pub const MANAGE_AUTHORIZATION_POLICY: &str = "ManageAuthorization";

/// A named set of requirements attached to one or more operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePolicy {
    pub name: String,
    pub requirements: Vec<PolicyRequirement>,
}

impl RoutePolicy {
    pub fn new(name: impl Into<String>, requirements: Vec<PolicyRequirement>) -> Self {
        Self {
            name: name.into(),
            requirements,
        }
    }

    /// Evaluate every requirement, then log and count the outcome
    pub fn evaluate(&self, context: &RequestContext) -> Decision {
        let decision = combine(&self.requirements, context);
        record_decision(&self.name, &decision, context);
        decision
    }
}

fn record_decision(policy: &str, decision: &Decision, context: &RequestContext) {
    counter!(
        "porttrack_authz_decisions_total",
        "policy" => policy.to_string(),
        "outcome" => decision.label()
    )
    .increment(1);

    match decision {
        Decision::Allow => tracing::debug!(
            policy,
            user_id = ?context.claims.user_id,
            "Authorization allowed"
        ),
        Decision::Deny(reason) => tracing::info!(
            policy,
            outcome = reason.label(),
            user_id = ?context.claims.user_id,
            "Authorization denied"
        ),
    }
}

/// Registry of named policies
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Arc<RoutePolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in policies for the port-tracking API
    pub fn defaults() -> Self {
        use PolicyRequirement as R;

        let mut registry = Self::new();
        registry.insert(RoutePolicy::new("AdminOnly", vec![R::any_role(&["Admin"])]));
        registry.insert(RoutePolicy::new(
            "ViewPorts",
            vec![R::any_permission(&["ViewPorts", "ManagePorts", "ManageAllPorts"])],
        ));
        registry.insert(RoutePolicy::new(
            "ManagePorts",
            vec![R::any_permission(&["ManagePorts", "ManageAllPorts"])],
        ));
        registry.insert(RoutePolicy::new("PortAccess", vec![R::port_access()]));
        registry.insert(RoutePolicy::new(
            "ManageBerths",
            vec![R::any_permission(&["ManageBerths"]), R::port_access()],
        ));
        registry.insert(RoutePolicy::new(
            "ManageShips",
            vec![R::any_permission(&["ManageShips"])],
        ));
        registry.insert(RoutePolicy::new(
            "ManageContainers",
            vec![R::any_permission(&["ManageContainers"]), R::port_access()],
        ));
        registry.insert(RoutePolicy::new(
            "ViewEvents",
            vec![R::any_permission(&["ViewEvents", "ManageEvents"]), R::port_access()],
        ));
        registry.insert(RoutePolicy::new(
            "ManageUsers",
            vec![R::any_permission(&["ManageUsers"])],
        ));
        registry.insert(RoutePolicy::new("OwnProfile", vec![R::ownership()]));
        registry.insert(RoutePolicy::new(
            MANAGE_AUTHORIZATION_POLICY,
            vec![R::any_role(&["Admin"])],
        ));
        registry
    }

    /// Parse policies from JSON: `{ "<name>": [requirement, ...] }`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<PolicyRequirement>> =
            serde_json::from_str(json).context("Invalid policy definition JSON")?;

        let mut registry = Self::new();
        for (name, requirements) in raw {
            if name.trim().is_empty() {
                bail!("Policy names must not be empty");
            }
            if requirements.is_empty() {
                bail!("Policy '{}' has no requirements", name);
            }
            registry.insert(RoutePolicy::new(name, requirements));
        }
        Ok(registry)
    }

    /// Defaults, then the policy file, then inline JSON; later sources replace
    /// policies of the same name.
    pub fn load(config: &AuthzConfig) -> Result<Self> {
        let mut registry = Self::defaults();

        if let Some(path) = &config.policies_file {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read policy file {}", path))?;
            registry.merge(Self::from_json(&json).with_context(|| format!("In {}", path))?);
        }

        if let Some(json) = &config.policies_json {
            registry.merge(Self::from_json(json).context("In AUTHZ_POLICIES")?);
        }

        Ok(registry)
    }

    pub fn insert(&mut self, policy: RoutePolicy) {
        self.policies.insert(policy.name.clone(), Arc::new(policy));
    }

    pub fn merge(&mut self, other: PolicyRegistry) {
        self.policies.extend(other.policies);
    }

    pub fn get(&self, name: &str) -> Option<Arc<RoutePolicy>> {
        self.policies.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Evaluate a policy by name. Unknown names are denied.
    pub fn evaluate(&self, name: &str, context: &RequestContext) -> Decision {
        match self.policies.get(name) {
            Some(policy) => policy.evaluate(context),
            None => {
                tracing::error!(policy = name, "Unknown authorization policy; denying");
                let decision = if context.claims.is_authenticated {
                    Decision::Deny(DenyReason::Forbidden)
                } else {
                    Decision::Deny(DenyReason::Unauthenticated)
                };
                record_decision(name, &decision, context);
                decision
            }
        }
    }

    /// Snapshot of the registry for display
    pub fn to_json(&self) -> serde_json::Value {
        let map: BTreeMap<&str, &Vec<PolicyRequirement>> = self
            .policies
            .iter()
            .map(|(name, policy)| (name.as_str(), &policy.requirements))
            .collect();
        serde_json::to_value(map).unwrap_or_default()
    }
}
