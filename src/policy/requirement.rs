//! Policy requirements attached to protected operations

use serde::{Deserialize, Serialize};

/// Default route/query parameter carrying the port id
pub const DEFAULT_PORT_PARAMETER: &str = "portId";
/// Default route/query parameter carrying the user id
pub const DEFAULT_USER_PARAMETER: &str = "userId";

/// How a list of required values is matched against the claim set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// At least one required value must be held
    #[default]
    #[serde(alias = "require_any")]
    Any,
    /// Every required value must be held
    #[serde(alias = "require_all")]
    All,
}

/// A single declarative check. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum PolicyRequirement {
    Permission {
        values: Vec<String>,
        #[serde(default, rename = "match")]
        mode: MatchMode,
    },
    Role {
        values: Vec<String>,
        #[serde(default, rename = "match")]
        mode: MatchMode,
    },
    PortAccess {
        #[serde(default = "default_port_parameter")]
        parameter: String,
        #[serde(default = "default_true")]
        allow_global_override: bool,
    },
    Ownership {
        #[serde(default = "default_user_parameter")]
        parameter: String,
        #[serde(default = "default_true")]
        allow_admin_override: bool,
    },
}

fn default_port_parameter() -> String {
    DEFAULT_PORT_PARAMETER.to_string()
}

fn default_user_parameter() -> String {
    DEFAULT_USER_PARAMETER.to_string()
}

fn default_true() -> bool {
    true
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl PolicyRequirement {
    pub fn any_permission(values: &[&str]) -> Self {
        Self::Permission {
            values: owned(values),
            mode: MatchMode::Any,
        }
    }

    pub fn all_permissions(values: &[&str]) -> Self {
        Self::Permission {
            values: owned(values),
            mode: MatchMode::All,
        }
    }

    pub fn any_role(values: &[&str]) -> Self {
        Self::Role {
            values: owned(values),
            mode: MatchMode::Any,
        }
    }

    pub fn all_roles(values: &[&str]) -> Self {
        Self::Role {
            values: owned(values),
            mode: MatchMode::All,
        }
    }

    /// Port-scoped check on `portId` with the global override enabled
    pub fn port_access() -> Self {
        Self::PortAccess {
            parameter: default_port_parameter(),
            allow_global_override: true,
        }
    }

    pub fn port_access_with(parameter: &str, allow_global_override: bool) -> Self {
        Self::PortAccess {
            parameter: parameter.to_string(),
            allow_global_override,
        }
    }

    /// Ownership check on `userId` with the admin override enabled
    pub fn ownership() -> Self {
        Self::Ownership {
            parameter: default_user_parameter(),
            allow_admin_override: true,
        }
    }

    pub fn ownership_with(parameter: &str, allow_admin_override: bool) -> Self {
        Self::Ownership {
            parameter: parameter.to_string(),
            allow_admin_override,
        }
    }

    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Permission { .. } => "permission",
            Self::Role { .. } => "role",
            Self::PortAccess { .. } => "port_access",
            Self::Ownership { .. } => "ownership",
        }
    }
}
