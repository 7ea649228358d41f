//! Claim set reader
//!
//! Maps the raw, multi-valued claims bag produced by the authentication
//! layer into a typed [`ClaimSet`] once per request. Evaluators only ever
//! look at the typed set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Claim types carrying role names
pub const ROLE_CLAIM_TYPES: &[&str] = &["role", "roles"];
/// Claim types carrying permission names
pub const PERMISSION_CLAIM_TYPES: &[&str] = &["permission", "permissions"];
/// Preferred claim type for the numeric user id
pub const USER_ID_CLAIM: &str = "UserId";
/// Standard subject identifier, used when no `UserId` claim is present
pub const SUBJECT_CLAIM: &str = "sub";
/// Assigned port, present only for port-scoped users
pub const PORT_ID_CLAIM: &str = "PortId";

/// A single claim from the authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type, e.g. `role` or `PortId`
    pub kind: String,
    /// Raw claim value
    pub value: String,
}

impl Claim {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    fn is_one_of(&self, kinds: &[&str]) -> bool {
        kinds.iter().any(|k| self.kind.eq_ignore_ascii_case(k))
    }
}

/// Raw authenticated identity as handed over by the authentication middleware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub authenticated: bool,
    pub claims: Vec<Claim>,
}

impl Identity {
    /// Identity for a request without valid credentials
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Identity backed by a verified token
    pub fn authenticated(claims: Vec<Claim>) -> Self {
        Self {
            authenticated: true,
            claims,
        }
    }

    fn values_of<'a>(&'a self, kinds: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.is_one_of(kinds))
            .map(|c| c.value.as_str())
    }

    fn first_id(&self, kind: &str) -> Option<i64> {
        self.values_of(std::slice::from_ref(&kind))
            .find_map(|v| v.trim().parse::<i64>().ok())
    }
}

/// Typed claims derived once per request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub is_authenticated: bool,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub user_id: Option<i64>,
    pub port_id: Option<i64>,
}

impl ClaimSet {
    /// Claim set of an unauthenticated caller; grants nothing
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read the claim set from a (possibly absent) identity.
    ///
    /// Never fails: an absent or unauthenticated identity yields
    /// [`ClaimSet::anonymous`], and ids that are not integers are dropped.
    pub fn from_identity(identity: Option<&Identity>) -> Self {
        let identity = match identity {
            Some(identity) if identity.authenticated => identity,
            _ => return Self::anonymous(),
        };

        let roles = identity
            .values_of(ROLE_CLAIM_TYPES)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        let permissions = identity
            .values_of(PERMISSION_CLAIM_TYPES)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        let user_id = identity
            .first_id(USER_ID_CLAIM)
            .or_else(|| identity.first_id(SUBJECT_CLAIM));
        let port_id = identity.first_id(PORT_ID_CLAIM);

        Self {
            is_authenticated: true,
            roles,
            permissions,
            user_id,
            port_id,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.is_authenticated && self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_authenticated && self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity(claims: &[(&str, &str)]) -> Identity {
        Identity::authenticated(claims.iter().map(|(k, v)| Claim::new(*k, *v)).collect())
    }

    #[test]
    fn test_absent_identity_is_anonymous() {
        assert_eq!(ClaimSet::from_identity(None), ClaimSet::anonymous());
    }

    #[test]
    fn test_unauthenticated_identity_ignores_claims() {
        let mut raw = identity(&[("role", "Admin"), ("PortId", "3"), ("UserId", "42")]);
        raw.authenticated = false;

        let claims = ClaimSet::from_identity(Some(&raw));

        assert!(!claims.is_authenticated);
        assert!(claims.roles.is_empty());
        assert!(claims.user_id.is_none());
        assert!(claims.port_id.is_none());
        assert!(!claims.has_role("Admin"));
    }

    #[test]
    fn test_reads_multi_valued_roles_and_permissions() {
        let raw = identity(&[
            ("role", "PortManager"),
            ("roles", "Viewer"),
            ("role", "PortManager"),
            ("permission", "ManageBerths"),
            ("Permissions", "ViewPorts"),
        ]);

        let claims = ClaimSet::from_identity(Some(&raw));

        assert!(claims.is_authenticated);
        assert_eq!(
            claims.roles.iter().cloned().collect::<Vec<_>>(),
            vec!["PortManager".to_string(), "Viewer".to_string()]
        );
        assert!(claims.has_permission("ManageBerths"));
        assert!(claims.has_permission("ViewPorts"));
        assert_eq!(claims.permissions.len(), 2);
    }

    #[test]
    fn test_user_id_prefers_user_id_claim_over_subject() {
        let raw = identity(&[("sub", "7"), ("UserId", "42")]);
        assert_eq!(ClaimSet::from_identity(Some(&raw)).user_id, Some(42));
    }

    #[test]
    fn test_user_id_falls_back_to_subject() {
        let raw = identity(&[("sub", "7")]);
        assert_eq!(ClaimSet::from_identity(Some(&raw)).user_id, Some(7));
    }

    #[test]
    fn test_non_numeric_ids_are_absent() {
        let raw = identity(&[("sub", "alice@example.com"), ("PortId", "north-terminal")]);
        let claims = ClaimSet::from_identity(Some(&raw));

        assert!(claims.is_authenticated);
        assert_eq!(claims.user_id, None);
        assert_eq!(claims.port_id, None);
    }

    #[test]
    fn test_port_id_claim() {
        let raw = identity(&[("PortId", " 3 ")]);
        assert_eq!(ClaimSet::from_identity(Some(&raw)).port_id, Some(3));
    }

    #[test]
    fn test_role_names_are_case_sensitive() {
        let raw = identity(&[("role", "admin")]);
        let claims = ClaimSet::from_identity(Some(&raw));
        assert!(claims.has_role("admin"));
        assert!(!claims.has_role("Admin"));
    }
}
