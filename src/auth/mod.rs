//! Evaluates permission for a (tool, identity) pair against the fixed
//! role-permission matrix: five permissions, four roles.

use crate::model::{AuthDecision, Identity, Permission, Role};
use crate::registry::required_permission_for;
use std::collections::HashSet;

/// The fixed role→default-permissions matrix (§4.4).
pub fn role_matrix() -> Vec<(Role, HashSet<Permission>)> {
    use Permission::*;
    vec![
        (Role::Analyst, HashSet::from([ReadAnalysis])),
        (Role::Engineer, HashSet::from([ReadAnalysis, WriteReports])),
        (Role::Executive, HashSet::from([ReadAnalysis, WriteReports, ExecuteDecisions])),
        (Role::Admin, HashSet::from([ReadAnalysis, WriteReports, ExecuteDecisions, AdminServers, AdminUsers])),
    ]
}

fn defaults_for(role: Role) -> HashSet<Permission> {
    role_matrix().into_iter().find(|(r, _)| *r == role).map(|(_, perms)| perms).unwrap_or_default()
}

pub struct AuthService {
    /// Demo mode: when true, every check succeeds unconditionally.
    pub disabled: bool,
}

impl AuthService {
    pub fn new(disabled: bool) -> Self {
        Self { disabled }
    }

    /// Evaluates whether `identity` may invoke `tool_name`.
    pub fn check(&self, tool_name: &str, identity: &Identity) -> AuthDecision {
        if self.disabled {
            return AuthDecision::allow();
        }

        let required = required_permission_for(tool_name);
        let mut effective = defaults_for(identity.role);
        effective.extend(identity.permissions.iter().copied());

        if effective.contains(&required) {
            return AuthDecision::allow();
        }

        let required_role = Role::ALL_ASCENDING.into_iter().find(|r| defaults_for(*r).contains(&required));

        AuthDecision {
            allowed: false,
            reason: Some(format!("role {} lacks {}", identity.role, required)),
            required_permissions: vec![required],
            required_role,
        }
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests;
