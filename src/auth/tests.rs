use super::*;
use crate::model::Permission;

fn analyst() -> Identity {
    Identity { user_id: uuid::Uuid::new_v4(), role: Role::Analyst, permissions: vec![], organization: None, display_name: None }
}

fn executive() -> Identity {
    Identity { user_id: uuid::Uuid::new_v4(), role: Role::Executive, permissions: vec![], organization: None, display_name: None }
}

#[test]
fn analyst_denied_decision_analyze() {
    let auth = AuthService::new(false);
    let decision = auth.check("decision.analyze", &analyst());
    assert!(!decision.allowed);
    assert_eq!(decision.required_permissions, vec![Permission::ExecuteDecisions]);
    assert_eq!(decision.required_role, Some(Role::Executive));
    assert_eq!(decision.reason.unwrap(), "role analyst lacks execute:decisions");
}

#[test]
fn executive_allowed_decision_analyze() {
    let auth = AuthService::new(false);
    let decision = auth.check("decision.analyze", &executive());
    assert!(decision.allowed);
}

#[test]
fn analyst_allowed_read_only_tools() {
    let auth = AuthService::new(false);
    assert!(auth.check("geowiz.analyze", &analyst()).allowed);
}

#[test]
fn explicit_grant_extends_role_defaults() {
    let auth = AuthService::new(false);
    let mut identity = analyst();
    identity.permissions.push(Permission::WriteReports);
    assert!(auth.check("reporter.analyze", &identity).allowed);
}

#[test]
fn disabled_mode_allows_everything() {
    let auth = AuthService::new(true);
    assert!(auth.check("decision.analyze", &analyst()).allowed);
    assert!(auth.check("admin.anything", &analyst()).allowed);
}

#[test]
fn admin_role_has_all_five_permissions() {
    let matrix = role_matrix();
    let admin_perms = matrix.into_iter().find(|(r, _)| *r == Role::Admin).unwrap().1;
    assert_eq!(admin_perms.len(), 5);
}

#[test]
fn required_role_is_the_minimal_sufficient_role() {
    let auth = AuthService::new(false);
    let decision = auth.check("reporter.analyze", &analyst());
    assert_eq!(decision.required_role, Some(Role::Engineer));
}
