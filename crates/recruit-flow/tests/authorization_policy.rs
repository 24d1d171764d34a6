//! Properties of the two-tier authorization design: the compiled fallback
//! table must answer exactly like a store seeded with the default dynamic
//! rules, and keys absent from both must deny.

use std::sync::Arc;

use recruit_flow::rbac::{
    default_rules, AuthorizationGate, FallbackTable, InMemoryPermissionStore,
    InMemoryRoleRegistry, PermType, PermissionStore, RoleCode, DEFAULT_POLICY,
};

fn seeded_gate() -> AuthorizationGate {
    let registry = Arc::new(InMemoryRoleRegistry::with_builtin_roles());
    let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new(registry));
    store
        .upsert_rules("system", default_rules())
        .expect("seed default rules");
    AuthorizationGate::new(store)
}

fn empty_gate() -> AuthorizationGate {
    let registry = Arc::new(InMemoryRoleRegistry::with_builtin_roles());
    let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new(registry));
    AuthorizationGate::new(store)
}

fn probe_roles() -> Vec<RoleCode> {
    let mut roles: Vec<RoleCode> = recruit_flow::rbac::registry::BUILTIN_ROLES
        .iter()
        .map(|(code, _)| RoleCode::new(code))
        .collect();
    roles.push(RoleCode::new("CONTRACTOR"));
    roles
}

#[test]
fn fallback_and_default_rules_never_drift() {
    let with_rules = seeded_gate();
    let rules_only_fallback = empty_gate();

    for entry in DEFAULT_POLICY {
        for role in probe_roles() {
            let dynamic = with_rules.allows(entry.perm_type, entry.key, &role);
            let fallback = rules_only_fallback.allows(entry.perm_type, entry.key, &role);
            assert_eq!(
                dynamic, fallback,
                "policy drift on {} {} for {}",
                entry.perm_type, entry.key, role
            );
        }
    }
}

#[test]
fn every_fallback_key_has_a_default_rule() {
    let fallback = FallbackTable::compiled();
    assert_eq!(fallback.len(), DEFAULT_POLICY.len());
    assert_eq!(default_rules().len(), DEFAULT_POLICY.len());
    for rule in default_rules() {
        assert!(fallback.contains_key(rule.perm_type, &rule.perm_key));
    }
}

#[test]
fn unknown_key_denies_every_role() {
    let gate = seeded_gate();
    for role in probe_roles() {
        assert!(!gate.allows(PermType::Action, "UNDECLARED_ACTION", &role));
        assert!(!gate.allows(PermType::Ui, "PORTAL_UNDECLARED", &role));
    }
}

#[test]
fn ui_and_action_namespaces_are_distinct() {
    let gate = seeded_gate();
    let owner = RoleCode::new("OWNER");
    // OWNER_DECIDE exists as an ACTION key only; the UI namespace must not
    // leak an answer for it.
    assert!(gate.allows(PermType::Action, "OWNER_DECIDE", &owner));
    assert!(!gate.allows(PermType::Ui, "OWNER_DECIDE", &owner));
}

#[test]
fn revert_key_is_stricter_than_reject_keys() {
    let gate = seeded_gate();
    let owner = RoleCode::new("OWNER");
    let admin = RoleCode::new("ADMIN");

    // The owner may reject but only the elevated role may revert.
    assert!(gate.allows(PermType::Action, "OWNER_FINAL_DECIDE", &owner));
    assert!(!gate.allows(PermType::Action, "REJECT_REVERT", &owner));
    assert!(gate.allows(PermType::Action, "REJECT_REVERT", &admin));
}
