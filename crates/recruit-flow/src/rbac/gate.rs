use std::sync::Arc;

use super::domain::{PermType, PermissionRule, RoleCode};
use super::policy::FallbackTable;
use super::store::PermissionStore;

/// Answer of the dynamic rule lookup, before the fallback is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDecision {
    Allow,
    Deny,
    Unknown,
}

/// Pure decision primitive over one rule. No rule means `Unknown`; a
/// disabled rule denies every role regardless of the allow-list.
pub fn decide(rule: Option<&PermissionRule>, role: &RoleCode) -> RuleDecision {
    match rule {
        None => RuleDecision::Unknown,
        Some(rule) if !rule.enabled => RuleDecision::Deny,
        Some(rule) if rule.allowed_roles.contains(role) => RuleDecision::Allow,
        Some(_) => RuleDecision::Deny,
    }
}

/// Authorization failure. The message shape is load-bearing: the portal
/// client extracts the role code from `Not allowed for role: X`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Not allowed for role: {role}")]
pub struct AccessDenied {
    pub role: RoleCode,
    pub perm_key: String,
}

/// Single decision point used identically for portal visibility and action
/// execution. Dynamic rules win when they exist; unknown keys fall back to
/// the compiled table; a key absent from both denies.
pub struct AuthorizationGate {
    store: Arc<dyn PermissionStore>,
    fallback: FallbackTable,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            fallback: FallbackTable::compiled(),
        }
    }

    pub fn decide(&self, perm_type: PermType, perm_key: &str, role: &RoleCode) -> RuleDecision {
        let rule = self.store.find_rule(perm_type, perm_key);
        decide(rule.as_ref(), role)
    }

    pub fn allows(&self, perm_type: PermType, perm_key: &str, role: &RoleCode) -> bool {
        match self.decide(perm_type, perm_key, role) {
            RuleDecision::Allow => true,
            RuleDecision::Deny => false,
            RuleDecision::Unknown => self
                .fallback
                .lookup(perm_type, perm_key, role)
                .unwrap_or(false),
        }
    }

    pub fn authorize(
        &self,
        perm_type: PermType,
        perm_key: &str,
        role: &RoleCode,
    ) -> Result<(), AccessDenied> {
        if self.allows(perm_type, perm_key, role) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: role.clone(),
                perm_key: perm_key.to_string(),
            })
        }
    }
}
