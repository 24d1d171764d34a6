use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::domain::{normalize_key, PermType, PermissionRule, RoleCode, RuleUpsert};
use super::registry::RoleRegistry;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("permission rule has an empty key")]
    EmptyKey,
    #[error("role {0} is not registered")]
    UnknownRole(RoleCode),
    #[error("role {0} is inactive and cannot be granted permissions")]
    InactiveRole(RoleCode),
}

/// Versioned rule storage. Upserts replace whole rules by `(perm_type,
/// perm_key)` and stamp the audit fields from the acting identity with the
/// server clock; client timestamps are never trusted.
pub trait PermissionStore: Send + Sync {
    /// Batched replace-by-key. The batch is one atomic chunk: every rule is
    /// validated before any is applied, so a failing rule leaves the store
    /// untouched. Callers are expected to chunk large batches themselves.
    fn upsert_rules(
        &self,
        updated_by: &str,
        rules: Vec<RuleUpsert>,
    ) -> Result<Vec<PermissionRule>, StoreError>;

    fn list_rules(&self, filter: Option<PermType>) -> Vec<PermissionRule>;

    fn find_rule(&self, perm_type: PermType, perm_key: &str) -> Option<PermissionRule>;
}

pub struct InMemoryPermissionStore {
    registry: Arc<dyn RoleRegistry>,
    rules: Mutex<BTreeMap<(PermType, String), PermissionRule>>,
}

impl InMemoryPermissionStore {
    pub fn new(registry: Arc<dyn RoleRegistry>) -> Self {
        Self {
            registry,
            rules: Mutex::new(BTreeMap::new()),
        }
    }

    fn validate(&self, rule: &RuleUpsert) -> Result<(), StoreError> {
        if rule.normalized_key().is_empty() {
            return Err(StoreError::EmptyKey);
        }

        for role in rule.allowed_roles.iter() {
            match self.registry.find(role) {
                None => return Err(StoreError::UnknownRole(role.clone())),
                Some(registered) if !registered.is_active() => {
                    return Err(StoreError::InactiveRole(role.clone()));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl PermissionStore for InMemoryPermissionStore {
    fn upsert_rules(
        &self,
        updated_by: &str,
        rules: Vec<RuleUpsert>,
    ) -> Result<Vec<PermissionRule>, StoreError> {
        for rule in &rules {
            self.validate(rule)?;
        }

        let now = Utc::now();
        let mut guard = self.rules.lock().expect("rule store mutex poisoned");
        let mut applied = Vec::with_capacity(rules.len());
        for rule in rules {
            let stored = PermissionRule {
                perm_type: rule.perm_type,
                perm_key: rule.normalized_key(),
                allowed_roles: rule.allowed_roles,
                enabled: rule.enabled,
                updated_at: now,
                updated_by: updated_by.to_string(),
            };
            guard.insert((stored.perm_type, stored.perm_key.clone()), stored.clone());
            applied.push(stored);
        }

        Ok(applied)
    }

    fn list_rules(&self, filter: Option<PermType>) -> Vec<PermissionRule> {
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        guard
            .values()
            .filter(|rule| filter.map(|wanted| rule.perm_type == wanted).unwrap_or(true))
            .cloned()
            .collect()
    }

    fn find_rule(&self, perm_type: PermType, perm_key: &str) -> Option<PermissionRule> {
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        guard.get(&(perm_type, normalize_key(perm_key))).cloned()
    }
}
