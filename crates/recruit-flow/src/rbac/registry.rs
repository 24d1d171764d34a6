use std::collections::BTreeMap;
use std::sync::Mutex;

use super::domain::{Role, RoleCode, RoleStatus};

/// Built-in role codes shipped with the portal. Admin can register more at
/// runtime.
pub const BUILTIN_ROLES: &[(&str, &str)] = &[
    ("ADMIN", "Administrator"),
    ("HR", "Human Resources"),
    ("EA", "Executive Assistant"),
    ("OWNER", "Owner"),
    ("ACCOUNTS", "Accounts"),
    ("MIS", "MIS"),
    ("DEO", "Data Entry Operator"),
    ("EMPLOYEE", "Employee"),
];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("role code must not be empty")]
    EmptyRoleCode,
}

/// Set of registered roles; gates which role codes may be assigned at all.
pub trait RoleRegistry: Send + Sync {
    fn upsert(&self, role: Role) -> Result<Role, RegistryError>;
    fn find(&self, code: &RoleCode) -> Option<Role>;
    fn list(&self) -> Vec<Role>;

    fn is_active(&self, code: &RoleCode) -> bool {
        self.find(code).map(|role| role.is_active()).unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRoleRegistry {
    roles: Mutex<BTreeMap<RoleCode, Role>>,
}

impl InMemoryRoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in portal roles, all active.
    pub fn with_builtin_roles() -> Self {
        let registry = Self::new();
        {
            let mut guard = registry.roles.lock().expect("registry mutex poisoned");
            for (code, name) in BUILTIN_ROLES {
                let role = Role::active(code, *name);
                guard.insert(role.role_code.clone(), role);
            }
        }
        registry
    }
}

impl RoleRegistry for InMemoryRoleRegistry {
    fn upsert(&self, role: Role) -> Result<Role, RegistryError> {
        if role.role_code.is_empty() {
            return Err(RegistryError::EmptyRoleCode);
        }

        let mut guard = self.roles.lock().expect("registry mutex poisoned");
        guard.insert(role.role_code.clone(), role.clone());
        Ok(role)
    }

    fn find(&self, code: &RoleCode) -> Option<Role> {
        let guard = self.roles.lock().expect("registry mutex poisoned");
        guard.get(code).cloned()
    }

    fn list(&self) -> Vec<Role> {
        let guard = self.roles.lock().expect("registry mutex poisoned");
        guard.values().cloned().collect()
    }
}
