use std::sync::Arc;

use crate::error::ErrorCode;
use crate::pipeline::domain::Actor;

use super::domain::{PermType, PermissionRule, Role, RuleUpsert};
use super::gate::{AccessDenied, AuthorizationGate};
use super::registry::{RegistryError, RoleRegistry};
use super::store::{PermissionStore, StoreError};

/// Admin facade over the rule store and role registry. Every operation
/// re-checks authorization server-side before touching shared state.
pub struct AccessAdminService {
    store: Arc<dyn PermissionStore>,
    registry: Arc<dyn RoleRegistry>,
    gate: Arc<AuthorizationGate>,
}

impl AccessAdminService {
    pub fn new(
        store: Arc<dyn PermissionStore>,
        registry: Arc<dyn RoleRegistry>,
        gate: Arc<AuthorizationGate>,
    ) -> Self {
        Self {
            store,
            registry,
            gate,
        }
    }

    pub fn upsert_permissions(
        &self,
        actor: &Actor,
        rules: Vec<RuleUpsert>,
    ) -> Result<Vec<PermissionRule>, AdminError> {
        self.gate
            .authorize(PermType::Action, "PERMISSIONS_UPSERT", &actor.role)?;
        Ok(self.store.upsert_rules(&actor.user_id, rules)?)
    }

    pub fn list_permissions(
        &self,
        actor: &Actor,
        filter: Option<PermType>,
    ) -> Result<Vec<PermissionRule>, AdminError> {
        self.gate
            .authorize(PermType::Action, "PERMISSIONS_LIST", &actor.role)?;
        Ok(self.store.list_rules(filter))
    }

    pub fn upsert_role(&self, actor: &Actor, role: Role) -> Result<Role, AdminError> {
        self.gate
            .authorize(PermType::Action, "ROLES_UPSERT", &actor.role)?;
        Ok(self.registry.upsert(role)?)
    }

    pub fn list_roles(&self, actor: &Actor) -> Result<Vec<Role>, AdminError> {
        self.gate
            .authorize(PermType::Action, "ROLES_LIST", &actor.role)?;
        Ok(self.registry.list())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AdminError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AdminError::Access(_) => ErrorCode::RbacDenied,
            AdminError::Store(_) | AdminError::Registry(_) => ErrorCode::Validation,
        }
    }
}
