//! Dynamic role and permission management: the rule store edited from the
//! admin portal, the role registry, and the authorization gate that combines
//! live rules with the compiled fallback policy.

pub mod domain;
pub mod gate;
pub mod policy;
pub mod registry;
pub mod service;
pub mod store;

pub use domain::{PermType, PermissionRule, Role, RoleCode, RoleSet, RoleStatus, RuleUpsert};
pub use gate::{AccessDenied, AuthorizationGate, RuleDecision};
pub use policy::{default_rules, FallbackTable, DEFAULT_POLICY};
pub use registry::{InMemoryRoleRegistry, RegistryError, RoleRegistry};
pub use service::{AccessAdminService, AdminError};
pub use store::{InMemoryPermissionStore, PermissionStore, StoreError};
