use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;

use recruit_flow::coalesce::RequestCoalescer;
use recruit_flow::config::PipelineConfig;
use recruit_flow::error::ErrorCode;
use recruit_flow::events::NotificationHub;
use recruit_flow::pipeline::{
    Actor, InMemoryCandidateRepository, InMemoryRejectionLedger, PipelineService,
};
use recruit_flow::rbac::{
    default_rules, AccessAdminService, AuthorizationGate, InMemoryPermissionStore,
    InMemoryRoleRegistry, PermissionStore, RoleCode, RoleRegistry,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Service = PipelineService<InMemoryCandidateRepository, InMemoryRejectionLedger>;

/// Error/result shape cached by the coalescer and rendered into the RPC
/// envelope.
#[derive(Debug, Clone)]
pub(crate) struct RpcFailure {
    pub(crate) code: ErrorCode,
    pub(crate) message: String,
}

impl RpcFailure {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }
}

pub(crate) type RpcOutcome = Result<Value, RpcFailure>;

/// Everything the RPC dispatcher needs, shared across requests.
pub(crate) struct PortalState {
    pub(crate) service: Arc<Service>,
    pub(crate) admin: AccessAdminService,
    pub(crate) registry: Arc<dyn RoleRegistry>,
    pub(crate) sessions: SessionStore,
    pub(crate) coalescer: RequestCoalescer<RpcOutcome>,
}

/// Build the in-memory portal backend: built-in roles, default rules, empty
/// pipeline. Returns the notification hub so the server can attach its
/// subscriber.
pub(crate) fn build_portal(config: &PipelineConfig) -> (Arc<PortalState>, Arc<NotificationHub>) {
    let registry: Arc<dyn RoleRegistry> = Arc::new(InMemoryRoleRegistry::with_builtin_roles());
    let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new(registry.clone()));
    store
        .upsert_rules("system", default_rules())
        .expect("default policy roles are registered");
    let gate = Arc::new(AuthorizationGate::new(store.clone()));

    let repository = Arc::new(InMemoryCandidateRepository::new());
    let ledger = Arc::new(InMemoryRejectionLedger::new());
    let events = Arc::new(NotificationHub::new(config.event_buffer));

    let service = Arc::new(PipelineService::new(
        repository,
        ledger,
        gate.clone(),
        events.clone(),
    ));
    let admin = AccessAdminService::new(store, registry.clone(), gate);

    let portal = Arc::new(PortalState {
        service,
        admin,
        registry,
        sessions: SessionStore::new(),
        coalescer: RequestCoalescer::new(config.coalesce_ttl),
    });
    (portal, events)
}

#[derive(Debug)]
pub(crate) enum LoginError {
    UnknownRole(RoleCode),
    InactiveRole(RoleCode),
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginError::UnknownRole(role) => write!(f, "role {role} is not registered"),
            LoginError::InactiveRole(role) => {
                write!(f, "role {role} is inactive and cannot log in")
            }
        }
    }
}

impl std::error::Error for LoginError {}

/// Token-to-actor resolution. Tokens are opaque and server-generated;
/// credential verification belongs to the identity surface outside this
/// service.
pub(crate) struct SessionStore {
    sessions: Mutex<HashMap<String, Actor>>,
    sequence: AtomicU64,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    pub(crate) fn login(
        &self,
        registry: &dyn RoleRegistry,
        user_id: &str,
        role: &str,
    ) -> Result<(String, Actor), LoginError> {
        let role = RoleCode::new(role);
        match registry.find(&role) {
            None => return Err(LoginError::UnknownRole(role)),
            Some(registered) if !registered.is_active() => {
                return Err(LoginError::InactiveRole(role));
            }
            Some(_) => {}
        }

        let actor = Actor {
            user_id: user_id.trim().to_string(),
            role,
        };
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let token = format!("tok-{sequence:06}-{:x}", Utc::now().timestamp_millis());

        let mut guard = self.sessions.lock().expect("session mutex poisoned");
        guard.insert(token.clone(), actor.clone());
        Ok((token, actor))
    }

    pub(crate) fn resolve(&self, token: Option<&str>) -> Option<Actor> {
        let token = token?.trim();
        if token.is_empty() {
            return None;
        }
        let guard = self.sessions.lock().expect("session mutex poisoned");
        guard.get(token).cloned()
    }
}
