use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use recruit_flow::coalesce::fingerprint;
use recruit_flow::error::ErrorCode;
use recruit_flow::pipeline::{
    Actor, Candidate, CandidateKey, CandidateProfile, FinalDecision, OwnerDecision,
    PipelineAction, PipelineError, RejectionLogEntry, Status, TransitionPayload,
};
use recruit_flow::rbac::{
    AdminError, PermType, PermissionRule, Role, RoleCode, RoleSet, RoleStatus, RuleUpsert,
};

use crate::infra::{AppState, PortalState, RpcFailure, RpcOutcome};

/// Uniform call envelope used by the portal client.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcRequest {
    pub(crate) action: String,
    #[serde(default)]
    pub(crate) token: Option<String>,
    #[serde(default)]
    pub(crate) data: Value,
}

pub(crate) fn rpc_router(portal: Arc<PortalState>) -> Router {
    Router::new()
        .route("/api/v1/rpc", post(rpc_endpoint))
        .with_state(portal)
}

/// Single RPC entry point. Domain failures ride back inside the envelope
/// with HTTP 200; the client distinguishes them by the `ok` flag, exactly
/// like the transport it replaces.
pub(crate) async fn rpc_endpoint(
    State(portal): State<Arc<PortalState>>,
    Json(request): Json<RpcRequest>,
) -> Json<Value> {
    let action = request.action.trim().to_ascii_uppercase();
    let print = fingerprint(&action, request.token.as_deref(), &request.data);

    let outcome = portal.coalescer.run(&print, || {
        dispatch(&portal, &action, request.token.as_deref(), &request.data)
    });

    Json(match outcome {
        Ok(data) => json!({ "ok": true, "data": data }),
        Err(failure) => json!({
            "ok": false,
            "error": { "code": failure.code.as_str(), "message": failure.message },
        }),
    })
}

fn dispatch(portal: &PortalState, action: &str, token: Option<&str>, data: &Value) -> RpcOutcome {
    if action == "AUTH_LOGIN" {
        return login(portal, data);
    }

    let actor = portal.sessions.resolve(token).ok_or_else(|| {
        RpcFailure::new(ErrorCode::RbacDenied, "Missing or invalid session token")
    })?;

    match action {
        "CANDIDATE_REGISTER" => register(portal, &actor, data),
        "HR_REVIEW_APPROVE" => transition(portal, &actor, data, PipelineAction::HrReviewApprove),
        "OWNER_DECIDE" => owner_decide(portal, &actor, data),
        "WALKIN_COMPLETE" => transition(portal, &actor, data, PipelineAction::WalkinComplete),
        "PRECALL_COMPLETE" => transition(portal, &actor, data, PipelineAction::PrecallComplete),
        "PRE_INTERVIEW_PASS" => transition(portal, &actor, data, PipelineAction::PreInterviewPass),
        "INPERSON_PASS" => transition(portal, &actor, data, PipelineAction::InpersonPass),
        "FINAL_SEND_OWNER" => transition(portal, &actor, data, PipelineAction::FinalSendOwner),
        "OWNER_FINAL_DECIDE" => owner_final_decide(portal, &actor, data),
        "CANDIDATE_REJECT" => transition(portal, &actor, data, PipelineAction::StageReject),
        "REJECT_REVERT" => transition(portal, &actor, data, PipelineAction::RejectRevert),
        "HOLD_REVERT" => transition(portal, &actor, data, PipelineAction::HoldRevert),
        "JOINING_CONFIRM" => transition(portal, &actor, data, PipelineAction::JoiningConfirm),
        "AUTO_REJECT_FINAL_NOSHOW" => auto_reject_final_noshow(portal, &actor, data),
        "OWNER_CANDIDATES_LIST" => owner_candidates_list(portal, &actor),
        "FINAL_INTERVIEW_LIST" => final_interview_list(portal, &actor),
        "REJECTION_LOG_LIST" => rejection_log_list(portal, &actor),
        "PERMISSIONS_UPSERT" => permissions_upsert(portal, &actor, data),
        "PERMISSIONS_LIST" => permissions_list(portal, &actor, data),
        "ROLES_UPSERT" => roles_upsert(portal, &actor, data),
        "ROLES_LIST" => roles_list(portal, &actor),
        other => Err(RpcFailure::validation(format!("Unknown action: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    user_id: String,
    role: String,
}

fn login(portal: &PortalState, data: &Value) -> RpcOutcome {
    let request: LoginRequest = parse(data)?;
    let (token, actor) = portal
        .sessions
        .login(portal.registry.as_ref(), &request.user_id, &request.role)
        .map_err(|err| RpcFailure::new(ErrorCode::RbacDenied, err.to_string()))?;

    Ok(json!({
        "token": token,
        "userId": actor.user_id,
        "role": actor.role,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    candidate_id: String,
    requirement_id: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    job_role: String,
    #[serde(default)]
    source: String,
}

fn register(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: RegisterRequest = parse(data)?;
    let key = CandidateKey::new(request.candidate_id, request.requirement_id);
    let profile = CandidateProfile {
        full_name: request.full_name,
        phone: request.phone,
        email: request.email,
        job_role: request.job_role,
        source: request.source,
    };

    let candidate = portal.service.register(actor, key, profile)?;
    Ok(candidate_view(&candidate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransitionRequest {
    candidate_id: String,
    requirement_id: String,
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    remark: String,
    #[serde(default)]
    hold_until: Option<DateTime<Utc>>,
    #[serde(default)]
    reason_code: Option<String>,
}

impl TransitionRequest {
    fn key(&self) -> CandidateKey {
        CandidateKey::new(self.candidate_id.clone(), self.requirement_id.clone())
    }

    fn payload(&self) -> TransitionPayload {
        TransitionPayload {
            remark: self.remark.clone(),
            hold_until: self.hold_until,
            reason_code: self.reason_code.clone(),
        }
    }
}

fn transition(
    portal: &PortalState,
    actor: &Actor,
    data: &Value,
    action: PipelineAction,
) -> RpcOutcome {
    let request: TransitionRequest = parse(data)?;
    let candidate = portal
        .service
        .transition(actor, &request.key(), action, request.payload())?;
    Ok(candidate_view(&candidate))
}

fn owner_decide(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: TransitionRequest = parse(data)?;
    let decision = match normalized(&request.decision).as_deref() {
        Some("APPROVE_WALKIN") => OwnerDecision::ApproveWalkin,
        Some("HOLD") => OwnerDecision::Hold,
        Some("REJECT") => OwnerDecision::Reject,
        _ => {
            return Err(RpcFailure::validation(
                "decision must be APPROVE_WALKIN, HOLD, or REJECT",
            ));
        }
    };

    let candidate = portal.service.transition(
        actor,
        &request.key(),
        PipelineAction::OwnerDecide(decision),
        request.payload(),
    )?;
    Ok(candidate_view(&candidate))
}

fn owner_final_decide(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: TransitionRequest = parse(data)?;
    let decision = match normalized(&request.decision).as_deref() {
        Some("SELECT") => FinalDecision::Select,
        Some("HOLD") => FinalDecision::Hold,
        Some("REJECT") => FinalDecision::Reject,
        _ => {
            return Err(RpcFailure::validation(
                "decision must be SELECT, HOLD, or REJECT",
            ));
        }
    };

    let candidate = portal.service.transition(
        actor,
        &request.key(),
        PipelineAction::OwnerFinalDecide(decision),
        request.payload(),
    )?;
    Ok(candidate_view(&candidate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepRequest {
    #[serde(default)]
    cutoff: Option<DateTime<Utc>>,
}

fn auto_reject_final_noshow(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: SweepRequest = parse(data)?;
    let cutoff = request.cutoff.unwrap_or_else(Utc::now);
    let rejected = portal.service.auto_reject_final_noshow(actor, cutoff)?;
    Ok(json!({ "rejected": rejected }))
}

fn owner_candidates_list(portal: &PortalState, actor: &Actor) -> RpcOutcome {
    let items = portal.service.owner_queue(actor)?;
    let approvals = items
        .iter()
        .filter(|c| matches!(c.status, Status::Owner | Status::OwnerHold))
        .count();
    let finals = items
        .iter()
        .filter(|c| c.status == Status::FinalOwnerPending)
        .count();

    Ok(json!({
        "items": items.iter().map(candidate_view).collect::<Vec<_>>(),
        "counts": { "approvals": approvals, "final": finals },
    }))
}

fn final_interview_list(portal: &PortalState, actor: &Actor) -> RpcOutcome {
    let items = portal.service.final_interview_queue(actor)?;
    Ok(json!({
        "items": items.iter().map(candidate_view).collect::<Vec<_>>(),
        "total": items.len(),
    }))
}

fn rejection_log_list(portal: &PortalState, actor: &Actor) -> RpcOutcome {
    let rejected = portal.service.rejected_candidates(actor)?;
    let mut items = Vec::with_capacity(rejected.len());
    for candidate in &rejected {
        let logs = portal.service.rejection_log(actor, &candidate.key())?;
        let mut view = candidate_view(candidate);
        view["logs"] = Value::Array(logs.iter().map(log_entry_view).collect());
        items.push(view);
    }
    Ok(json!({ "items": items, "total": rejected.len() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionRuleWire {
    perm_type: String,
    perm_key: String,
    #[serde(default)]
    roles_csv: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionsUpsertRequest {
    items: Vec<PermissionRuleWire>,
}

fn permissions_upsert(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: PermissionsUpsertRequest = parse(data)?;
    let mut rules = Vec::with_capacity(request.items.len());
    for item in request.items {
        let perm_type = PermType::parse(&item.perm_type)
            .ok_or_else(|| RpcFailure::validation("permType must be ACTION or UI"))?;
        rules.push(RuleUpsert {
            perm_type,
            perm_key: item.perm_key,
            allowed_roles: RoleSet::from_csv(&item.roles_csv),
            enabled: item.enabled,
        });
    }

    let applied = portal.admin.upsert_permissions(actor, rules)?;
    Ok(json!({ "items": applied.iter().map(rule_view).collect::<Vec<_>>() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionsListRequest {
    #[serde(default)]
    perm_type: Option<String>,
}

fn permissions_list(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: PermissionsListRequest = parse(data)?;
    let filter = match request.perm_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            PermType::parse(raw)
                .ok_or_else(|| RpcFailure::validation("permType must be ACTION or UI"))?,
        ),
    };

    let rules = portal.admin.list_permissions(actor, filter)?;
    Ok(json!({ "items": rules.iter().map(rule_view).collect::<Vec<_>>() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleUpsertRequest {
    role_code: String,
    #[serde(default)]
    role_name: String,
    #[serde(default)]
    status: Option<String>,
}

fn roles_upsert(portal: &PortalState, actor: &Actor, data: &Value) -> RpcOutcome {
    let request: RoleUpsertRequest = parse(data)?;
    let status = match normalized(&request.status).as_deref() {
        None | Some("") | Some("ACTIVE") => RoleStatus::Active,
        Some("INACTIVE") => RoleStatus::Inactive,
        Some(_) => {
            return Err(RpcFailure::validation("status must be ACTIVE or INACTIVE"));
        }
    };

    let role_code = RoleCode::new(&request.role_code);
    let role_name = if request.role_name.trim().is_empty() {
        role_code.as_str().to_string()
    } else {
        request.role_name.trim().to_string()
    };

    let saved = portal.admin.upsert_role(
        actor,
        Role {
            role_code,
            role_name,
            status,
        },
    )?;
    Ok(role_view(&saved))
}

fn roles_list(portal: &PortalState, actor: &Actor) -> RpcOutcome {
    let roles = portal.admin.list_roles(actor)?;
    Ok(json!({ "items": roles.iter().map(role_view).collect::<Vec<_>>() }))
}

fn parse<T: serde::de::DeserializeOwned>(data: &Value) -> Result<T, RpcFailure> {
    // Clients omit `data` entirely for parameterless actions.
    let value = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data.clone()
    };
    serde_json::from_value(value)
        .map_err(|err| RpcFailure::validation(format!("Invalid payload: {err}")))
}

fn normalized(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(|value| value.trim().to_ascii_uppercase())
}

fn candidate_view(candidate: &Candidate) -> Value {
    let mut view = json!({
        "candidateId": candidate.candidate_id.0,
        "requirementId": candidate.requirement_id.0,
        "status": candidate.status.label(),
        "statusChangedAt": candidate.status_changed_at,
        "fullName": candidate.profile.full_name,
        "phone": candidate.profile.phone,
        "email": candidate.profile.email,
        "jobRole": candidate.profile.job_role,
        "source": candidate.profile.source,
    });

    if let Some(hold_until) = candidate.hold_until {
        view["holdUntil"] = json!(hold_until);
    }
    if let Some(rejection) = &candidate.rejection {
        view["rejectedFromStatus"] = json!(rejection.from_status.label());
        view["rejectedReasonCode"] = json!(rejection.reason_code);
        view["rejectedStageTag"] = json!(rejection.stage_tag);
        view["rejectedRemark"] = json!(rejection.remark);
        view["rejectedAt"] = json!(rejection.at);
    }

    view
}

fn log_entry_view(entry: &RejectionLogEntry) -> Value {
    json!({
        "logId": entry.log_id,
        "at": entry.at,
        "stageTag": entry.stage_tag,
        "remark": entry.remark,
        "actorRole": entry.actor_role,
        "actorUserId": entry.actor_user_id,
        "rejectionType": entry.rejection_type,
        "autoRejectCode": entry.auto_reject_code,
    })
}

fn rule_view(rule: &PermissionRule) -> Value {
    json!({
        "permType": rule.perm_type.label(),
        "permKey": rule.perm_key,
        "rolesCsv": rule.allowed_roles.to_csv(),
        "enabled": rule.enabled,
        "updatedAt": rule.updated_at,
        "updatedBy": rule.updated_by,
    })
}

fn role_view(role: &Role) -> Value {
    json!({
        "roleCode": role.role_code,
        "roleName": role.role_name,
        "status": role.status,
    })
}

impl From<PipelineError> for RpcFailure {
    fn from(err: PipelineError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<AdminError> for RpcFailure {
    fn from(err: AdminError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_portal;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use recruit_flow::config::PipelineConfig;
    use std::time::Duration;
    use tower::ServiceExt;

    fn build_router() -> Router {
        let config = PipelineConfig {
            coalesce_ttl: Duration::from_secs(30),
            event_buffer: 64,
        };
        let (portal, _events) = build_portal(&config);
        rpc_router(portal)
    }

    async fn rpc(router: &Router, action: &str, token: Option<&str>, data: Value) -> Value {
        let payload = json!({ "action": action, "token": token, "data": data });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/rpc")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&payload).expect("serialize request"),
            ))
            .expect("request");

        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router dispatch");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    async fn login(router: &Router, user_id: &str, role: &str) -> String {
        let response = rpc(
            router,
            "AUTH_LOGIN",
            None,
            json!({ "userId": user_id, "role": role }),
        )
        .await;
        assert_eq!(response["ok"], json!(true), "login failed: {response}");
        response["data"]["token"]
            .as_str()
            .expect("token string")
            .to_string()
    }

    fn error_code(response: &Value) -> &str {
        response["error"]["code"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn owner_flow_round_trips_through_the_envelope() {
        let router = build_router();
        let admin = login(&router, "admin@portal", "ADMIN").await;

        let registered = rpc(
            &router,
            "CANDIDATE_REGISTER",
            Some(&admin),
            json!({
                "candidateId": "C1",
                "requirementId": "R1",
                "fullName": "Dana Example",
                "jobRole": "Backend Engineer",
            }),
        )
        .await;
        assert_eq!(registered["ok"], json!(true));
        assert_eq!(registered["data"]["status"], json!("HR_REVIEW"));

        let reference = json!({ "candidateId": "C1", "requirementId": "R1" });
        let approved = rpc(&router, "HR_REVIEW_APPROVE", Some(&admin), reference.clone()).await;
        assert_eq!(approved["data"]["status"], json!("OWNER"));

        let walkin = rpc(
            &router,
            "OWNER_DECIDE",
            Some(&admin),
            json!({
                "candidateId": "C1",
                "requirementId": "R1",
                "decision": "APPROVE_WALKIN",
            }),
        )
        .await;
        assert_eq!(walkin["ok"], json!(true));
        assert_eq!(walkin["data"]["status"], json!("WALKIN"));

        // The same decision again is no longer legal.
        let repeat = rpc(
            &router,
            "OWNER_DECIDE",
            Some(&admin),
            json!({
                "candidateId": "C1",
                "requirementId": "R1",
                "decision": "APPROVE_WALKIN",
            }),
        )
        .await;
        assert_eq!(repeat["ok"], json!(false));
        assert_eq!(error_code(&repeat), "ILLEGAL_TRANSITION");
    }

    #[tokio::test]
    async fn rbac_denied_names_the_offending_role() {
        let router = build_router();
        let ea = login(&router, "ea@portal", "EA").await;

        let response = rpc(
            &router,
            "CANDIDATE_REGISTER",
            Some(&ea),
            json!({ "candidateId": "C1", "requirementId": "R1" }),
        )
        .await;

        assert_eq!(response["ok"], json!(false));
        assert_eq!(error_code(&response), "RBAC_DENIED");
        assert!(response["error"]["message"]
            .as_str()
            .unwrap_or_default()
            .contains("Not allowed for role: EA"));
    }

    #[tokio::test]
    async fn missing_token_is_denied() {
        let router = build_router();
        let response = rpc(
            &router,
            "OWNER_CANDIDATES_LIST",
            None,
            Value::Object(Default::default()),
        )
        .await;
        assert_eq!(response["ok"], json!(false));
        assert_eq!(error_code(&response), "RBAC_DENIED");
    }

    #[tokio::test]
    async fn reject_without_remark_is_validation() {
        let router = build_router();
        let admin = login(&router, "admin@portal", "ADMIN").await;
        rpc(
            &router,
            "CANDIDATE_REGISTER",
            Some(&admin),
            json!({ "candidateId": "C1", "requirementId": "R1" }),
        )
        .await;
        rpc(
            &router,
            "HR_REVIEW_APPROVE",
            Some(&admin),
            json!({ "candidateId": "C1", "requirementId": "R1" }),
        )
        .await;

        let response = rpc(
            &router,
            "OWNER_DECIDE",
            Some(&admin),
            json!({
                "candidateId": "C1",
                "requirementId": "R1",
                "decision": "REJECT",
                "remark": "   ",
            }),
        )
        .await;
        assert_eq!(response["ok"], json!(false));
        assert_eq!(error_code(&response), "VALIDATION");
    }

    #[tokio::test]
    async fn permission_rules_round_trip_in_csv_form() {
        let router = build_router();
        let admin = login(&router, "admin@portal", "ADMIN").await;

        let upserted = rpc(
            &router,
            "PERMISSIONS_UPSERT",
            Some(&admin),
            json!({
                "items": [{
                    "permType": "ACTION",
                    "permKey": "OWNER_DECIDE",
                    "rolesCsv": "admin",
                    "enabled": true,
                }],
            }),
        )
        .await;
        assert_eq!(upserted["ok"], json!(true));

        let listed = rpc(
            &router,
            "PERMISSIONS_LIST",
            Some(&admin),
            json!({ "permType": "ACTION" }),
        )
        .await;
        let items = listed["data"]["items"].as_array().expect("items array");
        let rule = items
            .iter()
            .find(|item| item["permKey"] == json!("OWNER_DECIDE"))
            .expect("rule listed");
        assert_eq!(rule["rolesCsv"], json!("ADMIN"));
        assert_eq!(rule["updatedBy"], json!("admin@portal"));
    }

    #[tokio::test]
    async fn deactivated_role_cannot_login() {
        let router = build_router();
        let admin = login(&router, "admin@portal", "ADMIN").await;

        let saved = rpc(
            &router,
            "ROLES_UPSERT",
            Some(&admin),
            json!({ "roleCode": "MIS", "status": "INACTIVE" }),
        )
        .await;
        assert_eq!(saved["ok"], json!(true));

        let response = rpc(
            &router,
            "AUTH_LOGIN",
            None,
            json!({ "userId": "mis@portal", "role": "MIS" }),
        )
        .await;
        assert_eq!(response["ok"], json!(false));
        assert_eq!(error_code(&response), "RBAC_DENIED");
    }

    #[tokio::test]
    async fn unknown_action_is_validation() {
        let router = build_router();
        let admin = login(&router, "admin@portal", "ADMIN").await;
        let response = rpc(
            &router,
            "CANDIDATE_DELETE",
            Some(&admin),
            Value::Object(Default::default()),
        )
        .await;
        assert_eq!(response["ok"], json!(false));
        assert_eq!(error_code(&response), "VALIDATION");
    }
}
