use std::sync::Arc;

use crate::events::NotificationHub;
use crate::pipeline::domain::{Actor, Candidate, CandidateKey, CandidateProfile, Status};
use crate::pipeline::ledger::InMemoryRejectionLedger;
pub(super) use crate::pipeline::ledger::RejectionLedger;
use crate::pipeline::repository::InMemoryCandidateRepository;
use crate::pipeline::service::PipelineService;
use crate::pipeline::transitions::{
    FinalDecision, OwnerDecision, PipelineAction, TransitionPayload,
};
use crate::rbac::gate::AuthorizationGate;
use crate::rbac::policy::default_rules;
use crate::rbac::registry::InMemoryRoleRegistry;
use crate::rbac::store::{InMemoryPermissionStore, PermissionStore};

pub(super) type TestService = PipelineService<InMemoryCandidateRepository, InMemoryRejectionLedger>;

pub(super) fn admin() -> Actor {
    Actor::new("admin@portal", "ADMIN")
}

pub(super) fn hr() -> Actor {
    Actor::new("hr@portal", "HR")
}

pub(super) fn owner() -> Actor {
    Actor::new("owner@portal", "OWNER")
}

pub(super) fn ea() -> Actor {
    Actor::new("ea@portal", "EA")
}

pub(super) fn profile(full_name: &str) -> CandidateProfile {
    CandidateProfile {
        full_name: full_name.to_string(),
        phone: "555-0100".to_string(),
        email: format!("{}@example.com", full_name.to_ascii_lowercase()),
        job_role: "Backend Engineer".to_string(),
        source: "Referral".to_string(),
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryCandidateRepository>,
    Arc<InMemoryRejectionLedger>,
    Arc<NotificationHub>,
) {
    let registry = Arc::new(InMemoryRoleRegistry::with_builtin_roles());
    let store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new(registry));
    store
        .upsert_rules("system", default_rules())
        .expect("seed default rules");
    let gate = Arc::new(AuthorizationGate::new(store));

    let repository = Arc::new(InMemoryCandidateRepository::new());
    let ledger = Arc::new(InMemoryRejectionLedger::new());
    let events = Arc::new(NotificationHub::new(64));

    let service = PipelineService::new(
        repository.clone(),
        ledger.clone(),
        gate,
        events.clone(),
    );
    (service, repository, ledger, events)
}

pub(super) fn register(service: &TestService, candidate_id: &str) -> CandidateKey {
    let key = CandidateKey::new(candidate_id, "R1");
    service
        .register(&hr(), key.clone(), profile(candidate_id))
        .expect("registration succeeds");
    key
}

/// Walk a registered candidate forward to the requested stage using the
/// normally-permitted actors.
pub(super) fn advance_to(service: &TestService, key: &CandidateKey, wanted: Status) -> Candidate {
    let steps: [(PipelineAction, Actor, Status); 8] = [
        (PipelineAction::HrReviewApprove, hr(), Status::Owner),
        (
            PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin),
            owner(),
            Status::Walkin,
        ),
        (PipelineAction::WalkinComplete, hr(), Status::Precall),
        (PipelineAction::PrecallComplete, hr(), Status::PreInterview),
        (PipelineAction::PreInterviewPass, hr(), Status::InpersonTech),
        (PipelineAction::InpersonPass, hr(), Status::FinalInterview),
        (
            PipelineAction::FinalSendOwner,
            hr(),
            Status::FinalOwnerPending,
        ),
        (
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            owner(),
            Status::Hired,
        ),
    ];

    let mut current = None;
    for (action, actor, reached) in steps {
        let candidate = service
            .transition(&actor, key, action, TransitionPayload::default())
            .expect("pipeline step succeeds");
        assert_eq!(candidate.status, reached);
        current = Some(candidate);
        if reached == wanted {
            break;
        }
    }

    current.expect("at least one step ran")
}
