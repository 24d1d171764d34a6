use super::common::*;
use crate::pipeline::domain::Status;
use crate::pipeline::repository::{CandidateRepository, RepositoryError};
use crate::pipeline::service::PipelineError;
use crate::pipeline::transitions::{
    FinalDecision, OwnerDecision, PipelineAction, TransitionError, TransitionPayload,
};

#[test]
fn full_pipeline_reaches_probation() {
    let (service, repository, _, _) = build_service();
    let key = register(&service, "C1");

    let hired = advance_to(&service, &key, Status::Hired);
    assert_eq!(hired.status, Status::Hired);

    let confirmed = service
        .transition(
            &hr(),
            &key,
            PipelineAction::JoiningConfirm,
            TransitionPayload::default(),
        )
        .expect("joining confirm succeeds");
    assert_eq!(confirmed.status, Status::Probation);

    let stored = repository
        .fetch(&key)
        .expect("fetch")
        .expect("candidate present");
    assert_eq!(stored.candidate.status, Status::Probation);
    // register + eight pipeline steps + joining confirm
    assert_eq!(stored.version, 10);
}

#[test]
fn illegal_transition_leaves_record_unchanged() {
    let (service, repository, ledger, _) = build_service();
    let key = register(&service, "C1");
    let before = repository.fetch(&key).expect("fetch").expect("present");

    let err = service
        .transition(
            &owner(),
            &key,
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            TransitionPayload::default(),
        )
        .expect_err("HR_REVIEW cannot take a final decision");
    assert!(matches!(
        err,
        PipelineError::Transition(TransitionError::IllegalTransition { .. })
    ));

    let after = repository.fetch(&key).expect("fetch").expect("present");
    assert_eq!(before, after);
    assert!(ledger.list(&key).expect("list").is_empty());
}

#[test]
fn authorization_is_checked_before_legality() {
    let (service, _, _, _) = build_service();
    let key = register(&service, "C1");

    // The candidate is nowhere near FINAL_OWNER_PENDING, but HR must be
    // denied before the state machine even looks at the status.
    let err = service
        .transition(
            &hr(),
            &key,
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            TransitionPayload::default(),
        )
        .expect_err("HR cannot take owner decisions");
    assert!(matches!(err, PipelineError::Access(_)));
}

#[test]
fn duplicate_registration_conflicts() {
    let (service, _, _, _) = build_service();
    let key = register(&service, "C1");

    let err = service
        .register(&hr(), key, profile("C1"))
        .expect_err("duplicate key rejected");
    assert!(matches!(
        err,
        PipelineError::Repository(RepositoryError::Conflict)
    ));
}

#[test]
fn registration_requires_permission() {
    let (service, _, _, _) = build_service();
    let err = service
        .register(
            &ea(),
            crate::pipeline::domain::CandidateKey::new("C1", "R1"),
            profile("C1"),
        )
        .expect_err("EA cannot register candidates");
    assert!(matches!(err, PipelineError::Access(_)));
}

#[test]
fn transitions_publish_notifications() {
    let (service, _, _, events) = build_service();
    let receiver = events.subscribe();

    let key = register(&service, "C1");
    service
        .transition(
            &hr(),
            &key,
            PipelineAction::HrReviewApprove,
            TransitionPayload::default(),
        )
        .expect("approve succeeds");

    let registered = receiver.try_recv().expect("registration event");
    assert!(registered.message.contains("HR_REVIEW"));
    let moved = receiver.try_recv().expect("transition event");
    assert!(moved.message.contains("HR_REVIEW -> OWNER"));
}

#[test]
fn stale_writer_gets_a_conflict() {
    let (service, repository, _, _) = build_service();
    let key = register(&service, "C1");

    let snapshot = repository.fetch(&key).expect("fetch").expect("present");

    // Another actor advances the candidate while our snapshot is stale.
    service
        .transition(
            &hr(),
            &key,
            PipelineAction::HrReviewApprove,
            TransitionPayload::default(),
        )
        .expect("approve succeeds");

    let err = repository
        .update(snapshot.candidate, snapshot.version)
        .expect_err("stale version must lose");
    assert!(matches!(err, RepositoryError::VersionConflict));
}

#[test]
fn owner_approves_walkin_from_hold() {
    let (service, _, _, _) = build_service();
    let key = register(&service, "C1");
    advance_to(&service, &key, Status::Owner);

    let held = service
        .transition(
            &owner(),
            &key,
            PipelineAction::OwnerDecide(OwnerDecision::Hold),
            TransitionPayload::with_hold_until(chrono::Utc::now() + chrono::Duration::days(2)),
        )
        .expect("hold succeeds");
    assert_eq!(held.status, Status::OwnerHold);

    let approved = service
        .transition(
            &owner(),
            &key,
            PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin),
            TransitionPayload::default(),
        )
        .expect("approval from hold succeeds");
    assert_eq!(approved.status, Status::Walkin);
    assert!(approved.hold_until.is_none());
}
