use crate::infra::build_portal;
use chrono::{Duration, Utc};
use clap::Args;
use recruit_flow::config::PipelineConfig;
use recruit_flow::error::AppError;
use recruit_flow::pipeline::{
    Actor, CandidateKey, CandidateProfile, FinalDecision, OwnerDecision, PipelineAction,
    TransitionPayload,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the rejection and revert portion of the demo.
    #[arg(long)]
    pub(crate) skip_revert: bool,
}

/// Drive one candidate from registration to probation and, unless skipped,
/// reject and revert a second candidate to show the ledger behavior.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = PipelineConfig {
        coalesce_ttl: std::time::Duration::from_secs(30),
        event_buffer: 64,
    };
    let (portal, events) = build_portal(&config);

    let hr = Actor::new("hr@portal", "HR");
    let owner = Actor::new("owner@portal", "OWNER");
    let admin = Actor::new("admin@portal", "ADMIN");

    println!("Recruitment pipeline demo");

    let key = CandidateKey::new("C-1001", "REQ-42");
    let profile = CandidateProfile {
        full_name: "Dana Example".to_string(),
        phone: "555-0100".to_string(),
        email: "dana@example.com".to_string(),
        job_role: "Backend Engineer".to_string(),
        source: "Referral".to_string(),
    };
    let candidate = portal
        .service
        .register(&hr, key.clone(), profile)?;
    println!("\nRegistered {} at {}", key, candidate.status);

    let happy_path = [
        (PipelineAction::HrReviewApprove, &hr),
        (
            PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin),
            &owner,
        ),
        (PipelineAction::WalkinComplete, &hr),
        (PipelineAction::PrecallComplete, &hr),
        (PipelineAction::PreInterviewPass, &hr),
        (PipelineAction::InpersonPass, &hr),
        (PipelineAction::FinalSendOwner, &hr),
        (
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            &owner,
        ),
        (PipelineAction::JoiningConfirm, &hr),
    ];
    for (action, actor) in happy_path {
        let candidate = portal
            .service
            .transition(actor, &key, action, TransitionPayload::default())?;
        println!("- {} ({}) -> {}", action, actor.role, candidate.status);
    }

    if !args.skip_revert {
        println!("\nRejection and revert");
        let key = CandidateKey::new("C-1002", "REQ-42");
        portal
            .service
            .register(&hr, key.clone(), CandidateProfile::default())?;
        portal
            .service
            .transition(
                &hr,
                &key,
                PipelineAction::HrReviewApprove,
                TransitionPayload::default(),
            )?;

        let hold_until = Utc::now() + Duration::days(2);
        let held = portal
            .service
            .transition(
                &owner,
                &key,
                PipelineAction::OwnerDecide(OwnerDecision::Hold),
                TransitionPayload::with_hold_until(hold_until),
            )?;
        println!(
            "- held {} until {}",
            key,
            held.hold_until.unwrap_or(hold_until)
        );

        let rejected = portal
            .service
            .transition(
                &owner,
                &key,
                PipelineAction::OwnerDecide(OwnerDecision::Reject),
                TransitionPayload::with_remark("Role requirements changed"),
            )?;
        println!("- rejected {} from {}", key, rejected.status);

        let reverted = portal
            .service
            .revert_latest(&admin, &key, "Requirement reopened")?;
        println!("- reverted {} back to {}", key, reverted.status);

        println!("\nRejection history for {key}");
        for entry in portal.service.rejection_log(&admin, &key)? {
            println!(
                "- [{}] {} by {} ({}): {}",
                entry.at, entry.stage_tag, entry.actor_role, entry.actor_user_id, entry.remark
            );
        }
    }

    let delivered = events.subscribe();
    let mut published = 0;
    while delivered.try_recv().is_ok() {
        published += 1;
    }
    println!("\nNotifications published: {published}");

    Ok(())
}
