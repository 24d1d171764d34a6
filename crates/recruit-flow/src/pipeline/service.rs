use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ErrorCode;
use crate::events::{Notification, NotificationHub};
use crate::rbac::gate::{AccessDenied, AuthorizationGate};
use crate::rbac::PermType;

use super::domain::{
    Actor, Candidate, CandidateKey, CandidateProfile, RejectionPointer, RejectionType, Status,
};
use super::ledger::{LedgerError, RejectionLedger, RejectionLogEntry};
use super::repository::{CandidateRepository, RepositoryError, VersionedCandidate};
use super::transitions::{
    self, OwnerDecision, PipelineAction, Target, TransitionError, TransitionPayload,
};

const AUTO_REJECT_CODE_FINAL_NOSHOW: &str = "FINAL_NOSHOW";

/// Applies authorized stage transitions. Preconditions run in a fixed
/// order, first failure wins: authorization, then current-state legality,
/// then payload validation. Effects commit through the repository's version
/// check, so concurrent transitions on one candidate serialize and the
/// loser surfaces a retryable conflict. No retry happens at this layer; a
/// retry here could duplicate ledger entries.
pub struct PipelineService<R, L> {
    repository: Arc<R>,
    ledger: Arc<L>,
    gate: Arc<AuthorizationGate>,
    events: Arc<NotificationHub>,
}

impl<R, L> PipelineService<R, L>
where
    R: CandidateRepository + 'static,
    L: RejectionLedger + 'static,
{
    pub fn new(
        repository: Arc<R>,
        ledger: Arc<L>,
        gate: Arc<AuthorizationGate>,
        events: Arc<NotificationHub>,
    ) -> Self {
        Self {
            repository,
            ledger,
            gate,
            events,
        }
    }

    /// Create a pipeline instance entering HR review.
    pub fn register(
        &self,
        actor: &Actor,
        key: CandidateKey,
        profile: CandidateProfile,
    ) -> Result<Candidate, PipelineError> {
        self.gate
            .authorize(PermType::Action, "CANDIDATE_REGISTER", &actor.role)?;

        let candidate = Candidate::register(key.clone(), profile, Utc::now());
        let stored = self.repository.insert(candidate)?;

        info!(candidate = %key, "candidate registered");
        self.events.publish(Notification::info(
            format!("pipeline_{key}_REGISTER"),
            "Candidate registered",
            format!("{key} entered {}", Status::HrReview),
        ));
        Ok(stored.candidate)
    }

    /// Apply one transition from the fixed action catalogue.
    pub fn transition(
        &self,
        actor: &Actor,
        key: &CandidateKey,
        action: PipelineAction,
        payload: TransitionPayload,
    ) -> Result<Candidate, PipelineError> {
        let spec = transitions::spec(action);
        self.gate
            .authorize(PermType::Action, action.action_key(), &actor.role)?;

        let VersionedCandidate {
            mut candidate,
            version,
        } = self
            .repository
            .fetch(key)?
            .ok_or(RepositoryError::NotFound)?;

        if !spec.sources.contains(&candidate.status) {
            return Err(TransitionError::IllegalTransition {
                action: action.to_string(),
                status: candidate.status,
            }
            .into());
        }

        let now = Utc::now();
        transitions::validate_payload(action, &payload, now)?;

        let prior_status = candidate.status;
        let target = match spec.target {
            Target::Fixed(status) => status,
            Target::RejectedFrom => candidate
                .rejection
                .as_ref()
                .map(|pointer| pointer.from_status)
                .ok_or_else(|| {
                    TransitionError::Validation("No rejection on record to revert".to_string())
                })?,
            Target::HeldFrom => transitions::hold_resume_status(candidate.status).ok_or(
                TransitionError::IllegalTransition {
                    action: action.to_string(),
                    status: candidate.status,
                },
            )?,
        };

        let mut pending_entry = None;
        if action.is_rejection() {
            let reason_code = payload
                .reason_code
                .clone()
                .unwrap_or_else(|| action.rejection_reason().unwrap_or_default().to_string());
            let stage_tag = prior_status.label().to_string();
            let remark = payload.trimmed_remark().to_string();

            candidate.rejection = Some(RejectionPointer {
                from_status: prior_status,
                reason_code,
                stage_tag: stage_tag.clone(),
                remark: remark.clone(),
                at: now,
            });
            pending_entry = Some(RejectionLogEntry {
                log_id: RejectionLogEntry::composite_log_id(now, &stage_tag),
                at: now,
                stage_tag,
                remark,
                actor_role: actor.role.clone(),
                actor_user_id: actor.user_id.clone(),
                rejection_type: RejectionType::Manual,
                auto_reject_code: None,
            });
        }

        match action {
            // Revert clears the denormalized pointer; the history stays.
            PipelineAction::RejectRevert => candidate.rejection = None,
            PipelineAction::OwnerDecide(OwnerDecision::Hold) => {
                candidate.hold_until = payload.hold_until;
            }
            PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin)
            | PipelineAction::HoldRevert => candidate.hold_until = None,
            _ => {}
        }

        candidate.status = target;
        candidate.status_changed_at = now;

        // The version check is the serialization point: once it wins, this
        // transition owns the record and the ledger append follows.
        let updated = self.repository.update(candidate, version)?;
        if let Some(entry) = pending_entry {
            self.ledger.append(key, entry)?;
        }

        info!(
            candidate = %key,
            from = %prior_status,
            to = %target,
            action = %action,
            actor_role = %actor.role,
            "candidate transitioned"
        );
        self.events.publish(Notification::info(
            format!("pipeline_{key}_{}", action.action_key()),
            "Candidate updated",
            format!("{key} moved {prior_status} -> {target}"),
        ));

        Ok(updated.candidate)
    }

    /// Reject every `FINAL_HOLD` candidate whose hold started at or before
    /// the cutoff. This is the explicit sweep invoked from the admin portal;
    /// hold expiry is never enforced by a background job.
    pub fn auto_reject_final_noshow(
        &self,
        actor: &Actor,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        self.gate
            .authorize(PermType::Action, "AUTO_REJECT_FINAL_NOSHOW", &actor.role)?;

        let mut rejected = 0;
        for stale in self.repository.list_by_status(&[Status::FinalHold])? {
            let key = stale.key();
            let Some(stored) = self.repository.fetch(&key)? else {
                continue;
            };
            let VersionedCandidate {
                mut candidate,
                version,
            } = stored;
            if candidate.status != Status::FinalHold || candidate.status_changed_at > cutoff {
                continue;
            }

            let now = Utc::now();
            let stage_tag = candidate.status.label().to_string();
            candidate.rejection = Some(RejectionPointer {
                from_status: Status::FinalHold,
                reason_code: AUTO_REJECT_CODE_FINAL_NOSHOW.to_string(),
                stage_tag: stage_tag.clone(),
                remark: "Final interview no-show".to_string(),
                at: now,
            });
            candidate.status = Status::Rejected;
            candidate.status_changed_at = now;

            match self.repository.update(candidate, version) {
                Ok(_) => {}
                // Raced by a concurrent decision; leave that record alone.
                Err(RepositoryError::VersionConflict) => continue,
                Err(err) => return Err(err.into()),
            }

            self.ledger.append(
                &key,
                RejectionLogEntry {
                    log_id: RejectionLogEntry::composite_log_id(now, &stage_tag),
                    at: now,
                    stage_tag,
                    remark: "Final interview no-show".to_string(),
                    actor_role: actor.role.clone(),
                    actor_user_id: actor.user_id.clone(),
                    rejection_type: RejectionType::Auto,
                    auto_reject_code: Some(AUTO_REJECT_CODE_FINAL_NOSHOW.to_string()),
                },
            )?;
            rejected += 1;
        }

        if rejected > 0 {
            info!(rejected, "final hold no-show sweep completed");
            self.events.publish(Notification::info(
                "pipeline_final_noshow_sweep",
                "Auto reject",
                format!("Rejected {rejected} final-hold no-shows"),
            ));
        }
        Ok(rejected)
    }

    /// Owner portal queue: approvals plus final decisions.
    pub fn owner_queue(&self, actor: &Actor) -> Result<Vec<Candidate>, PipelineError> {
        self.gate
            .authorize(PermType::Action, "OWNER_CANDIDATES_LIST", &actor.role)?;
        Ok(self.repository.list_by_status(&[
            Status::Owner,
            Status::OwnerHold,
            Status::FinalOwnerPending,
        ])?)
    }

    /// HR final-interview queue, including candidates already sent onward.
    pub fn final_interview_queue(&self, actor: &Actor) -> Result<Vec<Candidate>, PipelineError> {
        self.gate
            .authorize(PermType::Action, "FINAL_INTERVIEW_LIST", &actor.role)?;
        Ok(self
            .repository
            .list_by_status(&[Status::FinalInterview, Status::FinalOwnerPending])?)
    }

    /// All currently rejected candidates with their denormalized pointers.
    pub fn rejected_candidates(&self, actor: &Actor) -> Result<Vec<Candidate>, PipelineError> {
        self.gate
            .authorize(PermType::Action, "REJECTION_LOG_LIST", &actor.role)?;
        Ok(self.repository.list_by_status(&[Status::Rejected])?)
    }

    /// Full rejection history for one candidate, latest first.
    pub fn rejection_log(
        &self,
        actor: &Actor,
        key: &CandidateKey,
    ) -> Result<Vec<RejectionLogEntry>, PipelineError> {
        self.gate
            .authorize(PermType::Action, "REJECTION_LOG_LIST", &actor.role)?;
        Ok(self.ledger.list(key)?)
    }

    /// Revert the most recent rejection. Delegates into the state machine so
    /// the elevated `REJECT_REVERT` grant and the status restore rules apply
    /// identically to every caller.
    pub fn revert_latest(
        &self,
        actor: &Actor,
        key: &CandidateKey,
        remark: impl Into<String>,
    ) -> Result<Candidate, PipelineError> {
        self.transition(
            actor,
            key,
            PipelineAction::RejectRevert,
            TransitionPayload::with_remark(remark),
        )
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Access(_) => ErrorCode::RbacDenied,
            PipelineError::Transition(TransitionError::IllegalTransition { .. }) => {
                ErrorCode::IllegalTransition
            }
            PipelineError::Transition(TransitionError::Validation(_)) => ErrorCode::Validation,
            PipelineError::Repository(RepositoryError::NotFound) => ErrorCode::NotFound,
            PipelineError::Repository(
                RepositoryError::Conflict | RepositoryError::VersionConflict,
            ) => ErrorCode::Conflict,
            PipelineError::Repository(RepositoryError::Unavailable(_))
            | PipelineError::Ledger(_) => ErrorCode::UnknownError,
        }
    }
}
