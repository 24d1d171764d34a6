use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::Status;

/// Owner verdict on a candidate awaiting walk-in approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerDecision {
    ApproveWalkin,
    Hold,
    Reject,
}

/// Owner verdict on a candidate awaiting the final hiring decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalDecision {
    Select,
    Hold,
    Reject,
}

/// Fixed catalogue of pipeline transitions. Each action carries the
/// permission key it is gated by and the declarative legality rules below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    HrReviewApprove,
    OwnerDecide(OwnerDecision),
    WalkinComplete,
    PrecallComplete,
    PreInterviewPass,
    InpersonPass,
    FinalSendOwner,
    OwnerFinalDecide(FinalDecision),
    StageReject,
    RejectRevert,
    HoldRevert,
    JoiningConfirm,
}

impl PipelineAction {
    /// The ACTION permission key checked before anything else. Note the
    /// revert key is distinct from the rejection keys: reverting requires
    /// its own elevated grant, never the original rejection grant.
    pub const fn action_key(self) -> &'static str {
        match self {
            PipelineAction::HrReviewApprove => "HR_REVIEW_APPROVE",
            PipelineAction::OwnerDecide(_) => "OWNER_DECIDE",
            PipelineAction::WalkinComplete => "WALKIN_COMPLETE",
            PipelineAction::PrecallComplete => "PRECALL_COMPLETE",
            PipelineAction::PreInterviewPass => "PRE_INTERVIEW_PASS",
            PipelineAction::InpersonPass => "INPERSON_PASS",
            PipelineAction::FinalSendOwner => "FINAL_SEND_OWNER",
            PipelineAction::OwnerFinalDecide(_) => "OWNER_FINAL_DECIDE",
            PipelineAction::StageReject => "CANDIDATE_REJECT",
            PipelineAction::RejectRevert => "REJECT_REVERT",
            PipelineAction::HoldRevert => "HOLD_REVERT",
            PipelineAction::JoiningConfirm => "JOINING_CONFIRM",
        }
    }

    /// Reason code recorded on ledger entries produced by this action.
    pub const fn rejection_reason(self) -> Option<&'static str> {
        match self {
            PipelineAction::OwnerDecide(OwnerDecision::Reject) => Some("OWNER_REJECT"),
            PipelineAction::OwnerFinalDecide(FinalDecision::Reject) => Some("OWNER_FINAL_REJECT"),
            PipelineAction::StageReject => Some("STAGE_REJECT"),
            _ => None,
        }
    }

    pub const fn is_rejection(self) -> bool {
        self.rejection_reason().is_some()
    }
}

impl fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineAction::OwnerDecide(decision) => {
                write!(f, "OWNER_DECIDE({decision:?})")
            }
            PipelineAction::OwnerFinalDecide(decision) => {
                write!(f, "OWNER_FINAL_DECIDE({decision:?})")
            }
            other => f.write_str(other.action_key()),
        }
    }
}

/// Where a transition lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Fixed(Status),
    /// Back to the status recorded in the rejection pointer.
    RejectedFrom,
    /// Back to the stage the hold suspended: `OWNER_HOLD` resumes at
    /// `OWNER`, `FINAL_HOLD` at `FINAL_OWNER_PENDING`.
    HeldFrom,
}

/// Declarative legality rules for one action.
pub struct TransitionSpec {
    pub sources: &'static [Status],
    pub target: Target,
    pub requires_remark: bool,
    pub requires_hold_deadline: bool,
}

/// The legal-transition table. Anything not listed here is an illegal
/// transition by construction.
pub const fn spec(action: PipelineAction) -> TransitionSpec {
    match action {
        PipelineAction::HrReviewApprove => TransitionSpec {
            sources: &[Status::HrReview],
            target: Target::Fixed(Status::Owner),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin) => TransitionSpec {
            sources: &[Status::Owner, Status::OwnerHold],
            target: Target::Fixed(Status::Walkin),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::OwnerDecide(OwnerDecision::Hold) => TransitionSpec {
            sources: &[Status::Owner],
            target: Target::Fixed(Status::OwnerHold),
            requires_remark: false,
            requires_hold_deadline: true,
        },
        PipelineAction::OwnerDecide(OwnerDecision::Reject) => TransitionSpec {
            sources: &[Status::Owner, Status::OwnerHold],
            target: Target::Fixed(Status::Rejected),
            requires_remark: true,
            requires_hold_deadline: false,
        },
        PipelineAction::WalkinComplete => TransitionSpec {
            sources: &[Status::Walkin],
            target: Target::Fixed(Status::Precall),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::PrecallComplete => TransitionSpec {
            sources: &[Status::Precall],
            target: Target::Fixed(Status::PreInterview),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::PreInterviewPass => TransitionSpec {
            sources: &[Status::PreInterview],
            target: Target::Fixed(Status::InpersonTech),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::InpersonPass => TransitionSpec {
            sources: &[Status::InpersonTech],
            target: Target::Fixed(Status::FinalInterview),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::FinalSendOwner => TransitionSpec {
            sources: &[Status::FinalInterview],
            target: Target::Fixed(Status::FinalOwnerPending),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::OwnerFinalDecide(FinalDecision::Select) => TransitionSpec {
            sources: &[Status::FinalOwnerPending],
            target: Target::Fixed(Status::Hired),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        // The final hold takes no deadline; expired final holds are swept by
        // the explicit no-show auto-reject.
        PipelineAction::OwnerFinalDecide(FinalDecision::Hold) => TransitionSpec {
            sources: &[Status::FinalOwnerPending],
            target: Target::Fixed(Status::FinalHold),
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::OwnerFinalDecide(FinalDecision::Reject) => TransitionSpec {
            sources: &[Status::FinalOwnerPending],
            target: Target::Fixed(Status::Rejected),
            requires_remark: true,
            requires_hold_deadline: false,
        },
        PipelineAction::StageReject => TransitionSpec {
            sources: &[
                Status::HrReview,
                Status::Walkin,
                Status::Precall,
                Status::PreInterview,
                Status::InpersonTech,
                Status::FinalInterview,
                Status::FinalHold,
                Status::Hired,
            ],
            target: Target::Fixed(Status::Rejected),
            requires_remark: true,
            requires_hold_deadline: false,
        },
        PipelineAction::RejectRevert => TransitionSpec {
            sources: &[Status::Rejected],
            target: Target::RejectedFrom,
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::HoldRevert => TransitionSpec {
            sources: &[Status::OwnerHold, Status::FinalHold],
            target: Target::HeldFrom,
            requires_remark: false,
            requires_hold_deadline: false,
        },
        PipelineAction::JoiningConfirm => TransitionSpec {
            sources: &[Status::Hired],
            target: Target::Fixed(Status::Probation),
            requires_remark: false,
            requires_hold_deadline: false,
        },
    }
}

/// Stage a hold resumes at. Holds are only reachable from one stage each,
/// so the mapping is total over the hold statuses.
pub const fn hold_resume_status(held: Status) -> Option<Status> {
    match held {
        Status::OwnerHold => Some(Status::Owner),
        Status::FinalHold => Some(Status::FinalOwnerPending),
        _ => None,
    }
}

/// Caller-supplied data accompanying a transition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub hold_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason_code: Option<String>,
}

impl TransitionPayload {
    pub fn with_remark(remark: impl Into<String>) -> Self {
        Self {
            remark: remark.into(),
            ..Self::default()
        }
    }

    pub fn with_hold_until(hold_until: DateTime<Utc>) -> Self {
        Self {
            hold_until: Some(hold_until),
            ..Self::default()
        }
    }

    pub fn trimmed_remark(&self) -> &str {
        self.remark.trim()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransitionError {
    #[error("action {action} is not legal from status {status}")]
    IllegalTransition { action: String, status: Status },
    #[error("{0}")]
    Validation(String),
}

/// Payload checks shared by the service. Runs after the legality check, so
/// validation failures never mask illegal transitions.
pub fn validate_payload(
    action: PipelineAction,
    payload: &TransitionPayload,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    let spec = spec(action);

    if spec.requires_remark && payload.trimmed_remark().is_empty() {
        return Err(TransitionError::Validation("Remark required".to_string()));
    }

    if spec.requires_hold_deadline {
        match payload.hold_until {
            None => {
                return Err(TransitionError::Validation(
                    "Select hold deadline".to_string(),
                ));
            }
            Some(deadline) if deadline <= now => {
                return Err(TransitionError::Validation(
                    "Hold deadline must be in the future".to_string(),
                ));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn every_action_key_is_screaming_snake() {
        let actions = [
            PipelineAction::HrReviewApprove,
            PipelineAction::OwnerDecide(OwnerDecision::Hold),
            PipelineAction::FinalSendOwner,
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            PipelineAction::StageReject,
            PipelineAction::RejectRevert,
            PipelineAction::HoldRevert,
            PipelineAction::JoiningConfirm,
        ];
        for action in actions {
            let key = action.action_key();
            assert!(!key.is_empty());
            assert!(key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn reject_actions_declare_remark_and_reason() {
        for action in [
            PipelineAction::OwnerDecide(OwnerDecision::Reject),
            PipelineAction::OwnerFinalDecide(FinalDecision::Reject),
            PipelineAction::StageReject,
        ] {
            assert!(spec(action).requires_remark);
            assert!(action.rejection_reason().is_some());
        }
    }

    #[test]
    fn hold_requires_strictly_future_deadline() {
        let now = Utc::now();
        let action = PipelineAction::OwnerDecide(OwnerDecision::Hold);

        let missing = TransitionPayload::default();
        assert!(matches!(
            validate_payload(action, &missing, now),
            Err(TransitionError::Validation(_))
        ));

        let exact = TransitionPayload::with_hold_until(now);
        assert!(matches!(
            validate_payload(action, &exact, now),
            Err(TransitionError::Validation(_))
        ));

        let future = TransitionPayload::with_hold_until(now + Duration::hours(1));
        assert!(validate_payload(action, &future, now).is_ok());
    }

    #[test]
    fn whitespace_remark_fails_reject_validation() {
        let now = Utc::now();
        let payload = TransitionPayload::with_remark("   \t ");
        assert!(matches!(
            validate_payload(PipelineAction::StageReject, &payload, now),
            Err(TransitionError::Validation(_))
        ));
    }

    #[test]
    fn hold_resume_is_total_over_hold_statuses() {
        assert_eq!(hold_resume_status(Status::OwnerHold), Some(Status::Owner));
        assert_eq!(
            hold_resume_status(Status::FinalHold),
            Some(Status::FinalOwnerPending)
        );
        assert_eq!(hold_resume_status(Status::Precall), None);
    }

    #[test]
    fn no_transition_leaves_a_terminal_stage() {
        let actions = [
            PipelineAction::HrReviewApprove,
            PipelineAction::OwnerDecide(OwnerDecision::ApproveWalkin),
            PipelineAction::OwnerDecide(OwnerDecision::Hold),
            PipelineAction::OwnerDecide(OwnerDecision::Reject),
            PipelineAction::WalkinComplete,
            PipelineAction::PrecallComplete,
            PipelineAction::PreInterviewPass,
            PipelineAction::InpersonPass,
            PipelineAction::FinalSendOwner,
            PipelineAction::OwnerFinalDecide(FinalDecision::Select),
            PipelineAction::OwnerFinalDecide(FinalDecision::Hold),
            PipelineAction::OwnerFinalDecide(FinalDecision::Reject),
            PipelineAction::StageReject,
            PipelineAction::RejectRevert,
            PipelineAction::HoldRevert,
            PipelineAction::JoiningConfirm,
        ];
        for action in actions {
            assert!(!spec(action).sources.contains(&Status::Probation));
        }
    }
}
