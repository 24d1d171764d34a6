use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rbac::RoleCode;

/// Identifier wrapper for candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

/// Identifier wrapper for hiring requirements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(pub String);

/// Natural key of one pipeline instance. A candidate may run independent
/// pipelines for different requirements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateKey {
    pub candidate_id: CandidateId,
    pub requirement_id: RequirementId,
}

impl CandidateKey {
    pub fn new(candidate_id: impl Into<String>, requirement_id: impl Into<String>) -> Self {
        Self {
            candidate_id: CandidateId(candidate_id.into()),
            requirement_id: RequirementId(requirement_id.into()),
        }
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.candidate_id.0, self.requirement_id.0)
    }
}

/// Stage of the hiring pipeline. The main line runs from HR review to
/// probation; `OWNER`/`OWNER_HOLD` is the owner approval gate before the
/// walk-in, and `REJECTED` is reachable from every non-terminal stage and
/// reversible through the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    HrReview,
    Owner,
    OwnerHold,
    Walkin,
    Precall,
    PreInterview,
    InpersonTech,
    FinalInterview,
    FinalOwnerPending,
    FinalHold,
    Hired,
    Probation,
    Rejected,
}

impl Status {
    pub const fn label(self) -> &'static str {
        match self {
            Status::HrReview => "HR_REVIEW",
            Status::Owner => "OWNER",
            Status::OwnerHold => "OWNER_HOLD",
            Status::Walkin => "WALKIN",
            Status::Precall => "PRECALL",
            Status::PreInterview => "PRE_INTERVIEW",
            Status::InpersonTech => "INPERSON_TECH",
            Status::FinalInterview => "FINAL_INTERVIEW",
            Status::FinalOwnerPending => "FINAL_OWNER_PENDING",
            Status::FinalHold => "FINAL_HOLD",
            Status::Hired => "HIRED",
            Status::Probation => "PROBATION",
            Status::Rejected => "REJECTED",
        }
    }

    /// Stages this subsystem never moves a candidate out of. `REJECTED` is
    /// excluded: it is terminal for the pipeline but reversible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Status::Probation)
    }

    pub const ALL: [Status; 13] = [
        Status::HrReview,
        Status::Owner,
        Status::OwnerHold,
        Status::Walkin,
        Status::Precall,
        Status::PreInterview,
        Status::InpersonTech,
        Status::FinalInterview,
        Status::FinalOwnerPending,
        Status::FinalHold,
        Status::Hired,
        Status::Probation,
        Status::Rejected,
    ];
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity performing an operation, resolved server-side from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: RoleCode,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: impl AsRef<str>) -> Self {
        Self {
            user_id: user_id.into(),
            role: RoleCode::new(role),
        }
    }
}

/// Descriptive fields carried alongside the pipeline state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub job_role: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    Manual,
    Auto,
}

/// Denormalized view of the most recent rejection, kept on the candidate for
/// fast display. The authoritative history lives in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionPointer {
    pub from_status: Status,
    pub reason_code: String,
    pub stage_tag: String,
    pub remark: String,
    pub at: DateTime<Utc>,
}

/// One pipeline instance. Created once at `HR_REVIEW`, mutated exclusively
/// through authorized transitions, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub requirement_id: RequirementId,
    pub profile: CandidateProfile,
    pub status: Status,
    pub status_changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionPointer>,
    #[serde(default)]
    pub test_decisions: serde_json::Value,
}

impl Candidate {
    /// Fresh pipeline instance entering HR review.
    pub fn register(key: CandidateKey, profile: CandidateProfile, now: DateTime<Utc>) -> Self {
        Self {
            candidate_id: key.candidate_id,
            requirement_id: key.requirement_id,
            profile,
            status: Status::HrReview,
            status_changed_at: now,
            hold_until: None,
            rejection: None,
            test_decisions: serde_json::Value::Null,
        }
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            candidate_id: self.candidate_id.clone(),
            requirement_id: self.requirement_id.clone(),
        }
    }
}
