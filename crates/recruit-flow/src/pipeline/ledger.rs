use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::rbac::RoleCode;

use super::domain::{CandidateKey, RejectionType};

/// Immutable rejection history record. Entries are only ever appended; a
/// revert clears the candidate's denormalized pointer but never touches
/// this log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionLogEntry {
    pub log_id: String,
    pub at: DateTime<Utc>,
    pub stage_tag: String,
    pub remark: String,
    pub actor_role: RoleCode,
    pub actor_user_id: String,
    pub rejection_type: RejectionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reject_code: Option<String>,
}

impl RejectionLogEntry {
    /// Default identifier when no dedicated generator exists.
    pub fn composite_log_id(at: DateTime<Utc>, stage_tag: &str) -> String {
        format!("{}-{}", at.timestamp_millis(), stage_tag)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("rejection ledger unavailable: {0}")]
    Unavailable(String),
}

/// Append-only rejection history per candidate/requirement pair.
pub trait RejectionLedger: Send + Sync {
    /// Append an entry. Implementations keep `at` strictly monotonic per
    /// key, nudging stale or equal stamps forward.
    fn append(
        &self,
        key: &CandidateKey,
        entry: RejectionLogEntry,
    ) -> Result<RejectionLogEntry, LedgerError>;

    /// Full history, latest first (the consumer-facing convention).
    fn list(&self, key: &CandidateKey) -> Result<Vec<RejectionLogEntry>, LedgerError>;

    fn latest(&self, key: &CandidateKey) -> Result<Option<RejectionLogEntry>, LedgerError> {
        Ok(self.list(key)?.into_iter().next())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRejectionLedger {
    entries: Mutex<HashMap<CandidateKey, Vec<RejectionLogEntry>>>,
}

impl InMemoryRejectionLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RejectionLedger for InMemoryRejectionLedger {
    fn append(
        &self,
        key: &CandidateKey,
        mut entry: RejectionLogEntry,
    ) -> Result<RejectionLogEntry, LedgerError> {
        let mut guard = self.entries.lock().expect("ledger mutex poisoned");
        let log = guard.entry(key.clone()).or_default();

        if let Some(last) = log.last() {
            if entry.at <= last.at {
                let was_composite =
                    entry.log_id == RejectionLogEntry::composite_log_id(entry.at, &entry.stage_tag);
                entry.at = last.at + Duration::milliseconds(1);
                if was_composite {
                    entry.log_id = RejectionLogEntry::composite_log_id(entry.at, &entry.stage_tag);
                }
            }
        }

        log.push(entry.clone());
        Ok(entry)
    }

    fn list(&self, key: &CandidateKey) -> Result<Vec<RejectionLogEntry>, LedgerError> {
        let guard = self.entries.lock().expect("ledger mutex poisoned");
        let mut entries = guard.get(key).cloned().unwrap_or_default();
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(at: DateTime<Utc>, stage_tag: &str) -> RejectionLogEntry {
        RejectionLogEntry {
            log_id: RejectionLogEntry::composite_log_id(at, stage_tag),
            at,
            stage_tag: stage_tag.to_string(),
            remark: "not a fit".to_string(),
            actor_role: RoleCode::new("HR"),
            actor_user_id: "hr@portal".to_string(),
            rejection_type: RejectionType::Manual,
            auto_reject_code: None,
        }
    }

    #[test]
    fn list_returns_latest_first() {
        let ledger = InMemoryRejectionLedger::new();
        let key = CandidateKey::new("C1", "R1");
        let base = Utc::now();

        ledger.append(&key, entry(base, "PRECALL")).expect("append");
        ledger
            .append(&key, entry(base + Duration::hours(1), "OWNER"))
            .expect("append");

        let entries = ledger.list(&key).expect("list");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stage_tag, "OWNER");
        assert_eq!(entries[1].stage_tag, "PRECALL");
    }

    #[test]
    fn backdated_appends_are_nudged_forward() {
        let ledger = InMemoryRejectionLedger::new();
        let key = CandidateKey::new("C1", "R1");
        let base = Utc::now();

        ledger.append(&key, entry(base, "PRECALL")).expect("append");
        let stale = ledger
            .append(&key, entry(base - Duration::hours(1), "OWNER"))
            .expect("append");

        assert!(stale.at > base);
        assert_eq!(
            stale.log_id,
            RejectionLogEntry::composite_log_id(stale.at, "OWNER")
        );

        let latest = ledger.latest(&key).expect("latest").expect("present");
        assert_eq!(latest.stage_tag, "OWNER");
    }

    #[test]
    fn keys_are_isolated() {
        let ledger = InMemoryRejectionLedger::new();
        let first = CandidateKey::new("C1", "R1");
        let second = CandidateKey::new("C1", "R2");
        ledger
            .append(&first, entry(Utc::now(), "PRECALL"))
            .expect("append");

        assert_eq!(ledger.list(&first).expect("list").len(), 1);
        assert!(ledger.list(&second).expect("list").is_empty());
    }
}
