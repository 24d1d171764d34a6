use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use super::domain::{Candidate, CandidateKey, Status};

/// Candidate record plus the version used for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionedCandidate {
    pub candidate: Candidate,
    pub version: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("candidate already exists")]
    Conflict,
    #[error("candidate not found")]
    NotFound,
    #[error("state changed, refresh and retry")]
    VersionConflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for pipeline instances. The version check in
/// `update` is the serialization point that prevents lost updates when two
/// actors race on the same candidate/requirement pair.
pub trait CandidateRepository: Send + Sync {
    fn insert(&self, candidate: Candidate) -> Result<VersionedCandidate, RepositoryError>;

    fn fetch(&self, key: &CandidateKey) -> Result<Option<VersionedCandidate>, RepositoryError>;

    fn update(
        &self,
        candidate: Candidate,
        expected_version: u64,
    ) -> Result<VersionedCandidate, RepositoryError>;

    fn list_by_status(&self, statuses: &[Status]) -> Result<Vec<Candidate>, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCandidateRepository {
    records: Mutex<HashMap<CandidateKey, VersionedCandidate>>,
}

impl InMemoryCandidateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CandidateRepository for InMemoryCandidateRepository {
    fn insert(&self, candidate: Candidate) -> Result<VersionedCandidate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = candidate.key();
        if guard.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }

        let stored = VersionedCandidate {
            candidate,
            version: 1,
        };
        guard.insert(key, stored.clone());
        Ok(stored)
    }

    fn fetch(&self, key: &CandidateKey) -> Result<Option<VersionedCandidate>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(key).cloned())
    }

    fn update(
        &self,
        candidate: Candidate,
        expected_version: u64,
    ) -> Result<VersionedCandidate, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = candidate.key();
        let current = guard.get(&key).ok_or(RepositoryError::NotFound)?;

        if current.version != expected_version {
            return Err(RepositoryError::VersionConflict);
        }

        let stored = VersionedCandidate {
            candidate,
            version: expected_version + 1,
        };
        guard.insert(key, stored.clone());
        Ok(stored)
    }

    fn list_by_status(&self, statuses: &[Status]) -> Result<Vec<Candidate>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matches: Vec<Candidate> = guard
            .values()
            .filter(|record| statuses.contains(&record.candidate.status))
            .map(|record| record.candidate.clone())
            .collect();
        matches.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(matches)
    }
}
