use std::collections::BTreeMap;

use super::domain::{PermType, RoleCode, RoleSet, RuleUpsert};

/// One entry of the canonical authorization policy.
pub struct PolicyEntry {
    pub perm_type: PermType,
    pub key: &'static str,
    pub roles: &'static [&'static str],
}

/// Canonical policy for every portal and action key. Both the default
/// dynamic rules and the compiled fallback table are generated from this
/// single list, so the two paths cannot drift.
pub const DEFAULT_POLICY: &[PolicyEntry] = &[
    // Action keys: state-changing pipeline operations.
    PolicyEntry { perm_type: PermType::Action, key: "CANDIDATE_REGISTER", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "HR_REVIEW_APPROVE", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "OWNER_DECIDE", roles: &["OWNER", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "WALKIN_COMPLETE", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "PRECALL_COMPLETE", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "PRE_INTERVIEW_PASS", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "INPERSON_PASS", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "FINAL_SEND_OWNER", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "OWNER_FINAL_DECIDE", roles: &["OWNER", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "CANDIDATE_REJECT", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "REJECT_REVERT", roles: &["ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "HOLD_REVERT", roles: &["OWNER", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "JOINING_CONFIRM", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "AUTO_REJECT_FINAL_NOSHOW", roles: &["ADMIN"] },
    // Action keys: gated reads.
    PolicyEntry { perm_type: PermType::Action, key: "OWNER_CANDIDATES_LIST", roles: &["OWNER", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "FINAL_INTERVIEW_LIST", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "REJECTION_LOG_LIST", roles: &["HR", "EA", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "PERMISSIONS_UPSERT", roles: &["ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "PERMISSIONS_LIST", roles: &["ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "ROLES_UPSERT", roles: &["ADMIN"] },
    PolicyEntry { perm_type: PermType::Action, key: "ROLES_LIST", roles: &["ADMIN"] },
    // UI keys: portal visibility.
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_ADMIN", roles: &["ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_OWNER", roles: &["OWNER", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_REVIEW", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_PRECALL", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_PREINTERVIEW", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_INPERSON", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_FINAL", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_FINAL_HOLD", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_JOINING", roles: &["HR", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_HR_PROBATION", roles: &["HR", "EA", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_REQUIREMENTS", roles: &["EA", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "PORTAL_REJECTION_LOG", roles: &["HR", "EA", "ADMIN"] },
    PolicyEntry { perm_type: PermType::Ui, key: "BTN_OWNER_APPROVE_WALKIN", roles: &["OWNER", "ADMIN"] },
];

/// Default dynamic rules seeded into a fresh permission store.
pub fn default_rules() -> Vec<RuleUpsert> {
    DEFAULT_POLICY
        .iter()
        .map(|entry| RuleUpsert {
            perm_type: entry.perm_type,
            perm_key: entry.key.to_string(),
            allowed_roles: entry.roles.iter().map(RoleCode::new).collect(),
            enabled: true,
        })
        .collect()
}

/// Compiled role table consulted when no dynamic rule exists for a key
/// (first paint, store unavailable). Built from [`DEFAULT_POLICY`].
pub struct FallbackTable {
    entries: BTreeMap<(PermType, String), RoleSet>,
}

impl FallbackTable {
    pub fn compiled() -> Self {
        let entries = DEFAULT_POLICY
            .iter()
            .map(|entry| {
                let roles: RoleSet = entry.roles.iter().map(RoleCode::new).collect();
                ((entry.perm_type, entry.key.to_string()), roles)
            })
            .collect();
        Self { entries }
    }

    /// `Some(answer)` when the key is known to the fallback, `None` when the
    /// key is absent entirely (callers must treat that as deny).
    pub fn lookup(&self, perm_type: PermType, perm_key: &str, role: &RoleCode) -> Option<bool> {
        self.entries
            .get(&(perm_type, super::domain::normalize_key(perm_key)))
            .map(|roles| roles.contains(role))
    }

    pub fn contains_key(&self, perm_type: PermType, perm_key: &str) -> bool {
        self.entries
            .contains_key(&(perm_type, super::domain::normalize_key(perm_key)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
