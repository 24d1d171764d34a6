use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uppercase role identifier (`ADMIN`, `HR`, `OWNER`, ...). Normalized on
/// construction so lookups never depend on caller casing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCode(String);

impl RoleCode {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ordered set of role codes. Business logic only ever sees this type; the
/// comma-separated encoding used on the wire and in storage lives at that
/// boundary alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleCode>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode from the portal's `"HR,ADMIN"` encoding. Blank segments are
    /// dropped, duplicates collapse, casing is normalized.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(RoleCode::new)
            .collect()
    }

    /// Encode back to the stable comma-separated form (sorted).
    pub fn to_csv(&self) -> String {
        self.0
            .iter()
            .map(RoleCode::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn contains(&self, role: &RoleCode) -> bool {
        self.0.contains(role)
    }

    pub fn insert(&mut self, role: RoleCode) -> bool {
        self.0.insert(role)
    }

    pub fn remove(&mut self, role: &RoleCode) -> bool {
        self.0.remove(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleCode> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RoleCode> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Permission bucket kind: `UI` keys gate visibility (portal sections and
/// buttons), `ACTION` keys gate state-changing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermType {
    Ui,
    Action,
}

impl PermType {
    pub const fn label(self) -> &'static str {
        match self {
            PermType::Ui => "UI",
            PermType::Action => "ACTION",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UI" => Some(PermType::Ui),
            "ACTION" => Some(PermType::Action),
            _ => None,
        }
    }
}

impl fmt::Display for PermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One live authorization rule, unique per `(perm_type, perm_key)`.
/// A disabled rule denies every role regardless of the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub perm_type: PermType,
    pub perm_key: String,
    pub allowed_roles: RoleSet,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Caller-supplied rule payload; the store stamps the audit fields. Upserts
/// replace the whole allow-list, so callers read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleUpsert {
    pub perm_type: PermType,
    pub perm_key: String,
    pub allowed_roles: RoleSet,
    pub enabled: bool,
}

impl RuleUpsert {
    pub fn normalized_key(&self) -> String {
        normalize_key(&self.perm_key)
    }
}

pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleStatus {
    Active,
    Inactive,
}

/// Registered staff role. Inactive roles keep their historical permission
/// rules but cannot log in or receive new grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_code: RoleCode,
    pub role_name: String,
    pub status: RoleStatus,
}

impl Role {
    pub fn active(code: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            role_code: RoleCode::new(code),
            role_name: name.into(),
            status: RoleStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RoleStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_set_csv_round_trips_through_normalization() {
        let set = RoleSet::from_csv(" hr, ADMIN ,,hr ");
        assert_eq!(set.len(), 2);
        assert!(set.contains(&RoleCode::new("HR")));
        assert_eq!(set.to_csv(), "ADMIN,HR");
    }

    #[test]
    fn perm_type_parses_case_insensitively() {
        assert_eq!(PermType::parse("action"), Some(PermType::Action));
        assert_eq!(PermType::parse(" Ui "), Some(PermType::Ui));
        assert_eq!(PermType::parse("PORTAL"), None);
    }
}
