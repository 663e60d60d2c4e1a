use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roster_core::PermissionId;

/// Permission code.
///
/// Codes are opaque strings (e.g. "attendance:manage"). There is no wildcard:
/// a caller holds a permission only if the exact code is in their set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(Cow<'static, str>);

impl PermissionCode {
    pub const fn from_static(code: &'static str) -> Self {
        Self(Cow::Borrowed(code))
    }

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Manage roles, permissions and their association.
pub const ROLE_MANAGE: PermissionCode = PermissionCode::from_static("role:manage");
/// Read attendance records.
pub const ATTENDANCE_VIEW: PermissionCode = PermissionCode::from_static("attendance:view");
/// Create, update and delete attendance records.
pub const ATTENDANCE_MANAGE: PermissionCode = PermissionCode::from_static("attendance:manage");

/// Permission codes the application checks, with display name and description.
pub const BUILTIN: [(PermissionCode, &str, &str); 3] = [
    (ROLE_MANAGE, "Manage roles", "Create, update and delete roles and permissions"),
    (ATTENDANCE_VIEW, "View attendance", "Read monthly attendance records"),
    (ATTENDANCE_MANAGE, "Manage attendance", "Create, update and delete attendance records"),
];

/// Deduplicated set of permission codes, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<PermissionCode>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &PermissionCode) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionCode> {
        self.0.iter()
    }

    /// Codes as plain strings, sorted.
    pub fn codes(&self) -> Vec<String> {
        self.0.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl FromIterator<PermissionCode> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Stored permission record.
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    pub id: PermissionId,
    pub code: PermissionCode,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub code: PermissionCode,
    pub name: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_deduplicates_and_sorts() {
        let set: PermissionSet = [
            ATTENDANCE_VIEW,
            ROLE_MANAGE,
            PermissionCode::new("attendance:view".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.len(), 2);
        assert_eq!(set.codes(), vec!["attendance:view", "role:manage"]);
    }

    #[test]
    fn static_and_owned_codes_compare_equal() {
        assert_eq!(ATTENDANCE_MANAGE, PermissionCode::new(String::from("attendance:manage")));
    }
}
