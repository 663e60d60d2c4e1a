use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roster_core::{DomainError, RoleId};

/// Role a user account can carry.
///
/// Stored role labels are parsed into this closed set at the boundary. A label
/// that is not exactly `"user"` or `"admin"` does not parse, and callers must
/// treat it as holding no permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    User,
    Admin,
}

impl RoleKind {
    /// Case-sensitive parse of a stored role label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "user" => Some(RoleKind::User),
            "admin" => Some(RoleKind::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::User => "user",
            RoleKind::Admin => "admin",
        }
    }
}

impl core::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RoleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleKind::parse(s)
            .ok_or_else(|| DomainError::validation(format!("role must be 'admin' or 'user', got '{s}'")))
    }
}

/// Named permission bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update of a role; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleChanges {
    pub fn apply(&self, role: &mut Role, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            role.name = name.clone();
        }
        if let Some(description) = &self.description {
            role.description = Some(description.clone());
        }
        role.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_exact_and_case_sensitive() {
        assert_eq!(RoleKind::parse("admin"), Some(RoleKind::Admin));
        assert_eq!(RoleKind::parse("user"), Some(RoleKind::User));
        assert_eq!(RoleKind::parse("Admin"), None);
        assert_eq!(RoleKind::parse(" admin"), None);
        assert_eq!(RoleKind::parse("superuser"), None);
    }

    #[test]
    fn from_str_reports_validation_error() {
        let err = "root".parse::<RoleKind>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn changes_only_touch_given_fields() {
        let now = Utc::now();
        let mut role = Role {
            id: RoleId::new(1),
            name: "auditor".into(),
            description: Some("reads things".into()),
            created_at: now,
            updated_at: now,
        };
        RoleChanges {
            name: None,
            description: Some("reads more things".into()),
        }
        .apply(&mut role, now);

        assert_eq!(role.name, "auditor");
        assert_eq!(role.description.as_deref(), Some("reads more things"));
    }
}
