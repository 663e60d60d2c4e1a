//! User accounts held by the credential store.

use chrono::{DateTime, Utc};

use roster_core::UserId;

use crate::RoleKind;

/// Stored user account.
///
/// `role` is kept as the raw stored label; use [`User::role_kind`] for any
/// authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub group: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Parsed role; `None` for any unrecognized label (fails closed).
    pub fn role_kind(&self) -> Option<RoleKind> {
        RoleKind::parse(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role_kind() == Some(RoleKind::Admin)
    }
}

/// Input for account creation. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: RoleKind,
}

/// Partial update of an account; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<RoleKind>,
    pub is_active: Option<bool>,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    pub title: Option<String>,
    pub phone: Option<String>,
    pub group: Option<String>,
}

impl UserChanges {
    /// Whether this update changes role or activation state.
    pub fn touches_privileges(&self) -> bool {
        self.role.is_some() || self.is_active.is_some()
    }

    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        set(&mut user.username, &self.username);
        set(&mut user.email, &self.email);
        set(&mut user.password_hash, &self.password_hash);
        if let Some(role) = self.role {
            user.role = role.as_str().to_string();
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        set_opt(&mut user.avatar, &self.avatar);
        set_opt(&mut user.signature, &self.signature);
        set_opt(&mut user.title, &self.title);
        set_opt(&mut user.phone, &self.phone);
        set_opt(&mut user.group, &self.group);
        user.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(1),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            role: "user".into(),
            is_active: true,
            avatar: None,
            signature: None,
            title: None,
            phone: None,
            group: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unknown_stored_role_is_not_admin() {
        let mut user = alice();
        user.role = "ADMIN".into();
        assert_eq!(user.role_kind(), None);
        assert!(!user.is_admin());
    }

    #[test]
    fn apply_updates_only_present_fields() {
        let mut user = alice();
        let changes = UserChanges {
            email: Some("a@example.org".into()),
            phone: Some("555-0100".into()),
            ..Default::default()
        };
        assert!(!changes.touches_privileges());

        changes.apply(&mut user, Utc::now());
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "a@example.org");
        assert_eq!(user.phone.as_deref(), Some("555-0100"));
        assert_eq!(user.role, "user");
    }

    #[test]
    fn role_change_is_privileged() {
        let changes = UserChanges {
            role: Some(RoleKind::Admin),
            ..Default::default()
        };
        assert!(changes.touches_privileges());

        let mut user = alice();
        changes.apply(&mut user, Utc::now());
        assert!(user.is_admin());
    }
}
