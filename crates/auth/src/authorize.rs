//! Authorization gate.
//!
//! Every route is registered with a [`Policy`]; [`evaluate`] is the one place
//! those policies are checked. No IO happens here: the caller supplies a fully
//! resolved [`Principal`].

use thiserror::Error;

use roster_core::UserId;

use crate::{PermissionCode, Principal, UserChanges};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Authorization rule attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Any verified, active caller.
    Authenticated,
    /// Caller's resolved permissions must contain this code.
    Permission(PermissionCode),
    /// Caller's role must be exactly `admin`.
    Admin,
    /// Caller must be the target record's owner, or an admin.
    SelfOrAdmin,
}

impl Policy {
    pub fn permission(code: PermissionCode) -> Self {
        Self::Permission(code)
    }

    /// Whether this policy can only be decided once the target record is known.
    pub fn needs_target(&self) -> bool {
        matches!(self, Policy::SelfOrAdmin)
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Policy::Authenticated => f.write_str("authenticated"),
            Policy::Permission(code) => write!(f, "permission:{code}"),
            Policy::Admin => f.write_str("admin"),
            Policy::SelfOrAdmin => f.write_str("self-or-admin"),
        }
    }
}

/// Allow iff `required` is in the principal's resolved permission set.
pub fn authorize(principal: &Principal, required: &PermissionCode) -> Result<(), AuthzError> {
    if principal.permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "missing permission '{required}'"
        )))
    }
}

/// Allow when acting on one's own record, or when the caller is an admin.
pub fn authorize_self_or_admin(principal: &Principal, target: UserId) -> Result<(), AuthzError> {
    if principal.id == target || principal.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(
            "only the account owner or an admin may do this".to_string(),
        ))
    }
}

pub fn authorize_admin(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("admin role required".to_string()))
    }
}

/// Non-admins may edit their own profile but not their role or activation.
pub fn authorize_privileged_update(
    principal: &Principal,
    changes: &UserChanges,
) -> Result<(), AuthzError> {
    if changes.touches_privileges() && !principal.is_admin() {
        return Err(AuthzError::Forbidden(
            "only an admin may change role or activation".to_string(),
        ));
    }
    Ok(())
}

/// Evaluate a route policy.
///
/// `target` is the record owner for [`Policy::SelfOrAdmin`]; without one that
/// policy only admits admins.
pub fn evaluate(
    principal: &Principal,
    policy: &Policy,
    target: Option<UserId>,
) -> Result<(), AuthzError> {
    match policy {
        Policy::Authenticated => Ok(()),
        Policy::Permission(code) => authorize(principal, code),
        Policy::Admin => authorize_admin(principal),
        Policy::SelfOrAdmin => match target {
            Some(target) => authorize_self_or_admin(principal, target),
            None => authorize_admin(principal),
        },
    }
}
