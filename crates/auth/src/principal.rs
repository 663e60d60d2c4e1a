use roster_core::UserId;

use crate::{PermissionSet, RoleKind};

/// A fully resolved caller for authorization decisions.
///
/// Built per request from the verified token subject, the subject's *current*
/// stored role and the permissions that role resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Option<RoleKind>,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn new(id: UserId, role: Option<RoleKind>, permissions: PermissionSet) -> Self {
        Self {
            id,
            role,
            permissions,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(RoleKind::Admin)
    }
}
