use roster_auth::{Principal, User};
use roster_core::UserId;

/// The authenticated caller of a request, with permissions resolved from the
/// caller's current stored role.
#[derive(Debug, Clone)]
pub struct CallerContext {
    user: User,
    principal: Principal,
}

impl CallerContext {
    pub fn new(user: User, principal: Principal) -> Self {
        Self { user, principal }
    }

    pub fn id(&self) -> UserId {
        self.principal.id
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Caller id attached to responses for the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);
