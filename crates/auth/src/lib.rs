//! `roster-auth`: authentication and authorization boundary.
//!
//! Password hashing, bearer tokens, role/permission resolution and the
//! authorization gate. This crate is intentionally decoupled from HTTP and
//! storage; role→permission lookups go through [`RolePermissionSource`].

pub mod authorize;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{
    authorize, authorize_admin, authorize_privileged_update, authorize_self_or_admin, evaluate,
    AuthzError, Policy,
};
pub use password::{hash_password, verify_login, verify_password, PasswordError};
pub use permissions::{NewPermission, Permission, PermissionCode, PermissionSet};
pub use principal::Principal;
pub use resolver::{resolve, resolve_kind, RolePermissionSource};
pub use roles::{NewRole, Role, RoleChanges, RoleKind};
pub use token::{validate_claims, Claims, TokenError, TokenService};
pub use user::{NewUser, User, UserChanges};
