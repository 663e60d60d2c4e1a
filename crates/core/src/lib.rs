//! `roster-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and pagination. No IO lives here.

pub mod error;
pub mod id;
pub mod page;

pub use error::{DomainError, DomainResult};
pub use id::{AttendanceId, PermissionId, RoleId, UserId};
pub use page::Page;
