//! Persistence boundary for users, roles/permissions and attendance.
//!
//! Every store has a Postgres implementation and an in-memory one with the
//! same observable semantics (uniqueness, not-found, association rules).

pub mod in_memory;
pub mod postgres;
pub mod traits;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use roster_auth::{PermissionCode, RolePermissionSource};

pub use in_memory::{InMemoryAttendanceStore, InMemoryRbacStore, InMemoryUserStore};
pub use postgres::{PostgresAttendanceStore, PostgresRbacStore, PostgresUserStore};
pub use traits::{AttendanceStore, RbacStore, UserStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
impl<'a> RolePermissionSource for dyn RbacStore + 'a {
    type Error = StoreError;

    async fn permission_codes(
        &self,
        role_name: &str,
    ) -> Result<Option<Vec<PermissionCode>>, StoreError> {
        self.permission_codes_for_role(role_name).await
    }
}

/// The set of stores shared by request handlers.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub rbac: Arc<dyn RbacStore>,
    pub attendance: Arc<dyn AttendanceStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserStore::new()),
            rbac: Arc::new(InMemoryRbacStore::new()),
            attendance: Arc::new(InMemoryAttendanceStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            users: Arc::new(PostgresUserStore::new(pool.clone())),
            rbac: Arc::new(PostgresRbacStore::new(pool.clone())),
            attendance: Arc::new(PostgresAttendanceStore::new(pool)),
        }
    }
}
