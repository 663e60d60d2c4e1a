use async_trait::async_trait;

use roster_attendance::{AttendanceChanges, AttendanceDay, NewAttendanceDay, Period};
use roster_auth::{
    NewPermission, NewRole, NewUser, Permission, PermissionCode, Role, RoleChanges, User,
    UserChanges,
};
use roster_core::{AttendanceId, Page, PermissionId, RoleId, UserId};

use super::StoreResult;

/// Credential store.
///
/// Username and email are unique; violating either is a `Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Users ordered by id.
    async fn list(&self, page: Page) -> StoreResult<Vec<User>>;

    async fn create(&self, new: NewUser) -> StoreResult<User>;

    async fn update(&self, id: UserId, changes: &UserChanges) -> StoreResult<User>;

    async fn delete(&self, id: UserId) -> StoreResult<()>;
}

/// Roles, permissions and the association between them.
#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn list_roles(&self, page: Page) -> StoreResult<Vec<Role>>;

    async fn get_role(&self, id: RoleId) -> StoreResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    async fn create_role(&self, new: NewRole) -> StoreResult<Role>;

    async fn update_role(&self, id: RoleId, changes: &RoleChanges) -> StoreResult<Role>;

    /// Also removes the role's permission associations.
    async fn delete_role(&self, id: RoleId) -> StoreResult<()>;

    /// Permissions attached to a role, ordered by code.
    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>>;

    async fn list_permissions(&self, page: Page) -> StoreResult<Vec<Permission>>;

    async fn get_permission(&self, id: PermissionId) -> StoreResult<Option<Permission>>;

    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>>;

    async fn create_permission(&self, new: NewPermission) -> StoreResult<Permission>;

    /// Also detaches the permission from every role.
    async fn delete_permission(&self, id: PermissionId) -> StoreResult<()>;

    /// `NotFound` if either side is missing, `Conflict` if already attached.
    async fn attach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()>;

    /// `NotFound` if either side is missing or the pair is not attached.
    async fn detach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()>;

    /// Codes attached to the role named exactly `role_name`; `None` if no such role.
    async fn permission_codes_for_role(
        &self,
        role_name: &str,
    ) -> StoreResult<Option<Vec<PermissionCode>>>;
}

/// Monthly attendance ledger.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Records ordered by id.
    async fn list(&self, page: Page) -> StoreResult<Vec<AttendanceDay>>;

    async fn by_period(&self, period: Period) -> StoreResult<Vec<AttendanceDay>>;

    /// The [`roster_attendance::RECENT_WINDOW`] newest records at or before
    /// `period`, newest first. Returns the window size and the requested page of it.
    async fn recent(&self, period: Period, page: Page) -> StoreResult<(u64, Vec<AttendanceDay>)>;

    async fn get(&self, id: AttendanceId) -> StoreResult<Option<AttendanceDay>>;

    async fn create(&self, new: NewAttendanceDay) -> StoreResult<AttendanceDay>;

    async fn update(
        &self,
        id: AttendanceId,
        changes: &AttendanceChanges,
    ) -> StoreResult<AttendanceDay>;

    async fn delete(&self, id: AttendanceId) -> StoreResult<()>;
}
