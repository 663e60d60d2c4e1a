//! In-memory stores for development mode and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use roster_attendance::{AttendanceChanges, AttendanceDay, NewAttendanceDay, Period, RECENT_WINDOW};
use roster_auth::{
    NewPermission, NewRole, NewUser, Permission, PermissionCode, Role, RoleChanges, User,
    UserChanges,
};
use roster_core::{AttendanceId, Page, PermissionId, RoleId, UserId};

use super::traits::{AttendanceStore, RbacStore, UserStore};
use super::{StoreError, StoreResult};

// A poisoned lock only means another request panicked mid-write; the tables
// themselves stay structurally valid.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Table<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_user_unique(
    table: &Table<User>,
    except: Option<UserId>,
    username: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for user in table.rows.values().filter(|u| Some(u.id) != except) {
        if username == Some(user.username.as_str()) {
            return Err(StoreError::Conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }
        if email == Some(user.email.as_str()) {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(read(&self.inner).rows.get(&id.get()).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(read(&self.inner)
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(read(&self.inner)
            .rows
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, page: Page) -> StoreResult<Vec<User>> {
        Ok(page.slice(read(&self.inner).rows.values().cloned()))
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut table = write(&self.inner);
        check_user_unique(&table, None, Some(&new.username), Some(&new.email))?;

        let now = Utc::now();
        let user = User {
            id: UserId::new(table.allocate()),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role.as_str().to_string(),
            is_active: true,
            avatar: None,
            signature: None,
            title: None,
            phone: None,
            group: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id.get(), user.clone());
        Ok(user)
    }

    async fn update(&self, id: UserId, changes: &UserChanges) -> StoreResult<User> {
        let mut table = write(&self.inner);
        if !table.rows.contains_key(&id.get()) {
            return Err(StoreError::NotFound("user"));
        }
        check_user_unique(
            &table,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        )?;

        let user = table
            .rows
            .get_mut(&id.get())
            .ok_or(StoreError::NotFound("user"))?;
        changes.apply(user, Utc::now());
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        write(&self.inner)
            .rows
            .remove(&id.get())
            .map(|_| ())
            .ok_or(StoreError::NotFound("user"))
    }
}

#[derive(Debug, Default)]
struct RbacTables {
    roles: Table<Role>,
    permissions: Table<Permission>,
    links: BTreeSet<(RoleId, PermissionId)>,
}

impl RbacTables {
    fn codes_for(&self, role: RoleId) -> Vec<Permission> {
        let mut attached: Vec<Permission> = self
            .links
            .iter()
            .filter(|(r, _)| *r == role)
            .filter_map(|(_, p)| self.permissions.rows.get(&p.get()).cloned())
            .collect();
        attached.sort_by(|a, b| a.code.cmp(&b.code));
        attached
    }

    fn require_pair(&self, role: RoleId, permission: PermissionId) -> StoreResult<()> {
        if !self.roles.rows.contains_key(&role.get()) {
            return Err(StoreError::NotFound("role"));
        }
        if !self.permissions.rows.contains_key(&permission.get()) {
            return Err(StoreError::NotFound("permission"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    inner: RwLock<RbacTables>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn list_roles(&self, page: Page) -> StoreResult<Vec<Role>> {
        Ok(page.slice(read(&self.inner).roles.rows.values().cloned()))
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        Ok(read(&self.inner).roles.rows.get(&id.get()).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(read(&self.inner)
            .roles
            .rows
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn create_role(&self, new: NewRole) -> StoreResult<Role> {
        let mut tables = write(&self.inner);
        if tables.roles.rows.values().any(|r| r.name == new.name) {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                new.name
            )));
        }

        let now = Utc::now();
        let role = Role {
            id: RoleId::new(tables.roles.allocate()),
            name: new.name,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.rows.insert(role.id.get(), role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: RoleId, changes: &RoleChanges) -> StoreResult<Role> {
        let mut tables = write(&self.inner);
        if let Some(name) = &changes.name {
            if tables
                .roles
                .rows
                .values()
                .any(|r| r.id != id && &r.name == name)
            {
                return Err(StoreError::Conflict(format!("role '{name}' already exists")));
            }
        }

        let role = tables
            .roles
            .rows
            .get_mut(&id.get())
            .ok_or(StoreError::NotFound("role"))?;
        changes.apply(role, Utc::now());
        Ok(role.clone())
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let mut tables = write(&self.inner);
        tables
            .roles
            .rows
            .remove(&id.get())
            .ok_or(StoreError::NotFound("role"))?;
        tables.links.retain(|(r, _)| *r != id);
        Ok(())
    }

    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>> {
        Ok(read(&self.inner).codes_for(id))
    }

    async fn list_permissions(&self, page: Page) -> StoreResult<Vec<Permission>> {
        Ok(page.slice(read(&self.inner).permissions.rows.values().cloned()))
    }

    async fn get_permission(&self, id: PermissionId) -> StoreResult<Option<Permission>> {
        Ok(read(&self.inner).permissions.rows.get(&id.get()).cloned())
    }

    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>> {
        Ok(read(&self.inner)
            .permissions
            .rows
            .values()
            .find(|p| p.code.as_str() == code)
            .cloned())
    }

    async fn create_permission(&self, new: NewPermission) -> StoreResult<Permission> {
        let mut tables = write(&self.inner);
        if tables.permissions.rows.values().any(|p| p.code == new.code) {
            return Err(StoreError::Conflict(format!(
                "permission '{}' already exists",
                new.code
            )));
        }

        let permission = Permission {
            id: PermissionId::new(tables.permissions.allocate()),
            code: new.code,
            name: new.name,
            description: new.description,
            created_at: Utc::now(),
        };
        tables
            .permissions
            .rows
            .insert(permission.id.get(), permission.clone());
        Ok(permission)
    }

    async fn delete_permission(&self, id: PermissionId) -> StoreResult<()> {
        let mut tables = write(&self.inner);
        tables
            .permissions
            .rows
            .remove(&id.get())
            .ok_or(StoreError::NotFound("permission"))?;
        tables.links.retain(|(_, p)| *p != id);
        Ok(())
    }

    async fn attach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()> {
        let mut tables = write(&self.inner);
        tables.require_pair(role, permission)?;
        if !tables.links.insert((role, permission)) {
            return Err(StoreError::Conflict(
                "permission is already attached to this role".to_string(),
            ));
        }
        Ok(())
    }

    async fn detach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()> {
        let mut tables = write(&self.inner);
        tables.require_pair(role, permission)?;
        if !tables.links.remove(&(role, permission)) {
            return Err(StoreError::NotFound("role permission"));
        }
        Ok(())
    }

    async fn permission_codes_for_role(
        &self,
        role_name: &str,
    ) -> StoreResult<Option<Vec<PermissionCode>>> {
        let tables = read(&self.inner);
        let Some(role) = tables.roles.rows.values().find(|r| r.name == role_name) else {
            return Ok(None);
        };
        Ok(Some(
            tables
                .codes_for(role.id)
                .into_iter()
                .map(|p| p.code)
                .collect(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAttendanceStore {
    inner: RwLock<Table<AttendanceDay>>,
}

impl InMemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn period_of(day: &AttendanceDay) -> (i32, u32) {
    (day.year, day.month)
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn list(&self, page: Page) -> StoreResult<Vec<AttendanceDay>> {
        Ok(page.slice(read(&self.inner).rows.values().cloned()))
    }

    async fn by_period(&self, period: Period) -> StoreResult<Vec<AttendanceDay>> {
        let key = (period.year(), period.month());
        Ok(read(&self.inner)
            .rows
            .values()
            .filter(|d| period_of(d) == key)
            .cloned()
            .collect())
    }

    async fn recent(&self, period: Period, page: Page) -> StoreResult<(u64, Vec<AttendanceDay>)> {
        let upper = (period.year(), period.month());
        let mut window: Vec<AttendanceDay> = read(&self.inner)
            .rows
            .values()
            .filter(|d| period_of(d) <= upper)
            .cloned()
            .collect();
        window.sort_by(|a, b| {
            period_of(b)
                .cmp(&period_of(a))
                .then_with(|| b.id.cmp(&a.id))
        });
        window.truncate(RECENT_WINDOW);

        let total = window.len() as u64;
        Ok((total, page.slice(window)))
    }

    async fn get(&self, id: AttendanceId) -> StoreResult<Option<AttendanceDay>> {
        Ok(read(&self.inner).rows.get(&id.get()).cloned())
    }

    async fn create(&self, new: NewAttendanceDay) -> StoreResult<AttendanceDay> {
        let mut table = write(&self.inner);
        let day = new.into_record(AttendanceId::new(table.allocate()), Utc::now());
        table.rows.insert(day.id.get(), day.clone());
        Ok(day)
    }

    async fn update(
        &self,
        id: AttendanceId,
        changes: &AttendanceChanges,
    ) -> StoreResult<AttendanceDay> {
        let mut table = write(&self.inner);
        let day = table
            .rows
            .get_mut(&id.get())
            .ok_or(StoreError::NotFound("attendance record"))?;
        changes.apply(day, Utc::now());
        Ok(day.clone())
    }

    async fn delete(&self, id: AttendanceId) -> StoreResult<()> {
        write(&self.inner)
            .rows
            .remove(&id.get())
            .map(|_| ())
            .ok_or(StoreError::NotFound("attendance record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_auth::RoleKind;
    use roster_auth::permissions::{ATTENDANCE_MANAGE, ATTENDANCE_VIEW};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$stub".to_string(),
            role: RoleKind::User,
        }
    }

    #[tokio::test]
    async fn user_ids_are_sequential_and_unique_fields_conflict() {
        let users = InMemoryUserStore::new();
        let alice = users.create(new_user("alice")).await.unwrap();
        let bob = users.create(new_user("bob")).await.unwrap();
        assert_eq!(alice.id, UserId::new(1));
        assert_eq!(bob.id, UserId::new(2));
        assert!(alice.is_active);
        assert_eq!(alice.role, "user");

        let mut dup = new_user("alice");
        dup.email = "other@example.com".to_string();
        assert!(matches!(users.create(dup).await, Err(StoreError::Conflict(_))));

        let steal_email = UserChanges {
            email: Some("alice@example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            users.update(bob.id, &steal_email).await,
            Err(StoreError::Conflict(_))
        ));

        let keep_own = UserChanges {
            email: Some("bob@example.com".to_string()),
            title: Some("engineer".to_string()),
            ..Default::default()
        };
        let bob = users.update(bob.id, &keep_own).await.unwrap();
        assert_eq!(bob.title.as_deref(), Some("engineer"));
    }

    #[tokio::test]
    async fn deleting_a_missing_user_is_not_found() {
        let users = InMemoryUserStore::new();
        assert!(matches!(
            users.delete(UserId::new(99)).await,
            Err(StoreError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn attach_and_detach_follow_set_semantics() {
        let rbac = InMemoryRbacStore::new();
        let role = rbac
            .create_role(NewRole {
                name: "auditor".into(),
                description: None,
            })
            .await
            .unwrap();
        let view = rbac
            .create_permission(NewPermission {
                code: ATTENDANCE_VIEW,
                name: "View".into(),
                description: None,
            })
            .await
            .unwrap();

        rbac.attach_permission(role.id, view.id).await.unwrap();
        assert!(matches!(
            rbac.attach_permission(role.id, view.id).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            rbac.permission_codes_for_role("auditor").await.unwrap(),
            Some(vec![ATTENDANCE_VIEW])
        );

        rbac.detach_permission(role.id, view.id).await.unwrap();
        assert!(matches!(
            rbac.detach_permission(role.id, view.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            rbac.attach_permission(role.id, PermissionId::new(42)).await,
            Err(StoreError::NotFound("permission"))
        ));
    }

    #[tokio::test]
    async fn deleting_a_permission_detaches_it() {
        let rbac = InMemoryRbacStore::new();
        let role = rbac
            .create_role(NewRole {
                name: "clerk".into(),
                description: None,
            })
            .await
            .unwrap();
        let manage = rbac
            .create_permission(NewPermission {
                code: ATTENDANCE_MANAGE,
                name: "Manage".into(),
                description: None,
            })
            .await
            .unwrap();
        rbac.attach_permission(role.id, manage.id).await.unwrap();

        rbac.delete_permission(manage.id).await.unwrap();
        assert!(rbac.role_permissions(role.id).await.unwrap().is_empty());
        assert_eq!(rbac.permission_codes_for_role("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_role_names_conflict_on_create_and_rename() {
        let rbac = InMemoryRbacStore::new();
        let a = rbac
            .create_role(NewRole { name: "a".into(), description: None })
            .await
            .unwrap();
        rbac.create_role(NewRole { name: "b".into(), description: None })
            .await
            .unwrap();

        assert!(matches!(
            rbac.create_role(NewRole { name: "a".into(), description: None }).await,
            Err(StoreError::Conflict(_))
        ));
        let rename = RoleChanges {
            name: Some("b".into()),
            description: None,
        };
        assert!(matches!(
            rbac.update_role(a.id, &rename).await,
            Err(StoreError::Conflict(_))
        ));
    }

    fn day(year: i32, month: u32) -> NewAttendanceDay {
        NewAttendanceDay {
            period: Period::new(year, month).unwrap(),
            full_attendance_day: Some(21.0),
            real_day: Some(20.5),
            add_day: None,
            annual_leave_day: None,
        }
    }

    #[tokio::test]
    async fn recent_window_is_newest_first_and_capped() {
        let store = InMemoryAttendanceStore::new();
        for month in 1..=12 {
            store.create(day(2024, month)).await.unwrap();
        }
        for month in 1..=6 {
            store.create(day(2025, month)).await.unwrap();
        }

        let until = Period::new(2025, 3).unwrap();
        let (total, first) = store.recent(until, Page::new(Some(0), Some(5)).unwrap()).await.unwrap();
        assert_eq!(total, 12);
        let periods: Vec<(i32, u32)> = first.iter().map(period_of).collect();
        assert_eq!(periods, vec![(2025, 3), (2025, 2), (2025, 1), (2024, 12), (2024, 11)]);

        let (_, last) = store.recent(until, Page::new(Some(10), Some(5)).unwrap()).await.unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(period_of(&last[1]), (2024, 4));
    }

    #[tokio::test]
    async fn by_period_filters_exactly() {
        let store = InMemoryAttendanceStore::new();
        store.create(day(2025, 1)).await.unwrap();
        store.create(day(2025, 2)).await.unwrap();
        store.create(day(2024, 2)).await.unwrap();

        let feb = store.by_period(Period::new(2025, 2).unwrap()).await.unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(period_of(&feb[0]), (2025, 2));
    }
}
