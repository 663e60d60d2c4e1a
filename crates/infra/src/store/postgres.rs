//! Postgres-backed stores.
//!
//! Unique violations (`23505`) surface as [`StoreError::Conflict`]; every other
//! database failure is passed through as [`StoreError::Database`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use roster_attendance::{AttendanceChanges, AttendanceDay, NewAttendanceDay, Period, RECENT_WINDOW};
use roster_auth::{
    NewPermission, NewRole, NewUser, Permission, PermissionCode, Role, RoleChanges, User,
    UserChanges,
};
use roster_core::{AttendanceId, Page, PermissionId, RoleId, UserId};

use super::traits::{AttendanceStore, RbacStore, UserStore};
use super::{StoreError, StoreResult};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn map_sqlx_error(what: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(format!("{what} already exists"))
    } else {
        StoreError::Database(err)
    }
}

const USER_COLUMNS: &str = r#"id, username, email, password_hash, role, is_active, avatar,
    signature, title, phone, "group", created_at, updated_at"#;

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
        is_active: row.try_get("is_active")?,
        avatar: row.try_get("avatar")?,
        signature: row.try_get("signature")?,
        title: row.try_get("title")?,
        phone: row.try_get("phone")?,
        group: row.try_get("group")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn permission_from_row(row: &PgRow) -> Result<Permission, sqlx::Error> {
    let code: String = row.try_get("code")?;
    Ok(Permission {
        id: PermissionId::new(row.try_get("id")?),
        code: PermissionCode::new(code),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceDay, sqlx::Error> {
    let month: i32 = row.try_get("month")?;
    let month = u32::try_from(month).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(AttendanceDay {
        id: AttendanceId::new(row.try_get("id")?),
        year: row.try_get("year")?,
        month,
        full_attendance_day: row.try_get("full_attendance_day")?,
        real_day: row.try_get("real_day")?,
        add_day: row.try_get("add_day")?,
        annual_leave_day: row.try_get("annual_leave_day")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collect<T>(
    rows: Vec<PgRow>,
    convert: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| convert(row).map_err(StoreError::from))
        .collect()
}

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_one("username", username).await
    }

    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one("email", email).await
    }

    #[instrument(skip(self), err)]
    async fn list(&self, page: Page) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id OFFSET $1 LIMIT $2");
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.offset))
            .bind(i64::from(page.limit))
            .fetch_all(&*self.pool)
            .await?;
        collect(rows, user_from_row)
    }

    #[instrument(skip(self, new), fields(username = %new.username), err)]
    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("username or email", e))?;
        Ok(user_from_row(&row)?)
    }

    #[instrument(skip(self, changes), err)]
    async fn update(&self, id: UserId, changes: &UserChanges) -> StoreResult<User> {
        let sql = format!(
            r#"UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                is_active = COALESCE($6, is_active),
                avatar = COALESCE($7, avatar),
                signature = COALESCE($8, signature),
                title = COALESCE($9, title),
                phone = COALESCE($10, phone),
                "group" = COALESCE($11, "group"),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(changes.username.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.password_hash.as_deref())
            .bind(changes.role.map(|r| r.as_str()))
            .bind(changes.is_active)
            .bind(changes.avatar.as_deref())
            .bind(changes.signature.as_deref())
            .bind(changes.title.as_deref())
            .bind(changes.phone.as_deref())
            .bind(changes.group.as_deref())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("username or email", e))?
            .ok_or(StoreError::NotFound("user"))?;
        Ok(user_from_row(&row)?)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: UserId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: Arc<PgPool>,
}

impl PostgresRbacStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";
const PERMISSION_COLUMNS: &str = "id, code, name, description, created_at";

#[async_trait]
impl RbacStore for PostgresRbacStore {
    #[instrument(skip(self), err)]
    async fn list_roles(&self, page: Page) -> StoreResult<Vec<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id OFFSET $1 LIMIT $2");
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.offset))
            .bind(i64::from(page.limit))
            .fetch_all(&*self.pool)
            .await?;
        collect(rows, role_from_row)
    }

    #[instrument(skip(self), err)]
    async fn get_role(&self, id: RoleId) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(role_from_row).transpose()?)
    }

    #[instrument(skip(self), err)]
    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(role_from_row).transpose()?)
    }

    #[instrument(skip(self, new), fields(name = %new.name), err)]
    async fn create_role(&self, new: NewRole) -> StoreResult<Role> {
        let sql = format!(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new.name)
            .bind(&new.description)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role", e))?;
        Ok(role_from_row(&row)?)
    }

    #[instrument(skip(self, changes), err)]
    async fn update_role(&self, id: RoleId, changes: &RoleChanges) -> StoreResult<Role> {
        let sql = format!(
            "UPDATE roles SET name = COALESCE($2, name), \
             description = COALESCE($3, description), updated_at = NOW() \
             WHERE id = $1 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role", e))?
            .ok_or(StoreError::NotFound("role"))?;
        Ok(role_from_row(&row)?)
    }

    #[instrument(skip(self), err)]
    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        // role_permissions rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn role_permissions(&self, id: RoleId) -> StoreResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.code, p.name, p.description, p.created_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(id.get())
        .fetch_all(&*self.pool)
        .await?;
        collect(rows, permission_from_row)
    }

    #[instrument(skip(self), err)]
    async fn list_permissions(&self, page: Page) -> StoreResult<Vec<Permission>> {
        let sql =
            format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY id OFFSET $1 LIMIT $2");
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.offset))
            .bind(i64::from(page.limit))
            .fetch_all(&*self.pool)
            .await?;
        collect(rows, permission_from_row)
    }

    #[instrument(skip(self), err)]
    async fn get_permission(&self, id: PermissionId) -> StoreResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(permission_from_row).transpose()?)
    }

    #[instrument(skip(self), err)]
    async fn find_permission_by_code(&self, code: &str) -> StoreResult<Option<Permission>> {
        let sql = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE code = $1");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(permission_from_row).transpose()?)
    }

    #[instrument(skip(self, new), fields(code = %new.code), err)]
    async fn create_permission(&self, new: NewPermission) -> StoreResult<Permission> {
        let sql = format!(
            "INSERT INTO permissions (code, name, description) VALUES ($1, $2, $3) \
             RETURNING {PERMISSION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.code.as_str())
            .bind(&new.name)
            .bind(&new.description)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission", e))?;
        Ok(permission_from_row(&row)?)
    }

    #[instrument(skip(self), err)]
    async fn delete_permission(&self, id: PermissionId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("permission"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn attach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        require_pair(&mut tx, role, permission).await?;

        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
            .bind(role.get())
            .bind(permission.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("permission is already attached to this role".to_string())
                } else {
                    StoreError::Database(e)
                }
            })?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn detach_permission(&self, role: RoleId, permission: PermissionId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        require_pair(&mut tx, role, permission).await?;

        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role.get())
                .bind(permission.get())
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("role permission"));
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn permission_codes_for_role(
        &self,
        role_name: &str,
    ) -> StoreResult<Option<Vec<PermissionCode>>> {
        let Some(role) = self.find_role_by_name(role_name).await? else {
            return Ok(None);
        };
        let rows = sqlx::query(
            r#"
            SELECT p.code
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            "#,
        )
        .bind(role.id.get())
        .fetch_all(&*self.pool)
        .await?;

        let codes = rows
            .iter()
            .map(|row| row.try_get::<String, _>("code").map(PermissionCode::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(codes))
    }
}

/// Fails with `NotFound` naming whichever side of the association is missing.
async fn require_pair(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    role: RoleId,
    permission: PermissionId,
) -> StoreResult<()> {
    let row = sqlx::query(
        r#"
        SELECT
            EXISTS (SELECT 1 FROM roles WHERE id = $1) AS role_exists,
            EXISTS (SELECT 1 FROM permissions WHERE id = $2) AS permission_exists
        "#,
    )
    .bind(role.get())
    .bind(permission.get())
    .fetch_one(&mut **tx)
    .await?;

    if !row.try_get::<bool, _>("role_exists")? {
        return Err(StoreError::NotFound("role"));
    }
    if !row.try_get::<bool, _>("permission_exists")? {
        return Err(StoreError::NotFound("permission"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresAttendanceStore {
    pool: Arc<PgPool>,
}

impl PostgresAttendanceStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

const ATTENDANCE_COLUMNS: &str = "id, year, month, full_attendance_day, real_day, add_day, \
    annual_leave_day, created_at, updated_at";

#[async_trait]
impl AttendanceStore for PostgresAttendanceStore {
    #[instrument(skip(self), err)]
    async fn list(&self, page: Page) -> StoreResult<Vec<AttendanceDay>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_days ORDER BY id OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.offset))
            .bind(i64::from(page.limit))
            .fetch_all(&*self.pool)
            .await?;
        collect(rows, attendance_from_row)
    }

    #[instrument(skip(self, period), fields(period = %period), err)]
    async fn by_period(&self, period: Period) -> StoreResult<Vec<AttendanceDay>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_days \
             WHERE year = $1 AND month = $2 ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(period.year())
            .bind(period.month() as i32)
            .fetch_all(&*self.pool)
            .await?;
        collect(rows, attendance_from_row)
    }

    #[instrument(skip(self, period), fields(period = %period), err)]
    async fn recent(&self, period: Period, page: Page) -> StoreResult<(u64, Vec<AttendanceDay>)> {
        let window = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance_days \
             WHERE (year, month) <= ($1, $2) \
             ORDER BY year DESC, month DESC, id DESC LIMIT {RECENT_WINDOW}"
        );

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM ({window}) w"))
            .bind(period.year())
            .bind(period.month() as i32)
            .fetch_one(&*self.pool)
            .await?
            .try_get("total")?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM ({window}) w \
             ORDER BY year DESC, month DESC, id DESC OFFSET $3 LIMIT $4"
        ))
        .bind(period.year())
        .bind(period.month() as i32)
        .bind(i64::from(page.offset))
        .bind(i64::from(page.limit))
        .fetch_all(&*self.pool)
        .await?;

        Ok((total.max(0) as u64, collect(rows, attendance_from_row)?))
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: AttendanceId) -> StoreResult<Option<AttendanceDay>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance_days WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.as_ref().map(attendance_from_row).transpose()?)
    }

    #[instrument(skip(self, new), fields(period = %new.period), err)]
    async fn create(&self, new: NewAttendanceDay) -> StoreResult<AttendanceDay> {
        let sql = format!(
            "INSERT INTO attendance_days \
             (year, month, full_attendance_day, real_day, add_day, annual_leave_day) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ATTENDANCE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.period.year())
            .bind(new.period.month() as i32)
            .bind(new.full_attendance_day)
            .bind(new.real_day)
            .bind(new.add_day)
            .bind(&new.annual_leave_day)
            .fetch_one(&*self.pool)
            .await?;
        Ok(attendance_from_row(&row)?)
    }

    #[instrument(skip(self, changes), err)]
    async fn update(
        &self,
        id: AttendanceId,
        changes: &AttendanceChanges,
    ) -> StoreResult<AttendanceDay> {
        let sql = format!(
            r#"UPDATE attendance_days SET
                year = COALESCE($2, year),
                month = COALESCE($3, month),
                full_attendance_day = COALESCE($4, full_attendance_day),
                real_day = COALESCE($5, real_day),
                add_day = COALESCE($6, add_day),
                annual_leave_day = COALESCE($7, annual_leave_day),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ATTENDANCE_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(changes.period.map(|p| p.year()))
            .bind(changes.period.map(|p| p.month() as i32))
            .bind(changes.full_attendance_day)
            .bind(changes.real_day)
            .bind(changes.add_day)
            .bind(changes.annual_leave_day.as_deref())
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(StoreError::NotFound("attendance record"))?;
        Ok(attendance_from_row(&row)?)
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, id: AttendanceId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM attendance_days WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("attendance record"));
        }
        Ok(())
    }
}
