//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use roster_attendance::{AttendanceChanges, AttendanceDay, NewAttendanceDay, Period};
use roster_auth::{Permission, Role, RoleKind, User};
use roster_core::{AttendanceId, DomainResult, PermissionId, RoleId, UserId, page::DEFAULT_PAGE_SIZE};

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_role() -> String {
    RoleKind::User.as_str().to_string()
}

fn role_label(value: &str) -> Result<(), ValidationError> {
    if RoleKind::parse(value).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("role").with_message("role must be 'admin' or 'user'".into()))
    }
}

// -------------------------
// Auth
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub login_type: &'static str,
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: UserId,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub userid: UserId,
    pub name: String,
    pub avatar: Option<String>,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub permissions: Vec<String>,
}

// -------------------------
// Users
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersRequest {
    /// Number of records to skip.
    #[serde(default)]
    pub current: u32,
    #[serde(default = "default_page_size", rename = "pageSize")]
    #[validate(range(min = 1, max = 500, message = "pageSize must be between 1 and 500"))]
    pub page_size: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserIdRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: String,
    #[validate(
        email(message = "email is not a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    #[serde(default = "default_role")]
    #[validate(custom(function = "role_label"))]
    pub role: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: Option<String>,
    #[validate(
        email(message = "email is not a valid address"),
        length(max = 255, message = "email must be at most 255 characters")
    )]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    #[validate(custom(function = "role_label"))]
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub avatar: Option<String>,
    pub signature: Option<String>,
    #[validate(length(max = 100, message = "title must be at most 100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 50, message = "phone must be at most 50 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 100, message = "group must be at most 100 characters"))]
    pub group: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
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

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            avatar: user.avatar,
            signature: user.signature,
            title: user.title,
            phone: user.phone,
            group: user.group,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// -------------------------
// Roles & permissions
// -------------------------

/// `current`/`pageSize` query. As with [`ListUsersRequest`], `current` is the
/// number of records to skip, not a page number.
#[derive(Debug, Deserialize, Validate)]
pub struct PageQuery {
    pub current: Option<u32>,
    #[serde(rename = "pageSize")]
    #[validate(range(min = 1, max = 500, message = "pageSize must be between 1 and 500"))]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RolePath {
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct PermissionPath {
    pub permission_id: PermissionId,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionPath {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1 to 50 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 50, message = "name must be 1 to 50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 100, message = "code must be 1 to 100 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionView {
    pub id: PermissionId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Permission> for PermissionView {
    fn from(p: Permission) -> Self {
        Self {
            id: p.id,
            code: p.code.as_str().to_string(),
            name: p.name,
            description: p.description,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleView {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub permissions: Vec<PermissionView>,
}

impl RoleView {
    pub fn new(role: Role, permissions: Vec<Permission>) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            created_at: role.created_at,
            updated_at: role.updated_at,
            permissions: permissions.into_iter().map(PermissionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RolePermissionLink {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

// -------------------------
// Attendance
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SkipLimitQuery {
    pub skip: Option<u32>,
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodPath {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct AttendancePath {
    pub id: AttendanceId,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAttendanceRequest {
    #[validate(range(min = 1, max = 9999, message = "year must be between 1 and 9999"))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: u32,
    pub full_attendance_day: Option<f64>,
    pub real_day: Option<f64>,
    pub add_day: Option<f64>,
    #[validate(length(max = 255, message = "annual_leave_day must be at most 255 characters"))]
    pub annual_leave_day: Option<String>,
}

impl CreateAttendanceRequest {
    pub fn into_new(self) -> DomainResult<NewAttendanceDay> {
        NewAttendanceDay {
            period: Period::new(self.year, self.month)?,
            full_attendance_day: self.full_attendance_day,
            real_day: self.real_day,
            add_day: self.add_day,
            annual_leave_day: self.annual_leave_day,
        }
        .normalized()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAttendanceRequest {
    #[validate(range(min = 1, max = 9999, message = "year must be between 1 and 9999"))]
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: Option<u32>,
    pub full_attendance_day: Option<f64>,
    pub real_day: Option<f64>,
    pub add_day: Option<f64>,
    #[validate(length(max = 255, message = "annual_leave_day must be at most 255 characters"))]
    pub annual_leave_day: Option<String>,
}

impl UpdateAttendanceRequest {
    /// Year and month are resolved against the stored record, so a lone
    /// `month` moves the record within its current year.
    pub fn into_changes(self, current: &AttendanceDay) -> DomainResult<AttendanceChanges> {
        let period = match (self.year, self.month) {
            (None, None) => None,
            (year, month) => Some(Period::new(
                year.unwrap_or(current.year),
                month.unwrap_or(current.month),
            )?),
        };
        AttendanceChanges {
            period,
            full_attendance_day: self.full_attendance_day,
            real_day: self.real_day,
            add_day: self.add_day,
            annual_leave_day: self.annual_leave_day,
        }
        .normalized()
    }
}

#[derive(Debug, Serialize)]
pub struct RecentAttendance {
    pub total: u64,
    pub data: Vec<AttendanceDay>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::Page;
    use serde_json::json;

    fn update(body: serde_json::Value) -> UpdateUserRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn profile_fields_are_bounded_by_their_columns() {
        assert!(update(json!({ "user_id": 1, "phone": "5".repeat(50) })).validate().is_ok());

        let errors = update(json!({ "user_id": 1, "phone": "5".repeat(51) }))
            .validate()
            .unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));

        let errors = update(json!({
            "user_id": 1,
            "title": "t".repeat(101),
            "group": "g".repeat(101),
        }))
        .validate()
        .unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("group"));
    }

    #[test]
    fn overlong_email_is_rejected() {
        let email = format!("{}@example.com", "a".repeat(250));
        let errors = update(json!({ "user_id": 1, "email": email })).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn page_query_current_is_an_offset() {
        let query: PageQuery = serde_json::from_value(json!({ "current": 0, "pageSize": 10 })).unwrap();
        assert!(query.validate().is_ok());

        let listed: ListUsersRequest =
            serde_json::from_value(json!({ "current": 20, "pageSize": 10 })).unwrap();
        let queried: PageQuery =
            serde_json::from_value(json!({ "current": 20, "pageSize": 10 })).unwrap();
        assert_eq!(
            Page::new(Some(listed.current), Some(listed.page_size)).unwrap(),
            Page::new(queried.current, queried.page_size).unwrap()
        );
        assert_eq!(Page::new(queried.current, queried.page_size).unwrap().offset, 20);
    }
}
