//! Monthly attendance ledger. Reads need `attendance:view`, writes need
//! `attendance:manage`.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post, put},
    Router,
};

use roster_attendance::{AttendanceDay, Period};
use roster_auth::permissions::{ATTENDANCE_MANAGE, ATTENDANCE_VIEW};
use roster_auth::Policy;
use roster_core::Page;

use crate::app::dto::{
    AttendancePath, CreateAttendanceRequest, PageQuery, PeriodPath, RecentAttendance,
    SkipLimitQuery, UpdateAttendanceRequest,
};
use crate::app::errors::{ApiError, ApiResponse, ApiResult};
use crate::app::extract::{PathParams, QueryParams, ValidJson};
use crate::app::routes::guarded;
use crate::app::services::AppServices;

pub fn router(services: &Arc<AppServices>) -> Router {
    let view = || Policy::permission(ATTENDANCE_VIEW);
    let manage = || Policy::permission(ATTENDANCE_MANAGE);

    Router::new()
        .route("/attendance", guarded(get(list_records), services, view()))
        .route("/attendance", guarded(post(create_record), services, manage()))
        .route(
            "/attendance/month/:year/:month",
            guarded(get(records_by_month), services, view()),
        )
        .route(
            "/attendance/recent/:year/:month",
            guarded(get(recent_records), services, view()),
        )
        .route("/attendance/:id", guarded(get(get_record), services, view()))
        .route(
            "/attendance/:id",
            guarded(
                put(update_record).delete(delete_record),
                services,
                manage(),
            ),
        )
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    QueryParams(query): QueryParams<SkipLimitQuery>,
) -> ApiResult<Vec<AttendanceDay>> {
    let page = Page::new(query.skip, query.limit)?;
    Ok(ApiResponse::ok(services.stores.attendance.list(page).await?))
}

pub async fn records_by_month(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<PeriodPath>,
) -> ApiResult<Vec<AttendanceDay>> {
    let period = Period::new(path.year, path.month)?;
    Ok(ApiResponse::ok(services.stores.attendance.by_period(period).await?))
}

/// GET /attendance/recent/:year/:month - newest records at or before a month
pub async fn recent_records(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<PeriodPath>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<RecentAttendance> {
    let period = Period::new(path.year, path.month)?;
    let page = Page::new(query.current, query.page_size)?;
    let (total, data) = services.stores.attendance.recent(period, page).await?;
    Ok(ApiResponse::ok(RecentAttendance { total, data }))
}

pub async fn create_record(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<CreateAttendanceRequest>,
) -> ApiResult<AttendanceDay> {
    let new = body.into_new()?;
    let day = services.stores.attendance.create(new).await?;
    tracing::info!(attendance_id = %day.id, year = day.year, month = day.month, "attendance record created");
    Ok(ApiResponse::created(day))
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<AttendancePath>,
) -> ApiResult<AttendanceDay> {
    let day = services
        .stores
        .attendance
        .get(path.id)
        .await?
        .ok_or_else(|| ApiError::not_found("attendance record"))?;
    Ok(ApiResponse::ok(day))
}

pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<AttendancePath>,
    ValidJson(body): ValidJson<UpdateAttendanceRequest>,
) -> ApiResult<AttendanceDay> {
    let attendance = &services.stores.attendance;
    let current = attendance
        .get(path.id)
        .await?
        .ok_or_else(|| ApiError::not_found("attendance record"))?;

    let changes = body.into_changes(&current)?;
    Ok(ApiResponse::ok(attendance.update(path.id, &changes).await?))
}

pub async fn delete_record(
    Extension(services): Extension<Arc<AppServices>>,
    PathParams(path): PathParams<AttendancePath>,
) -> ApiResult<()> {
    services.stores.attendance.delete(path.id).await?;
    tracing::info!(attendance_id = %path.id, "attendance record deleted");
    Ok(ApiResponse::ok(()).with_msg("attendance record deleted"))
}
