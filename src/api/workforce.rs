use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    access::Action,
    auth::{auth::AuthUser, handlers::worker_id_of},
    config::Config,
    error::{AppError, AppResult, is_unique_violation},
    model::{
        attendance::{ATTENDANCE_SELECT, Attendance, DayState, NewCheckIn, already_checked_in},
        role::Role,
        worker::{WORKER_SELECT, Worker},
    },
    models::{created, ok},
    utils::{db_utils::Visibility, validation::FieldErrors},
};

#[derive(Deserialize, ToSchema)]
pub struct CreateWorker {
    /// Id of an existing user with the worker role.
    pub user_id: u64,
    #[schema(example = "W-0042")]
    pub employee_id: String,
    #[schema(example = "Mason")]
    pub designation: String,
    #[serde(default)]
    #[schema(example = 850.0)]
    pub daily_rate: f64,
    #[schema(example = "2026-02-01", value_type = Option<String>, format = "date")]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// `YYYY-MM-DD`, defaults to today.
    pub date: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct CheckInRequest {
    /// Unknown projects are ignored.
    pub project_id: Option<u64>,
    #[serde(default)]
    pub notes: String,
}

fn parse_attendance_date(raw: Option<&str>, today: NaiveDate) -> AppResult<NaiveDate> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request("Invalid date format. Use YYYY-MM-DD.")),
    }
}

async fn todays_record(pool: &MySqlPool, worker_id: u64, date: NaiveDate) -> AppResult<Option<Attendance>> {
    let sql = format!(
        "{ATTENDANCE_SELECT} WHERE a.worker_id = ? AND a.date = ? AND {}",
        Visibility::Active.predicate("a")
    );
    Ok(sqlx::query_as::<_, Attendance>(&sql)
        .bind(worker_id)
        .bind(date)
        .fetch_optional(pool)
        .await?)
}

async fn require_worker_profile(pool: &MySqlPool, auth: &AuthUser) -> AppResult<u64> {
    worker_id_of(pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Worker profile not found.".into()))
}

#[utoipa::path(
    get,
    path = "/api/workforce/workers",
    responses(
        (status = 200, description = "Worker profiles with their users"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Workforce"
)]
pub async fn list_workers(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require(Action::ListWorkers)?;

    let sql = format!(
        "{WORKER_SELECT} WHERE {} AND {} ORDER BY u.name",
        Visibility::Active.predicate("w"),
        Visibility::Active.predicate("u")
    );
    let workers = sqlx::query_as::<_, Worker>(&sql).fetch_all(pool.get_ref()).await?;

    Ok(ok(workers.iter().map(Worker::to_json).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/api/workforce/workers",
    request_body = CreateWorker,
    responses(
        (status = 201, description = "Worker profile created"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Profile or employee id already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Workforce"
)]
pub async fn create_worker(
    auth: AuthUser,
    body: web::Json<CreateWorker>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::CreateWorker)?;

    let mut errors = FieldErrors::default();
    errors.require_text("employee_id", &body.employee_id);
    errors.require_text("designation", &body.designation);
    errors.require_non_negative("daily_rate", body.daily_rate);

    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ? AND is_deleted = 0")
        .bind(body.user_id)
        .fetch_optional(pool.get_ref())
        .await?;
    if role.as_deref() != Some(Role::Worker.as_ref()) {
        errors.add("user_id", "User does not exist or is not a worker.");
    }
    errors.into_result()?;

    let result = sqlx::query(
        r#"
        INSERT INTO workers (user_id, employee_id, designation, daily_rate, joining_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(body.user_id)
    .bind(body.employee_id.trim())
    .bind(body.designation.trim())
    .bind(body.daily_rate)
    .bind(body.joining_date)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "A worker profile already exists for this user or employee id."))?;

    let worker_id = result.last_insert_id();
    info!(worker_id, user_id = body.user_id, "Worker profile created");

    let sql = format!("{WORKER_SELECT} WHERE w.id = ?");
    let worker = sqlx::query_as::<_, Worker>(&sql)
        .bind(worker_id)
        .fetch_one(pool.get_ref())
        .await?;

    Ok(created(worker.to_json()))
}

#[utoipa::path(
    get,
    path = "/api/workforce/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance for the date; workers see only their own"),
        (status = 400, description = "Invalid date format")
    ),
    security(("bearer_auth" = [])),
    tag = "Workforce"
)]
pub async fn list_attendance(
    auth: AuthUser,
    query: web::Query<AttendanceQuery>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ListAttendance)?;

    let date = parse_attendance_date(query.date.as_deref(), Local::now().date_naive())?;

    let own_profile = if auth.is_worker() {
        match worker_id_of(pool.get_ref(), auth.user_id).await? {
            Some(id) => Some(id),
            None => return Ok(HttpResponse::Ok().json(json!({ "success": true, "data": [] }))),
        }
    } else {
        None
    };

    let mut sql = format!(
        "{ATTENDANCE_SELECT} WHERE a.date = ? AND {}",
        Visibility::Active.predicate("a")
    );
    if own_profile.is_some() {
        sql.push_str(" AND a.worker_id = ?");
    }
    sql.push_str(" ORDER BY a.check_in");

    let mut q = sqlx::query_as::<_, Attendance>(&sql).bind(date);
    if let Some(worker_id) = own_profile {
        q = q.bind(worker_id);
    }
    let records = q.fetch_all(pool.get_ref()).await?;
    debug!(%date, count = records.len(), "Attendance listed");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "date": date.to_string(),
        "data": records.iter().map(Attendance::response).collect::<Vec<_>>(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/workforce/attendance/checkin",
    request_body = CheckInRequest,
    responses(
        (status = 201, description = "Checked in", body = Object, example = json!({
            "success": true,
            "message": "Checked in at 08:42."
        })),
        (status = 404, description = "Worker profile not found"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Workforce"
)]
pub async fn check_in(
    auth: AuthUser,
    body: Option<web::Json<CheckInRequest>>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    auth.require(Action::CheckIn)?;

    let worker_id = require_worker_profile(pool.get_ref(), &auth).await?;
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let now = Local::now().naive_local();

    DayState::of(todays_record(pool.get_ref(), worker_id, now.date()).await?.as_ref()).check_in()?;

    let project_id = match body.project_id {
        Some(id) => {
            sqlx::query_scalar::<_, u64>("SELECT id FROM projects WHERE id = ? AND is_deleted = 0")
                .bind(id)
                .fetch_optional(pool.get_ref())
                .await?
        }
        None => None,
    };

    let record = NewCheckIn::at(worker_id, project_id, body.notes, now, config.late_after);

    // The (worker_id, date) unique key settles concurrent check-ins.
    sqlx::query(
        r#"
        INSERT INTO attendance (worker_id, project_id, date, status, check_in, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.worker_id)
    .bind(record.project_id)
    .bind(record.date)
    .bind(record.status.as_ref())
    .bind(record.check_in)
    .bind(&record.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            already_checked_in()
        } else {
            AppError::Database(e)
        }
    })?;

    info!(worker_id, status = %record.status, "Checked in");

    let saved = todays_record(pool.get_ref(), worker_id, record.date)
        .await?
        .ok_or_else(|| AppError::Internal("check-in row missing after insert".into()))?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": format!("Checked in at {}.", record.check_in.format("%H:%M")),
        "data": saved.response(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/workforce/attendance/checkout",
    responses(
        (status = 200, description = "Checked out", body = Object, example = json!({
            "success": true,
            "message": "Checked out at 17:05."
        })),
        (status = 404, description = "Worker profile or today's check-in not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Workforce"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require(Action::CheckOut)?;

    let worker_id = require_worker_profile(pool.get_ref(), &auth).await?;
    let now = Local::now().naive_local();

    let existing = todays_record(pool.get_ref(), worker_id, now.date()).await?;
    let state = DayState::of(existing.as_ref());
    state.check_out()?;
    if state == DayState::CheckedOut {
        warn!(worker_id, "Check-out repeated; overwriting previous time");
    }

    let check_out = now.time();
    sqlx::query("UPDATE attendance SET check_out = ?, updated_at = NOW() WHERE worker_id = ? AND date = ? AND is_deleted = 0")
        .bind(check_out)
        .bind(worker_id)
        .bind(now.date())
        .execute(pool.get_ref())
        .await?;

    info!(worker_id, "Checked out");

    let saved = todays_record(pool.get_ref(), worker_id, now.date())
        .await?
        .ok_or_else(|| AppError::NotFound("No check-in found for today.".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Checked out at {}.", check_out.format("%H:%M")),
        "data": saved.response(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn missing_or_blank_date_means_today() {
        assert_eq!(parse_attendance_date(None, today()).unwrap(), today());
        assert_eq!(parse_attendance_date(Some("  "), today()).unwrap(), today());
    }

    #[test]
    fn explicit_date_is_parsed() {
        assert_eq!(
            parse_attendance_date(Some("2026-01-15"), today()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
        );
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        assert!(matches!(
            parse_attendance_date(Some("15/01/2026"), today()),
            Err(AppError::Validation { .. })
        ));
    }
}
