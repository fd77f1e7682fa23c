use actix_web::{HttpResponse, web};
use chrono::{Datelike, Duration, Local, NaiveDate};
use sqlx::MySqlPool;

use crate::{
    access::Action,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        attendance::AttendanceStatus,
        inventory::{INVENTORY_SELECT, InventoryItem},
        payroll::{PAYROLL_SELECT, PayrollRecord},
        project::{PROJECT_SELECT, Project},
    },
    models::ok,
    reporting::{DashboardInput, WEEKLY_DAYS, dashboard_stats},
    utils::db_utils::Visibility,
};

/// `(date, status)` of every live attendance row dated `since` or later.
pub(crate) async fn load_marks(pool: &MySqlPool, since: NaiveDate) -> AppResult<Vec<(NaiveDate, AttendanceStatus)>> {
    let rows: Vec<(NaiveDate, String)> =
        sqlx::query_as("SELECT date, status FROM attendance WHERE date >= ? AND is_deleted = 0")
            .bind(since)
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|(date, status)| {
            AttendanceStatus::try_from(status)
                .map(|s| (date, s))
                .map_err(|e| AppError::Internal(format!("unknown attendance status: {e}")))
        })
        .collect()
}

pub(crate) async fn load_projects(pool: &MySqlPool) -> AppResult<Vec<Project>> {
    let sql = format!("{PROJECT_SELECT} WHERE {}", Visibility::Active.predicate("p"));
    Ok(sqlx::query_as::<_, Project>(&sql).fetch_all(pool).await?)
}

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Headcount, payroll, stock and project KPIs with a seven-day attendance trend"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require(Action::ViewDashboard)?;

    let pool = pool.get_ref();
    let today = Local::now().date_naive();

    let total_workers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workers WHERE is_deleted = 0")
        .fetch_one(pool)
        .await?;

    let projects = load_projects(pool).await?;
    let marks = load_marks(pool, today - Duration::days(WEEKLY_DAYS - 1)).await?;

    let payroll_sql = format!(
        "{PAYROLL_SELECT} WHERE r.month = ? AND r.year = ? AND {}",
        Visibility::Active.predicate("r")
    );
    let payroll = sqlx::query_as::<_, PayrollRecord>(&payroll_sql)
        .bind(today.month())
        .bind(today.year())
        .fetch_all(pool)
        .await?;

    let inventory_sql = format!("{INVENTORY_SELECT} WHERE {}", Visibility::Active.predicate("i"));
    let inventory = sqlx::query_as::<_, InventoryItem>(&inventory_sql)
        .fetch_all(pool)
        .await?;

    tracing::debug!(
        user_id = auth.user_id,
        projects = projects.len(),
        marks = marks.len(),
        "Building dashboard"
    );

    let input = DashboardInput {
        today,
        total_workers: usize::try_from(total_workers).unwrap_or_default(),
        projects: &projects,
        marks: &marks,
        payroll: &payroll,
        inventory: &inventory,
    };

    Ok(ok(dashboard_stats(&input)))
}
