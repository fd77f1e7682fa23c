use actix_web::{HttpResponse, web};
use chrono::{Duration, Local};
use sqlx::MySqlPool;

use crate::{
    access::Action,
    api::dashboard::{load_marks, load_projects},
    auth::auth::AuthUser,
    error::AppResult,
    model::payroll::{PAYROLL_SELECT, PayrollRecord},
    models::ok,
    reporting::{EFFICIENCY_WINDOW_DAYS, analytics_metrics},
    utils::db_utils::Visibility,
};

#[utoipa::path(
    get,
    path = "/api/analytics/metrics",
    responses(
        (status = 200, description = "Six-month revenue and cost, completion rate, worker efficiency and cost breakdown"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn metrics(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require(Action::ViewAnalytics)?;

    let pool = pool.get_ref();
    let today = Local::now().date_naive();

    let projects = load_projects(pool).await?;
    let marks = load_marks(pool, today - Duration::days(EFFICIENCY_WINDOW_DAYS)).await?;

    let payroll_sql = format!("{PAYROLL_SELECT} WHERE {}", Visibility::Active.predicate("r"));
    let payroll = sqlx::query_as::<_, PayrollRecord>(&payroll_sql)
        .fetch_all(pool)
        .await?;

    Ok(ok(analytics_metrics(&projects, &marks, &payroll, today)))
}
