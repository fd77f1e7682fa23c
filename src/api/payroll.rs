use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    access::Action,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::payroll::{PAYROLL_SELECT, PayrollRecord, PayrollStatus},
    models::{created, ok},
    reporting::{MonthKey, TREND_MONTHS, payroll_summary, trailing_months},
    utils::{
        db_utils::{Column, ColumnKind, Visibility, build_update_sql, execute_update},
        validation::FieldErrors,
    },
};

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 7)]
    pub worker: u64,

    #[schema(example = 3)]
    pub month: u32,

    #[schema(example = 2026)]
    pub year: i32,

    #[schema(example = 18000.0)]
    pub base_salary: f64,

    #[serde(default)]
    #[schema(example = 1500.0)]
    pub bonus: f64,

    #[serde(default)]
    #[schema(example = 500.0)]
    pub deductions: f64,

    pub status: Option<PayrollStatus>,

    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize, IntoParams)]
pub struct PeriodQuery {
    /// 1..=12, defaults to the current month.
    pub month: Option<u32>,
    /// Defaults to the current year.
    pub year: Option<i32>,
}

const PAYROLL_COLUMNS: [Column; 5] = [
    Column::new("base_salary", ColumnKind::Amount),
    Column::new("bonus", ColumnKind::Amount),
    Column::new("deductions", ColumnKind::Amount),
    Column::new("status", ColumnKind::Choice(&PayrollStatus::ALL)),
    Column::new("notes", ColumnKind::OptionalText),
];

fn resolve_period(query: &PeriodQuery, today: NaiveDate) -> AppResult<MonthKey> {
    let month = query.month.unwrap_or_else(|| today.month());
    let year = query.year.unwrap_or_else(|| today.year());

    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12."));
    }
    if !(1..=9999).contains(&year) {
        return Err(AppError::bad_request("Invalid year."));
    }

    Ok(MonthKey::new(month, year))
}

fn month_index(key: MonthKey) -> i64 {
    i64::from(key.year) * 12 + i64::from(key.month)
}

async fn records_between(
    pool: &MySqlPool,
    first: MonthKey,
    last: MonthKey,
    order: &str,
) -> AppResult<Vec<PayrollRecord>> {
    let sql = format!(
        "{PAYROLL_SELECT} WHERE (r.year * 12 + r.month) BETWEEN ? AND ? AND {} ORDER BY {order}",
        Visibility::Active.predicate("r")
    );
    Ok(sqlx::query_as::<_, PayrollRecord>(&sql)
        .bind(month_index(first))
        .bind(month_index(last))
        .fetch_all(pool)
        .await?)
}

async fn fetch_record(pool: &MySqlPool, id: u64) -> AppResult<PayrollRecord> {
    let sql = format!("{PAYROLL_SELECT} WHERE r.id = ? AND {}", Visibility::Active.predicate("r"));
    sqlx::query_as::<_, PayrollRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found.".into()))
}

fn validate_payroll(body: &CreatePayroll) -> FieldErrors {
    let mut errors = FieldErrors::default();
    if !(1..=12).contains(&body.month) {
        errors.add("month", "Ensure this value is between 1 and 12.");
    }
    if !(1..=9999).contains(&body.year) {
        errors.add("year", "Enter a valid year.");
    }
    errors.require_non_negative("base_salary", body.base_salary);
    errors.require_non_negative("bonus", body.bonus);
    errors.require_non_negative("deductions", body.deductions);
    errors
}

#[utoipa::path(
    get,
    path = "/api/payroll/summary",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Totals, six-month trend and top earners for the period"),
        (status = 400, description = "Month outside 1..=12"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_summary_view(
    auth: AuthUser,
    query: web::Query<PeriodQuery>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ViewPayrollSummary)?;

    let period = resolve_period(&query, Local::now().date_naive())?;
    let records = records_between(pool.get_ref(), period, period, "r.id").await?;

    let window = trailing_months(period.prev(), TREND_MONTHS);
    let history = match (window.first(), window.last()) {
        (Some(first), Some(last)) => records_between(pool.get_ref(), *first, *last, "r.id").await?,
        _ => Vec::new(),
    };

    Ok(ok(payroll_summary(period, &records, &history)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/workers",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Payroll records of the period, highest base salary first"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payroll(
    auth: AuthUser,
    query: web::Query<PeriodQuery>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ListPayroll)?;

    let period = resolve_period(&query, Local::now().date_naive())?;
    let records = records_between(pool.get_ref(), period, period, "r.base_salary DESC").await?;

    Ok(ok(records.iter().map(PayrollRecord::response).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll record created"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied"),
        (status = 409, description = "Record for this worker and period already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    body: web::Json<CreatePayroll>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::CreatePayroll)?;

    let mut errors = validate_payroll(&body);
    let worker: Option<u64> = sqlx::query_scalar("SELECT id FROM workers WHERE id = ? AND is_deleted = 0")
        .bind(body.worker)
        .fetch_optional(pool.get_ref())
        .await?;
    if worker.is_none() {
        errors.add("worker", "Invalid pk - object does not exist.");
    }
    errors.into_result()?;

    let status = body.status.unwrap_or(PayrollStatus::Pending);
    let paid_at = if status == PayrollStatus::Paid {
        Some(Local::now().naive_local())
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        INSERT INTO payroll_records
        (worker_id, month, year, base_salary, bonus, deductions, status, paid_at, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(body.worker)
    .bind(body.month)
    .bind(body.year)
    .bind(body.base_salary)
    .bind(body.bonus)
    .bind(body.deductions)
    .bind(status.as_ref())
    .bind(paid_at)
    .bind(&body.notes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        AppError::conflict_on_duplicate(e, "Payroll record with this worker, month and year already exists.")
    })?;

    let id = result.last_insert_id();
    info!(payroll_id = id, worker_id = body.worker, month = body.month, year = body.year, "Payroll record created");

    let record = fetch_record(pool.get_ref(), id).await?;
    Ok(created(record.response()))
}

#[utoipa::path(
    patch,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Payroll record updated"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    path: web::Path<u64>,
    body: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::UpdatePayroll)?;

    let id = path.into_inner();
    fetch_record(pool.get_ref(), id).await?;

    let mut update = build_update_sql("payroll_records", &body, &PAYROLL_COLUMNS, id)?;
    if body.get("status").and_then(Value::as_str) == Some(PayrollStatus::Paid.as_ref()) {
        update.set_raw("paid_at = NOW()");
    }

    execute_update(pool.get_ref(), update).await?;
    info!(payroll_id = id, user_id = auth.user_id, "Payroll record updated");

    let record = fetch_record(pool.get_ref(), id).await?;
    Ok(ok(record.response()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 18).unwrap()
    }

    #[test]
    fn period_defaults_to_the_current_month() {
        let q = PeriodQuery { month: None, year: None };
        assert_eq!(resolve_period(&q, today()).unwrap(), MonthKey::new(4, 2026));
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        for month in [0, 13] {
            let q = PeriodQuery { month: Some(month), year: Some(2026) };
            assert!(matches!(resolve_period(&q, today()), Err(AppError::Validation { .. })));
        }
    }

    #[test]
    fn month_index_orders_across_years() {
        assert!(month_index(MonthKey::new(12, 2025)) < month_index(MonthKey::new(1, 2026)));
        assert_eq!(month_index(MonthKey::new(1, 2026)) - month_index(MonthKey::new(7, 2025)), 6);
    }

    #[test]
    fn create_payload_validation() {
        let body = CreatePayroll {
            worker: 1,
            month: 13,
            year: 2026,
            base_salary: -1.0,
            bonus: 0.0,
            deductions: 0.0,
            status: None,
            notes: String::new(),
        };
        assert!(!validate_payroll(&body).is_empty());
    }
}
