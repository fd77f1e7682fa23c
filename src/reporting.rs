//! Read-only rollups behind the dashboard, analytics and payroll summary endpoints.
//!
//! Handlers load the (small) tables and hand the rows to these functions, which
//! never touch the store. Percentages are rounded to one decimal; currency is
//! left at full precision. A zero denominator yields 0.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::model::attendance::AttendanceStatus;
use crate::model::inventory::{InventoryItem, is_low_stock};
use crate::model::payroll::{PayrollRecord, PayrollRecordResponse, PayrollStatus};
use crate::model::project::{Project, ProjectResponse, ProjectStatus};

pub const TREND_MONTHS: usize = 6;
pub const EFFICIENCY_WINDOW_DAYS: i64 = 30;
pub const WEEKLY_DAYS: i64 = 7;
pub const RECENT_PROJECTS: usize = 5;
pub const TOP_EARNERS: usize = 5;

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100` rounded to one decimal, 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// A calendar month.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MonthKey {
    pub month: u32,
    pub year: i32,
}

impl MonthKey {
    pub fn new(month: u32, year: i32) -> Self {
        Self { month, year }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.month(), date.year())
    }

    /// January steps back to December of the previous year.
    pub fn prev(self) -> Self {
        if self.month <= 1 {
            Self::new(12, self.year - 1)
        } else {
            Self::new(self.month - 1, self.year)
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.year() == self.year
    }
}

/// `count` consecutive months ending at `last`, oldest first.
pub fn trailing_months(last: MonthKey, count: usize) -> Vec<MonthKey> {
    let mut months = Vec::with_capacity(count);
    let mut current = last;
    for _ in 0..count {
        months.push(current);
        current = current.prev();
    }
    months.reverse();
    months
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// Revenue (sum of budgets) and cost (sum of spend) of projects created in
/// each of the trailing six months, oldest first.
pub fn revenue_and_cost_by_month(projects: &[Project], today: NaiveDate) -> (Vec<f64>, Vec<f64>) {
    trailing_months(MonthKey::of(today), TREND_MONTHS)
        .into_iter()
        .map(|key| {
            projects
                .iter()
                .filter(|p| key.contains(p.created_at.date()))
                .fold((0.0, 0.0), |(rev, cost), p| (rev + p.budget, cost + p.spent))
        })
        .unzip()
}

pub fn project_completion(projects: &[Project]) -> f64 {
    let completed = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Completed)
        .count();
    percentage(completed, projects.len())
}

/// Share of on-site marks (present or late) among all marks dated within the
/// last thirty days.
pub fn worker_efficiency(marks: &[(NaiveDate, AttendanceStatus)], today: NaiveDate) -> f64 {
    let since = today - Duration::days(EFFICIENCY_WINDOW_DAYS);
    let in_window: Vec<_> = marks.iter().filter(|(date, _)| *date >= since).collect();
    let on_site = in_window.iter().filter(|(_, s)| s.is_on_site()).count();
    percentage(on_site, in_window.len())
}

/// Labor is the payroll share of payroll plus project spend. The remaining
/// categories are fixed placeholder figures, not derived from any table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    #[serde(rename = "Labor")]
    pub labor: f64,
    #[serde(rename = "Materials")]
    pub materials: f64,
    #[serde(rename = "Equipment")]
    pub equipment: f64,
    #[serde(rename = "Overhead")]
    pub overhead: f64,
    #[serde(rename = "Safety")]
    pub safety: f64,
}

pub fn category_breakdown(total_payroll_net: f64, total_project_spent: f64) -> CategoryBreakdown {
    let denominator = (total_payroll_net + total_project_spent).max(1.0);
    CategoryBreakdown {
        labor: round1(total_payroll_net / denominator * 100.0),
        materials: 30.0,
        equipment: 15.0,
        overhead: 12.0,
        safety: 5.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsMetrics {
    pub revenue_by_month: Vec<f64>,
    pub cost_by_month: Vec<f64>,
    pub project_completion: f64,
    pub worker_efficiency: f64,
    pub category_breakdown: CategoryBreakdown,
}

pub fn analytics_metrics(
    projects: &[Project],
    marks: &[(NaiveDate, AttendanceStatus)],
    payroll: &[PayrollRecord],
    today: NaiveDate,
) -> AnalyticsMetrics {
    let (revenue_by_month, cost_by_month) = revenue_and_cost_by_month(projects, today);
    let total_payroll: f64 = payroll.iter().map(PayrollRecord::net_salary).sum();
    let total_spent: f64 = projects.iter().map(|p| p.spent).sum();

    AnalyticsMetrics {
        revenue_by_month,
        cost_by_month,
        project_completion: project_completion(projects),
        worker_efficiency: worker_efficiency(marks, today),
        category_breakdown: category_breakdown(total_payroll, total_spent),
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCount {
    pub day: String,
    pub count: usize,
}

/// On-site counts for the last seven days, oldest first, labelled `Mon`, `Tue`, ...
pub fn weekly_attendance(marks: &[(NaiveDate, AttendanceStatus)], today: NaiveDate) -> Vec<DayCount> {
    (0..WEEKLY_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            DayCount {
                day: day.format("%a").to_string(),
                count: on_site_on(marks, day),
            }
        })
        .collect()
}

fn on_site_on(marks: &[(NaiveDate, AttendanceStatus)], day: NaiveDate) -> usize {
    marks
        .iter()
        .filter(|(date, status)| *date == day && status.is_on_site())
        .count()
}

pub fn average_progress(projects: &[Project]) -> f64 {
    if projects.is_empty() {
        return 0.0;
    }
    round1(projects.iter().map(|p| p.progress).sum::<f64>() / projects.len() as f64)
}

pub fn most_recently_updated(projects: &[Project], limit: usize) -> Vec<&Project> {
    let mut sorted: Vec<&Project> = projects.iter().collect();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    sorted.truncate(limit);
    sorted
}

pub struct DashboardInput<'a> {
    pub today: NaiveDate,
    pub total_workers: usize,
    pub projects: &'a [Project],
    /// Marks for at least the last seven days.
    pub marks: &'a [(NaiveDate, AttendanceStatus)],
    /// Payroll records of the current month.
    pub payroll: &'a [PayrollRecord],
    pub inventory: &'a [InventoryItem],
}

#[derive(Serialize)]
pub struct DashboardStats<'a> {
    pub total_workers: usize,
    pub present_today: usize,
    pub absent_today: i64,
    pub active_projects: usize,
    pub monthly_payroll: f64,
    pub low_stock_count: usize,
    pub avg_project_progress: f64,
    pub weekly_attendance: Vec<DayCount>,
    pub recent_projects: Vec<ProjectResponse<'a>>,
}

pub fn dashboard_stats<'a>(input: &DashboardInput<'a>) -> DashboardStats<'a> {
    let present_today = on_site_on(input.marks, input.today);
    let current = MonthKey::of(input.today);

    DashboardStats {
        total_workers: input.total_workers,
        present_today,
        absent_today: input.total_workers as i64 - present_today as i64,
        active_projects: input
            .projects
            .iter()
            .filter(|p| p.status == ProjectStatus::InProgress)
            .count(),
        monthly_payroll: input
            .payroll
            .iter()
            .filter(|r| u32::from(r.month) == current.month && i32::from(r.year) == current.year)
            .map(PayrollRecord::net_salary)
            .sum(),
        low_stock_count: input
            .inventory
            .iter()
            .filter(|i| is_low_stock(i.quantity, i.low_stock_threshold))
            .count(),
        avg_project_progress: average_progress(input.projects),
        weekly_attendance: weekly_attendance(input.marks, input.today),
        recent_projects: most_recently_updated(input.projects, RECENT_PROJECTS)
            .into_iter()
            .map(Project::response)
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Payroll summary
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PayrollSummary<'a> {
    pub month: u32,
    pub year: i32,
    pub total_payroll: f64,
    pub paid_amount: f64,
    pub pending_amount: f64,
    pub worker_count: usize,
    pub monthly_trend: Vec<f64>,
    pub top_earners: Vec<PayrollRecordResponse<'a>>,
}

/// Net payroll of each of the six months before `period`, oldest first.
pub fn payroll_trend(history: &[PayrollRecord], period: MonthKey) -> Vec<f64> {
    trailing_months(period.prev(), TREND_MONTHS)
        .into_iter()
        .map(|key| {
            history
                .iter()
                .filter(|r| u32::from(r.month) == key.month && i32::from(r.year) == key.year)
                .map(PayrollRecord::net_salary)
                .sum()
        })
        .collect()
}

/// `records` are the rows of `period`; `history` must cover the six months before it.
pub fn payroll_summary<'a>(
    period: MonthKey,
    records: &'a [PayrollRecord],
    history: &[PayrollRecord],
) -> PayrollSummary<'a> {
    let total: f64 = records.iter().map(PayrollRecord::net_salary).sum();
    let paid: f64 = records
        .iter()
        .filter(|r| r.status == PayrollStatus::Paid)
        .map(PayrollRecord::net_salary)
        .sum();
    let workers: HashSet<u64> = records.iter().map(|r| r.worker_id).collect();

    let mut ranked: Vec<&PayrollRecord> = records.iter().collect();
    ranked.sort_by(|a, b| b.net_salary().total_cmp(&a.net_salary()));

    PayrollSummary {
        month: period.month,
        year: period.year,
        total_payroll: total,
        paid_amount: paid,
        pending_amount: total - paid,
        worker_count: workers.len(),
        monthly_trend: payroll_trend(history, period),
        top_earners: ranked
            .into_iter()
            .take(TOP_EARNERS)
            .map(PayrollRecord::response)
            .collect(),
    }
}
