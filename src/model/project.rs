use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::reporting::round1;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub const ALL: [&'static str; 5] = ["planning", "in_progress", "on_hold", "completed", "cancelled"];
}

impl TryFrom<String> for ProjectStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub status: ProjectStatus,
    pub progress: f64,
    pub budget: f64,
    pub spent: f64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub site_manager: Option<u64>,
    pub site_manager_name: Option<String>,
    pub worker_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Select list for `Project`; expects `projects p` joined with `users m` on the site manager.
pub const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.location, p.status, p.progress,
           p.budget, p.spent, p.start_date, p.due_date,
           p.site_manager_id AS site_manager, m.name AS site_manager_name,
           (SELECT COUNT(*) FROM project_workers pw WHERE pw.project_id = p.id) AS worker_count,
           p.created_at, p.updated_at
    FROM projects p
    LEFT JOIN users m ON m.id = p.site_manager_id
"#;

/// Percentage of the budget already spent, 0 when there is no budget.
pub fn budget_utilization(budget: f64, spent: f64) -> f64 {
    if budget == 0.0 {
        return 0.0;
    }
    round1(spent / budget * 100.0)
}

#[derive(Serialize)]
pub struct ProjectResponse<'a> {
    #[serde(flatten)]
    pub project: &'a Project,
    pub budget_utilization: f64,
}

impl Project {
    pub fn response(&self) -> ProjectResponse<'_> {
        ProjectResponse {
            project: self,
            budget_utilization: budget_utilization(self.budget, self.spent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_has_zero_utilization() {
        assert_eq!(budget_utilization(0.0, 0.0), 0.0);
        assert_eq!(budget_utilization(0.0, 1_500.0), 0.0);
    }

    #[test]
    fn utilization_is_rounded_to_one_decimal() {
        assert_eq!(budget_utilization(1_000.0, 250.0), 25.0);
        assert_eq!(budget_utilization(3.0, 1.0), 33.3);
        assert_eq!(budget_utilization(100.0, 150.0), 150.0);
    }

    #[test]
    fn status_round_trips_through_storage_names() {
        for name in ProjectStatus::ALL {
            let status: ProjectStatus = name.parse().unwrap();
            assert_eq!(status.as_ref(), name);
        }
    }
}
