use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::worker::avatar_initial;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Paid,
    Cancelled,
}

impl PayrollStatus {
    pub const ALL: [&'static str; 3] = ["pending", "paid", "cancelled"];
}

impl TryFrom<String> for PayrollStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Payroll row joined with the worker's name and designation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayrollRecord {
    pub id: u64,
    pub worker_id: u64,
    pub worker_name: String,
    pub worker_role: String,
    pub month: u8,
    pub year: u16,
    pub base_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    #[sqlx(try_from = "String")]
    pub status: PayrollStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub notes: String,
}

pub const PAYROLL_SELECT: &str = r#"
    SELECT r.id, r.worker_id, u.name AS worker_name, w.designation AS worker_role,
           r.month, r.year, r.base_salary, r.bonus, r.deductions, r.status,
           r.paid_at, r.notes
    FROM payroll_records r
    JOIN workers w ON w.id = r.worker_id
    JOIN users u ON u.id = w.user_id
"#;

pub fn net_salary(base_salary: f64, bonus: f64, deductions: f64) -> f64 {
    base_salary + bonus - deductions
}

impl PayrollRecord {
    pub fn net_salary(&self) -> f64 {
        net_salary(self.base_salary, self.bonus, self.deductions)
    }

    pub fn response(&self) -> PayrollRecordResponse<'_> {
        PayrollRecordResponse {
            id: self.id,
            worker: self.worker_id,
            worker_name: &self.worker_name,
            worker_role: &self.worker_role,
            avatar_initial: avatar_initial(&self.worker_name),
            month: self.month,
            year: self.year,
            base_salary: self.base_salary,
            bonus: self.bonus,
            deductions: self.deductions,
            net_salary: self.net_salary(),
            status: self.status,
            paid_at: self.paid_at,
            notes: &self.notes,
        }
    }
}

#[derive(Serialize)]
pub struct PayrollRecordResponse<'a> {
    pub id: u64,
    pub worker: u64,
    pub worker_name: &'a str,
    pub worker_role: &'a str,
    pub avatar_initial: String,
    pub month: u8,
    pub year: u16,
    pub base_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
    pub status: PayrollStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub notes: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_salary_adds_bonus_and_subtracts_deductions() {
        assert_eq!(net_salary(800.0, 2000.0, 500.0), 2300.0);
        assert_eq!(net_salary(0.0, 0.0, 100.0), -100.0);
    }

    #[test]
    fn response_includes_derived_fields() {
        let rec = PayrollRecord {
            id: 4,
            worker_id: 9,
            worker_name: "nusrat".into(),
            worker_role: "Electrician".into(),
            month: 2,
            year: 2026,
            base_salary: 800.0,
            bonus: 2000.0,
            deductions: 500.0,
            status: PayrollStatus::Pending,
            paid_at: None,
            notes: String::new(),
        };
        let json = serde_json::to_value(rec.response()).unwrap();
        assert_eq!(json["net_salary"], 2300.0);
        assert_eq!(json["avatar_initial"], "N");
        assert_eq!(json["status"], "pending");
    }
}
