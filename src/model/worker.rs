use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Value, json};

use crate::model::role::Role;

/// Worker profile joined with its owning user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Worker {
    pub id: u64,
    pub user_id: u64,
    pub employee_id: String,
    pub designation: String,
    pub daily_rate: f64,
    pub joining_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,

    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub phone: String,
    pub avatar_url: String,
    pub user_created_at: NaiveDateTime,
}

pub const WORKER_SELECT: &str = r#"
    SELECT w.id, w.user_id, w.employee_id, w.designation, w.daily_rate,
           w.joining_date, w.created_at,
           u.email, u.name, u.role, u.phone, u.avatar_url, u.created_at AS user_created_at
    FROM workers w
    JOIN users u ON u.id = w.user_id
"#;

#[derive(Serialize)]
struct WorkerUser<'a> {
    id: u64,
    email: &'a str,
    name: &'a str,
    role: Role,
    role_label: &'static str,
    phone: &'a str,
    avatar_url: &'a str,
    created_at: NaiveDateTime,
}

impl Worker {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "user": WorkerUser {
                id: self.user_id,
                email: &self.email,
                name: &self.name,
                role: self.role,
                role_label: self.role.label(),
                phone: &self.phone,
                avatar_url: &self.avatar_url,
                created_at: self.user_created_at,
            },
            "employee_id": self.employee_id,
            "designation": self.designation,
            "daily_rate": self.daily_rate,
            "joining_date": self.joining_date,
            "created_at": self.created_at,
        })
    }
}

/// First letter of a display name, upper-cased; `W` when the name is empty.
pub fn avatar_initial(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "W".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_initial_uses_first_letter() {
        assert_eq!(avatar_initial("rahim uddin"), "R");
        assert_eq!(avatar_initial("Élodie"), "É");
        assert_eq!(avatar_initial(""), "W");
    }
}
