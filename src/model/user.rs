use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::role::Role;

/// Full user row, including the password hash. Never serialized.
#[derive(Debug, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub phone: String,
    pub avatar_url: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

pub const USER_COLUMNS: &str = "id, email, name, role, phone, avatar_url, is_active, created_at";

impl User {
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self);
        value["role_label"] = self.role.label().into();
        value
    }
}
