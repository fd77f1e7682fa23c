use serde::Serialize;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SiteManagerProfile {
    pub id: u64,
    pub user_id: u64,
    pub employee_id: String,
    pub department: String,
    pub years_of_experience: u32,
    /// Comma-separated list.
    pub certifications: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminProfile {
    pub id: u64,
    pub user_id: u64,
    pub employee_id: String,
    pub department: String,
    pub admin_level: String,
}
