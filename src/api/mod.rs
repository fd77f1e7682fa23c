pub mod analytics;
pub mod dashboard;
pub mod inventory;
pub mod payroll;
pub mod projects;
pub mod workforce;
