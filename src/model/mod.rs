pub mod attendance;
pub mod inventory;
pub mod payroll;
pub mod profile;
pub mod project;
pub mod role;
pub mod user;
pub mod worker;
