use crate::api::{
    inventory::CreateInventoryItem,
    payroll::CreatePayroll,
    projects::{AssignWorkers, CreateProject},
    workforce::{CheckInRequest, CreateWorker},
};
use crate::auth::handlers::{ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest};
use crate::model::{
    inventory::InventoryCategory, payroll::PayrollStatus, project::ProjectStatus, role::Role,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SiteWorks ERP API",
        version = "1.0.0",
        description = r#"
## Construction ERP backend

Backend for the site crew mobile app.

### Key features
- **Projects**: budgets, progress and crew assignment
- **Workforce**: worker profiles and daily check-in / check-out
- **Inventory**: stock levels per project with low-stock alerts
- **Payroll**: monthly records, summaries and six-month trends
- **Dashboard / Analytics**: aggregated KPIs

### Security
Every endpoint except login and refresh needs a JWT bearer access token.
Roles are `worker`, `site_manager` and `admin`; workers only see their own
attendance and the projects they are assigned to.

### Response format
`{"success": bool, "data"?: ..., "message"?: string, "errors"?: {field: [messages]}}`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,
        crate::auth::handlers::me,
        crate::auth::handlers::update_me,
        crate::auth::handlers::change_password,
        crate::auth::handlers::list_users,

        crate::api::dashboard::dashboard,
        crate::api::analytics::metrics,

        crate::api::projects::list_projects,
        crate::api::projects::create_project,
        crate::api::projects::get_project,
        crate::api::projects::update_project,
        crate::api::projects::assign_workers,
        crate::api::projects::delete_project,

        crate::api::workforce::list_workers,
        crate::api::workforce::create_worker,
        crate::api::workforce::list_attendance,
        crate::api::workforce::check_in,
        crate::api::workforce::check_out,

        crate::api::inventory::list_inventory,
        crate::api::inventory::low_stock,
        crate::api::inventory::create_item,
        crate::api::inventory::get_item,
        crate::api::inventory::update_item,
        crate::api::inventory::delete_item,

        crate::api::payroll::payroll_summary_view,
        crate::api::payroll::list_payroll,
        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll
    ),
    components(
        schemas(
            LoginRequest,
            RefreshRequest,
            RegisterRequest,
            ChangePasswordRequest,
            Role,
            CreateProject,
            AssignWorkers,
            ProjectStatus,
            CreateWorker,
            CheckInRequest,
            CreateInventoryItem,
            InventoryCategory,
            CreatePayroll,
            PayrollStatus
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, tokens and user accounts"),
        (name = "Dashboard", description = "Home screen KPIs"),
        (name = "Analytics", description = "Revenue, cost and efficiency metrics"),
        (name = "Projects", description = "Construction projects"),
        (name = "Workforce", description = "Workers and attendance"),
        (name = "Inventory", description = "Materials and equipment stock"),
        (name = "Payroll", description = "Monthly payroll records"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_area_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/dashboard/stats",
            "/api/analytics/metrics",
            "/api/projects/{id}",
            "/api/workforce/attendance/checkin",
            "/api/inventory/low-stock",
            "/api/payroll/summary",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
