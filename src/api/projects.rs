use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    access::Action,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        project::{PROJECT_SELECT, Project, ProjectStatus},
        role::Role,
    },
    models::{created, ok, ok_message},
    utils::{
        db_utils::{Column, ColumnKind, Visibility, build_update_sql, execute_update, soft_delete},
        validation::FieldErrors,
    },
};

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Riverside Tower")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(example = "Plot 14, Gulshan")]
    pub location: String,
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    #[schema(example = 250000.0)]
    pub budget: f64,
    #[serde(default)]
    pub spent: f64,
    #[schema(example = "2026-01-01", value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-12-31", value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
    /// User id of a site manager.
    pub site_manager: Option<u64>,
    /// User ids of assigned workers.
    #[serde(default)]
    pub workers: Vec<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignWorkers {
    /// User ids; replaces the current assignment.
    pub workers: Vec<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    /// Admins only: include soft-deleted projects.
    #[serde(default)]
    pub include_deleted: bool,
}

const PROJECT_COLUMNS: [Column; 10] = [
    Column::new("name", ColumnKind::Text),
    Column::new("description", ColumnKind::OptionalText),
    Column::new("location", ColumnKind::Text),
    Column::new("status", ColumnKind::Choice(&ProjectStatus::ALL)),
    Column::new("progress", ColumnKind::Percent),
    Column::new("budget", ColumnKind::Amount),
    Column::new("spent", ColumnKind::Amount),
    Column::new("start_date", ColumnKind::OptionalDate),
    Column::new("due_date", ColumnKind::OptionalDate),
    Column::mapped("site_manager", "site_manager_id", ColumnKind::OptionalId),
];

/// Listing SQL. `assigned_to` restricts the rows to projects the given user works on.
fn list_sql(visibility: Visibility, assigned_to: Option<u64>, status: Option<ProjectStatus>) -> String {
    let mut conditions = vec![visibility.predicate("p")];
    if assigned_to.is_some() {
        conditions.push(
            "EXISTS (SELECT 1 FROM project_workers pw WHERE pw.project_id = p.id AND pw.user_id = ?)"
                .to_string(),
        );
    }
    if status.is_some() {
        conditions.push("p.status = ?".to_string());
    }
    format!(
        "{PROJECT_SELECT} WHERE {} ORDER BY p.created_at DESC",
        conditions.join(" AND ")
    )
}

pub async fn fetch_project(pool: &MySqlPool, id: u64) -> AppResult<Project> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = ? AND {}", Visibility::Active.predicate("p"));
    sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found.".into()))
}

/// Users in `ids` that are missing or do not have `role`.
async fn users_without_role(pool: &MySqlPool, ids: &[u64], role: Role) -> AppResult<Vec<u64>> {
    let mut missing = Vec::new();
    for id in ids {
        let found: Option<u64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = ? AND role = ? AND is_deleted = 0")
                .bind(id)
                .bind(role.as_ref())
                .fetch_optional(pool)
                .await?;
        if found.is_none() {
            missing.push(*id);
        }
    }
    Ok(missing)
}

fn validate_project(body: &CreateProject) -> FieldErrors {
    let mut errors = FieldErrors::default();
    errors.require_text("name", &body.name);
    errors.require_text("location", &body.location);
    errors.require_percent("progress", body.progress);
    errors.require_non_negative("budget", body.budget);
    errors.require_non_negative("spent", body.spent);
    errors
}

#[utoipa::path(
    get,
    path = "/api/projects",
    params(ProjectQuery),
    responses((status = 200, description = "Projects; workers only receive projects they are assigned to")),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    auth: AuthUser,
    query: web::Query<ProjectQuery>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ListProjects)?;

    let assigned_to = auth.is_worker().then_some(auth.user_id);
    let visibility = if query.include_deleted && auth.role == Role::Admin {
        Visibility::IncludeDeleted
    } else {
        Visibility::Active
    };
    let sql = list_sql(visibility, assigned_to, query.status);
    debug!(sql = %sql, ?assigned_to, "Listing projects");

    let mut q = sqlx::query_as::<_, Project>(&sql);
    if let Some(user_id) = assigned_to {
        q = q.bind(user_id);
    }
    if let Some(status) = query.status.as_ref() {
        q = q.bind(status.as_ref());
    }
    let projects = q.fetch_all(pool.get_ref()).await?;

    Ok(ok(projects.iter().map(Project::response).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_project(
    auth: AuthUser,
    body: web::Json<CreateProject>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::CreateProject)?;

    let mut errors = validate_project(&body);
    if let Some(manager) = body.site_manager {
        if !users_without_role(pool.get_ref(), &[manager], Role::SiteManager).await?.is_empty() {
            errors.add("site_manager", "Invalid pk - object does not exist.");
        }
    }
    if !users_without_role(pool.get_ref(), &body.workers, Role::Worker).await?.is_empty() {
        errors.add("workers", "Invalid pk - object does not exist.");
    }
    errors.into_result()?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO projects
        (name, description, location, status, progress, budget, spent,
         start_date, due_date, site_manager_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.location.trim())
    .bind(body.status.unwrap_or(ProjectStatus::Planning).as_ref())
    .bind(body.progress)
    .bind(body.budget)
    .bind(body.spent)
    .bind(body.start_date)
    .bind(body.due_date)
    .bind(body.site_manager)
    .execute(&mut *tx)
    .await?;

    let project_id = result.last_insert_id();
    for worker in &body.workers {
        sqlx::query("INSERT IGNORE INTO project_workers (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(worker)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(project_id, user_id = auth.user_id, "Project created");

    let project = fetch_project(pool.get_ref(), project_id).await?;
    Ok(created(project.response()))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn get_project(
    auth: AuthUser,
    path: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ViewProject)?;
    let project = fetch_project(pool.get_ref(), path.into_inner()).await?;
    Ok(ok(project.response()))
}

#[utoipa::path(
    patch,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    request_body = Object,
    responses(
        (status = 200, description = "Project updated"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Permission denied"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn update_project(
    auth: AuthUser,
    path: web::Path<u64>,
    body: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::UpdateProject)?;

    let project_id = path.into_inner();
    fetch_project(pool.get_ref(), project_id).await?;

    let update = build_update_sql("projects", &body, &PROJECT_COLUMNS, project_id)?;

    if let Some(manager) = body.get("site_manager").and_then(Value::as_u64) {
        if !users_without_role(pool.get_ref(), &[manager], Role::SiteManager).await?.is_empty() {
            let mut errors = FieldErrors::default();
            errors.add("site_manager", "Invalid pk - object does not exist.");
            errors.into_result()?;
        }
    }

    execute_update(pool.get_ref(), update).await?;
    info!(project_id, user_id = auth.user_id, "Project updated");

    let project = fetch_project(pool.get_ref(), project_id).await?;
    Ok(ok(project.response()))
}

#[utoipa::path(
    post,
    path = "/api/projects/{id}/workers",
    params(("id" = u64, Path, description = "Project id")),
    request_body = AssignWorkers,
    responses(
        (status = 200, description = "Assignment replaced"),
        (status = 400, description = "Unknown worker"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn assign_workers(
    auth: AuthUser,
    path: web::Path<u64>,
    body: web::Json<AssignWorkers>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::AssignProjectWorkers)?;

    let project_id = path.into_inner();
    fetch_project(pool.get_ref(), project_id).await?;

    if !users_without_role(pool.get_ref(), &body.workers, Role::Worker).await?.is_empty() {
        let mut errors = FieldErrors::default();
        errors.add("workers", "Invalid pk - object does not exist.");
        errors.into_result()?;
    }

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM project_workers WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
    for worker in &body.workers {
        sqlx::query("INSERT IGNORE INTO project_workers (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(worker)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE projects SET updated_at = NOW() WHERE id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let project = fetch_project(pool.get_ref(), project_id).await?;
    Ok(ok(project.response()))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 403, description = "Only admins can delete projects"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn delete_project(
    auth: AuthUser,
    path: web::Path<u64>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::DeleteProject)
        .map_err(|_| AppError::Forbidden("Only admins can delete projects.".into()))?;

    let project_id = path.into_inner();
    if !soft_delete(pool.get_ref(), "projects", project_id).await? {
        return Err(AppError::NotFound("Project not found.".into()));
    }

    info!(project_id, user_id = auth.user_id, "Project deleted");
    Ok(ok_message("Project deleted."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(progress: f64, budget: f64) -> CreateProject {
        CreateProject {
            name: "Riverside Tower".into(),
            description: String::new(),
            location: "Gulshan".into(),
            status: None,
            progress,
            budget,
            spent: 0.0,
            start_date: None,
            due_date: None,
            site_manager: None,
            workers: vec![],
        }
    }

    #[test]
    fn worker_listing_is_scoped_to_assignments() {
        let sql = list_sql(Visibility::Active, Some(42), None);
        assert!(sql.contains("pw.user_id = ?"));
        assert!(sql.contains("p.is_deleted = 0"));

        let sql = list_sql(Visibility::Active, None, None);
        assert!(!sql.contains("pw.user_id"));
    }

    #[test]
    fn assignment_placeholder_precedes_status_placeholder() {
        let sql = list_sql(Visibility::Active, Some(1), Some(ProjectStatus::InProgress));
        let assignment = sql.find("pw.user_id = ?").unwrap();
        let status = sql.find("p.status = ?").unwrap();
        assert!(assignment < status);
        assert_eq!(sql.matches('?').count(), 2);
    }

    #[test]
    fn status_filter_is_appended() {
        let sql = list_sql(Visibility::IncludeDeleted, None, Some(ProjectStatus::Completed));
        assert!(sql.contains("p.status = ?"));
        assert!(!sql.contains("p.is_deleted = 0"));
    }

    #[test]
    fn project_validation_bounds() {
        assert!(validate_project(&body(50.0, 1000.0)).is_empty());
        assert!(!validate_project(&body(101.0, 1000.0)).is_empty());
        assert!(!validate_project(&body(50.0, -1.0)).is_empty());
    }
}
