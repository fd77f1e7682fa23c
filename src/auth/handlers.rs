use crate::{
    access::Action,
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{
        profile::{AdminProfile, SiteManagerProfile},
        role::Role,
        user::{USER_COLUMNS, User, UserCredentials},
        worker::{WORKER_SELECT, Worker},
    },
    models::{TokenType, created, ok, ok_message},
    utils::{
        db_utils::{Column, ColumnKind, build_update_sql, execute_update},
        email_cache,
        validation::FieldErrors,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@siteworks.test")]
    pub email: String,
    pub password: String,
    /// Optional: the account must have this role.
    pub role: Option<Role>,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "new.hire@siteworks.test")]
    pub email: String,
    #[schema(example = "Rahim Uddin")]
    pub name: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize, IntoParams)]
pub struct UserQuery {
    pub role: Option<Role>,
}

const ME_COLUMNS: [Column; 3] = [
    Column::new("name", ColumnKind::Text),
    Column::new("phone", ColumnKind::OptionalText),
    Column::new("avatar_url", ColumnKind::OptionalText),
];

async fn fetch_user(pool: &MySqlPool, user_id: u64) -> AppResult<User> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ? AND is_deleted = 0");
    sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

pub(crate) async fn worker_id_of(pool: &MySqlPool, user_id: u64) -> AppResult<Option<u64>> {
    Ok(
        sqlx::query_scalar::<_, u64>("SELECT id FROM workers WHERE user_id = ? AND is_deleted = 0")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Issues an access/refresh pair and records the refresh `jti`.
async fn issue_token_pair(pool: &MySqlPool, config: &Config, subject: &Subject) -> AppResult<(String, String)> {
    let access = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh, refresh_claims) = generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok((access, refresh))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair and user profile"),
        (status = 400, description = "Invalid credentials, disabled account or role mismatch")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, body), fields(email = %body.email))]
pub async fn login(
    body: web::Json<LoginRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    let mut errors = FieldErrors::default();
    errors.require_text("email", &body.email);
    errors.require_text("password", &body.password);
    errors.into_result()?;

    let invalid = || AppError::bad_request("Invalid email or password.");

    let db_user = sqlx::query_as::<_, UserCredentials>(
        r#"
        SELECT id, email, name, password, role, is_active
        FROM users
        WHERE email = ? AND is_deleted = 0
        "#,
    )
    .bind(email_cache::normalize(&body.email))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        invalid()
    })?;

    if let Err(e) = verify_password(&body.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    if !db_user.is_active {
        return Err(AppError::bad_request("User account is disabled."));
    }

    if let Some(requested) = body.role {
        if requested != db_user.role {
            return Err(AppError::bad_request(format!(
                "This account does not have the {requested} role."
            )));
        }
    }

    let subject = Subject {
        user_id: db_user.id,
        email: db_user.email.clone(),
        role: db_user.role,
        worker_id: worker_id_of(pool.get_ref(), db_user.id).await?,
    };
    let (access, refresh) = issue_token_pair(pool.get_ref(), &config, &subject).await?;

    // not fatal for the login itself
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }
    email_cache::mark_taken(&db_user.email).await;

    let user = fetch_user(pool.get_ref(), db_user.id).await?;
    info!(user_id = db_user.id, "Login successful");

    Ok(ok(json!({
        "access": access,
        "refresh": refresh,
        "user": user.to_json(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair"),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    body: web::Json<RefreshRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let invalid = || AppError::Unauthorized("Token is invalid or expired".into());

    let claims = verify_token(&body.refresh, &config.jwt_secret).map_err(|_| invalid())?;
    if claims.token_type != TokenType::Refresh {
        return Err(invalid());
    }

    let mut tx = pool.begin().await?;

    // revoke exactly once; a second presentation of the same token finds nothing to revoke
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .execute(&mut *tx)
    .await?;

    if revoked.rows_affected() == 0 {
        return Err(invalid());
    }

    let user = sqlx::query_as::<_, UserCredentials>(
        "SELECT id, email, name, password, role, is_active FROM users WHERE id = ? AND is_deleted = 0",
    )
    .bind(claims.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(invalid)?;

    tx.commit().await?;

    let subject = Subject {
        user_id: user.id,
        email: user.email,
        role: user.role,
        worker_id: worker_id_of(pool.get_ref(), user.id).await?,
    };
    let (access, refresh) = issue_token_pair(pool.get_ref(), &config, &subject).await?;

    Ok(ok(json!({ "access": access, "refresh": refresh })))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Logged out"),
        (status = 400, description = "Invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    _auth: AuthUser,
    body: web::Json<Value>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    if let Some(refresh) = body.get("refresh").and_then(Value::as_str) {
        let claims = verify_token(refresh, &config.jwt_secret)
            .map_err(|_| AppError::bad_request("Invalid token."))?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::bad_request("Invalid token."));
        }

        // idempotent
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await?;
    }

    Ok(ok_message("Logged out successfully."))
}

fn validate_registration(body: &RegisterRequest) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    errors.require_email("email", &body.email);
    errors.require_text("name", &body.name);
    errors.require_min_len("password", &body.password, 6);
    if body.password != body.confirm_password {
        errors.add("non_field_errors", "Passwords do not match.");
    }
    errors.into_result()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Only admins can create users"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    body: web::Json<RegisterRequest>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::RegisterUser)
        .map_err(|_| AppError::Forbidden("Only admins can create users.".into()))?;
    validate_registration(&body)?;

    let email = email_cache::normalize(&body.email);
    let duplicate = || AppError::Conflict("A user with this email already exists.".into());

    if !email_cache::is_email_available(&email, pool.get_ref()).await? {
        return Err(duplicate());
    }

    let hashed = hash_password(&body.password)?;
    let role = body.role.unwrap_or(Role::Worker);

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, password, role, phone)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&email)
    .bind(body.name.trim())
    .bind(&hashed)
    .bind(role.as_ref())
    .bind(body.phone.trim())
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "A user with this email already exists."))?;

    email_cache::mark_taken(&email).await;
    info!(user_id = result.last_insert_id(), %role, "User registered");

    let user = fetch_user(pool.get_ref(), result.last_insert_id()).await?;
    Ok(created(user.to_json()))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Own profile, with the role-specific profile embedded")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let user = fetch_user(pool.get_ref(), auth.user_id).await?;
    let mut data = user.to_json();

    match user.role {
        Role::Worker => {
            let sql = format!("{WORKER_SELECT} WHERE w.user_id = ? AND w.is_deleted = 0");
            let worker = sqlx::query_as::<_, Worker>(&sql)
                .bind(user.id)
                .fetch_optional(pool.get_ref())
                .await?;
            data["worker_profile"] = json!(worker.map(|w| w.to_json()));
        }
        Role::SiteManager => {
            let profile = sqlx::query_as::<_, SiteManagerProfile>(
                r#"
                SELECT id, user_id, employee_id, department, years_of_experience, certifications
                FROM site_manager_profiles
                WHERE user_id = ? AND is_deleted = 0
                "#,
            )
            .bind(user.id)
            .fetch_optional(pool.get_ref())
            .await?;
            data["site_manager_profile"] = json!(profile);
        }
        Role::Admin => {
            let profile = sqlx::query_as::<_, AdminProfile>(
                r#"
                SELECT id, user_id, employee_id, department, admin_level
                FROM admin_profiles
                WHERE user_id = ? AND is_deleted = 0
                "#,
            )
            .bind(user.id)
            .fetch_optional(pool.get_ref())
            .await?;
            data["admin_profile"] = json!(profile);
        }
    }

    Ok(ok(data))
}

#[utoipa::path(
    patch,
    path = "/api/auth/me",
    request_body = Object,
    responses(
        (status = 200, description = "Updated profile"),
        (status = 400, description = "Only name, phone and avatar_url can be changed")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn update_me(
    auth: AuthUser,
    body: web::Json<Value>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let update = build_update_sql("users", &body, &ME_COLUMNS, auth.user_id)?;
    execute_update(pool.get_ref(), update).await?;

    let user = fetch_user(pool.get_ref(), auth.user_id).await?;
    Ok(ok(user.to_json()))
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Old password incorrect or new password too short")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password(
    auth: AuthUser,
    body: web::Json<ChangePasswordRequest>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ? AND is_deleted = 0")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    let mut errors = FieldErrors::default();
    if verify_password(&body.old_password, &stored).is_err() {
        errors.add("old_password", "Old password is incorrect.");
    }
    errors.require_min_len("new_password", &body.new_password, 6);
    errors.into_result()?;

    let hashed = hash_password(&body.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    info!(user_id = auth.user_id, "Password changed");
    Ok(ok_message("Password updated."))
}

#[utoipa::path(
    get,
    path = "/api/auth/users",
    params(UserQuery),
    responses(
        (status = 200, description = "Users, optionally filtered by role"),
        (status = 403, description = "Permission denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn list_users(
    auth: AuthUser,
    query: web::Query<UserQuery>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    auth.require(Action::ListUsers)?;

    let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_deleted = 0");
    if query.role.is_some() {
        sql.push_str(" AND role = ?");
    }
    sql.push_str(" ORDER BY name");

    let mut q = sqlx::query_as::<_, User>(&sql);
    if let Some(role) = query.role.as_ref() {
        q = q.bind(role.as_ref());
    }
    let users = q.fetch_all(pool.get_ref()).await?;

    Ok(ok(users.iter().map(User::to_json).collect::<Vec<_>>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: "new.hire@siteworks.test".into(),
            name: "New Hire".into(),
            role: None,
            phone: String::new(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn registration_requires_matching_passwords() {
        assert!(validate_registration(&registration("secret1", "secret1")).is_ok());
        match validate_registration(&registration("secret1", "secret2")) {
            Err(AppError::Validation { errors, .. }) => {
                assert!(errors.contains_key("non_field_errors"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn registration_requires_six_character_passwords() {
        match validate_registration(&registration("abc", "abc")) {
            Err(AppError::Validation { errors, .. }) => assert!(errors.contains_key("password")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
