use crate::{
    access::{Action, can},
    error::AppError,
    model::role::Role,
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// The authenticated caller, placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,

    /// Present only if this user has a worker profile
    pub worker_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| {
                    AppError::Unauthorized("Authentication credentials were not provided.".into())
                }),
        )
    }
}

impl AuthUser {
    pub fn require(&self, action: Action) -> Result<(), AppError> {
        if can(self.role, action) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, role = %self.role, ?action, "Permission denied");
            Err(AppError::permission_denied())
        }
    }

    /// Workers only ever see their own records.
    pub fn is_worker(&self) -> bool {
        self.role == Role::Worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            email: "a@b.co".into(),
            role,
            worker_id: None,
        }
    }

    #[test]
    fn require_maps_denial_to_forbidden() {
        assert!(user(Role::Admin).require(Action::DeleteProject).is_ok());
        assert!(matches!(
            user(Role::SiteManager).require(Action::DeleteProject),
            Err(AppError::Forbidden(_))
        ));
    }
}
