use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Worker,
    SiteManager,
    Admin,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Worker => "Worker",
            Role::SiteManager => "Site Manager",
            Role::Admin => "Admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_role_names() {
        assert_eq!("site_manager".parse::<Role>().unwrap(), Role::SiteManager);
        assert_eq!(Role::try_from("admin".to_string()).unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::SiteManager.as_ref(), "site_manager");
        assert_eq!(Role::SiteManager.label(), "Site Manager");
    }
}
