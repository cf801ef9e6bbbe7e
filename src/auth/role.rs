use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of roles. `SystemAdmin` lives in the master database; every
/// other role belongs to a trust schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SystemAdmin,
    TrustAdmin,
    SchoolAdmin,
    Teacher,
    Accountant,
    Parent,
}

impl Role {
    pub const TRUST_ROLES: &'static [Role] = &[
        Role::TrustAdmin,
        Role::SchoolAdmin,
        Role::Teacher,
        Role::Accountant,
        Role::Parent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::TrustAdmin => "TRUST_ADMIN",
            Role::SchoolAdmin => "SCHOOL_ADMIN",
            Role::Teacher => "TEACHER",
            Role::Accountant => "ACCOUNTANT",
            Role::Parent => "PARENT",
        }
    }

    pub fn is_trust_role(&self) -> bool {
        !matches!(self, Role::SystemAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM_ADMIN" => Ok(Role::SystemAdmin),
            "TRUST_ADMIN" => Ok(Role::TrustAdmin),
            "SCHOOL_ADMIN" => Ok(Role::SchoolAdmin),
            "TEACHER" => Ok(Role::Teacher),
            "ACCOUNTANT" => Ok(Role::Accountant),
            "PARENT" => Ok(Role::Parent),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str_and_serde() {
        for role in Role::TRUST_ROLES.iter().chain([Role::SystemAdmin].iter()) {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
        assert!("PRINCIPAL".parse::<Role>().is_err());
    }
}
