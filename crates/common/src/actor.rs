//! Authenticated actors and the roles they act under.
//!
//! Authentication happens outside the workflow; the engines only receive an
//! [`Actor`] and check it against the role set each operation allows.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

/// Role attached to an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    LicenseOfficer,
    ViolationOfficer,
    TrafficPolice,
    /// Department head. Signs off issued licenses.
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::LicenseOfficer => "license_officer",
            Role::ViolationOfficer => "violation_officer",
            Role::TrafficPolice => "traffic_police",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "license_officer" => Ok(Role::LicenseOfficer),
            "violation_officer" => Ok(Role::ViolationOfficer),
            "traffic_police" => Ok(Role::TrafficPolice),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The actor's role is not in the set an operation requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role {role} may not {action}")]
pub struct AccessDenied {
    pub role: Role,
    pub action: &'static str,
}

/// An authenticated caller: a stable user id plus the role it acts under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn citizen(id: UserId) -> Self {
        Self::new(id, Role::Citizen)
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Checks the actor's role against the roles allowed for `action`.
    pub fn require(&self, allowed: &[Role], action: &'static str) -> Result<(), AccessDenied> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: self.role,
                action,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_snake_case_names() {
        assert_eq!("license_officer".parse::<Role>(), Ok(Role::LicenseOfficer));
        assert_eq!(" Super_Admin ".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("mayor".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display_matches_parse() {
        for role in [
            Role::Citizen,
            Role::LicenseOfficer,
            Role::ViolationOfficer,
            Role::TrafficPolice,
            Role::SuperAdmin,
        ] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_require_checks_role_membership() {
        let officer = Actor::new(UserId::new(), Role::LicenseOfficer);
        assert!(officer.require(&[Role::LicenseOfficer], "review").is_ok());

        let err = officer.require(&[Role::SuperAdmin], "sign").unwrap_err();
        assert_eq!(err.role, Role::LicenseOfficer);
        assert_eq!(err.action, "sign");
    }
}
