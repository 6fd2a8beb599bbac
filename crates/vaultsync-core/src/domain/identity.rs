//! Acting identity
//!
//! Every checkout decision is made relative to the user *and* the machine the
//! client runs on, since one user may hold checkouts from several workstations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{MachineId, UserId};

/// Role of a vault user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular member
    #[default]
    Member,
    /// Elevated role, may force-release other users' checkouts
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::UnknownLiteral {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// The user and workstation on whose behalf the engine acts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    user_id: UserId,
    machine_id: MachineId,
    machine_name: String,
    role: Role,
}

impl Identity {
    /// Creates a new identity
    pub fn new(
        user_id: UserId,
        machine_id: MachineId,
        machine_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            user_id,
            machine_id,
            machine_name: machine_name.into(),
            role,
        }
    }

    /// Returns the user id
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the machine id
    pub fn machine_id(&self) -> &MachineId {
        &self.machine_id
    }

    /// Returns the human-readable machine name
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Returns the role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns true if this identity may perform privileged operations
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.machine_name)
    }
}
