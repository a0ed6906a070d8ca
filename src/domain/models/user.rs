use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles ordered by privilege: Admin > EventManager > EventLeader > Teacher > Student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Teacher,
    EventLeader,
    EventManager,
    Admin,
}

impl Role {
    pub fn privilege_level(&self) -> u8 {
        match self {
            Role::Admin => 5,
            Role::EventManager => 4,
            Role::EventLeader => 3,
            Role::Teacher => 2,
            Role::Student => 1,
        }
    }

    pub fn has_at_least(&self, other: Role) -> bool {
        self.privilege_level() >= other.privilege_level()
    }

    /// Staff roles may place reservations on behalf of other users.
    pub fn can_reserve_for_others(&self) -> bool {
        self.has_at_least(Role::Teacher)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::EventLeader => "EVENT_LEADER",
            Role::EventManager => "EVENT_MANAGER",
            Role::Admin => "ADMIN",
        }
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
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "EVENT_LEADER" => Ok(Role::EventLeader),
            "EVENT_MANAGER" => Ok(Role::EventManager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Read-only view of an account, owned by the user subsystem. The booking core
/// only ever needs identity, role and contact details.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

impl UserSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
            email_verified: true,
        }
    }
}
