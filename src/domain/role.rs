use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role carried by every user and every access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Cashier => "cashier",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Role::Admin => 0b001,
            Role::User => 0b010,
            Role::Cashier => 0b100,
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
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "cashier" => Ok(Role::Cashier),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Set of roles a route admits.
///
/// Attached declaratively to each protected resource and checked by
/// `middleware::authorize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Any authenticated caller
    pub const ANY: RoleSet = RoleSet(0b111);
    pub const ADMIN: RoleSet = RoleSet(0b001);

    pub fn of(roles: &[Role]) -> Self {
        RoleSet(roles.iter().fold(0, |bits, role| bits | role.bit()))
    }

    pub fn allows(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }
}
