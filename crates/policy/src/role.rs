//! Roles and the users that hold them.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user identifier, compared by equality for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The closed set of roles, ordered by rank.
///
/// Higher ranks imply every capability of the lower ones. Adding a role means
/// giving it a rank in this line, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Subscriber,
    Author,
    Editor,
    Admin,
}

impl Role {
    /// Every role, lowest rank first.
    pub const ALL: [Role; 4] = [Role::Subscriber, Role::Author, Role::Editor, Role::Admin];

    pub fn rank(self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Editor => 3,
            Role::Author => 2,
            Role::Subscriber => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Subscriber => "subscriber",
        }
    }

    /// True if this role ranks at or above `required`.
    pub fn at_least(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "author" => Ok(Role::Author),
            "subscriber" => Ok(Role::Subscriber),
            _ => Err(Error::UnknownRole(s.to_string())),
        }
    }
}

/// The caller a decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn admin(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn editor(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Editor)
    }

    pub fn author(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Author)
    }

    pub fn subscriber(id: impl Into<UserId>) -> Self {
        Self::new(id, Role::Subscriber)
    }

    /// True if the user's role ranks at or above `required`.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.at_least(required)
    }
}
