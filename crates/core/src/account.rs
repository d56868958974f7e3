use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
    Archived,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "archived" => Ok(AccountStatus::Archived),
            other => Err(format!("unknown account status: '{other}'")),
        }
    }
}

/// The identity a set of statement transactions belongs to.
/// Identity is fixed at creation; status only scopes queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Option<AccountId>,
    pub name: String,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(name: &str) -> Self {
        Account {
            id: None,
            name: name.to_string(),
            status: AccountStatus::Active,
        }
    }
}

/// The validated caller identity every mutating operation receives.
/// Transport-level authentication happens upstream; the core only
/// records who acted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(user_id: UserId, name: &str) -> Self {
        Actor {
            user_id,
            name: name.to_string(),
        }
    }
}
