//! Row types for the identity and ticket tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// May list every account.
    Admin,
}

impl Role {
    /// Returns the stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
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
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A row of the `users` table.
///
/// `lastname`, `firstname`, `age` and `email` hold field cipher tokens,
/// `email_hash` the lookup digest and `password` a PHC credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uuid: String,
    pub lastname: String,
    pub firstname: String,
    pub age: String,
    pub email: String,
    pub email_hash: String,
    pub password: String,
    pub role: Role,
    pub tariff: String,
}

/// Column-wise update of a user row. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub age: Option<String>,
    pub email: Option<String>,
    pub email_hash: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub tariff: Option<String>,
}

impl UserUpdate {
    /// Update that only replaces the stored credential.
    #[must_use]
    pub fn password(credential: impl Into<String>) -> Self {
        Self { password: Some(credential.into()), ..Self::default() }
    }

    /// Returns `true` if no column would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns().is_empty()
    }

    /// Lists the `(column, value)` pairs to write.
    pub(crate) fn columns(&self) -> Vec<(&'static str, String)> {
        let mut columns = Vec::new();
        let text = [
            ("lastname", &self.lastname),
            ("firstname", &self.firstname),
            ("age", &self.age),
            ("email", &self.email),
            ("email_hash", &self.email_hash),
            ("password", &self.password),
        ];
        for (name, value) in text {
            if let Some(value) = value {
                columns.push((name, value.clone()));
            }
        }
        if let Some(role) = self.role {
            columns.push(("role", role.as_str().to_string()));
        }
        if let Some(tariff) = &self.tariff {
            columns.push(("tariff", tariff.clone()));
        }
        columns
    }
}

/// A row of the `tickets` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRecord {
    pub uuid: String,
    pub showing: String,
    pub user_id: String,
    pub tariff: String,
    pub price_cents: i64,
}
