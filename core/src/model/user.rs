// core/src/model/user.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
  #[default]
  Customer,
  Admin,
}

impl UserRole {
  pub fn as_str(&self) -> &'static str {
    match self {
      UserRole::Customer => "CUSTOMER",
      UserRole::Admin => "ADMIN",
    }
  }
}

impl fmt::Display for UserRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for UserRole {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "CUSTOMER" => Ok(UserRole::Customer),
      "ADMIN" => Ok(UserRole::Admin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

/// The signed-in person as the storefront sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub email: String,
  pub name: String,
  pub role: UserRole,
}

impl User {
  pub fn is_admin(&self) -> bool {
    self.role == UserRole::Admin
  }
}
