// core/src/boundary/profile.rs

use serde::{Deserialize, Serialize};

/// A row of the `profiles` table, keyed by auth identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub full_name: Option<String>,
  #[serde(default)]
  pub role: Option<String>,
}
