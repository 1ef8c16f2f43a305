// core/src/diagnostics.rs

//! Operator-facing setup help surfaced when the backing tables are missing
//! or an admin account lacks its role.

/// Creates every table, constraint and change trigger the storefront needs.
pub const SETUP_SQL: &str = include_str!("../sql/setup.sql");

/// SQL that promotes the profile with `email` to the admin role.
pub fn grant_admin_sql(email: &str) -> String {
  format!(
    "UPDATE profiles SET role = 'ADMIN' WHERE email = '{}';",
    email.replace('\'', "''")
  )
}
