// core/src/checkout/order_number.rs

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

const SUFFIX_SPACE: u32 = 1_000_000;

/// `<PREFIX>-YYYYMMDD-NNNNNN`, dated in UTC with a random 6-digit suffix.
pub fn generate_order_number(prefix: &str, created_at: DateTime<Utc>) -> String {
  format_order_number(prefix, created_at, OsRng.next_u32() % SUFFIX_SPACE)
}

pub fn format_order_number(prefix: &str, created_at: DateTime<Utc>, suffix: u32) -> String {
  format!("{}-{}-{:06}", prefix, created_at.format("%Y%m%d"), suffix % SUFFIX_SPACE)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn suffix_is_zero_padded() {
    let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap();
    assert_eq!(format_order_number("ANS", at, 42), "ANS-20260309-000042");
  }

  #[test]
  fn generated_numbers_have_the_expected_shape() {
    let number = generate_order_number("ANS", Utc::now());
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "ANS");
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), 6);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
  }
}
