// core/src/model/money.rs

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// An amount in minor currency units (paise for INR).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_minor(minor: i64) -> Self {
    Money(minor)
  }

  /// Converts a major-unit amount, rounding half away from zero to the minor unit.
  /// Amounts outside the `i64` paise range saturate.
  pub fn from_decimal(major: Decimal) -> Self {
    let rounded = major.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let minor = rounded
      .checked_mul(Decimal::ONE_HUNDRED)
      .and_then(|paise| paise.to_i64());
    match minor {
      Some(minor) => Money(minor),
      None if major.is_sign_negative() => Money(i64::MIN),
      None => Money(i64::MAX),
    }
  }

  pub const fn minor(self) -> i64 {
    self.0
  }

  /// The amount in major units, exact to the paisa.
  pub fn to_decimal(self) -> Decimal {
    Decimal::new(self.0, 2)
  }

  pub fn is_negative(self) -> bool {
    self.0 < 0
  }

  pub fn times(self, qty: u32) -> Self {
    Money(self.0.saturating_mul(i64::from(qty)))
  }

  /// Adds `percent` percent on top, rounding half away from zero to the minor unit.
  pub fn with_tax(self, percent: u32) -> Self {
    let scaled = i128::from(self.0) * i128::from(100 + percent);
    let rounded = if scaled >= 0 { (scaled + 50) / 100 } else { (scaled - 50) / 100 };
    Money(rounded as i64)
  }
}

impl Add for Money {
  type Output = Money;

  fn add(self, rhs: Money) -> Money {
    Money(self.0.saturating_add(rhs.0))
  }
}

impl AddAssign for Money {
  fn add_assign(&mut self, rhs: Money) {
    *self = *self + rhs;
  }
}

impl Sum for Money {
  fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
    iter.fold(Money::ZERO, Add::add)
  }
}

/// Parses a major-unit amount such as `"4599"` or `"4599.50"`.
impl FromStr for Money {
  type Err = rust_decimal::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Decimal::from_str(s.trim()).map(Money::from_decimal)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}
