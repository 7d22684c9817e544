//! Token amounts and the fixed 18-decimal display rule.
//!
//! Amounts travel on chain as integers in the token's smallest unit. People
//! type and read them as decimal strings scaled by `10^18`. Conversion is exact
//! in both directions: no floating point is involved at any step.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Serialize, Serializer};

use crate::error::ValidationError;

/// Number of decimals between the smallest unit and the display unit.
pub const DECIMALS: u8 = 18;

/// An amount of the marketplace token, stored in smallest units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(U256);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Wraps a raw smallest-unit value.
    #[must_use]
    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// Returns the raw smallest-unit value.
    #[must_use]
    pub const fn raw(&self) -> U256 {
        self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parses a human-readable decimal string such as `"12.5"`.
    ///
    /// Surrounding whitespace is ignored. Trailing fractional zeros beyond
    /// [`DECIMALS`] places are accepted, any other extra precision is rejected
    /// rather than rounded.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the input is not an unsigned decimal
    /// number, carries too many fractional digits, or overflows 256 bits.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let value = input.trim();
        let malformed = || ValidationError::MalformedAmount {
            value: value.to_string(),
        };

        let (whole, fraction) = match value.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (value, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > usize::from(DECIMALS) {
            return Err(ValidationError::TooManyDecimals {
                value: value.to_string(),
                max: DECIMALS,
            });
        }

        let overflow = || ValidationError::AmountOverflow {
            value: value.to_string(),
        };
        let whole = accumulate_digits(whole).ok_or_else(overflow)?;
        let padded = format!("{fraction:0<width$}", width = usize::from(DECIMALS));
        let fraction = accumulate_digits(&padded).ok_or_else(overflow)?;

        whole
            .checked_mul(scale())
            .and_then(|scaled| scaled.checked_add(fraction))
            .map(Self)
            .ok_or_else(overflow)
    }
}

fn scale() -> U256 {
    U256::from(10u64).pow(U256::from(DECIMALS))
}

/// Folds ASCII digits into a `U256`, returning `None` on overflow.
fn accumulate_digits(digits: &str) -> Option<U256> {
    let ten = U256::from(10u64);
    digits.bytes().try_fold(U256::ZERO, |acc, digit| {
        acc.checked_mul(ten)?
            .checked_add(U256::from(digit - b'0'))
    })
}

impl fmt::Display for TokenAmount {
    /// Canonical form: no leading zeros, no trailing fractional zeros, and no
    /// decimal point for whole amounts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, fraction) = self.0.div_rem(scale());
        if fraction.is_zero() {
            return write!(f, "{whole}");
        }
        let fraction = format!(
            "{:0>width$}",
            fraction.to_string(),
            width = usize::from(DECIMALS)
        );
        write!(f, "{whole}.{}", fraction.trim_end_matches('0'))
    }
}

impl FromStr for TokenAmount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<U256> for TokenAmount {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
