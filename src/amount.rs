//! Fixed-point token amounts.
//!
//! The ledger counts in base units: one whole token is `10^18` units, the
//! same scaling ERC-20 tokens use for "wei". Everything here is integer
//! arithmetic; truncation is toward zero.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AmountError;

/// Token quantity in base units.
pub type Amount = u128;

/// Number of fractional decimal digits in the fixed-point representation.
pub const DECIMALS: u8 = 18;

/// One whole token in base units.
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000; // 10^18

/// `n` whole tokens in base units. Panics on overflow, use
/// [`checked_tokens`] for untrusted input.
pub const fn tokens(n: u128) -> Amount {
    n * ONE_TOKEN
}

pub fn checked_tokens(n: u128) -> Option<Amount> {
    n.checked_mul(ONE_TOKEN)
}

/// Parses a human-readable decimal quantity (`"1"`, `"0.9"`, `"999999.9"`)
/// into base units.
pub fn to_base_units(input: &str) -> Result<Amount, AmountError> {
    let s = input.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Empty);
    }
    if let Some(c) = whole.chars().chain(frac.chars()).find(|c| !c.is_ascii_digit()) {
        return Err(AmountError::InvalidDigit(c));
    }
    if frac.len() > DECIMALS as usize {
        return Err(AmountError::TooManyDecimals(frac.len()));
    }

    let whole_units = checked_tokens(parse_digits(whole)?).ok_or(AmountError::Overflow)?;
    // right-pad the fraction to exactly DECIMALS digits
    let frac_units = parse_digits(frac)?
        * 10u128.pow(u32::from(DECIMALS) - frac.len() as u32);
    whole_units
        .checked_add(frac_units)
        .ok_or(AmountError::Overflow)
}

/// Renders base units the way `ethers.formatUnits(x, 18)` does: trailing
/// fractional zeros are stripped but at least one fractional digit stays.
pub fn to_decimal_string(amount: Amount) -> String {
    let whole = amount / ONE_TOKEN;
    let frac = amount % ONE_TOKEN;
    let frac = format!("{:0width$}", frac, width = DECIMALS as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{frac}")
    }
}

fn parse_digits(digits: &str) -> Result<Amount, AmountError> {
    digits.bytes().try_fold(0u128, |acc, b| {
        acc.checked_mul(10)
            .and_then(|v| v.checked_add(u128::from(b - b'0')))
            .ok_or(AmountError::Overflow)
    })
}

/// Fraction of each auto-burn transfer that is destroyed, stored in the
/// same 18-decimal scale as amounts (`0.1` is `10^17`). Never above 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BurnRate(Amount);

impl BurnRate {
    pub const ZERO: BurnRate = BurnRate(0);

    /// Returns `None` when `scaled` exceeds `ONE_TOKEN` (a rate above 100%).
    pub const fn from_scaled(scaled: Amount) -> Option<Self> {
        if scaled > ONE_TOKEN {
            None
        } else {
            Some(BurnRate(scaled))
        }
    }

    pub const fn percent(p: u8) -> Option<Self> {
        Self::from_scaled(p as Amount * (ONE_TOKEN / 100))
    }

    pub const fn scaled(self) -> Amount {
        self.0
    }

    /// `floor(amount * rate)` in base units.
    ///
    /// `amount` is split into whole tokens and a sub-token remainder so the
    /// product never needs more than 128 bits.
    pub fn burn_portion(self, amount: Amount) -> Option<Amount> {
        let whole = amount / ONE_TOKEN;
        let rest = amount % ONE_TOKEN;
        whole
            .checked_mul(self.0)?
            .checked_add(rest * self.0 / ONE_TOKEN)
    }
}

impl Default for BurnRate {
    fn default() -> Self {
        BurnRate(ONE_TOKEN / 10)
    }
}

impl fmt::Display for BurnRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_decimal_string(self.0))
    }
}

impl FromStr for BurnRate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scaled = to_base_units(s).map_err(|e| e.to_string())?;
        BurnRate::from_scaled(scaled).ok_or_else(|| format!("burn rate {s} exceeds 1"))
    }
}

impl TryFrom<String> for BurnRate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BurnRate> for String {
    fn from(rate: BurnRate) -> Self {
        rate.to_string()
    }
}

/// Serde adapter writing amounts as decimal strings of base units, since
/// `u128` does not survive JSON number handling in most consumers.
pub mod serde_units {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Amount;

    pub fn serialize<S>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}
