use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const FUND_DECIMALS: u32 = 18;
pub const FUND_BASE_UNIT: u128 = 1_000_000_000_000_000_000; // 10^18

/// Amount of the shared fund, counted in the smallest indivisible unit.
///
/// Serialized as a decimal string of whole units (`"0.5"`) so that
/// JSON and TOML consumers never lose precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FundAmount(u128);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountParseError(pub String);

impl fmt::Display for AmountParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid fund amount: {}", self.0)
    }
}

impl std::error::Error for AmountParseError {}

impl FundAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Whole fund units.
    pub fn from_units(units: u64) -> Self {
        Self(units as u128 * FUND_BASE_UNIT)
    }

    /// Fractional whole units; intended for fixtures, not for parsing user input.
    pub fn from_fund(fund: f64) -> Self {
        Self((fund * FUND_BASE_UNIT as f64) as u128)
    }

    pub fn to_base_units(&self) -> u128 {
        self.0
    }

    pub fn to_fund(&self) -> f64 {
        self.0 as f64 / FUND_BASE_UNIT as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Exact decimal rendering without trailing zeros, e.g. `"0.5"`.
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / FUND_BASE_UNIT;
        let frac = self.0 % FUND_BASE_UNIT;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:018}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl FromStr for FundAmount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountParseError(s.to_string()));
        }
        if frac.len() > FUND_DECIMALS as usize {
            return Err(AmountParseError(format!(
                "{} has more than {} decimals",
                s, FUND_DECIMALS
            )));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountParseError(s.to_string()))?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<18}", frac);
            padded.parse().map_err(|_| AmountParseError(s.to_string()))?
        };
        whole
            .checked_mul(FUND_BASE_UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| AmountParseError(format!("{} overflows", s)))
    }
}

impl fmt::Display for FundAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} FUND", self.to_decimal_string())
    }
}

impl Serialize for FundAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for FundAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
