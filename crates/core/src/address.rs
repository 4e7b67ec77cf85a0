//! Ledger addresses and native-currency amounts.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A ledger account address: `0x` followed by 40 hex digits.
///
/// Stored lowercased so two spellings of the same account compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| DomainError::invalid_address(trimmed))?;

        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::invalid_address(trimmed));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a comma-separated list into valid addresses and rejected raw entries.
    ///
    /// Empty entries are ignored; order of first appearance is kept.
    pub fn parse_list(raw: &str) -> (Vec<Address>, Vec<String>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match Address::parse(part) {
                Ok(addr) => valid.push(addr),
                Err(_) => invalid.push(part.to_string()),
            }
        }
        (valid, invalid)
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

const WEI_PER_ETHER_DECIMALS: usize = 18;

/// Amount of native currency in its smallest unit (10^-18 of one coin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    pub fn new(wei: u128) -> Self {
        Self(wei)
    }

    pub fn get(&self) -> u128 {
        self.0
    }

    /// Parse a decimal coin amount such as `0.3` or `12`.
    pub fn parse_ether(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        let (whole, frac) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };

        let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty())
            || !digits_only(whole)
            || !digits_only(frac)
            || frac.len() > WEI_PER_ETHER_DECIMALS
        {
            return Err(DomainError::invalid_amount(raw));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| DomainError::invalid_amount(raw))?
        };
        let frac_scaled: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = WEI_PER_ETHER_DECIMALS);
            padded.parse().map_err(|_| DomainError::invalid_amount(raw))?
        };

        whole
            .checked_mul(10u128.pow(WEI_PER_ETHER_DECIMALS as u32))
            .and_then(|w| w.checked_add(frac_scaled))
            .map(Wei)
            .ok_or_else(|| DomainError::invalid_amount(format!("{raw} overflows")))
    }

    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }
}

impl core::fmt::Display for Wei {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} wei", self.0)
    }
}
