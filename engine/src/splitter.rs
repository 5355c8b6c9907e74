//! Three-way balance split.
//!
//! ```text
//! fee       = floor(balance * fee_rate)
//! remainder = balance - fee
//! primary   = ceil(remainder * share_ratio)
//! secondary = remainder - primary
//! ```
//!
//! The fee rate is a fixed-point integer in basis points. The share ratio
//! is the exact decimal the roster states, with at most 18 fractional
//! digits, so `remainder * share` fits a `u128` and floor and ceil are
//! exact. The three parts always sum to the balance. The organization
//! share (`secondary`) absorbs the rounding remainder.

use std::fmt;
use std::str::FromStr;

use payout_types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// The player's share of the post-fee remainder: an exact decimal in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShareRatio(Decimal);

impl ShareRatio {
    /// Most fractional digits a ratio may carry.
    pub const MAX_SCALE: u32 = 18;
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    pub fn from_decimal(ratio: Decimal) -> Result<Self, ConfigError> {
        let ratio = ratio.normalize();
        if (ratio.is_sign_negative() && !ratio.is_zero()) || ratio > Decimal::ONE {
            return Err(ConfigError::ShareRatio(ratio.to_string()));
        }
        if ratio.scale() > Self::MAX_SCALE {
            return Err(ConfigError::ShareRatio(format!(
                "{ratio} has more than {} decimal places",
                Self::MAX_SCALE
            )));
        }
        Ok(Self(ratio.abs()))
    }

    /// From the decimal a JSON number was written as.
    ///
    /// `f64` formatting yields the shortest string that reads back as the
    /// same float, which is the literal from the roster file.
    pub fn from_fraction(fraction: f64) -> Result<Self, ConfigError> {
        if !fraction.is_finite() {
            return Err(ConfigError::ShareRatio(fraction.to_string()));
        }
        let decimal = Decimal::from_str(&fraction.to_string())
            .map_err(|e| ConfigError::ShareRatio(format!("{fraction}: {e}")))?;
        Self::from_decimal(decimal)
    }

    pub fn from_ppm(ppm: u32) -> Result<Self, ConfigError> {
        Self::from_decimal(Decimal::new(i64::from(ppm), 6))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn percent(&self) -> Decimal {
        (self.0 * Decimal::ONE_HUNDRED).normalize()
    }

    /// `(numerator, denominator)` with `denominator = 10^scale`.
    fn parts(&self) -> (u128, u128) {
        (self.0.mantissa().unsigned_abs(), 10u128.pow(self.0.scale()))
    }
}

impl fmt::Display for ShareRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The service fee rate, in basis points of the whole balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeeRate(u32);

impl FeeRate {
    pub const SCALE: u32 = 10_000;
    /// 1%.
    pub const DEFAULT: Self = Self(100);

    pub fn from_bps(bps: u32) -> Result<Self, ConfigError> {
        if bps > Self::SCALE {
            return Err(ConfigError::FeeRate(bps));
        }
        Ok(Self(bps))
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where the fee goes and how large it is. Fixed for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeePolicy {
    pub address: Address,
    pub rate: FeeRate,
}

/// The three parts of one balance. Always sums to the source balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub primary: u64,
    pub secondary: u64,
    pub fee: u64,
}

impl SplitResult {
    pub fn total(&self) -> u64 {
        self.primary + self.secondary + self.fee
    }
}

/// Split `balance` between player, organization and fee.
pub fn split(balance: u64, share: ShareRatio, fee_rate: FeeRate) -> SplitResult {
    let balance_wide = u128::from(balance);
    let fee = balance_wide * u128::from(fee_rate.0) / u128::from(FeeRate::SCALE);
    let remainder = balance_wide - fee;
    let (numerator, denominator) = share.parts();
    let primary = (remainder * numerator).div_ceil(denominator);
    let secondary = remainder - primary;

    // Each part is bounded by `balance`, so the narrowing casts are lossless.
    SplitResult {
        primary: primary as u64,
        secondary: secondary as u64,
        fee: fee as u64,
    }
}
