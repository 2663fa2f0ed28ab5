//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │    40 × 0.18 = 7.199999999999999    ❌ WRONG on an invoice!             │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 Decimal                                          │
//! │    40 × 0.18 = 7.20 exactly                                             │
//! │    No rounding step anywhere in the engine: what you sum is what       │
//! │    was computed, and total = subtotal + tax holds exactly.             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::money::Money;
//!
//! let price = Money::new(Decimal::new(1099, 2)); // 10.99
//! let doubled = price.checked_mul(Decimal::from(2)).unwrap(); // 21.98
//! let total = doubled.checked_add(Money::new(Decimal::new(500, 2))).unwrap();
//! assert_eq!(total.amount(), Decimal::new(2698, 2));
//! ```
//!
//! Arithmetic is checked: `Decimal` panics on overflow, so every operation
//! returns `None` past its 96-bit range and callers turn that into an error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::tax::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the document currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: negative values are legal intermediates (a credit
///   balance after items shrink below what was already paid)
/// - **Single field tuple struct**: zero-cost wrapper
/// - **Serde**: serialized as a decimal string, deserialized from a string or
///   a JSON number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Floors the value at zero.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    ///
    /// let over_discounted = Money::new(Decimal::from(-15));
    /// assert!(over_discounted.clamp_non_negative().is_zero());
    /// ```
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        if self.is_negative() {
            Money::zero()
        } else {
            self
        }
    }

    /// Tax owed on this amount at `rate`, unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use tally_core::money::Money;
    /// use tally_core::tax::TaxRate;
    ///
    /// let net = Money::new(Decimal::from(40));
    /// let tax = net.checked_tax_at(TaxRate::new(Decimal::new(18, 2))).unwrap();
    /// assert_eq!(tax.amount(), Decimal::new(72, 1)); // 7.2
    /// ```
    #[inline]
    pub fn checked_tax_at(&self, rate: TaxRate) -> Option<Money> {
        self.0.checked_mul(rate.fraction()).map(Money)
    }

    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiplication by a (possibly fractional) quantity.
    #[inline]
    pub fn checked_mul(self, qty: Decimal) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Subtraction that pins to the decimal range instead of overflowing.
    #[inline]
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Parses a stored decimal string.
    pub fn parse(field: &str, raw: &str) -> Result<Money, ValidationError> {
        Decimal::from_str(raw.trim())
            .map(Money)
            .map_err(|e| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: e.to_string(),
            })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering; currency formatting belongs to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
