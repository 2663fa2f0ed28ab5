//! # Tax Module
//!
//! Tax rates and the fixed tax-type table used by invoice line items.
//!
//! ## Rate Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Invoice item                         Quote item                       │
//! │  ────────────                         ──────────                       │
//! │  1. recognized taxType label?         1. explicit taxRate?             │
//! │     IVA_18 → 0.18                     2. default rate                  │
//! │     IVA_10 → 0.10                                                       │
//! │     EXEMPT → 0.00                                                       │
//! │  2. explicit taxRate?                                                   │
//! │  3. default rate                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate as a fraction (0.18 = 18%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(#[ts(type = "string")] Decimal);

impl TaxRate {
    /// Creates a tax rate from a fraction.
    #[inline]
    pub const fn new(fraction: Decimal) -> Self {
        TaxRate(fraction)
    }

    /// Returns the rate as a fraction.
    #[inline]
    pub const fn fraction(&self) -> Decimal {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(Decimal::ZERO)
    }

    /// The 18% rate used when no document-level rate is supplied.
    #[inline]
    pub const fn standard() -> Self {
        TaxRate(Decimal::from_parts(18, 0, 0, false, 2))
    }

    /// Checks if tax rate is negative (never valid on input).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::standard()
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tax Type
// =============================================================================

/// Named tax categories with fixed rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum TaxType {
    #[serde(rename = "IVA_18")]
    Iva18,
    #[serde(rename = "IVA_10")]
    Iva10,
    #[serde(rename = "EXEMPT")]
    Exempt,
}

impl TaxType {
    /// Looks up a label; unknown labels are not an error, they just don't apply.
    pub fn from_label(label: &str) -> Option<TaxType> {
        match label.trim() {
            "IVA_18" => Some(TaxType::Iva18),
            "IVA_10" => Some(TaxType::Iva10),
            "EXEMPT" => Some(TaxType::Exempt),
            _ => None,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            TaxType::Iva18 => "IVA_18",
            TaxType::Iva10 => "IVA_10",
            TaxType::Exempt => "EXEMPT",
        }
    }

    /// Fixed rate for this category.
    pub const fn rate(&self) -> TaxRate {
        match self {
            TaxType::Iva18 => TaxRate::new(Decimal::from_parts(18, 0, 0, false, 2)),
            TaxType::Iva10 => TaxRate::new(Decimal::from_parts(10, 0, 0, false, 2)),
            TaxType::Exempt => TaxRate::zero(),
        }
    }
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
