//! # Validation Module
//!
//! Input validation for line items, payments and client names.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  ├── Numbers coerced from JSON numbers or numeric strings              │
//! │  └── null item list → empty                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Line items: quantity > 0, prices/discounts/rates >= 0             │
//! │  └── Payments: amount > 0, method present                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE document numbers                                           │
//! │  ├── UNIQUE invoice per quote                                          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use tally_core::money::Money;
//! use tally_core::types::LineItemInput;
//! use tally_core::validation::validate_line_item;
//!
//! let item = LineItemInput::new("Design work", Decimal::from(3), Money::new(Decimal::from(80)));
//! validate_line_item(0, &item).unwrap();
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::LineItemInput;
use crate::MAX_LINE_DESCRIPTION;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Line Item Validators
// =============================================================================

/// Validates one raw line item at position `index`.
///
/// ## Rules
/// - `description` must not be blank and at most 500 characters
/// - `quantity` must be positive (> 0)
/// - `unitPrice`, `discount` and `taxRate` must not be negative
///
/// Field names carry the index (`items[1].quantity`) so a caller can point at
/// the offending row.
pub fn validate_line_item(index: usize, item: &LineItemInput) -> ValidationResult<()> {
    let field = |name: &str| format!("items[{}].{}", index, name);

    let description = item.description.trim();
    if description.is_empty() {
        return Err(ValidationError::Required {
            field: field("description"),
        });
    }
    if description.chars().count() > MAX_LINE_DESCRIPTION {
        return Err(ValidationError::TooLong {
            field: field("description"),
            max: MAX_LINE_DESCRIPTION,
        });
    }

    if item.quantity <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: field("quantity"),
        });
    }

    if item.unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field("unitPrice"),
        });
    }

    if item.discount.is_some_and(|d| d.is_negative()) {
        return Err(ValidationError::MustNotBeNegative {
            field: field("discount"),
        });
    }

    if item.tax_rate.is_some_and(|r| r.is_negative()) {
        return Err(ValidationError::MustNotBeNegative {
            field: field("taxRate"),
        });
    }

    Ok(())
}

// =============================================================================
// Payment Validators
// =============================================================================

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
///
/// ## Example
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::money::Money;
/// use tally_core::validation::validate_payment_amount;
///
/// assert!(validate_payment_amount(Money::new(Decimal::new(4720, 2))).is_ok());
/// assert!(validate_payment_amount(Money::zero()).is_err());
/// ```
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a payment method tag.
///
/// ## Rules
/// - Must not be empty
/// - Maximum 50 characters
///
/// ## Returns
/// The trimmed method string.
pub fn validate_payment_method(method: &str) -> ValidationResult<String> {
    let method = method.trim();

    if method.is_empty() {
        return Err(ValidationError::Required {
            field: "method".to_string(),
        });
    }

    if method.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "method".to_string(),
            max: 50,
        });
    }

    Ok(method.to_string())
}

// =============================================================================
// Name Validators
// =============================================================================

/// Validates a client name.
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
