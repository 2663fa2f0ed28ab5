//! # Document Status Machines
//!
//! Transition tables for invoices and quotes.
//!
//! ## Invoice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   DRAFT ──► SENT ──► OVERDUE                                            │
//! │     │        │  ╲       │                                               │
//! │     │        │   ╲      │                                               │
//! │     │        ▼    ▼     ▼                                               │
//! │     │      PAID ◄───────┘          PAID ──► REFUNDED (terminal)         │
//! │     │                                                                   │
//! │     └──────► CANCELLED (terminal) ◄── SENT, OVERDUE                     │
//! │                                                                         │
//! │  Same status → no-op success. Anything else → InvalidTransition.       │
//! │                                                                         │
//! │  Payment completion (separate, narrower rule):                          │
//! │    DRAFT | SENT | OVERDUE ──(due reaches 0)──► PAID                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quote
//! ```text
//! DRAFT ──► SENT ──► ACCEPTED (terminal)
//!   │        │  ╲
//!   │        │   ► EXPIRED ──► SENT
//!   ▼        ▼
//! REJECTED (terminal)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Shared Machinery
// =============================================================================

/// Outcome of a validated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// Requested status equals the current one; nothing to write.
    Unchanged,
    /// Status moves `from` → `to`.
    Changed { from: S, to: S },
}

impl<S> Transition<S> {
    pub fn is_change(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}

/// A status enumeration governed by a fixed transition table.
pub trait DocumentStatus: Copy + Eq + fmt::Display + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Statuses reachable in one step (excluding self).
    fn allowed_targets(&self) -> &'static [Self];

    /// True when no further transitions are possible.
    fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// True for a same-status request or a listed target.
    fn can_transition_to(&self, to: Self) -> bool {
        *self == to || self.allowed_targets().contains(&to)
    }

    /// Validates `self → to` against the table.
    fn transition_to(self, to: Self) -> CoreResult<Transition<Self>> {
        if self == to {
            return Ok(Transition::Unchanged);
        }
        if self.allowed_targets().contains(&to) {
            Ok(Transition::Changed { from: self, to })
        } else {
            Err(CoreError::invalid_transition(
                Self::ENTITY,
                self.to_string(),
                to.to_string(),
            ))
        }
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// The status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Being prepared; not yet sent to the client.
    #[default]
    Draft,
    /// Delivered to the client, awaiting payment.
    Sent,
    /// Fully paid.
    Paid,
    /// Past its due date while unpaid.
    Overdue,
    /// Withdrawn before payment.
    Cancelled,
    /// Paid and then refunded.
    Refunded,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 6] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
        InvoiceStatus::Refunded,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
            InvoiceStatus::Refunded => "REFUNDED",
        }
    }

    /// Payment-completion rule: an invoice whose due amount hits zero moves
    /// to PAID from an open status, independent of the regular transition
    /// table. Payments are recorded in every status; closed invoices just
    /// keep theirs.
    pub const fn can_complete_by_payment(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Overdue
        )
    }

    /// Whether entering this status stamps `paid_at`.
    pub const fn stamps_paid_at(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

impl DocumentStatus for InvoiceStatus {
    const ENTITY: &'static str = "Invoice";

    fn allowed_targets(&self) -> &'static [Self] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Paid, Overdue, Cancelled],
            Overdue => &[Paid, Cancelled],
            Paid => &[Refunded],
            Cancelled | Refunded => &[],
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown invoice status '{}'", s),
            })
    }
}

// =============================================================================
// Quote Status
// =============================================================================

/// The status of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    /// Client agreed; eligible for conversion into an invoice.
    Accepted,
    Rejected,
    /// Validity window passed without an answer.
    Expired,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 5] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Expired => "EXPIRED",
        }
    }

    /// Whether entering this status stamps `accepted_at`.
    pub const fn stamps_accepted_at(&self) -> bool {
        matches!(self, QuoteStatus::Accepted)
    }
}

impl DocumentStatus for QuoteStatus {
    const ENTITY: &'static str = "Quote";

    fn allowed_targets(&self) -> &'static [Self] {
        use QuoteStatus::*;
        match self {
            Draft => &[Sent, Rejected],
            Sent => &[Accepted, Rejected, Expired],
            Expired => &[Sent],
            Accepted | Rejected => &[],
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuoteStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown quote status '{}'", s),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_draft_to_sent() {
        let t = InvoiceStatus::Draft
            .transition_to(InvoiceStatus::Sent)
            .unwrap();
        assert_eq!(
            t,
            Transition::Changed {
                from: InvoiceStatus::Draft,
                to: InvoiceStatus::Sent
            }
        );
    }

    #[test]
    fn test_paid_to_draft_rejected() {
        let err = InvoiceStatus::Paid
            .transition_to(InvoiceStatus::Draft)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(err.to_string(), "Invoice cannot transition from PAID to DRAFT");
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in InvoiceStatus::ALL {
            assert_eq!(status.transition_to(status).unwrap(), Transition::Unchanged);
        }
        for status in QuoteStatus::ALL {
            assert_eq!(status.transition_to(status).unwrap(), Transition::Unchanged);
        }
    }

    #[test]
    fn test_full_invoice_table() {
        use InvoiceStatus::*;
        let allowed = [
            (Draft, Sent),
            (Draft, Cancelled),
            (Sent, Paid),
            (Sent, Overdue),
            (Sent, Cancelled),
            (Overdue, Paid),
            (Overdue, Cancelled),
            (Paid, Refunded),
        ];
        for from in InvoiceStatus::ALL {
            for to in InvoiceStatus::ALL {
                let expected = from == to || allowed.contains(&(from, to));
                assert_eq!(
                    from.transition_to(to).is_ok(),
                    expected,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(InvoiceStatus::Cancelled.is_terminal());
        assert!(InvoiceStatus::Refunded.is_terminal());
        assert!(!InvoiceStatus::Paid.is_terminal());
        assert!(QuoteStatus::Accepted.is_terminal());
        assert!(QuoteStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_payment_completion_rule() {
        assert!(InvoiceStatus::Sent.can_complete_by_payment());
        assert!(InvoiceStatus::Overdue.can_complete_by_payment());
        assert!(InvoiceStatus::Draft.can_complete_by_payment());
        assert!(!InvoiceStatus::Cancelled.can_complete_by_payment());
        assert!(!InvoiceStatus::Refunded.can_complete_by_payment());
        assert!(!InvoiceStatus::Paid.can_complete_by_payment());
        // DRAFT -> PAID is not in the regular table
        assert!(!InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Paid));
    }

    #[test]
    fn test_quote_transitions() {
        assert!(QuoteStatus::Sent.transition_to(QuoteStatus::Accepted).is_ok());
        assert!(QuoteStatus::Expired.transition_to(QuoteStatus::Sent).is_ok());
        assert!(QuoteStatus::Draft.transition_to(QuoteStatus::Accepted).is_err());
        assert!(QuoteStatus::Accepted.transition_to(QuoteStatus::Sent).is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("paid".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Paid);
        assert_eq!("ACCEPTED".parse::<QuoteStatus>().unwrap(), QuoteStatus::Accepted);
        assert!("archived".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_upper_case() {
        assert_eq!(
            serde_json::to_string(&InvoiceStatus::Overdue).unwrap(),
            "\"OVERDUE\""
        );
    }
}
