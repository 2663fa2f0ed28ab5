//! # Document Numbering
//!
//! Human-readable document numbers: `PREFIX-YYMM-NNNN`.
//!
//! ## Format
//! ```text
//! INV-2610-0042
//! │   │ │  │
//! │   │ │  └── running sequence within the month, zero-padded to 4 digits
//! │   │ └───── month (2 digits)
//! │   └─────── year (2 digits)
//! └─────────── INV (invoice) | QTE (quote)
//! ```
//!
//! External systems parse these, so the format is bit-exact. The sequence
//! itself comes from the store (an atomic per-month counter); this module only
//! formats and parses.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Which document family a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Quote,
}

impl DocumentKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Quote => "QTE",
        }
    }

    /// Key stored in the counter table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::Quote => "quote",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "INV" => Some(DocumentKind::Invoice),
            "QTE" => Some(DocumentKind::Quote),
            _ => None,
        }
    }
}

/// Returns the `YYMM` period a timestamp falls in. Counters reset per period.
pub fn period_key(at: DateTime<Utc>) -> String {
    format!("{:02}{:02}", at.year().rem_euclid(100), at.month())
}

/// A parsed document number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    /// Two-digit year.
    pub year: u32,
    pub month: u32,
    pub sequence: u32,
}

impl DocumentNumber {
    /// Builds the number for the `sequence`-th document of `kind` in the
    /// month containing `at`.
    pub fn new(kind: DocumentKind, at: DateTime<Utc>, sequence: u32) -> Self {
        DocumentNumber {
            kind,
            year: at.year().rem_euclid(100) as u32,
            month: at.month(),
            sequence,
        }
    }

    /// Parses `PREFIX-YYMM-NNNN`.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::numbering::{DocumentKind, DocumentNumber};
    ///
    /// let n = DocumentNumber::parse("QTE-2601-0007").unwrap();
    /// assert_eq!(n.kind, DocumentKind::Quote);
    /// assert_eq!(n.sequence, 7);
    /// assert!(DocumentNumber::parse("INV-26-0007").is_err());
    /// ```
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let invalid = || CoreError::InvalidDocumentNumber(raw.to_string());

        let mut parts = raw.split('-');
        let (prefix, period, seq) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(d), Some(s), None) => (p, d, s),
            _ => return Err(invalid()),
        };

        let kind = DocumentKind::from_prefix(prefix).ok_or_else(invalid)?;

        if period.len() != 4 || !period.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if seq.len() < 4 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: u32 = period[..2].parse().map_err(|_| invalid())?;
        let month: u32 = period[2..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let sequence: u32 = seq.parse().map_err(|_| invalid())?;

        Ok(DocumentNumber {
            kind,
            year,
            month,
            sequence,
        })
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}{:02}-{:04}",
            self.kind.prefix(),
            self.year,
            self.month,
            self.sequence
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn matches_format(s: &str) -> bool {
        let b = s.as_bytes();
        s.len() == 13
            && (s.starts_with("INV-") || s.starts_with("QTE-"))
            && b[4..8].iter().all(u8::is_ascii_digit)
            && b[8] == b'-'
            && b[9..13].iter().all(u8::is_ascii_digit)
    }

    #[test]
    fn test_format() {
        let n = DocumentNumber::new(DocumentKind::Invoice, at(2026, 10, 16), 1);
        assert_eq!(n.to_string(), "INV-2610-0001");

        let q = DocumentNumber::new(DocumentKind::Quote, at(2031, 2, 1), 123);
        assert_eq!(q.to_string(), "QTE-3102-0123");
    }

    #[test]
    fn test_format_shape_for_any_sequence_below_ten_thousand() {
        for seq in [1, 9, 10, 99, 100, 999, 1000, 9999] {
            for kind in [DocumentKind::Invoice, DocumentKind::Quote] {
                let s = DocumentNumber::new(kind, at(2026, 1, 5), seq).to_string();
                assert!(matches_format(&s), "{}", s);
            }
        }
    }

    #[test]
    fn test_overflowing_sequence_is_not_truncated() {
        let n = DocumentNumber::new(DocumentKind::Invoice, at(2026, 3, 1), 12345);
        assert_eq!(n.to_string(), "INV-2603-12345");
        assert_eq!(DocumentNumber::parse("INV-2603-12345").unwrap().sequence, 12345);
    }

    #[test]
    fn test_parse_round_trip() {
        let n = DocumentNumber::parse("INV-2610-0042").unwrap();
        assert_eq!(n.kind, DocumentKind::Invoice);
        assert_eq!((n.year, n.month, n.sequence), (26, 10, 42));
        assert_eq!(n.to_string(), "INV-2610-0042");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "INV",
            "ABC-2610-0001",
            "INV-2613-0001",
            "INV-261-0001",
            "INV-2610-001",
            "INV-2610-00a1",
            "INV-2610-0001-9",
        ] {
            assert!(DocumentNumber::parse(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_period_key() {
        assert_eq!(period_key(at(2026, 10, 16)), "2610");
        assert_eq!(period_key(at(2000, 1, 1)), "0001");
    }
}
