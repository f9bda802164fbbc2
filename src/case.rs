//! Reconciliation outcomes: one case per liability event, plus the
//! per-year run summary.

use crate::amount::Amount;
use crate::event::{ClearingEvent, CorrectionEvent, ReceiptEvent};
use crate::voucher::Voucher;
use serde::Serialize;
use std::fmt;

/// Outcome classification of one case row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    /// Receipt and counterparty found and consistent.
    Ok,
    /// A receipt with no clearing inside the window.
    MissingClearing,
    /// A clearing no receipt claims.
    MissingReceipt,
    /// Matched, but on evidence a human should confirm.
    NeedsReview,
    /// Matched deterministically among equally ranked candidates.
    Ambiguous,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Ok => "OK",
            CaseStatus::MissingClearing => "Missing clearing",
            CaseStatus::MissingReceipt => "Missing receipt",
            CaseStatus::NeedsReview => "Needs review",
            CaseStatus::Ambiguous => "Ambiguous",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What settled (or should have settled) a receipt.
#[derive(Debug, Clone)]
pub enum Counterparty {
    Clearing(ClearingEvent),
    Correction(CorrectionEvent),
}

impl Counterparty {
    /// Index of the counterparty voucher.
    pub fn voucher(&self) -> usize {
        match self {
            Counterparty::Clearing(c) => c.voucher,
            Counterparty::Correction(c) => c.voucher,
        }
    }

    pub fn as_clearing(&self) -> Option<&ClearingEvent> {
        match self {
            Counterparty::Clearing(c) => Some(c),
            Counterparty::Correction(_) => None,
        }
    }
}

/// One row of the final report.
///
/// At least one of `receipt` and `counterparty` is always present; both
/// present means a successful match.
#[derive(Debug, Clone)]
pub struct InvoiceCase {
    pub receipt: Option<ReceiptEvent>,
    pub counterparty: Option<Counterparty>,
    pub status: CaseStatus,

    /// Match confidence, 0-100.
    pub confidence: u8,

    pub comment: String,
}

impl InvoiceCase {
    /// True when the row should carry the `JA` review flag.
    pub fn needs_review(&self) -> bool {
        self.status != CaseStatus::Ok
    }

    /// Whole days between receipt and counterparty voucher dates.
    pub fn days_to_clearing(&self, vouchers: &[Voucher]) -> Option<i64> {
        let receipt = self.receipt.as_ref()?;
        let counterparty = self.counterparty.as_ref()?;
        Some(
            vouchers[counterparty.voucher()]
                .date
                .signed_duration_since(vouchers[receipt.voucher].date)
                .num_days(),
        )
    }
}

/// Per-year balance and status totals.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target_year: i32,

    /// Supplied by the caller, typically the prior year's closing balance.
    pub opening_balance: Amount,

    /// Sum of absolute amounts over credit AP lines (liability growth).
    pub kredit_sum: Amount,

    /// Sum of absolute amounts over debit AP lines (liability reduction).
    pub debet_sum: Amount,

    /// `kredit_sum - debet_sum`; positive means the liability grew.
    pub period_change: Amount,

    /// `opening_balance + period_change`.
    pub closing_balance: Amount,

    pub total_cases: usize,
    pub ok_count: usize,
    pub missing_clearing_count: usize,
    pub missing_receipt_count: usize,
    pub needs_review_count: usize,
    pub ambiguous_count: usize,
}

/// Everything a reconciliation run produces.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub cases: Vec<InvoiceCase>,
    pub summary: RunSummary,
}
