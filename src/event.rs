//! Liability events derived from vouchers.
//!
//! Events reference their voucher and transaction lines by index into the
//! run's voucher vector, so the event set carries no cycles and can be
//! inspected or serialized independently of the vouchers.

use crate::amount::Amount;

/// Recognition of a new (or negated) liability without same-voucher
/// settlement through the bank.
#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    /// Index of the originating voucher.
    pub voucher: usize,

    /// Line index of the accounts-payable transaction.
    pub transaction: usize,

    /// Signed accounts-payable amount. Negative for a normal invoice,
    /// positive for a received credit note.
    pub ap_amount: Amount,

    /// True when the line is a debit (a credit note was received).
    pub is_credit_note: bool,

    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
}

/// Settlement of a liability through the bank account in the same voucher.
#[derive(Debug, Clone)]
pub struct ClearingEvent {
    pub voucher: usize,

    /// Line index of the accounts-payable transaction.
    pub ap_transaction: usize,

    /// Line index of the paired bank transaction.
    pub bank_transaction: usize,

    pub ap_amount: Amount,
    pub bank_amount: Amount,

    /// False when no bank line had the matching absolute amount and the
    /// smallest-index line was taken instead; such cases need review.
    pub exact_bank_pair: bool,

    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
}

/// A voucher whose description declares it corrects an earlier one.
///
/// Within the target year correction pairs are excluded from matching
/// wholesale; from the carry-over year a correction may settle a
/// previous-year receipt.
#[derive(Debug, Clone)]
pub struct CorrectionEvent {
    pub voucher: usize,

    /// Voucher id named after the correction token, e.g. `A532`.
    pub corrects: Option<String>,

    /// Signed sum over the voucher's accounts-payable lines.
    pub ap_total: Amount,

    pub supplier: Option<String>,
}

/// The classifier's reading of one aspect of a voucher.
#[derive(Debug, Clone)]
pub enum Event {
    Receipt(ReceiptEvent),
    Clearing(ClearingEvent),
    Correction(CorrectionEvent),
    /// Voucher withheld from matching entirely: its accounts-payable
    /// lines cancel out and nothing moved through the bank.
    Excluded { voucher: usize },
}

impl Event {
    /// Index of the voucher this event was derived from.
    pub fn voucher(&self) -> usize {
        match self {
            Event::Receipt(e) => e.voucher,
            Event::Clearing(e) => e.voucher,
            Event::Correction(e) => e.voucher,
            Event::Excluded { voucher } => *voucher,
        }
    }
}
