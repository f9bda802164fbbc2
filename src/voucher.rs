//! Voucher and transaction models.
//!
//! A voucher is the atom of double-entry bookkeeping: a dated, balanced
//! group of transaction lines identified by series + number. Descriptions
//! of supplier-invoice vouchers follow a ` - `-delimited convention from
//! which supplier name and invoice number can be recovered.

use crate::amount::Amount;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

/// One posting line within a voucher.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Account code, e.g. "2440".
    pub account: String,

    /// Signed amount: positive = debit, negative = credit. Zero is legal.
    pub amount: Amount,

    /// Per-line date; inherits the voucher date when absent.
    pub date: Option<NaiveDate>,

    /// Per-line free text; usually empty.
    pub description: String,
}

/// A balanced group of transactions with a single identifier and date.
#[derive(Debug, Clone)]
pub struct Voucher {
    /// Series letter(s), e.g. "A".
    pub series: String,

    /// Sequential number within the series. Numbers reset between fiscal
    /// years, so `series + number` is only unique within one year.
    pub number: u32,

    /// Transaction date.
    pub date: NaiveDate,

    /// Registration date, when the file carries one.
    pub registration_date: Option<NaiveDate>,

    /// Free text, possibly ` - `-delimited into structured fields.
    pub description: String,

    /// Ordered posting lines.
    pub transactions: Vec<Transaction>,
}

/// First description field of a normal supplier invoice.
const INVOICE_PREFIX: &str = "Leverantörsfaktura";

/// First description field of a supplier credit note.
const CREDIT_NOTE_PREFIX: &str = "Leverantörskreditfaktura";

/// Recognized second fields of the standardized description format.
const STAGE_TOKENS: [&str; 3] = ["Mottagen", "Betalat", "MottagenBetalat"];

impl Voucher {
    /// Returns the presentation identifier, e.g. `A129`.
    pub fn id(&self) -> String {
        format!("{}{}", self.series, self.number)
    }

    /// Calendar year of the transaction date.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Sort key for deterministic output: series lexicographic, then
    /// number numeric.
    pub fn order_key(&self) -> (&str, u32) {
        (self.series.as_str(), self.number)
    }

    /// Returns all transactions on `account` with their line indices.
    pub fn transactions_for(&self, account: &str) -> Vec<(usize, &Transaction)> {
        self.transactions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.account == account)
            .collect()
    }

    /// Checks whether any line touches `account`.
    pub fn has_account(&self, account: &str) -> bool {
        self.transactions.iter().any(|t| t.account == account)
    }

    /// Sums the signed amounts on `account`.
    pub fn total_for(&self, account: &str) -> Amount {
        self.transactions
            .iter()
            .filter(|t| t.account == account)
            .fold(Amount::ZERO, |acc, t| acc + t.amount)
    }

    /// Checks the double-entry invariant: all lines sum to zero within
    /// `tolerance`.
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.transactions
            .iter()
            .fold(Amount::ZERO, |acc, t| acc + t.amount)
            .approx_zero(tolerance)
    }

    /// Splits the description on the literal ` - ` delimiter.
    pub fn description_fields(&self) -> Vec<&str> {
        self.description.split(" - ").map(str::trim).collect()
    }

    /// Extracts the supplier name from a standardized description.
    ///
    /// Recognized shapes:
    ///
    /// ```text
    /// Leverantörsfaktura - Mottagen - <Supplier> - <Invoice#>
    /// Leverantörsfaktura - Betalat - <Supplier> - <Invoice#> (<note>)
    /// Leverantörskreditfaktura - MottagenBetalat - <Supplier> - <Invoice#>
    /// ```
    ///
    /// Returns `None` for anything else; the extraction never guesses.
    pub fn supplier(&self) -> Option<String> {
        let fields = self.description_fields();
        if !is_standardized(&fields) || fields.len() < 3 {
            return None;
        }
        let supplier = fields[2];
        if supplier.is_empty() {
            None
        } else {
            Some(supplier.to_string())
        }
    }

    /// Extracts the invoice number: the digits-only prefix of the fourth
    /// description field, ignoring any trailing parenthesized note.
    pub fn invoice_number(&self) -> Option<String> {
        let fields = self.description_fields();
        if !is_standardized(&fields) || fields.len() < 4 {
            return None;
        }
        let digits: String = fields[3]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            None
        } else {
            Some(digits)
        }
    }
}

/// True when the first two fields follow the supplier-invoice convention.
fn is_standardized(fields: &[&str]) -> bool {
    fields.len() >= 2
        && (fields[0] == INVOICE_PREFIX || fields[0] == CREDIT_NOTE_PREFIX)
        && STAGE_TOKENS.contains(&fields[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tol() -> Decimal {
        Decimal::new(5, 3)
    }

    fn voucher_with_description(description: &str) -> Voucher {
        Voucher {
            series: "A".to_string(),
            number: 129,
            date: date(2025, 3, 8),
            registration_date: None,
            description: description.to_string(),
            transactions: Vec::new(),
        }
    }

    fn trans(account: &str, amount: &str) -> Transaction {
        Transaction {
            account: account.to_string(),
            amount: Amount::from_str(amount).unwrap(),
            date: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_id_concatenates_series_and_number() {
        let v = voucher_with_description("Hyra");
        assert_eq!(v.id(), "A129");
    }

    #[test]
    fn test_account_helpers() {
        let mut v = voucher_with_description("x");
        v.transactions = vec![
            trans("2440", "-163.00"),
            trans("2641", "32.60"),
            trans("4010", "130.40"),
        ];

        assert!(v.has_account("2440"));
        assert!(!v.has_account("1930"));
        assert_eq!(v.transactions_for("2440").len(), 1);
        assert_eq!(v.transactions_for("2440")[0].0, 0);
        assert_eq!(v.total_for("2440").to_string(), "-163.00");
        assert!(v.is_balanced(tol()));
    }

    #[test]
    fn test_unbalanced_detection() {
        let mut v = voucher_with_description("x");
        v.transactions = vec![trans("2440", "-163.00"), trans("4010", "163.50")];
        assert!(!v.is_balanced(tol()));
    }

    #[test]
    fn test_supplier_and_invoice_from_standard_description() {
        let v = voucher_with_description(
            "Leverantörsfaktura - Mottagen - Elektroskandia - 31641715",
        );
        assert_eq!(v.supplier().as_deref(), Some("Elektroskandia"));
        assert_eq!(v.invoice_number().as_deref(), Some("31641715"));
    }

    #[test]
    fn test_invoice_number_strips_parenthesized_note() {
        let v = voucher_with_description(
            "Leverantörsfaktura - Betalat - Nibe - 4962010809 (korrigerad med verifikation A532)",
        );
        assert_eq!(v.invoice_number().as_deref(), Some("4962010809"));
    }

    #[test]
    fn test_credit_note_prefix_recognized() {
        let v = voucher_with_description(
            "Leverantörskreditfaktura - Mottagen - Ahlsell - 7466687907",
        );
        assert_eq!(v.supplier().as_deref(), Some("Ahlsell"));
        assert_eq!(v.invoice_number().as_deref(), Some("7466687907"));
    }

    #[test]
    fn test_combined_stage_token() {
        let v = voucher_with_description(
            "Leverantörsfaktura - MottagenBetalat - Bauhaus - 12345678",
        );
        assert_eq!(v.supplier().as_deref(), Some("Bauhaus"));
        assert_eq!(v.invoice_number().as_deref(), Some("12345678"));
    }

    #[test]
    fn test_unrecognized_description_yields_nothing() {
        let v = voucher_with_description("Hyra januari");
        assert_eq!(v.supplier(), None);
        assert_eq!(v.invoice_number(), None);

        // Wrong first token: no guessing, even though digits are present.
        let v = voucher_with_description("Faktura - Mottagen - Elektroskandia - 31641715");
        assert_eq!(v.supplier(), None);
        assert_eq!(v.invoice_number(), None);
    }

    #[test]
    fn test_empty_supplier_field_is_none() {
        let v = voucher_with_description("Leverantörsfaktura - Betalat -  - 31641715");
        assert_eq!(v.supplier(), None);
        assert_eq!(v.invoice_number().as_deref(), Some("31641715"));
    }

    #[test]
    fn test_missing_fields_yield_nothing() {
        let v = voucher_with_description("Leverantörsfaktura - Mottagen - Elektroskandia");
        assert_eq!(v.supplier().as_deref(), Some("Elektroskandia"));
        assert_eq!(v.invoice_number(), None);
    }
}
