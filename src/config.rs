//! Run configuration.
//!
//! All thresholds and account numbers live in one value that is threaded
//! through the decoder, classifier, and matcher. There are no ambient
//! globals; two runs with different configs cannot interfere.

use rust_decimal::Decimal;

/// Settings for one reconciliation run.
#[derive(Debug, Clone)]
pub struct Config {
    /// The fiscal year whose receipts are reconciled. Vouchers dated the
    /// following year act only as carry-over clearings and corrections.
    pub target_year: i32,

    /// Maximum receipt-to-clearing window in days.
    pub max_days: i64,

    /// Equality tolerance for balance checks and amount comparisons.
    pub amount_tolerance: Decimal,

    /// Accounts-payable account (Leverantörsskulder).
    pub ap_account: String,

    /// Corporate bank account (Företagskonto).
    pub bank_account: String,
}

impl Config {
    /// Creates a config for the given target year with the standard
    /// Swedish BAS account numbers and default thresholds.
    pub fn for_year(target_year: i32) -> Self {
        Config {
            target_year,
            max_days: 120,
            amount_tolerance: Decimal::new(5, 3), // half a minor unit
            ap_account: "2440".to_string(),
            bank_account: "1930".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::for_year(2024);
        assert_eq!(cfg.target_year, 2024);
        assert_eq!(cfg.max_days, 120);
        assert_eq!(cfg.ap_account, "2440");
        assert_eq!(cfg.bank_account, "1930");
        assert_eq!(cfg.amount_tolerance, Decimal::new(5, 3));
    }
}
