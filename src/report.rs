//! CSV rendering of reconciliation results.
//!
//! Three reports, mirroring what the bookkeeping review works from: the
//! combined case report (one row per case, review flag first), an
//! exceptions report (non-OK rows only), and the per-year summary.
//! Amounts are written with a decimal comma for Swedish spreadsheets.
//! The enrichment columns (invoice number, invoice date, total amount,
//! source filename) stay empty here for downstream collaborators to fill
//! in; the one exception is an orphan-clearing row, whose invoice number
//! is read from the clearing voucher itself.

use crate::amount::Amount;
use crate::case::{Counterparty, InvoiceCase, RunReport, RunSummary};
use crate::config::Config;
use crate::error::Result;
use crate::voucher::Voucher;
use log::info;
use std::io::Write;

/// Writes the combined case report: every case, review flag first.
pub fn write_combined<W: Write>(
    writer: W,
    report: &RunReport,
    vouchers: &[Voucher],
    config: &Config,
    currency: &str,
) -> Result<()> {
    write_cases(writer, &report.cases, vouchers, config, currency)
}

/// Writes the exceptions report: only rows that need human review.
pub fn write_exceptions<W: Write>(
    writer: W,
    report: &RunReport,
    vouchers: &[Voucher],
    config: &Config,
    currency: &str,
) -> Result<()> {
    let exceptions: Vec<InvoiceCase> = report
        .cases
        .iter()
        .filter(|c| c.needs_review())
        .cloned()
        .collect();
    info!("Exceptions report: {} of {} cases", exceptions.len(), report.cases.len());
    write_cases(writer, &exceptions, vouchers, config, currency)
}

fn write_cases<W: Write>(
    writer: W,
    cases: &[InvoiceCase],
    vouchers: &[Voucher],
    config: &Config,
    currency: &str,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "Behöver granskas".to_string(),
        "Receipt Voucher Id".to_string(),
        "Receipt Voucher Date".to_string(),
        format!("Receipt {} Amount", config.ap_account),
        "SIE Supplier".to_string(),
        "SIE Text".to_string(),
        "Clearing Voucher Id".to_string(),
        "Clearing Voucher Date".to_string(),
        format!("Clearing {} Amount", config.ap_account),
        format!("Clearing {} Amount", config.bank_account),
        "Invoice No".to_string(),
        "Invoice Date".to_string(),
        "Total Amount".to_string(),
        "Currency".to_string(),
        "Source File".to_string(),
        "Status".to_string(),
        "Match Confidence".to_string(),
        "Comment".to_string(),
    ])?;

    for case in cases {
        let review = if case.needs_review() { "JA" } else { "NEJ" };

        let (receipt_id, receipt_date, receipt_amount, supplier, text) = match &case.receipt {
            Some(receipt) => {
                let voucher = &vouchers[receipt.voucher];
                (
                    voucher.id(),
                    voucher.date.format("%Y-%m-%d").to_string(),
                    swedish(receipt.ap_amount),
                    receipt.supplier.clone().unwrap_or_default(),
                    voucher.description.clone(),
                )
            }
            // Orphan clearing: supplier comes from the clearing voucher.
            None => {
                let supplier = case
                    .counterparty
                    .as_ref()
                    .and_then(Counterparty::as_clearing)
                    .and_then(|c| c.supplier.clone())
                    .unwrap_or_default();
                (String::new(), String::new(), String::new(), supplier, String::new())
            }
        };

        let (clearing_id, clearing_date, clearing_ap, clearing_bank) = match &case.counterparty {
            Some(Counterparty::Clearing(clearing)) => {
                let voucher = &vouchers[clearing.voucher];
                (
                    voucher.id(),
                    voucher.date.format("%Y-%m-%d").to_string(),
                    swedish(clearing.ap_amount),
                    swedish(clearing.bank_amount),
                )
            }
            Some(Counterparty::Correction(correction)) => {
                let voucher = &vouchers[correction.voucher];
                (
                    voucher.id(),
                    voucher.date.format("%Y-%m-%d").to_string(),
                    swedish(correction.ap_total),
                    String::new(),
                )
            }
            None => (String::new(), String::new(), String::new(), String::new()),
        };

        // Enrichment placeholder; only an orphan-clearing row fills it,
        // from the clearing voucher.
        let invoice_no = match &case.receipt {
            Some(_) => String::new(),
            None => case
                .counterparty
                .as_ref()
                .and_then(Counterparty::as_clearing)
                .and_then(|c| c.invoice_number.clone())
                .unwrap_or_default(),
        };

        csv_writer.write_record([
            review.to_string(),
            receipt_id,
            receipt_date,
            receipt_amount,
            supplier,
            text,
            clearing_id,
            clearing_date,
            clearing_ap,
            clearing_bank,
            invoice_no,
            String::new(),
            String::new(),
            currency.to_string(),
            String::new(),
            case.status.to_string(),
            case.confidence.to_string(),
            case.comment.clone(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the per-year summary: bookkeeping totals and status counts.
pub fn write_summary<W: Write>(writer: W, summary: &RunSummary, config: &Config) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["Category", "Count", "Amount (SEK)"])?;

    let section = |label: &str| [label.to_string(), String::new(), String::new()];
    let amount_row =
        |label: &str, amount: Amount| [label.to_string(), String::new(), swedish(amount)];
    let count_row = |label: &str, count: usize| {
        [label.to_string(), count.to_string(), String::new()]
    };

    csv_writer.write_record(section(&format!(
        "Account {} - Bookkeeping Totals {}",
        config.ap_account, summary.target_year
    )))?;
    csv_writer.write_record(amount_row("Opening Balance (Ing. saldo)", summary.opening_balance))?;
    csv_writer.write_record(amount_row("Total Kredit (Receipts)", summary.kredit_sum))?;
    csv_writer.write_record(amount_row("Total Debet (Clearings)", summary.debet_sum))?;
    csv_writer.write_record(amount_row("Period Change", summary.period_change))?;
    csv_writer.write_record(amount_row("Closing Balance (Utg. saldo)", summary.closing_balance))?;
    csv_writer.write_record(section(""))?;
    csv_writer.write_record(section("Validation Summary"))?;
    csv_writer.write_record(count_row("Total Invoice Cases", summary.total_cases))?;
    csv_writer.write_record(count_row("  - Paid (OK)", summary.ok_count))?;
    csv_writer.write_record(count_row(
        "  - Unpaid (Missing clearing)",
        summary.missing_clearing_count,
    ))?;
    csv_writer.write_record(count_row(
        "  - Payments without receipt",
        summary.missing_receipt_count,
    ))?;
    csv_writer.write_record(count_row("  - Needs Review", summary.needs_review_count))?;
    csv_writer.write_record(count_row("  - Ambiguous", summary.ambiguous_count))?;

    csv_writer.flush()?;
    Ok(())
}

/// Formats an amount with the Swedish decimal comma.
fn swedish(amount: Amount) -> String {
    amount.to_string().replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Reconciler;
    use crate::voucher::Transaction;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn voucher(series: &str, number: u32, ymd: (i32, u32, u32), desc: &str, lines: &[(&str, &str)]) -> Voucher {
        Voucher {
            series: series.to_string(),
            number,
            date: NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap(),
            registration_date: None,
            description: desc.to_string(),
            transactions: lines
                .iter()
                .map(|(account, amount)| Transaction {
                    account: account.to_string(),
                    amount: Amount::from_str(amount).unwrap(),
                    date: None,
                    description: String::new(),
                })
                .collect(),
        }
    }

    fn sample() -> (Vec<Voucher>, RunReport, Config) {
        let vouchers = vec![
            voucher(
                "A",
                129,
                (2025, 3, 8),
                "Leverantörsfaktura - Mottagen - Elektroskandia - 31641715",
                &[("2440", "-163.00"), ("4010", "163.00")],
            ),
            voucher(
                "A",
                137,
                (2025, 3, 11),
                "Leverantörsfaktura - Betalat - Elektroskandia - 31641715",
                &[("2440", "163.00"), ("1930", "-163.00")],
            ),
            voucher(
                "A",
                358,
                (2025, 9, 1),
                "Leverantörsfaktura - Betalat - Ahlsell - 7466687907",
                &[("2440", "330.00"), ("1930", "-330.00")],
            ),
        ];
        let config = Config::for_year(2025);
        let report = Reconciler::new(config.clone()).reconcile(&vouchers, Amount::ZERO);
        (vouchers, report, config)
    }

    #[test]
    fn test_combined_report_rows() {
        let (vouchers, report, config) = sample();
        let mut out = Vec::new();
        write_combined(&mut out, &report, &vouchers, &config, "SEK").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Behöver granskas,Receipt Voucher Id"));
        assert!(lines[0].contains("Receipt 2440 Amount"));
        assert!(lines[0].contains("Clearing 1930 Amount"));
        // Matched case: decimal comma forces quoting of the amount fields,
        // and Invoice No stays an empty placeholder.
        assert_eq!(
            lines[1],
            "NEJ,A129,2025-03-08,\"-163,00\",Elektroskandia,\
             Leverantörsfaktura - Mottagen - Elektroskandia - 31641715,\
             A137,2025-03-11,\"163,00\",\"-163,00\",,,,SEK,,\
             OK,100,Clearing found 3 days after receipt"
        );
        // Orphan clearing: review flag set, supplier and invoice number
        // from the clearing voucher.
        assert_eq!(
            lines[2],
            "JA,,,,Ahlsell,,A358,2025-09-01,\"330,00\",\"-330,00\",\
             7466687907,,,SEK,,Missing receipt,0,\
             No receipt found for this clearing"
        );
    }

    #[test]
    fn test_exceptions_report_filters_ok_rows() {
        let (vouchers, report, config) = sample();
        let mut out = Vec::new();
        write_exceptions(&mut out, &report, &vouchers, &config, "SEK").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 2); // header + one exception
        assert!(!text.contains("A129"));
        assert!(text.contains("A358"));
    }

    #[test]
    fn test_summary_report() {
        let (_, report, config) = sample();
        let mut out = Vec::new();
        write_summary(&mut out, &report.summary, &config).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Account 2440 - Bookkeeping Totals 2025"));
        assert!(text.contains("Total Kredit (Receipts),,\"163,00\""));
        assert!(text.contains("Total Debet (Clearings),,\"493,00\""));
        assert!(text.contains("Period Change,,\"-330,00\""));
        assert!(text.contains("Total Invoice Cases,2,"));
        assert!(text.contains("  - Paid (OK),1,"));
        assert!(text.contains("  - Payments without receipt,1,"));
    }

    #[test]
    fn test_deterministic_output() {
        let (vouchers, report, config) = sample();
        let mut first = Vec::new();
        write_combined(&mut first, &report, &vouchers, &config, "SEK").unwrap();

        let report_again =
            Reconciler::new(config.clone()).reconcile(&vouchers, Amount::ZERO);
        let mut second = Vec::new();
        write_combined(&mut second, &report_again, &vouchers, &config, "SEK").unwrap();

        assert_eq!(first, second);
    }
}
