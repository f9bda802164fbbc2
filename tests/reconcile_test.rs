//! End-to-end tests through the library: decode fixture SIE files,
//! reconcile, and check the resulting cases and reports.

use sie_reconcile::{report, sie, Amount, CaseStatus, Config, Counterparty, Reconciler, Voucher};
use std::path::Path;

fn load(files: &[&str], config: &Config) -> Vec<Voucher> {
    let mut vouchers = Vec::new();
    for file in files {
        let path = format!("tests/data/{file}");
        let parsed = sie::parse_file(Path::new(&path), config).unwrap();
        vouchers.extend(parsed.vouchers);
    }
    vouchers
}

fn id(vouchers: &[Voucher], index: usize) -> String {
    vouchers[index].id()
}

#[test]
fn test_perfect_match_fixture() {
    let config = Config::for_year(2025);
    let vouchers = load(&["perfect_match_2025.se"], &config);
    let report = Reconciler::new(config).reconcile(&vouchers, Amount::ZERO);

    assert_eq!(report.cases.len(), 1);
    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Ok);
    assert_eq!(case.confidence, 100);
    assert_eq!(case.comment, "Clearing found 3 days after receipt");

    let receipt = case.receipt.as_ref().unwrap();
    assert_eq!(id(&vouchers, receipt.voucher), "A129");
    assert_eq!(receipt.supplier.as_deref(), Some("Elektroskandia"));

    let clearing = match case.counterparty.as_ref().unwrap() {
        Counterparty::Clearing(c) => c,
        other => panic!("Expected clearing counterparty, got {other:?}"),
    };
    assert_eq!(id(&vouchers, clearing.voucher), "A137");
    assert_eq!(clearing.bank_amount.to_string(), "-163.00");
}

#[test]
fn test_header_metadata_decoded_from_cp437() {
    let config = Config::for_year(2025);
    let path = Path::new("tests/data/perfect_match_2025.se");
    let file = sie::parse_file(path, &config).unwrap();

    assert_eq!(file.header.company_name.as_deref(), Some("Testbolaget AB"));
    assert_eq!(file.header.currency.as_deref(), Some("SEK"));
    assert_eq!(
        file.header.account_names.get("2440").map(String::as_str),
        Some("Leverantörsskulder")
    );
    assert_eq!(
        file.header.account_names.get("1930").map(String::as_str),
        Some("Företagskonto")
    );
    assert_eq!(file.header.fiscal_years.len(), 1);
}

#[test]
fn test_mixed_year_cases_and_ordering() {
    let config = Config::for_year(2025);
    let vouchers = load(&["mixed_2025.se"], &config);
    let report = Reconciler::new(config).reconcile(&vouchers, Amount::ZERO);

    // A42+A66 matched, A83 same-voucher, A358 orphan; A111 self-cancels.
    assert_eq!(report.cases.len(), 3);

    let first = &report.cases[0];
    assert_eq!(id(&vouchers, first.receipt.as_ref().unwrap().voucher), "A42");
    assert_eq!(first.status, CaseStatus::Ok);
    assert_eq!(first.confidence, 75);
    assert!(first.comment.contains("supplier differs"));

    let second = &report.cases[1];
    assert_eq!(id(&vouchers, second.receipt.as_ref().unwrap().voucher), "A83");
    assert_eq!(second.status, CaseStatus::Ok);
    assert_eq!(second.comment, "Receipt and clearing in same voucher");

    let third = &report.cases[2];
    assert!(third.receipt.is_none());
    assert_eq!(third.status, CaseStatus::MissingReceipt);
    let clearing = match third.counterparty.as_ref().unwrap() {
        Counterparty::Clearing(c) => c,
        other => panic!("Expected clearing counterparty, got {other:?}"),
    };
    assert_eq!(id(&vouchers, clearing.voucher), "A358");
    assert_eq!(clearing.supplier.as_deref(), Some("Ahlsell"));

    // No event from the self-canceling voucher reaches any case.
    for case in &report.cases {
        if let Some(receipt) = &case.receipt {
            assert_ne!(id(&vouchers, receipt.voucher), "A111");
        }
        if let Some(counterparty) = &case.counterparty {
            assert_ne!(id(&vouchers, counterparty.voucher()), "A111");
        }
    }
}

#[test]
fn test_multi_year_run_with_id_collision() {
    let config = Config::for_year(2024);
    let vouchers = load(&["year_2024.se", "year_2025.se"], &config);
    let report = Reconciler::new(config).reconcile(&vouchers, Amount::ZERO);

    assert_eq!(report.cases.len(), 2);

    // A49 matches the 2024 A53 even though a 2025 A53 sits in a
    // correction pair: exclusion is scoped to the target year.
    let first = &report.cases[0];
    assert_eq!(id(&vouchers, first.receipt.as_ref().unwrap().voucher), "A49");
    assert_eq!(first.status, CaseStatus::Ok);
    assert_eq!(first.confidence, 100);
    let clearing_voucher = first.counterparty.as_ref().unwrap().voucher();
    assert_eq!(id(&vouchers, clearing_voucher), "A53");
    assert_eq!(vouchers[clearing_voucher].year(), 2024);

    // A143 has no clearing but the next-year correction A12 names it.
    let second = &report.cases[1];
    assert_eq!(id(&vouchers, second.receipt.as_ref().unwrap().voucher), "A143");
    assert_eq!(second.status, CaseStatus::Ok);
    assert_eq!(second.comment, "Cleared by cross-year correction");
    assert!(matches!(
        second.counterparty,
        Some(Counterparty::Correction(_))
    ));
}

#[test]
fn test_correction_pair_excluded_in_its_own_year() {
    let config = Config::for_year(2025);
    let vouchers = load(&["year_2024.se", "year_2025.se"], &config);
    let report = Reconciler::new(config).reconcile(&vouchers, Amount::ZERO);

    // A53/A60 (2025) form a correction pair and vanish; only the A12
    // credit-note receipt remains, unpaid.
    assert_eq!(report.cases.len(), 1);
    let case = &report.cases[0];
    assert_eq!(id(&vouchers, case.receipt.as_ref().unwrap().voucher), "A12");
    assert_eq!(case.status, CaseStatus::MissingClearing);
    assert!(case.comment.contains("credit note"));

    for case in &report.cases {
        if let Some(receipt) = &case.receipt {
            let voucher = &vouchers[receipt.voucher];
            assert!(!(voucher.id() == "A53" && voucher.year() == 2025));
            assert_ne!(voucher.id(), "A60");
        }
    }
}

#[test]
fn test_balance_closure_over_fixture() {
    let config = Config::for_year(2024);
    let vouchers = load(&["year_2024.se"], &config);
    let opening = Amount::ZERO;
    let report = Reconciler::new(config).reconcile(&vouchers, opening);

    let s = &report.summary;
    assert_eq!(s.kredit_sum.to_string(), "1350.00");
    assert_eq!(s.debet_sum.to_string(), "900.00");
    assert_eq!(s.period_change.to_string(), "450.00");
    assert_eq!(s.closing_balance, s.opening_balance + s.period_change);
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = Config::for_year(2025);
    let vouchers = load(&["mixed_2025.se"], &config);

    let render = || {
        let run = Reconciler::new(config.clone()).reconcile(&vouchers, Amount::ZERO);
        let mut out = Vec::new();
        report::write_combined(&mut out, &run, &vouchers, &config, "SEK").unwrap();
        out
    };

    assert_eq!(render(), render());
}
