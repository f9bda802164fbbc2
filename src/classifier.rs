//! Event classifier.
//!
//! Interprets each voucher through the debit/credit semantics of the
//! accounts-payable account and the presence of the bank account:
//!
//! - AP credit, no opposite bank line  -> receipt (a new invoice)
//! - AP debit, no bank line            -> receipt of a credit note
//! - AP debit, bank present            -> clearing (payment)
//! - AP credit, opposite bank line     -> clearing (refund of a credit note)
//!
//! Also detects self-canceling vouchers and the year-scoped
//! `korrigerad`/`Korrigering` correction pairs that must be withheld from
//! matching.

use crate::config::Config;
use crate::event::{ClearingEvent, CorrectionEvent, Event, ReceiptEvent};
use crate::voucher::{Transaction, Voucher};
use log::{info, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Classifies every voucher, in input order.
pub fn classify_all(vouchers: &[Voucher], config: &Config) -> Vec<Event> {
    let mut events = Vec::new();
    for (index, voucher) in vouchers.iter().enumerate() {
        classify_voucher(index, voucher, config, &mut events);
    }
    events
}

/// Emits the events for a single voucher.
pub fn classify_voucher(index: usize, voucher: &Voucher, config: &Config, out: &mut Vec<Event>) {
    if let Some(corrects) = correction_reference(&voucher.description) {
        out.push(Event::Correction(CorrectionEvent {
            voucher: index,
            corrects,
            ap_total: voucher.total_for(&config.ap_account),
            supplier: voucher.supplier(),
        }));
    }

    let ap_lines = voucher.transactions_for(&config.ap_account);
    if ap_lines.is_empty() {
        return;
    }
    let bank_lines = voucher.transactions_for(&config.bank_account);

    // An invoice and its credit note booked together with no payment
    // cancel out; nothing to reconcile.
    if bank_lines.is_empty()
        && voucher
            .total_for(&config.ap_account)
            .approx_zero(config.amount_tolerance)
    {
        info!(
            "Excluding self-canceling voucher without payment: {}",
            voucher.id()
        );
        out.push(Event::Excluded { voucher: index });
        return;
    }

    let supplier = voucher.supplier();
    let invoice_number = voucher.invoice_number();

    for (line, trans) in &ap_lines {
        if trans.amount.is_debit() {
            if bank_lines.is_empty() {
                out.push(Event::Receipt(ReceiptEvent {
                    voucher: index,
                    transaction: *line,
                    ap_amount: trans.amount,
                    is_credit_note: true,
                    supplier: supplier.clone(),
                    invoice_number: invoice_number.clone(),
                }));
            } else {
                let (bank_line, bank, exact) = pick_bank_partner(trans, &bank_lines, config);
                if !exact {
                    warn!(
                        "Voucher {}: no bank line offsets AP amount {}; pairing with first bank line",
                        voucher.id(),
                        trans.amount
                    );
                }
                out.push(Event::Clearing(ClearingEvent {
                    voucher: index,
                    ap_transaction: *line,
                    bank_transaction: bank_line,
                    ap_amount: trans.amount,
                    bank_amount: bank.amount,
                    exact_bank_pair: exact,
                    supplier: supplier.clone(),
                    invoice_number: invoice_number.clone(),
                }));
            }
        } else if trans.amount.is_credit() {
            // A refund clears a received credit note: money comes back in
            // through the bank, so the pairing must be exact and opposite.
            let refund_partner = bank_lines.iter().find(|(_, b)| {
                b.amount.is_debit()
                    && b.amount
                        .abs()
                        .approx_eq(trans.amount.abs(), config.amount_tolerance)
            });
            match refund_partner {
                Some((bank_line, bank)) => {
                    out.push(Event::Clearing(ClearingEvent {
                        voucher: index,
                        ap_transaction: *line,
                        bank_transaction: *bank_line,
                        ap_amount: trans.amount,
                        bank_amount: bank.amount,
                        exact_bank_pair: true,
                        supplier: supplier.clone(),
                        invoice_number: invoice_number.clone(),
                    }));
                }
                None => {
                    out.push(Event::Receipt(ReceiptEvent {
                        voucher: index,
                        transaction: *line,
                        ap_amount: trans.amount,
                        is_credit_note: false,
                        supplier: supplier.clone(),
                        invoice_number: invoice_number.clone(),
                    }));
                }
            }
        }
        // Zero AP lines carry no liability information.
    }
}

/// Selects the bank partner for an AP debit: the first bank line with the
/// same absolute amount and opposite sign, else the smallest-index bank
/// line (flagged inexact).
fn pick_bank_partner<'a>(
    ap: &Transaction,
    bank_lines: &[(usize, &'a Transaction)],
    config: &Config,
) -> (usize, &'a Transaction, bool) {
    for (line, bank) in bank_lines {
        if bank.amount.is_credit()
            && bank
                .amount
                .abs()
                .approx_eq(ap.amount.abs(), config.amount_tolerance)
        {
            return (*line, bank, true);
        }
    }
    let (line, bank) = bank_lines[0];
    (line, bank, false)
}

/// Identifies correction pairs to exclude from a matching pass over
/// `target_year`.
///
/// A voucher pairs with the voucher its description references after a
/// `korrigerad` ("has been corrected") or `Korrigering` ("is the
/// correction") token. Both members are excluded only when both are dated
/// in the target year: voucher numbers restart between fiscal years, so a
/// cross-year id reference would name an unrelated voucher.
pub fn correction_exclusions(vouchers: &[Voucher], target_year: i32) -> BTreeSet<String> {
    let mut exclude = BTreeSet::new();

    for voucher in vouchers {
        if voucher.year() != target_year {
            continue;
        }
        for regex in [corrected_regex(), correction_regex()] {
            let Some(caps) = regex.captures(&voucher.description) else {
                continue;
            };
            let referenced = caps[1].to_string();
            let referenced_in_year = vouchers
                .iter()
                .any(|v| v.year() == target_year && v.id() == referenced);
            if referenced_in_year {
                info!(
                    "Excluding correction pair: {} <-> {}",
                    voucher.id(),
                    referenced
                );
                exclude.insert(voucher.id());
                exclude.insert(referenced);
            }
        }
    }

    if !exclude.is_empty() {
        info!(
            "Correction vouchers excluded: {} ({})",
            exclude.len(),
            exclude
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    exclude
}

/// Returns `Some(reference)` when the description declares this voucher a
/// correction of another. The reference itself may be absent.
fn correction_reference(description: &str) -> Option<Option<String>> {
    if !description.to_lowercase().contains("korrigering") {
        return None;
    }
    let corrects = correction_regex()
        .captures(description)
        .map(|caps| caps[1].to_string());
    Some(corrects)
}

/// `korrigerad ... A131`: this voucher is the erroneous one.
fn corrected_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)korrigerad.*?([A-Z]\d+)").expect("hard-coded pattern compiles")
    })
}

/// `Korrigering av ver.nr. A120`: this voucher cancels another.
fn correction_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)korrigering.*?([A-Z]\d+)").expect("hard-coded pattern compiles")
    })
}
