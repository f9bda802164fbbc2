//! Receipt-to-clearing matching for one target year.
//!
//! The matcher is the only stateful stage of the pipeline: it tracks which
//! clearings have been consumed so that no clearing settles more than one
//! receipt, and assembles one `InvoiceCase` per receipt plus one per
//! orphan clearing.

use crate::amount::Amount;
use crate::case::{CaseStatus, Counterparty, InvoiceCase, RunReport, RunSummary};
use crate::classifier;
use crate::config::Config;
use crate::event::{ClearingEvent, CorrectionEvent, Event, ReceiptEvent};
use crate::voucher::Voucher;
use log::info;

/// Matches receipts with the clearings that settle them.
///
/// # Output Ordering
///
/// Cases appear in ascending receipt-voucher order (series lexicographic,
/// number numeric, then line index), with orphan clearings appended in
/// ascending clearing-voucher order. Ties between candidate clearings are
/// broken by ascending voucher id, so identical input yields identical
/// output.
pub struct Reconciler {
    config: Config,
}

/// Ranking facts for one candidate clearing.
struct Candidate {
    index: usize,
    days: i64,
    supplier_match: bool,
    invoice_match: bool,
    both_match: bool,
}

impl Candidate {
    /// Sort key per the ranking rules: full match first, then invoice
    /// match, then smallest day gap.
    fn rank(&self) -> (bool, bool, i64) {
        (!self.both_match, !self.invoice_match, self.days)
    }
}

impl Reconciler {
    pub fn new(config: Config) -> Self {
        Reconciler { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the full matching pass.
    ///
    /// `vouchers` holds the target year's vouchers and, optionally, the
    /// following year's (carry-over clearings and corrections). Years
    /// beyond those two are ignored. `opening_balance` seeds the balance
    /// report; pass zero when there is no prior year.
    pub fn reconcile(&self, vouchers: &[Voucher], opening_balance: Amount) -> RunReport {
        let target = self.config.target_year;
        info!(
            "Matching {} vouchers against target year {target}",
            vouchers.len()
        );

        // Drop events from this year's correction pairs.
        let exclude = classifier::correction_exclusions(vouchers, target);
        let events = classify_filtered(vouchers, &self.config, &exclude);

        let mut receipts: Vec<ReceiptEvent> = Vec::new();
        let mut clearings: Vec<ClearingEvent> = Vec::new();
        let mut corrections: Vec<CorrectionEvent> = Vec::new();
        for event in events {
            let year = vouchers[event.voucher()].year();
            match event {
                Event::Receipt(r) if year == target => receipts.push(r),
                Event::Clearing(c) if year == target || year == target + 1 => clearings.push(c),
                Event::Correction(c) if year == target + 1 => corrections.push(c),
                _ => {}
            }
        }

        receipts.sort_by(|a, b| {
            let ka = (vouchers[a.voucher].order_key(), a.transaction);
            let kb = (vouchers[b.voucher].order_key(), b.transaction);
            ka.cmp(&kb)
        });

        let mut consumed = vec![false; clearings.len()];
        let mut corrections_used = vec![false; corrections.len()];
        let mut cases = Vec::with_capacity(receipts.len());

        for receipt in receipts {
            // Candidate generation, ranking, selection.
            if let Some(selected) = self.select_clearing(&receipt, &clearings, &consumed, vouchers)
            {
                assert!(
                    !consumed[selected.index],
                    "clearing consumed twice: voucher {}",
                    vouchers[clearings[selected.index].voucher].id()
                );
                consumed[selected.index] = true;
                cases.push(self.matched_case(receipt, &clearings, selected, vouchers));
                continue;
            }

            // A next-year correction may still settle the receipt.
            if let Some((index, confidence)) =
                self.settle_by_correction(&receipt, &corrections, &corrections_used, vouchers)
            {
                corrections_used[index] = true;
                cases.push(InvoiceCase {
                    receipt: Some(receipt),
                    counterparty: Some(Counterparty::Correction(corrections[index].clone())),
                    status: CaseStatus::Ok,
                    confidence,
                    comment: "Cleared by cross-year correction".to_string(),
                });
                continue;
            }

            // Unmatched receipt.
            let mut comment = format!(
                "No clearing found within {} days",
                self.config.max_days
            );
            if receipt.is_credit_note {
                comment.push_str(" (credit note)");
            }
            cases.push(InvoiceCase {
                receipt: Some(receipt),
                counterparty: None,
                status: CaseStatus::MissingClearing,
                confidence: 0,
                comment,
            });
        }

        // Orphan clearings from the target year.
        let mut orphans: Vec<InvoiceCase> = clearings
            .iter()
            .zip(&consumed)
            .filter(|(c, used)| !**used && vouchers[c.voucher].year() == target)
            .map(|(clearing, _)| {
                let mut comment = "No receipt found for this clearing".to_string();
                if !clearing.exact_bank_pair {
                    comment.push_str("; bank line chosen arbitrarily");
                }
                InvoiceCase {
                    receipt: None,
                    counterparty: Some(Counterparty::Clearing(clearing.clone())),
                    status: CaseStatus::MissingReceipt,
                    confidence: 0,
                    comment,
                }
            })
            .collect();
        orphans.sort_by(|a, b| {
            let key = |case: &InvoiceCase| {
                let clearing = case
                    .counterparty
                    .as_ref()
                    .and_then(Counterparty::as_clearing)
                    .expect("orphan cases hold a clearing");
                let voucher = &vouchers[clearing.voucher];
                (
                    voucher.series.clone(),
                    voucher.number,
                    clearing.ap_transaction,
                )
            };
            key(a).cmp(&key(b))
        });
        cases.extend(orphans);

        // Balances run over all target-year AP lines, corrections
        // included; the report must close against the books.
        let summary = self.summarize(vouchers, &cases, opening_balance);
        log_summary(&summary);

        RunReport { cases, summary }
    }

    /// Gathers candidates for a receipt and picks the best,
    /// or `None` when no clearing qualifies.
    fn select_clearing(
        &self,
        receipt: &ReceiptEvent,
        clearings: &[ClearingEvent],
        consumed: &[bool],
        vouchers: &[Voucher],
    ) -> Option<Selected> {
        let receipt_voucher = &vouchers[receipt.voucher];
        let mut candidates = Vec::new();

        for (index, clearing) in clearings.iter().enumerate() {
            if consumed[index] {
                continue;
            }
            if !clearing
                .ap_amount
                .abs()
                .approx_eq(receipt.ap_amount.abs(), self.config.amount_tolerance)
            {
                continue;
            }
            let days = vouchers[clearing.voucher]
                .date
                .signed_duration_since(receipt_voucher.date)
                .num_days();
            if days < 0 || days > self.config.max_days {
                continue;
            }

            let supplier_match = match (&receipt.supplier, &clearing.supplier) {
                (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
                _ => false,
            };
            let invoice_match = match (&receipt.invoice_number, &clearing.invoice_number) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            candidates.push(Candidate {
                index,
                days,
                supplier_match,
                invoice_match,
                both_match: supplier_match && invoice_match,
            });
        }

        candidates.sort_by(|a, b| {
            a.rank().cmp(&b.rank()).then_with(|| {
                let va = vouchers[clearings[a.index].voucher].order_key();
                let vb = vouchers[clearings[b.index].voucher].order_key();
                va.cmp(&vb)
            })
        });

        let best = candidates.first()?;
        let tied = candidates
            .iter()
            .filter(|c| c.rank() == best.rank())
            .count();
        Some(Selected {
            index: best.index,
            days: best.days,
            supplier_match: best.supplier_match,
            invoice_match: best.invoice_match,
            both_match: best.both_match,
            tied,
        })
    }

    /// Builds the case for a receipt matched to a clearing.
    fn matched_case(
        &self,
        receipt: ReceiptEvent,
        clearings: &[ClearingEvent],
        selected: Selected,
        vouchers: &[Voucher],
    ) -> InvoiceCase {
        let clearing = &clearings[selected.index];
        let same_voucher = clearing.voucher == receipt.voucher;

        let mut comment = if same_voucher {
            "Receipt and clearing in same voucher".to_string()
        } else if selected.days == 1 {
            "Clearing found 1 day after receipt".to_string()
        } else {
            format!("Clearing found {} days after receipt", selected.days)
        };

        let confidence = if same_voucher || selected.both_match {
            100
        } else if selected.invoice_match {
            comment.push_str(" (invoice number match, supplier differs)");
            75
        } else if selected.supplier_match {
            comment.push_str(" (supplier match only)");
            50
        } else {
            comment.push_str(" (matched on amount and date only)");
            25
        };

        let clearing_year = vouchers[clearing.voucher].year();
        if !same_voucher && clearing_year != self.config.target_year {
            comment.push_str(&format!(
                " [CROSS-YEAR: {} invoice paid in {}]",
                self.config.target_year, clearing_year
            ));
        }

        let mut status = CaseStatus::Ok;
        if selected.tied > 1 && !selected.both_match {
            status = CaseStatus::Ambiguous;
            comment.push_str(&format!(
                " ({} equally ranked candidates, lowest voucher id chosen)",
                selected.tied
            ));
        }
        if !clearing.exact_bank_pair {
            status = CaseStatus::NeedsReview;
            comment.push_str("; bank line chosen arbitrarily");
        }

        InvoiceCase {
            receipt: Some(receipt),
            counterparty: Some(Counterparty::Clearing(clearing.clone())),
            status,
            confidence,
            comment,
        }
    }

    /// Looks for a carry-over correction that settles the
    /// receipt, preferring an explicit voucher-id reference over an
    /// amount + supplier match.
    fn settle_by_correction(
        &self,
        receipt: &ReceiptEvent,
        corrections: &[CorrectionEvent],
        used: &[bool],
        vouchers: &[Voucher],
    ) -> Option<(usize, u8)> {
        let receipt_id = vouchers[receipt.voucher].id();

        for (index, correction) in corrections.iter().enumerate() {
            if !used[index] && correction.corrects.as_deref() == Some(receipt_id.as_str()) {
                return Some((index, 100));
            }
        }

        for (index, correction) in corrections.iter().enumerate() {
            if used[index] {
                continue;
            }
            let amount_ok = correction
                .ap_total
                .abs()
                .approx_eq(receipt.ap_amount.abs(), self.config.amount_tolerance);
            let supplier_ok = match (&receipt.supplier, &correction.supplier) {
                (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
                _ => false,
            };
            if amount_ok && supplier_ok {
                return Some((index, 75));
            }
        }

        None
    }

    /// Balance sums and status totals.
    fn summarize(
        &self,
        vouchers: &[Voucher],
        cases: &[InvoiceCase],
        opening_balance: Amount,
    ) -> RunSummary {
        let mut kredit_sum = Amount::ZERO;
        let mut debet_sum = Amount::ZERO;
        for voucher in vouchers.iter().filter(|v| v.year() == self.config.target_year) {
            for (_, trans) in voucher.transactions_for(&self.config.ap_account) {
                if trans.amount.is_credit() {
                    kredit_sum += trans.amount.abs();
                } else if trans.amount.is_debit() {
                    debet_sum += trans.amount.abs();
                }
            }
        }
        let period_change = kredit_sum - debet_sum;

        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();

        RunSummary {
            target_year: self.config.target_year,
            opening_balance,
            kredit_sum,
            debet_sum,
            period_change,
            closing_balance: opening_balance + period_change,
            total_cases: cases.len(),
            ok_count: count(CaseStatus::Ok),
            missing_clearing_count: count(CaseStatus::MissingClearing),
            missing_receipt_count: count(CaseStatus::MissingReceipt),
            needs_review_count: count(CaseStatus::NeedsReview),
            ambiguous_count: count(CaseStatus::Ambiguous),
        }
    }
}

/// The winning candidate for one receipt.
struct Selected {
    index: usize,
    days: i64,
    supplier_match: bool,
    invoice_match: bool,
    both_match: bool,
    /// How many candidates shared the winning rank.
    tied: usize,
}

/// Classifies all vouchers and drops events originating from this year's
/// correction-pair exclude set. Excluded ids are only meaningful for
/// target-year vouchers; a next-year voucher may legitimately reuse the id.
fn classify_filtered(
    vouchers: &[Voucher],
    config: &Config,
    exclude: &std::collections::BTreeSet<String>,
) -> Vec<Event> {
    classifier::classify_all(vouchers, config)
        .into_iter()
        .filter(|event| {
            let voucher = &vouchers[event.voucher()];
            !(voucher.year() == config.target_year && exclude.contains(&voucher.id()))
        })
        .collect()
}


fn log_summary(summary: &RunSummary) {
    info!("Matching complete for {}", summary.target_year);
    info!(
        "  Kredit {} / Debet {} / Change {} / Closing {}",
        summary.kredit_sum, summary.debet_sum, summary.period_change, summary.closing_balance
    );
    info!("  Total cases: {}", summary.total_cases);
    info!("    OK: {}", summary.ok_count);
    info!("    Missing clearing: {}", summary.missing_clearing_count);
    info!("    Missing receipt: {}", summary.missing_receipt_count);
    info!("    Needs review: {}", summary.needs_review_count);
    info!("    Ambiguous: {}", summary.ambiguous_count);
}
