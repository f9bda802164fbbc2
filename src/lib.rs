//! # SIE Reconcile
//!
//! Validates Swedish supplier-invoice bookkeeping by reconciling the two
//! sides of each liability: the voucher that records an invoice against
//! the accounts-payable account (2440) and the voucher that clears it
//! through the bank account (1930).
//!
//! The pipeline runs in three stages, each a pure function of the last:
//!
//! 1. **Decoder** ([`sie`]): reads a legacy-encoded SIE file into typed
//!    vouchers and transactions.
//! 2. **Classifier** ([`classifier`]): interprets each voucher as
//!    receipt, clearing, correction, or exclusion events.
//! 3. **Matcher** ([`matcher::Reconciler`]): pairs receipts to clearings
//!    under amount, date, supplier, and invoice-number constraints and
//!    produces one [`case::InvoiceCase`] per liability event.
//!
//! ## Example
//!
//! ```no_run
//! use sie_reconcile::{sie, Amount, Config, Reconciler};
//! use std::path::Path;
//!
//! # fn main() -> sie_reconcile::Result<()> {
//! let config = Config::for_year(2024);
//! let file = sie::parse_file(Path::new("bokforing.se"), &config)?;
//! let report = Reconciler::new(config).reconcile(&file.vouchers, Amount::ZERO);
//! for case in &report.cases {
//!     println!("{} {}", case.status, case.comment);
//! }
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod case;
pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod matcher;
pub mod report;
pub mod sie;
pub mod voucher;

pub use amount::Amount;
pub use case::{CaseStatus, Counterparty, InvoiceCase, RunReport, RunSummary};
pub use config::Config;
pub use error::{ReconcileError, Result};
pub use event::{ClearingEvent, CorrectionEvent, Event, ReceiptEvent};
pub use matcher::Reconciler;
pub use sie::{SieFile, SieHeader};
pub use voucher::{Transaction, Voucher};
