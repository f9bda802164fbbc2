//! SIE reconciliation CLI.
//!
//! Reads one or more SIE files, reconciles the target year's supplier
//! invoices, and writes the case report as CSV.
//!
//! # Usage
//!
//! ```bash
//! sie-reconcile --year 2024 bokforing-2024.se bokforing-2025.se --report report.csv
//! ```
//!
//! Without `--report` the combined report goes to stdout. `--exceptions`
//! and `--summary` write the additional reports when given.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: set to `debug` or `info` to control logging verbosity

use sie_reconcile::{report, sie, Amount, Config, ReconcileError, Reconciler, Result};
use std::env;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

struct Args {
    files: Vec<PathBuf>,
    year: i32,
    opening: Amount,
    report_path: Option<PathBuf>,
    exceptions_path: Option<PathBuf>,
    summary_path: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut files = Vec::new();
    let mut year = None;
    let mut opening = Amount::ZERO;
    let mut report_path = None;
    let mut exceptions_path = None;
    let mut summary_path = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| ReconcileError::Usage(format!("Missing value for {name}")))
        };
        match arg.as_str() {
            "--year" => {
                year = Some(value("--year")?.parse::<i32>().map_err(|_| {
                    ReconcileError::Usage("--year expects a four-digit year".to_string())
                })?);
            }
            "--opening" => {
                opening = Amount::from_str(&value("--opening")?).map_err(|_| {
                    ReconcileError::Usage("--opening expects a decimal amount".to_string())
                })?;
            }
            "--report" => report_path = Some(PathBuf::from(value("--report")?)),
            "--exceptions" => exceptions_path = Some(PathBuf::from(value("--exceptions")?)),
            "--summary" => summary_path = Some(PathBuf::from(value("--summary")?)),
            other if other.starts_with("--") => {
                return Err(ReconcileError::Usage(format!("Unknown option {other}")));
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }

    let year = year.ok_or_else(|| ReconcileError::Usage("Missing --year".to_string()))?;
    if files.is_empty() {
        return Err(ReconcileError::Usage("Missing input file".to_string()));
    }

    Ok(Args {
        files,
        year,
        opening,
        report_path,
        exceptions_path,
        summary_path,
    })
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = Config::for_year(args.year);

    let mut vouchers = Vec::new();
    let mut currency: Option<String> = None;
    for path in &args.files {
        let file = sie::parse_file(path, &config)?;
        if currency.is_none() {
            currency = file.header.currency;
        }
        vouchers.extend(file.vouchers);
    }
    let currency = currency.unwrap_or_else(|| "SEK".to_string());

    let reconciler = Reconciler::new(config);
    let run_report = reconciler.reconcile(&vouchers, args.opening);
    let config = reconciler.config();

    match &args.report_path {
        Some(path) => {
            let file = File::create(path)?;
            report::write_combined(file, &run_report, &vouchers, config, &currency)?;
        }
        None => {
            let stdout = io::stdout();
            report::write_combined(stdout.lock(), &run_report, &vouchers, config, &currency)?;
        }
    }

    if let Some(path) = &args.exceptions_path {
        let file = File::create(path)?;
        report::write_exceptions(file, &run_report, &vouchers, config, &currency)?;
    }

    if let Some(path) = &args.summary_path {
        let file = File::create(path)?;
        report::write_summary(file, &run_report.summary, config)?;
    }

    Ok(())
}
