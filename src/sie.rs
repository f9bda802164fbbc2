//! SIE type 4 decoder.
//!
//! SIE files are line-oriented: `#`-prefixed header directives, then
//! voucher blocks of the shape
//!
//! ```text
//! #VER A 129 20250308 "Leverantörsfaktura - Mottagen - Elektroskandia - 31641715"
//! {
//!    #TRANS 2440 {} -163.00
//!    #TRANS 4010 {} 163.00
//! }
//! ```
//!
//! Historical exports use IBM PC code pages, so decoding probes cp437,
//! cp850, ISO 8859-1, and UTF-8 in that order. Per-voucher problems are
//! logged and the voucher skipped; only an unreadable file or an
//! exhausted probe aborts the run.

use crate::amount::Amount;
use crate::config::Config;
use crate::error::{ReconcileError, Result};
use crate::voucher::{Transaction, Voucher};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use oem_cp::code_table::{DECODING_TABLE_CP437, DECODING_TABLE_CP850};
use oem_cp::decode_string_complete_table;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Header metadata recorded from `#` directives before the first voucher.
///
/// The decoder stores these for callers but does not act on them beyond
/// encoding selection, which happens at the byte level before parsing.
#[derive(Debug, Clone, Default)]
pub struct SieHeader {
    /// `#FORMAT`, normally `PC8`.
    pub format: Option<String>,

    /// `#FNAMN` company name.
    pub company_name: Option<String>,

    /// `#VALUTA` currency code.
    pub currency: Option<String>,

    /// `#RAR` fiscal year ranges.
    pub fiscal_years: Vec<FiscalYear>,

    /// `#KONTO` account number to name.
    pub account_names: BTreeMap<String, String>,
}

/// One `#RAR` fiscal year declaration.
#[derive(Debug, Clone)]
pub struct FiscalYear {
    /// 0 = current year, -1 = previous, and so on.
    pub index: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A decoded SIE file: header metadata plus the voucher sequence.
#[derive(Debug, Clone, Default)]
pub struct SieFile {
    pub header: SieHeader,
    pub vouchers: Vec<Voucher>,
}

/// Reads and parses a SIE file from disk.
pub fn parse_file(path: &Path, config: &Config) -> Result<SieFile> {
    let bytes = fs::read(path)?;
    parse_bytes(&bytes, &path.display().to_string(), config)
}

/// Decodes a byte buffer and parses it. `origin` labels log and error
/// messages, typically the file path.
pub fn parse_bytes(bytes: &[u8], origin: &str, config: &Config) -> Result<SieFile> {
    let (text, encoding) = decode(bytes, origin)?;
    info!("Decoded {origin} as {encoding}");
    let file = parse_text(&text, config);
    log_statistics(&file, origin, config);
    Ok(file)
}

/// Parses already-decoded SIE text.
pub fn parse_text(text: &str, config: &Config) -> SieFile {
    let mut file = SieFile::default();
    // Voucher staged by #VER, waiting for its `{ ... }` block.
    let mut current: Option<Voucher> = None;
    let mut in_block = false;
    let mut malformed = false;

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

        if line.starts_with("#VER") {
            if current.is_some() {
                warn!("#VER before previous voucher block closed; dropping staged voucher");
            }
            // A description broken across lines leaves an unbalanced
            // quote; glue the next line on before matching.
            let mut joined = line.to_string();
            if joined.matches('"').count() % 2 == 1 && i + 1 < lines.len() {
                i += 1;
                joined.push_str(lines[i].trim());
            }
            current = parse_ver_line(&joined);
            in_block = false;
            malformed = false;
        } else if line == "{" {
            if current.is_some() {
                in_block = true;
            } else {
                warn!("Ignoring stray '{{' with no voucher staged");
            }
        } else if line == "}" {
            if in_block {
                if let Some(voucher) = current.take() {
                    finalize_voucher(voucher, malformed, config, &mut file.vouchers);
                }
                in_block = false;
                malformed = false;
            } else {
                warn!("Ignoring stray '}}' outside voucher block");
            }
        } else if in_block {
            if line.starts_with("#TRANS") {
                match parse_trans_line(line) {
                    Some(transaction) => {
                        if let Some(voucher) = current.as_mut() {
                            voucher.transactions.push(transaction);
                        }
                    }
                    None => {
                        if let Some(voucher) = current.as_ref() {
                            error!(
                                "Voucher {}: unparseable #TRANS line {line:?}; skipping voucher",
                                voucher.id()
                            );
                        }
                        malformed = true;
                    }
                }
            } else if !line.is_empty() {
                warn!("Ignoring non-#TRANS line inside voucher block: {line:?}");
            }
        } else if let Some(directive) = line.strip_prefix('#') {
            record_header(directive, &mut file.header);
        } else if !line.is_empty() {
            warn!("Unrecognized line outside voucher block: {line:?}");
        }

        i += 1;
    }

    if current.is_some() {
        warn!("Input ended inside a voucher block; dropping unterminated voucher");
    }

    file
}

/// Probe order for historical Swedish accounting exports.
const PROBE_ORDER: [SieEncoding; 4] = [
    SieEncoding::Cp437,
    SieEncoding::Cp850,
    SieEncoding::Latin1,
    SieEncoding::Utf8,
];

#[derive(Debug, Clone, Copy)]
enum SieEncoding {
    Cp437,
    Cp850,
    Latin1,
    Utf8,
}

impl SieEncoding {
    fn name(self) -> &'static str {
        match self {
            SieEncoding::Cp437 => "cp437",
            SieEncoding::Cp850 => "cp850",
            SieEncoding::Latin1 => "latin-1",
            SieEncoding::Utf8 => "utf-8",
        }
    }

    /// Decodes strictly; `Err` carries the offset of the first bad byte.
    fn decode(self, bytes: &[u8]) -> std::result::Result<String, usize> {
        match self {
            SieEncoding::Cp437 => Ok(decode_string_complete_table(bytes, &DECODING_TABLE_CP437)),
            SieEncoding::Cp850 => Ok(decode_string_complete_table(bytes, &DECODING_TABLE_CP850)),
            // ISO 8859-1 maps every byte to the same code point.
            SieEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            SieEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| e.valid_up_to()),
        }
    }
}

fn decode(bytes: &[u8], origin: &str) -> Result<(String, &'static str)> {
    let mut last_offset = 0;
    for encoding in PROBE_ORDER {
        match encoding.decode(bytes) {
            Ok(text) => return Ok((text, encoding.name())),
            Err(offset) => {
                debug!("{origin}: {} failed at byte {offset}", encoding.name());
                last_offset = offset;
            }
        }
    }
    Err(ReconcileError::Encoding {
        path: origin.to_string(),
        offset: last_offset,
    })
}

/// `#VER <series> <number> <yyyymmdd> <description> [<yyyymmdd>]` where the
/// description is a bare token or a double-quoted string.
fn ver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^#VER\s+([A-Za-z]+)\s+(\d+)\s+(\d{8})\s+(?:"([^"]*)"|(\S+))(?:\s+(\d{8}))?\s*$"#)
            .expect("hard-coded pattern compiles")
    })
}

/// `#TRANS <account> {<object-list>} <signed-amount> [<yyyymmdd>] [<description>]`.
/// The object list is accepted but not interpreted.
fn trans_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^#TRANS\s+(\d+)\s+\{([^}]*)\}\s+(-?\d+(?:\.\d+)?)(?:\s+(\d{8}))?(?:\s+(?:"([^"]*)"|(\S+)))?\s*$"#,
        )
        .expect("hard-coded pattern compiles")
    })
}

fn parse_ver_line(line: &str) -> Option<Voucher> {
    let caps = match ver_regex().captures(line) {
        Some(caps) => caps,
        None => {
            warn!("Could not parse #VER line: {line:?}");
            return None;
        }
    };

    let number = match caps[2].parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            warn!("Voucher number out of range on #VER line: {line:?}");
            return None;
        }
    };
    let date = match parse_date(&caps[3]) {
        Some(d) => d,
        None => {
            warn!("Invalid transaction date on #VER line: {line:?}");
            return None;
        }
    };
    let registration_date = match caps.get(6) {
        Some(m) => match parse_date(m.as_str()) {
            Some(d) => Some(d),
            None => {
                warn!("Invalid registration date on #VER line: {line:?}");
                return None;
            }
        },
        None => None,
    };
    let description = caps
        .get(4)
        .or_else(|| caps.get(5))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some(Voucher {
        series: caps[1].to_string(),
        number,
        date,
        registration_date,
        description,
        transactions: Vec::new(),
    })
}

fn parse_trans_line(line: &str) -> Option<Transaction> {
    let caps = trans_regex().captures(line)?;

    let amount: Amount = caps[3].parse().ok()?;
    let date = match caps.get(4) {
        Some(m) => Some(parse_date(m.as_str())?),
        None => None,
    };
    let description = caps
        .get(5)
        .or_else(|| caps.get(6))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some(Transaction {
        account: caps[1].to_string(),
        amount,
        date,
        description,
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

fn finalize_voucher(voucher: Voucher, malformed: bool, config: &Config, out: &mut Vec<Voucher>) {
    if malformed {
        // Already logged at the offending line.
        return;
    }
    if voucher.transactions.is_empty() {
        warn!("Voucher {} has no transactions; skipping", voucher.id());
        return;
    }
    if !voucher.is_balanced(config.amount_tolerance) {
        // Emit anyway: the report must reproduce the books as recorded.
        warn!(
            "Voucher {} does not balance (sum {})",
            voucher.id(),
            voucher
                .transactions
                .iter()
                .fold(Amount::ZERO, |acc, t| acc + t.amount)
        );
    }
    out.push(voucher);
}

fn record_header(directive: &str, header: &mut SieHeader) {
    let fields = split_fields(directive);
    let Some(keyword) = fields.first() else {
        return;
    };
    match keyword.as_str() {
        "FORMAT" => header.format = fields.get(1).cloned(),
        "FNAMN" => header.company_name = fields.get(1).cloned(),
        "VALUTA" => header.currency = fields.get(1).cloned(),
        "KONTO" => {
            if let (Some(number), Some(name)) = (fields.get(1), fields.get(2)) {
                header.account_names.insert(number.clone(), name.clone());
            }
        }
        "RAR" => {
            let parsed = (|| {
                Some(FiscalYear {
                    index: fields.get(1)?.parse().ok()?,
                    start: parse_date(fields.get(2)?)?,
                    end: parse_date(fields.get(3)?)?,
                })
            })();
            match parsed {
                Some(year) => header.fiscal_years.push(year),
                None => debug!("Could not parse #RAR directive: {directive:?}"),
            }
        }
        other => debug!("Ignoring header directive #{other}"),
    }
}

/// Splits a directive line on whitespace, keeping double-quoted spans
/// together (quotes stripped).
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_any = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                seen_any = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_any {
                    fields.push(std::mem::take(&mut current));
                    seen_any = false;
                }
            }
            c => {
                current.push(c);
                seen_any = true;
            }
        }
    }
    if seen_any {
        fields.push(current);
    }
    fields
}

fn log_statistics(file: &SieFile, origin: &str, config: &Config) {
    let total = file.vouchers.len();
    if total == 0 {
        warn!("No vouchers found in {origin}");
        return;
    }
    let balanced = file
        .vouchers
        .iter()
        .filter(|v| v.is_balanced(config.amount_tolerance))
        .count();
    let with_ap = file
        .vouchers
        .iter()
        .filter(|v| v.has_account(&config.ap_account))
        .count();
    info!("Parsed {total} vouchers from {origin}");
    info!("Balanced vouchers: {balanced}/{total}");
    info!(
        "Vouchers touching account {}: {with_ap}",
        config.ap_account
    );
}
