//! Canonicalization of raw contract codes.
//!
//! Upstream rows identify a contract by an OCC-style code such as
//! `AAPL240621C00150000`: ticker, `YYMMDD` expiration, `C`/`P`, strike times
//! 1000. The grammar is `^(\w+)(\d{6})([CP])(\d+)$`; since the ticker may
//! itself end in digits, the option type is taken to be the *last* non-digit
//! character, exactly like a greedy regex would.
//!
//! A code that does not parse is a fatal input error. Rows are never skipped.

use chrono::NaiveDate;
use options_ingestor::models::exception_symbols::{ExceptionSymbolSet, strip_marker};
use options_ingestor::models::quote::OptionQuote;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::records::CanonicalOptionRecord;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to buy.
    Call,
    /// Right to sell.
    Put,
}

impl OptionType {
    /// Single-letter code used in contract codes and stored columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Call => "C",
            Self::Put => "P",
        }
    }

    /// Parses `C` or `P`.
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "C" => Some(Self::Call),
            "P" => Some(Self::Put),
            _ => None,
        }
    }
}

/// The four parts of a contract code.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCode<'a> {
    /// Ticker embedded in the code (e.g. `SPXW` for SPX weeklies).
    pub ticker: &'a str,
    /// Expiration date, `20YYMMDD`.
    pub expiration: NaiveDate,
    /// Call or put.
    pub option_type: OptionType,
    /// Strike price (raw digits / 1000).
    pub strike: f64,
}

/// Structured fields derived from a code and its underlying.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalContract {
    /// Underlying with any marker prefix removed.
    pub underlying_symbol: String,
    /// Ticker the contract is filed under.
    pub option_symbol: String,
    /// Expiration date.
    pub expiration_date: NaiveDate,
    /// Call or put.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: f64,
}

fn malformed(code: &str, reason: &'static str) -> StoreError {
    StoreError::MalformedContractCode {
        code: code.to_string(),
        reason,
    }
}

/// Splits a raw contract code into its parts.
pub fn parse_contract_code(code: &str) -> StoreResult<ContractCode<'_>> {
    let (type_at, type_char) = code
        .char_indices()
        .rfind(|(_, c)| !c.is_ascii_digit())
        .ok_or_else(|| malformed(code, "no option type"))?;

    let option_type = match type_char {
        'C' => OptionType::Call,
        'P' => OptionType::Put,
        _ => return Err(malformed(code, "option type must be C or P")),
    };

    let strike_digits = &code[type_at + 1..];
    if strike_digits.is_empty() {
        return Err(malformed(code, "missing strike"));
    }
    let raw_strike: u64 = strike_digits
        .parse()
        .map_err(|_| malformed(code, "strike out of range"))?;

    let head = &code[..type_at];
    let bytes = head.as_bytes();
    if bytes.len() < 7 || !bytes[bytes.len() - 6..].iter().all(u8::is_ascii_digit) {
        return Err(malformed(code, "expected ticker followed by YYMMDD"));
    }
    let (ticker, yymmdd) = head.split_at(head.len() - 6);
    if !ticker.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(malformed(code, "ticker must be word characters"));
    }

    let expiration = NaiveDate::parse_from_str(&format!("20{yymmdd}"), "%Y%m%d")
        .map_err(|_| malformed(code, "expiration is not a calendar date"))?;

    Ok(ContractCode {
        ticker,
        expiration,
        option_type,
        strike: raw_strike as f64 / 1000.0,
    })
}

/// Derives the canonical contract fields for one raw row.
///
/// `underlying` is the row's symbol as reported upstream, marker included.
/// Exception underlyings file every contract under the stripped underlying
/// instead of the ticker embedded in the code.
pub fn canonicalize(
    code: &str,
    underlying: &str,
    exceptions: &ExceptionSymbolSet,
) -> StoreResult<CanonicalContract> {
    let parsed = parse_contract_code(code)?;
    let underlying_symbol = strip_marker(underlying).to_string();
    let option_symbol = if exceptions.contains(&underlying_symbol) {
        underlying_symbol.clone()
    } else {
        parsed.ticker.to_string()
    };

    Ok(CanonicalContract {
        underlying_symbol,
        option_symbol,
        expiration_date: parsed.expiration,
        option_type: parsed.option_type,
        strike: parsed.strike,
    })
}

/// Canonicalizes a whole raw quote row filed under the `date` partition.
///
/// The record date is the partition date, not the snapshot timestamp, so it
/// always agrees with the checkpoint.
pub fn canonicalize_quote(
    quote: &OptionQuote,
    date: NaiveDate,
    exceptions: &ExceptionSymbolSet,
) -> StoreResult<CanonicalOptionRecord> {
    let c = canonicalize(&quote.option, &quote.symbol, exceptions)?;
    Ok(CanonicalOptionRecord {
        date,
        underlying_symbol: c.underlying_symbol,
        option_code: quote.option.clone(),
        option_symbol: c.option_symbol,
        expiration_date: c.expiration_date,
        option_type: c.option_type,
        strike: c.strike,
        open_interest: quote.open_interest,
        volume: quote.volume,
        delta: quote.delta,
        gamma: quote.gamma,
        vega: quote.vega,
        theta: quote.theta,
        rho: quote.rho,
        theo: quote.theo,
        iv: quote.iv,
        bid: quote.bid,
        ask: quote.ask,
        open: quote.open,
        high: quote.high,
    })
}
