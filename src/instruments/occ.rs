//! OCC option symbols: `ROOT + YYMMDD + C|P + strike×1000` (8 digits).

use super::SymbolError;
use crate::domain::{Decimal, OptionType};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal as RustDecimal;
use std::fmt;

const DATE_DIGITS: usize = 6;
const STRIKE_DIGITS: usize = 8;
const MAX_ENCODED_STRIKE: i64 = 99_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OccSymbol {
    pub root: String,
    pub expiry: NaiveDate,
    pub right: OptionType,
    pub strike: Decimal,
}

impl fmt::Display for OccSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match build_occ_symbol(&self.root, self.expiry, self.right, self.strike) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn unknown(symbol: &str) -> SymbolError {
    SymbolError::UnknownFormat {
        kind: "occ",
        symbol: symbol.to_string(),
    }
}

/// Parse a compact OCC symbol such as `SPY240216C00450000`.
pub fn parse_occ_symbol(symbol: &str) -> Result<OccSymbol, SymbolError> {
    let s = symbol.trim();
    let tail_len = DATE_DIGITS + 1 + STRIKE_DIGITS;
    if !s.is_ascii() || s.len() <= tail_len {
        return Err(unknown(symbol));
    }

    let (root, tail) = s.split_at(s.len() - tail_len);
    if !root.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(unknown(symbol));
    }

    let (date, rest) = tail.split_at(DATE_DIGITS);
    let (right, strike) = rest.split_at(1);
    if !date.bytes().all(|b| b.is_ascii_digit()) || !strike.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unknown(symbol));
    }

    let right = match right {
        "C" => OptionType::Call,
        "P" => OptionType::Put,
        _ => return Err(unknown(symbol)),
    };

    let yy: i32 = date[0..2].parse().map_err(|_| unknown(symbol))?;
    let mm: u32 = date[2..4].parse().map_err(|_| unknown(symbol))?;
    let dd: u32 = date[4..6].parse().map_err(|_| unknown(symbol))?;
    let expiry = NaiveDate::from_ymd_opt(2000 + yy, mm, dd).ok_or_else(|| unknown(symbol))?;

    let thousandths: i64 = strike.parse().map_err(|_| unknown(symbol))?;
    let strike = Decimal::new(RustDecimal::new(thousandths, 3));

    Ok(OccSymbol {
        root: root.to_string(),
        expiry,
        right,
        strike,
    })
}

/// Build the compact OCC symbol. The strike is rounded to a thousandth.
pub fn build_occ_symbol(
    root: &str,
    expiry: NaiveDate,
    right: OptionType,
    strike: Decimal,
) -> Result<String, SymbolError> {
    let root = root.trim().to_ascii_uppercase();
    if root.is_empty() || !root.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(SymbolError::UnknownFormat {
            kind: "occ root",
            symbol: root,
        });
    }

    let encoded = (strike.inner() * RustDecimal::from(1000))
        .round()
        .to_i64()
        .filter(|n| (0..=MAX_ENCODED_STRIKE).contains(n))
        .ok_or(SymbolError::StrikeOutOfRange(strike))?;

    Ok(format!(
        "{}{:02}{:02}{:02}{}{:08}",
        root,
        expiry.year().rem_euclid(100),
        expiry.month(),
        expiry.day(),
        right.code(),
        encoded
    ))
}

pub fn option_unique_symbol(occ: &str) -> String {
    format!("OPT:{}", occ)
}
