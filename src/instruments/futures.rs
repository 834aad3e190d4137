//! Futures codes: `ROOT + MONTH_CODE + YEAR` (`ESZ5`, `NQH24`).

use super::SymbolError;
use crate::domain::Decimal;
use chrono::NaiveDate;

/// Static contract terms for a futures root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuturesSpec {
    pub root: &'static str,
    /// Point value.
    pub multiplier: Decimal,
    pub tick_value: Decimal,
    pub description: &'static str,
}

/// Exchange recorded for every futures instrument.
pub const FUTURES_EXCHANGE: &str = "CME";

fn spec(root: &'static str, multiplier: i64, tick_value: &str, description: &'static str) -> Option<FuturesSpec> {
    Some(FuturesSpec {
        root,
        multiplier: Decimal::from_i64(multiplier),
        tick_value: Decimal::from_str_canonical(tick_value).ok()?,
        description,
    })
}

pub fn futures_spec(root: &str) -> Option<FuturesSpec> {
    match root {
        "ES" => spec("ES", 50, "12.5", "E-mini S&P 500"),
        "NQ" => spec("NQ", 20, "5", "E-mini NASDAQ-100"),
        "YM" => spec("YM", 5, "5", "E-mini Dow"),
        "RTY" => spec("RTY", 50, "5", "E-mini Russell 2000"),
        "CL" => spec("CL", 1000, "10", "Crude Oil"),
        "GC" => spec("GC", 100, "10", "Gold"),
        "SI" => spec("SI", 5000, "25", "Silver"),
        "ZB" => spec("ZB", 1000, "31.25", "US Treasury Bond"),
        "ZN" => spec("ZN", 1000, "15.625", "US Treasury Note"),
        "EUR" => spec("EUR", 125_000, "12.5", "Euro FX"),
        "GBP" => spec("GBP", 62_500, "6.25", "British Pound"),
        "JPY" => spec("JPY", 12_500_000, "12.5", "Japanese Yen"),
        _ => None,
    }
}

/// Contract month for a month code (F = January .. Z = December).
pub fn month_from_code(code: char) -> Option<u32> {
    match code {
        'F' => Some(1),
        'G' => Some(2),
        'H' => Some(3),
        'J' => Some(4),
        'K' => Some(5),
        'M' => Some(6),
        'N' => Some(7),
        'Q' => Some(8),
        'U' => Some(9),
        'V' => Some(10),
        'X' => Some(11),
        'Z' => Some(12),
        _ => None,
    }
}

/// Maps broker year codes onto calendar years.
///
/// A single digit lands in the epoch's decade (`5` -> 2025 for epoch 2020),
/// two digits in the epoch's century (`24` -> 2024).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuturesCalendar {
    pub epoch: i32,
}

impl FuturesCalendar {
    pub const DEFAULT_EPOCH: i32 = 2020;

    pub fn new(epoch: i32) -> Self {
        Self { epoch }
    }

    pub fn year_for(&self, code: &str) -> Option<i32> {
        let value: i32 = code.parse().ok()?;
        match code.len() {
            1 => Some(self.epoch - self.epoch.rem_euclid(10) + value),
            2 => Some(self.epoch - self.epoch.rem_euclid(100) + value),
            _ => None,
        }
    }
}

impl Default for FuturesCalendar {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EPOCH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuturesSymbol {
    pub root: String,
    pub month_code: char,
    pub year_code: String,
    pub year: i32,
    pub month: u32,
    /// First day of the contract month.
    pub expiry: NaiveDate,
}

impl FuturesSymbol {
    /// `ROOT + MONTH_CODE + YEAR_CODE`, exactly as parsed.
    pub fn code(&self) -> String {
        format!("{}{}{}", self.root, self.month_code, self.year_code)
    }
}

pub fn parse_futures_symbol(symbol: &str, calendar: &FuturesCalendar) -> Result<FuturesSymbol, SymbolError> {
    let unknown = || SymbolError::UnknownFormat {
        kind: "futures",
        symbol: symbol.to_string(),
    };

    let s = symbol.trim();
    if !s.is_ascii() {
        return Err(unknown());
    }
    let digits = s.bytes().rev().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&digits) {
        return Err(unknown());
    }

    let (head, year_code) = s.split_at(s.len() - digits);
    let month_code = head.chars().last().ok_or_else(unknown)?;
    let root = &head[..head.len() - 1];
    if root.is_empty() || !head.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(unknown());
    }

    let month = month_from_code(month_code).ok_or_else(unknown)?;
    let year = calendar.year_for(year_code).ok_or_else(unknown)?;
    let expiry = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(unknown)?;

    Ok(FuturesSymbol {
        root: root.to_string(),
        month_code,
        year_code: year_code.to_string(),
        year,
        month,
        expiry,
    })
}

pub fn futures_unique_symbol(parsed: &FuturesSymbol) -> String {
    format!("FUT:{}", parsed.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_digit_year() {
        let parsed = parse_futures_symbol("ESZ5", &FuturesCalendar::default()).unwrap();
        assert_eq!(parsed.root, "ES");
        assert_eq!(parsed.month_code, 'Z');
        assert_eq!(parsed.year, 2025);
        assert_eq!(parsed.expiry, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(futures_unique_symbol(&parsed), "FUT:ESZ5");
    }

    #[test]
    fn test_parse_two_digit_year_and_long_root() {
        let parsed = parse_futures_symbol("RTYH24", &FuturesCalendar::default()).unwrap();
        assert_eq!(parsed.root, "RTY");
        assert_eq!(parsed.month, 3);
        assert_eq!(parsed.year, 2024);
    }

    #[test]
    fn test_epoch_controls_year_mapping() {
        let calendar = FuturesCalendar::new(2030);
        assert_eq!(calendar.year_for("5"), Some(2035));
        assert_eq!(calendar.year_for("24"), Some(2024));

        let calendar = FuturesCalendar::new(2100);
        assert_eq!(calendar.year_for("3"), Some(2103));
        assert_eq!(calendar.year_for("03"), Some(2103));
    }

    #[test]
    fn test_rejects_malformed() {
        let calendar = FuturesCalendar::default();
        for raw in ["ES", "Z5", "ESA5", "ESZ123", "esz5", "ES Z5", "5"] {
            assert!(
                matches!(
                    parse_futures_symbol(raw, &calendar),
                    Err(SymbolError::UnknownFormat { .. })
                ),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_spec_table() {
        let es = futures_spec("ES").unwrap();
        assert_eq!(es.multiplier, Decimal::from_i64(50));
        assert_eq!(es.tick_value, Decimal::from_str_canonical("12.5").unwrap());
        assert_eq!(
            futures_spec("ZN").unwrap().tick_value,
            Decimal::from_str_canonical("15.625").unwrap()
        );
        assert!(futures_spec("XX").is_none());
    }
}
