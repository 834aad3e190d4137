//! Equity ticker normalization.

/// Venue suffixes brokers append to tickers.
const VENUE_SUFFIXES: [&str; 4] = [".US", ".N", ".O", ".A"];

/// Trim, uppercase and drop one trailing venue suffix: `tsla.us` -> `TSLA`.
pub fn normalize_equity_symbol(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    for suffix in VENUE_SUFFIXES {
        if let Some(stripped) = upper.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    upper
}

pub fn equity_unique_symbol(normalized: &str) -> String {
    format!("EQ:{}", normalized)
}
