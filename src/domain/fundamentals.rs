//! Fundamentals snapshot and instrument-code handling.

use std::collections::HashMap;

/// One fundamentals row, keyed by normalized code. Missing values are kept
/// as `None`; the qualification rules decide what that means per instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Fundamentals {
    pub code: String,
    pub name: String,
    pub pe_ttm: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub latest_price: Option<f64>,
}

pub type FundamentalsTable = HashMap<String, Fundamentals>;

/// Normalize an instrument code to its canonical 6-digit form: keep digits,
/// take the last six, left-pad with zeros otherwise.
pub fn normalize_code(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 6 {
        digits[digits.len() - 6..].to_string()
    } else {
        format!("{:0>6}", digits)
    }
}

/// Exchange-traded funds and LOFs are exempt from fundamental screening;
/// PE and dividend yield are not meaningful for them.
///
/// Shanghai ETFs use 5xxxxx, Shenzhen ETFs 159xxx, Shenzhen LOFs 16xxxx.
pub fn is_index_fund(code: &str) -> bool {
    let code = normalize_code(code);
    code.starts_with('5') || code.starts_with("159") || code.starts_with("16")
}
