//! Technical indicator implementations.
//!
//! Every indicator produces an [`IndicatorSeries`] aligned 1:1 with the input
//! bar sequence. Warm-up bars (the first window-1 entries, or more for
//! composite indicators) are present but flagged `valid: false`; accessors
//! translate them into `None` so callers never read a half-computed value.

pub mod atr;
pub mod bollinger;
pub mod divergence;
pub mod ema;
pub mod macd;
pub mod panel;
pub mod rsi;
pub mod sma;

pub use atr::{calculate_atr, calculate_atr_percent};
pub use bollinger::calculate_bollinger;
pub use divergence::{detect_top_divergence, TopDivergence};
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use panel::IndicatorPanel;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd { dif: f64, dea: f64, histogram: f64 },
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Atr(usize),
    AtrPercent(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Scalar value at `idx`, or `None` during warm-up / out of range.
    pub fn simple_at(&self, idx: usize) -> Option<f64> {
        match self.values.get(idx) {
            Some(p) if p.valid => match p.value {
                IndicatorValue::Simple(v) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// (dif, dea, histogram) at `idx`, or `None` during warm-up.
    pub fn macd_at(&self, idx: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(idx) {
            Some(p) if p.valid => match p.value {
                IndicatorValue::Macd {
                    dif,
                    dea,
                    histogram,
                } => Some((dif, dea, histogram)),
                _ => None,
            },
            _ => None,
        }
    }

    /// (upper, middle, lower) at `idx`, or `None` during warm-up.
    pub fn bollinger_at(&self, idx: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(idx) {
            Some(p) if p.valid => match p.value {
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } => Some((upper, middle, lower)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "MA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::AtrPercent(period) => write!(f, "ATR%({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLL({},{})", period, mult)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::NaiveDate;
    use crate::domain::bar::PriceBar;

    /// Flat-range bars from a close series, one calendar day apart.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
                amount: close * 1_000.0,
            })
            .collect()
    }
}
