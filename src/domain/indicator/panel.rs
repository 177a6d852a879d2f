//! Per-instrument indicator bundle.
//!
//! The strategy reads a fixed indicator set; computing it once up front keeps
//! the per-day evaluation loop free of repeated passes over the bar history.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::atr::DEFAULT_ATR_PERIOD;
use crate::domain::indicator::bollinger::{DEFAULT_BOLL_MULT_X100, DEFAULT_BOLL_PERIOD};
use crate::domain::indicator::divergence::DEFAULT_DIVERGENCE_LOOKBACK;
use crate::domain::indicator::macd::{macd_dif_line, DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::rsi::DEFAULT_RSI_PERIOD;
use crate::domain::indicator::{
    calculate_atr, calculate_atr_percent, calculate_bollinger, calculate_macd, calculate_rsi,
    calculate_sma, detect_top_divergence, IndicatorSeries,
};

pub const MA_SHORT_PERIOD: usize = 60;
pub const MA_LONG_PERIOD: usize = 120;

/// Indicator parameters the panel is computed with.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    pub atr_period: usize,
    pub rsi_period: usize,
    pub boll_period: usize,
    pub boll_mult_x100: u32,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub divergence_lookback: usize,
}

impl Default for PanelSpec {
    fn default() -> Self {
        PanelSpec {
            atr_period: DEFAULT_ATR_PERIOD,
            rsi_period: DEFAULT_RSI_PERIOD,
            boll_period: DEFAULT_BOLL_PERIOD,
            boll_mult_x100: DEFAULT_BOLL_MULT_X100,
            macd_fast: DEFAULT_FAST,
            macd_slow: DEFAULT_SLOW,
            macd_signal: DEFAULT_SIGNAL,
            divergence_lookback: DEFAULT_DIVERGENCE_LOOKBACK,
        }
    }
}

/// The fixed indicator set of one instrument, aligned with its bar sequence.
#[derive(Debug, Clone)]
pub struct IndicatorPanel {
    pub ma60: IndicatorSeries,
    pub ma120: IndicatorSeries,
    pub atr: IndicatorSeries,
    pub atr_percent: IndicatorSeries,
    pub rsi: IndicatorSeries,
    pub bollinger: IndicatorSeries,
    pub macd: IndicatorSeries,
    /// One flag per bar; true when the bar shows a MACD top divergence.
    pub top_divergence: Vec<bool>,
}

impl IndicatorPanel {
    pub fn compute(bars: &[PriceBar], spec: &PanelSpec) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let dif = macd_dif_line(bars, spec.macd_fast, spec.macd_slow);

        IndicatorPanel {
            ma60: calculate_sma(bars, MA_SHORT_PERIOD),
            ma120: calculate_sma(bars, MA_LONG_PERIOD),
            atr: calculate_atr(bars, spec.atr_period),
            atr_percent: calculate_atr_percent(bars, spec.atr_period),
            rsi: calculate_rsi(bars, spec.rsi_period),
            bollinger: calculate_bollinger(bars, spec.boll_period, spec.boll_mult_x100),
            macd: calculate_macd(bars, spec.macd_fast, spec.macd_slow, spec.macd_signal),
            top_divergence: detect_top_divergence(&closes, &dif, spec.divergence_lookback),
        }
    }

    /// Latest defined ATR% value, scanning back from the end.
    pub fn latest_atr_percent(&self) -> Option<f64> {
        (0..self.atr_percent.values.len())
            .rev()
            .find_map(|i| self.atr_percent.simple_at(i))
    }
}
