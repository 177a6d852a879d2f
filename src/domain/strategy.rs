//! Ladder strategy decision logic.
//!
//! Every rule here is a pure function of (history up to today, current
//! position state): no clocks, no I/O, no mutation. Both simulation modes
//! call these same functions, so there is exactly one copy of the business
//! rules.

use crate::domain::config::StrategyConfig;
use crate::domain::fundamentals::{is_index_fund, Fundamentals};
use crate::domain::instrument::{InstrumentData, MIN_HISTORY_BARS};
use crate::domain::ledger::PositionManager;
use std::fmt;

/// Bars required before the indicator-based exit has meaningful MACD input.
const MIN_DYNAMIC_EXIT_BARS: usize = 26;

/// Why an instrument failed qualification.
#[derive(Debug, Clone, PartialEq)]
pub enum Disqualification {
    InsufficientHistory { bars: usize },
    MissingFundamentals,
    PeOutOfRange { pe: Option<f64> },
    DividendTooLow { yield_pct: f64 },
    NoMarketCap,
    AtrUndefined,
    AtrTooLow { atr_percent: f64 },
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disqualification::InsufficientHistory { bars } => {
                write!(f, "only {} bars, need {}", bars, MIN_HISTORY_BARS)
            }
            Disqualification::MissingFundamentals => write!(f, "no fundamentals available"),
            Disqualification::PeOutOfRange { pe: Some(pe) } => {
                write!(f, "PE {:.2} out of range", pe)
            }
            Disqualification::PeOutOfRange { pe: None } => write!(f, "PE unavailable"),
            Disqualification::DividendTooLow { yield_pct } => {
                write!(f, "dividend yield {:.2}% too low", yield_pct)
            }
            Disqualification::NoMarketCap => write!(f, "market cap unavailable"),
            Disqualification::AtrUndefined => write!(f, "ATR% never defined"),
            Disqualification::AtrTooLow { atr_percent } => {
                write!(f, "ATR% {:.2} below floor", atr_percent)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    /// Entries always open layer 0.
    pub layer_index: usize,
    /// MA120 on the entry bar, to be captured as the cycle's entry reference.
    pub reference: f64,
    pub fund_fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddSignal {
    pub layer_index: usize,
    pub fund_fraction: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitKind {
    /// Liquidate every open layer in one operation.
    FullClear,
    /// Close only the listed layers.
    Layers(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub kind: ExitKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LadderStrategy {
    config: StrategyConfig,
}

impl LadderStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Universe qualification. Index-fund-like instruments skip the
    /// fundamental checks; everything needs enough history and a live ATR%.
    pub fn qualify(
        &self,
        data: &InstrumentData,
        fundamentals: Option<&Fundamentals>,
    ) -> Result<(), Disqualification> {
        if data.bar_count() < MIN_HISTORY_BARS {
            return Err(Disqualification::InsufficientHistory {
                bars: data.bar_count(),
            });
        }

        if !is_index_fund(&data.code) {
            let fund = fundamentals.ok_or(Disqualification::MissingFundamentals)?;

            match fund.pe_ttm {
                Some(pe) if pe > 0.0 && pe <= self.config.pe_max => {}
                other => return Err(Disqualification::PeOutOfRange { pe: other }),
            }

            let yield_pct = fund.dividend_yield.unwrap_or(0.0);
            if yield_pct < self.config.dividend_yield_min {
                return Err(Disqualification::DividendTooLow { yield_pct });
            }

            if fund.market_cap.unwrap_or(0.0) <= 0.0 {
                return Err(Disqualification::NoMarketCap);
            }
        }

        let atr_percent = data
            .panel
            .latest_atr_percent()
            .ok_or(Disqualification::AtrUndefined)?;
        if atr_percent < self.config.atr_min_percent {
            return Err(Disqualification::AtrTooLow { atr_percent });
        }

        Ok(())
    }

    /// First entry of a position cycle: only when flat, only with a defined
    /// MA120, when close dips to the entry threshold.
    pub fn entry_signal(
        &self,
        data: &InstrumentData,
        idx: usize,
        manager: Option<&PositionManager>,
    ) -> Option<EntrySignal> {
        if manager.is_some_and(|pm| !pm.is_empty()) {
            return None;
        }
        if idx + 1 < MIN_HISTORY_BARS {
            return None;
        }

        let ma120 = data.panel.ma120.simple_at(idx)?;
        let close = data.close_at(idx);

        if close <= ma120 * self.config.entry_threshold {
            Some(EntrySignal {
                layer_index: 0,
                reference: ma120,
                fund_fraction: self.config.ladder[0].fund_fraction,
            })
        } else {
            None
        }
    }

    /// Ladder-down adds: every configured level not yet open whose threshold
    /// (entry reference x ratio) the close has reached. Level 0 belongs to
    /// the entry and is never re-signalled.
    pub fn add_signals(
        &self,
        data: &InstrumentData,
        idx: usize,
        manager: &PositionManager,
    ) -> Vec<AddSignal> {
        let Some(reference) = manager.entry_reference else {
            return Vec::new();
        };
        if manager.is_empty() {
            return Vec::new();
        }

        let close = data.close_at(idx);
        self.config
            .ladder
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(i, level)| !manager.has_layer(*i) && close <= reference * level.ratio)
            .map(|(i, level)| AddSignal {
                layer_index: i,
                fund_fraction: level.fund_fraction,
            })
            .collect()
    }

    /// Exit evaluation in strict precedence; the first matching rule wins
    /// for the bar.
    pub fn exit_signal(
        &self,
        data: &InstrumentData,
        idx: usize,
        manager: &PositionManager,
    ) -> Option<ExitSignal> {
        if manager.is_empty() {
            return None;
        }

        let close = data.close_at(idx);

        // 1. forced clear above MA120
        if self.config.enable_full_clear {
            if let Some(ma120) = data.panel.ma120.simple_at(idx) {
                if close >= ma120 * self.config.full_clear_multiplier {
                    let pct = (self.config.full_clear_multiplier * 100.0).round() as i64;
                    return Some(ExitSignal {
                        kind: ExitKind::FullClear,
                        reason: format!("forced clear (>{}% of MA120)", pct),
                    });
                }
            }
        }

        // 2. indicator exit: upper band plus at least one overheat signal
        if let Some(dynamic) = &self.config.dynamic_exit {
            if idx + 1 >= MIN_DYNAMIC_EXIT_BARS {
                let at_upper = data
                    .panel
                    .bollinger
                    .bollinger_at(idx)
                    .is_some_and(|(upper, _, _)| close >= upper);

                if at_upper {
                    let mut parts = Vec::new();

                    if let Some(rsi) = data.panel.rsi.simple_at(idx) {
                        if rsi >= dynamic.rsi_overbought {
                            parts.push(format!("RSI={:.0}", rsi));
                        }
                    }
                    if data.panel.top_divergence.get(idx).copied().unwrap_or(false) {
                        parts.push("MACD divergence".to_string());
                    }
                    let hist_flip = idx > 0
                        && matches!(
                            (
                                data.panel.macd.macd_at(idx - 1),
                                data.panel.macd.macd_at(idx),
                            ),
                            (Some((_, _, prev)), Some((_, _, today))) if prev > 0.0 && today <= 0.0
                        );
                    if hist_flip {
                        parts.push("MACD histogram flip".to_string());
                    }

                    if !parts.is_empty() {
                        return Some(ExitSignal {
                            kind: ExitKind::FullClear,
                            reason: format!("dynamic exit (upper band+{})", parts.join("+")),
                        });
                    }
                }
            }
        }

        // 3. per-layer take-profit
        let mut layers: Vec<usize> = manager
            .layers
            .iter()
            .filter(|l| l.profit_rate(close) >= l.target_profit_rate)
            .map(|l| l.layer_index)
            .collect();
        if !layers.is_empty() {
            layers.sort_unstable();
            let pct = (self.config.single_layer_profit * 100.0).round() as i64;
            return Some(ExitSignal {
                kind: ExitKind::Layers(layers),
                reason: format!("layer take-profit ({}%)", pct),
            });
        }

        None
    }

    /// Currency amount to commit at one rung: the fund fraction of the
    /// available capital, floored at one board lot plus fee headroom so a
    /// tiny fraction cannot starve the order below a single lot.
    pub fn position_amount(&self, available: f64, fund_fraction: f64, price: f64) -> f64 {
        let target = available * fund_fraction;
        let min_amount = price * self.config.board_lot as f64 * 1.01;
        target.max(min_amount)
    }
}
