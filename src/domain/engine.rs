//! Simulation driver: runs the ladder strategy over the trading calendar.
//!
//! Two execution modes share one copy of the decision logic:
//!
//! * shared-capital: a single serial loop over the calendar; all
//!   instruments draw on one cash pool and compete for a capped number of
//!   concurrent positions. Entry candidates are scanned in universe order,
//!   which decides who claims the limited slots.
//! * independent: every instrument is simulated against its own isolated
//!   ledger; sub-runs have no shared mutable state and execute in parallel,
//!   logs are merged afterwards.
//!
//! Within one instrument bars are always processed chronologically; each
//! day evaluates exits, then adds, then entries. A position opened today is
//! therefore never laddered down on the same bar.

use crate::domain::config::{SimulationConfig, SimulationMode};
use crate::domain::error::LadderError;
use crate::domain::fundamentals::FundamentalsTable;
use crate::domain::instrument::{build_trading_calendar, InstrumentData};
use crate::domain::ledger::{
    CostModel, Ledger, PositionManager, SellTarget, SnapshotRecord, TradeAction, TradeContext,
    TradeRecord,
};
use crate::domain::strategy::{ExitKind, LadderStrategy};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cooperative cancellation flag, checked between trading days (shared mode)
/// or between instrument sub-runs (independent mode). There is no mid-day
/// cancellation point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Observational progress callback: (percent 0-100, message). The
/// simulation phase occupies the 40-80 band; data preparation and analytics
/// report below and above it.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + Sync);

pub const PROGRESS_SIM_START: u8 = 40;
pub const PROGRESS_SIM_END: u8 = 80;

/// Map `step`/`total` into the [lo, hi] progress band.
pub fn rebase_progress(lo: u8, hi: u8, step: usize, total: usize) -> u8 {
    if total == 0 {
        return hi;
    }
    let span = (hi - lo) as f64;
    lo + (span * step as f64 / total as f64) as u8
}

/// Everything a run produces before analytics.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trades: Vec<TradeRecord>,
    pub snapshots: Vec<SnapshotRecord>,
    /// Positions still open at the last simulated date.
    pub open_positions: HashMap<String, PositionManager>,
}

pub struct SimulationEngine {
    strategy: LadderStrategy,
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(strategy: LadderStrategy, config: SimulationConfig) -> Self {
        Self { strategy, config }
    }

    fn cost_model(&self) -> CostModel {
        let cfg = self.strategy.config();
        CostModel {
            commission_rate: cfg.commission_rate,
            stamp_tax_rate: cfg.stamp_tax_rate,
            board_lot: cfg.board_lot,
        }
    }

    /// Run the configured mode over the qualified universe.
    ///
    /// `instruments` order is significant in shared-capital mode: it is the
    /// entry-candidate scan order.
    pub fn run(
        &self,
        instruments: &[InstrumentData],
        fundamentals: &FundamentalsTable,
        benchmark: &BTreeMap<NaiveDate, f64>,
        progress: Option<ProgressFn<'_>>,
        cancel: &CancelToken,
    ) -> Result<SimulationResult, LadderError> {
        if instruments.is_empty() {
            return Err(LadderError::EmptyUniverse);
        }

        let mut result = match self.config.mode {
            SimulationMode::SharedCapital => {
                self.run_shared(instruments, fundamentals, benchmark, progress, cancel)?
            }
            SimulationMode::Independent => {
                self.run_independent(instruments, fundamentals, benchmark, progress, cancel)?
            }
        };

        let final_closes: HashMap<String, f64> = instruments
            .iter()
            .filter_map(|inst| inst.last_close().map(|c| (inst.code.clone(), c)))
            .collect();
        finalize_unrealized(&mut result.trades, &final_closes);

        Ok(result)
    }

    fn run_shared(
        &self,
        instruments: &[InstrumentData],
        fundamentals: &FundamentalsTable,
        benchmark: &BTreeMap<NaiveDate, f64>,
        progress: Option<ProgressFn<'_>>,
        cancel: &CancelToken,
    ) -> Result<SimulationResult, LadderError> {
        let calendar: Vec<NaiveDate> = build_trading_calendar(instruments)
            .into_iter()
            .filter(|d| *d >= self.config.start_date && *d <= self.config.end_date)
            .collect();
        let total_days = calendar.len();

        let by_code: HashMap<&str, &InstrumentData> = instruments
            .iter()
            .map(|inst| (inst.code.as_str(), inst))
            .collect();

        let mut ledger = Ledger::new(self.config.initial_capital, self.cost_model());
        // carried-forward closes for mark-to-market on days an instrument
        // does not trade
        let mut latest_close: HashMap<String, f64> = HashMap::new();

        for (day_idx, &date) in calendar.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(LadderError::Cancelled);
            }

            // (a) today's bar index per instrument
            let mut today: HashMap<&str, usize> = HashMap::new();
            for inst in instruments {
                if let Some(idx) = inst.bar_index(date) {
                    latest_close.insert(inst.code.clone(), inst.close_at(idx));
                    today.insert(inst.code.as_str(), idx);
                }
            }

            let index_level = benchmark.get(&date).copied();

            // (b) exits for open positions
            for code in ledger.open_codes() {
                let (Some(inst), Some(&idx)) =
                    (by_code.get(code.as_str()), today.get(code.as_str()))
                else {
                    continue;
                };
                let Some(exit) = ledger
                    .manager(&code)
                    .and_then(|pm| self.strategy.exit_signal(inst, idx, pm))
                else {
                    continue;
                };

                let context = trade_context(inst, idx, index_level, fundamentals);
                debug!(code = %code, %date, reason = %exit.reason, "exit");
                match exit.kind {
                    ExitKind::FullClear => {
                        ledger.sell(
                            &code,
                            date,
                            inst.close_at(idx),
                            SellTarget::All,
                            &exit.reason,
                            context,
                        );
                    }
                    ExitKind::Layers(layers) => {
                        for layer_index in layers {
                            ledger.sell(
                                &code,
                                date,
                                inst.close_at(idx),
                                SellTarget::Layer(layer_index),
                                &exit.reason,
                                context.clone(),
                            );
                        }
                    }
                }
            }

            // (c) ladder adds for instruments still holding
            for code in ledger.open_codes() {
                let (Some(inst), Some(&idx)) =
                    (by_code.get(code.as_str()), today.get(code.as_str()))
                else {
                    continue;
                };
                let signals = match ledger.manager(&code) {
                    Some(pm) => self.strategy.add_signals(inst, idx, pm),
                    None => continue,
                };

                for signal in signals {
                    let price = inst.close_at(idx);
                    let amount = self.strategy.position_amount(
                        self.config.per_instrument_capital,
                        signal.fund_fraction,
                        price,
                    );
                    let context = trade_context(inst, idx, index_level, fundamentals);
                    ledger.buy(
                        &code,
                        &inst.name,
                        date,
                        price,
                        amount,
                        signal.layer_index,
                        None,
                        self.strategy.config().single_layer_profit,
                        context,
                    );
                }
            }

            // (d) entries while slots remain, in universe order
            if ledger.position_count() < self.config.max_positions {
                for inst in instruments {
                    if ledger.has_position(&inst.code) {
                        continue;
                    }
                    let Some(&idx) = today.get(inst.code.as_str()) else {
                        continue;
                    };
                    let Some(signal) = self.strategy.entry_signal(inst, idx, None) else {
                        continue;
                    };

                    let price = inst.close_at(idx);
                    let amount = self.strategy.position_amount(
                        self.config.per_instrument_capital,
                        signal.fund_fraction,
                        price,
                    );
                    let context = trade_context(inst, idx, index_level, fundamentals);
                    let outcome = ledger.buy(
                        &inst.code,
                        &inst.name,
                        date,
                        price,
                        amount,
                        signal.layer_index,
                        Some(signal.reference),
                        self.strategy.config().single_layer_profit,
                        context,
                    );

                    if outcome.is_filled() {
                        debug!(code = %inst.code, %date, "entry");
                        if ledger.position_count() >= self.config.max_positions {
                            break;
                        }
                    }
                }
            }

            // (e) one ledger-wide snapshot
            ledger.record_snapshot(date, &latest_close, index_level);

            if let Some(report) = progress {
                if day_idx % 5 == 0 || day_idx + 1 == total_days {
                    let percent = rebase_progress(
                        PROGRESS_SIM_START,
                        PROGRESS_SIM_END,
                        day_idx + 1,
                        total_days,
                    );
                    report(percent, &format!("simulating {} ({}/{})", date, day_idx + 1, total_days));
                }
            }
        }

        Ok(SimulationResult {
            trades: ledger.trades,
            snapshots: ledger.snapshots,
            open_positions: ledger.positions,
        })
    }

    fn run_independent(
        &self,
        instruments: &[InstrumentData],
        fundamentals: &FundamentalsTable,
        benchmark: &BTreeMap<NaiveDate, f64>,
        progress: Option<ProgressFn<'_>>,
        cancel: &CancelToken,
    ) -> Result<SimulationResult, LadderError> {
        let total = instruments.len();
        let completed = AtomicUsize::new(0);

        // one isolated ledger per instrument; no locking, results merged
        // only after every worker is done
        let sub_results: Vec<Result<Ledger, LadderError>> = instruments
            .par_iter()
            .map(|inst| {
                if cancel.is_cancelled() {
                    return Err(LadderError::Cancelled);
                }
                let ledger = self.run_single(inst, fundamentals, benchmark);

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(report) = progress {
                    let percent =
                        rebase_progress(PROGRESS_SIM_START, PROGRESS_SIM_END, done, total);
                    report(percent, &format!("simulated {}/{} instruments", done, total));
                }
                Ok(ledger)
            })
            .collect();

        let mut trades = Vec::new();
        let mut snapshots = Vec::new();
        let mut open_positions = HashMap::new();
        for sub in sub_results {
            let ledger = sub?;
            trades.extend(ledger.trades);
            snapshots.extend(ledger.snapshots);
            open_positions.extend(ledger.positions);
        }
        // stable by-date sort keeps input order within one date
        snapshots.sort_by_key(|s| s.date);

        Ok(SimulationResult {
            trades,
            snapshots,
            open_positions,
        })
    }

    /// One instrument against its own endowment, chronologically over its
    /// own bars. Same per-day ordering as the shared loop: exit, add, entry.
    fn run_single(
        &self,
        inst: &InstrumentData,
        fundamentals: &FundamentalsTable,
        benchmark: &BTreeMap<NaiveDate, f64>,
    ) -> Ledger {
        let mut ledger = Ledger::new(self.config.per_instrument_capital, self.cost_model());
        let mut prices: HashMap<String, f64> = HashMap::new();

        for idx in 0..inst.bar_count() {
            let date = inst.bars[idx].date;
            if date < self.config.start_date || date > self.config.end_date {
                continue;
            }
            let price = inst.close_at(idx);
            prices.insert(inst.code.clone(), price);
            let index_level = benchmark.get(&date).copied();

            if let Some(exit) = ledger
                .manager(&inst.code)
                .and_then(|pm| self.strategy.exit_signal(inst, idx, pm))
            {
                let context = trade_context(inst, idx, index_level, fundamentals);
                match exit.kind {
                    ExitKind::FullClear => {
                        ledger.sell(
                            &inst.code,
                            date,
                            price,
                            SellTarget::All,
                            &exit.reason,
                            context,
                        );
                    }
                    ExitKind::Layers(layers) => {
                        for layer_index in layers {
                            ledger.sell(
                                &inst.code,
                                date,
                                price,
                                SellTarget::Layer(layer_index),
                                &exit.reason,
                                context.clone(),
                            );
                        }
                    }
                }
            }

            let add_signals = match ledger.manager(&inst.code) {
                Some(pm) => self.strategy.add_signals(inst, idx, pm),
                None => Vec::new(),
            };
            for signal in add_signals {
                let amount = self.strategy.position_amount(
                    self.config.per_instrument_capital,
                    signal.fund_fraction,
                    price,
                );
                let context = trade_context(inst, idx, index_level, fundamentals);
                ledger.buy(
                    &inst.code,
                    &inst.name,
                    date,
                    price,
                    amount,
                    signal.layer_index,
                    None,
                    self.strategy.config().single_layer_profit,
                    context,
                );
            }

            if !ledger.has_position(&inst.code) {
                if let Some(signal) = self.strategy.entry_signal(inst, idx, None) {
                    let amount = self.strategy.position_amount(
                        self.config.per_instrument_capital,
                        signal.fund_fraction,
                        price,
                    );
                    let context = trade_context(inst, idx, index_level, fundamentals);
                    ledger.buy(
                        &inst.code,
                        &inst.name,
                        date,
                        price,
                        amount,
                        signal.layer_index,
                        Some(signal.reference),
                        self.strategy.config().single_layer_profit,
                        context,
                    );
                }
            }

            ledger.record_snapshot(date, &prices, index_level);
        }

        ledger
    }
}

/// Diagnostics recorded with every trade.
fn trade_context(
    inst: &InstrumentData,
    idx: usize,
    index_level: Option<f64>,
    fundamentals: &FundamentalsTable,
) -> TradeContext {
    let close = inst.close_at(idx);
    let ma120 = inst.panel.ma120.simple_at(idx);

    TradeContext {
        index_level,
        ma120,
        ma120_deviation_pct: ma120.map(|ma| (close / ma - 1.0) * 100.0),
        atr_percent: inst.panel.atr_percent.simple_at(idx),
        volume_ratio: inst.volume_ratio_at(idx),
        dividend_yield: fundamentals
            .get(&inst.code)
            .and_then(|f| f.dividend_yield),
    }
}

/// Fill in unrealized P&L for buys that never got a matching sell. A sell
/// matches its buy on (code, entry date, layer index). Positions stay open;
/// the numbers are informational only.
fn finalize_unrealized(trades: &mut [TradeRecord], final_closes: &HashMap<String, f64>) {
    let sold: HashSet<(String, NaiveDate, usize)> = trades
        .iter()
        .filter(|t| t.action.is_sell())
        .filter_map(|t| t.entry_date.map(|d| (t.code.clone(), d, t.layer_index)))
        .collect();

    for trade in trades.iter_mut() {
        if trade.action != TradeAction::Buy {
            continue;
        }
        if sold.contains(&(trade.code.clone(), trade.date, trade.layer_index)) {
            continue;
        }
        if let Some(&price) = final_closes.get(&trade.code) {
            trade.unrealized = Some(crate::domain::ledger::UnrealizedPnl {
                price,
                profit_amount: (price - trade.price) * trade.shares as f64,
                profit_rate: (price - trade.price) / trade.price,
            });
        }
    }
}
