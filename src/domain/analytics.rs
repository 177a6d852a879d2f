//! Post-run analytics: per-instrument summaries and the overall roll-up.
//!
//! All figures here stay numeric; rendering percentages and money into
//! display strings belongs to the report boundary.

use crate::domain::engine::{rebase_progress, ProgressFn, PROGRESS_SIM_END};
use crate::domain::instrument::InstrumentData;
use crate::domain::ledger::{SnapshotRecord, TradeRecord};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::warn;

const PROGRESS_ANALYTICS_END: u8 = 100;

/// Per-instrument performance over the run. A row exists for every
/// instrument in the universe, traded or not.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSummary {
    pub code: String,
    pub name: String,
    /// Closed (sell) trades.
    pub completed_trades: usize,
    /// Layers still open at the end of the run.
    pub open_layers: usize,
    pub win_rate: f64,
    /// Mean winning profit over mean absolute losing profit; 0 without losses.
    pub profit_loss_ratio: f64,
    pub avg_holding_days: f64,
    pub win_holding_days: f64,
    pub avg_profit_per_trade: f64,
    /// Realized P&L over total buy cost.
    pub return_on_deployed: f64,
    /// Peak-to-trough close drawdown inside the instrument's own holding
    /// window (first trade to last trade); zero or negative.
    pub max_drawdown: f64,
    pub mean_atr_percent: f64,
}

impl InstrumentSummary {
    fn empty(code: &str, name: &str) -> Self {
        InstrumentSummary {
            code: code.to_string(),
            name: name.to_string(),
            completed_trades: 0,
            open_layers: 0,
            win_rate: 0.0,
            profit_loss_ratio: 0.0,
            avg_holding_days: 0.0,
            win_holding_days: 0.0,
            avg_profit_per_trade: 0.0,
            return_on_deployed: 0.0,
            max_drawdown: 0.0,
            mean_atr_percent: 0.0,
        }
    }
}

/// Universe-wide aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallSummary {
    /// Largest mark-to-market stock exposure across snapshots.
    pub max_exposure: f64,
    pub avg_exposure: f64,
    pub total_completed: usize,
    pub total_uncompleted: usize,
    /// completed / (completed + uncompleted); 1 when nothing traded.
    pub completion_rate: f64,
    pub avg_return: f64,
    pub avg_drawdown: f64,
    pub avg_holding_days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub per_instrument: Vec<InstrumentSummary>,
    pub overall: OverallSummary,
}

/// Aggregate the trade and snapshot logs. One bad instrument never aborts
/// the pass: its row degrades to zeros with a logged warning so the
/// universe-wide table stays complete.
pub fn analyze(
    trades: &[TradeRecord],
    snapshots: &[SnapshotRecord],
    open_layers: &HashMap<String, usize>,
    instruments: &[InstrumentData],
    progress: Option<ProgressFn<'_>>,
) -> AnalyticsReport {
    let mut grouped: HashMap<&str, Vec<&TradeRecord>> = HashMap::new();
    for trade in trades {
        grouped.entry(trade.code.as_str()).or_default().push(trade);
    }

    let total = instruments.len();
    let mut per_instrument = Vec::with_capacity(total);
    for (i, inst) in instruments.iter().enumerate() {
        let inst_trades: &[&TradeRecord] = grouped
            .get(inst.code.as_str())
            .map_or(&[], |v| v.as_slice());
        let open = open_layers.get(&inst.code).copied().unwrap_or(0);

        let summary = match analyze_instrument(inst, inst_trades, open) {
            Ok(summary) => summary,
            Err(reason) => {
                warn!(code = %inst.code, %reason, "analysis failed, emitting empty row");
                let mut row = InstrumentSummary::empty(&inst.code, &inst.name);
                row.open_layers = open;
                row
            }
        };
        per_instrument.push(summary);

        if let Some(report) = progress {
            let percent = rebase_progress(PROGRESS_SIM_END, PROGRESS_ANALYTICS_END, i + 1, total);
            report(percent, &format!("analyzing {} ({}/{})", inst.code, i + 1, total));
        }
    }

    let overall = overall_summary(&per_instrument, snapshots);

    AnalyticsReport {
        per_instrument,
        overall,
    }
}

fn analyze_instrument(
    inst: &InstrumentData,
    trades: &[&TradeRecord],
    open_layers: usize,
) -> Result<InstrumentSummary, String> {
    let buys: Vec<&&TradeRecord> = trades.iter().filter(|t| !t.action.is_sell()).collect();
    let sells: Vec<&&TradeRecord> = trades.iter().filter(|t| t.action.is_sell()).collect();

    let completed = sells.len();

    let mut wins = 0usize;
    let mut win_profit_sum = 0.0;
    let mut loss_sum = 0.0;
    let mut losses = 0usize;
    let mut profit_sum = 0.0;
    let mut holding_sum = 0.0;
    let mut holding_count = 0usize;
    let mut win_holding_sum = 0.0;
    let mut win_holding_count = 0usize;

    for sell in &sells {
        let profit = sell.profit_amount.unwrap_or(0.0);
        profit_sum += profit;
        if profit > 0.0 {
            wins += 1;
            win_profit_sum += profit;
        } else if profit < 0.0 {
            losses += 1;
            loss_sum += profit.abs();
        }

        if let Some(days) = sell.holding_days {
            holding_sum += days as f64;
            holding_count += 1;
            if profit > 0.0 {
                win_holding_sum += days as f64;
                win_holding_count += 1;
            }
        }
    }

    let win_rate = if completed > 0 {
        wins as f64 / completed as f64
    } else {
        0.0
    };

    let avg_win = if wins > 0 {
        win_profit_sum / wins as f64
    } else {
        0.0
    };
    let avg_loss = if losses > 0 { loss_sum / losses as f64 } else { 0.0 };
    let profit_loss_ratio = if avg_loss > 0.0 { avg_win / avg_loss } else { 0.0 };

    let total_buy_cost: f64 = buys.iter().map(|t| t.amount).sum();
    let return_on_deployed = if total_buy_cost > 0.0 {
        profit_sum / total_buy_cost
    } else {
        0.0
    };

    let max_drawdown = holding_window_drawdown(inst, trades)?;

    let mean_atr_percent = {
        let defined: Vec<f64> = (0..inst.bar_count())
            .filter_map(|i| inst.panel.atr_percent.simple_at(i))
            .collect();
        if defined.is_empty() {
            0.0
        } else {
            defined.iter().sum::<f64>() / defined.len() as f64
        }
    };

    Ok(InstrumentSummary {
        code: inst.code.clone(),
        name: inst.name.clone(),
        completed_trades: completed,
        open_layers,
        win_rate,
        profit_loss_ratio,
        avg_holding_days: if holding_count > 0 {
            holding_sum / holding_count as f64
        } else {
            0.0
        },
        win_holding_days: if win_holding_count > 0 {
            win_holding_sum / win_holding_count as f64
        } else {
            0.0
        },
        avg_profit_per_trade: if completed > 0 {
            profit_sum / completed as f64
        } else {
            0.0
        },
        return_on_deployed,
        max_drawdown,
        mean_atr_percent,
    })
}

/// Close-price drawdown restricted to the instrument's holding window: the
/// span from its first trade to its last. Instruments that never traded
/// have no window and report zero.
fn holding_window_drawdown(
    inst: &InstrumentData,
    trades: &[&TradeRecord],
) -> Result<f64, String> {
    let dates: Vec<NaiveDate> = trades.iter().map(|t| t.date).collect();
    let (Some(&start), Some(&end)) = (dates.iter().min(), dates.iter().max()) else {
        return Ok(0.0);
    };

    let closes: Vec<f64> = inst
        .bars
        .iter()
        .filter(|b| b.date >= start && b.date <= end)
        .map(|b| b.close)
        .collect();
    if closes.is_empty() {
        return Err(format!(
            "no bars inside holding window {}..{}",
            start, end
        ));
    }

    let mut peak = closes[0];
    let mut max_dd = 0.0f64;
    for &price in &closes {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let dd = (price - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    Ok(max_dd)
}

fn overall_summary(rows: &[InstrumentSummary], snapshots: &[SnapshotRecord]) -> OverallSummary {
    let (max_exposure, avg_exposure) = if snapshots.is_empty() {
        (0.0, 0.0)
    } else {
        let max = snapshots
            .iter()
            .map(|s| s.stock_value)
            .fold(f64::NEG_INFINITY, f64::max);
        let avg = snapshots.iter().map(|s| s.stock_value).sum::<f64>() / snapshots.len() as f64;
        (max, avg)
    };

    let total_completed: usize = rows.iter().map(|r| r.completed_trades).sum();
    let total_uncompleted: usize = rows.iter().map(|r| r.open_layers).sum();
    let total = total_completed + total_uncompleted;
    let completion_rate = if total > 0 {
        total_completed as f64 / total as f64
    } else {
        1.0
    };

    let n = rows.len() as f64;
    let (avg_return, avg_drawdown, avg_holding_days) = if rows.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            rows.iter().map(|r| r.return_on_deployed).sum::<f64>() / n,
            rows.iter().map(|r| r.max_drawdown).sum::<f64>() / n,
            rows.iter().map(|r| r.avg_holding_days).sum::<f64>() / n,
        )
    };

    OverallSummary {
        max_exposure,
        avg_exposure,
        total_completed,
        total_uncompleted,
        completion_rate,
        avg_return,
        avg_drawdown,
        avg_holding_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::PriceBar;
    use crate::domain::indicator::panel::PanelSpec;
    use crate::domain::ledger::{TradeAction, TradeContext};
    use std::collections::BTreeMap;

    fn make_instrument(code: &str, closes: &[f64]) -> InstrumentData {
        let bars: Vec<PriceBar> = closes
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
            .collect();
        InstrumentData::new(code.to_string(), code.to_string(), bars, &PanelSpec::default())
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn buy(code: &str, offset: i64, price: f64, shares: u64) -> TradeRecord {
        TradeRecord {
            action: TradeAction::Buy,
            date: day(offset),
            code: code.to_string(),
            name: code.to_string(),
            price,
            shares,
            amount: price * shares as f64,
            commission: 0.0,
            stamp_tax: 0.0,
            layer_index: 0,
            target_price: Some(price * 1.12),
            entry_date: None,
            entry_price: None,
            profit_rate: None,
            profit_amount: None,
            holding_days: None,
            reason: None,
            cumulative_pnl: 0.0,
            context: TradeContext::default(),
            unrealized: None,
        }
    }

    fn sell(code: &str, offset: i64, price: f64, shares: u64, profit: f64, held: i64) -> TradeRecord {
        TradeRecord {
            action: TradeAction::SellLayer,
            date: day(offset),
            code: code.to_string(),
            name: code.to_string(),
            price,
            shares,
            amount: price * shares as f64,
            commission: 0.0,
            stamp_tax: 0.0,
            layer_index: 0,
            target_price: None,
            entry_date: Some(day(offset - held)),
            entry_price: Some(price - profit / shares as f64),
            profit_rate: Some(profit / (price * shares as f64 - profit)),
            profit_amount: Some(profit),
            holding_days: Some(held),
            reason: Some("layer take-profit (12%)".to_string()),
            cumulative_pnl: profit,
            context: TradeContext::default(),
            unrealized: None,
        }
    }

    #[test]
    fn drawdown_on_synthetic_window() {
        // the canonical 5-bar window: [100, 110, 90, 95, 105]
        let inst = make_instrument("600519", &[100.0, 110.0, 90.0, 95.0, 105.0]);
        let trades = [buy("600519", 0, 100.0, 100), sell("600519", 4, 105.0, 100, 500.0, 4)];
        let refs: Vec<&TradeRecord> = trades.iter().collect();

        let dd = holding_window_drawdown(&inst, &refs).unwrap();
        assert!((dd - (90.0 - 110.0) / 110.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_window_excludes_outside_bars() {
        // a deep crash before the first trade must not count
        let inst = make_instrument("600519", &[100.0, 40.0, 100.0, 110.0, 105.0]);
        let trades = [buy("600519", 2, 100.0, 100), sell("600519", 4, 105.0, 100, 500.0, 2)];
        let refs: Vec<&TradeRecord> = trades.iter().collect();

        let dd = holding_window_drawdown(&inst, &refs).unwrap();
        assert!((dd - (105.0 - 110.0) / 110.0).abs() < 1e-9);
    }

    #[test]
    fn untraded_instrument_has_zero_drawdown() {
        let inst = make_instrument("600519", &[100.0, 50.0, 100.0]);
        let dd = holding_window_drawdown(&inst, &[]).unwrap();
        assert_eq!(dd, 0.0);
    }

    #[test]
    fn per_instrument_stats() {
        let inst = make_instrument("600519", &vec![100.0; 30]);
        let trades = vec![
            buy("600519", 0, 100.0, 100),
            buy("600519", 1, 90.0, 100),
            sell("600519", 10, 110.0, 100, 1_000.0, 10),
            sell("600519", 12, 85.0, 100, -500.0, 11),
        ];
        let snapshots: Vec<SnapshotRecord> = Vec::new();
        let open = HashMap::new();

        let report = analyze(&trades, &snapshots, &open, &[inst], None);
        let row = &report.per_instrument[0];

        assert_eq!(row.completed_trades, 2);
        assert!((row.win_rate - 0.5).abs() < 1e-9);
        // 1000 mean win / 500 mean loss
        assert!((row.profit_loss_ratio - 2.0).abs() < 1e-9);
        assert!((row.avg_holding_days - 10.5).abs() < 1e-9);
        assert!((row.win_holding_days - 10.0).abs() < 1e-9);
        assert!((row.avg_profit_per_trade - 250.0).abs() < 1e-9);
        // 500 profit over 19000 deployed
        assert!((row.return_on_deployed - 500.0 / 19_000.0).abs() < 1e-9);
    }

    #[test]
    fn untraded_instrument_still_gets_a_row() {
        let traded = make_instrument("600519", &vec![100.0; 10]);
        let silent = make_instrument("000001", &vec![50.0; 10]);
        let trades = vec![
            buy("600519", 0, 100.0, 100),
            sell("600519", 5, 110.0, 100, 1_000.0, 5),
        ];

        let report = analyze(&trades, &[], &HashMap::new(), &[traded, silent], None);
        assert_eq!(report.per_instrument.len(), 2);
        let silent_row = &report.per_instrument[1];
        assert_eq!(silent_row.code, "000001");
        assert_eq!(silent_row.completed_trades, 0);
        assert_eq!(silent_row.win_rate, 0.0);
    }

    #[test]
    fn overall_rollup() {
        let a = make_instrument("600519", &vec![100.0; 10]);
        let b = make_instrument("000001", &vec![50.0; 10]);
        let trades = vec![
            buy("600519", 0, 100.0, 100),
            sell("600519", 5, 110.0, 100, 1_000.0, 5),
            buy("000001", 1, 50.0, 100),
        ];
        let mut open = HashMap::new();
        open.insert("000001".to_string(), 1usize);

        let snapshots = vec![
            SnapshotRecord {
                date: day(0),
                cash: 90_000.0,
                stock_value: 10_000.0,
                total_value: 100_000.0,
                return_rate: 0.0,
                position_count: 1,
                layer_counts: BTreeMap::new(),
                index_level: None,
            },
            SnapshotRecord {
                date: day(1),
                cash: 85_000.0,
                stock_value: 16_000.0,
                total_value: 101_000.0,
                return_rate: 0.01,
                position_count: 2,
                layer_counts: BTreeMap::new(),
                index_level: None,
            },
        ];

        let report = analyze(&trades, &snapshots, &open, &[a, b], None);
        let overall = &report.overall;

        assert_eq!(overall.total_completed, 1);
        assert_eq!(overall.total_uncompleted, 1);
        assert!((overall.completion_rate - 0.5).abs() < 1e-9);
        assert!((overall.max_exposure - 16_000.0).abs() < 1e-9);
        assert!((overall.avg_exposure - 13_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_run_has_complete_structure() {
        let inst = make_instrument("600519", &vec![100.0; 10]);
        let report = analyze(&[], &[], &HashMap::new(), &[inst], None);

        assert_eq!(report.per_instrument.len(), 1);
        assert_eq!(report.overall.total_completed, 0);
        assert!((report.overall.completion_rate - 1.0).abs() < 1e-9);
    }
}
