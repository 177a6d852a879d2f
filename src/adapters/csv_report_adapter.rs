//! CSV report adapter: writes the trade log, snapshot log and summary
//! tables of a finished run.
//!
//! This is the formatting boundary: percentages and money become display
//! strings here, never inside the domain.

use crate::domain::analytics::{AnalyticsReport, InstrumentSummary, OverallSummary};
use crate::domain::error::LadderError;
use crate::domain::ledger::{SnapshotRecord, TradeRecord};
use crate::ports::report_port::ReportPort;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub struct CsvReportAdapter;

pub fn fmt_percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

pub fn fmt_money(value: f64) -> String {
    format!("{:.2}", value)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

/// Overall summary as a display-string map, insertion-ordered for output.
pub fn overall_display_map(overall: &OverallSummary) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("max_exposure".to_string(), fmt_money(overall.max_exposure));
    map.insert("avg_exposure".to_string(), fmt_money(overall.avg_exposure));
    map.insert(
        "completed_trades".to_string(),
        overall.total_completed.to_string(),
    );
    map.insert(
        "uncompleted_trades".to_string(),
        overall.total_uncompleted.to_string(),
    );
    map.insert(
        "completion_rate".to_string(),
        fmt_percent(overall.completion_rate),
    );
    map.insert("avg_return".to_string(), fmt_percent(overall.avg_return));
    map.insert(
        "avg_drawdown".to_string(),
        fmt_percent(overall.avg_drawdown),
    );
    map.insert(
        "avg_holding_days".to_string(),
        format!("{:.0}", overall.avg_holding_days),
    );
    map
}

fn write_trades(trades: &[TradeRecord], path: &Path) -> Result<(), LadderError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| data_err(format!("failed to create {}: {}", path.display(), e)))?;

    writer
        .write_record([
            "date",
            "code",
            "name",
            "action",
            "price",
            "shares",
            "amount",
            "commission",
            "stamp_tax",
            "layer_index",
            "target_price",
            "entry_date",
            "entry_price",
            "profit_rate",
            "profit_amount",
            "holding_days",
            "reason",
            "cumulative_pnl",
            "index_level",
            "ma120",
            "ma120_deviation_pct",
            "atr_percent",
            "volume_ratio",
            "dividend_yield",
            "unrealized_price",
            "unrealized_profit",
            "unrealized_rate",
        ])
        .map_err(csv_err)?;

    for t in trades {
        writer
            .write_record([
                t.date.to_string(),
                t.code.clone(),
                t.name.clone(),
                t.action.as_str().to_string(),
                format!("{:.4}", t.price),
                t.shares.to_string(),
                fmt_money(t.amount),
                fmt_money(t.commission),
                fmt_money(t.stamp_tax),
                t.layer_index.to_string(),
                fmt_opt(t.target_price),
                t.entry_date.map(|d| d.to_string()).unwrap_or_default(),
                fmt_opt(t.entry_price),
                t.profit_rate.map(fmt_percent).unwrap_or_default(),
                t.profit_amount.map(fmt_money).unwrap_or_default(),
                t.holding_days.map(|d| d.to_string()).unwrap_or_default(),
                t.reason.clone().unwrap_or_default(),
                fmt_money(t.cumulative_pnl),
                fmt_opt(t.context.index_level),
                fmt_opt(t.context.ma120),
                fmt_opt(t.context.ma120_deviation_pct),
                fmt_opt(t.context.atr_percent),
                fmt_opt(t.context.volume_ratio),
                fmt_opt(t.context.dividend_yield),
                fmt_opt(t.unrealized.map(|u| u.price)),
                t.unrealized
                    .map(|u| fmt_money(u.profit_amount))
                    .unwrap_or_default(),
                t.unrealized
                    .map(|u| fmt_percent(u.profit_rate))
                    .unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(LadderError::Io)
}

fn write_snapshots(snapshots: &[SnapshotRecord], path: &Path) -> Result<(), LadderError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| data_err(format!("failed to create {}: {}", path.display(), e)))?;

    writer
        .write_record([
            "date",
            "cash",
            "stock_value",
            "total_value",
            "return",
            "position_count",
            "open_layers",
            "index_level",
        ])
        .map_err(csv_err)?;

    for s in snapshots {
        let layers: Vec<String> = s
            .layer_counts
            .iter()
            .map(|(code, count)| format!("{}:{}", code, count))
            .collect();
        writer
            .write_record([
                s.date.to_string(),
                fmt_money(s.cash),
                fmt_money(s.stock_value),
                fmt_money(s.total_value),
                fmt_percent(s.return_rate),
                s.position_count.to_string(),
                layers.join(";"),
                fmt_opt(s.index_level),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(LadderError::Io)
}

fn write_summaries(rows: &[InstrumentSummary], path: &Path) -> Result<(), LadderError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| data_err(format!("failed to create {}: {}", path.display(), e)))?;

    writer
        .write_record([
            "code",
            "name",
            "completed_trades",
            "open_layers",
            "win_rate",
            "profit_loss_ratio",
            "avg_holding_days",
            "win_holding_days",
            "avg_profit_per_trade",
            "return_on_deployed",
            "max_drawdown",
            "mean_atr_percent",
        ])
        .map_err(csv_err)?;

    for r in rows {
        writer
            .write_record([
                r.code.clone(),
                r.name.clone(),
                r.completed_trades.to_string(),
                r.open_layers.to_string(),
                fmt_percent(r.win_rate),
                format!("{:.2}", r.profit_loss_ratio),
                format!("{:.0}", r.avg_holding_days),
                format!("{:.0}", r.win_holding_days),
                fmt_money(r.avg_profit_per_trade),
                fmt_percent(r.return_on_deployed),
                fmt_percent(r.max_drawdown),
                format!("{:.2}", r.mean_atr_percent),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(LadderError::Io)
}

fn csv_err(e: csv::Error) -> LadderError {
    data_err(format!("CSV write error: {}", e))
}

fn data_err(reason: String) -> LadderError {
    LadderError::Data { reason }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        trades: &[TradeRecord],
        snapshots: &[SnapshotRecord],
        report: &AnalyticsReport,
        output_dir: &Path,
    ) -> Result<(), LadderError> {
        fs::create_dir_all(output_dir)?;

        write_trades(trades, &output_dir.join("trades.csv"))?;
        write_snapshots(snapshots, &output_dir.join("snapshots.csv"))?;
        write_summaries(&report.per_instrument, &output_dir.join("summary.csv"))?;

        let mut overall = String::new();
        for (key, value) in overall_display_map(&report.overall) {
            overall.push_str(&format!("{}: {}\n", key, value));
        }
        fs::write(output_dir.join("overall.txt"), overall)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::OverallSummary;
    use crate::domain::ledger::{TradeAction, TradeContext};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            action: TradeAction::Buy,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            code: "600519".to_string(),
            name: "Kweichow Moutai".to_string(),
            price: 1680.0,
            shares: 100,
            amount: 168_000.0,
            commission: 50.4,
            stamp_tax: 0.0,
            layer_index: 0,
            target_price: Some(1881.6),
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

    fn sample_report() -> AnalyticsReport {
        AnalyticsReport {
            per_instrument: vec![InstrumentSummary {
                code: "600519".to_string(),
                name: "Kweichow Moutai".to_string(),
                completed_trades: 1,
                open_layers: 0,
                win_rate: 1.0,
                profit_loss_ratio: 0.0,
                avg_holding_days: 12.0,
                win_holding_days: 12.0,
                avg_profit_per_trade: 500.0,
                return_on_deployed: 0.03,
                max_drawdown: -0.05,
                mean_atr_percent: 2.1,
            }],
            overall: OverallSummary {
                max_exposure: 168_000.0,
                avg_exposure: 84_000.0,
                total_completed: 1,
                total_uncompleted: 0,
                completion_rate: 1.0,
                avg_return: 0.03,
                avg_drawdown: -0.05,
                avg_holding_days: 12.0,
            },
        }
    }

    #[test]
    fn formats_percent_and_money() {
        assert_eq!(fmt_percent(0.1234), "12.34%");
        assert_eq!(fmt_percent(-0.1818), "-18.18%");
        assert_eq!(fmt_money(12345.678), "12345.68");
    }

    #[test]
    fn writes_all_output_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("results");

        CsvReportAdapter
            .write(&[sample_trade()], &[], &sample_report(), &out)
            .unwrap();

        for file in ["trades.csv", "snapshots.csv", "summary.csv", "overall.txt"] {
            assert!(out.join(file).exists(), "{} missing", file);
        }

        let trades = fs::read_to_string(out.join("trades.csv")).unwrap();
        assert!(trades.contains("600519"));
        assert!(trades.contains("BUY"));

        let overall = fs::read_to_string(out.join("overall.txt")).unwrap();
        assert!(overall.contains("completion_rate: 100.00%"));
        assert!(overall.contains("avg_drawdown: -5.00%"));
    }

    #[test]
    fn overall_map_is_display_formatted() {
        let map = overall_display_map(&sample_report().overall);
        assert_eq!(map.get("avg_return"), Some(&"3.00%".to_string()));
        assert_eq!(map.get("max_exposure"), Some(&"168000.00".to_string()));
    }
}
