//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;

use crate::adapters::csv_market_data::CsvMarketData;
use crate::adapters::csv_report_adapter::{fmt_percent, overall_display_map, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_name_repository::MemoryNameRepository;
use crate::domain::analytics::{analyze, AnalyticsReport};
use crate::domain::config::{SimulationConfig, StrategyConfig};
use crate::domain::engine::{rebase_progress, CancelToken, SimulationEngine, SimulationResult};
use crate::domain::error::LadderError;
use crate::domain::fundamentals::FundamentalsTable;
use crate::domain::instrument::InstrumentData;
use crate::domain::ledger::TradeAction;
use crate::domain::strategy::LadderStrategy;
use crate::domain::universe::{build_universe, parse_codes, UniverseResult};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::name_port::NameRepository;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "laddersim", about = "Ladder strategy backtest simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated instrument codes (overrides the config list)
        #[arg(long)]
        codes: Option<String>,
        /// Directory to write trades/snapshots/summary CSVs into
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Market data directory (overrides the config value)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Screen the available universe without simulating
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for one instrument
    Info {
        #[arg(long)]
        code: String,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            codes,
            output,
            data_dir,
        } => run_backtest(&config, codes.as_deref(), output.as_deref(), data_dir.as_deref()),
        Command::Screen { config, data_dir } => run_screen(&config, data_dir.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            code,
            config,
            data_dir,
        } => run_info(&code, &config, data_dir.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, LadderError> {
    FileConfigAdapter::from_file(path).map_err(|e| LadderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn fail(err: &LadderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

struct LoadedData {
    instruments: Vec<InstrumentData>,
    fundamentals: FundamentalsTable,
    benchmark: BTreeMap<NaiveDate, f64>,
    /// Whether the code list was user-specified (explicit lists skip the
    /// strategy screen).
    explicit: bool,
}

/// Resolve the code list, fetch fundamentals/bars/benchmark, and enrich
/// every instrument with its indicator panel. Per-instrument data problems
/// are warned and skipped; only a fully empty load is fatal.
fn prepare_data(
    adapter: &CsvMarketData,
    config: &dyn ConfigPort,
    strategy_cfg: &StrategyConfig,
    sim_cfg: &SimulationConfig,
    codes_override: Option<&str>,
    progress: Option<&(dyn Fn(u8, &str) + Sync)>,
) -> Result<LoadedData, LadderError> {
    let configured_codes = config.get_string("simulation", "codes");
    let requested = codes_override.or(configured_codes.as_deref());

    let (codes, explicit) = match requested {
        Some(list) => (parse_codes(list)?, true),
        None => (adapter.list_instruments()?, false),
    };
    if codes.is_empty() {
        return Err(LadderError::EmptyUniverse);
    }

    let fundamentals_rows = adapter.fetch_fundamentals(&codes)?;
    let mut names = MemoryNameRepository::new();
    names.populate(
        &fundamentals_rows
            .iter()
            .map(|f| (f.code.clone(), f.name.clone()))
            .collect::<Vec<_>>(),
    );
    let fundamentals: FundamentalsTable = fundamentals_rows
        .into_iter()
        .map(|f| (f.code.clone(), f))
        .collect();

    let panel_spec = strategy_cfg.panel_spec();
    let total = codes.len();
    let mut instruments = Vec::new();
    for (i, code) in codes.iter().enumerate() {
        match adapter.fetch_daily_bars(code, sim_cfg.start_date, sim_cfg.end_date) {
            Ok(bars) if !bars.is_empty() => {
                let name = names.lookup(code).unwrap_or_else(|| code.clone());
                instruments.push(InstrumentData::new(code.clone(), name, bars, &panel_spec));
            }
            Ok(_) => warn!(code = %code, "no bars in range, skipping"),
            Err(e) => warn!(code = %code, error = %e, "failed to load bars, skipping"),
        }

        if let Some(report) = progress {
            report(
                rebase_progress(0, 40, i + 1, total),
                &format!("loading data {}/{}", i + 1, total),
            );
        }
    }
    if instruments.is_empty() {
        return Err(LadderError::EmptyUniverse);
    }

    let benchmark: BTreeMap<NaiveDate, f64> = adapter
        .fetch_benchmark(sim_cfg.start_date, sim_cfg.end_date)?
        .into_iter()
        .collect();

    Ok(LoadedData {
        instruments,
        fundamentals,
        benchmark,
        explicit,
    })
}

fn data_adapter(config: &dyn ConfigPort, data_dir: Option<&Path>) -> Result<CsvMarketData, LadderError> {
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => match config.get_string("data", "dir") {
            Some(dir) => PathBuf::from(dir),
            None => {
                return Err(LadderError::ConfigMissing {
                    section: "data".to_string(),
                    key: "dir".to_string(),
                });
            }
        },
    };
    Ok(CsvMarketData::new(dir))
}

fn run_backtest(
    config_path: &Path,
    codes: Option<&str>,
    output: Option<&Path>,
    data_dir: Option<&Path>,
) -> ExitCode {
    match execute_backtest(config_path, codes, output, data_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn execute_backtest(
    config_path: &Path,
    codes: Option<&str>,
    output: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<(), LadderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;

    let strategy_cfg = StrategyConfig::from_config(&config)?;
    let sim_cfg = SimulationConfig::from_config(&config)?;
    let adapter = data_adapter(&config, data_dir)?;

    let progress = |percent: u8, message: &str| {
        eprintln!("[{:>3}%] {}", percent, message);
    };

    eprintln!("Preparing data...");
    let data = prepare_data(
        &adapter,
        &config,
        &strategy_cfg,
        &sim_cfg,
        codes,
        Some(&progress),
    )?;

    let strategy = LadderStrategy::new(strategy_cfg);
    let UniverseResult { qualified, skipped } = build_universe(
        data.instruments,
        &data.fundamentals,
        &strategy,
        data.explicit,
    )?;
    eprintln!(
        "Universe: {} qualified, {} skipped",
        qualified.len(),
        skipped.len()
    );

    let engine = SimulationEngine::new(strategy, sim_cfg);
    let cancel = CancelToken::new();
    let result = engine.run(
        &qualified,
        &data.fundamentals,
        &data.benchmark,
        Some(&progress),
        &cancel,
    )?;

    let open_layers: std::collections::HashMap<String, usize> = result
        .open_positions
        .iter()
        .map(|(code, pm)| (code.clone(), pm.layer_count()))
        .collect();
    let report = analyze(
        &result.trades,
        &result.snapshots,
        &open_layers,
        &qualified,
        Some(&progress),
    );

    print_summary(&result, &report);

    if let Some(dir) = output {
        CsvReportAdapter.write(&result.trades, &result.snapshots, &report, dir)?;
        eprintln!("Results written to {}", dir.display());
    }

    Ok(())
}

fn print_summary(result: &SimulationResult, report: &AnalyticsReport) {
    let buys = result
        .trades
        .iter()
        .filter(|t| t.action == TradeAction::Buy)
        .count();
    let sells = result.trades.len() - buys;

    println!();
    println!("{:=<72}", "");
    println!("Trades: {} buys / {} sells", buys, sells);
    println!("{:=<72}", "");
    println!(
        "{:<8} {:<16} {:>6} {:>6} {:>8} {:>9} {:>9} {:>7}",
        "code", "name", "done", "open", "win", "return", "drawdown", "days"
    );
    for row in &report.per_instrument {
        println!(
            "{:<8} {:<16} {:>6} {:>6} {:>8} {:>9} {:>9} {:>7.0}",
            row.code,
            truncate(&row.name, 16),
            row.completed_trades,
            row.open_layers,
            fmt_percent(row.win_rate),
            fmt_percent(row.return_on_deployed),
            fmt_percent(row.max_drawdown),
            row.avg_holding_days,
        );
    }
    println!("{:=<72}", "");
    for (key, value) in overall_display_map(&report.overall) {
        println!("{:<20} {}", key, value);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn run_screen(config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    let result = (|| -> Result<(), LadderError> {
        let config = load_config(config_path)?;
        let strategy_cfg = StrategyConfig::from_config(&config)?;
        let sim_cfg = SimulationConfig::from_config(&config)?;
        let adapter = data_adapter(&config, data_dir)?;

        let data = prepare_data(&adapter, &config, &strategy_cfg, &sim_cfg, None, None)?;
        let strategy = LadderStrategy::new(strategy_cfg);
        let universe = build_universe(data.instruments, &data.fundamentals, &strategy, false)?;

        println!("Qualified ({}):", universe.qualified.len());
        for inst in &universe.qualified {
            println!("  {} {}", inst.code, inst.name);
        }
        if !universe.skipped.is_empty() {
            println!("Skipped ({}):", universe.skipped.len());
            for skip in &universe.skipped {
                println!("  {} ({})", skip.code, skip.reason);
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let result = (|| -> Result<(), LadderError> {
        let config = load_config(config_path)?;
        StrategyConfig::from_config(&config)?;
        SimulationConfig::from_config(&config)?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            println!("{} is valid", config_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_info(code: &str, config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    let result = (|| -> Result<(), LadderError> {
        let config = load_config(config_path)?;
        let sim_cfg = SimulationConfig::from_config(&config)?;
        let adapter = data_adapter(&config, data_dir)?;

        let codes = parse_codes(code)?;
        for code in codes {
            let bars = adapter.fetch_daily_bars(&code, sim_cfg.start_date, sim_cfg.end_date)?;
            match (bars.first(), bars.last()) {
                (Some(first), Some(last)) => println!(
                    "{}: {} bars ({} .. {})",
                    code,
                    bars.len(),
                    first.date,
                    last.date
                ),
                _ => println!("{}: no bars in range", code),
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 16), "short");
        assert_eq!(truncate("a-very-long-instrument-name", 10), "a-very-lon");
        assert_eq!(truncate("贵州茅台", 2), "贵州");
    }
}
