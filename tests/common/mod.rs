#![allow(dead_code)]

use chrono::NaiveDate;
use laddersim::domain::bar::PriceBar;
use laddersim::domain::config::{SimulationConfig, SimulationMode, StrategyConfig};
use laddersim::domain::fundamentals::{Fundamentals, FundamentalsTable};
use laddersim::domain::instrument::InstrumentData;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

pub fn bar(offset: i64, close: f64) -> PriceBar {
    PriceBar {
        date: start_date() + chrono::Duration::days(offset),
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000.0,
        amount: close * 10_000.0,
    }
}

/// Flat-range bars from a close series, one calendar day apart.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| bar(i as i64, close))
        .collect()
}

pub fn instrument(code: &str, closes: &[f64]) -> InstrumentData {
    let cfg = StrategyConfig::profile("baseline").unwrap();
    InstrumentData::new(
        code.to_string(),
        format!("{} name", code),
        bars_from_closes(closes),
        &cfg.panel_spec(),
    )
}

pub fn sim_config(mode: SimulationMode, max_positions: usize) -> SimulationConfig {
    SimulationConfig {
        start_date: start_date(),
        end_date: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
        initial_capital: 1_000_000.0,
        max_positions,
        per_instrument_capital: 100_000.0,
        mode,
    }
}

pub fn good_fundamentals(code: &str) -> Fundamentals {
    Fundamentals {
        code: code.to_string(),
        name: format!("{} name", code),
        pe_ttm: Some(12.0),
        dividend_yield: Some(4.5),
        market_cap: Some(5e10),
        latest_price: Some(100.0),
    }
}

pub fn fundamentals_for(codes: &[&str]) -> FundamentalsTable {
    codes
        .iter()
        .map(|&c| (c.to_string(), good_fundamentals(c)))
        .collect()
}

/// 120 flat warm-up bars, an entry dip on bar 120, then `tail`.
pub fn entry_scenario(tail: &[f64]) -> Vec<f64> {
    let mut closes = vec![100.0; 120];
    closes.push(87.0);
    closes.extend_from_slice(tail);
    closes
}
