//! Configuration validation.
//!
//! Every field is checked before a run starts; an invalid configuration is a
//! fatal condition, never a warn-and-continue one.

use crate::domain::config::{SimulationConfig, StrategyConfig};
use crate::domain::error::LadderError;

pub fn validate_strategy_config(cfg: &StrategyConfig) -> Result<(), LadderError> {
    validate_entry_threshold(cfg)?;
    validate_ladder(cfg)?;
    validate_profit_targets(cfg)?;
    validate_screening(cfg)?;
    validate_costs(cfg)?;
    validate_dynamic_exit(cfg)?;
    Ok(())
}

pub fn validate_simulation_config(cfg: &SimulationConfig) -> Result<(), LadderError> {
    if cfg.start_date >= cfg.end_date {
        return Err(invalid(
            "simulation",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    if cfg.initial_capital <= 0.0 {
        return Err(invalid(
            "simulation",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if cfg.max_positions == 0 {
        return Err(invalid(
            "simulation",
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    if cfg.per_instrument_capital <= 0.0 {
        return Err(invalid(
            "simulation",
            "per_instrument_capital",
            "per_instrument_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_entry_threshold(cfg: &StrategyConfig) -> Result<(), LadderError> {
    if !(cfg.entry_threshold > 0.0 && cfg.entry_threshold <= 1.0) {
        return Err(invalid(
            "strategy",
            "entry_threshold",
            "entry_threshold must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_ladder(cfg: &StrategyConfig) -> Result<(), LadderError> {
    if cfg.ladder.is_empty() {
        return Err(invalid("strategy", "ladder", "ladder must not be empty"));
    }
    let mut prev_ratio = f64::INFINITY;
    for (i, level) in cfg.ladder.iter().enumerate() {
        if !(level.ratio > 0.0 && level.ratio <= 1.0) {
            return Err(invalid(
                "strategy",
                "ladder",
                &format!("level {}: ratio must be in (0, 1]", i),
            ));
        }
        if level.ratio >= prev_ratio {
            return Err(invalid(
                "strategy",
                "ladder",
                &format!("level {}: ratios must be strictly decreasing", i),
            ));
        }
        if !(level.fund_fraction > 0.0 && level.fund_fraction <= 1.0) {
            return Err(invalid(
                "strategy",
                "ladder",
                &format!("level {}: fund fraction must be in (0, 1]", i),
            ));
        }
        prev_ratio = level.ratio;
    }
    Ok(())
}

fn validate_profit_targets(cfg: &StrategyConfig) -> Result<(), LadderError> {
    if cfg.single_layer_profit <= 0.0 {
        return Err(invalid(
            "strategy",
            "single_layer_profit",
            "single_layer_profit must be positive",
        ));
    }
    if cfg.enable_full_clear && cfg.full_clear_multiplier <= 1.0 {
        return Err(invalid(
            "strategy",
            "full_clear_multiplier",
            "full_clear_multiplier must exceed 1 when full clear is enabled",
        ));
    }
    Ok(())
}

fn validate_screening(cfg: &StrategyConfig) -> Result<(), LadderError> {
    if cfg.pe_max <= 0.0 {
        return Err(invalid("strategy", "pe_max", "pe_max must be positive"));
    }
    if cfg.dividend_yield_min < 0.0 {
        return Err(invalid(
            "strategy",
            "dividend_yield_min",
            "dividend_yield_min must be non-negative",
        ));
    }
    if cfg.atr_min_percent < 0.0 {
        return Err(invalid(
            "strategy",
            "atr_min_percent",
            "atr_min_percent must be non-negative",
        ));
    }
    Ok(())
}

fn validate_costs(cfg: &StrategyConfig) -> Result<(), LadderError> {
    if cfg.commission_rate < 0.0 {
        return Err(invalid(
            "strategy",
            "commission_rate",
            "commission_rate must be non-negative",
        ));
    }
    if cfg.stamp_tax_rate < 0.0 {
        return Err(invalid(
            "strategy",
            "stamp_tax_rate",
            "stamp_tax_rate must be non-negative",
        ));
    }
    if cfg.board_lot == 0 {
        return Err(invalid(
            "strategy",
            "board_lot",
            "board_lot must be at least 1",
        ));
    }
    Ok(())
}

fn validate_dynamic_exit(cfg: &StrategyConfig) -> Result<(), LadderError> {
    let Some(d) = &cfg.dynamic_exit else {
        return Ok(());
    };
    if d.rsi_period == 0 || d.boll_period == 0 || d.divergence_lookback == 0 {
        return Err(invalid(
            "strategy",
            "dynamic_exit",
            "indicator periods must be positive",
        ));
    }
    if d.macd_fast == 0 || d.macd_slow == 0 || d.macd_signal == 0 {
        return Err(invalid(
            "strategy",
            "dynamic_exit",
            "MACD periods must be positive",
        ));
    }
    if d.macd_fast >= d.macd_slow {
        return Err(invalid(
            "strategy",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    if !(d.rsi_overbought > 0.0 && d.rsi_overbought <= 100.0) {
        return Err(invalid(
            "strategy",
            "rsi_overbought",
            "rsi_overbought must be in (0, 100]",
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> LadderError {
    LadderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
