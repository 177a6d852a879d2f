//! Strongly-typed strategy and simulation configuration.
//!
//! Configuration is merged from a named base profile plus explicit key
//! overrides read through [`ConfigPort`]; validation lives in
//! [`config_validation`](crate::domain::config_validation). No loosely-typed
//! maps survive past this boundary.

use crate::domain::config_validation::{validate_simulation_config, validate_strategy_config};
use crate::domain::error::LadderError;
use crate::domain::indicator::panel::PanelSpec;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// One rung of the ladder: entry-reference ratio plus the fund fraction
/// committed at that rung.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderLevel {
    pub ratio: f64,
    pub fund_fraction: f64,
}

/// Parameters of the optional indicator-based exit.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicExitConfig {
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub boll_period: usize,
    pub boll_mult_x100: u32,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub divergence_lookback: usize,
}

impl Default for DynamicExitConfig {
    fn default() -> Self {
        DynamicExitConfig {
            rsi_period: 14,
            rsi_overbought: 70.0,
            boll_period: 20,
            boll_mult_x100: 200,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            divergence_lookback: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    // screening
    pub pe_max: f64,
    pub dividend_yield_min: f64,
    pub atr_min_percent: f64,
    // entry / ladder
    pub entry_threshold: f64,
    pub ladder: Vec<LadderLevel>,
    // exits
    pub single_layer_profit: f64,
    pub enable_full_clear: bool,
    pub full_clear_multiplier: f64,
    pub dynamic_exit: Option<DynamicExitConfig>,
    // execution costs
    pub commission_rate: f64,
    pub stamp_tax_rate: f64,
    pub board_lot: u64,
}

impl StrategyConfig {
    /// Named base profiles. `baseline` is the ladder strategy with the
    /// indicator exit disabled; `dynamic-exit` switches it on with default
    /// indicator parameters.
    pub fn profile(name: &str) -> Option<StrategyConfig> {
        let baseline = StrategyConfig {
            pe_max: 20.0,
            dividend_yield_min: 3.0,
            atr_min_percent: 1.5,
            entry_threshold: 0.88,
            ladder: vec![
                LadderLevel {
                    ratio: 0.88,
                    fund_fraction: 0.1,
                },
                LadderLevel {
                    ratio: 0.80,
                    fund_fraction: 0.2,
                },
                LadderLevel {
                    ratio: 0.70,
                    fund_fraction: 0.3,
                },
                LadderLevel {
                    ratio: 0.60,
                    fund_fraction: 0.4,
                },
            ],
            single_layer_profit: 0.12,
            enable_full_clear: true,
            full_clear_multiplier: 1.12,
            dynamic_exit: None,
            commission_rate: 0.0003,
            stamp_tax_rate: 0.001,
            board_lot: 100,
        };

        match name {
            "baseline" => Some(baseline),
            "dynamic-exit" => Some(StrategyConfig {
                dynamic_exit: Some(DynamicExitConfig::default()),
                ..baseline
            }),
            _ => None,
        }
    }

    /// Resolve the profile named in `[strategy] profile` (default
    /// `baseline`), apply overrides, and validate.
    pub fn from_config(config: &dyn ConfigPort) -> Result<StrategyConfig, LadderError> {
        let profile_name = config
            .get_string("strategy", "profile")
            .unwrap_or_else(|| "baseline".to_string());

        let mut cfg =
            StrategyConfig::profile(&profile_name).ok_or_else(|| LadderError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "profile".to_string(),
                reason: format!("unknown profile '{}'", profile_name),
            })?;

        cfg.pe_max = config.get_double("strategy", "pe_max", cfg.pe_max);
        cfg.dividend_yield_min =
            config.get_double("strategy", "dividend_yield_min", cfg.dividend_yield_min);
        cfg.atr_min_percent =
            config.get_double("strategy", "atr_min_percent", cfg.atr_min_percent);
        cfg.entry_threshold =
            config.get_double("strategy", "entry_threshold", cfg.entry_threshold);
        cfg.single_layer_profit =
            config.get_double("strategy", "single_layer_profit", cfg.single_layer_profit);
        cfg.enable_full_clear =
            config.get_bool("strategy", "enable_full_clear", cfg.enable_full_clear);
        cfg.full_clear_multiplier = config.get_double(
            "strategy",
            "full_clear_multiplier",
            cfg.full_clear_multiplier,
        );
        cfg.commission_rate =
            config.get_double("strategy", "commission_rate", cfg.commission_rate);
        cfg.stamp_tax_rate = config.get_double("strategy", "stamp_tax_rate", cfg.stamp_tax_rate);
        cfg.board_lot = config.get_int("strategy", "board_lot", cfg.board_lot as i64) as u64;

        if let Some(spec) = config.get_string("strategy", "ladder") {
            cfg.ladder = parse_ladder(&spec).map_err(|reason| LadderError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "ladder".to_string(),
                reason,
            })?;
        }

        let dynamic_enabled = config.get_bool(
            "strategy",
            "dynamic_exit",
            cfg.dynamic_exit.is_some(),
        );
        cfg.dynamic_exit = if dynamic_enabled {
            let mut dyn_cfg = cfg.dynamic_exit.unwrap_or_default();
            dyn_cfg.rsi_period =
                config.get_int("strategy", "rsi_period", dyn_cfg.rsi_period as i64) as usize;
            dyn_cfg.rsi_overbought =
                config.get_double("strategy", "rsi_overbought", dyn_cfg.rsi_overbought);
            dyn_cfg.boll_period =
                config.get_int("strategy", "boll_period", dyn_cfg.boll_period as i64) as usize;
            dyn_cfg.boll_mult_x100 = (config.get_double(
                "strategy",
                "boll_stddev",
                dyn_cfg.boll_mult_x100 as f64 / 100.0,
            ) * 100.0)
                .round() as u32;
            dyn_cfg.macd_fast =
                config.get_int("strategy", "macd_fast", dyn_cfg.macd_fast as i64) as usize;
            dyn_cfg.macd_slow =
                config.get_int("strategy", "macd_slow", dyn_cfg.macd_slow as i64) as usize;
            dyn_cfg.macd_signal =
                config.get_int("strategy", "macd_signal", dyn_cfg.macd_signal as i64) as usize;
            dyn_cfg.divergence_lookback = config.get_int(
                "strategy",
                "divergence_lookback",
                dyn_cfg.divergence_lookback as i64,
            ) as usize;
            Some(dyn_cfg)
        } else {
            None
        };

        validate_strategy_config(&cfg)?;
        Ok(cfg)
    }

    /// Indicator parameters implied by this configuration.
    pub fn panel_spec(&self) -> PanelSpec {
        match &self.dynamic_exit {
            Some(d) => PanelSpec {
                rsi_period: d.rsi_period,
                boll_period: d.boll_period,
                boll_mult_x100: d.boll_mult_x100,
                macd_fast: d.macd_fast,
                macd_slow: d.macd_slow,
                macd_signal: d.macd_signal,
                divergence_lookback: d.divergence_lookback,
                ..PanelSpec::default()
            },
            None => PanelSpec::default(),
        }
    }
}

/// Parse a ladder override of the form `ratio:fraction,ratio:fraction,...`.
pub fn parse_ladder(spec: &str) -> Result<Vec<LadderLevel>, String> {
    let mut levels = Vec::new();
    for (i, token) in spec.split(',').enumerate() {
        let token = token.trim();
        let (ratio_str, fraction_str) = token
            .split_once(':')
            .ok_or_else(|| format!("level {}: expected ratio:fraction, got '{}'", i, token))?;
        let ratio: f64 = ratio_str
            .trim()
            .parse()
            .map_err(|_| format!("level {}: invalid ratio '{}'", i, ratio_str.trim()))?;
        let fund_fraction: f64 = fraction_str
            .trim()
            .parse()
            .map_err(|_| format!("level {}: invalid fraction '{}'", i, fraction_str.trim()))?;
        levels.push(LadderLevel {
            ratio,
            fund_fraction,
        });
    }
    Ok(levels)
}

/// Which capital model drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    /// One pool of capital, a global cap on concurrent open positions.
    SharedCapital,
    /// Every instrument gets its own isolated endowment, no position cap.
    Independent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub max_positions: usize,
    pub per_instrument_capital: f64,
    pub mode: SimulationMode,
}

impl SimulationConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<SimulationConfig, LadderError> {
        let start_date = required_date(config, "start_date")?;
        let end_date = required_date(config, "end_date")?;

        let mode = match config
            .get_string("simulation", "mode")
            .unwrap_or_else(|| "shared".to_string())
            .as_str()
        {
            "shared" => SimulationMode::SharedCapital,
            "independent" => SimulationMode::Independent,
            other => {
                return Err(LadderError::ConfigInvalid {
                    section: "simulation".to_string(),
                    key: "mode".to_string(),
                    reason: format!("expected 'shared' or 'independent', got '{}'", other),
                });
            }
        };

        let cfg = SimulationConfig {
            start_date,
            end_date,
            initial_capital: config.get_double("simulation", "initial_capital", 1_000_000.0),
            max_positions: config.get_int("simulation", "max_positions", 5) as usize,
            per_instrument_capital: config.get_double(
                "simulation",
                "per_instrument_capital",
                100_000.0,
            ),
            mode,
        };

        validate_simulation_config(&cfg)?;
        Ok(cfg)
    }
}

fn required_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, LadderError> {
    match config.get_string("simulation", key) {
        None => Err(LadderError::ConfigMissing {
            section: "simulation".to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
            LadderError::ConfigInvalid {
                section: "simulation".to_string(),
                key: key.to_string(),
                reason: "expected YYYY-MM-DD".to_string(),
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn baseline_profile_matches_defaults() {
        let cfg = StrategyConfig::profile("baseline").unwrap();
        assert_eq!(cfg.ladder.len(), 4);
        assert!((cfg.entry_threshold - 0.88).abs() < f64::EPSILON);
        assert!((cfg.ladder[0].ratio - 0.88).abs() < f64::EPSILON);
        assert!((cfg.ladder[3].fund_fraction - 0.4).abs() < f64::EPSILON);
        assert!(cfg.enable_full_clear);
        assert!(cfg.dynamic_exit.is_none());
        assert_eq!(cfg.board_lot, 100);
    }

    #[test]
    fn dynamic_profile_enables_indicator_exit() {
        let cfg = StrategyConfig::profile("dynamic-exit").unwrap();
        let dyn_cfg = cfg.dynamic_exit.unwrap();
        assert!((dyn_cfg.rsi_overbought - 70.0).abs() < f64::EPSILON);
        assert_eq!(dyn_cfg.boll_period, 20);
    }

    #[test]
    fn unknown_profile_is_none() {
        assert!(StrategyConfig::profile("yolo").is_none());
    }

    #[test]
    fn overrides_apply_on_top_of_profile() {
        let ini = "
[strategy]
entry_threshold = 0.90
ladder = 0.90:0.2, 0.75:0.8
single_layer_profit = 0.10
board_lot = 200
";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let cfg = StrategyConfig::from_config(&adapter).unwrap();

        assert!((cfg.entry_threshold - 0.90).abs() < f64::EPSILON);
        assert_eq!(cfg.ladder.len(), 2);
        assert!((cfg.ladder[1].fund_fraction - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.board_lot, 200);
        // untouched keys keep profile values
        assert!((cfg.commission_rate - 0.0003).abs() < f64::EPSILON);
    }

    #[test]
    fn dynamic_exit_override_toggles_on() {
        let ini = "
[strategy]
dynamic_exit = true
rsi_overbought = 80
";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let cfg = StrategyConfig::from_config(&adapter).unwrap();
        let dyn_cfg = cfg.dynamic_exit.unwrap();
        assert!((dyn_cfg.rsi_overbought - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_profile_override_is_rejected() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nprofile = nope\n").unwrap();
        let err = StrategyConfig::from_config(&adapter).unwrap_err();
        assert!(matches!(err, LadderError::ConfigInvalid { key, .. } if key == "profile"));
    }

    #[test]
    fn parse_ladder_rejects_garbage() {
        assert!(parse_ladder("0.88:0.1").is_ok());
        assert!(parse_ladder("0.88").is_err());
        assert!(parse_ladder("a:b").is_err());
        assert!(parse_ladder("0.88:0.1,,").is_err());
    }

    #[test]
    fn simulation_config_requires_dates() {
        let adapter = FileConfigAdapter::from_string("[simulation]\n").unwrap();
        let err = SimulationConfig::from_config(&adapter).unwrap_err();
        assert!(matches!(err, LadderError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn simulation_config_parses_mode() {
        let ini = "
[simulation]
start_date = 2020-01-01
end_date = 2024-12-31
mode = independent
";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let cfg = SimulationConfig::from_config(&adapter).unwrap();
        assert_eq!(cfg.mode, SimulationMode::Independent);
        assert!((cfg.initial_capital - 1_000_000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_positions, 5);
    }

    #[test]
    fn simulation_config_rejects_unknown_mode() {
        let ini = "
[simulation]
start_date = 2020-01-01
end_date = 2024-12-31
mode = hybrid
";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let err = SimulationConfig::from_config(&adapter).unwrap_err();
        assert!(matches!(err, LadderError::ConfigInvalid { key, .. } if key == "mode"));
    }
}
