//! MACD (Moving Average Convergence Divergence).
//!
//! DIF = EMA(fast) - EMA(slow); DEA = EMA(DIF, signal);
//! histogram = 2 * (DIF - DEA), the doubled A-share bar convention.
//! Warmup: (slow-1) + (signal-1) bars.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::ema::ema_over;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd { fast, slow, signal };

    if bars.is_empty() || fast == 0 || slow == 0 || signal == 0 {
        let values = bars
            .iter()
            .map(|b| IndicatorPoint {
                date: b.date,
                valid: false,
                value: IndicatorValue::Macd {
                    dif: 0.0,
                    dea: 0.0,
                    histogram: 0.0,
                },
            })
            .collect();
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_over(&closes, fast);
    let ema_slow = ema_over(&closes, slow);

    // DIF becomes defined once the slower EMA is; smooth only the defined tail.
    let dif_start = slow.max(fast).saturating_sub(1);
    let dif: Vec<f64> = (dif_start..bars.len())
        .map(|i| ema_fast[i].unwrap_or(0.0) - ema_slow[i].unwrap_or(0.0))
        .collect();
    let dea = ema_over(&dif, signal);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let point = i
                .checked_sub(dif_start)
                .and_then(|d| dea.get(d).copied().flatten().map(|dea_v| (dif[d], dea_v)));

            match point {
                Some((dif_v, dea_v)) => IndicatorPoint {
                    date: bar.date,
                    valid: true,
                    value: IndicatorValue::Macd {
                        dif: dif_v,
                        dea: dea_v,
                        histogram: 2.0 * (dif_v - dea_v),
                    },
                },
                None => IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: IndicatorValue::Macd {
                        dif: 0.0,
                        dea: 0.0,
                        histogram: 0.0,
                    },
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// DIF values aligned with the bar sequence; `None` during EMA warm-up.
/// The top-divergence detector compares DIF across window highs and needs
/// the line even where the signal EMA is still warming up.
pub fn macd_dif_line(bars: &[PriceBar], fast: usize, slow: usize) -> Vec<Option<f64>> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_over(&closes, fast);
    let ema_slow = ema_over(&closes, slow);

    ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect()
}
