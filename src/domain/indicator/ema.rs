//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k). Warmup: first (n-1) entries invalid.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema = ema_over(&closes, period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorPoint {
            date: bar.date,
            valid: ema[i].is_some(),
            value: IndicatorValue::Simple(ema[i].unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over a raw value series; `None` during warm-up. Shared with the MACD
/// signal line, which smooths the DIF series rather than closes.
pub(crate) fn ema_over(series: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; series.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    let mut ema = 0.0;
    let mut seed_sum = 0.0;

    for (i, &x) in series.iter().enumerate() {
        if i + 1 < period {
            seed_sum += x;
            out.push(None);
        } else if i + 1 == period {
            seed_sum += x;
            ema = seed_sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = x * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}
