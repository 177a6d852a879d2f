//! Average True Range and ATR%.
//!
//! TR = max(high-low, |high-prevClose|, |low-prevClose|); the first bar has
//! no previous close and contributes high-low. ATR(n) is the trailing simple
//! mean of TR over n bars (not Wilder-smoothed). ATR% = ATR/close * 100.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_ATR_PERIOD: usize = 14;

pub fn calculate_atr(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 {
        let values = bars
            .iter()
            .map(|b| IndicatorPoint {
                date: b.date,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values,
        };
    }

    let mut tr_values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        tr_values.push(tr);
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        window_sum += tr_values[i];
        if i >= period {
            window_sum -= tr_values[i - period];
        }

        if i + 1 >= period {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Simple(window_sum / period as f64),
            });
        } else {
            values.push(IndicatorPoint {
                date: bar.date,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

pub fn calculate_atr_percent(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let atr = calculate_atr(bars, period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match atr.simple_at(i) {
            // close == 0 would divide by zero; treat the point as undefined
            Some(v) if bar.close > 0.0 => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Simple(v / bar.close * 100.0),
            },
            _ => IndicatorPoint {
                date: bar.date,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::AtrPercent(period),
        values,
    }
}
