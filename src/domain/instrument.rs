//! Instrument data: bars, indicator panel, and date lookup.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::panel::{IndicatorPanel, PanelSpec};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Bars required before an instrument participates in simulation; the entry
/// rule needs a defined MA120.
pub const MIN_HISTORY_BARS: usize = 120;

/// One instrument's full history plus derived indicators. Immutable once
/// built; the simulation only ever reads it.
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub code: String,
    pub name: String,
    pub bars: Vec<PriceBar>,
    pub panel: IndicatorPanel,
    date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentData {
    /// Builds the panel and date index. `bars` must be ascending by date.
    pub fn new(code: String, name: String, bars: Vec<PriceBar>, spec: &PanelSpec) -> Self {
        let panel = IndicatorPanel::compute(&bars, spec);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            name,
            bars,
            panel,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn bar_on(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.bar_index(date).map(|i| &self.bars[i])
    }

    pub fn close_at(&self, idx: usize) -> f64 {
        self.bars[idx].close
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Mean volume of the 20 bars before `idx`, used for the volume-ratio
    /// trade diagnostic. `None` until enough history exists.
    pub fn volume_ratio_at(&self, idx: usize) -> Option<f64> {
        const VOLUME_WINDOW: usize = 20;
        if idx < VOLUME_WINDOW {
            return None;
        }
        let window = &self.bars[idx - VOLUME_WINDOW..idx];
        let mean: f64 = window.iter().map(|b| b.volume).sum::<f64>() / VOLUME_WINDOW as f64;
        if mean > 0.0 {
            Some(self.bars[idx].volume / mean)
        } else {
            None
        }
    }
}

/// The trading calendar: the sorted union of all distinct bar dates across
/// the loaded instruments.
pub fn build_trading_calendar(instruments: &[InstrumentData]) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = instruments
        .iter()
        .flat_map(|inst| inst.bars.iter().map(|bar| bar.date))
        .collect();
    dates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bar(date: &str, close: f64, volume: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
            amount: close * volume,
        }
    }

    fn make_instrument(code: &str, bars: Vec<PriceBar>) -> InstrumentData {
        InstrumentData::new(
            code.to_string(),
            format!("{} name", code),
            bars,
            &PanelSpec::default(),
        )
    }

    #[test]
    fn date_index_lookup() {
        let inst = make_instrument(
            "600519",
            vec![
                make_bar("2024-01-01", 100.0, 1000.0),
                make_bar("2024-01-02", 101.0, 1000.0),
                make_bar("2024-01-03", 102.0, 1000.0),
            ],
        );

        assert_eq!(
            inst.bar_index(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            Some(1)
        );
        assert_eq!(
            inst.bar_index(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            None
        );
        assert!(
            (inst
                .bar_on(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap())
                .unwrap()
                .close
                - 102.0)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn calendar_merges_and_sorts() {
        let a = make_instrument(
            "600519",
            vec![
                make_bar("2024-01-02", 100.0, 1000.0),
                make_bar("2024-01-05", 101.0, 1000.0),
            ],
        );
        let b = make_instrument(
            "000001",
            vec![
                make_bar("2024-01-01", 50.0, 1000.0),
                make_bar("2024-01-02", 51.0, 1000.0),
                make_bar("2024-01-03", 52.0, 1000.0),
            ],
        );

        let calendar = build_trading_calendar(&[a, b]);
        let expected: Vec<NaiveDate> = ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-05"]
            .iter()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap())
            .collect();
        assert_eq!(calendar, expected);
    }

    #[test]
    fn calendar_empty_universe() {
        assert!(build_trading_calendar(&[]).is_empty());
    }

    #[test]
    fn volume_ratio_needs_window() {
        let bars: Vec<PriceBar> = (0..25)
            .map(|i| {
                make_bar(
                    &format!("2024-01-{:02}", i + 1),
                    100.0,
                    if i == 24 { 2000.0 } else { 1000.0 },
                )
            })
            .collect();
        let inst = make_instrument("600519", bars);

        assert_eq!(inst.volume_ratio_at(10), None);
        let ratio = inst.volume_ratio_at(24).unwrap();
        assert!((ratio - 2.0).abs() < 1e-12);
    }
}
