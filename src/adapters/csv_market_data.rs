//! CSV market-data adapter.
//!
//! Layout under the data directory:
//! - `<code>.csv`: `date,open,high,low,close,volume,amount` daily bars
//! - `fundamentals.csv`: `code,name,pe_ttm,dividend_yield,market_cap,latest_price`
//! - `benchmark.csv`: `date,close` for the benchmark index
//!
//! Optional fundamentals fields may be left empty. A missing bar file is
//! `NoData` (the caller decides whether that is fatal); missing
//! fundamentals/benchmark files just yield empty tables.

use crate::domain::bar::PriceBar;
use crate::domain::error::LadderError;
use crate::domain::fundamentals::{normalize_code, Fundamentals};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

pub struct CsvMarketData {
    data_dir: PathBuf,
}

impl CsvMarketData {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn bars_path(&self, code: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", code))
    }
}

fn data_err(reason: String) -> LadderError {
    LadderError::Data { reason }
}

fn field<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, LadderError> {
    record
        .get(idx)
        .ok_or_else(|| data_err(format!("missing {} column", name)))
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str) -> Result<f64, LadderError> {
    field(record, idx, name)?
        .trim()
        .parse()
        .map_err(|e| data_err(format!("invalid {} value: {}", name, e)))
}

fn parse_opt_f64(record: &StringRecord, idx: usize, name: &str) -> Result<Option<f64>, LadderError> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e| data_err(format!("invalid {} value: {}", name, e)))
}

fn parse_date(record: &StringRecord, idx: usize) -> Result<NaiveDate, LadderError> {
    let raw = field(record, idx, "date")?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| data_err(format!("invalid date '{}': {}", raw, e)))
}

impl MarketDataPort for CsvMarketData {
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LadderError> {
        let path = self.bars_path(code);
        if !path.exists() {
            return Err(LadderError::NoData {
                code: code.to_string(),
            });
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| data_err(format!("CSV parse error: {}", e)))?;
            let date = parse_date(&record, 0)?;
            if date < start_date || date > end_date {
                continue;
            }

            bars.push(PriceBar {
                date,
                open: parse_f64(&record, 1, "open")?,
                high: parse_f64(&record, 2, "high")?,
                low: parse_f64(&record, 3, "low")?,
                close: parse_f64(&record, 4, "close")?,
                volume: parse_f64(&record, 5, "volume")?,
                amount: parse_opt_f64(&record, 6, "amount")?.unwrap_or(0.0),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn fetch_fundamentals(&self, codes: &[String]) -> Result<Vec<Fundamentals>, LadderError> {
        let path = self.data_dir.join("fundamentals.csv");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

        let wanted: std::collections::HashSet<&str> =
            codes.iter().map(|c| c.as_str()).collect();
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| data_err(format!("CSV parse error: {}", e)))?;
            let code = normalize_code(field(&record, 0, "code")?);
            if !wanted.is_empty() && !wanted.contains(code.as_str()) {
                continue;
            }

            rows.push(Fundamentals {
                name: record.get(1).unwrap_or(&code).trim().to_string(),
                pe_ttm: parse_opt_f64(&record, 2, "pe_ttm")?,
                dividend_yield: parse_opt_f64(&record, 3, "dividend_yield")?,
                market_cap: parse_opt_f64(&record, 4, "market_cap")?,
                latest_price: parse_opt_f64(&record, 5, "latest_price")?,
                code,
            });
        }

        Ok(rows)
    }

    fn fetch_benchmark(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, LadderError> {
        let path = self.data_dir.join("benchmark.csv");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut series = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| data_err(format!("CSV parse error: {}", e)))?;
            let date = parse_date(&record, 0)?;
            if date < start_date || date > end_date {
                continue;
            }
            series.push((date, parse_f64(&record, 1, "close")?));
        }

        series.sort_by_key(|&(date, _)| date);
        Ok(series)
    }

    fn list_instruments(&self) -> Result<Vec<String>, LadderError> {
        let entries = fs::read_dir(&self.data_dir).map_err(|e| {
            data_err(format!(
                "failed to read directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_err(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if let Some(stem) = name.strip_suffix(".csv") {
                if stem != "fundamentals" && stem != "benchmark" {
                    codes.push(stem.to_string());
                }
            }
        }

        codes.sort();
        Ok(codes)
    }
}
