//! Market data access port.
//!
//! Acquisition of raw prices and fundamentals (network, caching, retries)
//! lives behind this trait; the engine only ever sees materialized data.

use crate::domain::bar::PriceBar;
use crate::domain::error::LadderError;
use crate::domain::fundamentals::Fundamentals;
use chrono::NaiveDate;

pub trait MarketDataPort {
    /// Daily bars for one instrument within [start, end], ascending by date.
    fn fetch_daily_bars(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, LadderError>;

    /// Fundamentals rows for the requested codes. Missing instruments are
    /// simply absent from the result, not an error.
    fn fetch_fundamentals(&self, codes: &[String]) -> Result<Vec<Fundamentals>, LadderError>;

    /// Benchmark index closes within [start, end], ascending by date.
    fn fetch_benchmark(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, LadderError>;

    /// All instrument codes this source can serve.
    fn list_instruments(&self) -> Result<Vec<String>, LadderError>;
}
