//! Report output port.

use crate::domain::analytics::AnalyticsReport;
use crate::domain::error::LadderError;
use crate::domain::ledger::{SnapshotRecord, TradeRecord};
use std::path::Path;

/// Port for persisting a finished run: the ordered trade log, the ordered
/// snapshot log, and the analytics summaries.
pub trait ReportPort {
    fn write(
        &self,
        trades: &[TradeRecord],
        snapshots: &[SnapshotRecord],
        report: &AnalyticsReport,
        output_dir: &Path,
    ) -> Result<(), LadderError>;
}
