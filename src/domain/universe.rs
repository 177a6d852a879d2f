//! Universe construction: which instruments participate in a run.
//!
//! Data problems here are non-fatal per instrument: a short history or
//! failed screen logs a warning and skips the instrument. Only an entirely
//! empty universe aborts the run.

use crate::domain::error::LadderError;
use crate::domain::fundamentals::{normalize_code, FundamentalsTable};
use crate::domain::instrument::{InstrumentData, MIN_HISTORY_BARS};
use crate::domain::strategy::{Disqualification, LadderStrategy};
use std::collections::HashSet;
use tracing::{info, warn};

/// Parse a comma-separated code list into normalized codes. Duplicates are
/// dropped silently, first occurrence wins (explicit lists come from user
/// selections where repetition is routine); an empty token is an error.
pub fn parse_codes(input: &str) -> Result<Vec<String>, LadderError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(LadderError::ConfigInvalid {
                section: "simulation".to_string(),
                key: "codes".to_string(),
                reason: "empty token in code list".to_string(),
            });
        }
        let code = normalize_code(trimmed);
        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub code: String,
    pub reason: Disqualification,
}

#[derive(Debug)]
pub struct UniverseResult {
    /// Qualified instruments in scan order.
    pub qualified: Vec<InstrumentData>,
    pub skipped: Vec<SkippedInstrument>,
}

/// Filter loaded instruments down to the tradable universe.
///
/// An explicit (user-selected) list skips the strategy screen entirely but
/// still requires enough history for the indicators; full-universe screening
/// applies the complete qualification rules. Input order is preserved; it
/// becomes the entry-candidate scan order.
pub fn build_universe(
    instruments: Vec<InstrumentData>,
    fundamentals: &FundamentalsTable,
    strategy: &LadderStrategy,
    explicit: bool,
) -> Result<UniverseResult, LadderError> {
    let total = instruments.len();
    let mut qualified = Vec::new();
    let mut skipped = Vec::new();

    for inst in instruments {
        let verdict = if explicit {
            if inst.bar_count() < MIN_HISTORY_BARS {
                Err(Disqualification::InsufficientHistory {
                    bars: inst.bar_count(),
                })
            } else {
                Ok(())
            }
        } else {
            strategy.qualify(&inst, fundamentals.get(&inst.code))
        };

        match verdict {
            Ok(()) => qualified.push(inst),
            Err(reason) => {
                warn!(code = %inst.code, %reason, "skipping instrument");
                skipped.push(SkippedInstrument {
                    code: inst.code.clone(),
                    reason,
                });
            }
        }
    }

    if qualified.is_empty() {
        return Err(LadderError::EmptyUniverse);
    }

    if !skipped.is_empty() {
        info!(
            qualified = qualified.len(),
            total,
            "universe built with skips"
        );
    }

    Ok(UniverseResult { qualified, skipped })
}
