//! Domain error types.

/// Top-level error type for laddersim.
///
/// Per-instrument data problems are deliberately not represented here: a
/// missing or short history is a warn-and-skip condition handled by universe
/// construction, not an error that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no price data for {code}")]
    NoData { code: String },

    #[error("insufficient history for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("no instruments qualified for simulation")]
    EmptyUniverse,

    #[error("simulation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LadderError> for std::process::ExitCode {
    fn from(err: &LadderError) -> Self {
        let code: u8 = match err {
            LadderError::Io(_) => 1,
            LadderError::ConfigParse { .. }
            | LadderError::ConfigMissing { .. }
            | LadderError::ConfigInvalid { .. } => 2,
            LadderError::Data { .. } => 3,
            LadderError::Cancelled => 4,
            LadderError::NoData { .. }
            | LadderError::InsufficientData { .. }
            | LadderError::EmptyUniverse => 5,
        };
        std::process::ExitCode::from(code)
    }
}
