//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for orbtrader.
///
/// Only configuration errors are fatal for a run. `DataUnavailable` is
/// raised by data adapters and absorbed by the orchestrator as a skipped
/// symbol-day.
#[derive(Debug, thiserror::Error)]
pub enum OrbError {
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

    #[error("no usable bars for {symbol} on {date}: {reason}")]
    DataUnavailable {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("ledger write error: {reason}")]
    Ledger { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrbError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        OrbError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        OrbError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn data(symbol: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        OrbError::DataUnavailable {
            symbol: symbol.to_string(),
            date,
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            OrbError::ConfigParse { .. } | OrbError::ConfigMissing { .. } | OrbError::ConfigInvalid { .. }
        )
    }
}

impl From<csv::Error> for OrbError {
    fn from(err: csv::Error) -> Self {
        OrbError::Ledger {
            reason: err.to_string(),
        }
    }
}

impl From<&OrbError> for std::process::ExitCode {
    fn from(err: &OrbError) -> Self {
        let code: u8 = match err {
            OrbError::Io(_) => 1,
            OrbError::ConfigParse { .. }
            | OrbError::ConfigMissing { .. }
            | OrbError::ConfigInvalid { .. } => 2,
            OrbError::Ledger { .. } => 3,
            OrbError::DataUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
