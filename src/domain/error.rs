//! Domain error types.

/// Top-level error type for cryptobt.
#[derive(Debug, thiserror::Error)]
pub enum CryptobtError {
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

    #[error("unknown strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("invalid price series {symbol}: {reason}")]
    InvalidSeries { symbol: String, reason: String },

    #[error("misaligned calendar for {symbol}: {reason}")]
    MisalignedCalendar { symbol: String, reason: String },

    #[error("signal series mismatch for {symbol}: {reason}")]
    SignalMismatch { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invariant violated at bar {bar}: {reason}")]
    InvariantViolation { bar: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CryptobtError {
    pub(crate) fn invalid_config(section: &str, key: &str, reason: impl Into<String>) -> Self {
        CryptobtError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status used by the CLI for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            CryptobtError::Io(_) | CryptobtError::Csv(_) => 1,
            CryptobtError::ConfigParse { .. }
            | CryptobtError::ConfigMissing { .. }
            | CryptobtError::ConfigInvalid { .. }
            | CryptobtError::UnknownStrategy { .. } => 2,
            CryptobtError::Data { .. } => 3,
            CryptobtError::NoData { .. }
            | CryptobtError::InvalidSeries { .. }
            | CryptobtError::MisalignedCalendar { .. }
            | CryptobtError::SignalMismatch { .. }
            | CryptobtError::InsufficientData { .. } => 5,
            CryptobtError::InvariantViolation { .. } => 6,
        }
    }
}

impl From<&CryptobtError> for std::process::ExitCode {
    fn from(err: &CryptobtError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invariant_violation() {
        let err = CryptobtError::InvariantViolation {
            bar: 7,
            reason: "cash went negative".into(),
        };
        assert_eq!(err.to_string(), "invariant violated at bar 7: cash went negative");
    }

    #[test]
    fn display_insufficient_data() {
        let err = CryptobtError::InsufficientData {
            symbol: "BTCUSDT".into(),
            bars: 10,
            minimum: 51,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for BTCUSDT: have 10 bars, need 51"
        );
    }

    #[test]
    fn invalid_config_helper() {
        let err = CryptobtError::invalid_config("backtest", "fee_rate", "must be in [0, 1)");
        assert!(matches!(
            err,
            CryptobtError::ConfigInvalid { ref section, ref key, .. }
                if section == "backtest" && key == "fee_rate"
        ));
    }

    #[test]
    fn exit_codes_by_category() {
        let config = CryptobtError::ConfigMissing {
            section: "backtest".into(),
            key: "symbols".into(),
        };
        assert_eq!(config.exit_status(), 2);

        let input = CryptobtError::MisalignedCalendar {
            symbol: "ETHUSDT".into(),
            reason: "length 3 != 4".into(),
        };
        assert_eq!(input.exit_status(), 5);

        let fatal = CryptobtError::InvariantViolation {
            bar: 0,
            reason: "x".into(),
        };
        assert_eq!(fatal.exit_status(), 6);
    }
}
