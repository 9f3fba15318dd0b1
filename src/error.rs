use std::fmt;

use chrono::{DateTime, Utc};

/// Errors raised by the core lot engine and wash-sale resolver.
///
/// These are programming or input errors; the core never attempts local
/// recovery and surfaces them to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A ticker lookup against an `AssetRegistry` failed.
    AssetNotFound { ticker: String },
    /// A sell transaction found no open lot of the asset (sold before bought).
    NoMatchingPool { ticker: String, date: DateTime<Utc> },
    /// A split produced a non-positive amount, a wash pairing failed to zero
    /// the net gain, or a consolidation changed an aggregate.
    InvariantViolation { detail: String },
    /// Deserialization could not coerce a column.
    IncorrectPoolFormat { detail: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AssetNotFound { ticker } => {
                write!(f, "asset not found in registry: {ticker}")
            }
            Error::NoMatchingPool { ticker, date } => {
                write!(f, "no matching open lot for {ticker} on {date}")
            }
            Error::InvariantViolation { detail } => write!(f, "invariant violation: {detail}"),
            Error::IncorrectPoolFormat { detail } => write!(f, "incorrect pool format: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
