//! LRA identity, time units and error definitions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Header carrying the active LRA context on outgoing requests.
pub const LRA_HTTP_CONTEXT_HEADER: &str = "Long-Running-Action";

/// Query parameter telling the participant which status to answer with.
pub const STATUS_CODE_QUERY_NAME: &str = "Coerce-Status";

/// Identity of a long running action, as allocated by the coordinator.
///
/// Always an absolute URL. Two identities are equal when their URLs are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LraId(Url);

impl LraId {
    /// Parse an identity from text returned by the coordinator.
    ///
    /// Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> LraResult<Self> {
        let trimmed = raw.trim();
        Url::parse(trimmed)
            .map(Self)
            .map_err(|e| LraError::MalformedIdentity {
                raw: trimmed.to_string(),
                reason: e.to_string(),
            })
    }

    /// The identity as a URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for LraId {
    type Err = LraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for LraId {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

impl fmt::Display for LraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Time units accepted when scheduling a cancellation timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanos,
    Micros,
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert `amount` of this unit to a `Duration`.
    pub fn duration(self, amount: u64) -> LraResult<Duration> {
        let overflow = || LraError::InvalidDuration { amount, unit: self };
        let secs = |factor: u64| amount.checked_mul(factor).map(Duration::from_secs);

        match self {
            TimeUnit::Nanos => Some(Duration::from_nanos(amount)),
            TimeUnit::Micros => Some(Duration::from_micros(amount)),
            TimeUnit::Millis => Some(Duration::from_millis(amount)),
            TimeUnit::Seconds => Some(Duration::from_secs(amount)),
            TimeUnit::Minutes => secs(60),
            TimeUnit::Hours => secs(60 * 60),
            TimeUnit::Days => secs(24 * 60 * 60),
        }
        .ok_or_else(overflow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Nanos => "nanos",
            TimeUnit::Micros => "micros",
            TimeUnit::Millis => "millis",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = LraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nanos" | "nanoseconds" => Ok(TimeUnit::Nanos),
            "micros" | "microseconds" => Ok(TimeUnit::Micros),
            "millis" | "milliseconds" => Ok(TimeUnit::Millis),
            "seconds" | "secs" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            _ => Err(LraError::InvalidDurationUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code and text body of a single participant call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    pub status: u16,
    pub body: String,
}

/// Errors raised by the LRA client driver.
#[derive(Debug, Error)]
pub enum LraError {
    /// The coordinator returned something that is not an absolute URL.
    #[error("Malformed LRA identity '{raw}': {reason}")]
    MalformedIdentity { raw: String, reason: String },

    /// The HTTP round trip itself failed.
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// A cancellation timer fired before the LRA was closed.
    #[error("LRA timed out prematurely: clientId: {client_id} LRA id: {lra}")]
    PrematureTimeout { client_id: String, lra: LraId },

    /// The time unit cannot be used to schedule a timer.
    #[error("Time unit cannot be used for LRA timeouts: {0}")]
    InvalidDurationUnit(String),

    /// The amount does not fit in a duration.
    #[error("Timeout of {amount} {unit} is out of range")]
    InvalidDuration { amount: u64, unit: TimeUnit },

    /// The request URL could not be built from the configured target.
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// A call answered with a status other than the one the test expected.
    #[error("Not expected status at call '{path}': expected {expected}, got {actual}")]
    UnexpectedStatus {
        path: String,
        expected: u16,
        actual: u16,
    },
}

/// Result type for LRA client operations.
pub type LraResult<T> = Result<T, LraError>;
