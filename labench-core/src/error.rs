use thiserror::Error;

/// Invalid or missing benchmark parameters. Always fatal, and always raised before a run starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("measurement duration must be greater than zero")]
    ZeroDuration,

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("histogram precision must be between 0 and 5 significant digits, got {0}")]
    SignificantDigits(u8),

    #[error("max trackable latency must be at least 2µs")]
    MaxTrackable,

    #[error("{field} exceeds the {limit_days} day limit")]
    DurationTooLong {
        field: &'static str,
        limit_days: u64,
    },

    #[error("an unbounded run (rate 0) needs an explicit client count")]
    UnboundedWithoutClients,

    #[error("unknown protocol `{0}`, expected HTTP/1.1 or HTTP/2")]
    UnknownProtocol(String),

    #[error("invalid duration `{value}`: {reason}")]
    Duration { value: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
