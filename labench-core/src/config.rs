use crate::{
    ConfigError, CLIENT_HEADROOM_DIVISOR, DEFAULT_MAX_TRACKABLE, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SIGNIFICANT_DIGITS, MAX_DURATION,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the scheduler turns the target rate into issuance instants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pacing {
    /// Every deadline is recomputed from the absolute schedule `t0 + k/R`.
    #[default]
    Precise,
    /// A fixed-period timer releases whatever slots came due since the last tick.
    Coarse,
}

/// Wire protocol the transport is built for. Chosen once, before the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Protocol {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "HTTP/1.1"))]
    Http1,
    #[cfg_attr(feature = "serde", serde(rename = "HTTP/2"))]
    Http2,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "HTTP/1.1" => Ok(Protocol::Http1),
            "HTTP/2" => Ok(Protocol::Http2),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http1 => write!(f, "HTTP/1.1"),
            Protocol::Http2 => write!(f, "HTTP/2"),
        }
    }
}

/// Shape of the latency histograms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramConfig {
    pub significant_digits: u8,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    pub max_trackable: Duration,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            significant_digits: DEFAULT_SIGNIFICANT_DIGITS,
            max_trackable: DEFAULT_MAX_TRACKABLE,
        }
    }
}

impl HistogramConfig {
    /// Highest value the histograms are sized for, in microseconds.
    pub fn max_trackable_micros(&self) -> u64 {
        self.max_trackable.as_micros() as u64
    }
}

/// Parameters of a single benchmark run. Immutable once the run starts.
///
/// # Example
/// ```
/// use labench_core::BenchmarkSpec;
/// use std::time::Duration;
///
/// let spec = BenchmarkSpec::new(100, 50, Duration::from_secs(10))
///     .warm_up(Duration::from_secs(2))
///     .base_latency(Duration::from_millis(1));
/// assert!(spec.validate().is_ok());
/// assert_eq!(spec.interval(), Some(Duration::from_millis(10)));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BenchmarkSpec {
    /// Target arrival rate in requests per second. `0` means unbounded.
    pub rate: u64,
    pub concurrency: usize,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    pub warm_up: Duration,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    pub duration: Duration,
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    pub request_timeout: Duration,
    /// Operator-declared minimum service time. Zero disables coordinated-omission correction.
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_duration"))]
    pub base_latency: Duration,
    pub protocol: Protocol,
    pub histogram: HistogramConfig,
}

impl BenchmarkSpec {
    pub fn new(rate: u64, concurrency: usize, duration: Duration) -> Self {
        Self {
            rate,
            concurrency,
            warm_up: Duration::ZERO,
            duration,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            base_latency: Duration::ZERO,
            protocol: Protocol::default(),
            histogram: HistogramConfig::default(),
        }
    }

    pub fn warm_up(mut self, warm_up: Duration) -> Self {
        self.warm_up = warm_up;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_latency(mut self, base_latency: Duration) -> Self {
        self.base_latency = base_latency;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        for (field, value) in [
            ("duration", self.duration),
            ("warm-up", self.warm_up),
            ("request timeout", self.request_timeout),
            ("base latency", self.base_latency),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::DurationTooLong {
                    field,
                    limit_days: MAX_DURATION.as_secs() / 86_400,
                });
            }
        }
        if self.histogram.significant_digits > 5 {
            return Err(ConfigError::SignificantDigits(
                self.histogram.significant_digits,
            ));
        }
        if self.histogram.max_trackable_micros() < 2 {
            return Err(ConfigError::MaxTrackable);
        }
        Ok(())
    }

    /// Spacing between issuances, or `None` for an unbounded source.
    pub fn interval(&self) -> Option<Duration> {
        if self.rate == 0 {
            None
        } else {
            Some(Duration::from_nanos(1_000_000_000 / self.rate))
        }
    }

    pub fn correction_enabled(&self) -> bool {
        !self.base_latency.is_zero()
    }

    /// Interval the recorder backfills at when correcting for coordinated omission.
    ///
    /// An unbounded source has no issuance interval, so the base latency stands in for it.
    pub fn correction_interval(&self) -> Option<Duration> {
        if !self.correction_enabled() {
            return None;
        }
        Some(self.interval().unwrap_or(self.base_latency))
    }

    pub fn total_duration(&self) -> Duration {
        self.warm_up.saturating_add(self.duration)
    }

    /// Number of scheduled slots a run of `duration` at `rate` should produce, `floor(R·D)`.
    pub fn expected_slots(&self, duration: Duration) -> u64 {
        (self.rate as u128 * duration.as_nanos() / 1_000_000_000) as u64
    }
}

/// Client count derived when none is configured: enough workers to keep `rate` in flight for a
/// full `timeout`, plus 20% head-room.
pub fn derived_clients(rate: u64, timeout: Duration) -> usize {
    let clients = rate.saturating_mul(timeout.as_secs_f64().ceil() as u64);
    let clients = clients.saturating_add(clients / CLIENT_HEADROOM_DIVISOR);
    usize::try_from(clients).unwrap_or(usize::MAX)
}
