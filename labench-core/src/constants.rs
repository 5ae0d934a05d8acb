use std::time::Duration;

/// Per-call timeout used when the configuration leaves it unset.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Significant decimal digits kept by the latency histograms.
pub const DEFAULT_SIGNIFICANT_DIGITS: u8 = 3;

/// Largest latency the histograms are sized for up front. They grow past it on demand.
pub const DEFAULT_MAX_TRACKABLE: Duration = Duration::from_secs(60);

/// Timer granularity of coarse pacing.
pub const COARSE_TICK: Duration = Duration::from_millis(1);

/// Extra head-room added to the derived client count when none is configured.
pub const CLIENT_HEADROOM_DIVISOR: u64 = 5;

/// Upper bound on every configured duration, so deadlines stay representable.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);
