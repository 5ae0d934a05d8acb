//! Concurrent latency accumulation with coordinated-omission correction.
use crate::action::ErrorKind;
use hdrhistogram::{CreationError, Histogram, RecordError};
use labench_core::{BenchmarkSpec, Phase};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const MAX_SHARDS: usize = 64;

/// Outcome of one dispatched schedule slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub index: u64,
    pub phase: Phase,
    pub scheduled_at: Instant,
    pub started_at: Instant,
    pub completed_at: Instant,
    pub error: Option<ErrorKind>,
}

impl Sample {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Time spent inside the request action.
    pub fn service_time(&self) -> Duration {
        self.completed_at.saturating_duration_since(self.started_at)
    }

    /// Time since the request was due, including any wait for a free worker.
    pub fn response_time(&self) -> Duration {
        self.completed_at.saturating_duration_since(self.scheduled_at)
    }
}

struct Shard {
    corrected: Histogram<u64>,
    uncorrected: Histogram<u64>,
}

/// Latency distributions and counters drained out of a [`LatencyRecorder`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub histogram: Histogram<u64>,
    pub uncorrected: Histogram<u64>,
    pub success: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub unexpected_status: u64,
    pub warm_up: u64,
}

impl Recorded {
    pub fn errors(&self) -> u64 {
        self.timeouts + self.transport_errors + self.unexpected_status
    }
}

/// Multi-writer sample store shared by every worker of a run.
///
/// Writes land in one of several independently locked histogram shards chosen by slot index, so
/// workers rarely contend. Counters are plain atomics.
///
/// With a non-zero base latency, the corrected histogram measures from the scheduled instant and
/// backfills what a stalled worker suppressed. The backfill follows the HdrHistogram
/// `record_correct` series on the service time `S`: when `S` exceeds the base latency,
/// `S - k·interval` is also recorded for every `k ≥ 1` while that stays at or above `interval`.
/// Queueing delay already shows in the scheduled-instant latency of the slots that waited, so it
/// never adds backfill of its own. The uncorrected histogram only ever holds the observed service
/// time.
pub struct LatencyRecorder {
    shards: Box<[Mutex<Shard>]>,
    correction: Option<Correction>,
    success: AtomicU64,
    timeouts: AtomicU64,
    transport_errors: AtomicU64,
    unexpected_status: AtomicU64,
    warm_up: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct Correction {
    base: u64,
    interval: u64,
}

impl Correction {
    fn backfill(&self, histogram: &mut Histogram<u64>, service: u64) -> Result<(), RecordError> {
        if service <= self.base {
            return Ok(());
        }
        let mut missing = service.saturating_sub(self.interval);
        while missing >= self.interval {
            histogram.record(missing)?;
            missing -= self.interval;
        }
        Ok(())
    }
}

impl LatencyRecorder {
    pub fn new(spec: &BenchmarkSpec) -> Result<Self, CreationError> {
        let shard_count = spec.concurrency.next_power_of_two().min(MAX_SHARDS);
        let shards = (0..shard_count)
            .map(|_| {
                Ok(Mutex::new(Shard {
                    corrected: new_histogram(spec)?,
                    uncorrected: new_histogram(spec)?,
                }))
            })
            .collect::<Result<Vec<_>, CreationError>>()?
            .into_boxed_slice();

        let correction = spec.correction_interval().map(|interval| Correction {
            base: micros(spec.base_latency),
            interval: micros(interval).max(1),
        });

        Ok(Self {
            shards,
            correction,
            success: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            unexpected_status: AtomicU64::new(0),
            warm_up: AtomicU64::new(0),
        })
    }

    /// Latency a successful sample contributes: measured from the scheduled instant when
    /// correcting, otherwise the service time.
    pub fn observed_latency(&self, sample: &Sample) -> Duration {
        match self.correction {
            Some(_) => sample.response_time(),
            None => sample.service_time(),
        }
    }

    pub fn ingest(&self, sample: &Sample) {
        if sample.phase == Phase::WarmUp {
            self.warm_up.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if let Some(kind) = sample.error {
            let counter = match kind {
                ErrorKind::Timeout => &self.timeouts,
                ErrorKind::Transport => &self.transport_errors,
                ErrorKind::UnexpectedStatus => &self.unexpected_status,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let service = micros(sample.service_time());
        let idx = (sample.index % self.shards.len() as u64) as usize;
        let mut shard = self.shards[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        shard.uncorrected.saturating_record(service);
        let mut res = shard.corrected.record(micros(self.observed_latency(sample)));
        if let (true, Some(correction)) = (res.is_ok(), self.correction) {
            res = correction.backfill(&mut shard.corrected, service);
        }
        drop(shard);

        if let Err(err) = res {
            warn!("Unable to record latency for slot {}: {err:?}", sample.index);
        }
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    /// Merges every shard into a single pair of histograms.
    pub fn collect(&self) -> Recorded {
        // NOTE: `next_power_of_two` guarantees at least one shard.
        let (mut histogram, mut uncorrected) = {
            let first = self.shards[0]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            (first.corrected.clone(), first.uncorrected.clone())
        };

        for shard in &self.shards[1..] {
            let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(err) = histogram.add(&shard.corrected) {
                error!("Dropping latency shard while merging: {err:?}");
            }
            if let Err(err) = uncorrected.add(&shard.uncorrected) {
                error!("Dropping uncorrected latency shard while merging: {err:?}");
            }
        }

        Recorded {
            histogram,
            uncorrected,
            success: self.success.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            unexpected_status: self.unexpected_status.load(Ordering::Relaxed),
            warm_up: self.warm_up.load(Ordering::Relaxed),
        }
    }
}

fn new_histogram(spec: &BenchmarkSpec) -> Result<Histogram<u64>, CreationError> {
    let mut histogram = Histogram::new_with_max(
        spec.histogram.max_trackable_micros(),
        spec.histogram.significant_digits,
    )?;
    histogram.auto(true);
    Ok(histogram)
}

pub(crate) fn micros(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}
