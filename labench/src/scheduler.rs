//! Open-loop issuance schedule.
//!
//! The scheduler is the only timing authority of a run. It pushes slots into an unbounded queue
//! and never waits on the workers draining it, so a backlog shows up as queueing delay in the
//! recorded latencies instead of as a lower arrival rate.
use crate::signal::CancelSignal;
use async_channel::Sender;
use labench_core::{BenchmarkSpec, Pacing, Phase, COARSE_TICK};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Permission to issue one request at `scheduled_at`. Consumed by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub index: u64,
    pub scheduled_at: Instant,
    pub phase: Phase,
}

/// Phase boundaries shared by the paced and the unbounded slot sources.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunWindow {
    pub start: Instant,
    pub warm_up_end: Instant,
    pub end: Instant,
}

impl RunWindow {
    pub fn new(start: Instant, spec: &BenchmarkSpec) -> Self {
        Self {
            start,
            warm_up_end: start + spec.warm_up,
            end: start + spec.total_duration(),
        }
    }

    pub fn phase_of(&self, at: Instant) -> Phase {
        if at < self.warm_up_end {
            Phase::WarmUp
        } else {
            Phase::Measure
        }
    }
}

pub(crate) struct RateScheduler {
    window: RunWindow,
    rate: u64,
    pacing: Pacing,
}

impl RateScheduler {
    /// Returns `None` for an unbounded rate, which has no schedule to follow.
    pub fn new(window: RunWindow, rate: u64, pacing: Pacing) -> Option<Self> {
        if rate == 0 {
            return None;
        }
        Some(Self {
            window,
            rate,
            pacing,
        })
    }

    /// Absolute deadline of slot `k`, `t0 + k/R`, computed without accumulating rounding error.
    pub fn deadline(&self, k: u64) -> Instant {
        let offset = k as u128 * 1_000_000_000 / self.rate as u128;
        self.window.start + Duration::from_nanos(offset as u64)
    }

    fn slot(&self, index: u64, scheduled_at: Instant) -> ScheduleSlot {
        ScheduleSlot {
            index,
            scheduled_at,
            phase: self.window.phase_of(self.deadline(index)),
        }
    }

    /// Emits slots until the run window closes, `stop` fires, or every consumer is gone.
    /// Returns the number of slots emitted.
    pub async fn run(self, tx: Sender<ScheduleSlot>, stop: CancelSignal) -> u64 {
        debug!(rate = self.rate, pacing = ?self.pacing, "Scheduler started");
        let emitted = match self.pacing {
            Pacing::Precise => self.run_precise(&tx, &stop).await,
            Pacing::Coarse => self.run_coarse(&tx, &stop).await,
        };
        tx.close();
        debug!(emitted, "Scheduler finished");
        emitted
    }

    async fn run_precise(&self, tx: &Sender<ScheduleSlot>, stop: &CancelSignal) -> u64 {
        let mut k = 0;
        loop {
            let deadline = self.deadline(k);
            if deadline >= self.window.end {
                break k;
            }

            if Instant::now() < deadline {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break k,
                    _ = sleep_until(deadline) => {}
                }
            } else if stop.is_cancelled() {
                break k;
            }

            // NOTE: The queue is unbounded, so this only fails once every worker has exited.
            if tx.try_send(self.slot(k, deadline)).is_err() {
                break k;
            }
            k += 1;
        }
    }

    async fn run_coarse(&self, tx: &Sender<ScheduleSlot>, stop: &CancelSignal) -> u64 {
        let period = Duration::from_nanos(1_000_000_000 / self.rate).max(COARSE_TICK);
        let mut ticker = interval_at(self.window.start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut k = 0;
        loop {
            let tick = tokio::select! {
                biased;
                _ = stop.cancelled() => break k,
                tick = ticker.tick() => tick,
            };

            loop {
                let deadline = self.deadline(k);
                if deadline >= self.window.end {
                    return k;
                }
                if deadline > tick {
                    break;
                }
                if tx.try_send(self.slot(k, tick)).is_err() {
                    return k;
                }
                k += 1;
            }
        }
    }
}

/// Slot source for unbounded runs: workers mint their own slots back-to-back.
pub(crate) struct UnboundedSource {
    window: RunWindow,
    next: AtomicU64,
}

impl UnboundedSource {
    pub fn new(window: RunWindow) -> Self {
        Self {
            window,
            next: AtomicU64::new(0),
        }
    }

    pub fn next_slot(&self) -> Option<ScheduleSlot> {
        let now = Instant::now();
        if now >= self.window.end {
            return None;
        }
        Some(ScheduleSlot {
            index: self.next.fetch_add(1, Ordering::Relaxed),
            scheduled_at: now,
            phase: self.window.phase_of(now),
        })
    }

    pub fn minted(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::cancellation;

    fn window(warm_up: Duration, duration: Duration) -> RunWindow {
        let spec = BenchmarkSpec::new(1, 1, duration).warm_up(warm_up);
        RunWindow::new(Instant::now(), &spec)
    }

    async fn collect(scheduler: RateScheduler) -> Vec<ScheduleSlot> {
        let (tx, rx) = async_channel::unbounded();
        let emitted = scheduler.run(tx, CancelSignal::never()).await;
        let mut slots = vec![];
        while let Ok(slot) = rx.try_recv() {
            slots.push(slot);
        }
        assert_eq!(emitted as usize, slots.len());
        slots
    }

    #[test]
    fn unbounded_rate_has_no_scheduler() {
        let w = window(Duration::ZERO, Duration::from_secs(1));
        assert!(RateScheduler::new(w, 0, Pacing::Precise).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn precise_slot_count_is_floor_of_rate_times_duration() {
        for (rate, millis) in [(1_000, 1_000), (3, 1_000), (7, 2_500), (100, 10_000)] {
            let duration = Duration::from_millis(millis);
            let w = window(Duration::ZERO, duration);
            let scheduler = RateScheduler::new(w, rate, Pacing::Precise).unwrap();
            let slots = collect(scheduler).await;

            let expected = BenchmarkSpec::new(rate, 1, duration).expected_slots(duration);
            assert!(
                (slots.len() as i64 - expected as i64).abs() <= 1,
                "rate={rate} duration={duration:?} got {} expected {expected}",
                slots.len()
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn precise_deadlines_do_not_drift() {
        let w = window(Duration::ZERO, Duration::from_secs(3));
        let start = w.start;
        let scheduler = RateScheduler::new(w, 3, Pacing::Precise).unwrap();
        let slots = collect(scheduler).await;

        // 1/3s is not representable in whole nanoseconds; the absolute schedule still lands on
        // whole seconds.
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[3].scheduled_at - start, Duration::from_secs(1));
        assert_eq!(slots[6].scheduled_at - start, Duration::from_secs(2));
        assert!(slots
            .windows(2)
            .all(|pair| pair[0].scheduled_at <= pair[1].scheduled_at));
    }

    #[tokio::test(start_paused = true)]
    async fn tags_warm_up_slots() {
        let w = window(Duration::from_secs(1), Duration::from_secs(2));
        let scheduler = RateScheduler::new(w, 10, Pacing::Precise).unwrap();
        let slots = collect(scheduler).await;

        assert_eq!(slots.len(), 30);
        let warm = slots.iter().filter(|s| s.phase == Phase::WarmUp).count();
        assert_eq!(warm, 10);
        assert!(slots[10..].iter().all(|s| s.phase == Phase::Measure));
    }

    #[tokio::test(start_paused = true)]
    async fn coarse_batches_sub_millisecond_slots() {
        let w = window(Duration::ZERO, Duration::from_millis(100));
        let start = w.start;
        let scheduler = RateScheduler::new(w, 10_000, Pacing::Coarse).unwrap();
        let slots = collect(scheduler).await;

        assert_eq!(slots.len(), 1_000);
        assert_eq!(slots[0].scheduled_at, start);
        // Ten slots share every later 1ms tick.
        let first_tick = start + Duration::from_millis(1);
        assert!(slots[1..=10].iter().all(|s| s.scheduled_at == first_tick));
        assert_eq!(slots[11].scheduled_at - start, Duration::from_millis(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_signal() {
        let w = window(Duration::ZERO, Duration::from_secs(10));
        let scheduler = RateScheduler::new(w, 10, Pacing::Precise).unwrap();
        let (handle, stop) = cancellation();
        let (tx, rx) = async_channel::unbounded();

        let task = tokio::spawn(scheduler.run(tx, stop));
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        handle.cancel();

        let emitted = task.await.unwrap();
        assert_eq!(emitted, 11);
        assert_eq!(rx.len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_source_mints_until_window_closes() {
        let w = window(Duration::ZERO, Duration::from_millis(10));
        let source = UnboundedSource::new(w);
        assert_eq!(source.next_slot().map(|s| s.index), Some(0));
        assert_eq!(source.next_slot().map(|s| s.index), Some(1));

        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(source.next_slot().is_none());
        assert_eq!(source.minted(), 2);
    }
}
