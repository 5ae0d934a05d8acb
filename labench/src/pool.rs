use crate::action::{RequestAction, RequestError};
use crate::recorder::{LatencyRecorder, Sample};
use crate::scheduler::{RateScheduler, RunWindow, ScheduleSlot, UnboundedSource};
use crate::signal::CancelSignal;
use async_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

/// Where workers take their next slot from.
#[derive(Clone)]
enum SlotSource {
    Paced(Receiver<ScheduleSlot>),
    Unbounded(Arc<UnboundedSource>),
}

impl SlotSource {
    async fn next(&self, stop: &CancelSignal) -> Option<ScheduleSlot> {
        if stop.is_cancelled() {
            return None;
        }
        match self {
            SlotSource::Paced(rx) => tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                slot = rx.recv() => slot.ok(),
            },
            SlotSource::Unbounded(source) => source.next_slot(),
        }
    }
}

/// Slot accounting of a finished pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolReport {
    /// Slots produced by the scheduler, or minted inline by unbounded workers.
    pub emitted: u64,
    /// Slots still queued when the pool stopped. These were never dispatched.
    pub unsent: u64,
}

/// Fixed set of `concurrency` executors fed by one slot source.
pub(crate) struct WorkerPool {
    tasks: Vec<JoinHandle<()>>,
    scheduler: Option<JoinHandle<u64>>,
    source: SlotSource,
}

impl WorkerPool {
    pub fn spawn<A>(
        action: &A,
        concurrency: usize,
        request_timeout: Duration,
        scheduler: Option<RateScheduler>,
        window: RunWindow,
        recorder: Arc<LatencyRecorder>,
        stop: CancelSignal,
    ) -> Self
    where
        A: RequestAction + Clone,
    {
        let (source, scheduler) = match scheduler {
            Some(scheduler) => {
                let (tx, rx) = async_channel::unbounded();
                let handle = tokio::spawn(scheduler.run(tx, stop.clone()).in_current_span());
                (SlotSource::Paced(rx), Some(handle))
            }
            None => (
                SlotSource::Unbounded(Arc::new(UnboundedSource::new(window))),
                None,
            ),
        };

        let tasks = (0..concurrency)
            .map(|id| {
                let worker = Worker {
                    action: action.clone(),
                    source: source.clone(),
                    recorder: recorder.clone(),
                    request_timeout,
                    stop: stop.clone(),
                };
                tokio::spawn(
                    worker
                        .run()
                        .instrument(tracing::trace_span!("worker", id)),
                )
            })
            .collect();

        debug!("Spawned {concurrency} workers");

        Self {
            tasks,
            scheduler,
            source,
        }
    }

    /// Waits for the scheduler and every worker to exit. Only call after `stop` has fired.
    pub async fn join(self) -> PoolReport {
        let emitted = match self.scheduler {
            Some(handle) => handle.await.unwrap_or_else(|err| {
                error!("Scheduler task failed: {err}");
                0
            }),
            None => 0,
        };

        for task in self.tasks {
            if let Err(err) = task.await {
                error!("Worker task failed: {err}");
            }
        }

        match self.source {
            SlotSource::Paced(rx) => PoolReport {
                emitted,
                unsent: rx.len() as u64,
            },
            SlotSource::Unbounded(source) => PoolReport {
                emitted: source.minted(),
                unsent: 0,
            },
        }
    }
}

struct Worker<A> {
    action: A,
    source: SlotSource,
    recorder: Arc<LatencyRecorder>,
    request_timeout: Duration,
    stop: CancelSignal,
}

impl<A: RequestAction> Worker<A> {
    async fn run(self) {
        // NOTE: A slot, once claimed, is always dispatched and recorded, even if `stop` fires
        // while the request is in flight. The per-call timeout bounds how long that takes.
        while let Some(slot) = self.source.next(&self.stop).await {
            let sample = self.dispatch(slot).await;
            self.recorder.ingest(&sample);

            #[cfg(feature = "metrics")]
            publish_metrics(&sample, self.recorder.observed_latency(&sample));
        }
        trace!("Worker exiting");
    }

    async fn dispatch(&self, slot: ScheduleSlot) -> Sample {
        let started_at = Instant::now();
        let res = match timeout(self.request_timeout, self.action.call()).await {
            Ok(res) => res,
            Err(_) => Err(RequestError::Timeout(self.request_timeout)),
        };
        let completed_at = Instant::now();

        if let Err(err) = &res {
            trace!("Slot {} failed: {err}", slot.index);
        }

        Sample {
            index: slot.index,
            phase: slot.phase,
            scheduled_at: slot.scheduled_at,
            started_at,
            completed_at,
            error: res.err().map(|err| err.kind()),
        }
    }
}

#[cfg(feature = "metrics")]
fn publish_metrics(sample: &Sample, latency: Duration) {
    if sample.is_success() {
        metrics::counter!("labench_request_success").increment(1);
    } else {
        metrics::counter!("labench_request_error").increment(1);
    }
    metrics::histogram!("labench_request_latency").record(latency.as_secs_f64());
}
