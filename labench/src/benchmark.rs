//! Run lifecycle: warm-up, measurement, drain.
use crate::action::RequestAction;
use crate::error::RunError;
use crate::pool::WorkerPool;
use crate::recorder::LatencyRecorder;
use crate::scheduler::{RateScheduler, RunWindow};
use crate::signal::{cancellation, CancelSignal};
use crate::summary::{ReportFormat, Summary};
use labench_core::{BenchmarkSpec, Pacing, RunState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// A configured load test against one [`RequestAction`].
///
/// # Example
/// ```no_run
/// use labench::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let spec = BenchmarkSpec::new(100, 20, Duration::from_secs(10))
///         .warm_up(Duration::from_secs(2))
///         .base_latency(Duration::from_millis(1));
///
///     let action = || async {
///         tokio::time::sleep(Duration::from_millis(5)).await;
///         Ok::<(), RequestError>(())
///     };
///
///     let summary = Benchmark::new(spec, action)
///         .run(CancelSignal::never(), ReportFormat::Text, Pacing::Precise)
///         .await
///         .unwrap();
///     println!("{summary}");
/// }
/// ```
pub struct Benchmark<A> {
    spec: BenchmarkSpec,
    action: A,
}

impl<A> Benchmark<A>
where
    A: RequestAction + Clone,
{
    pub fn new(spec: BenchmarkSpec, action: A) -> Self {
        Self { spec, action }
    }

    pub fn spec(&self) -> &BenchmarkSpec {
        &self.spec
    }

    /// Drives one run to completion or until `cancel` fires.
    ///
    /// Only setup failures are errors. A cancelled run still drains its in-flight requests and
    /// returns a partial [`Summary`] flagged as interrupted.
    #[instrument(
        name = "benchmark",
        skip_all,
        fields(rate = self.spec.rate, concurrency = self.spec.concurrency)
    )]
    pub async fn run(
        &self,
        cancel: CancelSignal,
        format: ReportFormat,
        pacing: Pacing,
    ) -> Result<Summary, RunError> {
        let mut state = RunState::Created;
        self.spec.validate()?;
        let recorder = Arc::new(LatencyRecorder::new(&self.spec)?);

        info!(
            warm_up = %humantime::format_duration(self.spec.warm_up),
            duration = %humantime::format_duration(self.spec.duration),
            timeout = %humantime::format_duration(self.spec.request_timeout),
            base_latency = ?self.spec.base_latency,
            ?pacing,
            "Benchmark {state}"
        );

        let window = RunWindow::new(Instant::now(), &self.spec);
        let (stop_handle, stop) = cancellation();
        let pool = WorkerPool::spawn(
            &self.action,
            self.spec.concurrency,
            self.spec.request_timeout,
            RateScheduler::new(window, self.spec.rate, pacing),
            window,
            recorder.clone(),
            stop,
        );

        let mut cancelled = false;
        let mut measure_start = None;

        if window.warm_up_end > window.start {
            state = transition(state, RunState::WarmingUp);
            cancelled = wait_until(&cancel, window.warm_up_end).await;
        }

        if !cancelled {
            state = transition(state, RunState::Measuring);
            measure_start = Some(window.warm_up_end);
            cancelled = wait_until(&cancel, window.end).await;
        }

        let stopped_at = Instant::now();
        state = transition(state, RunState::Draining);
        stop_handle.cancel();
        let report = pool.join().await;
        debug!(
            emitted = report.emitted,
            unsent = report.unsent,
            "Workers drained"
        );

        let elapsed = measure_start
            .map(|start| stopped_at.saturating_duration_since(start))
            .unwrap_or(Duration::ZERO);
        let outcome = if cancelled {
            RunState::Aborted
        } else {
            RunState::Completed
        };
        transition(state, outcome);

        Ok(Summary::compute(
            &self.spec,
            recorder.collect(),
            report,
            elapsed,
            outcome,
            format,
        ))
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    info!("Benchmark {from} -> {to}");
    to
}

/// Sleeps until `deadline`. Returns `true` if `cancel` fired first.
async fn wait_until(cancel: &CancelSignal, deadline: Instant) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Benchmark cancelled");
            true
        }
        _ = sleep_until(deadline) => false,
    }
}
