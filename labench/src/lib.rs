#![cfg_attr(docsrs, feature(doc_cfg))]
//! Open-loop, rate-controlled load generation with coordinated-omission corrected latency
//! histograms.
//!
//! A [`Benchmark`] fires a [`RequestAction`] at a fixed arrival rate from a bounded pool of
//! workers. Issuance never waits on completions, so a slow system under test shows up as latency
//! rather than as a lower request rate. The resulting [`Summary`] carries the percentile table and
//! can be exported as an HdrHistogram `.hgrm` distribution.

mod action;
mod benchmark;
mod error;
mod export;
mod pool;
mod recorder;
mod scheduler;
mod signal;
mod summary;

pub use action::{ErrorKind, RequestAction, RequestError};
pub use benchmark::Benchmark;
pub use error::{ExportError, RunError};
pub use export::DistributionFormat;
pub use recorder::{LatencyRecorder, Recorded, Sample};
pub use scheduler::ScheduleSlot;
pub use signal::{cancellation, CancelHandle, CancelSignal};
pub use summary::{ErrorBreakdown, PercentileRow, ReportFormat, Summary, REPORTED_QUANTILES};

pub use labench_core as core;
pub use labench_core::{BenchmarkSpec, HistogramConfig, Pacing, Phase, Protocol, RunState};

pub mod prelude {
    pub use crate::{
        cancellation, Benchmark, BenchmarkSpec, CancelHandle, CancelSignal, DistributionFormat,
        Pacing, ReportFormat, RequestAction, RequestError, Summary,
    };
}
