use crate::pool::PoolReport;
use crate::recorder::Recorded;
use hdrhistogram::Histogram;
use labench_core::{BenchmarkSpec, HistogramConfig, RunState};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Quantiles shown in every report. `1.0` is the maximum.
pub const REPORTED_QUANTILES: [f64; 8] = [0.5, 0.75, 0.9, 0.95, 0.99, 0.999, 0.9999, 1.0];

/// How a [`Summary`] renders through `Display`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileRow {
    pub quantile: f64,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorBreakdown {
    pub timeout: u64,
    pub transport: u64,
    pub unexpected_status: u64,
}

/// Aggregate result of one run. Built once, after every worker has exited.
#[derive(Debug, Clone)]
pub struct Summary {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub errors: ErrorBreakdown,
    /// Requests completed during warm-up. Never part of the histograms.
    pub warm_up_requests: u64,
    /// Scheduled slots still queued when the run stopped.
    pub unsent: u64,
    /// Length of the measurement window that actually ran.
    pub elapsed: Duration,
    pub state: RunState,
    pub interrupted: bool,
    pub rate: u64,
    pub concurrency: usize,
    pub base_latency: Duration,
    pub percentiles: Vec<PercentileRow>,
    pub uncorrected_percentiles: Vec<PercentileRow>,
    /// Latency distribution in microseconds, corrected for coordinated omission when enabled.
    pub histogram: Histogram<u64>,
    /// Observed service times in microseconds.
    pub uncorrected: Histogram<u64>,
    pub histogram_config: HistogramConfig,
    pub format: ReportFormat,
}

impl Summary {
    pub(crate) fn compute(
        spec: &BenchmarkSpec,
        recorded: Recorded,
        pool: PoolReport,
        elapsed: Duration,
        state: RunState,
        format: ReportFormat,
    ) -> Self {
        let error_count = recorded.errors();
        Self {
            total_requests: recorded.success + error_count,
            success_count: recorded.success,
            error_count,
            errors: ErrorBreakdown {
                timeout: recorded.timeouts,
                transport: recorded.transport_errors,
                unexpected_status: recorded.unexpected_status,
            },
            warm_up_requests: recorded.warm_up,
            unsent: pool.unsent,
            elapsed,
            state,
            interrupted: state == RunState::Aborted,
            rate: spec.rate,
            concurrency: spec.concurrency,
            base_latency: spec.base_latency,
            percentiles: percentile_table(&recorded.histogram),
            uncorrected_percentiles: percentile_table(&recorded.uncorrected),
            histogram: recorded.histogram,
            uncorrected: recorded.uncorrected,
            histogram_config: spec.histogram,
            format,
        }
    }

    /// Completed requests per second of measurement.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.total_requests as f64 / secs
        } else {
            0.
        }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        Duration::from_micros(self.histogram.value_at_quantile(quantile))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.report())
    }

    fn report(&self) -> SummaryReport {
        SummaryReport {
            state: self.state.to_string(),
            interrupted: self.interrupted,
            rate: self.rate,
            concurrency: self.concurrency,
            total_requests: self.total_requests,
            success_count: self.success_count,
            error_count: self.error_count,
            errors: self.errors,
            warm_up_requests: self.warm_up_requests,
            unsent: self.unsent,
            elapsed_ms: millis(self.elapsed),
            throughput: self.throughput(),
            coordinated_omission_corrected: !self.base_latency.is_zero(),
            latency: rows(&self.percentiles),
            uncorrected_latency: rows(&self.uncorrected_percentiles),
        }
    }
}

fn percentile_table(histogram: &Histogram<u64>) -> Vec<PercentileRow> {
    REPORTED_QUANTILES
        .iter()
        .map(|&quantile| PercentileRow {
            quantile,
            latency: Duration::from_micros(histogram.value_at_quantile(quantile)),
        })
        .collect()
}

fn label(quantile: f64) -> String {
    if quantile >= 1. {
        "max".to_string()
    } else {
        let percent = format!("{:.4}", quantile * 100.);
        format!("p{}", percent.trim_end_matches('0').trim_end_matches('.'))
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.
}

#[derive(Serialize)]
struct LatencyRow {
    percentile: String,
    latency_ms: f64,
}

fn rows(table: &[PercentileRow]) -> Vec<LatencyRow> {
    table
        .iter()
        .map(|row| LatencyRow {
            percentile: label(row.quantile),
            latency_ms: millis(row.latency),
        })
        .collect()
}

#[derive(Serialize)]
struct SummaryReport {
    state: String,
    interrupted: bool,
    rate: u64,
    concurrency: usize,
    total_requests: u64,
    success_count: u64,
    error_count: u64,
    errors: ErrorBreakdown,
    warm_up_requests: u64,
    unsent: u64,
    elapsed_ms: f64,
    throughput: f64,
    coordinated_omission_corrected: bool,
    latency: Vec<LatencyRow>,
    uncorrected_latency: Vec<LatencyRow>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.format == ReportFormat::Json {
            let json = self.to_json().map_err(|_| fmt::Error)?;
            return f.write_str(&json);
        }

        writeln!(f, "State:       {} (interrupted: {})", self.state, self.interrupted)?;
        writeln!(
            f,
            "Load:        {} req/s over {} clients",
            self.rate, self.concurrency
        )?;
        writeln!(
            f,
            "Requests:    {} total, {} ok, {} errors (timeout={}, transport={}, status={})",
            self.total_requests,
            self.success_count,
            self.error_count,
            self.errors.timeout,
            self.errors.transport,
            self.errors.unexpected_status,
        )?;
        writeln!(f, "Warm-up:     {} requests excluded", self.warm_up_requests)?;
        writeln!(f, "Unsent:      {}", self.unsent)?;
        writeln!(
            f,
            "Elapsed:     {}",
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        )?;
        writeln!(f, "Throughput:  {:.2} req/s", self.throughput())?;
        writeln!(f, "Latency      corrected        uncorrected")?;
        for (corrected, uncorrected) in self.percentiles.iter().zip(&self.uncorrected_percentiles) {
            writeln!(
                f,
                "  {:<9} {:<16} {:?}",
                label(corrected.quantile),
                format!("{:?}", corrected.latency),
                uncorrected.latency,
            )?;
        }
        Ok(())
    }
}
