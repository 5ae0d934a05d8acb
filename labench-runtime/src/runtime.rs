//! Command line runner.
//!
//! Loads a YAML configuration, drives a single benchmark against the configured HTTP endpoint,
//! prints the report and writes the latency distribution to disk.
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::error::RuntimeError;
use crate::request::{TransportOptions, WebRequesterFactory};
use crate::signal::cancel_on_shutdown;
use clap::Parser;
use labench::{cancellation, Benchmark, DistributionFormat, Summary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

/// Padding applied to the printed start and end timestamps.
const TIMESTAMP_PADDING: time::Duration = time::Duration::seconds(5);

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] +0000 UTC");

#[derive(Parser, Debug)]
#[command(version, about = "Rate-controlled HTTP latency benchmark")]
struct LabenchCli {
    /// YAML run configuration.
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

/// Default labench runner.
///
/// # Example
///
/// ```no_run
/// use labench_runtime::LabenchRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     LabenchRuntime::new()
///         .with_args()
///         .run()
///         .await
///         .unwrap();
/// }
/// ```
pub struct LabenchRuntime {
    config_path: PathBuf,
}

impl Default for LabenchRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl LabenchRuntime {
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Takes the configuration path from the first positional argument.
    ///
    /// ```ignore
    /// $ labench
    /// $ labench my-service.yaml
    /// ```
    pub fn with_args(mut self) -> Self {
        let args = LabenchCli::parse();
        self.config_path = args.config;
        self
    }

    pub fn config(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = path.as_ref().to_path_buf();
        self
    }

    #[instrument(name = "labench", skip_all, fields(config = %self.config_path.display()))]
    pub async fn run(self) -> Result<Summary, RuntimeError> {
        let config = Config::load(&self.config_path)?;
        let spec = config.benchmark_spec()?;

        println!("timeStart = {}", format_timestamp(time_start(OffsetDateTime::now_utc())));
        println!("Protocol: {}", spec.protocol);
        if config.clients == 0 {
            println!("Clients: {}", spec.concurrency);
        }

        let factory = WebRequesterFactory::from_config(&config.request)?;
        let requester = Arc::new(factory.build(&TransportOptions::from_config(&config)?)?);
        info!(
            method = %factory.method(),
            url = %factory.url(),
            "Request prepared"
        );

        let action = move || {
            let requester = requester.clone();
            async move { requester.send().await }
        };

        let (handle, cancel) = cancellation();
        let listener = cancel_on_shutdown(handle);
        let res = Benchmark::new(spec, action)
            .run(cancel, config.report_format(), config.pacing())
            .await;
        listener.abort();
        let summary = res?;

        println!("timeEnd   = {}", format_timestamp(time_end(OffsetDateTime::now_utc())));
        println!("{summary}");

        let out_file = config.out_file();
        if let Some(dir) = out_file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| RuntimeError::OutputDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        summary.export_distribution(DistributionFormat::Logarithmic, &out_file)?;
        info!("Latency distribution written to {}", out_file.display());

        Ok(summary)
    }
}

/// Five seconds before `now`, truncated to the second.
fn time_start(now: OffsetDateTime) -> OffsetDateTime {
    truncate_to_second(now - TIMESTAMP_PADDING)
}

/// Five seconds after `now`, rounded to the nearest second.
fn time_end(now: OffsetDateTime) -> OffsetDateTime {
    truncate_to_second(now + TIMESTAMP_PADDING + time::Duration::milliseconds(500))
}

fn truncate_to_second(at: OffsetDateTime) -> OffsetDateTime {
    at - time::Duration::nanoseconds(at.nanosecond() as i64)
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn start_is_padded_and_truncated() {
        let now = datetime!(2024-03-01 12:00:10.900 UTC);
        assert_eq!(time_start(now), datetime!(2024-03-01 12:00:05 UTC));
    }

    #[test]
    fn end_is_padded_and_rounded() {
        assert_eq!(
            time_end(datetime!(2024-03-01 12:00:10.499 UTC)),
            datetime!(2024-03-01 12:00:15 UTC)
        );
        assert_eq!(
            time_end(datetime!(2024-03-01 12:00:10.500 UTC)),
            datetime!(2024-03-01 12:00:16 UTC)
        );
    }

    #[test]
    fn timestamps_render_in_utc() {
        let at = datetime!(2024-03-01 09:05:03 UTC);
        assert_eq!(format_timestamp(at), "2024-03-01 09:05:03 +0000 UTC");
    }

    #[tokio::test]
    async fn missing_config_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let res = LabenchRuntime::new()
            .config(dir.path().join("nope.yaml"))
            .run()
            .await;
        assert!(matches!(res, Err(RuntimeError::ReadConfig { .. })));
    }

    #[tokio::test]
    async fn invalid_spec_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labench.yaml");
        std::fs::write(
            &path,
            "RequestRatePerSec: 10\nDuration: 0s\nRequest:\n  URL: http://127.0.0.1:9/\n",
        )
        .unwrap();

        let res = LabenchRuntime::new().config(&path).run().await;
        assert!(matches!(
            res,
            Err(RuntimeError::Config(labench_core::ConfigError::ZeroDuration))
        ));
    }
}
