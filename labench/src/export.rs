//! Percentile distribution files in the HdrHistogram `.hgrm` layout, readable by the usual
//! latency plotting tools.
use crate::error::ExportError;
use crate::summary::Summary;
use hdrhistogram::Histogram;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const FORMAT_VERSION: u32 = 1;
const TICKS_PER_HALF_DISTANCE: u32 = 5;
const MAX_LOGARITHMIC_QUANTILE: f64 = 0.999_999;
const MICROS_PER_MILLI: f64 = 1_000.;

/// Percentile steps of an exported distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistributionFormat {
    /// Steps halve the remaining distance to 100% with a fixed number of ticks per half:
    /// `0, 0.1 .. 0.5, 0.55 .. 0.75, 0.775 ..` up to 99.9999%, then 100%.
    #[default]
    Logarithmic,
    /// 1% steps.
    Linear,
}

impl DistributionFormat {
    pub fn quantiles(&self) -> Vec<f64> {
        match self {
            DistributionFormat::Logarithmic => logarithmic_quantiles(),
            DistributionFormat::Linear => (0..=100).map(|p| p as f64 / 100.).collect(),
        }
    }
}

fn logarithmic_quantiles() -> Vec<f64> {
    let mut quantiles = vec![];
    let mut lower = 0.;
    let mut span = 0.5;
    loop {
        for tick in 0..TICKS_PER_HALF_DISTANCE {
            let quantile = lower + span * tick as f64 / TICKS_PER_HALF_DISTANCE as f64;
            if quantile > MAX_LOGARITHMIC_QUANTILE {
                quantiles.push(1.);
                return quantiles;
            }
            quantiles.push(quantile);
        }
        lower += span;
        span /= 2.;
    }
}

impl Summary {
    /// Writes the corrected latency distribution to `path`, replacing any existing file.
    pub fn export_distribution(
        &self,
        format: DistributionFormat,
        path: impl AsRef<Path>,
    ) -> Result<(), ExportError> {
        let path = path.as_ref();
        let io_err = |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        self.write_distribution(format, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(io_err)
    }

    pub fn write_distribution<W: Write>(
        &self,
        format: DistributionFormat,
        writer: &mut W,
    ) -> io::Result<()> {
        let histogram = &self.histogram;

        writeln!(
            writer,
            "#[labench latency distribution, format version {FORMAT_VERSION}, values in ms]"
        )?;
        writeln!(
            writer,
            "#[SignificantDigits = {}, MaxTrackableValue = {:.3}]",
            histogram.sigfig(),
            histogram.high() as f64 / MICROS_PER_MILLI,
        )?;
        writeln!(
            writer,
            "{:>12} {:>14} {:>10} {:>14}\n",
            "Value", "Percentile", "TotalCount", "1/(1-Percentile)"
        )?;

        for quantile in format.quantiles() {
            let value = histogram.value_at_quantile(quantile);
            let count = histogram.count_between(0, value);
            let value_ms = value as f64 / MICROS_PER_MILLI;
            if quantile < 1. {
                writeln!(
                    writer,
                    "{:>12.3} {:.12} {:>10} {:>14.2}",
                    value_ms,
                    quantile,
                    count,
                    1. / (1. - quantile)
                )?;
            } else {
                writeln!(writer, "{:>12.3} {:.12} {:>10}", value_ms, quantile, count)?;
            }
        }

        writeln!(
            writer,
            "#[Mean    = {:>12.3}, StdDeviation   = {:>12.3}]",
            histogram.mean() / MICROS_PER_MILLI,
            histogram.stdev() / MICROS_PER_MILLI,
        )?;
        writeln!(
            writer,
            "#[Max     = {:>12.3}, Total count    = {:>12}]",
            histogram.max() as f64 / MICROS_PER_MILLI,
            histogram.len(),
        )?;
        let (buckets, sub_buckets) = bucket_layout(histogram);
        writeln!(
            writer,
            "#[Buckets = {:>12}, SubBuckets     = {:>12}]",
            buckets, sub_buckets
        )?;
        Ok(())
    }
}

/// Bucket and sub-bucket counts as laid out by the histogram itself, after any auto-resize.
fn bucket_layout(histogram: &Histogram<u64>) -> (u8, usize) {
    let buckets = histogram.buckets();
    // The counts array holds `buckets + 1` halves of a sub-bucket.
    let sub_buckets = 2 * histogram.distinct_values() / (usize::from(buckets) + 1);
    (buckets, sub_buckets)
}
