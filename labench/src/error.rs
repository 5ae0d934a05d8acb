use labench_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to start a run. Raised before any request is issued.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid benchmark configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to allocate latency histograms: {0:?}")]
    Setup(hdrhistogram::CreationError),
}

impl From<hdrhistogram::CreationError> for RunError {
    fn from(err: hdrhistogram::CreationError) -> Self {
        Self::Setup(err)
    }
}

/// Failure to write a latency distribution. The summary itself stays valid.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
