//! Command line runtime for labench: YAML configuration, the HTTP request factory and process
//! signal handling around the core [`labench::Benchmark`].
pub mod config;
pub mod request;
pub mod runtime;

mod error;
mod signal;

pub use crate::config::Config;
pub use crate::error::RuntimeError;
pub use crate::request::{TransportOptions, WebRequester, WebRequesterFactory};
pub use crate::runtime::LabenchRuntime;
