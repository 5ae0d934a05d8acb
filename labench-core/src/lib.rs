#![cfg_attr(docsrs, feature(doc_cfg))]
//! Configuration and shared vocabulary of the labench load generator.
mod config;
mod constants;
mod error;
mod phase;

#[cfg(feature = "serde")]
pub mod serde_duration;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use phase::*;
