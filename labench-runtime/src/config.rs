//! YAML run configuration.
//!
//! Keys are PascalCase:
//!
//! ```yaml
//! RequestRatePerSec: 100
//! Clients: 50
//! WarmUpDuration: 2s
//! Duration: 30s
//! BaseLatency: 1ms
//! RequestTimeout: 5s
//! ReuseConnections: true
//! TightTicker: true
//! Protocol: HTTP/1.1
//! OutFile: out/res.hgrm
//! Request:
//!   URL: http://localhost:3002/delay/ms/5
//!   HTTPMethod: GET
//!   Headers:
//!     Accept: application/json
//!   ExpectedHTTPStatusCode: 200
//! ```
use crate::error::RuntimeError;
use labench::ReportFormat;
use labench_core::{
    derived_clients, serde_duration, BenchmarkSpec, ConfigError, Pacing, Protocol,
    DEFAULT_REQUEST_TIMEOUT,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub const DEFAULT_CONFIG_FILE: &str = "labench.yaml";
pub const DEFAULT_OUT_FILE: &str = "out/res.hgrm";
const DEFAULT_EXPECTED_STATUS: u16 = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(default)]
    pub request_rate_per_sec: u64,
    /// Zero derives the count from the rate and the request timeout.
    #[serde(default)]
    pub clients: usize,
    #[serde(default, with = "serde_duration")]
    pub warm_up_duration: Duration,
    #[serde(with = "serde_duration")]
    pub duration: Duration,
    #[serde(default, with = "serde_duration")]
    pub base_latency: Duration,
    #[serde(default, with = "serde_duration")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub reuse_connections: bool,
    #[serde(default)]
    pub dont_linger: bool,
    #[serde(default, rename = "OutputJSON")]
    pub output_json: bool,
    #[serde(default)]
    pub tight_ticker: bool,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub out_file: Option<PathBuf>,
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestConfig {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "HTTPMethod", default)]
    pub http_method: String,
    #[serde(rename = "Headers", default)]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "BodyFile", default)]
    pub body_file: Option<PathBuf>,
    #[serde(rename = "ExpectedHTTPStatusCode", default)]
    pub expected_http_status_code: u16,
}

impl RequestConfig {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty() || self.body_file.is_some()
    }

    /// Configured method, or GET without a body and POST with one.
    pub fn method(&self) -> &str {
        match self.http_method.as_str() {
            "" if self.has_body() => "POST",
            "" => "GET",
            method => method,
        }
    }

    pub fn expected_status(&self) -> u16 {
        match self.expected_http_status_code {
            0 => DEFAULT_EXPECTED_STATUS,
            code => code,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RuntimeError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_yaml(&raw)?)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if config.dont_linger {
            warn!("DontLinger is not supported and will be ignored");
        }
        Ok(config)
    }

    pub fn protocol(&self) -> Result<Protocol, ConfigError> {
        self.protocol.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        if self.request_timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            self.request_timeout
        }
    }

    /// Configured client count; when unset, enough clients to cover the request timeout.
    pub fn clients(&self) -> usize {
        match self.clients {
            0 => derived_clients(self.request_rate_per_sec, self.request_timeout()),
            clients => clients,
        }
    }

    pub fn pacing(&self) -> Pacing {
        if self.tight_ticker {
            Pacing::Precise
        } else {
            Pacing::Coarse
        }
    }

    pub fn report_format(&self) -> ReportFormat {
        if self.output_json {
            ReportFormat::Json
        } else {
            ReportFormat::Text
        }
    }

    pub fn out_file(&self) -> PathBuf {
        self.out_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_FILE))
    }

    pub fn benchmark_spec(&self) -> Result<BenchmarkSpec, ConfigError> {
        if self.request_rate_per_sec == 0 && self.clients == 0 {
            return Err(ConfigError::UnboundedWithoutClients);
        }
        let spec = BenchmarkSpec::new(self.request_rate_per_sec, self.clients(), self.duration)
            .warm_up(self.warm_up_duration)
            .request_timeout(self.request_timeout())
            .base_latency(self.base_latency)
            .protocol(self.protocol()?);
        spec.validate()?;
        Ok(spec)
    }
}
