//! HTTP requests built from the `Request` configuration block.
use crate::config::{Config, RequestConfig};
use crate::error::RuntimeError;
use labench::RequestError;
use labench_core::{ConfigError, Protocol};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Connection settings of the shared HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub protocol: Protocol,
    pub request_timeout: Duration,
    pub reuse_connections: bool,
    pub insecure: bool,
}

impl TransportOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            protocol: config.protocol()?,
            request_timeout: config.request_timeout(),
            reuse_connections: config.reuse_connections,
            insecure: config.insecure,
        })
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        let mut builder = Client::builder().timeout(self.request_timeout);

        builder = match self.protocol {
            Protocol::Http1 => builder.http1_only(),
            Protocol::Http2 => builder.http2_prior_knowledge(),
        };

        // HTTP/2 multiplexes over one connection, so the reuse toggle only applies to HTTP/1.1.
        if !self.reuse_connections && self.protocol == Protocol::Http1 {
            builder = builder.pool_max_idle_per_host(0);
        }

        if self.insecure {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build()
    }
}

/// Everything about a request that is fixed for the whole run.
#[derive(Debug, Clone)]
pub struct WebRequesterFactory {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    expected_status: u16,
}

impl WebRequesterFactory {
    /// Validates the request block and reads `BodyFile`, if any.
    pub fn from_config(request: &RequestConfig) -> Result<Self, RuntimeError> {
        let method = Method::from_bytes(request.method().as_bytes()).map_err(|_| {
            ConfigError::Invalid(format!("invalid HTTP method `{}`", request.method()))
        })?;

        let url = Url::parse(&request.url)
            .map_err(|err| ConfigError::Invalid(format!("invalid URL `{}`: {err}", request.url)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::Invalid(format!("invalid header name `{name}`")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ConfigError::Invalid(format!("invalid value for header `{name}`")))?;
            headers.insert(name, value);
        }

        let body = match &request.body_file {
            Some(path) => Some(std::fs::read(path).map_err(|source| {
                RuntimeError::ReadConfig {
                    path: path.clone(),
                    source,
                }
            })?),
            None if request.body.is_empty() => None,
            None => Some(request.body.clone().into_bytes()),
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
            expected_status: request.expected_status(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds the transport once and binds the request to it. Every clone of the requester shares
    /// the same client.
    pub fn build(&self, options: &TransportOptions) -> reqwest::Result<WebRequester> {
        Ok(WebRequester {
            client: options.build_client()?,
            template: self.clone(),
            request_timeout: options.request_timeout,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WebRequester {
    client: Client,
    template: WebRequesterFactory,
    request_timeout: Duration,
}

impl WebRequester {
    /// Sends one request and drains the response body.
    pub async fn send(&self) -> Result<(), RequestError> {
        let template = &self.template;
        let mut request = self
            .client
            .request(template.method.clone(), template.url.clone())
            .headers(template.headers.clone());
        if let Some(body) = &template.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|err| self.classify(err))?;
        let status = response.status().as_u16();
        response.bytes().await.map_err(|err| self.classify(err))?;

        if status != template.expected_status {
            return Err(RequestError::UnexpectedStatus {
                expected: template.expected_status,
                actual: status,
            });
        }
        Ok(())
    }

    fn classify(&self, err: reqwest::Error) -> RequestError {
        if err.is_timeout() {
            RequestError::Timeout(self.request_timeout)
        } else {
            RequestError::Transport(err.to_string())
        }
    }
}
