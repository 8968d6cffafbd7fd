//! HTTP retrieval of Logstash monitoring documents.
//!
//! A `Fetcher` is bound to one resource (`endpoint` + fixed path) at
//! construction time and performs a single GET per call. It never retries;
//! failures go back to the owning collector.

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::trace;

use super::collectors::{
    error::{CollectorError, RegistrationError},
    types::CollectorResult,
};

/// Issues GET requests against one Logstash API resource.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    url: Url,
}

impl Fetcher {
    /// Binds a fetcher to `endpoint` + `path`.
    ///
    /// The endpoint is concatenated rather than URL-joined so a base path
    /// (e.g. behind a reverse proxy) is preserved.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::InvalidEndpoint` if the result is not an
    /// absolute http(s) URL.
    pub fn new(client: Client, endpoint: &str, path: &str) -> Result<Self, RegistrationError> {
        let raw = format!("{}{}", endpoint.trim_end_matches('/'), path);
        let url = Url::parse(&raw).map_err(|e| RegistrationError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RegistrationError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        }
        if url.host_str().is_none() {
            return Err(RegistrationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the resource and decodes it into `T`.
    ///
    /// The body is read to completion before decoding; the response is
    /// dropped (and its connection released) on every return path.
    pub async fn fetch<T: DeserializeOwned>(&self) -> CollectorResult<T> {
        let url = self.url.as_str();
        trace!("GET {}", url);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|source| CollectorError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| CollectorError::Transport {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| CollectorError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
