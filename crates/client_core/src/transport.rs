//! reqwest-backed [`Fetcher`] against the deployment API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::{
    error::FetchError,
    protocol::{ListEnvelope, Resource},
};
use tracing::debug;
use url::Url;

use crate::{
    config::{parse_base_url, ClientSettings},
    Fetcher,
};

pub struct HttpFetcher {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpFetcher {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let base_url = parse_base_url(&settings.api_base_url)?;
        Self::new(
            base_url,
            settings.api_token.clone(),
            Duration::from_secs(settings.request_timeout_seconds),
        )
    }

    pub fn url_for(&self, resource: &Resource) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FetchError::transport(format!("base url {} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().extend(resource.path_segments());
        }
        Ok(url)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<Vec<Value>, FetchError> {
        let url = self.url_for(resource)?;
        debug!(%url, "transport: fetching");

        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_request_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::unauthorized("token expired"));
        }
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(FetchError::unavailable("gateway timeout"));
        }
        if !status.is_success() {
            return Err(FetchError::transport(format!(
                "unexpected status {status} for {resource:?}"
            )));
        }

        let envelope: ListEnvelope = response
            .json()
            .await
            .map_err(|err| FetchError::decode(err.to_string()))?;
        envelope.into_items(resource)
    }
}

fn map_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() || err.is_connect() {
        FetchError::unavailable(err.to_string())
    } else {
        FetchError::transport(err.to_string())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
