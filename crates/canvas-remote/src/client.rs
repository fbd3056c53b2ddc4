//! Shared HTTP plumbing for the canvas backend

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{RemoteError, Result};

/// Base URL plus a pooled reqwest client
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    /// Create a client for a backend rooted at `base_url`
    ///
    /// A trailing slash is ignored, so `http://host/api/` and `http://host/api`
    /// are the same backend.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RemoteError::InvalidUrl(base_url));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, headers)
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path))
    }

    pub(crate) fn patch(&self, path: &str) -> RequestBuilder {
        self.http.patch(self.url(path))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.http.delete(self.url(path))
    }

    /// Send a request and decode its JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = check_status(request.send().await?, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(format!("{}: {}", what, e)))
    }

    /// Send a request whose body is ignored
    pub(crate) async fn send_empty(&self, request: RequestBuilder, what: &str) -> Result<()> {
        check_status(request.send().await?, what).await?;
        Ok(())
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::debug!("{} answered {}: {}", what, status, body);
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// A collection response, either a bare array or wrapped in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "nodes", alias = "edges", alias = "items")]
        data: Vec<T>,
    },
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}
