use crate::error::Error;
use crate::relay::{OrderStreamSource, UpstreamOpen};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use log::*;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service::config::Config;
use std::time::Duration;

/// HTTP client for the backend API that owns orders and sessions.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    order_stream_path: String,
    refresh_path: String,
    request_timeout: Duration,
}

/// A backend response captured in full, to be passed back to the caller unchanged.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token", alias = "token")]
    access_token: String,
}

impl BackendClient {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: config.backend_base_url().to_string(),
            order_stream_path: config.backend_order_stream_path().to_string(),
            refresh_path: config.backend_refresh_path().to_string(),
            request_timeout: config.backend_timeout(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Open the backend's order event stream on behalf of a caller.
    ///
    /// A non-2xx answer is not an `Err`: its status and best-effort body are
    /// returned so the relay can forward them.
    pub async fn open_order_stream(&self, authorization: &str) -> Result<UpstreamOpen, Error> {
        let url = self.url(&self.order_stream_path);
        debug!("Opening upstream order stream at {url}");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|body| !body.is_empty());
            warn!("Upstream order stream refused with status {status}");
            return Ok(UpstreamOpen::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(UpstreamOpen::Streaming(
            response.bytes_stream().map_err(Error::from).boxed(),
        ))
    }

    /// Exchange a refresh token for a new access token.
    /// Returns `None` when the backend refuses the refresh.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Option<String>, Error> {
        let response = self
            .client
            .post(self.url(&self.refresh_path))
            .timeout(self.request_timeout)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            info!("Session refresh refused with status {}", response.status());
            return Ok(None);
        }

        let body = response.bytes().await?;
        let refreshed: RefreshResponse = serde_json::from_slice(&body)?;
        Ok(Some(refreshed.access_token))
    }

    /// Forward a JSON request to the backend and capture its full response.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        authorization: &str,
        body: Option<&Value>,
    ) -> Result<BackendResponse, Error> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .timeout(self.request_timeout)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        debug!("Backend {method} {path} responded with {status}");

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl OrderStreamSource for BackendClient {
    async fn open(&self, authorization: &str) -> Result<UpstreamOpen, Error> {
        self.open_order_stream(authorization).await
    }
}
