//! HTTP client shared by the plain renderer and the image downloader.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

/// HTTP client with a fixed user agent, timeout and politeness delay.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new(timeout: Duration, request_delay: Duration) -> Result<Self, reqwest::Error> {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a new HTTP client; `user_agent_config` is resolved by
    /// [`resolve_user_agent`].
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            request_delay,
        })
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        debug!(
            "GET {} -> {} in {}ms",
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        Ok(HttpResponse {
            status: response.status(),
            headers,
            response,
        })
    }
}
