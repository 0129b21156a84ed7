//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};

/// HTTP response with headers captured up front.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub(crate) response: Response,
}

impl HttpResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.parse().ok())
    }

    /// URL after redirects.
    pub fn final_url(&self) -> String {
        self.response.url().to_string()
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Vec<u8>, reqwest::Error> {
        self.response.bytes().await.map(|b| b.to_vec())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }
}
