//! Renderer that fetches pages with plain HTTP.
//!
//! Mineralpedia serves its listing and entry markup from the server, so a
//! GET is enough when no browser is available.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::http_client::HttpClient;
use super::renderer::{PageRenderer, RenderError, RenderedPage};

/// HTTP-only page renderer.
pub struct HttpRenderer {
    client: HttpClient,
}

impl HttpRenderer {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

/// Check whether `selector` matches anything in `html`.
pub(crate) fn selector_present(url: &str, html: &str, selector: &str) -> Result<bool, RenderError> {
    let parsed = Selector::parse(selector).map_err(|e| RenderError::Navigation {
        url: url.to_string(),
        message: format!("invalid selector '{}': {}", selector, e),
    })?;
    let document = Html::parse_document(html);
    let present = document.select(&parsed).next().is_some();
    Ok(present)
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(
        &self,
        url: &str,
        wait_for: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError> {
        let fetch = async {
            let response = self.client.get(url).await.map_err(|e| RenderError::Http {
                url: url.to_string(),
                source: e,
            })?;

            if !response.is_success() {
                return Err(RenderError::Status {
                    url: url.to_string(),
                    status: response.status.as_u16(),
                });
            }

            let final_url = response.final_url();
            let html = response.text().await.map_err(|e| RenderError::Http {
                url: url.to_string(),
                source: e,
            })?;
            Ok((final_url, html))
        };

        let (final_url, html) = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| RenderError::WaitTimeout {
                url: url.to_string(),
                selector: wait_for.to_string(),
                timeout,
            })??;

        // A static document will not grow the element later, so absence is final
        if !selector_present(url, &html, wait_for)? {
            debug!("'{}' not present in {}", wait_for, url);
            return Err(RenderError::WaitTimeout {
                url: url.to_string(),
                selector: wait_for.to_string(),
                timeout,
            });
        }

        Ok(RenderedPage {
            url: url.to_string(),
            final_url,
            html,
        })
    }

    async fn shutdown(&self) {}

    fn name(&self) -> &'static str {
        "http"
    }
}
