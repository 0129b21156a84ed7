//! Page renderer capability and the lease that owns it.
//!
//! A renderer turns a URL into an HTML document once the elements the caller
//! needs are present. The crawl holds exactly one renderer through a
//! `RendererLease`, which can tear it down and build a fresh one to bound the
//! memory a long-running browser session accumulates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Errors raised while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to start renderer: {0}")]
    Launch(String),

    #[error("failed to load {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out after {}s waiting for '{selector}' on {url}", timeout.as_secs())]
    WaitTimeout {
        url: String,
        selector: String,
        timeout: Duration,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl RenderError {
    /// Launch failures mean no renderer exists at all; retrying the page is pointless.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RenderError::Launch(_))
    }
}

/// A rendered document.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    /// Serialized DOM.
    pub html: String,
}

/// Renders a page and waits until elements matching a selector exist.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url` and return its DOM once `wait_for` matches at least one
    /// element, failing with `RenderError::WaitTimeout` after `timeout`.
    async fn render(
        &self,
        url: &str,
        wait_for: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError>;

    /// Release every resource held by the renderer.
    async fn shutdown(&self);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Which renderer implementation to use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Headless Chromium (requires the `browser` feature).
    #[default]
    Browser,
    /// Plain HTTP GET; enough for server-rendered pages.
    Http,
}

impl std::fmt::Display for RendererKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => write!(f, "browser"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Builds a fresh renderer.
pub type RendererFactory = Box<dyn Fn() -> Box<dyn PageRenderer> + Send + Sync>;

/// Exclusive ownership of the current renderer, with the ability to replace it.
pub struct RendererLease {
    factory: RendererFactory,
    renderer: Box<dyn PageRenderer>,
    generation: u32,
}

impl RendererLease {
    /// Create a lease holding a first renderer from `factory`.
    pub fn new(factory: RendererFactory) -> Self {
        let renderer = factory();
        Self {
            factory,
            renderer,
            generation: 0,
        }
    }

    /// The renderer currently leased.
    pub fn renderer(&self) -> &dyn PageRenderer {
        self.renderer.as_ref()
    }

    /// How many times the renderer has been recycled.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Tear down the current renderer and replace it with a new one.
    pub async fn recycle(&mut self) {
        info!(
            "Recycling {} renderer (generation {})",
            self.renderer.name(),
            self.generation
        );
        self.renderer.shutdown().await;
        self.renderer = (self.factory)();
        self.generation += 1;
    }

    /// Shut the renderer down for good.
    pub async fn release(self) {
        self.renderer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingRenderer {
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageRenderer for CountingRenderer {
        async fn render(
            &self,
            url: &str,
            _wait_for: &str,
            _timeout: Duration,
        ) -> Result<RenderedPage, RenderError> {
            Ok(RenderedPage {
                url: url.to_string(),
                final_url: url.to_string(),
                html: "<html></html>".to_string(),
            })
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_recycle_replaces_renderer() {
        let created = Arc::new(AtomicUsize::new(0));
        let shutdowns = Arc::new(AtomicUsize::new(0));

        let factory: RendererFactory = {
            let created = created.clone();
            let shutdowns = shutdowns.clone();
            Box::new(move || {
                created.fetch_add(1, Ordering::SeqCst);
                Box::new(CountingRenderer {
                    shutdowns: shutdowns.clone(),
                })
            })
        };

        let mut lease = RendererLease::new(factory);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        lease.recycle().await;
        lease.recycle().await;
        assert_eq!(lease.generation(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);

        lease.release().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_launch_errors_are_not_retryable() {
        assert!(!RenderError::Launch("x".into()).is_retryable());
        assert!(RenderError::WaitTimeout {
            url: "u".into(),
            selector: "dt".into(),
            timeout: Duration::from_secs(30),
        }
        .is_retryable());
    }
}
