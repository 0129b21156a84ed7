//! Headless Chromium renderer.
//!
//! Uses chromiumoxide (CDP) to load pages that need a real browser, polling
//! the DOM until the requested elements appear.

mod config;

pub use config::BrowserEngineConfig;

use std::time::Duration;

use async_trait::async_trait;

use super::renderer::{PageRenderer, RenderError, RenderedPage};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Interval between DOM polls while waiting for a selector.
#[cfg(feature = "browser")]
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A launched (or connected) browser and the task driving its CDP handler.
#[cfg(feature = "browser")]
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
}

/// Browser-backed page renderer.
#[cfg(feature = "browser")]
pub struct BrowserRenderer {
    config: BrowserEngineConfig,
    session: Mutex<Option<BrowserSession>>,
}

#[cfg(feature = "browser")]
impl BrowserRenderer {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Create a renderer; the browser starts on first use.
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Find Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf, RenderError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(RenderError::Launch(
            "Chrome/Chromium not found. Install it, set browser.remote_url, \
             or use --renderer http"
                .to_string(),
        ))
    }

    /// Launch a local browser or connect to the configured remote one.
    async fn start(&self) -> Result<BrowserSession, RenderError> {
        if let Some(ref remote_url) = self.config.remote_url {
            return self.connect_remote(remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.timeout));

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox") // Often needed for headless in containers
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| RenderError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler,
            remote: false,
        })
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> Result<BrowserSession, RenderError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| RenderError::Launch(format!("Bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RenderError::Launch("No webSocketDebuggerUrl in response".into()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| RenderError::Launch(format!("Failed to connect to browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler,
            remote: true,
        })
    }

    /// Poll the page until `selector` matches or `timeout` elapses.
    async fn wait_for_selector(
        page: &Page,
        url: &str,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match page.find_elements(selector).await {
                Ok(elements) if !elements.is_empty() => {
                    debug!("Found {} '{}' elements", elements.len(), selector);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!("Selector '{}' not ready yet: {}", selector, e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::WaitTimeout {
                    url: url.to_string(),
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the selector and serialize the DOM.
    async fn capture(
        page: &Page,
        url: &str,
        wait_for: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError> {
        Self::wait_for_selector(page, url, wait_for, timeout).await?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        let html = page.content().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(RenderedPage {
            url: url.to_string(),
            final_url,
            html,
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(
        &self,
        url: &str,
        wait_for: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, RenderError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(self.start().await?);
        }
        let Some(ref active) = *session else {
            return Err(RenderError::Launch("browser session unavailable".into()));
        };

        info!("Navigating to {}", url);
        let page = active
            .browser
            .new_page(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let result = Self::capture(&page, url, wait_for, timeout).await;

        // Close the page to prevent tab accumulation
        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }

        result
    }

    async fn shutdown(&self) {
        let Some(mut active) = self.session.lock().await.take() else {
            return;
        };

        // A remote browser belongs to someone else; only drop the connection
        if !active.remote {
            if let Err(e) = active.browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = active.browser.wait().await;
        }
        active.handler.abort();
        info!("Browser session closed");
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserRenderer {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserRenderer {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(
        &self,
        _url: &str,
        _wait_for: &str,
        _timeout: Duration,
    ) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Launch(
            "Browser support not compiled. Rebuild with: cargo build --features browser, \
             or use --renderer http"
                .to_string(),
        ))
    }

    async fn shutdown(&self) {}

    fn name(&self) -> &'static str {
        "browser"
    }
}
