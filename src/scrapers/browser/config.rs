//! Browser renderer configuration.

use serde::{Deserialize, Serialize};

/// Headless Chromium configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the crawl in a visible window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// DevTools request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_partial_config() {
        let config: BrowserEngineConfig = toml::from_str("chrome_args = [\"--lang=en\"]").unwrap();
        assert!(config.headless);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.chrome_args, vec!["--lang=en".to_string()]);
        assert!(config.remote_url.is_none());
    }
}
