//! Configuration management for mineralpedia using the prefer crate.
//!
//! Values come from, lowest to highest priority: built-in defaults, a config
//! file (discovered by prefer or given with `--config`), then command-line
//! flags and their environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CrawlError;
use crate::scrapers::mineralpedia::{BASE_URL, MAX_PAGES};
use crate::scrapers::{
    BrowserEngineConfig, BrowserRenderer, HttpClient, HttpRenderer, PageRenderer,
    RendererFactory, RendererKind,
};
use crate::utils::RetryPolicy;

/// Default export file.
pub const DEFAULT_OUTPUT: &str = "./MineralpediaCrawlData.csv";

/// Default image download directory.
pub const DEFAULT_IMAGE_DIR: &str = "./img_dump";

/// Default append-only log file.
pub const DEFAULT_LOG_FILE: &str = "./mineralpedia.log";

/// Page count meaning "every listing page".
pub const ALL_PAGES: &str = "*";

/// Number of listing pages to crawl, always within `1..=MAX_PAGES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCount(u32);

impl PageCount {
    /// Every page the site publishes.
    pub const MAX: PageCount = PageCount(MAX_PAGES);

    /// Parse `*` or a positive integer. Values above the maximum are clamped
    /// with a warning; zero and anything non-numeric are rejected.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let raw = raw.trim();
        if raw == ALL_PAGES {
            return Ok(Self::MAX);
        }

        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(CrawlError::Config(format!(
                "Invalid value for number of pages: '{}' (expected 1-{} or '{}')",
                raw, MAX_PAGES, ALL_PAGES
            )));
        }

        // All digits; overflow means "very large", which clamps anyway
        let requested = raw.parse::<u64>().unwrap_or(u64::MAX);
        if requested < 1 {
            return Err(CrawlError::Config(
                "Must crawl at least one page".to_string(),
            ));
        }
        if requested > u64::from(MAX_PAGES) {
            warn!(
                "Number of pages ({}) exceeds the {} available, crawling all of them",
                raw, MAX_PAGES
            );
            return Ok(Self::MAX);
        }

        Ok(Self(requested as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Keep `path` if it names a `.csv` or `.tsv` file, otherwise fall back to
/// the default export path.
pub fn resolve_output_path(path: &Path) -> PathBuf {
    let tabular = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv"));

    if tabular {
        path.to_path_buf()
    } else {
        warn!(
            "Output path {} must end in .csv or .tsv, using {} instead",
            path.display(),
            DEFAULT_OUTPUT
        );
        PathBuf::from(DEFAULT_OUTPUT)
    }
}

/// Keep `path` if it is an existing directory, otherwise fall back to the
/// default image directory (created on first download).
pub fn resolve_image_dir(path: &Path) -> PathBuf {
    let default = Path::new(DEFAULT_IMAGE_DIR);
    if path.is_dir() || path == default {
        return path.to_path_buf();
    }

    warn!(
        "Could not find the image directory {}, using {} instead",
        path.display(),
        DEFAULT_IMAGE_DIR
    );
    default.to_path_buf()
}

/// Page count as written in a config file: a number or `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PagesValue {
    Count(u64),
    Text(String),
}

impl std::fmt::Display for PagesValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PagesValue::Count(n) => write!(f, "{}", n),
            PagesValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the encyclopedia listing.
    pub base_url: String,
    /// Listing pages to crawl.
    pub pages: PageCount,
    /// Export file (`.csv` or `.tsv`).
    pub output: PathBuf,
    /// Directory images are downloaded into.
    pub image_dir: PathBuf,
    /// Used-memory percentage that triggers renderer recycling.
    pub memory_threshold: f64,
    /// Bound on waiting for page elements, in seconds.
    pub wait_timeout: u64,
    /// HTTP request timeout in seconds.
    pub request_timeout: u64,
    /// Delay after each HTTP request in milliseconds.
    pub request_delay_ms: u64,
    /// Retries after the first attempt for pages, entries and images.
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles per retry.
    pub retry_base_delay_ms: u64,
    /// None = default agent, "impersonate" = desktop Chrome agent, else custom.
    pub user_agent: Option<String>,
    /// Page renderer implementation.
    pub renderer: RendererKind,
    /// Browser renderer options.
    pub browser: BrowserEngineConfig,
    /// Concurrent image downloads.
    pub download_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            pages: PageCount::MAX,
            output: PathBuf::from(DEFAULT_OUTPUT),
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            memory_threshold: 80.0,
            wait_timeout: 30,
            request_timeout: 30,
            request_delay_ms: 0,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            user_agent: None,
            renderer: RendererKind::default(),
            browser: BrowserEngineConfig::default(),
            download_workers: 1,
        }
    }
}

impl Settings {
    /// Retry policy shared by the crawl and the downloader.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }

    /// HTTP client configured from these settings.
    pub fn http_client(&self) -> Result<HttpClient, CrawlError> {
        Ok(HttpClient::with_user_agent(
            Duration::from_secs(self.request_timeout),
            Duration::from_millis(self.request_delay_ms),
            self.user_agent.as_deref(),
        )?)
    }

    /// Factory producing fresh renderers of the configured kind.
    pub fn renderer_factory(&self) -> Result<RendererFactory, CrawlError> {
        let factory: RendererFactory = match self.renderer {
            RendererKind::Http => {
                let client = self.http_client()?;
                Box::new(move || Box::new(HttpRenderer::new(client.clone())) as Box<dyn PageRenderer>)
            }
            RendererKind::Browser => {
                let browser = self.browser.clone();
                Box::new(move || {
                    Box::new(BrowserRenderer::new(browser.clone())) as Box<dyn PageRenderer>
                })
            }
        };
        Ok(factory)
    }
}

/// Configuration file structure. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Number of pages or `"*"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<PagesValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<RendererKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_workers: Option<usize>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers mineralpedia config files in standard locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("mineralpedia").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(e) => {
                // No config file found, use defaults
                debug!("No config file discovered: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, CrawlError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            CrawlError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse TOML config: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse YAML config: {}", e)))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| CrawlError::Config(format!("Failed to parse JSON config: {}", e)))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    ///
    /// The page count is validated here, so an invalid value in the file is
    /// a configuration error.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) -> Result<(), CrawlError> {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref pages) = self.pages {
            settings.pages = PageCount::parse(&pages.to_string())?;
        }
        if let Some(ref output) = self.output {
            settings.output = self.resolve_path(output, base_dir);
        }
        if let Some(ref image_dir) = self.image_dir {
            settings.image_dir = self.resolve_path(image_dir, base_dir);
        }
        if let Some(threshold) = self.memory_threshold {
            settings.memory_threshold = threshold;
        }
        if let Some(timeout) = self.wait_timeout {
            settings.wait_timeout = timeout;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(retries) = self.max_retries {
            settings.max_retries = retries;
        }
        if let Some(delay) = self.retry_base_delay_ms {
            settings.retry_base_delay_ms = delay;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(renderer) = self.renderer {
            settings.renderer = renderer;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(workers) = self.download_workers {
            settings.download_workers = workers;
        }
        Ok(())
    }
}

/// Values given on the command line (or their environment variables).
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pages: Option<String>,
    pub output: Option<PathBuf>,
    pub image_dir: Option<PathBuf>,
    pub memory_threshold: Option<f64>,
    pub renderer: Option<RendererKind>,
    pub browser_url: Option<String>,
    pub download_workers: Option<usize>,
}

impl Overrides {
    fn apply_to_settings(&self, settings: &mut Settings) -> Result<(), CrawlError> {
        if let Some(ref pages) = self.pages {
            settings.pages = PageCount::parse(pages)?;
        }
        if let Some(ref output) = self.output {
            settings.output = PathBuf::from(shellexpand::tilde(&output.to_string_lossy()).as_ref());
        }
        if let Some(ref image_dir) = self.image_dir {
            settings.image_dir =
                PathBuf::from(shellexpand::tilde(&image_dir.to_string_lossy()).as_ref());
        }
        if let Some(threshold) = self.memory_threshold {
            settings.memory_threshold = threshold;
        }
        if let Some(renderer) = self.renderer {
            settings.renderer = renderer;
        }
        if let Some(ref url) = self.browser_url {
            settings.browser.remote_url = Some(url.clone());
        }
        if let Some(workers) = self.download_workers {
            settings.download_workers = workers;
        }
        Ok(())
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Command-line values, applied last.
    pub overrides: Overrides,
}

/// Reject settings no fallback can repair, and repair the rest.
fn validate(settings: &mut Settings) -> Result<(), CrawlError> {
    if !(settings.memory_threshold > 0.0 && settings.memory_threshold <= 100.0) {
        return Err(CrawlError::Config(format!(
            "Memory threshold must be a percentage in (0, 100], got {}",
            settings.memory_threshold
        )));
    }
    if settings.wait_timeout == 0 {
        return Err(CrawlError::Config(
            "Wait timeout must be at least one second".to_string(),
        ));
    }
    if settings.download_workers == 0 {
        warn!("download_workers must be at least 1, using 1");
        settings.download_workers = 1;
    }
    settings.output = resolve_output_path(&settings.output);
    Ok(())
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), CrawlError> {
    // Priority 1: Explicit --config flag; Priority 2: auto-discover via prefer
    let config = match options.config_path {
        Some(ref config_path) => Config::load_from_path(config_path).await?,
        None => Config::load().await,
    };
    if let Some(ref path) = config.source_path {
        debug!("Loaded config from {}", path.display());
    }

    let mut settings = Settings::default();

    // Determine base directory for resolving relative paths
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    config.apply_to_settings(&mut settings, &base_dir)?;
    options.overrides.apply_to_settings(&mut settings)?;
    validate(&mut settings)?;

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_page_count() {
        assert_eq!(PageCount::parse("*").unwrap().get(), 293);
        assert_eq!(PageCount::parse("1").unwrap().get(), 1);
        assert_eq!(PageCount::parse(" 12 ").unwrap().get(), 12);
        assert_eq!(PageCount::parse("293").unwrap().get(), 293);
        assert_eq!(PageCount::parse("294").unwrap().get(), 293);
        assert_eq!(PageCount::parse("99999999999999999999999").unwrap().get(), 293);
    }

    #[test]
    fn test_page_count_clamp_is_announced() {
        use crate::utils::log_capture::CapturedLogs;

        let logs = CapturedLogs::default();
        let pages = logs.capture(|| PageCount::parse("500").unwrap());
        assert_eq!(pages, PageCount::MAX);
        assert_eq!(logs.count("WARN"), 1);
        assert!(logs.contents().contains("Number of pages (500) exceeds the 293 available"));

        let logs = CapturedLogs::default();
        logs.capture(|| PageCount::parse("293").unwrap());
        assert_eq!(logs.count("WARN"), 0);
    }

    #[test]
    fn test_page_count_rejects() {
        for raw in ["0", "", "-3", "ten", "1.5", "**"] {
            let err = PageCount::parse(raw).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{raw}");
        }
    }

    #[test]
    fn test_output_path_fallback() {
        assert_eq!(
            resolve_output_path(Path::new("out/minerals.csv")),
            PathBuf::from("out/minerals.csv")
        );
        assert_eq!(
            resolve_output_path(Path::new("minerals.TSV")),
            PathBuf::from("minerals.TSV")
        );
        assert_eq!(
            resolve_output_path(Path::new("minerals.xlsx")),
            PathBuf::from(DEFAULT_OUTPUT)
        );
        assert_eq!(
            resolve_output_path(Path::new("minerals")),
            PathBuf::from(DEFAULT_OUTPUT)
        );
    }

    #[test]
    fn test_image_dir_fallback() {
        let dir = tempdir().unwrap();
        assert_eq!(resolve_image_dir(dir.path()), dir.path());
        assert_eq!(
            resolve_image_dir(&dir.path().join("missing")),
            PathBuf::from(DEFAULT_IMAGE_DIR)
        );
    }

    #[tokio::test]
    async fn test_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mineralpedia.toml");
        std::fs::write(
            &path,
            r#"
pages = "*"
output = "data/out.tsv"
memory_threshold = 70.5
renderer = "http"
download_workers = 4

[browser]
remote_url = "ws://localhost:9222"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.pages, Some(PagesValue::Text("*".into())));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path()).unwrap();
        assert_eq!(settings.pages.get(), 293);
        assert_eq!(settings.output, dir.path().join("data/out.tsv"));
        assert_eq!(settings.memory_threshold, 70.5);
        assert_eq!(settings.renderer, RendererKind::Http);
        assert_eq!(settings.download_workers, 4);
        assert_eq!(
            settings.browser.remote_url.as_deref(),
            Some("ws://localhost:9222")
        );
        assert!(settings.browser.headless);
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("c.yaml");
        std::fs::write(&yaml, "pages: 5\nmax_retries: 0\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.pages, Some(PagesValue::Count(5)));
        assert_eq!(config.max_retries, Some(0));

        let json = dir.path().join("c.json");
        std::fs::write(&json, r#"{"wait_timeout": 10, "user_agent": "impersonate"}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.wait_timeout, Some(10));
        assert_eq!(config.user_agent.as_deref(), Some("impersonate"));
    }

    #[tokio::test]
    async fn test_invalid_config_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "pages = [").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = Config::load_from_path(&dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_overrides_win() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mineralpedia.json");
        std::fs::write(&path, r#"{"pages": 10, "renderer": "browser"}"#).unwrap();

        let (settings, _) = load_settings_with_options(LoadOptions {
            config_path: Some(path),
            use_cwd: false,
            overrides: Overrides {
                pages: Some("2".into()),
                renderer: Some(RendererKind::Http),
                output: Some(PathBuf::from("minerals.txt")),
                ..Default::default()
            },
        })
        .await
        .unwrap();

        assert_eq!(settings.pages.get(), 2);
        assert_eq!(settings.renderer, RendererKind::Http);
        assert_eq!(settings.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[tokio::test]
    async fn test_rejected_values() {
        for overrides in [
            Overrides {
                pages: Some("0".into()),
                ..Default::default()
            },
            Overrides {
                memory_threshold: Some(150.0),
                ..Default::default()
            },
        ] {
            let dir = tempdir().unwrap();
            let path = dir.path().join("empty.json");
            std::fs::write(&path, "{}").unwrap();
            let err = load_settings_with_options(LoadOptions {
                config_path: Some(path),
                use_cwd: true,
                overrides,
            })
            .await
            .unwrap_err();
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let settings = Settings {
            max_retries: 5,
            retry_base_delay_ms: 250,
            ..Default::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }
}
