//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod images;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions, Overrides, DEFAULT_LOG_FILE};
use crate::error::CrawlError;
use crate::logging::LogOptions;
use crate::scrapers::RendererKind;

#[derive(Parser)]
#[command(name = "mineralpedia")]
#[command(about = "Crawl the Mineralpedia encyclopedia and download mineral images")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "MINERALPEDIA_CONFIG")]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Append-only log file
    #[arg(long, global = true, env = "MINERALPEDIA_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Logging setup requested on the command line.
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_file: self.log_file.clone(),
            verbose: self.verbose,
        }
    }
}

/// Options shared by `crawl` and `run`.
#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    /// Listing pages to crawl: 1-293, or '*' for all of them
    #[arg(short, long, env = "MINERALPEDIA_PAGES")]
    pages: Option<String>,

    /// Export file (.csv or .tsv)
    #[arg(short, long, env = "MINERALPEDIA_OUTPUT")]
    output: Option<PathBuf>,

    /// Page renderer
    #[arg(long, value_enum, env = "MINERALPEDIA_RENDERER")]
    renderer: Option<RendererKind>,

    /// Connect to a running Chrome (DevTools URL) instead of launching one
    #[arg(long, env = "MINERALPEDIA_BROWSER_URL")]
    browser_url: Option<String>,

    /// Host memory usage (percent) above which the renderer is restarted
    #[arg(long, env = "MINERALPEDIA_MEMORY_THRESHOLD")]
    memory_threshold: Option<f64>,
}

/// Options shared by `images` and `run`.
#[derive(Args, Debug, Clone)]
struct DownloadArgs {
    /// Directory to save images into (falls back to ./img_dump if missing)
    #[arg(short = 'd', long, env = "MINERALPEDIA_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Number of concurrent downloads
    #[arg(short, long, env = "MINERALPEDIA_DOWNLOAD_WORKERS")]
    workers: Option<usize>,

    /// Download images even if the file already exists
    #[arg(long)]
    overwrite: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the encyclopedia and export every entry to a delimited file
    Crawl {
        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Download the images listed in an export file
    Images {
        /// Export file to read (defaults to the configured output)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        download: DownloadArgs,
    },

    /// Crawl, export, then download every image
    Run {
        #[command(flatten)]
        crawl: CrawlArgs,

        #[command(flatten)]
        download: DownloadArgs,
    },
}

impl Commands {
    /// Settings given on the command line.
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides::default();

        let (crawl, download) = match self {
            Commands::Crawl { crawl } => (Some(crawl), None),
            Commands::Images { download, .. } => (None, Some(download)),
            Commands::Run { crawl, download } => (Some(crawl), Some(download)),
        };

        if let Some(crawl) = crawl {
            overrides.pages = crawl.pages.clone();
            overrides.output = crawl.output.clone();
            overrides.renderer = crawl.renderer;
            overrides.browser_url = crawl.browser_url.clone();
            overrides.memory_threshold = crawl.memory_threshold;
        }
        if let Some(download) = download {
            overrides.image_dir = download.image_dir.clone();
            overrides.download_workers = download.workers;
        }

        overrides
    }
}

/// Exit status for an error returned by [`run`].
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<CrawlError>()
        .map(CrawlError::exit_code)
        .unwrap_or(1)
}

/// Run the parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        overrides: cli.command.overrides(),
    };
    let (settings, _config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Crawl { .. } => crawl::cmd_crawl(&settings).await.map(|_| ()),
        Commands::Images { input, download } => {
            images::cmd_images(&settings, input.as_deref(), download.overwrite).await
        }
        Commands::Run { download, .. } => {
            let report = crawl::cmd_crawl(&settings).await?;
            if report.image_count() == 0 {
                tracing::warn!("Crawl produced no image links, skipping downloads");
                return Ok(());
            }
            images::cmd_images(&settings, None, download.overwrite).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "mineralpedia",
            "run",
            "--pages",
            "*",
            "--output",
            "out.tsv",
            "--renderer",
            "http",
            "-d",
            "imgs",
            "-w",
            "4",
        ])
        .unwrap();

        let overrides = cli.command.overrides();
        assert_eq!(overrides.pages.as_deref(), Some("*"));
        assert_eq!(overrides.output.as_deref(), Some(Path::new("out.tsv")));
        assert_eq!(overrides.renderer, Some(RendererKind::Http));
        assert_eq!(overrides.image_dir.as_deref(), Some(Path::new("imgs")));
        assert_eq!(overrides.download_workers, Some(4));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "mineralpedia",
            "images",
            "--input",
            "minerals.csv",
            "-v",
            "--log-file",
            "logs/wrangle.log",
        ])
        .unwrap();

        let log = cli.log_options();
        assert!(log.verbose);
        assert_eq!(log.log_file, PathBuf::from("logs/wrangle.log"));
        assert!(cli.command.overrides().pages.is_none());
    }

    #[test]
    fn test_exit_code_from_anyhow() {
        let err: anyhow::Error = CrawlError::InputNotFound(PathBuf::from("x.csv")).into();
        assert_eq!(exit_code(&err), 4);

        let err = anyhow::Error::from(CrawlError::Config("bad".into())).context("loading settings");
        assert_eq!(exit_code(&err), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
