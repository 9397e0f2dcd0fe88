//! Resolves each locator given on the command line to a local path and prints
//! one path per line.
//!
//! Remote locators are downloaded into the shared cache first. Settings not
//! given as flags are read from `CACHED_PATH_*` environment variables via
//! [`OrthoConfig`](https://github.com/leynos/ortho-config). The binary exits
//! with status code `0` when every locator resolved and `1` otherwise.

use std::io::{self, Write};

use cached_path::{FetchEnvCfg, RemoteFileCache, ResolveOptions, UserAgent};
use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tracing::Level;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "cached-path", version, about)]
struct Cli {
    /// Local paths or `http(s)://` / `s3://` URLs to resolve.
    #[arg(required = true)]
    locators: Vec<String>,
    /// Cache directory to use instead of the environment default.
    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,
    /// Download even when a cached copy exists.
    #[arg(long)]
    force_download: bool,
    /// Continue an interrupted download.
    #[arg(long)]
    resume_download: bool,
    /// Extract zip and tar archives and print the extraction directory.
    #[arg(long)]
    extract: bool,
    /// Re-extract archives that were extracted before.
    #[arg(long, requires = "extract")]
    force_extract: bool,
    /// Serve cached files only; never touch the network.
    #[arg(long)]
    local_files_only: bool,
    /// Extra text appended to the `User-Agent` header.
    #[arg(long)]
    user_agent: Option<String>,
    /// Log cache decisions and download progress.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ResolveOptions {
        ResolveOptions {
            cache_dir: self.cache_dir.clone(),
            force_download: self.force_download,
            resume_download: self.resume_download,
            user_agent: self.user_agent.clone().map(UserAgent::Text),
            extract_compressed_file: self.extract,
            force_extract: self.force_extract,
            local_files_only: self.local_files_only,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let settings = FetchEnvCfg::load()
        .and_then(|cfg| cfg.to_settings())
        .context("failed to load configuration via OrthoConfig")?;
    let cache = RemoteFileCache::new(settings)?;
    let options = cli.options();

    let mut stdout = io::stdout().lock();
    for locator in &cli.locators {
        let path = cache
            .resolve(locator, &options)
            .with_context(|| format!("failed to resolve {locator}"))?;
        writeln!(stdout, "{path}").context("failed to write to stdout")?;
    }
    Ok(())
}
