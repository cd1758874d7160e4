use clap::Parser;
use itertools::Itertools;
use std::path::PathBuf;
use std::{fs, process};
use thiserror::Error;
use tracing::{error, info};
use vagtkalender::calendar::encoder::encode_calendar;
use vagtkalender::config::env_loader::{resolve_credentials, ConfigError};
use vagtkalender::config::model::{Config, CrawlConfig};
use vagtkalender::unf_portal::api::UnfPortalAPI;
use vagtkalender::unf_portal::auth::{PortalError, PortalSession};

/// Prefix of the machine-readable stdout line the publishing step consumes.
const ICS_FILES_MARKER: &str = "ICS_FILES:";

/// Logs into the UNF volunteer portal and writes one ICS calendar per
/// location.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Output directory for the generated calendar files
    #[arg(long, default_value = "dist")]
    out_dir: PathBuf,

    /// Maximum listing pages to walk per location
    #[arg(long, default_value_t = 5)]
    pages: usize,

    /// Concurrent location crawls
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Page cache lifetime in seconds; 0 disables caching
    #[arg(long, default_value_t = 300)]
    cache_ttl: u64,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("could not write calendar files: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let loki = vagtkalender::tracing::setup().await;

    let outcome = run(args).await;

    if let Some(handle) = loki {
        handle.controller.shutdown().await;
        let _ = handle.task.await;
    }

    if let Err(err) = outcome {
        error!("Run failed: {err}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), RunError> {
    let config = Config {
        credentials: resolve_credentials()?,
        crawl: CrawlConfig {
            max_pages: args.pages,
            workers: args.workers,
            cache_ttl_secs: args.cache_ttl,
        },
        out_dir: args.out_dir,
    };

    let session = PortalSession::new()?;
    session
        .login(&config.credentials.username, &config.credentials.password)
        .await?;

    let api = UnfPortalAPI::new(session, &config.crawl);
    let feeds = api.crawl_all().await;

    fs::create_dir_all(&config.out_dir)?;
    let mut written = Vec::new();
    for feed in &feeds {
        let path = config.out_dir.join(feed.location.file_name());
        fs::write(&path, encode_calendar(feed))?;
        info!(
            location = feed.location.slug(),
            events = feed.records.len(),
            path = %path.display(),
            "Calendar written"
        );
        written.push(path);
    }

    println!(
        "{ICS_FILES_MARKER}{}",
        written.iter().map(|path| path.display().to_string()).join(",")
    );
    Ok(())
}
