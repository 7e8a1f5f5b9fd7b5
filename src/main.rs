use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod bulk;
mod config;
mod error;
mod media;
mod server;
mod ui;
mod utils;

use bulk::{BulkDownloader, HttpFetcher};
use config::Config;
use media::MediaResolver;
use ui::{render, Event, Snapshot};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (media lookup and download proxy)
    Serve {
        /// Address to listen on, overrides the config file
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// List the media attached to a post
    Fetch {
        url: String,
        /// Print the JSON document instead of a list
        #[arg(long)]
        json: bool,
    },
    /// Download the media attached to a post
    Download {
        url: String,
        /// Directory to save into
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Base URL of a running download proxy
        #[arg(long)]
        proxy: Option<String>,
        /// Only download the item at this 1-based position
        #[arg(long)]
        item: Option<usize>,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    match config::find_config_path(args.config.as_deref()) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Ok(Config::default()),
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if config.get_logging_format() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_resolver(config: &Config, client: reqwest::Client) -> Result<MediaResolver> {
    MediaResolver::from_config(&config.upstream, client)
        .context("Failed to initialize media resolver")
}

async fn fetch(config: &Config, url: &str, json: bool) -> Result<()> {
    let resolver = build_resolver(config, reqwest::Client::new())?;
    let post = resolver.resolve_post(url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&post)?);
    } else {
        let snapshot = Snapshot::default()
            .apply(Event::Submitted(url.to_string()))
            .apply(Event::Resolved(post));
        println!("{}", render(&snapshot));
    }
    Ok(())
}

async fn download(
    config: &Config,
    url: &str,
    output: Option<PathBuf>,
    proxy: Option<String>,
    only: Option<usize>,
) -> Result<()> {
    let client = reqwest::Client::new();
    let resolver = build_resolver(config, client.clone())?;

    let mut snapshot = Snapshot::default().apply(Event::Submitted(url.to_string()));
    println!("{}", render(&snapshot));

    let post = match resolver.resolve_post(url).await {
        Ok(post) => post,
        Err(e) => {
            snapshot = snapshot.apply(Event::Failed(e.to_string()));
            println!("{}", render(&snapshot));
            return Err(e.into());
        }
    };
    snapshot = snapshot.apply(Event::Resolved(post));
    println!("{}", render(&snapshot));

    let output_dir = output.unwrap_or_else(|| config.download.resolved_output_dir());
    let mut fetcher = HttpFetcher::new(client, output_dir.clone(), &config.upstream.user_agent);
    if let Some(proxy) = proxy.or_else(|| config.download.proxy_url.clone()) {
        fetcher = fetcher.with_proxy(&proxy)?;
    }
    let downloader = BulkDownloader::new(Arc::new(fetcher), &config.download.filename_prefix);

    if let Some(position) = only {
        let item = position
            .checked_sub(1)
            .and_then(|index| snapshot.items.get(index))
            .with_context(|| format!("No item at position {}", position))?;
        let filename = downloader.download_one(item, position).await?;
        println!("Saved {}", output_dir.join(filename).display());
        return Ok(());
    }

    info!("Saving into {}", output_dir.display());
    snapshot = snapshot.apply(Event::DownloadStarted);
    let items = Arc::clone(&snapshot.items);
    let report = downloader
        .download_all(&items, |progress| {
            snapshot = snapshot.apply(Event::ItemFinished(progress.clone()));
            println!("{}", render(&snapshot));
        })
        .await;

    snapshot = snapshot.apply(Event::finished(&report));
    println!("{}", render(&snapshot));

    if report.completed == 0 && !report.failures.is_empty() {
        anyhow::bail!("Failed to download any media files");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args)?;
    init_logging(&config);

    match args.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            info!("Starting postgrab server...");
            server::run(config).await
        }
        Command::Fetch { url, json } => fetch(&config, &url, json).await,
        Command::Download {
            url,
            output,
            proxy,
            item,
        } => download(&config, &url, output, proxy, item).await,
    }
}
