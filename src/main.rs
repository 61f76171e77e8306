use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use feedboard::config::Config;
use feedboard::feed::{aggregate, AggregateResult, OrderingMode};
use feedboard::render::{render_json, render_text};

/// Get the default config file path (~/.config/feedboard/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedboard")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedboard",
    about = "Fetch RSS/Atom feeds and print their newest items"
)]
struct Args {
    /// Config file (default: ~/.config/feedboard/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Group items per feed or merge them into one timeline
    #[arg(long, value_enum)]
    mode: Option<OrderingMode>,

    /// Items kept per feed
    #[arg(long, value_name = "N")]
    max_items: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Fetch feeds directly instead of through the proxy
    #[arg(long)]
    no_proxy: bool,

    /// Refresh every N minutes until interrupted
    #[arg(long, value_name = "MINUTES")]
    watch: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(max_items) = self.max_items {
            config.max_items_per_feed = max_items;
        }
        if self.no_proxy {
            config.proxy.clear();
        }
        if let Some(minutes) = self.watch {
            config.refresh_interval_minutes = minutes;
        }
    }
}

fn print_result(result: &AggregateResult, json: bool) -> Result<()> {
    if json {
        println!("{}", render_json(result).context("Failed to serialize output")?);
    } else {
        print!("{}", render_text(result));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only rendered output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply(&mut config);

    let sources = config.sources();
    if sources.is_empty() {
        anyhow::bail!("No valid feeds configured in {}", config_path.display());
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let transport = config.transport(client);
    let options = config.aggregate_options();

    let Some(interval) = config.refresh_interval() else {
        let result = aggregate(&transport, &sources, &options).await;
        return print_result(&result, args.json);
    };

    tracing::info!(
        feeds = sources.len(),
        minutes = config.refresh_interval_minutes,
        "Watching feeds"
    );
    let (transport, sources, options, json) = (&transport, &sources, &options, args.json);
    watch(interval, tokio::signal::ctrl_c(), move || async move {
        let result = aggregate(transport, sources, options).await;
        print_result(&result, json)
    })
    .await
}

/// Runs `cycle` every `interval` until `shutdown` resolves, including while
/// a cycle is in flight.
async fn watch<S, F, Fut>(interval: Duration, shutdown: S, mut cycle: F) -> Result<()>
where
    S: Future,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }
        tokio::select! {
            outcome = cycle() => outcome?,
            _ = &mut shutdown => break,
        }
    }
    tracing::info!("Interrupted, exiting");
    Ok(())
}
