use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use powercheck::common::constants;
use powercheck::config::{Config, FeedKind, DEFAULT_CONFIG_PATH};
use powercheck::observability::{init_logging, init_metrics};
use powercheck::sources::PayloadOrigin;
use powercheck::{FeedPipeline, SnapshotCache, SnapshotSummary};

#[derive(Parser)]
#[command(name = "powercheck")]
#[command(about = "Fetch and normalize electricity network outage incidents")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (defaults are used if it doesn't exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fetch cycle and print the snapshot as JSON
    Fetch(FetchArgs),
    /// Run one fetch cycle and print headline counters as JSON
    Summary(FetchArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Feed shape: json or html
    #[arg(long)]
    source: Option<String>,
    /// Feed URL, overriding the config
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,
    /// Read the feed payload from a local file instead of the network
    #[arg(long)]
    file: Option<PathBuf>,
    /// Don't look up coordinates for records that lack them
    #[arg(long)]
    no_geocode: bool,
    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn apply_args(config: &mut Config, args: &FetchArgs) -> anyhow::Result<Option<PayloadOrigin>> {
    if let Some(source) = &args.source {
        config.feed.kind = FeedKind::parse(source).with_context(|| {
            format!("supported sources: {}", constants::get_supported_sources().join(", "))
        })?;
    }
    if args.no_geocode {
        config.geocoder.enabled = false;
    }
    if let Some(url) = &args.url {
        config.feed.url = url.clone();
    }
    Ok(args.file.clone().map(PayloadOrigin::File))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    let _log_guard = init_logging();
    init_metrics();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let (args, summary_only) = match &cli.command {
        Commands::Fetch(args) => (args, false),
        Commands::Summary(args) => (args, true),
    };
    let origin = apply_args(&mut config, args)?;

    let pipeline = FeedPipeline::from_config(&config, origin)?;
    let cache = SnapshotCache::new(config.cache_ttl()?);

    info!(source = pipeline.source_name(), "Starting fetch cycle");
    let snapshot = pipeline.fetch(&cache).await;
    if snapshot.is_failed() {
        warn!("Upstream fetch failed; reporting an empty snapshot");
    }

    if summary_only {
        print_json(&SnapshotSummary::from_snapshot(&snapshot), args.pretty)?;
    } else {
        print_json(snapshot.as_ref(), args.pretty)?;
    }
    Ok(())
}
