use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use m3u_merge::{
    config::{Config, OutputTarget},
    output::OutputFormat,
    pipeline::MergePipeline,
    services::{LivenessCheck, StreamProber},
    sources::SourceLoader,
};

#[derive(Parser)]
#[command(name = "m3u-merge")]
#[command(version)]
#[command(about = "Merge M3U playlists, keeping only channels whose streams respond")]
#[command(long_about = None)]
struct Cli {
    /// Playlist locations (URLs or file paths) whose channels are probed
    #[arg(value_name = "SOURCE")]
    sources: Vec<String>,

    /// Playlist location merged without probing (repeatable)
    #[arg(long, value_name = "LOCATION")]
    trusted: Vec<String>,

    /// Output path of the first target
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output format of the first target (m3u, kodi, plain)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Maximum number of probes running at once
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("m3u_merge={}", cli.log_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-merge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    if cli.dump_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    if cli.sources.is_empty() && cli.trusted.is_empty() {
        bail!("No playlist sources given");
    }

    let loader = SourceLoader::from_config(&config.sources, &config.probe.default_user_agent)?;
    let load = loader.load_all(&cli.sources, &cli.trusted).await?;
    if load.sources.is_empty() {
        warn!("No source could be loaded, writing an empty playlist");
    }

    let prober: Arc<dyn LivenessCheck> =
        Arc::new(StreamProber::from_config(&config.probe, &config.tables)?);
    let pipeline = MergePipeline::new(&config, prober)?;

    let mut run = pipeline.run(load).await;
    MergePipeline::write_outputs(&mut run, &config.output.targets).await?;

    if let Some(path) = &cli.report {
        run.report.write_json(path).await?;
        info!("Run report written to {}", path.display());
    }

    Ok(())
}

/// Command line values win over the config file and environment
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(max) = cli.max_concurrent {
        config.scheduler.max_concurrent_probes = max;
    }

    if cli.output.is_none() && cli.format.is_none() {
        return;
    }
    if config.output.targets.is_empty() {
        config.output.targets.push(OutputTarget {
            path: PathBuf::from(m3u_merge::config::defaults::DEFAULT_OUTPUT_PATH),
            format: OutputFormat::M3u,
        });
    }
    let first = &mut config.output.targets[0];
    if let Some(path) = &cli.output {
        first.path = path.clone();
    }
    if let Some(format) = cli.format {
        first.format = format;
    }
}
