//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use gamma_events_core::{EventsPipeline, TracingSink};
use gamma_events_manifest::{ManifestFetcher, build_client};
use gamma_events_shared::{
    AppConfig, FailurePolicy, PipelineConfig, Year, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::render;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// gamma-events: browse the community's events by year.
#[derive(Parser)]
#[command(
    name = "gamma-events",
    version,
    about = "Browse community events by year, with each event's write-up attached.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.gamma-events/gamma-events.toml).
    #[arg(long, env = "GAMMA_EVENTS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the manifest URL.
    #[arg(long, global = true)]
    pub manifest_url: Option<String>,

    /// Override the content base URL.
    #[arg(long, global = true)]
    pub content_base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Listing output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show the events of one year with their write-ups.
    Events {
        /// Year to show (e.g. 2023).
        year: String,

        /// Output format.
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Keep events whose write-up failed to load instead of showing none.
        #[arg(long)]
        partial: bool,
    },

    /// List the years present in the manifest.
    Years,

    /// Read years from stdin, one per line; each line replaces the previous request.
    Browse,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "gamma_events=info",
        1 => "gamma_events=debug",
        _ => "gamma_events=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Events {
            year,
            format,
            partial,
        } => cmd_events(&cli, year, *format, *partial).await,
        Command::Years => cmd_years(&cli).await,
        Command::Browse => cmd_browse(&cli).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&cli).await,
        },
    }
}

/// Load the config file and apply CLI overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    if let Some(url) = &cli.manifest_url {
        config.sources.manifest_url = url.clone();
    }
    if let Some(url) = &cli.content_base_url {
        config.sources.content_base_url = url.clone();
    }

    Ok(config)
}

fn pipeline_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = resolve_config(cli)?;
    Ok(PipelineConfig::try_from(&config)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_events(cli: &Cli, year: &str, format: OutputFormat, partial: bool) -> Result<()> {
    let mut config = pipeline_config(cli)?;
    if partial {
        config.failure_policy = FailurePolicy::Partial;
    }

    let year = Year::from(year);
    info!(%year, manifest = %config.manifest_url, "loading events");

    let pipeline = EventsPipeline::new(&config, Arc::new(TracingSink))?;

    let state = match format {
        OutputFormat::Text => {
            let spinner = loading_spinner(&render::loading_message(&year))?;
            let state = pipeline.run(year.clone()).await;
            spinner.finish_and_clear();
            state
        }
        OutputFormat::Json => pipeline.run(year.clone()).await,
    };

    let mut stdout = std::io::stdout().lock();
    match format {
        OutputFormat::Text => render::render_text(&year, &state, &mut stdout)?,
        OutputFormat::Json => render::render_json(&state, &mut stdout)?,
    }

    Ok(())
}

async fn cmd_years(cli: &Cli) -> Result<()> {
    let config = pipeline_config(cli)?;
    let fetcher = ManifestFetcher::new(build_client(config.timeout)?, &config);

    let manifest = fetcher.fetch_manifest().await?;
    let years = manifest.years();

    if years.is_empty() {
        println!("No years recorded in the manifest.");
        return Ok(());
    }

    for summary in years {
        let noun = if summary.event_count == 1 { "event" } else { "events" };
        println!("{}  {} {noun}", summary.year, summary.event_count);
    }

    Ok(())
}

async fn cmd_browse(cli: &Cli) -> Result<()> {
    let config = pipeline_config(cli)?;
    let pipeline = EventsPipeline::new(&config, Arc::new(TracingSink))?;
    let mut updates = pipeline.subscribe();

    // Renderer: print every state published for the latest request.
    let renderer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            let Some(year) = snapshot.year else { continue };

            let mut stdout = std::io::stdout().lock();
            if let Err(e) = render::render_update(&year, &snapshot.state, &mut stdout) {
                debug!(error = %e, "stdout closed, stopping renderer");
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = None;

    while let Some(line) = lines.next_line().await? {
        let year = line.trim();
        if year.is_empty() {
            continue;
        }
        last = Some(pipeline.request(year));
    }

    if let Some(generation) = last {
        let mut done = pipeline.subscribe();
        done.wait_for(|s| s.generation == generation && s.is_settled())
            .await
            .map_err(|e| eyre!("pipeline closed: {e}"))?;
    }

    // Dropping the pipeline closes the channel and ends the renderer.
    drop(pipeline);
    renderer.await?;

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn loading_spinner(message: &str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

