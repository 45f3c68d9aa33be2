//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use regmonitor_core::{
    ContentClassifier, CrawlReport, HttpImpactAssessor, ImpactAssessor, LlmClassifier, Monitor,
    RuleBasedClassifier, Scheduler,
};
use regmonitor_crawler::{HttpFetcher, PageFetcher};
use regmonitor_shared::{
    AppConfig, JobType, RegulatorySource, SourceId, SourceType, UpdateFrequency, config_file_path,
    init_config, load_config, resolve_db_path, validate_api_key,
};
use regmonitor_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// regmonitor — monitor regulatory sources for compliance-relevant updates.
#[derive(Parser)]
#[command(
    name = "regmonitor",
    version,
    about = "Crawl regulatory sources, classify updates, and feed impact assessment.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl all due sources, or one specific source.
    Run {
        /// Source ID to crawl, ignoring its schedule.
        #[arg(long)]
        source: Option<String>,

        /// How the crawl is recorded: scheduled, manual, or retry.
        #[arg(long, default_value = "manual")]
        job_type: String,

        /// Maximum concurrent source crawls (defaults to config).
        #[arg(long)]
        workers: Option<u32>,
    },

    /// Source registry administration.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// List crawl jobs for a source.
    Jobs {
        /// Source ID.
        source: String,
    },

    /// List persisted updates for a source.
    Updates {
        /// Source ID.
        source: String,
    },

    /// Cancel a pending or running crawl job.
    Cancel {
        /// Job ID.
        job: String,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Source registry subcommands.
#[derive(Subcommand)]
pub(crate) enum SourceAction {
    /// Register a new regulatory source.
    Add {
        /// Entry URL of the source.
        url: String,

        /// Human-readable name.
        #[arg(short, long)]
        name: String,

        /// Jurisdiction code (e.g., UK, EU).
        #[arg(short, long)]
        jurisdiction: String,

        /// Source type: government, regulator, legal_publisher, or api.
        #[arg(short = 't', long = "type")]
        source_type: String,

        /// Publishing cadence: hourly, daily, or weekly.
        #[arg(long)]
        frequency: Option<String>,

        /// Crawl priority (higher first).
        #[arg(long, default_value = "0")]
        priority: i64,

        /// Dot-separated path to the item array for API sources.
        #[arg(long)]
        items_path: Option<String>,

        /// CSS selector override for list items.
        #[arg(long)]
        item_selector: Option<String>,
    },

    /// List all registered sources.
    List,

    /// Re-enable a disabled source.
    Enable {
        /// Source ID.
        id: String,
    },

    /// Disable a source without deleting its history.
    Disable {
        /// Source ID.
        id: String,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "regmonitor=info",
        1 => "regmonitor=debug",
        _ => "regmonitor=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            source,
            job_type,
            workers,
        } => cmd_run(source.as_deref(), &job_type, workers).await,
        Command::Source { action } => match action {
            SourceAction::Add {
                url,
                name,
                jurisdiction,
                source_type,
                frequency,
                priority,
                items_path,
                item_selector,
            } => {
                cmd_source_add(
                    &url,
                    &name,
                    &jurisdiction,
                    &source_type,
                    frequency.as_deref(),
                    priority,
                    items_path,
                    item_selector,
                )
                .await
            }
            SourceAction::List => cmd_source_list().await,
            SourceAction::Enable { id } => cmd_source_set_active(&id, true).await,
            SourceAction::Disable { id } => cmd_source_set_active(&id, false).await,
        },
        Command::Jobs { source } => cmd_jobs(&source).await,
        Command::Updates { source } => cmd_updates(&source).await,
        Command::Cancel { job } => cmd_cancel(&job).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Pipeline assembly
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let db_path = resolve_db_path(config)?;
    Ok(Arc::new(Storage::open(&db_path).await?))
}

/// Assemble the monitor from config: LLM classifier when the API key is
/// available, rule-based otherwise; fan-out only when an assessor endpoint
/// is configured.
async fn build_monitor(config: &AppConfig) -> Result<Arc<Monitor>> {
    let storage = open_storage(config).await?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);

    let classifier: Arc<dyn ContentClassifier> = match validate_api_key(config)
        .and_then(|_| LlmClassifier::new(config.classifier.clone()))
    {
        Ok(llm) => Arc::new(llm),
        Err(e) => {
            warn!(error = %e, "LLM classifier unavailable, using rule-based classification");
            Arc::new(RuleBasedClassifier)
        }
    };

    let assessor: Option<Arc<dyn ImpactAssessor>> = match &config.assessor.endpoint {
        Some(endpoint) => {
            let base = Url::parse(endpoint)
                .map_err(|e| eyre!("invalid assessor endpoint '{endpoint}': {e}"))?;
            Some(Arc::new(HttpImpactAssessor::new(base)))
        }
        None => {
            info!("no assessor endpoint configured, fan-out disabled");
            None
        }
    };

    Ok(Arc::new(Monitor::new(
        storage, fetcher, classifier, assessor, config,
    )))
}

fn parse_source_id(s: &str) -> Result<SourceId> {
    s.parse::<SourceId>()
        .map_err(|e| eyre!("invalid source id '{s}': {e}"))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(source: Option<&str>, job_type: &str, workers: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let job_type: JobType = job_type.parse()?;
    let monitor = build_monitor(&config).await?;
    let workers = workers.unwrap_or(config.defaults.workers) as usize;
    let scheduler = Scheduler::new(monitor, workers);

    let spinner = crawl_spinner();

    let reports: Vec<CrawlReport> = match source {
        Some(id) => {
            let id = parse_source_id(id)?;
            spinner.set_message(format!("Crawling source {id}"));
            vec![scheduler.run_source(&id, job_type).await?]
        }
        None => {
            spinner.set_message("Crawling due sources");
            scheduler.run_due_sources(chrono::Utc::now()).await?
        }
    };
    spinner.finish_and_clear();

    if reports.is_empty() {
        println!("No sources due for crawling.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<38} {:<10} {:>6} {:>5} {:>6}",
        "JOB", "STATUS", "FOUND", "NEW", "PAGES"
    );
    for report in &reports {
        println!(
            "  {:<38} {:<10} {:>6} {:>5} {:>6}",
            report.job_id,
            report.status.as_str(),
            report.updates_found,
            report.new_updates,
            report.pages_scraped
        );
    }
    println!();

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_source_add(
    url: &str,
    name: &str,
    jurisdiction: &str,
    source_type: &str,
    frequency: Option<&str>,
    priority: i64,
    items_path: Option<String>,
    item_selector: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let base_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
    let source_type: SourceType = source_type.parse()?;

    let mut source = RegulatorySource::new(name, jurisdiction, source_type, base_url);
    source.priority = priority;
    source.extraction.items_path = items_path;
    source.extraction.item_selector = item_selector;
    if let Some(freq) = frequency {
        source.update_frequency = Some(freq.parse::<UpdateFrequency>()?);
    }

    storage.insert_source(&source).await?;
    info!(id = %source.id, name, "source registered");
    println!("Registered source {} ({name})", source.id);

    Ok(())
}

async fn cmd_source_list() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let sources = storage.list_sources().await?;

    if sources.is_empty() {
        println!("No sources registered.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<38} {:<24} {:<4} {:<15} {:<7} {:>5} {:<20}",
        "ID", "NAME", "JUR", "TYPE", "ACTIVE", "REL", "NEXT CRAWL"
    );
    for s in &sources {
        println!(
            "  {:<38} {:<24} {:<4} {:<15} {:<7} {:>5.2} {:<20}",
            s.id,
            truncate(&s.name, 24),
            s.jurisdiction,
            s.source_type.as_str(),
            if s.is_active { "yes" } else { "no" },
            s.reliability,
            s.next_crawl
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "due now".into()),
        );
    }
    println!();

    Ok(())
}

async fn cmd_source_set_active(id: &str, active: bool) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let id = parse_source_id(id)?;

    let source = storage
        .get_source(&id)
        .await?
        .ok_or_else(|| eyre!("unknown source {id}"))?;
    storage.set_source_active(&id, active).await?;

    println!(
        "Source '{}' {}",
        source.name,
        if active { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn cmd_jobs(source: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let id = parse_source_id(source)?;
    let jobs = storage.list_jobs_for_source(&id).await?;

    if jobs.is_empty() {
        println!("No jobs recorded for source {id}.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<38} {:<10} {:<10} {:>6} {:>5} {:>9}",
        "JOB", "TYPE", "STATUS", "FOUND", "NEW", "TIME(MS)"
    );
    for job in &jobs {
        println!(
            "  {:<38} {:<10} {:<10} {:>6} {:>5} {:>9}",
            job.id,
            job.job_type.as_str(),
            job.status.as_str(),
            job.updates_found,
            job.new_updates,
            job.execution_time_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "-".into()),
        );
        if let Some(error) = &job.error_message {
            println!("      error: {error}");
        }
    }
    println!();

    Ok(())
}

async fn cmd_updates(source: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let id = parse_source_id(source)?;
    let updates = storage.list_updates_for_source(&id).await?;

    if updates.is_empty() {
        println!("No updates persisted for source {id}.");
        return Ok(());
    }

    println!();
    for update in &updates {
        println!("  [{}] {}", update.update_type.as_str(), update.title);
        println!(
            "      {} | status: {} | confidence: {:.2}",
            update.source_url,
            update.status.as_str(),
            update.confidence
        );
        if !update.keywords.is_empty() {
            println!("      keywords: {}", update.keywords.join(", "));
        }
    }
    println!();

    Ok(())
}

async fn cmd_cancel(job: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    if storage.cancel_job(job).await? {
        println!("Job {job} cancelled.");
    } else {
        println!("Job {job} is not pending or running; nothing to cancel.");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config written to {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let path = config_file_path()?;
    let rendered = toml::to_string_pretty(&config)?;

    println!("# resolved from {}", path.display());
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn crawl_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
