use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use linearflow::date_util::parse_date_arg;
use linearflow::{
    CacheStore, Database, IngestStatus, IssueQuery, LinearFlow, LogSink, MetricsRecord, Overrides,
    Settings,
};

#[derive(Parser)]
#[command(name = "linearflow", about = "Workflow metrics for Linear issues")]
struct Cli {
    /// Database path (default: ~/.linearflow/linearflow.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Page size for Linear API requests (default: 50, max 250)
    #[arg(long)]
    page_size: Option<u32>,

    /// Linear API key (default: $LINEAR_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// GraphQL endpoint (default: $LINEARFLOW_API_URL, then the `api_url` config value)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute cycle time, lead time, throughput and flow efficiency
    Metrics {
        #[command(flatten)]
        filter: FilterArgs,
        /// Also report one record per team
        #[arg(long)]
        by_team: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List matching issues with their derived durations
    Issues {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the local response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Team name (default: the `default_team` config value)
    #[arg(long)]
    team: Option<String>,
    /// Assignee display name
    #[arg(long)]
    assignee: Option<String>,
    /// Created on or after this date (YYYY-MM-DD or Nd, e.g. 30d)
    #[arg(long)]
    since: Option<String>,
    /// Created on or before this date (YYYY-MM-DD or Nd)
    #[arg(long)]
    until: Option<String>,
    /// Include archived issues
    #[arg(long)]
    archived: bool,
    /// Bypass the cache for this run
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts
    Status,
    /// Delete expired entries
    Purge,
    /// Delete every entry
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => Database::open_at(path).await?,
        None => Database::open().await?,
    };

    let globals = Overrides {
        api_key: cli.api_key.clone(),
        api_url: cli.api_url.clone(),
        page_size: cli.page_size,
        ..Default::default()
    };

    match cli.command {
        Commands::Metrics {
            filter,
            by_team,
            json,
        } => {
            let (flow, query) = prepare(&db, &globals, &filter).await?;
            let report = flow.report(&query).await;
            check_status(&report.status)?;
            if json {
                if by_team {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("{}", serde_json::to_string_pretty(&report.overall)?);
                }
            } else {
                print_record("All issues", &report.overall);
                if by_team {
                    for (team, record) in &report.by_team {
                        println!();
                        print_record(team, record);
                    }
                }
            }
        }
        Commands::Issues { filter, json } => {
            let (flow, query) = prepare(&db, &globals, &filter).await?;
            let collection = flow.issues(&query).await;
            check_status(collection.status())?;
            let summaries: Vec<_> = collection.views().iter().map(|v| v.summary()).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No issues found.");
            } else {
                println!(
                    "{:<12} {:<12} {:<16} {:<20} {:>8} {:>8}  TITLE",
                    "ID", "STATE", "TEAM", "ASSIGNEE", "CYCLE", "LEAD"
                );
                for s in &summaries {
                    println!(
                        "{:<12} {:<12} {:<16} {:<20} {:>8} {:>8}  {}",
                        s.identifier.as_deref().or(s.id.as_deref()).unwrap_or("-"),
                        s.state_type.as_ref().map(|t| t.as_str()).unwrap_or("-"),
                        s.team.as_deref().unwrap_or("-"),
                        s.assignee.as_deref().unwrap_or("-"),
                        days(s.cycle_time_days),
                        days(s.lead_time_days),
                        s.title.as_deref().unwrap_or(""),
                    );
                }
                println!("\n{} issues", summaries.len());
            }
        }
        Commands::Cache { action } => {
            handle_cache(db, action).await?;
        }
        Commands::Config { action } => {
            handle_config(&db, action).await?;
        }
    }

    Ok(())
}

/// Command-line values layered over the global flags.
fn overrides(globals: &Overrides, filter: &FilterArgs) -> Overrides {
    Overrides {
        cache_enabled: filter.no_cache.then_some(false),
        default_team: filter.team.clone(),
        ..globals.clone()
    }
}

async fn prepare(
    db: &Database,
    globals: &Overrides,
    filter: &FilterArgs,
) -> anyhow::Result<(LinearFlow<linearflow::LinearClient>, IssueQuery)> {
    let overrides = overrides(globals, filter);
    let settings = Settings::load(db, &overrides).await?;
    let flow = LinearFlow::from_settings(&settings, db.clone(), Arc::new(LogSink))?;

    let today = chrono::Local::now().date_naive();
    let mut query = IssueQuery::new().include_archived(filter.archived);
    query.team = settings.default_team.clone();
    query.assignee = filter.assignee.clone();
    if let Some(since) = &filter.since {
        query = query.created_after(parse_date_arg(since, today)?);
    }
    if let Some(until) = &filter.until {
        query = query.created_before(parse_date_arg(until, today)?);
    }
    Ok((flow, query))
}

fn check_status(status: &IngestStatus) -> anyhow::Result<()> {
    match status {
        IngestStatus::Failed(reason) => anyhow::bail!("Fetch failed: {reason}"),
        IngestStatus::Truncated => {
            eprintln!("Warning: page limit reached, results are truncated.");
            Ok(())
        }
        IngestStatus::Cached => {
            log::info!("Served from cache");
            Ok(())
        }
        IngestStatus::Fresh => Ok(()),
    }
}

fn days(value: Option<f64>) -> String {
    value.map(|d| format!("{d:.2}d")).unwrap_or_else(|| "-".into())
}

fn print_record(title: &str, m: &MetricsRecord) {
    println!("{title}");
    println!(
        "  Issues:          {} total, {} completed, {} in progress, {} backlog",
        m.total_issues, m.completed_issues, m.in_progress_issues, m.backlog_issues
    );
    println!(
        "  Cycle time:      avg {:.2}d, median {:.2}d, p95 {:.2}d",
        m.cycle_time.average, m.cycle_time.median, m.cycle_time.p95
    );
    println!(
        "  Lead time:       avg {:.2}d, median {:.2}d, p95 {:.2}d",
        m.lead_time.average, m.lead_time.median, m.lead_time.p95
    );
    println!(
        "  Throughput:      {:.2}/week ({} completed)",
        m.throughput.weekly_avg, m.throughput.total_completed
    );
    println!("  Flow efficiency: {:.2}%", m.flow_efficiency);
}

async fn handle_cache(db: Database, action: CacheAction) -> anyhow::Result<()> {
    let cache = CacheStore::new(db, Arc::new(LogSink));
    match action {
        CacheAction::Status => {
            let stats = cache.stats().await?;
            println!("Cache Status");
            println!("  Entries: {}", stats.entries);
            println!("  Expired: {}", stats.expired);
        }
        CacheAction::Purge => {
            let n = cache.purge_expired().await?;
            println!("Removed {n} expired entries.");
        }
        CacheAction::Clear => {
            let n = cache.clear().await?;
            println!("Removed {n} entries.");
        }
    }
    Ok(())
}

async fn handle_config(db: &Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match db.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            if !linearflow::config::CONFIG_KEYS.contains(&key.as_str()) {
                log::warn!(
                    "'{key}' is not read by linearflow (known keys: {})",
                    linearflow::config::CONFIG_KEYS.join(", ")
                );
            }
            linearflow::config::validate_entry(&key, &value)?;
            db.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = db.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}
