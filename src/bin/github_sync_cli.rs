use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use github_sync::formatter::{TimezoneOffset, sync_report_markdown_with_timezone};
use github_sync::query::{NodeCallback, Query};
use github_sync::services::{
    ItemUpdatePlan, SyncConfig, SyncEngine, SyncReport, SyncStep, SyncSteps, TOKEN_ENV_VAR,
    default_config_path,
};
use github_sync::store::MemoryStore;
use github_sync::types::{ItemKind, TrackedItem};

#[derive(Parser)]
#[command(name = "github-sync-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "GitHub Sync CLI - incremental GraphQL sync of pull requests, issues and their reviews, comments, statuses and reactions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Configuration file (default: ~/.local/share/github-sync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format for reports
    #[arg(long, global = true, default_value = "markdown")]
    format: OutputFormat,
    /// GitHub personal access token for servers without a configured token (can also be set via GITHUB_SYNC_TOKEN)
    #[arg(long, global = true)]
    github_token: Option<String>,
    /// Timezone for timestamps in markdown reports (e.g. "JST", "+09:00", "UTC"), defaults to the local timezone
    #[arg(long, global = true)]
    timezone: Option<String>,
    /// Request timeout in seconds for GitHub API calls (overrides the configuration)
    #[arg(long, global = true)]
    request_timeout: Option<u64>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindCli {
    PullRequest,
    Issue,
}

impl From<KindCli> for ItemKind {
    fn from(kind: KindCli) -> Self {
        match kind {
            KindCli::PullRequest => ItemKind::PullRequest,
            KindCli::Issue => ItemKind::Issue,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every configured server (or only --server) accepts the credentials
    TestApi {
        #[arg(long)]
        server: Option<String>,
    },
    /// Fetch open pull requests and issues authored by the authenticated user
    SyncAuthored,
    /// Fetch new and updated items of the repositories listed in the configuration
    SyncRepositories,
    /// Refresh reviews, comments, statuses or reactions of pull requests or issues
    UpdateItems {
        #[arg(long, default_value = "pull-request")]
        kind: KindCli,
        /// Comma separated steps: review-requests, reviews, review-comments, statuses, reactions, comments
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<SyncStep>,
        /// Server the items live on (default: the first configured server)
        #[arg(long)]
        server: Option<String>,
        /// Global node ids of the items
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Refresh the reactions of issue comments and review comments
    UpdateCommentReactions {
        #[arg(long)]
        server: Option<String>,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Refresh the comments of pull request reviews
    UpdateReviewComments {
        #[arg(long)]
        server: Option<String>,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print the GraphQL documents update-items would send, without sending them
    ShowQuery {
        #[arg(long, default_value = "pull-request")]
        kind: KindCli,
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<SyncStep>,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider early to prevent "no process-level CryptoProvider available" panics
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("github_sync=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let github_token = cli
        .github_token
        .or_else(|| env::var(TOKEN_ENV_VAR).ok());

    let timezone = cli
        .timezone
        .and_then(|tz| TimezoneOffset::parse(&tz))
        .or_else(|| Some(TimezoneOffset::from_local()));

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = SyncConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(secs) = cli.request_timeout {
        config.settings.request_timeout_secs = secs;
    }

    let servers = config.api_servers(github_token.as_deref());
    let default_server = servers
        .first()
        .map(|s| s.label.clone())
        .context("No API server configured")?;

    if let Commands::ShowQuery { kind, steps, ids } = &cli.command {
        return show_query((*kind).into(), steps, ids, &default_server);
    }

    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::connect(Arc::clone(&store), servers, config.settings.clone())?;

    let tracked = |server: Option<String>, ids: Vec<String>| -> Vec<TrackedItem> {
        let label = server.unwrap_or_else(|| default_server.clone());
        ids.into_iter()
            .map(|id| TrackedItem::new(id, label.clone()))
            .collect()
    };

    let report = match cli.command {
        Commands::TestApi { server } => {
            let labels: Vec<String> = match server {
                Some(label) => vec![label],
                None => engine
                    .servers()
                    .iter()
                    .map(|c| c.server.label.clone())
                    .collect(),
            };
            let mut all_ok = true;
            for label in labels {
                match engine.test_api(&label).await {
                    Ok(true) => println!("{}: OK", label),
                    Ok(false) => {
                        all_ok = false;
                        println!("{}: connected, but no user was returned", label);
                    }
                    Err(e) => {
                        all_ok = false;
                        println!("{}: FAILED: {:#}", label, e);
                    }
                }
            }
            if !all_ok {
                std::process::exit(1);
            }
            return Ok(());
        }
        Commands::SyncAuthored => engine.fetch_authored_items().await,
        Commands::SyncRepositories => engine.fetch_subscribed_items(&config.repositories).await,
        Commands::UpdateItems {
            kind,
            steps,
            server,
            ids,
        } => {
            let steps: SyncSteps = steps.into_iter().collect();
            engine
                .update_items(&tracked(server, ids), kind.into(), &steps)
                .await
        }
        Commands::UpdateCommentReactions { server, ids } => {
            engine
                .update_comment_reactions(&tracked(server, ids))
                .await
        }
        Commands::UpdateReviewComments { server, ids } => {
            engine.update_review_comments(&tracked(server, ids)).await
        }
        Commands::ShowQuery { .. } => return Ok(()),
    };

    print_report(&report, &cli.format, timezone.as_ref())?;
    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(
    report: &SyncReport,
    format: &OutputFormat,
    timezone: Option<&TimezoneOffset>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json_output = serde_json::to_string_pretty(report)?;
            println!("{}", json_output);
        }
        OutputFormat::Markdown => {
            println!("{}", sync_report_markdown_with_timezone(report, timezone));
        }
    }
    Ok(())
}

fn show_query(kind: ItemKind, steps: &[SyncStep], ids: &[String], server_label: &str) -> Result<()> {
    let steps: SyncSteps = steps.iter().copied().collect();
    let plan = ItemUpdatePlan::for_items(kind, &steps);
    if plan.is_empty() {
        println!("None of the steps apply to {}", kind);
        return Ok(());
    }

    let queries: Vec<Query> = plan.queries(server_label, ids, &NodeCallback::new(|_| true))?;
    for query in queries {
        println!("# {}", query.name());
        println!("{}\n", query.build_document());
    }
    Ok(())
}
