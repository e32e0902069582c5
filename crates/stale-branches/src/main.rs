//! CLI for the stale branch policy engine
//!
//! Run `stale-branches --help` for usage information.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stale_branches::config::{
    non_empty, parse_remap_authors, DEFAULT_DAYS_BEFORE_DELETE, DEFAULT_DAYS_BEFORE_STALE,
    DEFAULT_MESSAGE, DEFAULT_OPERATIONS_PER_RUN, DEFAULT_PROTECTED_BRANCHES, DEFAULT_SERVER_URL,
};
use stale_branches::github::DEFAULT_API_URL;
use stale_branches::source::DEFAULT_PAGE_SIZE;
use stale_branches::{
    CommentStore, GitHubClient, Params, Repo, RunSummary, StaleBranchReaper, DEFAULT_CONCURRENCY,
};

#[derive(Parser)]
#[command(name = "stale-branches")]
#[command(about = "Mark and remove stale branches of a GitHub repository")]
#[command(version)]
struct Cli {
    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// Repository in owner/repo format
    #[arg(short, long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Base URL used in branch links
    #[arg(long, env = "GITHUB_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// GitHub REST API URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// GitHub GraphQL URL (defaults to `<api-url>/graphql`)
    #[arg(long, env = "GITHUB_GRAPHQL_URL")]
    graphql_url: Option<String>,

    /// Output format: json, text
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan branches and mark or remove stale ones (default)
    Run,

    /// List branches carrying a protection rule
    ProtectedBranches,
}

#[derive(Args)]
struct RunArgs {
    /// Log what would happen without changing anything
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Days without commits before a branch is marked stale
    #[arg(long, env = "DAYS_BEFORE_BRANCH_STALE", default_value_t = DEFAULT_DAYS_BEFORE_STALE)]
    days_before_branch_stale: u32,

    /// Days between marking a branch and removing it
    #[arg(long, env = "DAYS_BEFORE_BRANCH_DELETE", default_value_t = DEFAULT_DAYS_BEFORE_DELETE)]
    days_before_branch_delete: u32,

    /// Stale comment template
    #[arg(
        long,
        env = "STALE_BRANCH_MESSAGE",
        default_value = DEFAULT_MESSAGE,
        hide_default_value = true
    )]
    stale_branch_message: String,

    /// Branches matching this pattern are never touched
    #[arg(long, env = "EXEMPT_BRANCHES_REGEX", default_value = DEFAULT_PROTECTED_BRANCHES)]
    exempt_branches_regex: String,

    /// Only branches matching this pattern are considered
    #[arg(long, env = "ALLOWED_BRANCHES_REGEX")]
    allowed_branches_regex: Option<String>,

    /// Branches whose author matches this pattern are never touched
    #[arg(long, env = "EXEMPT_AUTHORS_REGEX")]
    exempt_authors_regex: Option<String>,

    /// Branches whose author belongs to this organization are never touched
    #[arg(long, env = "EXEMPT_ORGANIZATION")]
    exempt_organization: Option<String>,

    /// Leave branches with a protection rule alone
    #[arg(long, env = "EXEMPT_PROTECTED_BRANCHES", default_value_t = true, action = ArgAction::Set)]
    exempt_protected_branches: bool,

    /// Maximum number of mark/remove operations per run
    #[arg(long, env = "OPERATIONS_PER_RUN", default_value_t = DEFAULT_OPERATIONS_PER_RUN)]
    operations_per_run: usize,

    /// Recipient mentioned when the author cannot be resolved
    #[arg(long, env = "DEFAULT_RECIPIENT")]
    default_recipient: Option<String>,

    /// Process branches whose author is not linked to a GitHub account
    #[arg(long, env = "IGNORE_UNKNOWN_AUTHORS")]
    ignore_unknown_authors: bool,

    /// Leave branches with open pull requests alone
    #[arg(long, env = "IGNORE_BRANCHES_WITH_OPEN_PRS")]
    ignore_branches_with_open_prs: bool,

    /// JSON object mapping usernames to the names used in comments
    #[arg(long, env = "REMAP_AUTHORS")]
    remap_authors: Option<String>,

    /// Pause before posting each comment, in milliseconds
    #[arg(long, env = "COMMENT_DELAY_MS", default_value_t = 0)]
    comment_delay_ms: u64,

    /// Pause before deleting each branch, in milliseconds
    #[arg(long, env = "DELETE_DELAY_MS", default_value_t = 0)]
    delete_delay_ms: u64,

    /// Branches processed at once
    #[arg(long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Branches requested per page
    #[arg(long, env = "PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Abort the run after this many seconds
    #[arg(long, env = "TIMEOUT_SECS", default_value_t = 3600)]
    timeout_secs: u64,
}

impl RunArgs {
    fn params(&self, repo: Repo, server_url: &str) -> Result<Params> {
        let remap_authors = match self.remap_authors.as_deref() {
            Some(raw) => parse_remap_authors(raw)?,
            None => std::collections::HashMap::new(),
        };

        let mut params = Params::new(repo);
        params.dry_run = self.dry_run;
        params.days_before_branch_stale = self.days_before_branch_stale;
        params.days_before_branch_delete = self.days_before_branch_delete;
        params.stale_comment_message.clone_from(&self.stale_branch_message);
        params.protected_branches_regex = non_empty(Some(self.exempt_branches_regex.clone()));
        params.allowed_branches_regex = non_empty(self.allowed_branches_regex.clone());
        params.protected_authors_regex = non_empty(self.exempt_authors_regex.clone());
        params.protected_organization_name = non_empty(self.exempt_organization.clone());
        params.exempt_protected_branches = self.exempt_protected_branches;
        params.operations_per_run = self.operations_per_run;
        params.default_recipient = non_empty(self.default_recipient.clone());
        params.ignore_unknown_authors = self.ignore_unknown_authors;
        params.ignore_branches_with_open_prs = self.ignore_branches_with_open_prs;
        params.remap_authors = remap_authors;
        params.server_url = server_url.trim_end_matches('/').to_string();
        params.comment_delay = Duration::from_millis(self.comment_delay_ms);
        params.delete_delay = Duration::from_millis(self.delete_delay_ms);

        params.validate()?;
        Ok(params)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let repo = Repo::parse(&cli.repository)
        .with_context(|| format!("Invalid repository {:?}, expected owner/repo", cli.repository))?;
    let client = GitHubClient::new(&cli.token, repo.clone())
        .context("Failed to create GitHub client")?
        .with_urls(&cli.api_url, cli.graphql_url.as_deref());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let params = cli
                .run
                .params(repo, &cli.server_url)
                .context("Invalid configuration")?;
            let summary = run(params, client, &cli.run).await?;
            print_summary(&summary, cli.format)?;
        }
        Commands::ProtectedBranches => {
            let branches = client
                .list_protected_branches()
                .await
                .context("Failed to list protected branches")?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&branches)?),
                OutputFormat::Text => {
                    for branch in branches {
                        println!("{branch}");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run(params: Params, client: GitHubClient, args: &RunArgs) -> Result<RunSummary> {
    let client = Arc::new(client);
    let reaper = StaleBranchReaper::new(params, client.clone(), client)
        .with_concurrency(args.concurrency)
        .with_page_size(args.page_size);

    let timeout = Duration::from_secs(args.timeout_secs);
    let summary = tokio::time::timeout(timeout, reaper.run(chrono::Utc::now()))
        .await
        .with_context(|| format!("Run did not finish within {}s", args.timeout_secs))?
        .context("Stale branch run failed")?;

    info!(
        operations = summary.operations(),
        errors = summary.errors,
        "Run complete"
    );
    Ok(summary)
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => println!("{summary}"),
    }
    Ok(())
}
