use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

use altbot::config::Config;
use altbot::detect::formatting::{is_fancy_formatted, longest_run, MIN_RUN};
use altbot::mastodon::api::MastodonApi;
use altbot::mastodon::client::MastodonClient;
use altbot::pipeline::reconcile::{self, ReconcileReport};
use altbot::pipeline::stream::StreamProcessor;

/// altbot: nudges people toward accessible posts on Mastodon.
///
/// Replies privately to posts with uncaptioned images or fancy Unicode
/// text, and keeps the bot's follows in sync with its followers.
#[derive(Parser)]
#[command(name = "altbot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the user stream and serve the web endpoints
    Run,

    /// Process the user stream only
    Listen,

    /// Follow back followers and unfollow accounts that don't follow back
    Reconcile {
        /// Max follow/unfollow calls in flight (default: ALTBOT_CONCURRENCY or 8)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Check whether a piece of text counts as fancy-formatted (offline)
    Check {
        /// The text to check
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("altbot=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = Config::load()?;
            config.require_mastodon()?;
            let api = connect(&config)?;
            run(config, api).await?;
        }

        Commands::Listen => {
            let config = Config::load()?;
            config.require_mastodon()?;
            let api = connect(&config)?;
            listen(api).await?;
        }

        Commands::Reconcile { concurrency } => {
            let config = Config::load()?;
            config.require_mastodon()?;
            let api = connect(&config)?;

            println!("Reconciling followers and following...");
            let concurrency = concurrency.unwrap_or(config.concurrency);
            let report = reconcile::reconcile(api.as_ref(), concurrency).await?;
            print_report(&report);
        }

        Commands::Check { text } => {
            if is_fancy_formatted(&text) {
                println!("{}", "Fancy formatting detected.".yellow().bold());
            } else {
                println!("{}", "Plain text.".green());
            }
            println!(
                "{}",
                format!(
                    "Longest run of styled symbols: {} (threshold {MIN_RUN})",
                    longest_run(&text)
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

fn connect(config: &Config) -> Result<Arc<dyn MastodonApi>> {
    let client = MastodonClient::new(
        &config.api_url,
        config.streaming_url.as_deref(),
        &config.access_token,
        config.http_timeout,
    )?;
    Ok(Arc::new(client))
}

/// Stream processing until the stream fails. The error is logged and
/// returned so the process exits non-zero and its supervisor restarts it.
async fn listen(api: Arc<dyn MastodonApi>) -> Result<()> {
    let processor = StreamProcessor::new(api);
    if let Err(e) = processor.run().await {
        error!(error = %e, "Stream processing stopped");
        return Err(e);
    }
    info!("User stream ended");
    Ok(())
}

#[cfg(feature = "web")]
async fn run(config: Config, api: Arc<dyn MastodonApi>) -> Result<()> {
    let state = altbot::web::AppState {
        api: api.clone(),
        concurrency: config.concurrency,
    };

    tokio::select! {
        result = listen(api) => result,
        result = altbot::web::run_server(state, &config.bot_endpoint, &config.bind, config.port) => {
            if let Err(ref e) = result {
                error!(error = %e, "Web server stopped");
            }
            result
        }
    }
}

#[cfg(not(feature = "web"))]
async fn run(_config: Config, api: Arc<dyn MastodonApi>) -> Result<()> {
    info!("Built without the 'web' feature; processing the stream only");
    listen(api).await
}

fn print_report(report: &ReconcileReport) {
    println!("\n{}", "Reconciliation complete.".bold());
    println!("  Followed:   {}", report.followed.len());
    for id in &report.followed {
        println!("    {} {id}", "+".green());
    }
    println!("  Unfollowed: {}", report.unfollowed.len());
    for id in &report.unfollowed {
        println!("    {} {id}", "-".yellow());
    }
    if !report.failures.is_empty() {
        println!("  Failed:     {}", report.failures.len());
        for failure in &report.failures {
            println!(
                "    {} {:?} {}: {}",
                "!".red(),
                failure.action,
                failure.account_id,
                failure.error.red()
            );
        }
    }
}
