use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yakki::{parse_line, AppConfig, BatchLine, CliRunner};
use yakki_core::{
    recover_with_trace, CacheManager, Category, CheckRequest, Checker, TextType, WatchMode,
};

#[derive(Parser)]
#[command(name = "yakki")]
#[command(about = "Advertising-copy compliance checker", long_about = None)]
struct Cli {
    /// Reference data directory (overrides YAKKI_DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Rule directory (overrides YAKKI_RULE_DIR)
    #[arg(short, long)]
    rule_dir: Option<PathBuf>,

    /// File change notifier: push, poll or off (overrides YAKKI_WATCH_MODE)
    #[arg(short, long)]
    watch: Option<WatchMode>,

    /// Model name (overrides YAKKI_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Path to the claude executable (overrides YAKKI_CLAUDE_PATH)
    #[arg(long)]
    claude_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one piece of copy and print the verdict as JSON
    Check {
        /// The advertising text to check
        text: String,

        /// Text type (label or id: catchphrase, headline, description, testimonial)
        #[arg(short, long, default_value = "description")]
        text_type: TextType,

        /// Product category (label or id: cosmetics, medicated_cosmetics, quasi_drug, supplement, device)
        #[arg(short, long, default_value = "cosmetics")]
        category: Category,

        /// Points the copy should emphasize
        #[arg(short, long, default_value = "")]
        special_points: String,

        /// The product holds an efficacy approval
        #[arg(long)]
        approved: bool,

        /// Include source and fingerprint in the output
        #[arg(long)]
        verbose: bool,
    },

    /// Check JSON-lines requests from a file (or - for stdin)
    Batch {
        /// Input file, or - for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// Run response recovery on raw model output from a file (or stdin)
    Recover {
        /// Raw output file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Original copy echoed into fallback rewrites
        #[arg(short, long, default_value = "")]
        original: String,
    },

    /// Warm the reference caches and print cache status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "yakki=info,yakki_core=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Check {
            ref text,
            text_type,
            category,
            ref special_points,
            approved,
            verbose,
        } => {
            let checker = create_checker(&config, false);
            let request = CheckRequest::new(text.as_str(), text_type, category)
                .with_special_points(special_points.as_str())
                .with_approval(approved);
            let response = checker.check(&request).await;

            let output = if verbose {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string_pretty(&response.result)?
            };
            println!("{}", output);
        }

        Commands::Batch { ref input } => {
            let checker = create_checker(&config, true);
            let reader: Box<dyn AsyncRead + Unpin + Send> = if input == "-" {
                Box::new(tokio::io::stdin())
            } else {
                Box::new(
                    tokio::fs::File::open(input)
                        .await
                        .with_context(|| format!("Failed to open batch input {}", input))?,
                )
            };
            run_batch(&checker, reader).await?;

            let status = checker.cache_status().await;
            eprintln!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Recover {
            ref file,
            ref original,
        } => {
            let raw = match file {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut raw = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut raw)
                        .await
                        .context("Failed to read stdin")?;
                    raw
                }
            };

            let outcome = recover_with_trace(&raw, original);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Commands::Status => {
            let caches = CacheManager::new(config.reference(), config.result_cache());
            caches.data_snapshot().await;
            for text_type in TextType::ALL {
                caches.rule_content(text_type).await;
            }
            println!("{}", serde_json::to_string_pretty(&caches.status().await)?);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("Invalid environment configuration")?;

    if let Some(ref dir) = cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(ref dir) = cli.rule_dir {
        config.rule_dir = dir.clone();
    }
    if let Some(mode) = cli.watch {
        config.watch.mode = mode;
    }
    if let Some(ref model) = cli.model {
        config.model.model = model.clone();
    }
    if let Some(ref path) = cli.claude_path {
        config.claude_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn create_checker(config: &AppConfig, watch: bool) -> Checker {
    let caches = Arc::new(CacheManager::new(config.reference(), config.result_cache()));
    if watch {
        if let Some(mode) = caches.start_watching(&config.watch) {
            tracing::info!("Watching reference sources ({})", mode);
        }
    }

    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let runner = CliRunner::new(working_dir)
        .with_claude_path(config.claude_path.clone())
        .with_timeout(config.timeout);
    if !yakki_core::TextGenerator::is_available(&runner) {
        tracing::warn!(
            "{} not found; answering from the NG expression screen only",
            config.claude_path.display()
        );
    }

    Checker::new(caches, Arc::new(runner), config.model.clone())
}

async fn run_batch(checker: &Checker, reader: Box<dyn AsyncRead + Unpin + Send>) -> Result<()> {
    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0usize;
    let mut checked = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read batch input")? {
        line_no += 1;
        match parse_line(&line) {
            Ok(BatchLine::Skip) => {}
            Ok(BatchLine::Invalidate(partition)) => {
                let events = checker.invalidate(partition).await;
                let removed: usize = events.iter().map(|e| e.removed).sum();
                tracing::info!("Line {}: invalidated {} ({} entries)", line_no, partition, removed);
            }
            Ok(BatchLine::Check(request)) => {
                let response = checker.check(&request).await;
                checked += 1;
                let record = serde_json::json!({
                    "line": line_no,
                    "source": response.source,
                    "fingerprint": response.fingerprint,
                    "result": response.result,
                });
                println!("{}", serde_json::to_string(&record)?);
            }
            Err(e) => tracing::warn!("Line {}: skipped ({:#})", line_no, e),
        }
    }

    tracing::info!("Batch complete: {} checks over {} lines", checked, line_no);
    Ok(())
}
