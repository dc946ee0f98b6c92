use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::overrides::Overrides;
use cli::render;
use trend_core::config::{self, AppConfig};
use trend_core::pipeline;
use trend_core::store::DocumentStore;
use trend_core::AnalysisError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => exit_with(err.into()),
    };

    let result = match cli.command {
        Commands::Analyze {
            query,
            threshold,
            top_n,
            horizon,
            candidates,
            json,
        } => {
            let overrides = Overrides {
                index: cli.index,
                threshold,
                top_n,
                horizon,
                candidates,
            };
            run_analyze(overrides.apply(cfg), &query, json).await
        }
        Commands::Search {
            query,
            topk,
            candidates,
            json,
        } => {
            let overrides = Overrides {
                index: cli.index,
                ..Overrides::default()
            };
            run_search(overrides.apply(cfg), &query, topk, candidates, json).await
        }
        Commands::Ping => {
            let overrides = Overrides {
                index: cli.index,
                ..Overrides::default()
            };
            run_ping(overrides.apply(cfg)).await
        }
    };

    if let Err(err) = result {
        exit_with(err);
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "patent-trends")]
#[command(about = "Classification code trends and S-curve forecasts for patent searches", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Index to query instead of the configured one
    #[arg(long, global = true)]
    index: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the CPC codes of a search and forecast their growth
    Analyze {
        /// Free-text query to embed and search
        query: String,
        /// Minimum relevance score in [0, 1]
        #[arg(long)]
        threshold: Option<f32>,
        /// Number of codes to analyse
        #[arg(long)]
        top_n: Option<usize>,
        /// Last forecast year
        #[arg(long)]
        horizon: Option<i32>,
        /// Candidate pool of the vector search
        #[arg(long)]
        candidates: Option<u64>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Semantic search returning titles and abstracts
    Search {
        /// Query text to embed and search
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 6)]
        topk: u64,
        /// Candidate pool of the vector search
        #[arg(long, default_value_t = 10_000)]
        candidates: u64,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the search service is reachable
    Ping,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_with(err: anyhow::Error) -> ! {
    tracing::error!(error = %err, "run failed");
    match err.downcast_ref::<AnalysisError>() {
        Some(analysis) => eprintln!("{}", analysis.user_message()),
        None => eprintln!("{:#}", err),
    }
    std::process::exit(1);
}

async fn run_analyze(cfg: AppConfig, query: &str, json: bool) -> Result<()> {
    let pipeline = pipeline::build_pipeline(&cfg)?;
    pipeline.check_connection().await?;
    let outcome = pipeline.run(query).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", render::outcome(&outcome));
    }
    Ok(())
}

async fn run_search(
    cfg: AppConfig,
    query: &str,
    topk: u64,
    candidates: u64,
    json: bool,
) -> Result<()> {
    let pipeline = pipeline::build_pipeline(&cfg)?;
    pipeline.check_connection().await?;
    let hits = pipeline.search_documents(query, topk, candidates).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", render::hits(&hits));
    }
    Ok(())
}

async fn run_ping(cfg: AppConfig) -> Result<()> {
    let store = pipeline::build_document_store(&cfg)?;
    store
        .ping()
        .await
        .map_err(|e| AnalysisError::Connection(e.to_string()))?;
    println!("Connected to {} (index {})", cfg.store.url, cfg.store.index);
    Ok(())
}
