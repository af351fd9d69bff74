use anyhow::Result;
use axum::Router;
use clap::Parser;
use searchcore::{EngineConfig, RankingMethod};
use server::build_app_from_corpus;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Pre-tokenized corpus (JSON, JSONL or a directory of them)
    #[arg(long, default_value = "./data/processed_corpus.json")]
    corpus: PathBuf,
    /// Engine configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the default ranking method
    #[arg(long)]
    method: Option<RankingMethod>,
    /// Override the word-vector model directory
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Per-query deadline in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(method) = args.method {
        config.default_method = method;
    }
    if let Some(dir) = args.model_dir.clone() {
        config.embedding.model_dir = dir;
    }

    let corpus = args.corpus.clone();
    let timeout = Duration::from_millis(args.timeout_ms);
    let app: Router = tokio::task::spawn_blocking(move || build_app_from_corpus(corpus, config, timeout)).await??;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
