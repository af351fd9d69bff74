use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use searchcore::embeddings::WordVectors;
use searchcore::evaluation::{self, EvaluationReport};
use searchcore::persist::{load_ground_truth, load_query_texts};
use searchcore::suggest::{suggest_queries, SuggestedQuery};
use searchcore::tokenizer::{normalize, query_terms};
use searchcore::{CancelToken, EngineConfig, RankingMethod, SearchEngine};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "searchctl")]
#[command(about = "Query, inspect and evaluate the product search engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct EngineArgs {
    /// Pre-tokenized corpus (JSON, JSONL or a directory of them)
    #[arg(long)]
    corpus: PathBuf,
    /// Engine configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,
    /// Word-vector model directory
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print vocabulary statistics for the indexed corpus
    Stats {
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one query
    Search {
        #[command(flatten)]
        engine: EngineArgs,
        /// Query text
        query: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// tfidf, bm25, word2vec or custom
        #[arg(long, default_value = "tfidf")]
        method: String,
        /// Stem and drop stopwords before searching
        #[arg(long, default_value_t = false)]
        normalize: bool,
    },
    /// Score ground-truth queries with the IR metrics
    Evaluate {
        #[command(flatten)]
        engine: EngineArgs,
        /// CSV with query_id,pid,labels
        #[arg(long)]
        labels: PathBuf,
        /// JSON object mapping query_id to query text
        #[arg(long)]
        queries: PathBuf,
        /// Methods to evaluate; all when omitted
        #[arg(long = "method")]
        methods: Vec<RankingMethod>,
        /// Emit JSON instead of the text report
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Propose two-term test queries with non-empty conjunctive results
    SuggestQueries {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(long, default_value_t = 200)]
        top_terms: usize,
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Write the queries here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Convert text word vectors into a bincode snapshot
    ConvertVectors {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { engine } => {
            let engine = load_engine(&engine)?;
            print_json(&engine.index().vocabulary_stats())
        }
        Commands::Search { engine, query, k, method, normalize } => {
            let engine = load_engine(&engine)?;
            for (rank, row) in run_search(&engine, &query, k, &method, normalize)?.iter().enumerate() {
                println!("{:>3}. {:<24} {:.4}  {}", rank + 1, row.pid, row.score, row.title);
            }
            Ok(())
        }
        Commands::Evaluate { engine, labels, queries, methods, json } => {
            let engine = load_engine(&engine)?;
            let reports = run_evaluate(&engine, &labels, &queries, &methods)?;
            if json {
                return print_json(&reports);
            }
            for report in reports {
                println!("{report}\n");
            }
            Ok(())
        }
        Commands::SuggestQueries { engine, top_terms, count, output } => {
            let engine = load_engine(&engine)?;
            let queries: Vec<SuggestedQuery> = suggest_queries(engine.index(), top_terms, count);
            match output {
                Some(path) => {
                    fs::write(&path, serde_json::to_string_pretty(&queries)?)?;
                    tracing::info!(path = %path.display(), queries = queries.len(), "wrote test queries");
                    Ok(())
                }
                None => print_json(&queries),
            }
        }
        Commands::ConvertVectors { input, output } => {
            let wv = WordVectors::load(&input)?;
            wv.save(&output)?;
            tracing::info!(words = wv.len(), output = %output.display(), "snapshot written");
            Ok(())
        }
    }
}

fn load_engine(args: &EngineArgs) -> Result<SearchEngine> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.model_dir {
        config.embedding.model_dir = dir.clone();
    }
    SearchEngine::load(&args.corpus, config).with_context(|| format!("loading corpus {}", args.corpus.display()))
}

#[derive(Debug, Serialize)]
struct ResultRow {
    pid: String,
    score: f64,
    title: String,
}

fn run_search(engine: &SearchEngine, query: &str, k: usize, method: &str, normalized: bool) -> Result<Vec<ResultRow>> {
    let terms = if normalized { normalize(query) } else { query_terms(query) };
    let method = engine.resolve_method(method);
    let hits = engine.search_terms(&terms, k, method, &CancelToken::default())?;
    Ok(hits
        .into_iter()
        .map(|h| {
            let title = engine.corpus().get(h.doc_id).map(|d| d.title.clone()).unwrap_or_default();
            ResultRow { pid: h.external_id, score: h.score, title }
        })
        .collect())
}

fn run_evaluate(
    engine: &SearchEngine,
    labels: &Path,
    queries: &Path,
    methods: &[RankingMethod],
) -> Result<Vec<EvaluationReport>> {
    let truth = load_ground_truth(labels)?;
    let texts = load_query_texts(queries)?;
    let methods: &[RankingMethod] = if methods.is_empty() { engine.available_methods() } else { methods };
    let mut reports = Vec::with_capacity(methods.len());
    for &method in methods {
        match evaluation::evaluate(engine, &truth, &texts, method) {
            Ok(report) => reports.push(report),
            // Without word vectors the remaining methods can still be evaluated.
            Err(err) if method == RankingMethod::Word2vec => {
                tracing::warn!(error = %err, "skipping word2vec evaluation");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(reports)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &std::path::Path) -> EngineArgs {
        let corpus = dir.join("corpus.jsonl");
        fs::write(
            &corpus,
            concat!(
                "{\"pid\":\"P1\",\"tokens\":\"women full sleev sweatshirt cotton\",\"title\":\"Cotton sweatshirt\"}\n",
                "{\"pid\":\"P2\",\"tokens\":\"women sweatshirt cotton fleec full sleev hood\",\"title\":\"Hoodie\"}\n",
                "{\"pid\":\"P3\",\"tokens\":\"men slim jean blue\",\"title\":\"Slim jeans\"}\n",
            ),
        )
        .unwrap();
        EngineArgs { corpus, config: None, model_dir: Some(dir.join("models")) }
    }

    #[test]
    fn normalized_search_finds_stemmed_terms() {
        let dir = tempfile::tempdir().unwrap();
        let engine = load_engine(&fixture(dir.path())).unwrap();
        let rows = run_search(&engine, "Slim Jeans", 10, "bm25", true).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pid, "P3");
        assert!(run_search(&engine, "Slim Jeans", 10, "bm25", false).unwrap().is_empty());
    }

    #[test]
    fn evaluates_every_available_method() {
        let dir = tempfile::tempdir().unwrap();
        let engine = load_engine(&fixture(dir.path())).unwrap();
        let labels = dir.path().join("labels.csv");
        fs::write(&labels, "query_id,pid,labels\n1,P2,1\n1,P1,0\n2,P3,1\n").unwrap();
        let queries = dir.path().join("queries.json");
        fs::write(&queries, r#"{"1": "women full sleeve sweatshirt cotton", "2": "men slim jeans blue"}"#).unwrap();

        let reports = run_evaluate(&engine, &labels, &queries, &[]).unwrap();
        // word2vec is skipped: no vectors in the model directory
        assert_eq!(reports.len(), 3);
        let tfidf = &reports[0];
        assert_eq!(tfidf.method, RankingMethod::Tfidf);
        assert_eq!(tfidf.queries.len(), 2);
        assert_eq!(tfidf.queries[1].labels, vec![1]);
    }
}
