//! Search facade: conjunctive candidates from the index, ranked by a strategy
//! chosen per query.
//!
//! Rankers are built on first use and cached for the life of the engine, one
//! cell per method. Concurrent first callers of a method wait for a single
//! build; callers of other methods and of cached rankers never wait. A failed
//! build is cached too, so a broken embedding model is loaded at most once.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::document::{Corpus, Document};
use crate::embeddings::{self, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::InvertedIndex;
use crate::ranking::{Bm25Ranker, EmbeddingRanker, HybridRanker, Ranker, RankingMethod, TfidfRanker};
use crate::tokenizer::query_terms;
use crate::DocId;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(skip)]
    pub doc_id: DocId,
    #[serde(rename = "pid")]
    pub external_id: String,
    pub score: f64,
}

type EmbeddingLoader = dyn Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync;

/// What a failed ranker build leaves behind for later callers.
#[derive(Debug, Clone)]
enum BuildFailure {
    Timeout(Duration),
    Unavailable(String),
}

impl From<&Error> for BuildFailure {
    fn from(err: &Error) -> Self {
        match err {
            Error::EmbeddingTimeout(after) => Self::Timeout(*after),
            Error::Embedding(msg) => Self::Unavailable(msg.clone()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<&BuildFailure> for Error {
    fn from(failure: &BuildFailure) -> Self {
        match failure {
            BuildFailure::Timeout(after) => Error::EmbeddingTimeout(*after),
            BuildFailure::Unavailable(msg) => Error::Embedding(msg.clone()),
        }
    }
}

type Slot = OnceCell<std::result::Result<Arc<dyn Ranker>, BuildFailure>>;

#[derive(Default)]
struct Registry {
    // The hybrid ranker composes TF-IDF, so the concrete type is kept too.
    tfidf: OnceCell<Arc<TfidfRanker>>,
    // Indexed by `RankingMethod as usize`.
    slots: [Slot; RankingMethod::ALL.len()],
}

pub struct SearchEngine {
    corpus: Arc<Corpus>,
    index: Arc<InvertedIndex>,
    config: EngineConfig,
    embedding_loader: Arc<EmbeddingLoader>,
    registry: Registry,
}

impl SearchEngine {
    /// Index `corpus` on `config.corpus.token_field`.
    pub fn new(corpus: Corpus, config: EngineConfig) -> Self {
        let field = config.corpus.token_field.as_str();
        let index = if config.parallel_build {
            InvertedIndex::build_from_corpus_parallel(&corpus, field)
        } else {
            InvertedIndex::build_from_corpus(&corpus, field)
        };
        let embedding = config.embedding.clone();
        Self {
            corpus: Arc::new(corpus),
            index: Arc::new(index),
            config,
            embedding_loader: Arc::new(move || embeddings::load_with_fallback(&embedding)),
            registry: Registry::default(),
        }
    }

    /// Load the corpus at `path` and index it.
    pub fn load<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let corpus = crate::persist::load_corpus(path, &config.corpus)?;
        Ok(Self::new(corpus, config))
    }

    /// Use `provider` for the embedding ranker instead of loading the
    /// configured model.
    pub fn with_embeddings(self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.with_embedding_loader(move || Ok(provider.clone()))
    }

    /// Replace the configured model loading. `loader` runs at most once, on
    /// the first word2vec query.
    pub fn with_embedding_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        self.embedding_loader = Arc::new(loader);
        self
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }
    pub fn index(&self) -> &InvertedIndex { &self.index }
    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn available_methods(&self) -> &'static [RankingMethod] { &RankingMethod::ALL }

    pub fn default_method(&self) -> RankingMethod { self.config.default_method }

    /// Resolve a method name, falling back to the default for unknown names.
    pub fn resolve_method(&self, name: &str) -> RankingMethod { RankingMethod::parse_or(name, self.config.default_method) }

    pub fn document(&self, external_id: &str) -> Option<&Document> {
        self.corpus.lookup(external_id).and_then(|id| self.corpus.get(id))
    }

    /// Cached ranker for `method`, building it on first use.
    pub fn ranker(&self, method: RankingMethod) -> Result<Arc<dyn Ranker>> {
        let built = self.registry.slots[method as usize].get_or_init(|| match self.build(method) {
            Ok(ranker) => {
                tracing::info!(method = method.as_str(), "ranker ready");
                Ok(ranker)
            }
            Err(err) => {
                tracing::warn!(method = method.as_str(), error = %err, "ranker build failed");
                Err(BuildFailure::from(&err))
            }
        });
        match built {
            Ok(ranker) => Ok(ranker.clone()),
            Err(failure) => Err(failure.into()),
        }
    }

    fn build(&self, method: RankingMethod) -> Result<Arc<dyn Ranker>> {
        let ranker: Arc<dyn Ranker> = match method {
            RankingMethod::Tfidf => self.tfidf(),
            RankingMethod::Bm25 => Arc::new(Bm25Ranker::new(self.index.clone(), &self.corpus, self.config.bm25)),
            RankingMethod::Word2vec => {
                let provider = (self.embedding_loader)()?;
                Arc::new(EmbeddingRanker::new(provider, &self.corpus, &self.config.corpus.token_field))
            }
            RankingMethod::Custom => Arc::new(HybridRanker::new(
                self.index.clone(),
                self.corpus.clone(),
                self.tfidf(),
                self.config.hybrid.clone(),
            )),
        };
        Ok(ranker)
    }

    fn tfidf(&self) -> Arc<TfidfRanker> {
        self.registry
            .tfidf
            .get_or_init(|| Arc::new(TfidfRanker::new(self.index.clone(), &self.corpus)))
            .clone()
    }

    /// Build rankers ahead of the first query. A failed build is logged once
    /// and reported to every query of that method.
    pub fn warm_up(&self, methods: &[RankingMethod]) {
        for &method in methods {
            let _ = self.ranker(method);
        }
    }

    /// Lower-case and whitespace-split `raw`, then rank the conjunctive
    /// candidates with `method` (unknown names use the default method).
    pub fn search(&self, raw: &str, top_k: usize, method: &str) -> Result<Vec<SearchHit>> {
        self.search_with(raw, top_k, method, &CancelToken::default())
    }

    pub fn search_with(&self, raw: &str, top_k: usize, method: &str, cancel: &CancelToken) -> Result<Vec<SearchHit>> {
        let terms = query_terms(raw);
        self.search_terms(&terms, top_k, self.resolve_method(method), cancel)
    }

    /// Rank already normalised `terms`.
    pub fn search_terms(
        &self,
        terms: &[String],
        top_k: usize,
        method: RankingMethod,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchHit>> {
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.index.conjunctive_query_with(terms, cancel)?;
        if candidates.is_empty() {
            tracing::debug!(?terms, "no conjunctive candidates");
            return Ok(Vec::new());
        }
        let ranker = self.ranker(method)?;
        // A first-use build may have outlasted the deadline.
        cancel.check()?;
        let mut ranked = ranker.rank_with(terms, &candidates, cancel)?;
        ranked.truncate(top_k);
        Ok(ranked
            .into_iter()
            .filter_map(|(doc_id, score)| {
                let doc = self.corpus.get(doc_id)?;
                Some(SearchHit { doc_id, external_id: doc.external_id.clone(), score })
            })
            .collect())
    }
}
