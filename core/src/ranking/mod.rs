//! Ranking strategies. Each one scores a candidate set against query terms
//! behind the [`Ranker`] trait so the search facade can swap them by name.

pub mod bm25;
pub mod embedding;
pub mod hybrid;
pub mod proximity;
pub mod tfidf;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

pub use bm25::Bm25Ranker;
pub use embedding::EmbeddingRanker;
pub use hybrid::HybridRanker;
pub use tfidf::TfidfRanker;

/// Ordered `(doc_id, score)` pairs, best first.
pub type Ranked = Vec<(DocId, f64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMethod {
    Tfidf,
    Bm25,
    Word2vec,
    Custom,
}

impl RankingMethod {
    pub const ALL: [RankingMethod; 4] = [Self::Tfidf, Self::Bm25, Self::Word2vec, Self::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tfidf => "tfidf",
            Self::Bm25 => "bm25",
            Self::Word2vec => "word2vec",
            Self::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Tfidf => "TF-IDF",
            Self::Bm25 => "BM25",
            Self::Word2vec => "Word2Vec cosine",
            Self::Custom => "Custom hybrid",
        }
    }

    /// Parse a method identifier, falling back to `default` for anything unrecognised.
    pub fn parse_or(name: &str, default: RankingMethod) -> RankingMethod {
        name.parse().unwrap_or_else(|_| {
            tracing::debug!(requested = name, fallback = default.as_str(), "unknown ranking method");
            default
        })
    }
}

impl fmt::Display for RankingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown ranking method `{}`", self.0) }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for RankingMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tfidf" | "tf-idf" => Ok(Self::Tfidf),
            "bm25" => Ok(Self::Bm25),
            "word2vec" => Ok(Self::Word2vec),
            "custom" => Ok(Self::Custom),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

pub trait Ranker: Send + Sync {
    fn method(&self) -> RankingMethod;

    /// Score `candidates` against `query_terms`, checking `cancel` between
    /// documents. Output is sorted with [`sort_ranked`].
    fn rank_with(&self, query_terms: &[String], candidates: &BTreeSet<DocId>, cancel: &CancelToken) -> Result<Ranked>;

    /// [`Ranker::rank_with`] without a deadline.
    fn rank(&self, query_terms: &[String], candidates: &BTreeSet<DocId>) -> Result<Ranked> {
        self.rank_with(query_terms, candidates, &CancelToken::default())
    }
}

/// Score descending, then DocId ascending so equal scores come out in corpus order.
pub fn sort_ranked(results: &mut [(DocId, f64)]) {
    results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Query terms with duplicates removed, first occurrence order kept.
pub(crate) fn distinct_terms(query_terms: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    query_terms.iter().map(String::as_str).filter(|t| seen.insert(*t)).collect()
}
