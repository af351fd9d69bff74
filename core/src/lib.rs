//! Product retrieval engine: positional inverted index, conjunctive candidate
//! resolution, interchangeable rankers and IR evaluation metrics.

pub mod cancel;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod metrics;
pub mod persist;
pub mod ranking;
pub mod search;
pub mod suggest;
pub mod tokenizer;

/// Dense internal document id, assigned in corpus load order.
pub type DocId = u32;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use document::{Corpus, Document};
pub use error::{Error, Result};
pub use index::InvertedIndex;
pub use ranking::{Ranker, RankingMethod};
pub use search::{SearchEngine, SearchHit};
