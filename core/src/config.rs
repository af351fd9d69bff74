//! Engine configuration. Every tuning constant used by the rankers lives here;
//! the binaries load it from a JSON file and override fields from flags.

use crate::error::{Error, Result};
use crate::ranking::RankingMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub corpus: CorpusSchema,
    pub default_method: RankingMethod,
    pub bm25: Bm25Params,
    pub hybrid: HybridWeights,
    pub embedding: EmbeddingConfig,
    /// Build the index on the rayon pool instead of a single pass.
    pub parallel_build: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusSchema::default(),
            default_method: RankingMethod::Tfidf,
            bm25: Bm25Params::default(),
            hybrid: HybridWeights::default(),
            embedding: EmbeddingConfig::default(),
            parallel_build: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let cfg: EngineConfig = serde_json::from_str(&text).map_err(|e| Error::json(path, e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bm25.k1 < 0.0 || !self.bm25.k1.is_finite() {
            return Err(Error::Config(format!("bm25.k1 must be a non-negative number, got {}", self.bm25.k1)));
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(Error::Config(format!("bm25.b must be within [0, 1], got {}", self.bm25.b)));
        }
        if self.corpus.id_field.is_empty() || self.corpus.token_field.is_empty() {
            return Err(Error::Config("corpus.id_field and corpus.token_field must be set".into()));
        }
        Ok(())
    }
}

/// Names of the record fields the corpus loader reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSchema {
    pub id_field: String,
    /// Token field used for indexing, BM25 lengths and embedding averages.
    pub token_field: String,
    pub title_field: String,
    pub rating_field: String,
    pub out_of_stock_field: String,
}

impl Default for CorpusSchema {
    fn default() -> Self {
        Self {
            id_field: "pid".into(),
            token_field: "tokens".into(),
            title_field: "title".into(),
            rating_field: "average_rating".into(),
            out_of_stock_field: "out_of_stock".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.2, b: 0.75 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldWeight {
    pub field: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridWeights {
    pub fields: Vec<FieldWeight>,
    pub field_weight_scale: f64,
    pub proximity_weight: f64,
    pub rating_weight: f64,
    pub out_of_stock_penalty: f64,
    pub exact_match_bonus: f64,
    /// λ in the description length penalty.
    pub description_penalty_lambda: f64,
    pub description_field: String,
}

impl Default for HybridWeights {
    fn default() -> Self {
        let fields = [
            ("title_tokens", 1.0),
            ("brand_tokens", 0.6),
            ("subcategory_tokens", 0.5),
            ("details_tokens", 0.3),
            ("description_tokens", 0.2),
        ]
        .into_iter()
        .map(|(field, weight)| FieldWeight { field: field.to_string(), weight })
        .collect();
        Self {
            fields,
            field_weight_scale: 0.8,
            proximity_weight: 0.2,
            rating_weight: 0.25,
            out_of_stock_penalty: 0.1,
            exact_match_bonus: 0.2,
            description_penalty_lambda: 0.5,
            description_field: "description_tokens".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name (resolved under `model_dir`) or a direct file path.
    pub model: String,
    /// Smaller model tried when `model` fails to load or times out.
    pub fallback_model: Option<String>,
    pub model_dir: PathBuf,
    pub load_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "word2vec-google-news-300".into(),
            fallback_model: Some("glove-wiki-gigaword-100".into()),
            model_dir: PathBuf::from("./models"),
            load_timeout_secs: 120,
        }
    }
}

impl EmbeddingConfig {
    pub fn load_timeout(&self) -> Duration { Duration::from_secs(self.load_timeout_secs) }
}
