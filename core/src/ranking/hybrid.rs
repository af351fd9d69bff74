//! Multi-signal ranker for product search.
//!
//! ```text
//! composite = tfidf
//!           + field_weight_scale * field_coverage
//!           + proximity_weight   * proximity
//!           + rating_weight      * rating / 5
//!           - out_of_stock_penalty
//!           + exact_match_bonus
//! score     = composite * length_factor
//! ```

use super::proximity::proximity_score;
use super::tfidf::TfidfRanker;
use super::{distinct_terms, sort_ranked, Ranked, Ranker, RankingMethod};
use crate::cancel::CancelToken;
use crate::config::HybridWeights;
use crate::document::{Corpus, Document};
use crate::error::Result;
use crate::index::InvertedIndex;
use crate::DocId;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Per-signal breakdown of one document's score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub base: f64,
    pub field: f64,
    pub proximity: f64,
    pub rating: f64,
    pub stock_penalty: f64,
    pub exact_match: f64,
    pub length_factor: f64,
}

impl Signals {
    pub fn composite(&self, w: &HybridWeights) -> f64 {
        let raw = self.base
            + w.field_weight_scale * self.field
            + w.proximity_weight * self.proximity
            + w.rating_weight * self.rating
            - self.stock_penalty
            + self.exact_match;
        raw * self.length_factor
    }
}

struct DocFields {
    /// Distinct tokens per weighted field, in `HybridWeights::fields` order.
    fields: Vec<HashSet<String>>,
    description_len: usize,
}

pub struct HybridRanker {
    index: Arc<InvertedIndex>,
    corpus: Arc<Corpus>,
    tfidf: Arc<TfidfRanker>,
    weights: HybridWeights,
    doc_fields: Vec<DocFields>,
    avg_description_len: f64,
}

impl HybridRanker {
    pub fn new(index: Arc<InvertedIndex>, corpus: Arc<Corpus>, tfidf: Arc<TfidfRanker>, weights: HybridWeights) -> Self {
        let doc_fields: Vec<DocFields> = corpus
            .documents()
            .iter()
            .map(|doc| DocFields {
                fields: weights
                    .fields
                    .iter()
                    .map(|fw| doc.tokens(&fw.field).map(|t| t.iter().cloned().collect()).unwrap_or_default())
                    .collect(),
                description_len: doc.tokens(&weights.description_field).map_or(0, <[String]>::len),
            })
            .collect();

        // Average over documents that have a description at all.
        let described: Vec<usize> = doc_fields.iter().map(|d| d.description_len).filter(|&n| n > 0).collect();
        let avg_description_len = if described.is_empty() {
            1.0
        } else {
            described.iter().sum::<usize>() as f64 / described.len() as f64
        };

        Self { index, corpus, tfidf, weights, doc_fields, avg_description_len }
    }

    pub fn weights(&self) -> &HybridWeights { &self.weights }

    pub fn average_description_length(&self) -> f64 { self.avg_description_len }

    fn field_score(&self, doc_id: DocId, terms: &[&str]) -> f64 {
        let Some(doc) = self.doc_fields.get(doc_id as usize) else {
            return 0.0;
        };
        if terms.is_empty() {
            return 0.0;
        }
        self.weights
            .fields
            .iter()
            .zip(&doc.fields)
            .map(|(fw, tokens)| {
                let matches = terms.iter().filter(|t| tokens.contains(**t)).count();
                fw.weight * matches as f64 / terms.len() as f64
            })
            .sum()
    }

    fn proximity(&self, doc_id: DocId, terms: &[&str]) -> f64 {
        if terms.len() <= 1 {
            return 1.0;
        }
        let mut lists: Vec<&[u32]> = Vec::with_capacity(terms.len());
        for term in terms {
            match self.index.positions(term, doc_id) {
                Some(p) => lists.push(p),
                None => return 0.0,
            }
        }
        proximity_score(&lists)
    }

    fn length_factor(&self, doc_id: DocId) -> f64 {
        let len = self.doc_fields.get(doc_id as usize).map_or(0, |d| d.description_len);
        if len == 0 || self.avg_description_len <= 0.0 {
            return 1.0;
        }
        length_factor(len as f64 / self.avg_description_len, self.weights.description_penalty_lambda)
    }

    /// Every signal for one document. `query_string` is the space-joined query.
    pub fn signals(&self, base: f64, doc_id: DocId, terms: &[&str], query_string: &str) -> Signals {
        let doc = self.corpus.get(doc_id);
        Signals {
            base,
            field: self.field_score(doc_id, terms),
            proximity: self.proximity(doc_id, terms),
            rating: doc.map_or(0.0, rating_score),
            stock_penalty: if doc.is_some_and(|d| d.out_of_stock) { self.weights.out_of_stock_penalty } else { 0.0 },
            exact_match: if doc.is_some_and(|d| title_contains(&d.title, query_string)) {
                self.weights.exact_match_bonus
            } else {
                0.0
            },
            length_factor: self.length_factor(doc_id),
        }
    }

    pub fn explain(&self, query_terms: &[String], doc_id: DocId) -> Signals {
        let terms = distinct_terms(query_terms);
        let query_string = query_terms.join(" ");
        self.signals(self.tfidf.score(query_terms, doc_id), doc_id, &terms, &query_string)
    }
}

impl Ranker for HybridRanker {
    fn method(&self) -> RankingMethod { RankingMethod::Custom }

    fn rank_with(&self, query_terms: &[String], candidates: &BTreeSet<DocId>, cancel: &CancelToken) -> Result<Ranked> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let base = self.tfidf.rank_with(query_terms, candidates, cancel)?;
        let terms = distinct_terms(query_terms);
        let query_string = query_terms.join(" ");

        let mut scored: Ranked = Vec::with_capacity(base.len());
        for (doc_id, base_score) in base {
            cancel.check()?;
            let signals = self.signals(base_score, doc_id, &terms, &query_string);
            scored.push((doc_id, signals.composite(&self.weights)));
        }
        sort_ranked(&mut scored);
        Ok(scored)
    }
}

/// Average rating scaled to [0, 1]; 0 when absent.
pub fn rating_score(doc: &Document) -> f64 {
    doc.rating.map_or(0.0, |r| (r / 5.0).clamp(0.0, 1.0))
}

/// `1 / (1 + λ * max(0, ln(1 + (ratio - 1))))`; 1 at or below average length.
pub fn length_factor(length_ratio: f64, lambda: f64) -> f64 {
    let excess = (length_ratio - 1.0).ln_1p().max(0.0);
    if !excess.is_finite() {
        return 1.0;
    }
    1.0 / (1.0 + lambda * excess)
}

fn title_contains(title: &str, query_string: &str) -> bool {
    !query_string.is_empty() && title.to_lowercase().contains(&query_string.to_lowercase())
}
