//! Log-weighted TF-IDF with cosine length normalisation.
//!
//! `tf = 1 + log2(raw)`, `idf = log2(N / df)`; document vector lengths are
//! computed once over every term of a document. Zero-score candidates stay in
//! the output.

use super::{sort_ranked, Ranked, Ranker, RankingMethod};
use crate::cancel::CancelToken;
use crate::document::Corpus;
use crate::error::Result;
use crate::index::InvertedIndex;
use crate::DocId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct TfidfRanker {
    index: Arc<InvertedIndex>,
    total_documents: usize,
    doc_norms: HashMap<DocId, f64>,
}

impl TfidfRanker {
    pub fn new(index: Arc<InvertedIndex>, corpus: &Corpus) -> Self {
        let total_documents = corpus.len();
        let mut doc_norms: HashMap<DocId, f64> = HashMap::new();
        for (_, postings) in index.terms() {
            let idf = idf(total_documents, postings.len());
            for p in postings {
                let w = log_tf(p.term_frequency()) * idf;
                *doc_norms.entry(p.doc_id).or_insert(0.0) += w * w;
            }
        }
        for norm in doc_norms.values_mut() {
            *norm = norm.sqrt();
        }
        tracing::debug!(documents = doc_norms.len(), "precomputed tf-idf document norms");
        Self { index, total_documents, doc_norms }
    }

    pub fn idf(&self, term: &str) -> f64 { idf(self.total_documents, self.index.document_frequency(term)) }

    pub fn tf(&self, term: &str, doc_id: DocId) -> f64 { log_tf(self.index.term_frequency(term, doc_id)) }

    pub fn document_norm(&self, doc_id: DocId) -> f64 { self.doc_norms.get(&doc_id).copied().unwrap_or(0.0) }

    /// Query weights per distinct term: `(1 + log2(query_freq)) * idf`.
    fn query_weights<'q>(&self, query_terms: &'q [String]) -> Vec<(&'q str, f64)> {
        let mut counts: Vec<(&str, u32)> = Vec::new();
        for term in query_terms {
            match counts.iter_mut().find(|(t, _)| *t == term.as_str()) {
                Some((_, c)) => *c += 1,
                None => counts.push((term.as_str(), 1)),
            }
        }
        counts.into_iter().map(|(t, c)| (t, log_tf(c) * self.idf(t))).collect()
    }

    fn score_with(&self, weights: &[(&str, f64)], doc_id: DocId) -> f64 {
        let norm = self.document_norm(doc_id);
        if norm == 0.0 {
            return 0.0;
        }
        let dot: f64 = weights.iter().map(|(t, qw)| qw * self.tf(t, doc_id) * self.idf(t)).sum();
        dot / norm
    }

    pub fn score(&self, query_terms: &[String], doc_id: DocId) -> f64 {
        self.score_with(&self.query_weights(query_terms), doc_id)
    }
}

impl Ranker for TfidfRanker {
    fn method(&self) -> RankingMethod { RankingMethod::Tfidf }

    fn rank_with(&self, query_terms: &[String], candidates: &BTreeSet<DocId>, cancel: &CancelToken) -> Result<Ranked> {
        let weights = self.query_weights(query_terms);
        let mut scored: Ranked = Vec::with_capacity(candidates.len());
        for &doc_id in candidates {
            cancel.check()?;
            scored.push((doc_id, self.score_with(&weights, doc_id)));
        }
        sort_ranked(&mut scored);
        Ok(scored)
    }
}

fn log_tf(raw: u32) -> f64 {
    if raw == 0 { 0.0 } else { 1.0 + (raw as f64).log2() }
}

fn idf(n: usize, df: usize) -> f64 {
    if df == 0 || n == 0 { 0.0 } else { (n as f64 / df as f64).log2() }
}
