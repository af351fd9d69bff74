//! BM25 Okapi scoring.
//!
//! IDF is the unsmoothed `ln(N / df)`, not the `+1`/`+0.5` variants: a term
//! found in every document scores exactly zero and nothing is added to keep
//! common terms positive. Changing it changes ranking output.

use super::{distinct_terms, sort_ranked, Ranked, Ranker, RankingMethod};
use crate::cancel::CancelToken;
use crate::config::Bm25Params;
use crate::document::Corpus;
use crate::error::Result;
use crate::index::InvertedIndex;
use crate::DocId;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct Bm25Ranker {
    index: Arc<InvertedIndex>,
    params: Bm25Params,
    total_documents: usize,
    avg_doc_len: f64,
}

impl Bm25Ranker {
    /// Document lengths come from the indexed field; the average is taken over
    /// the whole corpus, so documents without tokens count as length zero.
    pub fn new(index: Arc<InvertedIndex>, corpus: &Corpus, params: Bm25Params) -> Self {
        let total_documents = corpus.len();
        let total_len: u64 = corpus.iter().map(|(id, _)| index.document_length(id) as u64).sum();
        let avg_doc_len = if total_documents > 0 { total_len as f64 / total_documents as f64 } else { 0.0 };
        Self { index, params, total_documents, avg_doc_len }
    }

    pub fn average_document_length(&self) -> f64 { self.avg_doc_len }

    pub fn idf(&self, term: &str) -> f64 {
        let df = self.index.document_frequency(term);
        if df == 0 || self.total_documents == 0 {
            return 0.0;
        }
        (self.total_documents as f64 / df as f64).ln()
    }

    pub fn tf_component(&self, tf: u32, doc_len: u32) -> f64 {
        if tf == 0 {
            return 0.0;
        }
        let Bm25Params { k1, b } = self.params;
        let tf = tf as f64;
        let rel_len = if self.avg_doc_len > 0.0 { doc_len as f64 / self.avg_doc_len } else { 0.0 };
        let denom = tf + k1 * (1.0 - b + b * rel_len);
        if denom == 0.0 {
            return 0.0;
        }
        tf * (k1 + 1.0) / denom
    }

    fn score_with(&self, idfs: &[(&str, f64)], doc_id: DocId) -> f64 {
        let doc_len = self.index.document_length(doc_id);
        idfs.iter()
            .map(|(term, idf)| idf * self.tf_component(self.index.term_frequency(term, doc_id), doc_len))
            .sum()
    }

    /// Distinct in-vocabulary query terms with their IDF.
    fn query_idfs<'q>(&self, query_terms: &'q [String]) -> Vec<(&'q str, f64)> {
        distinct_terms(query_terms)
            .into_iter()
            .filter(|t| self.index.contains_term(t))
            .map(|t| (t, self.idf(t)))
            .collect()
    }

    pub fn score(&self, query_terms: &[String], doc_id: DocId) -> f64 {
        self.score_with(&self.query_idfs(query_terms), doc_id)
    }
}

impl Ranker for Bm25Ranker {
    fn method(&self) -> RankingMethod { RankingMethod::Bm25 }

    fn rank_with(&self, query_terms: &[String], candidates: &BTreeSet<DocId>, cancel: &CancelToken) -> Result<Ranked> {
        let idfs = self.query_idfs(query_terms);
        let mut scored: Ranked = Vec::with_capacity(candidates.len());
        for &doc_id in candidates {
            cancel.check()?;
            scored.push((doc_id, self.score_with(&idfs, doc_id)));
        }
        sort_ranked(&mut scored);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use proptest::prelude::*;

    fn q(s: &str) -> Vec<String> { s.split_whitespace().map(str::to_string).collect() }

    fn build(docs: Vec<Document>) -> (Arc<InvertedIndex>, Corpus) {
        let corpus = Corpus::from_documents(docs);
        (Arc::new(InvertedIndex::build_from_corpus(&corpus, "tokens")), corpus)
    }

    #[test]
    fn higher_tf_ranks_first() {
        let (index, corpus) = build(vec![
            Document::new("A").with_field("tokens", &["rust", "rust", "rust"]),
            Document::new("B").with_field("tokens", &["rust", "programming", "book"]),
            Document::new("C").with_field("tokens", &["python"]),
        ]);
        let ranker = Bm25Ranker::new(index.clone(), &corpus, Bm25Params::default());
        let query = q("rust");
        let ranked = ranker.rank(&query, &index.conjunctive_query(&query)).unwrap();
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1]);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn idf_is_unsmoothed() {
        let (index, corpus) = build(vec![
            Document::new("A").with_field("tokens", &["cotton", "shirt"]),
            Document::new("B").with_field("tokens", &["cotton", "jeans"]),
            Document::new("C").with_field("tokens", &["cotton"]),
        ]);
        let ranker = Bm25Ranker::new(index, &corpus, Bm25Params::default());
        assert_eq!(ranker.idf("cotton"), 0.0);
        assert!((ranker.idf("shirt") - 3f64.ln()).abs() < 1e-12);
        assert_eq!(ranker.idf("missing"), 0.0);
        assert_eq!(ranker.score(&q("cotton"), 0), 0.0);
    }

    #[test]
    fn average_length_counts_corpus_documents() {
        let (index, corpus) = build(vec![
            Document::new("A").with_field("tokens", &["a", "b", "c", "d"]),
            Document::new("B").with_field("tokens", &["a", "b"]),
            Document::new("C"),
        ]);
        let ranker = Bm25Ranker::new(index, &corpus, Bm25Params::default());
        assert!((ranker.average_document_length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_corpus_is_guarded() {
        let (index, corpus) = build(vec![]);
        let ranker = Bm25Ranker::new(index, &corpus, Bm25Params::default());
        assert!((ranker.tf_component(3, 10) - 3.0 * 2.2 / (3.0 + 1.2 * 0.25)).abs() < 1e-12);
        assert!(ranker.rank(&q("a"), &BTreeSet::new()).unwrap().is_empty());
    }

    #[test]
    fn tf_component_matches_formula() {
        let (index, corpus) = build(vec![
            Document::new("A").with_field("tokens", &["a", "b", "c", "d"]),
            Document::new("B").with_field("tokens", &["a", "b"]),
        ]);
        let ranker = Bm25Ranker::new(index, &corpus, Bm25Params::default());
        // avgdl = 3
        let expected = 2.0 * 2.2 / (2.0 + 1.2 * (1.0 - 0.75 + 0.75 * 4.0 / 3.0));
        assert!((ranker.tf_component(2, 4) - expected).abs() < 1e-12);
        assert_eq!(ranker.tf_component(0, 4), 0.0);
    }

    proptest! {
        #[test]
        fn score_non_decreasing_in_tf(tf in 0u32..200, doc_len in 1u32..500) {
            let (index, corpus) = build(vec![
                Document::new("A").with_field("tokens", &["a", "b", "c"]),
                Document::new("B").with_field("tokens", &["d"]),
            ]);
            let ranker = Bm25Ranker::new(index, &corpus, Bm25Params::default());
            prop_assert!(ranker.tf_component(tf + 1, doc_len) >= ranker.tf_component(tf, doc_len));
        }
    }
}
