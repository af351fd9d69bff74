//! Evaluation runs: rank every ground-truth query, align the ranked output
//! with its judgments and summarise the metrics per cutoff.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::metrics;
use crate::persist::GroundTruth;
use crate::ranking::RankingMethod;
use crate::search::SearchEngine;
use crate::tokenizer::normalize;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Fixed cutoffs; the full list length is added when it exceeds the last one.
pub const CUTOFFS: [usize; 4] = [1, 3, 5, 10];

/// Cutoff whose AP values feed MAP.
pub const MAP_CUTOFF: usize = 10;

/// Cutoffs evaluated for a ranked list of `len` results. Cutoffs beyond the
/// list are skipped.
pub fn cutoffs_for(len: usize) -> Vec<usize> {
    let mut ks: Vec<usize> = CUTOFFS.iter().copied().filter(|&k| k <= len).collect();
    if len > CUTOFFS[CUTOFFS.len() - 1] {
        ks.push(len);
    }
    ks
}

/// Labels for `ranked` external ids in rank order; unjudged documents are 0.
pub fn align_labels<S: AsRef<str>>(ranked: &[S], judgments: &[(String, u8)]) -> Vec<u8> {
    let lookup: HashMap<&str, u8> = judgments.iter().map(|(pid, l)| (pid.as_str(), *l)).collect();
    ranked.iter().map(|id| lookup.get(id.as_ref()).copied().unwrap_or(0)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CutoffMetrics {
    pub k: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub average_precision: f64,
    pub ndcg: f64,
}

impl CutoffMetrics {
    pub fn compute(labels: &[u8], k: usize) -> Self {
        Self {
            k,
            precision: metrics::precision_at_k(labels, k),
            recall: metrics::recall_at_k(labels, k),
            f1: metrics::f1_at_k(labels, k),
            average_precision: metrics::average_precision_at_k(labels, k),
            ndcg: metrics::ndcg_at_k(labels, k),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryEvaluation {
    pub query_id: String,
    pub query: String,
    pub terms: Vec<String>,
    pub judged: usize,
    /// Labels aligned with the ranked output.
    pub labels: Vec<u8>,
    pub cutoffs: Vec<CutoffMetrics>,
}

impl QueryEvaluation {
    pub fn new(query_id: impl Into<String>, query: impl Into<String>, terms: Vec<String>, judged: usize, labels: Vec<u8>) -> Self {
        let cutoffs = cutoffs_for(labels.len()).into_iter().map(|k| CutoffMetrics::compute(&labels, k)).collect();
        Self { query_id: query_id.into(), query: query.into(), terms, judged, labels, cutoffs }
    }

    pub fn retrieved(&self) -> usize { self.labels.len() }

    pub fn at(&self, k: usize) -> Option<&CutoffMetrics> { self.cutoffs.iter().find(|c| c.k == k) }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub method: RankingMethod,
    pub queries: Vec<QueryEvaluation>,
    /// Mean of AP@10 over queries that reached ten results.
    pub map: f64,
    pub mrr: f64,
}

impl EvaluationReport {
    pub fn from_queries(method: RankingMethod, queries: Vec<QueryEvaluation>) -> Self {
        let aps: Vec<f64> = queries.iter().filter_map(|q| q.at(MAP_CUTOFF)).map(|c| c.average_precision).collect();
        let labels: Vec<&[u8]> = queries.iter().map(|q| q.labels.as_slice()).collect();
        Self {
            method,
            map: metrics::mean_average_precision(&aps),
            mrr: metrics::mean_reciprocal_rank(&labels),
            queries,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation ({})", self.method.label())?;
        for q in &self.queries {
            writeln!(f)?;
            writeln!(f, "Query {}: '{}'", q.query_id, q.query)?;
            writeln!(f, "  terms: {:?}", q.terms)?;
            writeln!(f, "  retrieved: {}  judged: {}", q.retrieved(), q.judged)?;
            for c in &q.cutoffs {
                writeln!(
                    f,
                    "  @{:<4} P {:.3}  R {:.3}  F1 {:.3}  AP {:.3}  NDCG {:.3}",
                    c.k, c.precision, c.recall, c.f1, c.average_precision, c.ndcg
                )?;
            }
        }
        writeln!(f)?;
        writeln!(f, "MAP: {:.3}", self.map)?;
        write!(f, "MRR: {:.3}", self.mrr)
    }
}

/// Run every ground-truth query that has a text in `query_texts`. Query texts
/// are normalised with [`normalize`] and the full ranked list is evaluated.
pub fn evaluate(
    engine: &SearchEngine,
    truth: &GroundTruth,
    query_texts: &BTreeMap<String, String>,
    method: RankingMethod,
) -> Result<EvaluationReport> {
    let cancel = CancelToken::default();
    let mut queries = Vec::with_capacity(truth.queries.len());
    for (query_id, judgments) in &truth.queries {
        let Some(text) = query_texts.get(query_id) else {
            tracing::warn!(query_id, "no query text for ground-truth query; skipped");
            continue;
        };
        let terms = normalize(text);
        let hits = engine.search_terms(&terms, usize::MAX, method, &cancel)?;
        let ranked: Vec<&str> = hits.iter().map(|h| h.external_id.as_str()).collect();
        let labels = align_labels(&ranked, judgments);
        tracing::debug!(query_id, retrieved = labels.len(), judged = judgments.len(), "evaluated query");
        queries.push(QueryEvaluation::new(query_id.clone(), text.clone(), terms, judgments.len(), labels));
    }
    Ok(EvaluationReport::from_queries(method, queries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoffs_skip_and_extend() {
        assert_eq!(cutoffs_for(0), Vec::<usize>::new());
        assert_eq!(cutoffs_for(4), vec![1, 3]);
        assert_eq!(cutoffs_for(10), vec![1, 3, 5, 10]);
        assert_eq!(cutoffs_for(25), vec![1, 3, 5, 10, 25]);
    }

    #[test]
    fn unjudged_documents_are_non_relevant() {
        let judgments = vec![("A".to_string(), 1), ("B".to_string(), 0)];
        assert_eq!(align_labels(&["C", "A", "B"], &judgments), vec![0, 1, 0]);
    }

    #[test]
    fn report_aggregates_map_over_ap10_only() {
        let long = QueryEvaluation::new("1", "q1", vec![], 10, vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0]);
        let short = QueryEvaluation::new("2", "q2", vec![], 3, vec![0, 1, 0]);
        let report = EvaluationReport::from_queries(RankingMethod::Tfidf, vec![long, short]);
        // only the first query has AP@10: (1/1 + 2/10) / 2
        assert!((report.map - 0.6).abs() < 1e-12);
        assert!((report.mrr - 0.75).abs() < 1e-12);
        assert_eq!(report.queries[0].cutoffs.last().map(|c| c.k), Some(11));
        let text = report.to_string();
        assert!(text.contains("MAP: 0.600"));
        assert!(text.contains("MRR: 0.750"));
    }
}
