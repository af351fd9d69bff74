use super::{sort_ranked, Ranked, Ranker, RankingMethod};
use crate::cancel::CancelToken;
use crate::document::Corpus;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::DocId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Cosine similarity between averaged word vectors of the query and of each
/// document. Documents whose tokens have no vectors are never ranked.
pub struct EmbeddingRanker {
    provider: Arc<dyn EmbeddingProvider>,
    doc_vectors: HashMap<DocId, Vec<f64>>,
}

impl EmbeddingRanker {
    /// Precomputes every document vector up front; provider lookups are the
    /// expensive part and the corpus does not change.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, corpus: &Corpus, token_field: &str) -> Self {
        let doc_vectors: HashMap<DocId, Vec<f64>> = corpus
            .iter()
            .filter_map(|(id, doc)| {
                let tokens = doc.tokens(token_field)?;
                average_vector(provider.as_ref(), tokens.iter().map(String::as_str)).map(|v| (id, v))
            })
            .collect();
        tracing::info!(documents = doc_vectors.len(), total = corpus.len(), "precomputed document vectors");
        Self { provider, doc_vectors }
    }

    pub fn document_vector(&self, doc_id: DocId) -> Option<&[f64]> {
        self.doc_vectors.get(&doc_id).map(Vec::as_slice)
    }
}

impl Ranker for EmbeddingRanker {
    fn method(&self) -> RankingMethod { RankingMethod::Word2vec }

    fn rank_with(&self, query_terms: &[String], candidates: &BTreeSet<DocId>, cancel: &CancelToken) -> Result<Ranked> {
        let Some(query_vec) = average_vector(self.provider.as_ref(), query_terms.iter().map(String::as_str)) else {
            return Ok(Vec::new());
        };
        let mut scored: Ranked = Vec::with_capacity(candidates.len());
        for doc_id in candidates {
            cancel.check()?;
            if let Some(doc_vec) = self.doc_vectors.get(doc_id) {
                scored.push((*doc_id, cosine_similarity(&query_vec, doc_vec)));
            }
        }
        sort_ranked(&mut scored);
        Ok(scored)
    }
}

/// Mean of the vectors of all in-vocabulary tokens; `None` if no token has one.
pub fn average_vector<'a, I>(provider: &dyn EmbeddingProvider, tokens: I) -> Option<Vec<f64>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sum = vec![0.0f64; provider.dimension()];
    let mut count = 0usize;
    for token in tokens {
        if let Some(v) = provider.vector(token) {
            for (acc, x) in sum.iter_mut().zip(v) {
                *acc += *x as f64;
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    for acc in sum.iter_mut() {
        *acc /= count as f64;
    }
    Some(sum)
}

/// 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}
