use crate::cancel::CancelToken;
use crate::document::Corpus;
use crate::error::Result;
use crate::DocId;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Strictly increasing zero-based token offsets.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn term_frequency(&self) -> u32 { self.positions.len() as u32 }
}

#[derive(Debug, Clone, Serialize)]
pub struct VocabularyStats {
    pub total_terms: usize,
    pub total_documents: u32,
    pub most_frequent_terms: Vec<(String, usize)>,
}

/// Positional inverted index over one token field. Built once, read-only after.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>, // postings sorted by doc_id
    doc_lengths: HashMap<DocId, u32>,
    num_docs: u32,
    skipped_documents: usize,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Index `tokens` under `doc_id`. Empty token lists are a no-op.
    /// Adding the same `doc_id` twice is a caller error.
    pub fn add_document(&mut self, doc_id: DocId, tokens: &[String]) {
        if tokens.is_empty() {
            return;
        }
        for (term, positions) in term_positions(tokens) {
            self.insert_posting(term, Posting { doc_id, positions });
        }
        self.doc_lengths.insert(doc_id, tokens.len() as u32);
        self.num_docs += 1;
    }

    fn insert_posting(&mut self, term: String, posting: Posting) {
        let list = self.postings.entry(term).or_default();
        // Corpus builds append in DocId order; keep arbitrary callers sorted too.
        if list.last().is_some_and(|last| last.doc_id >= posting.doc_id) {
            let at = list.partition_point(|p| p.doc_id < posting.doc_id);
            list.insert(at, posting);
        } else {
            list.push(posting);
        }
    }

    /// Build from every document of `corpus` carrying `token_field`. Documents
    /// without the field are skipped and counted in [`Self::skipped_documents`].
    pub fn build_from_corpus(corpus: &Corpus, token_field: &str) -> Self {
        let mut index = Self::new();
        for (doc_id, doc) in corpus.iter() {
            match doc.tokens(token_field) {
                Some(tokens) => index.add_document(doc_id, tokens),
                None => index.skip(&doc.external_id, token_field),
            }
        }
        index.log_built(token_field);
        index
    }

    /// Same result as [`Self::build_from_corpus`], with per-document term maps
    /// computed on the rayon pool and merged afterwards in DocId order.
    pub fn build_from_corpus_parallel(corpus: &Corpus, token_field: &str) -> Self {
        let per_doc: Vec<(DocId, Option<(usize, Vec<(String, Vec<u32>)>)>)> = corpus
            .documents()
            .par_iter()
            .enumerate()
            .map(|(i, doc)| {
                let entry = doc.tokens(token_field).map(|tokens| {
                    let mut terms: Vec<(String, Vec<u32>)> = term_positions(tokens).into_iter().collect();
                    terms.sort_by(|a, b| a.0.cmp(&b.0));
                    (tokens.len(), terms)
                });
                (i as DocId, entry)
            })
            .collect();

        let mut index = Self::new();
        for (doc_id, entry) in per_doc {
            match entry {
                Some((0, _)) => {}
                Some((len, terms)) => {
                    for (term, positions) in terms {
                        index.postings.entry(term).or_default().push(Posting { doc_id, positions });
                    }
                    index.doc_lengths.insert(doc_id, len as u32);
                    index.num_docs += 1;
                }
                None => {
                    let external = corpus.get(doc_id).map(|d| d.external_id.as_str()).unwrap_or_default();
                    index.skip(external, token_field);
                }
            }
        }
        index.log_built(token_field);
        index
    }

    fn skip(&mut self, external_id: &str, token_field: &str) {
        tracing::debug!(external_id, token_field, "document has no token field; skipped");
        self.skipped_documents += 1;
    }

    fn log_built(&self, token_field: &str) {
        tracing::info!(
            token_field,
            num_docs = self.num_docs,
            vocabulary = self.postings.len(),
            skipped = self.skipped_documents,
            "built inverted index"
        );
    }

    /// Documents whose term sets contain every term. Empty `terms` or any
    /// unknown term gives an empty set.
    pub fn conjunctive_query<S: AsRef<str>>(&self, terms: &[S]) -> BTreeSet<DocId> {
        self.conjunctive_query_with(terms, &CancelToken::default()).unwrap_or_default()
    }

    pub fn conjunctive_query_with<S: AsRef<str>>(&self, terms: &[S], cancel: &CancelToken) -> Result<BTreeSet<DocId>> {
        let mut lists: Vec<&Vec<Posting>> = Vec::with_capacity(terms.len());
        for term in terms {
            match self.postings.get(term.as_ref()) {
                Some(list) => lists.push(list),
                None => return Ok(BTreeSet::new()),
            }
        }
        // Start from the rarest term so the running set is as small as possible.
        lists.sort_by_key(|l| l.len());
        let Some((first, rest)) = lists.split_first() else {
            return Ok(BTreeSet::new());
        };
        let mut result: BTreeSet<DocId> = first.iter().map(|p| p.doc_id).collect();
        for list in rest {
            cancel.check()?;
            result.retain(|d| list.binary_search_by_key(d, |p| p.doc_id).is_ok());
            if result.is_empty() {
                break;
            }
        }
        Ok(result)
    }

    pub fn get_documents_for_term(&self, term: &str) -> BTreeSet<DocId> {
        self.postings.get(term).map(|l| l.iter().map(|p| p.doc_id).collect()).unwrap_or_default()
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    pub fn posting(&self, term: &str, doc_id: DocId) -> Option<&Posting> {
        let list = self.postings.get(term)?;
        list.binary_search_by_key(&doc_id, |p| p.doc_id).ok().map(|i| &list[i])
    }

    pub fn positions(&self, term: &str, doc_id: DocId) -> Option<&[u32]> {
        self.posting(term, doc_id).map(|p| p.positions.as_slice())
    }

    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> u32 {
        self.posting(term, doc_id).map(Posting::term_frequency).unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map(Vec::len).unwrap_or(0)
    }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }

    pub fn document_length(&self, doc_id: DocId) -> u32 {
        self.doc_lengths.get(&doc_id).copied().unwrap_or(0)
    }

    /// Mean token count over indexed documents; 0 for an empty index.
    pub fn average_document_length(&self) -> f64 {
        if self.num_docs == 0 {
            return 0.0;
        }
        self.doc_lengths.values().map(|&l| l as u64).sum::<u64>() as f64 / self.num_docs as f64
    }

    pub fn vocabulary_size(&self) -> usize { self.postings.len() }

    pub fn total_documents(&self) -> u32 { self.num_docs }

    pub fn skipped_documents(&self) -> usize { self.skipped_documents }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &[Posting])> {
        self.postings.iter().map(|(t, l)| (t.as_str(), l.as_slice()))
    }

    /// Top `n` terms by document frequency; ties ordered by term.
    pub fn most_frequent_terms(&self, n: usize) -> Vec<(String, usize)> {
        let mut terms: Vec<(String, usize)> = self.postings.iter().map(|(t, l)| (t.clone(), l.len())).collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(n);
        terms
    }

    pub fn vocabulary_stats(&self) -> VocabularyStats {
        VocabularyStats {
            total_terms: self.vocabulary_size(),
            total_documents: self.num_docs,
            most_frequent_terms: self.most_frequent_terms(10),
        }
    }
}

fn term_positions(tokens: &[String]) -> HashMap<String, Vec<u32>> {
    let mut map: HashMap<String, Vec<u32>> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        map.entry(token.clone()).or_default().push(pos as u32);
    }
    map
}
