//! Test-query generation: two-term queries drawn from document-frequency
//! bands, each guaranteed to have a non-empty conjunctive result.

use crate::index::InvertedIndex;
use serde::Serialize;
use std::collections::HashSet;

const COLOURS: [&str; 8] = ["black", "white", "red", "blue", "green", "navy", "beig", "yellow"];

#[derive(Debug, Clone, Serialize)]
pub struct TermStat {
    pub term: String,
    pub doc_frequency: usize,
    pub doc_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestedQuery {
    pub id: usize,
    pub query: String,
    pub terms: Vec<String>,
    pub strategy: &'static str,
    pub term_statistics: Vec<TermStat>,
}

struct Picker<'a> {
    index: &'a InvertedIndex,
    used: HashSet<&'a str>,
}

impl<'a> Picker<'a> {
    fn viable(&self, a: &str, b: &str) -> bool {
        a != b && !self.used.contains(a) && !self.used.contains(b) && !self.index.conjunctive_query(&[a, b]).is_empty()
    }

    fn pair_from(&self, pool: &[&'a str]) -> Option<[&'a str; 2]> {
        pool.iter()
            .flat_map(|&a| pool.iter().map(move |&b| [a, b]))
            .find(|[a, b]| self.viable(a, b))
    }

    fn pair_across(&self, left: &[&'a str], right: &[&'a str]) -> Option<[&'a str; 2]> {
        left.iter()
            .flat_map(|&a| right.iter().map(move |&b| [a, b]))
            .find(|[a, b]| self.viable(a, b))
    }
}

fn band<'s, 'a>(terms: &'s [&'a str], lo: usize, hi: usize) -> &'s [&'a str] {
    let hi = hi.min(terms.len());
    &terms[lo.min(hi)..hi]
}

/// Up to `n` (at most five) queries from the `top_k_terms` most frequent
/// terms: a very frequent pair, a colour with a product term, a frequent pair
/// outside the head, a mid-frequency pair, and a frequent term with a rarer
/// one. Terms are not reused across queries.
pub fn suggest_queries(index: &InvertedIndex, top_k_terms: usize, n: usize) -> Vec<SuggestedQuery> {
    let total_docs = index.total_documents() as usize;
    if total_docs == 0 {
        return Vec::new();
    }
    let ranked = index.most_frequent_terms(top_k_terms);
    let freqs: Vec<&str> = ranked.iter().map(|(t, _)| t.as_str()).collect();
    let colours: Vec<&str> = freqs.iter().copied().filter(|t| COLOURS.contains(t)).collect();
    let rare: Vec<&str> = freqs.iter().rev().copied().collect();
    let mid_start = 10.max(freqs.len() / 10);
    let mid_end = freqs.len().min(mid_start + 50);
    let mid = if mid_start < mid_end { &freqs[mid_start..mid_end] } else { band(&freqs, 0, 50) };

    let mut picker = Picker { index, used: HashSet::new() };
    let mut out = Vec::new();
    let strategies: [&'static str; 5] = ["frequent pair", "colour and product", "frequent pair", "mid-frequency pair", "frequent and rare"];
    for (i, strategy) in strategies.into_iter().enumerate() {
        if out.len() >= n {
            break;
        }
        let pick = match i {
            0 => picker.pair_from(band(&freqs, 0, 20)).or_else(|| picker.pair_from(&freqs)),
            1 => picker
                .pair_across(&colours, band(&freqs, 0, 100))
                .or_else(|| picker.pair_from(band(&freqs, 10, 80))),
            2 => picker.pair_from(band(&freqs, 5, 60)),
            3 => picker.pair_from(mid).or_else(|| picker.pair_from(&freqs)),
            _ => picker.pair_across(band(&freqs, 0, 40), band(&rare, 0, 200)),
        };
        let Some(terms) = pick else {
            tracing::debug!(strategy, "no viable pair");
            continue;
        };
        picker.used.extend(terms);
        let term_statistics = terms
            .iter()
            .map(|t| {
                let df = index.document_frequency(t);
                TermStat { term: t.to_string(), doc_frequency: df, doc_percentage: df as f64 * 100.0 / total_docs as f64 }
            })
            .collect();
        out.push(SuggestedQuery {
            id: out.len() + 1,
            query: terms.join(" "),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            strategy,
            term_statistics,
        });
    }
    out
}
