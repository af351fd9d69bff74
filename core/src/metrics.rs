//! Information-retrieval evaluation metrics.
//!
//! Every function takes relevance labels already aligned with a ranked list:
//! `labels[i]` is the judgment for the document at rank `i + 1`. Labels are
//! binary in practice; any non-zero label counts as relevant, and NDCG uses the
//! label value itself as the gain.
//!
//! All metrics are pure and total: cutoffs of zero, empty label lists and
//! queries without relevant documents produce `0.0`, never NaN.

fn is_relevant(label: u8) -> bool { label > 0 }

fn relevant_in(labels: &[u8]) -> usize { labels.iter().filter(|&&l| is_relevant(l)).count() }

fn head(labels: &[u8], k: usize) -> &[u8] { &labels[..k.min(labels.len())] }

/// Relevant documents in the first `k`, divided by `k`.
///
/// The denominator is `k` even when fewer than `k` results exist, so a short
/// list is penalised.
pub fn precision_at_k(labels: &[u8], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    relevant_in(head(labels, k)) as f64 / k as f64
}

/// Relevant documents in the first `k`, divided by all relevant documents in
/// `labels`.
pub fn recall_at_k(labels: &[u8], k: usize) -> f64 {
    let total = relevant_in(labels);
    if total == 0 {
        return 0.0;
    }
    relevant_in(head(labels, k)) as f64 / total as f64
}

pub fn f1_at_k(labels: &[u8], k: usize) -> f64 {
    let p = precision_at_k(labels, k);
    let r = recall_at_k(labels, k);
    if p + r == 0.0 {
        return 0.0;
    }
    2.0 * p * r / (p + r)
}

/// Sum of precision at each relevant rank within the first `k`, divided by
/// the total number of relevant documents in `labels`.
///
/// ```text
/// AP@k = (1 / R) * Σ_{i <= k, rel_i} precision@i
/// ```
pub fn average_precision_at_k(labels: &[u8], k: usize) -> f64 {
    let total = relevant_in(labels);
    if total == 0 {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (i, &label) in head(labels, k).iter().enumerate() {
        if is_relevant(label) {
            hits += 1;
            sum += hits as f64 / (i + 1) as f64;
        }
    }
    sum / total as f64
}

/// Arithmetic mean of per-query AP values.
pub fn mean_average_precision(ap_scores: &[f64]) -> f64 {
    if ap_scores.is_empty() {
        return 0.0;
    }
    ap_scores.iter().sum::<f64>() / ap_scores.len() as f64
}

/// `1 / rank` of the first relevant document; 0 when there is none.
pub fn reciprocal_rank(labels: &[u8]) -> f64 {
    labels.iter().position(|&l| is_relevant(l)).map_or(0.0, |i| 1.0 / (i + 1) as f64)
}

/// Mean of [`reciprocal_rank`] over queries.
pub fn mean_reciprocal_rank<L: AsRef<[u8]>>(per_query: &[L]) -> f64 {
    if per_query.is_empty() {
        return 0.0;
    }
    per_query.iter().map(|l| reciprocal_rank(l.as_ref())).sum::<f64>() / per_query.len() as f64
}

/// ```text
/// DCG@k  = Σ_{i=1..k} rel_i / log2(i + 1)
/// IDCG@k = DCG@k of all labels sorted descending
/// NDCG@k = DCG@k / IDCG@k
/// ```
///
/// The ideal ordering is taken over the whole label list before truncating,
/// so relevant documents ranked below `k` still lower the score.
pub fn ndcg_at_k(labels: &[u8], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let mut ideal = labels.to_vec();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    let idcg = dcg(head(&ideal, k));
    if idcg == 0.0 {
        return 0.0;
    }
    dcg(head(labels, k)) / idcg
}

fn dcg(labels: &[u8]) -> f64 {
    labels
        .iter()
        .enumerate()
        .map(|(i, &rel)| rel as f64 / ((i + 2) as f64).log2())
        .sum()
}
