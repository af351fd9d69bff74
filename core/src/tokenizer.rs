//! Query normalisation matching the offline corpus pipeline.
//!
//! Corpus token lists arrive already normalised; raw user queries go through
//! [`normalize`] so their terms land in the same vocabulary.

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"\p{L}+(?:-\p{L}+)*").expect("valid regex");
    static ref COMPOUNDS: Vec<(Regex, &'static str)> = [
        (r"\bt\s+shirt\b", "t-shirt"),
        (r"\bv\s+neck\b", "v-neck"),
        (r"\bround\s+neck\b", "round-neck"),
        (r"\bpolo\s+neck\b", "polo-neck"),
    ]
    .into_iter()
    .map(|(pat, rep)| (Regex::new(pat).expect("valid regex"), rep))
    .collect();
    static ref URL: Regex = Regex::new(r"(?:https?://|www\.)\S+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","did","do","does","doing","don","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself","just",
            "me","more","most","my","myself",
            "no","nor","not","now","of","off","on","once","only","or","other","our","ours","ourselves","out","over","own",
            "s","same","she","should","so","some","such",
            "t","than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","will","with",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Tokens of two characters or fewer are dropped before stemming.
pub const MIN_TOKEN_LEN: usize = 3;

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Decompose, strip accents and lower-case. `café` becomes `cafe`.
pub fn fold(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect::<String>().to_lowercase()
}

/// Tokenize into `(stem, position)`. Positions count every word of the folded
/// text, so removed stopwords leave gaps.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let mut folded = URL.replace_all(&fold(text), " ").into_owned();
    for (re, rep) in COMPOUNDS.iter() {
        folded = re.replace_all(&folded, *rep).into_owned();
    }
    let mut tokens = Vec::new();
    for (pos, mat) in RE.find_iter(&folded).enumerate() {
        let token = mat.as_str();
        if is_stopword(token) || token.chars().count() < MIN_TOKEN_LEN {
            continue;
        }
        tokens.push((STEMMER.stem(token).into_owned(), pos));
    }
    tokens
}

/// Full query pipeline: fold, split, drop stopwords and short tokens, stem.
pub fn normalize(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|(t, _)| t).collect()
}

/// Lower-cased whitespace split. This is all the search facade does to a
/// query; callers with raw text run [`normalize`] first.
pub fn query_terms(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert!(t.iter().any(|(w, _)| w == "run"));
    }

    #[test]
    fn positions_keep_gaps() {
        let t = tokenize("the blue dress");
        assert_eq!(t, vec![("blue".to_string(), 1), ("dress".to_string(), 2)]);
    }

    #[test]
    fn query_terms_only_splits_and_lowercases() {
        assert_eq!(query_terms("  Red   DRESS "), vec!["red", "dress"]);
        assert!(query_terms("   ").is_empty());
    }
}
