use proptest::prelude::*;
use searchcore::persist::{load_corpus, load_ground_truth};
use searchcore::ranking::{sort_ranked, Bm25Ranker, Ranker, TfidfRanker};
use searchcore::{Corpus, Document, EngineConfig, InvertedIndex, SearchEngine};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::Arc;

fn q(s: &str) -> Vec<String> { s.split_whitespace().map(str::to_string).collect() }

#[test]
fn red_dress_walkthrough() {
    let corpus = Corpus::from_documents([
        Document::new("A").with_field("tokens", &["red", "dress", "women"]),
        Document::new("B").with_field("tokens", &["blue", "dress"]),
        Document::new("C").with_field("tokens", &["red", "shirt"]),
    ]);
    let index = Arc::new(InvertedIndex::build_from_corpus(&corpus, "tokens"));
    let query = q("red dress");
    let candidates = index.conjunctive_query(&query);
    assert_eq!(candidates, BTreeSet::from([0]));

    let tfidf = TfidfRanker::new(index.clone(), &corpus);
    assert!((tfidf.idf("red") - 0.585).abs() < 1e-3);
    assert!((tfidf.document_norm(0) - 1.788).abs() < 1e-3);
    let ranked = tfidf.rank(&query, &candidates).unwrap();
    assert_eq!(ranked.len(), 1);
    assert!((ranked[0].1 - 0.383).abs() < 1e-3);

    assert!(index.conjunctive_query(&q("blue shirt")).is_empty());
}

#[test]
fn engine_from_files_and_ground_truth() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("corpus.json");
    fs::write(
        &corpus_path,
        r#"[
            {"pid": "A", "tokens": "red dress women", "title": "Red dress"},
            {"pid": "B", "tokens": "blue dress", "title": "Blue dress"},
            {"pid": "A", "tokens": "duplicate", "title": "ignored"},
            {"pid": 7, "tokens": ["red", "shirt"], "title": "Red shirt"}
        ]"#,
    )
    .unwrap();
    let corpus = load_corpus(&corpus_path, &EngineConfig::default().corpus).unwrap();
    assert_eq!(corpus.len(), 3);
    assert_eq!(corpus.skipped_records(), 1);
    assert_eq!(corpus.lookup("7"), Some(2));

    let engine = SearchEngine::load(&corpus_path, EngineConfig::default()).unwrap();
    let hits = engine.search("red", 10, "bm25").unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.external_id.as_str()).collect();
    assert_eq!(ids, vec!["7", "A"]);

    let labels = dir.path().join("labels.csv");
    fs::write(&labels, "query_id,pid,labels\n1,A,1\n1,7,0\n").unwrap();
    let truth = load_ground_truth(&labels).unwrap();
    assert_eq!(truth.label("1", "A"), 1);
    assert_eq!(truth.label("1", "B"), 0);
    assert_eq!(truth.label("2", "A"), 0);

    let texts = BTreeMap::from([("1".to_string(), "Red".to_string())]);
    let report = searchcore::evaluation::evaluate(&engine, &truth, &texts, searchcore::RankingMethod::Bm25).unwrap();
    assert_eq!(report.queries[0].labels, vec![0, 1]);
    assert!((report.mrr - 0.5).abs() < 1e-12);
}

#[test]
fn missing_inputs_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_corpus(dir.path().join("nope.json"), &EngineConfig::default().corpus).is_err());
    assert!(load_ground_truth(dir.path().join("nope.csv")).is_err());
    let bad = dir.path().join("bad.json");
    fs::write(&bad, "{ not json").unwrap();
    assert!(SearchEngine::load(&bad, EngineConfig::default()).is_err());
}

const VOCAB: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn corpus_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..VOCAB.len(), 0..8), 1..25)
}

fn build(docs: &[Vec<usize>]) -> Corpus {
    Corpus::from_documents(docs.iter().enumerate().map(|(i, toks)| {
        let tokens: Vec<&str> = toks.iter().map(|&t| VOCAB[t]).collect();
        Document::new(format!("D{i}")).with_field("tokens", &tokens)
    }))
}

proptest! {
    #[test]
    fn conjunction_is_subset_of_each_term(docs in corpus_strategy(), terms in prop::collection::vec(0usize..VOCAB.len(), 1..4)) {
        let corpus = build(&docs);
        let index = InvertedIndex::build_from_corpus(&corpus, "tokens");
        let terms: Vec<&str> = terms.iter().map(|&t| VOCAB[t]).collect();
        let result = index.conjunctive_query(&terms);
        for t in &terms {
            prop_assert!(result.is_subset(&index.get_documents_for_term(t)));
        }
        // adding a term never grows the result
        if terms.len() > 1 {
            prop_assert!(result.is_subset(&index.conjunctive_query(&terms[..terms.len() - 1])));
        }
    }

    #[test]
    fn rankings_are_sorted_and_deterministic(docs in corpus_strategy(), terms in prop::collection::vec(0usize..VOCAB.len(), 1..3)) {
        let corpus = build(&docs);
        let index = Arc::new(InvertedIndex::build_from_corpus(&corpus, "tokens"));
        let query: Vec<String> = terms.iter().map(|&t| VOCAB[t].to_string()).collect();
        let candidates = index.conjunctive_query(&query);
        let rankers: Vec<Box<dyn Ranker>> = vec![
            Box::new(TfidfRanker::new(index.clone(), &corpus)),
            Box::new(Bm25Ranker::new(index.clone(), &corpus, Default::default())),
        ];
        for ranker in &rankers {
            let first = ranker.rank(&query, &candidates).unwrap();
            prop_assert_eq!(first.len(), candidates.len());
            prop_assert!(first.iter().all(|(_, s)| s.is_finite()));
            let mut resorted = first.clone();
            sort_ranked(&mut resorted);
            prop_assert_eq!(&resorted, &first);
            prop_assert_eq!(ranker.rank(&query, &candidates).unwrap(), first);
        }
    }

    #[test]
    fn parallel_and_sequential_builds_agree(docs in corpus_strategy()) {
        let corpus = build(&docs);
        let seq = InvertedIndex::build_from_corpus(&corpus, "tokens");
        let par = InvertedIndex::build_from_corpus_parallel(&corpus, "tokens");
        prop_assert_eq!(seq.total_documents(), par.total_documents());
        prop_assert_eq!(seq.vocabulary_size(), par.vocabulary_size());
        for (term, postings) in seq.terms() {
            prop_assert_eq!(par.postings(term), Some(postings));
        }
    }
}
