use searchcore::tokenizer::{normalize, tokenize};

#[test]
fn it_normalizes_and_stems() {
    let words = normalize("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Accent folding: café -> cafe
    assert!(words.contains(&"cafe".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = normalize("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn it_drops_short_tokens() {
    let words = normalize("xl fit tee");
    assert_eq!(words, vec!["fit".to_string(), "tee".to_string()]);
}

#[test]
fn it_joins_garment_compounds() {
    let words = normalize("Men's T Shirt with V neck");
    assert!(words.contains(&"t-shirt".to_string()));
    assert!(words.contains(&"v-neck".to_string()));
}

#[test]
fn it_strips_urls_and_digits() {
    let toks = tokenize("see https://shop.example.com/x 100 cotton");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert_eq!(words, vec!["see".to_string(), "cotton".to_string()]);
}

#[test]
fn it_matches_validation_query_pipeline() {
    assert_eq!(
        normalize("women full sleeve sweatshirt cotton"),
        vec!["women", "full", "sleev", "sweatshirt", "cotton"]
    );
    assert_eq!(normalize("men slim jeans blue"), vec!["men", "slim", "jean", "blue"]);
}
