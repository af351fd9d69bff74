use crate::config::CorpusSchema;
use crate::DocId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One corpus record after field extraction. Immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub external_id: String,
    /// Token fields by name, e.g. `tokens`, `title_tokens`, `brand_tokens`.
    pub fields: HashMap<String, Vec<String>>,
    pub rating: Option<f64>,
    pub out_of_stock: bool,
    pub title: String,
}

impl Document {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self { external_id: external_id.into(), ..Self::default() }
    }

    pub fn with_field(mut self, name: &str, tokens: &[&str]) -> Self {
        self.fields.insert(name.to_string(), tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_out_of_stock(mut self, out_of_stock: bool) -> Self {
        self.out_of_stock = out_of_stock;
        self
    }

    pub fn tokens(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Extract a document from a raw JSON record. Returns `None` when the
    /// record is not an object or has no usable identifier.
    pub fn from_record(record: &Value, schema: &CorpusSchema) -> Option<Self> {
        let obj = record.as_object()?;
        let external_id = match obj.get(&schema.id_field)? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let mut fields = HashMap::new();
        for (key, value) in obj {
            if key != &schema.token_field && !key.ends_with("_tokens") {
                continue;
            }
            if let Some(tokens) = token_list(value) {
                fields.insert(key.clone(), tokens);
            }
        }

        let rating = obj.get(&schema.rating_field).and_then(numeric);
        // Only a literal boolean marks a product out of stock.
        let out_of_stock = matches!(obj.get(&schema.out_of_stock_field), Some(Value::Bool(true)));
        let title = obj.get(&schema.title_field).and_then(Value::as_str).unwrap_or_default().to_string();

        Some(Self { external_id, fields, rating, out_of_stock, title })
    }
}

/// Token fields arrive either as a list of strings or a single space-delimited string.
fn token_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        Value::Array(items) => items.iter().map(|v| v.as_str().map(str::to_string)).collect(),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// The loaded document collection. `DocId`s are dense and follow load order.
#[derive(Debug, Default)]
pub struct Corpus {
    docs: Vec<Document>,
    by_external: HashMap<String, DocId>,
    skipped: usize,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    /// Build from already extracted documents. Documents with an empty or
    /// repeated identifier are skipped; the first occurrence wins.
    pub fn from_documents<I: IntoIterator<Item = Document>>(docs: I) -> Self {
        let mut corpus = Self::new();
        for doc in docs {
            corpus.push(doc);
        }
        corpus
    }

    pub fn from_records<'a, I>(records: I, schema: &CorpusSchema) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut corpus = Self::new();
        for record in records {
            match Document::from_record(record, schema) {
                Some(doc) => {
                    corpus.push(doc);
                }
                None => {
                    tracing::debug!(id_field = %schema.id_field, "skipping record without identifier");
                    corpus.skipped += 1;
                }
            }
        }
        corpus
    }

    pub fn push(&mut self, doc: Document) -> Option<DocId> {
        if doc.external_id.is_empty() || self.by_external.contains_key(&doc.external_id) {
            tracing::debug!(external_id = %doc.external_id, "skipping duplicate or empty document id");
            self.skipped += 1;
            return None;
        }
        let id = self.docs.len() as DocId;
        self.by_external.insert(doc.external_id.clone(), id);
        self.docs.push(doc);
        Some(id)
    }

    pub fn len(&self) -> usize { self.docs.len() }
    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn get(&self, id: DocId) -> Option<&Document> { self.docs.get(id as usize) }

    pub fn lookup(&self, external_id: &str) -> Option<DocId> { self.by_external.get(external_id).copied() }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.docs.iter().enumerate().map(|(i, d)| (i as DocId, d))
    }

    pub fn documents(&self) -> &[Document] { &self.docs }

    /// Records dropped while loading: missing identifier, malformed record, duplicate id.
    pub fn skipped_records(&self) -> usize { self.skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_list_and_string_token_fields() {
        let schema = CorpusSchema::default();
        let rec = json!({
            "pid": "P1",
            "tokens": "red  dress women",
            "title_tokens": ["red", "dress"],
            "title": "Red Dress",
            "average_rating": "4.5",
            "out_of_stock": true
        });
        let doc = Document::from_record(&rec, &schema).unwrap();
        assert_eq!(doc.tokens("tokens").unwrap(), &["red", "dress", "women"]);
        assert_eq!(doc.tokens("title_tokens").unwrap(), &["red", "dress"]);
        assert_eq!(doc.rating, Some(4.5));
        assert!(doc.out_of_stock);
        assert_eq!(doc.title, "Red Dress");
    }

    #[test]
    fn non_numeric_rating_and_stock_strings_are_ignored() {
        let schema = CorpusSchema::default();
        let rec = json!({"pid": "P1", "tokens": [], "average_rating": "n/a", "out_of_stock": "yes"});
        let doc = Document::from_record(&rec, &schema).unwrap();
        assert_eq!(doc.rating, None);
        assert!(!doc.out_of_stock);
    }

    #[test]
    fn malformed_token_field_is_dropped() {
        let schema = CorpusSchema::default();
        let rec = json!({"pid": "P1", "tokens": [1, 2, 3]});
        let doc = Document::from_record(&rec, &schema).unwrap();
        assert!(doc.tokens("tokens").is_none());
    }

    #[test]
    fn records_without_id_are_counted() {
        let schema = CorpusSchema::default();
        let records = vec![
            json!({"pid": "A", "tokens": "a"}),
            json!({"tokens": "b"}),
            json!({"pid": "", "tokens": "c"}),
            json!("not an object"),
            json!({"pid": "A", "tokens": "dup"}),
        ];
        let corpus = Corpus::from_records(&records, &schema);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.skipped_records(), 4);
        assert_eq!(corpus.lookup("A"), Some(0));
        assert_eq!(corpus.get(0).unwrap().tokens("tokens").unwrap(), &["a"]);
    }
}
