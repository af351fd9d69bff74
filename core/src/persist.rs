//! File loading: corpus records and ground-truth relevance labels. The index
//! itself has no on-disk form; it is rebuilt from the corpus at startup.

use crate::config::CorpusSchema;
use crate::document::Corpus;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load a corpus from a `.json` file (array or single object), a `.jsonl`
/// file, or a directory containing such files. A missing or unparseable file
/// is an error; individual records without an identifier are skipped.
pub fn load_corpus<P: AsRef<Path>>(path: P, schema: &CorpusSchema) -> Result<Corpus> {
    let path = path.as_ref();
    let mut records: Vec<Value> = Vec::new();
    for file in corpus_files(path)? {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut records)?;
        } else {
            read_json(&file, &mut records)?;
        }
    }
    let corpus = Corpus::from_records(&records, schema);
    tracing::info!(
        path = %path.display(),
        documents = corpus.len(),
        skipped = corpus.skipped_records(),
        "loaded corpus"
    );
    Ok(corpus)
}

fn corpus_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "corpus path does not exist")));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    // Directory order is platform dependent; DocIds must not be.
    files.sort();
    Ok(files)
}

fn read_jsonl(file: &Path, out: &mut Vec<Value>) -> Result<()> {
    let f = File::open(file).map_err(|e| Error::io(file, e))?;
    for line in BufReader::new(f).lines() {
        let line = line.map_err(|e| Error::io(file, e))?;
        if line.trim().is_empty() { continue; }
        out.push(serde_json::from_str(&line).map_err(|e| Error::json(file, e))?);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<Value>) -> Result<()> {
    let f = File::open(file).map_err(|e| Error::io(file, e))?;
    let json: Value = serde_json::from_reader(BufReader::new(f)).map_err(|e| Error::json(file, e))?;
    match json {
        Value::Array(arr) => out.extend(arr),
        obj @ Value::Object(_) => out.push(obj),
        _ => tracing::debug!(file = %file.display(), "ignoring json file without records"),
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    query_id: String,
    pid: String,
    labels: u8,
}

/// Relevance judgments per query, kept in file order.
#[derive(Debug, Default, Clone)]
pub struct GroundTruth {
    pub queries: BTreeMap<String, Vec<(String, u8)>>,
}

impl GroundTruth {
    pub fn label(&self, query_id: &str, external_id: &str) -> u8 {
        self.queries
            .get(query_id)
            .and_then(|rows| rows.iter().find(|(pid, _)| pid == external_id))
            .map(|(_, label)| *label)
            .unwrap_or(0)
    }
}

/// Load a `query_id,pid,labels` CSV with a header row.
pub fn load_ground_truth<P: AsRef<Path>>(path: P) -> Result<GroundTruth> {
    let path = path.as_ref();
    let csv_err = |source| Error::Csv { path: path.to_path_buf(), source };
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path).map_err(csv_err)?;
    let mut gt = GroundTruth::default();
    for row in reader.deserialize::<LabelRow>() {
        let row = row.map_err(csv_err)?;
        gt.queries.entry(row.query_id).or_default().push((row.pid, row.labels));
    }
    tracing::info!(path = %path.display(), queries = gt.queries.len(), "loaded ground truth");
    Ok(gt)
}

/// Load a `{ "query_id": "query text" }` JSON object.
pub fn load_query_texts<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| Error::json(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_json_jsonl_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"[{"pid":"A","tokens":"red dress"},{"pid":"B","tokens":["blue"]}]"#).unwrap();
        fs::write(dir.path().join("b.jsonl"), "{\"pid\":\"C\",\"tokens\":\"red shirt\"}\n\n{\"tokens\":\"no id\"}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let corpus = load_corpus(dir.path(), &CorpusSchema::default()).unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.skipped_records(), 1);
        assert_eq!(corpus.lookup("A"), Some(0));
        assert_eq!(corpus.lookup("C"), Some(2));
    }

    #[test]
    fn missing_corpus_is_fatal() {
        let err = load_corpus("/definitely/not/here.json", &CorpusSchema::default()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn broken_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[{").unwrap();
        assert!(matches!(load_corpus(&path, &CorpusSchema::default()), Err(Error::Json { .. })));
    }

    #[test]
    fn ground_truth_keeps_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        fs::write(&path, "query_id,pid,labels\n1,P9,1\n1,P2,0\n2,P5,1\n").unwrap();
        let gt = load_ground_truth(&path).unwrap();
        assert_eq!(gt.queries["1"], vec![("P9".to_string(), 1), ("P2".to_string(), 0)]);
        assert_eq!(gt.label("2", "P5"), 1);
        assert_eq!(gt.label("2", "P9"), 0);
    }

    #[test]
    fn unreadable_ground_truth_is_fatal() {
        assert!(matches!(load_ground_truth("/nope/labels.csv"), Err(Error::Csv { .. })));
    }
}
