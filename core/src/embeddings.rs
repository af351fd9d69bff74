//! Word-vector providers for the embedding ranker.
//!
//! The engine only relies on [`EmbeddingProvider`]: a fixed dimension and a
//! lookup from token to vector. [`WordVectors`] is the file-backed provider,
//! reading either the whitespace-separated text format used by word2vec and
//! GloVe exports, or a `bincode` snapshot written by [`WordVectors::save`].

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;
    fn vector(&self, token: &str) -> Option<&[f32]>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordVectors {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectors {
    /// Build from `(word, vector)` pairs. All vectors must share one dimension.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut wv = Self::default();
        for (word, vec) in pairs {
            wv.insert(word.into(), vec)?;
        }
        Ok(wv)
    }

    fn insert(&mut self, word: String, vec: Vec<f32>) -> Result<()> {
        if self.vectors.is_empty() {
            self.dimension = vec.len();
        } else if vec.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "vector for `{word}` has {} components, expected {}",
                vec.len(),
                self.dimension
            )));
        }
        self.vectors.insert(word, vec);
        Ok(())
    }

    pub fn len(&self) -> usize { self.vectors.len() }
    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    /// Parse the text format: one `word v1 v2 ...` per line, with an optional
    /// `count dim` header line as written by word2vec.
    pub fn read_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut wv = Self::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::Embedding(format!("read failed at line {}: {e}", lineno + 1)))?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let values: std::result::Result<Vec<f32>, _> = parts.map(str::parse::<f32>).collect();
            let values = values.map_err(|e| Error::Embedding(format!("bad number at line {}: {e}", lineno + 1)))?;
            if lineno == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                continue;
            }
            if values.is_empty() {
                continue;
            }
            wv.insert(word.to_string(), values)?;
        }
        if wv.is_empty() {
            return Err(Error::Embedding("no vectors found".into()));
        }
        Ok(wv)
    }

    /// Load by extension: `.bin` is a bincode snapshot, anything else is text.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let wv = if path.extension().and_then(|s| s.to_str()) == Some("bin") {
            let wv: WordVectors = bincode::deserialize_from(BufReader::new(file))
                .map_err(|e| Error::Embedding(format!("{}: {e}", path.display())))?;
            if wv.vectors.values().any(|v| v.len() != wv.dimension) {
                return Err(Error::Embedding(format!("{}: inconsistent vector dimensions", path.display())));
            }
            wv
        } else {
            Self::read_text(BufReader::new(file))?
        };
        tracing::info!(path = %path.display(), words = wv.len(), dimension = wv.dimension, "loaded word vectors");
        Ok(wv)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        bincode::serialize_into(BufWriter::new(file), self)
            .map_err(|e| Error::Embedding(format!("{}: {e}", path.display())))
    }
}

impl EmbeddingProvider for WordVectors {
    fn dimension(&self) -> usize { self.dimension }

    fn vector(&self, token: &str) -> Option<&[f32]> { self.vectors.get(token).map(Vec::as_slice) }
}

/// Resolve a model name or path: an existing path is used directly, otherwise
/// `<model_dir>/<name>.bin` then `<model_dir>/<name>.txt`.
pub fn resolve_source(name_or_path: &str, model_dir: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(name_or_path);
    if direct.is_file() {
        return Some(direct);
    }
    ["bin", "txt"]
        .iter()
        .map(|ext| model_dir.join(format!("{name_or_path}.{ext}")))
        .find(|p| p.is_file())
}

pub fn load(name_or_path: &str, model_dir: &Path) -> Result<WordVectors> {
    let path = resolve_source(name_or_path, model_dir)
        .ok_or_else(|| Error::Embedding(format!("model `{name_or_path}` not found in {}", model_dir.display())))?;
    WordVectors::load(path)
}

/// Load on a worker thread and give up after `timeout`. A timed-out worker is
/// left to finish on its own; its result is discarded.
pub fn load_with_timeout(name_or_path: &str, model_dir: &Path, timeout: Duration) -> Result<WordVectors> {
    run_with_timeout(name_or_path, model_dir, timeout, load)
}

type Loader = fn(&str, &Path) -> Result<WordVectors>;

fn run_with_timeout(name_or_path: &str, model_dir: &Path, timeout: Duration, loader: Loader) -> Result<WordVectors> {
    let (tx, rx) = mpsc::channel();
    let name = name_or_path.to_string();
    let dir = model_dir.to_path_buf();
    std::thread::Builder::new()
        .name("embedding-load".into())
        .spawn(move || {
            let _ = tx.send(loader(&name, &dir));
        })
        .map_err(|e| Error::Embedding(format!("failed to spawn loader: {e}")))?;
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::EmbeddingTimeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::Embedding("loader thread exited".into())),
    }
}

/// Load the configured model, retrying once with the smaller fallback model.
pub fn load_with_fallback(cfg: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    fallback_with(cfg, load)
}

fn fallback_with(cfg: &EmbeddingConfig, loader: Loader) -> Result<Arc<dyn EmbeddingProvider>> {
    let err = match run_with_timeout(&cfg.model, &cfg.model_dir, cfg.load_timeout(), loader) {
        Ok(wv) => return Ok(Arc::new(wv)),
        Err(err) => err,
    };
    let Some(fallback) = cfg.fallback_model.as_deref() else {
        return Err(err);
    };
    tracing::warn!(model = %cfg.model, fallback, error = %err, "embedding model failed to load; trying fallback");
    let wv = run_with_timeout(fallback, &cfg.model_dir, cfg.load_timeout(), loader)?;
    Ok(Arc::new(wv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;

    #[test]
    fn reads_text_with_and_without_header() {
        let with_header = "2 3\nred 1 0 0\ndress 0 1 0\n";
        let wv = WordVectors::read_text(Cursor::new(with_header)).unwrap();
        assert_eq!(wv.len(), 2);
        assert_eq!(wv.dimension(), 3);
        assert_eq!(wv.vector("dress").unwrap(), &[0.0, 1.0, 0.0]);

        let plain = "red 1 0\nblue 0 1\n";
        let wv = WordVectors::read_text(Cursor::new(plain)).unwrap();
        assert_eq!(wv.dimension(), 2);
        assert!(wv.vector("green").is_none());
    }

    #[test]
    fn rejects_ragged_vectors() {
        assert!(WordVectors::read_text(Cursor::new("a 1 2\nb 1\n")).is_err());
        assert!(WordVectors::from_pairs([("a", vec![1.0, 2.0]), ("b", vec![1.0])]).is_err());
    }

    #[test]
    fn bincode_snapshot_round_trips_through_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let wv = WordVectors::from_pairs([("red", vec![1.0, 0.0]), ("blue", vec![0.0, 1.0])]).unwrap();
        wv.save(dir.path().join("tiny.bin")).unwrap();
        let loaded = load("tiny", dir.path()).unwrap();
        assert_eq!(loaded.vector("blue").unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn falls_back_to_smaller_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("small.txt"), "red 1 0\n").unwrap();
        let cfg = EmbeddingConfig {
            model: "huge".into(),
            fallback_model: Some("small".into()),
            model_dir: dir.path().to_path_buf(),
            load_timeout_secs: 10,
        };
        let provider = load_with_fallback(&cfg).unwrap();
        assert_eq!(provider.dimension(), 2);
    }

    // "huge" never finishes inside a one second budget.
    fn slow_primary(name: &str, _: &Path) -> Result<WordVectors> {
        if name == "huge" {
            std::thread::sleep(Duration::from_secs(3));
        }
        WordVectors::from_pairs([(name.to_string(), vec![1.0, 0.0, 0.0])])
    }

    fn slow_config(fallback: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            model: "huge".into(),
            fallback_model: fallback.map(str::to_string),
            model_dir: PathBuf::from("unused"),
            load_timeout_secs: 1,
        }
    }

    #[test]
    fn timed_out_primary_falls_back() {
        let provider = fallback_with(&slow_config(Some("small")), slow_primary).unwrap();
        assert_eq!(provider.dimension(), 3);
        assert!(provider.vector("small").is_some());
        assert!(provider.vector("huge").is_none());
    }

    #[test]
    fn timeout_without_fallback_is_reported() {
        let err = fallback_with(&slow_config(None), slow_primary).err().unwrap();
        assert!(matches!(err, Error::EmbeddingTimeout(d) if d == Duration::from_secs(1)));
    }

    #[test]
    fn fails_when_both_models_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EmbeddingConfig {
            model: "huge".into(),
            fallback_model: Some("also-missing".into()),
            model_dir: dir.path().to_path_buf(),
            load_timeout_secs: 10,
        };
        assert!(matches!(load_with_fallback(&cfg), Err(Error::Embedding(_))));
    }
}
