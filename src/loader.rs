//! Collaborators injected into the engine for external data.
//!
//! The engine never parses interval or variant files itself: `IMPORT` and
//! `CREATE ... INTERSECT` hand the path to a [`FeatureLoader`], and
//! `WORDSET['name']` falls back to a [`WordSetResolver`] when the workspace
//! holds no word set of that name.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::convert::feature_from_json;
use crate::value::{Feature, WordSet};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no such resource")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed content: {0}")]
    Format(String),
}

/// Loads the records stored at a path.
pub trait FeatureLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Vec<Feature>, LoadError>;
}

/// Resolves a word set name to its words, `Ok(None)` when unknown.
pub trait WordSetResolver: Send + Sync {
    fn resolve_wordset(&self, name: &str) -> Result<Option<WordSet>, LoadError>;
}

/// Loader serving pre-registered records, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<Feature>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, features: Vec<Feature>) -> Self {
        self.insert(path, features);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, features: Vec<Feature>) {
        self.files.insert(path.into(), features);
    }
}

impl FeatureLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<Vec<Feature>, LoadError> {
        self.files.get(path).cloned().ok_or(LoadError::NotFound)
    }
}

/// Reads a JSON array of objects from the filesystem, one feature per object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileLoader;

impl FeatureLoader for JsonFileLoader {
    fn load(&self, path: &str) -> Result<Vec<Feature>, LoadError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Io(e),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| LoadError::Format(e.to_string()))?;
        let serde_json::Value::Array(items) = json else {
            return Err(LoadError::Format("expected an array of records".to_string()));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                feature_from_json(item)
                    .ok_or_else(|| LoadError::Format(format!("record {} is not an object", i)))
            })
            .collect()
    }
}

/// Loader that fails every request; the default when nothing is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl FeatureLoader for NoLoader {
    fn load(&self, _path: &str) -> Result<Vec<Feature>, LoadError> {
        Err(LoadError::NotFound)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWordSets {
    sets: HashMap<String, WordSet>,
}

impl MemoryWordSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set<I, S>(mut self, name: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .insert(name.into(), words.into_iter().map(Into::into).collect());
        self
    }
}

impl WordSetResolver for MemoryWordSets {
    fn resolve_wordset(&self, name: &str) -> Result<Option<WordSet>, LoadError> {
        Ok(self.sets.get(name).cloned())
    }
}

/// Word lists stored as `<dir>/<name>.txt`, one word per line.
///
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct DirectoryWordSets {
    dir: PathBuf,
}

impl DirectoryWordSets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryWordSets { dir: dir.into() }
    }
}

impl WordSetResolver for DirectoryWordSets {
    fn resolve_wordset(&self, name: &str) -> Result<Option<WordSet>, LoadError> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(LoadError::Format(format!("invalid word set name '{}'", name)));
        }
        let path = self.dir.join(format!("{}.txt", name));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::tempdir;

    #[test]
    fn test_memory_loader_unknown_path() {
        let loader = MemoryLoader::new().with_file("a.bed", vec![]);
        assert!(loader.load("a.bed").unwrap().is_empty());
        assert!(matches!(loader.load("b.bed"), Err(LoadError::NotFound)));
    }

    #[test]
    fn test_json_file_loader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("panel.json");
        fs::write(&path, r#"[{"chr": "chr1", "start": 10, "end": 20}]"#).unwrap();

        let features = JsonFileLoader.load(path.to_str().unwrap()).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].get("end"), Some(&Value::Integer(20)));

        fs::write(&path, r#"[{"chr": "chr1"}, 3]"#).unwrap();
        assert!(matches!(
            JsonFileLoader.load(path.to_str().unwrap()),
            Err(LoadError::Format(_))
        ));
        assert!(matches!(
            JsonFileLoader.load(dir.path().join("missing.json").to_str().unwrap()),
            Err(LoadError::NotFound)
        ));
    }

    #[test]
    fn test_directory_wordsets() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("panel.txt"), "# genes\nCFTR\n\n  GJB2 \n").unwrap();
        let resolver = DirectoryWordSets::new(dir.path());

        let words = resolver.resolve_wordset("panel").unwrap().unwrap();
        assert_eq!(words.len(), 2);
        assert!(words.contains("GJB2"));
        assert!(resolver.resolve_wordset("absent").unwrap().is_none());
        assert!(matches!(
            resolver.resolve_wordset("../panel"),
            Err(LoadError::Format(_))
        ));
    }
}
