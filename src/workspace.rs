use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, VqlError};
use crate::value::{FeatureSet, WordSet};

/// Named feature sets and word sets that commands read and write.
///
/// A workspace is an ordinary value passed to every execution call; there is
/// no process-wide store. Sets are shared through `Arc`, so rebinding a name
/// releases the old set once the last reader lets go of it.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    sets: HashMap<String, Arc<FeatureSet>>,
    wordsets: HashMap<String, Arc<WordSet>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<FeatureSet>> {
        self.sets.get(name).cloned()
    }

    /// Like [`Workspace::get`] but unknown names are an error.
    pub fn require(&self, name: &str) -> Result<Arc<FeatureSet>> {
        self.get(name)
            .ok_or_else(|| VqlError::UnknownSet(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Binds `name`, replacing (and returning) any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, set: FeatureSet) -> Option<Arc<FeatureSet>> {
        self.sets.insert(name.into(), Arc::new(set))
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<FeatureSet>> {
        self.sets.remove(name)
    }

    /// Set names in alphabetical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sets.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn wordset(&self, name: &str) -> Option<Arc<WordSet>> {
        self.wordsets.get(name).cloned()
    }

    pub fn bind_wordset(&mut self, name: impl Into<String>, words: WordSet) -> Option<Arc<WordSet>> {
        self.wordsets.insert(name.into(), Arc::new(words))
    }

    pub fn remove_wordset(&mut self, name: &str) -> Option<Arc<WordSet>> {
        self.wordsets.remove(name)
    }

    pub fn wordset_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wordsets.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A workspace shared between threads: any number of readers, or one writer.
#[derive(Debug, Clone, Default)]
pub struct SharedWorkspace {
    inner: Arc<RwLock<Workspace>>,
}

impl SharedWorkspace {
    pub fn new(workspace: Workspace) -> Self {
        SharedWorkspace {
            inner: Arc::new(RwLock::new(workspace)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Workspace>> {
        self.inner.read().map_err(|e| VqlError::Lock(e.to_string()))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Workspace>> {
        self.inner.write().map_err(|e| VqlError::Lock(e.to_string()))
    }
}
