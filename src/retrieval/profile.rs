use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::embedding::EmbeddingProvider;
use super::engine::{RetrievalEngine, SearchMode};
use super::index::{ExperienceIndex, VectorStatus};
use super::normalize::records_from_profile;
use super::record::ExperienceRecord;
use super::Evidence;
use crate::error::ProfileError;

/// Persistence for a profile's records.
pub trait ProfileStore {
    fn load(&self, name: &str) -> Result<Vec<ExperienceRecord>, ProfileError>;

    fn save(&self, name: &str, records: &[ExperienceRecord]) -> Result<(), ProfileError>;
}

/// One `<name>.json` file per profile under a directory.
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ProfileError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ProfileError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Names of the stored profiles, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, name: &str) -> Result<Vec<ExperienceRecord>, ProfileError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ProfileError::NotFound(name.to_string()));
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, name: &str, records: &[ExperienceRecord]) -> Result<(), ProfileError> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

/// Profile operations for one run: normalise, persist, index.
///
/// Owned by whoever drives the run and passed by reference; there is no
/// process-wide profile state.
pub struct ProfileService<S> {
    store: S,
    index: ExperienceIndex,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl<S: ProfileStore> ProfileService<S> {
    /// `embedder` enables the vector half of the index (advanced mode).
    pub fn new(store: S, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            store,
            index: ExperienceIndex::new(),
            embedder,
        }
    }

    pub fn index(&self) -> &ExperienceIndex {
        &self.index
    }

    /// Normalise `raw` into records, index them, then persist.
    ///
    /// The index is rebuilt even when persistence fails, so the in-memory
    /// run keeps what it has.
    pub fn save(&self, name: &str, raw: &Value) -> Result<VectorStatus, ProfileError> {
        let records = records_from_profile(raw);
        let status = self.index.rebuild(records, self.embedder.as_deref())?;
        let snapshot = self.index.snapshot();
        if let Err(e) = self.store.save(name, snapshot.records()) {
            warn!(profile = name, error = %e, "failed to persist profile");
            return Err(e);
        }
        info!(profile = name, records = snapshot.len(), "profile saved");
        Ok(status)
    }

    /// Load a stored profile and index it.
    pub fn load(&self, name: &str) -> Result<VectorStatus, ProfileError> {
        let records = self.store.load(name)?;
        self.index.rebuild(records, self.embedder.as_deref())
    }

    /// Retrieval context over this profile's index.
    pub fn evidence(&self, mode: SearchMode, alpha: f64, top_k: usize) -> Evidence<'_> {
        let mut engine = RetrievalEngine::new(alpha);
        if let Some(embedder) = &self.embedder {
            engine = engine.with_embedder(Arc::clone(embedder));
        }
        Evidence::new(&self.index, engine, mode, top_k)
    }
}
