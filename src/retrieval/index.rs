use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{info, warn};

use super::embedding::EmbeddingProvider;
use super::record::ExperienceRecord;
use crate::error::ProfileError;

const STOP_WORDS: &[&str] = &[
    "the", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "as", "it", "this", "that", "from", "you", "your", "do", "did",
];

/// Lowercase, split on anything that is not alphanumeric, drop one-letter
/// tokens and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// State of the vector half of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VectorStatus {
    /// Advanced mode is off for this profile.
    Disabled,
    Ready { provider: String, dimensions: usize },
    /// Vector build failed; only keyword search is possible.
    Degraded { reason: String },
}

impl VectorStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, VectorStatus::Ready { .. })
    }
}

impl fmt::Display for VectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorStatus::Disabled => write!(f, "keyword only"),
            VectorStatus::Ready {
                provider,
                dimensions,
            } => write!(f, "vectors ready ({provider}, {dimensions} dims)"),
            VectorStatus::Degraded { reason } => write!(f, "degraded to keyword: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Posting {
    pub record: usize,
    pub tf: u32,
    /// Token offset of the first occurrence.
    pub first_position: u32,
}

/// Immutable view of one build of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    records: Vec<ExperienceRecord>,
    postings: HashMap<String, Vec<Posting>>,
    vector_status: VectorStatus,
}

impl IndexSnapshot {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            postings: HashMap::new(),
            vector_status: VectorStatus::Disabled,
        }
    }

    /// Records sorted by ascending id.
    pub fn records(&self) -> &[ExperienceRecord] {
        &self.records
    }

    pub fn vector_status(&self) -> &VectorStatus {
        &self.vector_status
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Keyword postings plus optional vectors over a profile's records.
///
/// [`rebuild`](Self::rebuild) builds a complete snapshot off to the side
/// and swaps it in under the write lock, so readers see either the old or
/// the new index and never a partial one.
pub struct ExperienceIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl Default for ExperienceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperienceIndex {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
        }
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn vector_status(&self) -> VectorStatus {
        self.snapshot().vector_status.clone()
    }

    /// Replace the index with one built from `records`.
    ///
    /// Vectors are generated only when `embedder` is given; if any record
    /// fails to embed the whole vector half is dropped and the status says
    /// why. Incoming embeddings are ignored.
    pub fn rebuild(
        &self,
        records: Vec<ExperienceRecord>,
        embedder: Option<&dyn EmbeddingProvider>,
    ) -> Result<VectorStatus, ProfileError> {
        let snapshot = build_snapshot(records, embedder)?;
        let status = snapshot.vector_status.clone();
        info!(records = snapshot.len(), %status, "experience index rebuilt");

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
        Ok(status)
    }
}

fn build_snapshot(
    mut records: Vec<ExperienceRecord>,
    embedder: Option<&dyn EmbeddingProvider>,
) -> Result<IndexSnapshot, ProfileError> {
    {
        let mut seen = HashSet::new();
        for r in &records {
            if r.text.trim().is_empty() {
                return Err(ProfileError::EmptyText(r.id.clone()));
            }
            if !seen.insert(r.id.as_str()) {
                return Err(ProfileError::DuplicateId(r.id.clone()));
            }
        }
    }
    records.sort_by(|a, b| a.id.cmp(&b.id));

    let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
    for (idx, record) in records.iter_mut().enumerate() {
        record.embedding = None;
        let mut per_term: HashMap<String, Posting> = HashMap::new();
        for (pos, token) in tokenize(&record.text).into_iter().enumerate() {
            per_term
                .entry(token)
                .and_modify(|p| p.tf += 1)
                .or_insert(Posting {
                    record: idx,
                    tf: 1,
                    first_position: pos as u32,
                });
        }
        for (term, posting) in per_term {
            postings.entry(term).or_default().push(posting);
        }
    }
    for list in postings.values_mut() {
        list.sort_by_key(|p| p.record);
    }

    let vector_status = match embedder {
        None => VectorStatus::Disabled,
        Some(provider) => match embed_all(&records, provider) {
            Ok(vectors) => {
                let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
                for (record, vector) in records.iter_mut().zip(vectors) {
                    record.embedding = Some(vector);
                }
                VectorStatus::Ready {
                    provider: provider.name().to_string(),
                    dimensions,
                }
            }
            Err(reason) => {
                warn!(provider = provider.name(), %reason, "vector index unavailable, keyword only");
                VectorStatus::Degraded { reason }
            }
        },
    };

    Ok(IndexSnapshot {
        records,
        postings,
        vector_status,
    })
}

fn embed_all(
    records: &[ExperienceRecord],
    provider: &dyn EmbeddingProvider,
) -> Result<Vec<Vec<f32>>, String> {
    let mut vectors = Vec::with_capacity(records.len());
    let mut dims = None;
    for r in records {
        let v = provider.embed(&r.text).map_err(|e| e.to_string())?;
        match dims {
            None => dims = Some(v.len()),
            Some(d) if d != v.len() => {
                return Err(format!("inconsistent dimensions: {d} vs {}", v.len()));
            }
            Some(_) => {}
        }
        vectors.push(v);
    }
    Ok(vectors)
}
