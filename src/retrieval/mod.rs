//! Experience retrieval: a dual-mode index over profile records and the
//! engine that ranks them.

mod embedding;
mod engine;
mod index;
mod normalize;
mod profile;
mod record;

pub use embedding::{EmbeddingProvider, HashingEmbedder, cosine_similarity};
pub use engine::{RetrievalEngine, SearchHit, SearchMode, SearchOutcome};
pub use index::{ExperienceIndex, IndexSnapshot, VectorStatus, tokenize};
pub use normalize::{normalize_field, records_from_profile};
pub use profile::{JsonProfileStore, ProfileService, ProfileStore};
pub use record::{ExperienceRecord, RecordCategory};

#[cfg(test)]
pub(crate) use embedding::testing::UnavailableEmbedder;

use tracing::warn;

/// Evidence lookups for a run, with the caller-side fallback policy.
///
/// A semantic search that cannot run is retried in keyword mode; the
/// outcome records the degradation.
pub struct Evidence<'a> {
    index: &'a ExperienceIndex,
    engine: RetrievalEngine,
    mode: SearchMode,
    top_k: usize,
}

impl<'a> Evidence<'a> {
    pub fn new(index: &'a ExperienceIndex, engine: RetrievalEngine, mode: SearchMode, top_k: usize) -> Self {
        Self {
            index,
            engine,
            mode,
            top_k,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn lookup(&self, query: &str) -> SearchOutcome {
        self.lookup_in(query, None)
    }

    /// Like [`lookup`](Self::lookup), restricted to `categories` when given.
    pub fn lookup_in(&self, query: &str, categories: Option<&[RecordCategory]>) -> SearchOutcome {
        let snapshot = self.index.snapshot();
        match self
            .engine
            .search(query, &snapshot, self.mode, self.top_k, categories)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(mode = %self.mode, reason = %e, "falling back to keyword retrieval");
                let mut outcome = self.keyword(&snapshot, query, categories);
                outcome.requested = self.mode;
                outcome.degraded = Some(e.to_string());
                outcome
            }
        }
    }

    fn keyword(
        &self,
        snapshot: &IndexSnapshot,
        query: &str,
        categories: Option<&[RecordCategory]>,
    ) -> SearchOutcome {
        self.engine
            .search(query, snapshot, SearchMode::Keyword, self.top_k, categories)
            .unwrap_or_else(|_| SearchOutcome {
                hits: Vec::new(),
                requested: SearchMode::Keyword,
                used: SearchMode::Keyword,
                degraded: None,
            })
    }
}
