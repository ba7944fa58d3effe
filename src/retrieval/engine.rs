use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embedding::{EmbeddingProvider, cosine_similarity};
use super::index::{IndexSnapshot, tokenize};
use super::record::{ExperienceRecord, RecordCategory};
use crate::error::RetrievalError;

/// Weight of the positional bonus. Always below one term occurrence, so
/// position only separates records with equal frequency.
const POSITION_BONUS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: ExperienceRecord,
    /// In [0, 1].
    pub score: f64,
    pub keyword_score: Option<f64>,
    pub semantic_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Descending by score, ties by ascending record id.
    pub hits: Vec<SearchHit>,
    pub requested: SearchMode,
    /// Mode that produced the scores.
    pub used: SearchMode,
    /// Why `used` differs from `requested`.
    pub degraded: Option<String>,
}

/// Scores records against a query.
pub struct RetrievalEngine {
    alpha: f64,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl RetrievalEngine {
    /// `alpha` is the semantic weight of hybrid scoring.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Rank `index` against `query` and keep at most `top_k` hits.
    ///
    /// With `categories`, only records of those categories are ranked and
    /// keyword scores are normalised among them. Semantic mode fails when
    /// vectors are unavailable. Hybrid mode falls back to keyword scoring and
    /// says so in [`SearchOutcome::degraded`].
    pub fn search(
        &self,
        query: &str,
        index: &IndexSnapshot,
        mode: SearchMode,
        top_k: usize,
        categories: Option<&[RecordCategory]>,
    ) -> Result<SearchOutcome, RetrievalError> {
        let (mut hits, used, degraded) = match mode {
            SearchMode::Keyword => (
                self.keyword_hits(query, index, categories),
                SearchMode::Keyword,
                None,
            ),
            SearchMode::Semantic => {
                let semantic = self.semantic_scores(query, index)?;
                let hits = index
                    .records()
                    .iter()
                    .zip(semantic)
                    .map(|(record, s)| SearchHit {
                        record: record.clone(),
                        score: s,
                        keyword_score: None,
                        semantic_score: Some(s),
                    })
                    .collect();
                (hits, SearchMode::Semantic, None)
            }
            SearchMode::Hybrid => match self.semantic_scores(query, index) {
                Ok(semantic) => (
                    self.hybrid_hits(query, index, &semantic, categories),
                    SearchMode::Hybrid,
                    None,
                ),
                Err(e) => {
                    debug!(reason = %e, "hybrid search degraded to keyword");
                    (
                        self.keyword_hits(query, index, categories),
                        SearchMode::Keyword,
                        Some(e.to_string()),
                    )
                }
            },
        };

        hits.retain(|h| admits(categories, &h.record));
        hits.sort_by(rank_order);
        hits.truncate(top_k);
        Ok(SearchOutcome {
            hits,
            requested: mode,
            used,
            degraded,
        })
    }

    /// Normalised keyword score of every record, in snapshot order.
    ///
    /// Raw score is the summed term frequency of distinct query terms plus a
    /// bonus for how early the matched terms first occur; the best record
    /// maps to 1.0.
    /// Records outside `categories` score 0.
    pub fn keyword_scores(
        query: &str,
        index: &IndexSnapshot,
        categories: Option<&[RecordCategory]>,
    ) -> Vec<f64> {
        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        let n = index.len();
        let mut freq = vec![0.0f64; n];
        let mut early = vec![0.0f64; n];
        let mut matched = vec![0u32; n];
        for term in &terms {
            for p in index.postings(term) {
                freq[p.record] += f64::from(p.tf);
                early[p.record] += 1.0 / (1.0 + f64::from(p.first_position));
                matched[p.record] += 1;
            }
        }

        let records = index.records();
        let raw: Vec<f64> = (0..n)
            .map(|i| {
                if matched[i] == 0 || !admits(categories, &records[i]) {
                    0.0
                } else {
                    freq[i] + POSITION_BONUS * early[i] / f64::from(matched[i])
                }
            })
            .collect();
        let max = raw.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            raw.into_iter().map(|r| r / max).collect()
        } else {
            raw
        }
    }

    fn keyword_hits(
        &self,
        query: &str,
        index: &IndexSnapshot,
        categories: Option<&[RecordCategory]>,
    ) -> Vec<SearchHit> {
        index
            .records()
            .iter()
            .zip(Self::keyword_scores(query, index, categories))
            .filter(|(_, k)| *k > 0.0)
            .map(|(record, k)| SearchHit {
                record: record.clone(),
                score: k,
                keyword_score: Some(k),
                semantic_score: None,
            })
            .collect()
    }

    fn hybrid_hits(
        &self,
        query: &str,
        index: &IndexSnapshot,
        semantic: &[f64],
        categories: Option<&[RecordCategory]>,
    ) -> Vec<SearchHit> {
        let keyword = Self::keyword_scores(query, index, categories);
        index
            .records()
            .iter()
            .zip(keyword.iter().zip(semantic))
            .map(|(record, (&k, &s))| SearchHit {
                record: record.clone(),
                score: self.alpha * s + (1.0 - self.alpha) * k,
                keyword_score: Some(k),
                semantic_score: Some(s),
            })
            .filter(|h| h.score > 0.0)
            .collect()
    }

    /// Cosine similarity mapped from [-1, 1] to [0, 1], in snapshot order.
    fn semantic_scores(&self, query: &str, index: &IndexSnapshot) -> Result<Vec<f64>, RetrievalError> {
        if !index.vector_status().is_ready() {
            return Err(RetrievalError::SemanticUnavailable(
                index.vector_status().to_string(),
            ));
        }
        let Some(embedder) = &self.embedder else {
            return Err(RetrievalError::SemanticUnavailable(
                "no embedding provider configured".into(),
            ));
        };
        let q = embedder.embed(query)?;
        index
            .records()
            .iter()
            .map(|r| match &r.embedding {
                Some(v) => Ok((f64::from(cosine_similarity(&q, v)) + 1.0) / 2.0),
                None => Err(RetrievalError::SemanticUnavailable(format!(
                    "record `{}` has no embedding",
                    r.id
                ))),
            })
            .collect()
    }
}

fn admits(categories: Option<&[RecordCategory]>, record: &ExperienceRecord) -> bool {
    categories.is_none_or(|c| c.contains(&record.category))
}

fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.record.id.cmp(&b.record.id))
}
