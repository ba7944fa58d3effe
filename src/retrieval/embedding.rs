use crate::error::RetrievalError;

/// Turns text into a fixed-length vector.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    fn name(&self) -> &str;
}

/// Feature-hashing embedder.
///
/// Terms are hashed into fixed buckets with FNV-1a and weighted by term
/// frequency; the vector is L2-normalised. Deterministic and always
/// available, with no model download.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 256;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dims as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vec = vec![0.0f32; self.dimensions];
        let tokens = super::index::tokenize(text);
        if tokens.is_empty() {
            return Ok(vec);
        }
        let weight = 1.0 / tokens.len() as f32;
        for tok in &tokens {
            vec[Self::bucket(tok, self.dimensions)] += weight;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        Ok(vec)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Cosine similarity in [-1, 1]; 0 for empty, zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Provider whose backend is missing.
    pub struct UnavailableEmbedder;

    impl EmbeddingProvider for UnavailableEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::Embedding("model not installed".into()))
        }

        fn name(&self) -> &str {
            "unavailable"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(64).embed("").unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn output_is_normalized_and_deterministic() {
        let e = HashingEmbedder::default();
        let a = e.embed("rust programming language systems").unwrap();
        let b = e.embed("rust programming language systems").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "expected unit norm, got {norm}");
    }

    #[test]
    fn similar_texts_score_higher() {
        let e = HashingEmbedder::default();
        let a = e.embed("python data pipeline engineering").unwrap();
        let b = e.embed("python data pipeline on spark").unwrap();
        let c = e.embed("pastry chef bakery croissants").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn cosine_edge_cases() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
