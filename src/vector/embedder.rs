use sha2::{Digest, Sha256};

use crate::error::IciError;

pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IciError>;
    fn dimension(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Token feature hashing. Each lowercase alphanumeric token lands in one
/// bucket with a hash-chosen sign; the result is L2-normalised, so inner
/// product equals cosine similarity and texts sharing words score higher.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self, IciError> {
        if dim == 0 {
            return Err(IciError::Config("embedding dimension must be > 0".to_string()));
        }
        Ok(Self { dim })
    }
}

impl TextEmbedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IciError> {
        let mut out = vec![0f32; self.dim];
        let mut tokens = 0usize;
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(raw) % self.dim as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(IciError::Embedding("no tokens in input".to_string()));
        }
        l2_normalize(&mut out)?;
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn l2_normalize(v: &mut [f32]) -> Result<(), IciError> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        // Colliding tokens with opposite signs can cancel out.
        return Err(IciError::Embedding("zero-norm embedding".to_string()));
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Ok(())
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// all-MiniLM-L6-v2 through fastembed. The model is downloaded on first use.
#[cfg(feature = "fastembed")]
pub struct FastEmbedder {
    // TextEmbedding::embed needs &mut self.
    model: std::sync::Mutex<fastembed::TextEmbedding>,
}

#[cfg(feature = "fastembed")]
impl FastEmbedder {
    pub const DIMENSION: usize = 384;

    pub fn try_new() -> Result<Self, IciError> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false),
        )
        .map_err(|e| IciError::Embedding(e.to_string()))?;
        tracing::info!("vector: AllMiniLML6V2 loaded");
        Ok(Self {
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "fastembed")]
impl TextEmbedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, IciError> {
        if text.trim().is_empty() {
            return Err(IciError::Embedding("empty input".to_string()));
        }
        let mut model = self.model.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = model
            .embed(vec![text], None)
            .map_err(|e| IciError::Embedding(e.to_string()))?
            .pop()
            .ok_or_else(|| IciError::Embedding("model returned no vectors".to_string()))?;
        l2_normalize(&mut out)?;
        Ok(out)
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Tommy should go at 2pm").unwrap();
        let b = embedder.embed("Tommy should go at 2pm").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hashing_embedder_output_is_normalized() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let v = embedder.embed("hello world").unwrap();
        let norm_sq: f32 = v.iter().map(|x| x * x).sum();
        assert!((norm_sq - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_score_higher_than_unrelated_text() {
        let embedder = HashingEmbedder::new(384).unwrap();
        let stored = embedder.embed("Tommy should go at 2pm").unwrap();
        let related = embedder.embed("When should Tommy go?").unwrap();
        let unrelated = embedder.embed("the quarterly budget review").unwrap();
        assert!(dot(&stored, &related) > dot(&stored, &unrelated));
        assert!(dot(&stored, &related) > 0.3);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed("Alice likes TEA!").unwrap();
        let b = embedder.embed("alice likes tea").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blank_text_is_rejected() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed("   ").is_err());
        assert!(embedder.embed("?!").is_err());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
