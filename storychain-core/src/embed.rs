//! Text embedders used to compare link texts with previous chapter titles.
//!
//! The default [`HashingEmbedder`] needs no model download: it feature-hashes
//! lowercase words and character trigrams into a fixed-size vector, which is
//! enough to tell "Chapter 6" apart from "Rules and FAQ". With the `fastembed`
//! feature a local sentence-embedding model is available as well.

use crate::error::EmbedError;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maps a short string to a fixed-length vector.
///
/// Implementations must return the same vector for the same input within a run.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        (**self).embed(text)
    }
}

/// Cosine similarity, or `None` when the vectors cannot be compared.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

pub const HASHING_DIM: usize = 256;

/// Offline embedder based on the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self { dim: HASHING_DIM }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();
        let bucket = (hash % self.dim as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut vector = vec![0.0f32; self.dim];
        for word in &words {
            self.add_feature(&mut vector, &format!("w:{}", word), 1.0);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                self.add_feature(&mut vector, &format!("t:{}", trigram), 0.5);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "fastembed")]
mod local {
    use super::Embedder;
    use crate::error::EmbedError;
    use std::sync::Mutex;
    use tracing::info;

    /// Sentence embeddings from a local ONNX model (AllMiniLML6V2, 384-dim).
    pub struct FastEmbedder {
        model: Mutex<fastembed::TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn try_new() -> Result<Self, EmbedError> {
            let model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;
            info!("Loaded AllMiniLML6V2 embedding model");
            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.trim().is_empty() {
                return Err(EmbedError::EmptyInput);
            }
            let model = self
                .model
                .lock()
                .map_err(|_| EmbedError::Backend("embedding model lock poisoned".to_string()))?;
            model
                .embed(vec![text], None)
                .map_err(|e| EmbedError::Backend(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| EmbedError::Backend("model returned no embedding".to_string()))
        }
    }
}

/// Which embedder backend a walk should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    #[default]
    Hashing,
    FastEmbed,
}

impl EmbedderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedderKind::Hashing => "hashing",
            EmbedderKind::FastEmbed => "fastembed",
        }
    }

    /// Construct the backend. Fails when the backend is not compiled in or cannot load.
    pub fn build(&self) -> Result<Box<dyn Embedder>, EmbedError> {
        match self {
            EmbedderKind::Hashing => Ok(Box::new(HashingEmbedder::new())),
            #[cfg(feature = "fastembed")]
            EmbedderKind::FastEmbed => Ok(Box::new(FastEmbedder::try_new()?)),
            #[cfg(not(feature = "fastembed"))]
            EmbedderKind::FastEmbed => Err(EmbedError::Unavailable(
                "storychain was built without the `fastembed` feature".to_string(),
            )),
        }
    }
}

impl FromStr for EmbedderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hashing" => Ok(EmbedderKind::Hashing),
            "fastembed" => Ok(EmbedderKind::FastEmbed),
            other => Err(format!("unknown embedder '{}'", other)),
        }
    }
}
