use crate::embed::{Embedder, cosine_similarity};
use crate::error::EmbedError;
use crate::state::{Candidate, ChainState};
use std::collections::HashMap;
use storychain_scanner::links::same_identity;
use tracing::{debug, warn};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Points awarded per signal. Higher means a stronger hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalWeights {
    pub authorship: u32,
    pub community: u32,
    pub similarity: u32,
    pub sequence: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            authorship: 3,
            community: 1,
            similarity: 2,
            sequence: 2,
        }
    }
}

/// Which signals fired for a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub authorship: bool,
    pub community: bool,
    pub similarity: bool,
    pub sequence: bool,
    pub total: u32,
}

/// First run of 1 to 3 ASCII digits in `text`; longer runs are skipped.
pub fn first_number(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i - start <= 3 {
            return text[start..i].parse().ok();
        }
    }
    None
}

/// Scores links against the chain state. Embeddings (and embedding failures)
/// are memoized per scorer, so a scorer should live no longer than one walk.
pub struct CandidateScorer<'e, E: Embedder + ?Sized> {
    embedder: &'e E,
    weights: SignalWeights,
    threshold: f32,
    cache: HashMap<String, Option<Vec<f32>>>,
}

impl<'e, E: Embedder + ?Sized> CandidateScorer<'e, E> {
    pub fn new(embedder: &'e E) -> Self {
        Self {
            embedder,
            weights: SignalWeights::default(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            cache: HashMap::new(),
        }
    }

    pub fn with_weights(mut self, weights: SignalWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn score(&mut self, candidate: &Candidate, state: &ChainState) -> u32 {
        self.breakdown(candidate, state).total
    }

    pub fn breakdown(&mut self, candidate: &Candidate, state: &ChainState) -> ScoreBreakdown {
        let mut result = ScoreBreakdown::default();

        if let (Some(author), Some(op)) = (&candidate.author, &state.original_poster) {
            if same_identity(author, op) {
                result.authorship = true;
                result.total += self.weights.authorship;
            }
        }

        if let (Some(sub), Some(last)) = (&candidate.sub_community, &state.last_sub_community) {
            if sub.eq_ignore_ascii_case(last) {
                result.community = true;
                result.total += self.weights.community;
            }
        }

        if let Some(ref previous) = state.last_title {
            if self
                .title_similarity(&candidate.text, previous)
                .is_some_and(|similarity| similarity > self.threshold)
            {
                result.similarity = true;
                result.total += self.weights.similarity;
            }
        }

        if let (Some(n), Some(last)) = (first_number(&candidate.text), state.last_numeric_index) {
            if last.checked_add(1) == Some(n) {
                result.sequence = true;
                result.total += self.weights.sequence;
            }
        }

        result
    }

    /// `None` when either text has no usable embedding.
    fn title_similarity(&mut self, text: &str, previous: &str) -> Option<f32> {
        self.ensure_embedded(text);
        self.ensure_embedded(previous);
        let (Some(a), Some(b)) = (&self.cache[text], &self.cache[previous]) else {
            return None;
        };
        let similarity = cosine_similarity(a, b);
        if similarity.is_none() {
            debug!("Embeddings of '{}' and '{}' are not comparable", text, previous);
        }
        similarity
    }

    /// Embeds `text` once; a failure is remembered so it is neither retried nor re-logged.
    fn ensure_embedded(&mut self, text: &str) {
        if self.cache.contains_key(text) {
            return;
        }
        let vector = match self.embedder.embed(text) {
            Ok(vector) => Some(vector),
            Err(EmbedError::EmptyInput) => {
                debug!("No words to embed in '{}'", text);
                None
            }
            Err(e) => {
                warn!("No embedding for '{}': {}", text, e);
                None
            }
        };
        self.cache.insert(text.to_string(), vector);
    }
}
