use crate::embed::Embedder;
use crate::scorer::{CandidateScorer, DEFAULT_SIMILARITY_THRESHOLD, SignalWeights};
use crate::state::{Candidate, ChainState};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use storychain_scanner::{Page, PageSource, normalize_url};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_DEPTH: usize = 15;

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No unvisited link on the last page qualified as a next chapter.
    Exhausted,
    DepthLimit,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Exhausted => "no further chapter found",
            StopReason::DepthLimit => "maximum depth reached",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Ordered chain of post URLs plus the reason the walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    pub chain: Vec<String>,
    pub stop: StopReason,
}

/// Progress notifications emitted during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    Visiting { depth: usize, url: String },
    FetchFailed { url: String, error: String },
    Selected { url: String, text: String, score: u32 },
    Finished { posts: usize, stop: StopReason },
}

/// Callback for reporting walk progress
pub type WalkProgressCallback = Arc<dyn Fn(WalkEvent) + Send + Sync>;

/// Follows "next part" links from a seed post, one page at a time.
///
/// The walker holds only configuration; every call to [`ChainWalker::walk`]
/// starts from a fresh state, so one walker can serve several independent walks.
pub struct ChainWalker<'a, S: PageSource, E: Embedder + ?Sized> {
    source: &'a S,
    embedder: &'a E,
    max_depth: usize,
    threshold: f32,
    weights: SignalWeights,
    progress: Option<WalkProgressCallback>,
}

impl<'a, S: PageSource, E: Embedder + ?Sized> ChainWalker<'a, S, E> {
    pub fn new(source: &'a S, embedder: &'a E) -> Self {
        Self {
            source,
            embedder,
            max_depth: DEFAULT_MAX_DEPTH,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            weights: SignalWeights::default(),
            progress: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_weights(mut self, weights: SignalWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_progress_callback(mut self, callback: WalkProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub async fn walk(&self, seed: &str) -> WalkReport {
        self.walk_until(seed, std::future::pending::<()>()).await
    }

    /// Walk from `seed` until the chain ends or `shutdown` resolves.
    ///
    /// A cancelled walk still returns every URL visited so far.
    pub async fn walk_until<F>(&self, seed: &str, shutdown: F) -> WalkReport
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        let mut scorer = CandidateScorer::new(self.embedder)
            .with_weights(self.weights)
            .with_threshold(self.threshold);
        let mut state = ChainState::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut chain: Vec<String> = Vec::new();

        let mut current = normalize_url(seed);
        let mut depth = 0usize;

        let stop = loop {
            if depth > self.max_depth {
                break StopReason::DepthLimit;
            }
            // select_next never offers a visited URL
            let first_visit = visited.insert(current.clone());
            debug_assert!(first_visit, "{} walked twice", current);
            chain.push(current.clone());
            info!("[{}] {}", depth + 1, current);
            self.emit(WalkEvent::Visiting {
                depth,
                url: current.clone(),
            });

            let fetched = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.source.fetch(&current) => Some(result),
            };
            let Some(fetched) = fetched else {
                break StopReason::Cancelled;
            };

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", current, e);
                    self.emit(WalkEvent::FetchFailed {
                        url: current.clone(),
                        error: e.to_string(),
                    });
                    Page::default()
                }
            };

            if state.record_original_poster(page.original_poster.as_deref()) {
                info!("Original poster: {:?}", state.original_poster);
            }
            if let Some(ref title) = page.title {
                state.prime_from_title(title);
            }

            let Some(selected) = select_next(&mut scorer, page, &state, &visited) else {
                break StopReason::Exhausted;
            };

            info!("Next: '{}' (score {}) {}", selected.text, selected.score, selected.url);
            self.emit(WalkEvent::Selected {
                url: selected.url.clone(),
                text: selected.text.clone(),
                score: selected.score,
            });
            state.advance(&selected);
            current = selected.url;
            depth += 1;
        };

        info!("Walk finished with {} post(s): {}", chain.len(), stop);
        self.emit(WalkEvent::Finished {
            posts: chain.len(),
            stop,
        });
        WalkReport { chain, stop }
    }

    fn emit(&self, event: WalkEvent) {
        if let Some(ref callback) = self.progress {
            callback(event);
        }
    }
}

/// Highest-scoring unvisited link on `page`; ties go to the earliest link.
fn select_next<E: Embedder + ?Sized>(
    scorer: &mut CandidateScorer<'_, E>,
    page: Page,
    state: &ChainState,
    visited: &HashSet<String>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for link in page.links {
        let mut candidate = Candidate::from(link);
        if visited.contains(&candidate.url) {
            continue;
        }
        let breakdown = scorer.breakdown(&candidate, state);
        debug!("  {} '{}' -> {:?}", candidate.url, candidate.text, breakdown);
        if breakdown.total == 0 {
            continue;
        }
        candidate.score = breakdown.total;
        if best.as_ref().is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    best
}
