// Tests for chain walking

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use storychain_core::embed::{Embedder, HashingEmbedder};
use storychain_core::error::EmbedError;
use storychain_core::walker::{ChainWalker, StopReason, WalkEvent};
use storychain_scanner::error::{Result as ScanResult, ScanError};
use storychain_scanner::{Page, PageSource, RawLink};

// ============================================================================
// Test doubles
// ============================================================================

/// Pages served from memory; unknown URLs fail like a dead link would.
#[derive(Default)]
struct MemorySource {
    pages: HashMap<String, Page>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    fn with_page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl PageSource for MemorySource {
    async fn fetch(&self, url: &str) -> ScanResult<Page> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScanError::ParseError(format!("no such page: {}", url)))
    }
}

/// Embedder that is always broken.
struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Backend("model exploded".to_string()))
    }
}

const OP: &str = "Alice";

fn post(id: u32) -> String {
    format!("https://www.reddit.com/r/HFY/comments/{}", id)
}

fn by_op(id: u32, text: &str) -> RawLink {
    RawLink::new(post(id), text).with_author(OP)
}

/// A straight chain 1 -> 2 -> ... -> n, every "next" link written by the OP.
fn linear_story(n: u32) -> MemorySource {
    let mut source = MemorySource::default();
    for id in 1..=n {
        let mut links = Vec::new();
        if id < n {
            links.push(by_op(id + 1, &format!("Part {}", id + 1)));
        }
        let page = Page::with_links(links).with_original_poster(OP);
        source = source.with_page(&post(id), page);
    }
    source
}

// ============================================================================
// Termination and ordering
// ============================================================================

#[tokio::test]
async fn test_walk_follows_linear_chain() {
    let source = linear_story(5);
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, (1..=5).map(post).collect::<Vec<_>>());
    assert_eq!(report.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_walk_normalizes_seed() {
    let source = linear_story(2);
    let embedder = HashingEmbedder::new();

    let seed = format!("{}/#comments", post(1));
    let report = ChainWalker::new(&source, &embedder).walk(&seed).await;

    assert_eq!(report.chain, vec![post(1), post(2)]);
    assert_eq!(source.requested()[0], post(1));
}

#[tokio::test]
async fn test_walk_respects_depth_limit() {
    let source = linear_story(30);
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder)
        .with_max_depth(4)
        .walk(&post(1))
        .await;

    assert_eq!(report.chain.len(), 5);
    assert_eq!(report.stop, StopReason::DepthLimit);
    // the page past the limit is never fetched
    assert_eq!(source.requested().len(), 5);
}

#[tokio::test]
async fn test_walk_terminates_on_cycles_without_duplicates() {
    // 1 -> 2 -> 3 -> 1, and 3 also links back to 2
    let source = MemorySource::default()
        .with_page(&post(1), Page::with_links(vec![by_op(2, "Part 2")]).with_original_poster(OP))
        .with_page(&post(2), Page::with_links(vec![by_op(3, "Part 3")]))
        .with_page(
            &post(3),
            Page::with_links(vec![by_op(1, "Part 1"), by_op(2, "Part 2")]),
        );
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, vec![post(1), post(2), post(3)]);
    assert_eq!(report.stop, StopReason::Exhausted);
    let unique: HashSet<&String> = report.chain.iter().collect();
    assert_eq!(unique.len(), report.chain.len());
}

#[tokio::test]
async fn test_walk_self_link_ends_walk() {
    let source = MemorySource::default().with_page(
        &post(1),
        Page::with_links(vec![by_op(1, "Part 1 (reposted)")]).with_original_poster(OP),
    );
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, vec![post(1)]);
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(source.requested().len(), 1);
}

#[tokio::test]
async fn test_walk_seed_without_candidates() {
    let source = MemorySource::default().with_page(&post(1), Page::default());
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, vec![post(1)]);
    assert_eq!(report.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_walk_fetch_failure_keeps_partial_chain() {
    // page 2 is missing from the source, so fetching it fails
    let source = MemorySource::default()
        .with_page(&post(1), Page::with_links(vec![by_op(2, "Part 2")]).with_original_poster(OP));
    let embedder = HashingEmbedder::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let report = ChainWalker::new(&source, &embedder)
        .with_progress_callback(Arc::new(move |event: WalkEvent| {
            events_clone.lock().unwrap().push(event);
        }))
        .walk(&post(1))
        .await;

    assert_eq!(report.chain, vec![post(1), post(2)]);
    assert_eq!(report.stop, StopReason::Exhausted);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        WalkEvent::FetchFailed { url, .. } if *url == post(2)
    )));
    assert_eq!(
        events.last(),
        Some(&WalkEvent::Finished {
            posts: 2,
            stop: StopReason::Exhausted
        })
    );
}

#[tokio::test]
async fn test_walk_emits_visiting_events_in_order() {
    let source = linear_story(3);
    let embedder = HashingEmbedder::new();
    let visits = Arc::new(Mutex::new(Vec::new()));
    let visits_clone = visits.clone();

    ChainWalker::new(&source, &embedder)
        .with_progress_callback(Arc::new(move |event: WalkEvent| {
            if let WalkEvent::Visiting { depth, url } = event {
                visits_clone.lock().unwrap().push((depth, url));
            }
        }))
        .walk(&post(1))
        .await;

    assert_eq!(
        *visits.lock().unwrap(),
        vec![(0, post(1)), (1, post(2)), (2, post(3))]
    );
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn test_walk_prefers_op_over_stranger() {
    let source = MemorySource::default()
        .with_page(
            &post(1),
            Page::with_links(vec![
                RawLink::new("https://www.reddit.com/r/x/comments/9", "unrelated")
                    .with_author("stranger"),
                RawLink::new("https://www.reddit.com/r/x/comments/2", "Part 2").with_author(OP),
            ])
            .with_original_poster(OP),
        )
        .with_page("https://www.reddit.com/r/x/comments/2", Page::default());
    let embedder = HashingEmbedder::new();

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(
        report.chain,
        vec![post(1), "https://www.reddit.com/r/x/comments/2".to_string()]
    );
}

#[tokio::test]
async fn test_walk_ties_go_to_first_link() {
    let source = MemorySource::default()
        .with_page(
            &post(1),
            Page::with_links(vec![by_op(7, "Epilogue"), by_op(8, "Bonus chapter")])
                .with_original_poster(OP),
        )
        .with_page(&post(7), Page::default())
        .with_page(&post(8), Page::default());
    let embedder = FailingEmbedder;

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, vec![post(1), post(7)]);
}

#[tokio::test]
async fn test_walk_sequence_signal_survives_broken_embedder() {
    let source = MemorySource::default()
        .with_page(
            &post(5),
            Page::with_links(vec![
                RawLink::new(post(40), "Rules and FAQ"),
                RawLink::new(post(6), "Chapter 6"),
            ])
            .with_title("Chapter 5"),
        )
        .with_page(&post(6), Page::default());
    let embedder = FailingEmbedder;

    let report = ChainWalker::new(&source, &embedder).walk(&post(5)).await;

    assert_eq!(report.chain, vec![post(5), post(6)]);
}

#[tokio::test]
async fn test_walk_original_poster_is_never_overwritten() {
    // page 2 names a different poster; the link by the true OP must still win on page 2
    let source = MemorySource::default()
        .with_page(&post(1), Page::with_links(vec![by_op(2, "Part 2")]).with_original_poster(OP))
        .with_page(
            &post(2),
            Page::with_links(vec![
                RawLink::new(post(50), "Hijack").with_author("Mallory"),
                by_op(3, "Part 3"),
            ])
            .with_original_poster("Mallory"),
        )
        .with_page(&post(3), Page::default());
    let embedder = FailingEmbedder;

    let report = ChainWalker::new(&source, &embedder).walk(&post(1)).await;

    assert_eq!(report.chain, vec![post(1), post(2), post(3)]);
}

#[tokio::test]
async fn test_walks_are_independent() {
    let source = linear_story(3);
    let embedder = HashingEmbedder::new();
    let walker = ChainWalker::new(&source, &embedder);

    let first = walker.walk(&post(1)).await;
    let second = walker.walk(&post(2)).await;

    assert_eq!(first.chain.len(), 3);
    assert_eq!(second.chain, vec![post(2), post(3)]);
}

// ============================================================================
// Cancellation
// ============================================================================

/// Source whose second page never answers.
struct StallingSource {
    inner: MemorySource,
}

impl PageSource for StallingSource {
    async fn fetch(&self, url: &str) -> ScanResult<Page> {
        if url == post(2) {
            std::future::pending::<()>().await;
        }
        self.inner.fetch(url).await
    }
}

#[tokio::test]
async fn test_walk_cancellation_returns_partial_chain() {
    let source = StallingSource {
        inner: linear_story(4),
    };
    let embedder = HashingEmbedder::new();

    let shutdown = tokio::time::sleep(std::time::Duration::from_millis(50));
    let report = ChainWalker::new(&source, &embedder)
        .walk_until(&post(1), shutdown)
        .await;

    assert_eq!(report.chain, vec![post(1), post(2)]);
    assert_eq!(report.stop, StopReason::Cancelled);
}
