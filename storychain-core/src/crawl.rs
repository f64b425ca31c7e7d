use crate::embed::EmbedderKind;
use crate::error::WalkError;
use crate::scorer::{DEFAULT_SIMILARITY_THRESHOLD, SignalWeights};
use crate::walker::{
    ChainWalker, DEFAULT_MAX_DEPTH, StopReason, WalkEvent, WalkProgressCallback, WalkReport,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storychain_scanner::{FetcherConfig, PageFetcher, ScanError};
use url::Url;

/// Options for configuring a walk
pub struct WalkOptions {
    pub seed: String,
    pub max_depth: usize,
    pub threshold: f32,
    pub embedder: EmbedderKind,
    pub weights: SignalWeights,
    pub fetcher: FetcherConfig,
    pub show_progress_bars: bool,
}

impl WalkOptions {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            embedder: EmbedderKind::default(),
            weights: SignalWeights::default(),
            fetcher: FetcherConfig::default(),
            show_progress_bars: false,
        }
    }
}

/// One human-readable line for a progress event.
pub fn describe_event(event: &WalkEvent) -> String {
    match event {
        WalkEvent::Visiting { depth, url } => {
            format!("{} [{}] {}", "→".blue(), depth + 1, url)
        }
        WalkEvent::FetchFailed { url, error } => {
            format!("{} Failed to fetch {}: {}", "⚠".yellow().bold(), url, error)
        }
        WalkEvent::Selected { text, score, .. } => {
            format!("  {} next: {} (score {})", "↳".cyan(), text.bright_white(), score)
        }
        WalkEvent::Finished { posts, stop } => {
            format!("{} Found {} post(s) ({})", "✓".green().bold(), posts, stop)
        }
    }
}

/// Execute a walk with the given options.
///
/// Only configuration problems (bad seed URL, unavailable embedder, HTTP client
/// setup) are errors; everything that goes wrong mid-walk shortens the chain instead.
pub async fn execute_walk<F>(
    options: WalkOptions,
    progress_callback: Option<WalkProgressCallback>,
    shutdown: F,
) -> Result<WalkReport, WalkError>
where
    F: Future<Output = ()>,
{
    let WalkOptions {
        seed,
        max_depth,
        threshold,
        embedder,
        weights,
        fetcher,
        show_progress_bars,
    } = options;

    Url::parse(&seed).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", seed, e)))?;
    let embedder = embedder.build()?;
    let fetcher = PageFetcher::new(&fetcher)?;

    // Set up single spinner for overall walk progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting walk...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let pb_clone = progress_bar.clone();
    let internal_callback: WalkProgressCallback = Arc::new(move |event: WalkEvent| {
        if let Some(ref pb) = pb_clone {
            pb.println(describe_event(&event));
            if let WalkEvent::Visiting { depth, .. } = &event {
                pb.set_message(format!("Walking... {} post(s) so far", depth + 1));
            }
        }
        if let Some(ref callback) = progress_callback {
            callback(event);
        }
    });

    let walker = ChainWalker::new(&fetcher, embedder.as_ref())
        .with_max_depth(max_depth)
        .with_threshold(threshold)
        .with_weights(weights)
        .with_progress_callback(internal_callback);

    let report = walker.walk_until(&seed, shutdown).await;

    if let Some(ref pb) = progress_bar {
        pb.finish_and_clear();
    }

    Ok(report)
}

/// Generate a plain-text report of a finished walk
pub fn generate_chain_report(report: &WalkReport) -> String {
    let mut out = String::new();
    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Posts found: {}\n", report.chain.len()));
    out.push_str(&format!("  Stopped: {}\n", report.stop));
    if report.stop == StopReason::DepthLimit {
        out.push_str("  (raise --max-depth to follow the story further)\n");
    }
    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    let width = report.chain.len().to_string().len();
    for (idx, url) in report.chain.iter().enumerate() {
        out.push_str(&format!("  {:>width$}. {}\n", idx + 1, url, width = width));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_chain_report() {
        let report = WalkReport {
            chain: (1..=10)
                .map(|i| format!("https://www.reddit.com/r/HFY/comments/{}", i))
                .collect(),
            stop: StopReason::DepthLimit,
        };

        let text = generate_chain_report(&report);

        assert!(text.contains("Posts found: 10"));
        assert!(text.contains("maximum depth reached"));
        assert!(text.contains("--max-depth"));
        assert!(text.contains("   1. https://www.reddit.com/r/HFY/comments/1\n"));
        assert!(text.contains("  10. https://www.reddit.com/r/HFY/comments/10\n"));
    }

    #[test]
    fn test_describe_event_mentions_details() {
        colored::control::set_override(false);
        let line = describe_event(&WalkEvent::Visiting {
            depth: 2,
            url: "https://x/y".to_string(),
        });
        assert_eq!(line, "→ [3] https://x/y");

        let line = describe_event(&WalkEvent::Finished {
            posts: 4,
            stop: StopReason::Exhausted,
        });
        assert!(line.contains("Found 4 post(s)"));
    }

    #[tokio::test]
    async fn test_execute_walk_rejects_bad_seed() {
        let result = execute_walk(WalkOptions::new("not a url"), None, std::future::pending()).await;
        assert!(matches!(result, Err(WalkError::Scanner(ScanError::InvalidUrl(_)))));
    }
}
