use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use storychain_core::book::{Book, OutputFormat, export_book};
use storychain_core::embed::EmbedderKind;
use storychain_core::walker::{StopReason, WalkReport};
use storychain_scanner::{FetcherConfig, PostClient, ScanError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

pub use storychain_core::crawl::{WalkOptions, execute_walk, generate_chain_report};

const DEFAULT_EDITOR: &str = "nano";

/// Install the global log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// Helper functions for URL lists

/// Load URLs from either a list file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    list_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(list_file) = list_file {
        load_urls_from_file(list_file)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either a URL or --from-list must be provided".to_string())
    }
}

/// Load and parse URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read URL list {}: {}", path.display(), e))?;

    let urls = parse_url_list(&content);
    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse newline-delimited URLs, skipping blanks and `#` comments
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect()
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line) {
        if matches!(url.scheme(), "http" | "https") {
            return Some(line.to_string());
        }
    }

    let with_scheme = format!("https://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|u| u.host_str().is_some_and(|h| h.contains('.'))) {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow().bold(), line);
    None
}

/// Write one URL per line
pub fn write_url_list(path: &Path, urls: &[String]) -> std::io::Result<()> {
    let mut content = urls.join("\n");
    content.push('\n');
    fs::write(path, content)
}

/// Let the user fix up `urls` in `$EDITOR` (default nano).
pub fn edit_url_list(urls: &[String]) -> anyhow::Result<Vec<String>> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
    edit_url_list_with(&editor, urls)
}

/// Same as [`edit_url_list`] with an explicit editor command line.
pub fn edit_url_list_with(editor: &str, urls: &[String]) -> anyhow::Result<Vec<String>> {
    let mut file = tempfile::Builder::new()
        .prefix("storychain-")
        .suffix(".txt")
        .tempfile()
        .context("Failed to create a temporary URL list")?;
    writeln!(file, "# One post URL per line, in reading order. Lines starting with # are ignored.")?;
    for url in urls {
        writeln!(file, "{}", url)?;
    }
    file.flush()?;

    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or(DEFAULT_EDITOR);
    debug!("Opening URL list in {}", editor);
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to launch editor '{}'", program))?;
    if !status.success() {
        bail!("Editor '{}' exited with {}", program, status);
    }

    // Editors may replace the file, so re-read by path.
    let content = fs::read_to_string(file.path())?;
    let edited = parse_url_list(&content);
    if edited.is_empty() {
        bail!("URL list is empty after editing");
    }
    Ok(edited)
}

/// Build walk options for `seed` from the shared walk flags.
pub fn walk_options_from_args(
    seed: &str,
    args: &ArgMatches,
    quiet: bool,
) -> anyhow::Result<WalkOptions> {
    let mut options = WalkOptions::new(seed);

    if let Some(depth) = args.get_one::<usize>("max-depth") {
        options.max_depth = *depth;
    }
    if let Some(threshold) = args.get_one::<f32>("threshold") {
        options.threshold = *threshold;
    }
    if let Some(embedder) = args.get_one::<String>("embedder") {
        options.embedder = embedder
            .parse::<EmbedderKind>()
            .map_err(anyhow::Error::msg)?;
    }
    options.fetcher = fetcher_config_from_args(args);
    options.show_progress_bars = !quiet;

    Ok(options)
}

pub fn fetcher_config_from_args(args: &ArgMatches) -> FetcherConfig {
    let mut config = FetcherConfig::default();
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config = config.with_timeout(Duration::from_secs(*timeout));
    }
    if let Some(user_agent) = args.get_one::<String>("user-agent") {
        config = config.with_user_agent(user_agent.clone());
    }
    config
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// The user asked the command to stop.
#[derive(Debug, Error)]
#[error("Interrupted")]
pub struct Interrupted;

/// Ctrl-C latch shared by every stage of a command. Once triggered it stays
/// triggered, so each later stage stops as soon as it is awaited.
#[derive(Debug, Clone)]
pub struct Shutdown {
    requested: watch::Receiver<bool>,
}

impl Shutdown {
    /// A latch plus the sender that trips it.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { requested: rx })
    }

    /// Trips on Ctrl-C for the rest of the process. Must be called inside a runtime.
    pub fn ctrl_c() -> Self {
        let (tx, shutdown) = Self::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx.send(true);
                }
                Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
            }
            // the latch must outlive the listener
            std::future::pending::<()>().await;
        });
        shutdown
    }

    pub fn is_requested(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolves once shutdown is requested.
    pub async fn requested(&self) {
        let mut rx = self.requested.clone();
        let closed = rx.wait_for(|stop| *stop).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Run `task` unless shutdown is requested first.
    pub async fn guard<T>(&self, task: impl Future<Output = T>) -> anyhow::Result<T> {
        tokio::select! {
            biased;
            _ = self.requested() => Err(Interrupted.into()),
            out = task => Ok(out),
        }
    }
}

async fn walk_chain(
    seed: &Url,
    args: &ArgMatches,
    quiet: bool,
    shutdown: &Shutdown,
) -> anyhow::Result<WalkReport> {
    let options = walk_options_from_args(seed.as_str(), args, quiet)?;

    if !quiet {
        println!("\n📖 Following story from {}", seed.as_str().bright_white());
        println!("Max depth: {}", options.max_depth);
        println!("Embedder: {}\n", options.embedder.as_str());
    }

    let report = execute_walk(options, None, shutdown.requested())
        .await
        .context("Walk failed")?;

    if !quiet {
        println!("\n{} Walk complete!\n", "✓".green().bold());
    }
    print!("{}", generate_chain_report(&report));

    Ok(report)
}

/// Ctrl-C stops the walk; the partial chain is still printed and saved.
pub async fn handle_crawl(
    sub_matches: &ArgMatches,
    quiet: bool,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    let Some(url) = sub_matches.get_one::<Url>("URL") else {
        bail!("A URL is required");
    };
    let output = sub_matches.get_one::<PathBuf>("output").map(|p| expand_path(p));

    let chain = walk_chain(url, sub_matches, quiet, shutdown).await?.chain;

    if let Some(path) = output {
        write_url_list(&path, &chain)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "\n{} Saved {} URL(s) to {}",
            "✓".green().bold(),
            chain.len(),
            path.display().to_string().bright_white()
        );
    }

    Ok(())
}

/// Ctrl-C at any stage aborts the export with [`Interrupted`].
pub async fn handle_export(
    sub_matches: &ArgMatches,
    quiet: bool,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    let url = sub_matches.get_one::<Url>("URL");
    let list_file = sub_matches.get_one::<PathBuf>("from-list").map(|p| expand_path(p));
    let format = OutputFormat::parse(
        sub_matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("epub"),
    );
    let cover = sub_matches.get_one::<PathBuf>("cover").map(|p| expand_path(p));
    let output = sub_matches.get_one::<PathBuf>("output").map(|p| expand_path(p));

    let mut urls = match (&list_file, url) {
        (None, Some(seed)) => {
            let report = walk_chain(seed, sub_matches, quiet, shutdown).await?;
            if report.stop == StopReason::Cancelled {
                return Err(Interrupted.into());
            }
            report.chain
        }
        _ => load_urls_from_source(url, list_file.as_ref()).map_err(anyhow::Error::msg)?,
    };

    if sub_matches.get_flag("edit") {
        urls = edit_url_list(&urls)?;
        if shutdown.is_requested() {
            return Err(Interrupted.into());
        }
    }

    if !quiet {
        println!("\n{} Fetching {} post(s)...", "→".blue(), urls.len());
    }
    let client = PostClient::new(&fetcher_config_from_args(sub_matches))?;
    let on_skip = |url: &str, error: &ScanError| {
        if !quiet {
            println!("{} Skipping {}: {}", "⚠".yellow().bold(), url, error);
        }
    };
    let posts = shutdown
        .guard(client.fetch_posts(&urls, Some(&on_skip)))
        .await?;
    if posts.is_empty() {
        bail!("None of the {} post(s) could be fetched", urls.len());
    }

    let book = Book::assemble(&posts);
    let path = output.unwrap_or_else(|| PathBuf::from(book.file_name(&format)));
    let target = path.clone();
    // pandoc can take a while, so keep it off the runtime and raceable
    let export = tokio::task::spawn_blocking(move || {
        export_book(&book, &format, &path, cover.as_deref()).map(|written| (book, written))
    });
    let (book, written) = shutdown
        .guard(export)
        .await??
        .with_context(|| format!("Failed to export {}", target.display()))?;

    println!(
        "\n{} \"{}\" by u/{}: {} chapter(s) written to {}",
        "✓".green().bold(),
        book.title.bright_white(),
        book.author,
        book.chapters.len(),
        written.display().to_string().bright_white()
    );

    Ok(())
}

