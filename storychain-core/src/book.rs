//! Turns fetched posts into a book: Markdown, JSON, or anything pandoc can write.

use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use storychain_scanner::Post;
use tracing::{debug, info};

const CHAPTER_SEPARATOR: &str = "\n\n\\newpage\n\n";
const BOOK_CSS: &str = "body { font-family: serif; margin: 5%; line-height: 1.6; }";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Title is the shared word prefix of the chapter titles, author the most frequent one.
    pub fn assemble(posts: &[Post]) -> Self {
        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        let authors: Vec<&str> = posts.iter().map(|p| p.author.as_str()).collect();
        Self {
            title: common_title_prefix(&titles),
            author: majority_author(&authors),
            chapters: posts
                .iter()
                .map(|p| Chapter {
                    title: p.title.clone(),
                    author: p.author.clone(),
                    body: p.body.clone(),
                })
                .collect(),
        }
    }

    pub fn to_markdown(&self) -> String {
        self.chapters
            .iter()
            .map(|c| format!("# {}\n\n*by u/{}*\n\n{}", c.title, c.author, c.body))
            .collect::<Vec<_>>()
            .join(CHAPTER_SEPARATOR)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Default output file name for `format`.
    pub fn file_name(&self, format: &OutputFormat) -> String {
        format!("{}.{}", slug(&self.title), format.extension())
    }
}

/// Output formats. Anything not handled natively goes through pandoc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Json,
    Pandoc(String),
}

impl OutputFormat {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => OutputFormat::Markdown,
            "json" => OutputFormat::Json,
            other => OutputFormat::Pandoc(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Pandoc(name) => name,
        }
    }
}

/// Longest shared word prefix of `titles`, title-cased, or "Untitled".
pub fn common_title_prefix(titles: &[&str]) -> String {
    let split: Vec<Vec<String>> = titles.iter().map(|t| words(t)).collect();
    let Some(first) = split.first() else {
        return "Untitled".to_string();
    };

    let mut shared = first.len();
    for (i, word) in first.iter().enumerate() {
        if split.iter().any(|s| s.get(i) != Some(word)) {
            shared = i;
            break;
        }
    }

    let prefix = first[..shared]
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ");
    if prefix.is_empty() {
        "Untitled".to_string()
    } else {
        prefix
    }
}

/// Most frequent author; the first one seen wins ties.
pub fn majority_author(authors: &[&str]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for author in authors {
        *counts.entry(*author).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for author in authors {
        let count = counts[author];
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((*author, count));
        }
    }
    best.map(|(a, _)| a.to_string())
        .unwrap_or_else(|| "Anonymous".to_string())
}

/// Lowercase ASCII slug suitable for a file name.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}

fn words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Write `book` to `output` in `format`. `cover` is only used for EPUB.
pub fn export_book(
    book: &Book,
    format: &OutputFormat,
    output: &Path,
    cover: Option<&Path>,
) -> Result<PathBuf, ExportError> {
    if book.chapters.is_empty() {
        return Err(ExportError::EmptyBook);
    }

    match format {
        OutputFormat::Markdown => fs::write(output, book.to_markdown())?,
        OutputFormat::Json => fs::write(output, book.to_json()?)?,
        OutputFormat::Pandoc(name) => run_pandoc(book, name, output, cover)?,
    }

    info!("Wrote {} chapter(s) to {}", book.chapters.len(), output.display());
    Ok(output.to_path_buf())
}

fn run_pandoc(
    book: &Book,
    format: &str,
    output: &Path,
    cover: Option<&Path>,
) -> Result<(), ExportError> {
    let workdir = tempfile::tempdir()?;
    fs::write(workdir.path().join("in.md"), book.to_markdown())?;
    fs::write(workdir.path().join("style.css"), BOOK_CSS)?;

    let mut command = pandoc_command(book, format, output, cover, workdir.path())?;
    debug!("Running {:?}", command);
    let result = command.output().map_err(ExportError::PandocUnavailable)?;
    if !result.status.success() {
        return Err(ExportError::Pandoc {
            path: output.to_path_buf(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Pandoc invocation that turns `workdir/in.md` into `output`.
fn pandoc_command(
    book: &Book,
    format: &str,
    output: &Path,
    cover: Option<&Path>,
    workdir: &Path,
) -> std::io::Result<Command> {
    // pandoc runs inside the temp dir, so every user path must be absolute.
    let output = std::path::absolute(output)?;

    let mut command = Command::new("pandoc");
    command
        .current_dir(workdir)
        .arg("in.md")
        .arg("--from=markdown")
        .arg(format!("--metadata=title:{}", book.title))
        .arg(format!("--metadata=author:{}", book.author))
        .args(["--toc", "--toc-depth=2", "--css=style.css", "--split-level=1"])
        .arg("--output")
        .arg(&output);
    // pandoc picks its PDF engine from the output extension
    if format != "pdf" {
        command.arg(format!("--to={}", format));
    }
    if format == "epub" {
        if let Some(cover) = cover {
            let cover = std::path::absolute(cover)?;
            command.arg(format!("--epub-cover-image={}", cover.display()));
        }
    }
    Ok(command)
}
