use std::path::PathBuf;
use storychain_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Embedding backend failed: {0}")]
    Backend(String),

    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum WalkError {
    #[error(transparent)]
    Embedder(#[from] EmbedError),

    #[error(transparent)]
    Scanner(#[from] ScanError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No chapters to export")]
    EmptyBook,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not run pandoc: {0}")]
    PandocUnavailable(#[source] std::io::Error),

    #[error("Pandoc failed writing {path}: {stderr}")]
    Pandoc { path: PathBuf, stderr: String },
}
