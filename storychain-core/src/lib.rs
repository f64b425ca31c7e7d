pub mod book;
pub mod crawl;
pub mod embed;
pub mod error;
pub mod scorer;
pub mod state;
pub mod walker;

pub use book::{Book, Chapter, OutputFormat, export_book};
pub use crawl::{WalkOptions, describe_event, execute_walk, generate_chain_report};
pub use embed::{Embedder, EmbedderKind, HashingEmbedder, cosine_similarity};
pub use error::{EmbedError, ExportError, WalkError};
pub use scorer::{CandidateScorer, ScoreBreakdown, SignalWeights};
pub use state::{Candidate, ChainState};
pub use walker::{ChainWalker, StopReason, WalkEvent, WalkProgressCallback, WalkReport};
