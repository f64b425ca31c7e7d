pub mod error;
pub mod fetcher;
pub mod links;
pub mod page;
pub mod posts;

pub use error::ScanError;
pub use fetcher::{FetcherConfig, PageFetcher, PageSource};
pub use links::normalize_url;
pub use page::{Page, PageRules, RawLink};
pub use posts::{Post, PostClient};
