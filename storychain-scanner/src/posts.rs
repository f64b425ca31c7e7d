//! Per-post JSON client: resolves a thread URL into its title, author and body.

use crate::error::{Result, ScanError};
use crate::fetcher::FetcherConfig;
use crate::links::normalize_url;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One story post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub url: String,
    pub title: String,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    title: String,
    #[serde(default)]
    selftext: String,
    author: String,
}

/// Callback for posts that were skipped, with the reason.
pub type SkippedPostCallback<'a> = &'a (dyn Fn(&str, &ScanError) + Send + Sync);

pub struct PostClient {
    client: Client,
}

impl PostClient {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
        })
    }

    /// Endpoint serving the post listing for `url`.
    pub fn json_endpoint(url: &str) -> String {
        format!("{}/.json", normalize_url(url))
    }

    /// Fetch a single post. Posts with an empty body are an error.
    pub async fn fetch_post(&self, url: &str) -> Result<Post> {
        let endpoint = Self::json_endpoint(url);
        debug!("Fetching post {}", endpoint);

        let bytes = self
            .client
            .get(&endpoint)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let listings: Vec<Listing> = serde_json::from_slice(&bytes)
            .map_err(|e| ScanError::ParseError(format!("{}: {}", endpoint, e)))?;

        let data = listings
            .into_iter()
            .next()
            .and_then(|listing| listing.data.children.into_iter().next())
            .map(|child| child.data)
            .ok_or_else(|| ScanError::ParseError(format!("{}: no post in listing", endpoint)))?;

        let body = data.selftext.trim();
        if body.is_empty() {
            return Err(ScanError::EmptyPost(url.to_string()));
        }

        Ok(Post {
            url: normalize_url(url),
            title: data.title,
            author: data.author,
            body: body.to_string(),
        })
    }

    /// Fetch every post in order, skipping the ones that fail or are empty.
    pub async fn fetch_posts(
        &self,
        urls: &[String],
        on_skip: Option<SkippedPostCallback<'_>>,
    ) -> Vec<Post> {
        let mut posts = Vec::with_capacity(urls.len());
        for url in urls {
            match self.fetch_post(url).await {
                Ok(post) => posts.push(post),
                Err(e) => match on_skip {
                    Some(callback) => callback(url, &e),
                    None => warn!("Skipping {}: {}", url, e),
                },
            }
        }
        posts
    }
}
