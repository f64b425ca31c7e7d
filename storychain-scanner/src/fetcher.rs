use crate::error::{Result, ScanError};
use crate::page::{Page, PageRules, parse_page};
use reqwest::Client;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Anything that can turn a URL into a parsed [`Page`].
pub trait PageSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Page>> + Send;
}

/// HTTP client settings shared by the page fetcher and the post client.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub rules: PageRules,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("storychain/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
            rules: PageRules::default(),
        }
    }
}

impl FetcherConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .connect_timeout(self.timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(client)
    }
}

/// Fetches forum pages over HTTP and extracts their thread links.
pub struct PageFetcher {
    client: Client,
    rules: PageRules,
}

impl PageFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            rules: config.rules.clone(),
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("Fetching {}", url);
        let start = Instant::now();
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!("Fetched {} ({} bytes in {:?})", url, body.len(), start.elapsed());

        Ok(body)
    }
}

impl PageSource for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        let html = self.fetch_html(url).await?;
        // Parsed synchronously so the non-Send DOM never lives across an await.
        let page = parse_page(&html, url, &self.rules);
        debug!(
            "{}: {} thread link(s), original poster {:?}",
            url,
            page.links.len(),
            page.original_poster
        );
        Ok(page)
    }
}
