use crate::links::{collapse_whitespace, normalize_identity, resolve_url, sub_community_of};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static OG_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector")
});
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));

/// An outgoing link that has the shape of a discussion thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    /// Normalized absolute target.
    pub url: String,
    /// Visible text, whitespace-collapsed.
    pub text: String,
    pub author: Option<String>,
    pub sub_community: Option<String>,
}

impl RawLink {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            author: None,
            sub_community: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_sub_community(mut self, sub_community: impl Into<String>) -> Self {
        self.sub_community = Some(sub_community.into());
        self
    }
}

/// What the fetcher learned from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Thread-shaped links in document order.
    pub links: Vec<RawLink>,
    /// Identity behind the first profile link on the page.
    pub original_poster: Option<String>,
    pub title: Option<String>,
}

impl Page {
    pub fn with_links(links: Vec<RawLink>) -> Self {
        Self {
            links,
            ..Self::default()
        }
    }

    pub fn with_original_poster(mut self, original_poster: impl Into<String>) -> Self {
        self.original_poster = Some(original_poster.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Site conventions the parser relies on.
#[derive(Debug, Clone)]
pub struct PageRules {
    /// Substring every discussion-thread URL contains.
    pub thread_marker: String,
    /// `href` prefix of user profile links.
    pub profile_prefix: String,
    /// Link texts longer than this (in characters) are noise.
    pub max_link_text: usize,
}

impl Default for PageRules {
    fn default() -> Self {
        Self {
            thread_marker: "/comments/".to_string(),
            profile_prefix: "/user/".to_string(),
            max_link_text: 120,
        }
    }
}

/// Parse `html` served at `page_url` into a [`Page`].
pub fn parse_page(html: &str, page_url: &str, rules: &PageRules) -> Page {
    let document = Html::parse_document(html);
    let mut page = Page {
        title: extract_title(&document),
        ..Page::default()
    };

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if page.original_poster.is_none() && href.starts_with(&rules.profile_prefix) {
            page.original_poster = normalize_identity(&element.text().collect::<String>());
        }

        let Some(url) = resolve_url(page_url, href) else {
            continue;
        };
        if !url.contains(&rules.thread_marker) {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<String>());
        if text.is_empty() || text.chars().count() > rules.max_link_text {
            debug!("Dropping link {} with unusable text ({} chars)", url, text.len());
            continue;
        }

        let sub_community =
            sub_community_of(&url).or_else(|| ancestor_attr(&element, &["data-subreddit"]));
        let author = ancestor_attr(&element, &["data-author", "author"])
            .and_then(|raw| normalize_identity(&raw));

        page.links.push(RawLink {
            url,
            text,
            author,
            sub_community: sub_community.map(|s| s.to_ascii_lowercase()),
        });
    }

    page
}

fn extract_title(document: &Html) -> Option<String> {
    let og_title = document
        .select(&OG_TITLE_SELECTOR)
        .find_map(|meta| meta.value().attr("content").map(collapse_whitespace));
    og_title
        .or_else(|| {
            document
                .select(&TITLE_SELECTOR)
                .next()
                .map(|title| collapse_whitespace(&title.text().collect::<String>()))
        })
        .filter(|title| !title.is_empty())
}

/// First value of any of `names` on the element itself or its nearest ancestor.
fn ancestor_attr(element: &ElementRef, names: &[&str]) -> Option<String> {
    let own = element.value();
    let chain = std::iter::once(own).chain(
        element
            .ancestors()
            .filter_map(|node| node.value().as_element()),
    );
    for el in chain {
        for name in names {
            if let Some(value) = el.attr(name).map(str::trim).filter(|v| !v.is_empty()) {
                return Some(value.to_string());
            }
        }
    }
    None
}
