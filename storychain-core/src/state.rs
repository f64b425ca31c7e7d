use crate::scorer::first_number;
use storychain_scanner::RawLink;
use storychain_scanner::links::normalize_identity;
use storychain_scanner::normalize_url;

/// Running context of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    pub last_title: Option<String>,
    pub last_numeric_index: Option<u32>,
    pub last_sub_community: Option<String>,
    /// Set once, from the first page exposing it.
    pub original_poster: Option<String>,
}

impl ChainState {
    /// Record the original poster unless one is already known. Returns true if it was set.
    pub fn record_original_poster(&mut self, candidate: Option<&str>) -> bool {
        if self.original_poster.is_some() {
            return false;
        }
        match candidate.and_then(normalize_identity) {
            Some(op) => {
                self.original_poster = Some(op);
                true
            }
            None => false,
        }
    }

    /// Seed the title signals from a page title while no chapter title is known yet.
    pub fn prime_from_title(&mut self, title: &str) {
        if self.last_title.is_some() || title.trim().is_empty() {
            return;
        }
        self.last_title = Some(title.trim().to_string());
        if let Some(n) = first_number(title) {
            self.last_numeric_index = Some(n);
        }
    }

    /// Move the state onto the chosen next chapter.
    pub fn advance(&mut self, selected: &Candidate) {
        self.last_title = Some(selected.text.clone());
        if let Some(n) = first_number(&selected.text) {
            self.last_numeric_index = Some(n);
        }
        if let Some(ref sub) = selected.sub_community {
            self.last_sub_community = Some(sub.clone());
        }
    }
}

/// One outgoing link under consideration as the next chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub text: String,
    pub author: Option<String>,
    pub sub_community: Option<String>,
    pub score: u32,
}

impl From<RawLink> for Candidate {
    fn from(link: RawLink) -> Self {
        Self {
            url: normalize_url(&link.url),
            text: link.text,
            author: link.author,
            sub_community: link.sub_community,
            score: 0,
        }
    }
}
