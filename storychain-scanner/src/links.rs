//! URL and identity helpers shared by the fetcher, the walker and the post client.

use url::Url;

/// Normalize a URL for comparison and storage.
///
/// Drops the fragment and every trailing `/`, so `https://x/y#frag`,
/// `https://x/y/` and `https://x/y` all map to `https://x/y`.
pub fn normalize_url(url: &str) -> String {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    without_fragment.trim_end_matches('/').to_string()
}

/// Resolve a possibly-relative `href` against `base` and normalize the result.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    // Skip empty, javascript:, mailto:, tel:, etc.
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    Some(normalize_url(resolved.as_str()))
}

/// Sub-community named by a `/r/<name>/...` path, lowercased.
pub fn sub_community_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "r" {
            return segments
                .next()
                .filter(|name| !name.is_empty())
                .map(|name| name.to_ascii_lowercase());
        }
    }
    None
}

/// Canonical form of a user identity: trimmed, without a `u/` or `/u/` prefix.
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("/u/")
        .or_else(|| trimmed.strip_prefix("u/"))
        .unwrap_or(trimmed)
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Case-insensitive identity comparison.
pub fn same_identity(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_fragment_and_trailing_slash() {
        assert_eq!(normalize_url("https://x/y#frag"), "https://x/y");
        assert_eq!(normalize_url("https://x/y/"), "https://x/y");
        assert_eq!(normalize_url("https://x/y/#frag"), "https://x/y");
        assert_eq!(normalize_url("https://x/y"), "https://x/y");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for url in [
            "https://x/y//",
            "https://www.reddit.com/r/HFY/comments/abc/part_2/#c1",
            "https://x/",
            "relative/path/",
        ] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_resolve_relative_link() {
        let resolved = resolve_url(
            "https://www.reddit.com/r/HFY/comments/abc/part_1",
            "/r/HFY/comments/def/part_2/",
        );
        assert_eq!(
            resolved.as_deref(),
            Some("https://www.reddit.com/r/HFY/comments/def/part_2")
        );
    }

    #[test]
    fn test_resolve_skips_non_navigational_links() {
        let base = "https://www.reddit.com/r/HFY";
        assert_eq!(resolve_url(base, ""), None);
        assert_eq!(resolve_url(base, "#top"), None);
        assert_eq!(resolve_url(base, "javascript:void(0)"), None);
        assert_eq!(resolve_url(base, "mailto:someone@example.com"), None);
    }

    #[test]
    fn test_sub_community_of() {
        assert_eq!(
            sub_community_of("https://www.reddit.com/r/HFY/comments/abc/x").as_deref(),
            Some("hfy")
        );
        assert_eq!(sub_community_of("https://www.reddit.com/user/someone"), None);
        assert_eq!(sub_community_of("not a url"), None);
    }

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity(" u/Alice ").as_deref(), Some("Alice"));
        assert_eq!(normalize_identity("/u/Bob").as_deref(), Some("Bob"));
        assert_eq!(normalize_identity("Carol").as_deref(), Some("Carol"));
        assert_eq!(normalize_identity("u/"), None);
        assert!(same_identity("alice", "Alice"));
    }
}
