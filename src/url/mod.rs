//! URL handling module for Rufus
//!
//! This module provides URL normalization, href resolution and crawl scope checks.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_host};
pub use normalize::{normalize_parsed, normalize_url};

use ::url::Url;

/// Completes a user-supplied start URL and normalizes it
///
/// A missing scheme defaults to `https://`, so `example.com/docs` is accepted.
pub fn parse_start_url(input: &str) -> crate::UrlResult<Url> {
    normalize_parsed(complete_start_url(input)?)
}

/// Completes a user-supplied start URL without normalizing its path
///
/// This is the address to request; [`parse_start_url`] gives the key it is
/// deduplicated under.
pub fn complete_start_url(input: &str) -> crate::UrlResult<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(crate::UrlError::Parse("empty URL".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| crate::UrlError::Parse(e.to_string()))?;
    // Scheme and host checks are shared with normalization
    normalize_parsed(url.clone())?;
    url.set_fragment(None);
    Ok(url)
}

/// Resolves an href found on `base` into the absolute URL it points at
///
/// Only the fragment is dropped; the path keeps its trailing slash.
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn absolute_href(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut joined = base.join(href).ok()?;
    if !matches!(joined.scheme(), "http" | "https") || joined.host_str().is_none() {
        return None;
    }
    joined.set_fragment(None);
    Some(joined)
}
