//! HTML parser for extracting page text and link candidates
//!
//! This module handles parsing HTML content to extract:
//! - Page title
//! - Visible body text, used for relevance scoring
//! - Links to consider, with their anchor text and surrounding context

use crate::url::absolute_href;
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Maximum characters of context kept around a link
const SURROUNDING_TEXT_CHARS: usize = 200;

/// Elements whose text never reaches the reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A link as it appears on a page
#[derive(Debug, Clone, PartialEq)]
pub struct RawLink {
    /// Absolute URL of the link target, path as written
    pub href: String,
    pub anchor_text: String,
    /// Text of the element enclosing the link
    pub surrounding_text: String,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text with whitespace collapsed
    pub text: String,

    /// Links found on the page, in order of appearance
    pub links: Vec<RawLink>,
}

/// Parses HTML content and extracts text and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Returns
///
/// * `Ok(ParsedPage)` - Successfully parsed page
/// * `Err(ParseError)` - The document is empty
///
/// # Example
///
/// ```no_run
/// use rufus::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> Result<ParsedPage, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError {
            url: base_url.to_string(),
            message: "empty document".to_string(),
        });
    }

    let document = Html::parse_document(html);

    Ok(ParsedPage {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url),
    })
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Collects visible text, skipping scripts, styles and the head
fn extract_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<RawLink> {
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute_url) = absolute_href(href, base_url) else {
            continue;
        };

        links.push(RawLink {
            href: absolute_url.to_string(),
            anchor_text: collapse_whitespace(&element.text().collect::<String>()),
            surrounding_text: surrounding_text(&element),
        });
    }

    links
}

/// Text of the link's parent element, bounded in length
fn surrounding_text(element: &ElementRef) -> String {
    let text = element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| collapse_whitespace(&parent.text().collect::<String>()))
        .unwrap_or_default();

    match text.char_indices().nth(SURROUNDING_TEXT_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
