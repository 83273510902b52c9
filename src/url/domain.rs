use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use rufus::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if `candidate` is served by the same origin host as `seed`
///
/// Ports are compared too, so two local test servers on different ports are
/// different sites.
pub fn is_same_host(seed: &Url, candidate: &Url) -> bool {
    match (extract_domain(seed), extract_domain(candidate)) {
        (Some(a), Some(b)) => {
            a == b && seed.port_or_known_default() == candidate.port_or_known_default()
        }
        _ => false,
    }
}
