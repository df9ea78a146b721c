use url::Url;

/// Link prefixes that never lead to a navigable page
const NON_NAVIGABLE_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Resolves a raw link found in a page into an absolute crawlable URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject empty links
/// 2. Reject bare fragments (`#top`) and non-navigable schemes
/// 3. Resolve relative links against `base`
/// 4. Drop the fragment
/// 5. Accept only `http` and `https` results
///
/// Query parameters are kept in their original order: forum URLs carry
/// their identity in the query string.
///
/// # Examples
///
/// ```
/// use forum_archiver::url::normalize;
/// use url::Url;
///
/// let base = Url::parse("https://forum.example.com/?f=10").unwrap();
/// let url = normalize("?t=42#entry", &base).unwrap();
/// assert_eq!(url.as_str(), "https://forum.example.com/?t=42");
/// assert!(normalize("javascript:void(0)", &base).is_none());
/// ```
pub fn normalize(link: &str, base: &Url) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() || link.starts_with('#') {
        return None;
    }

    let lowered = link.to_ascii_lowercase();
    if NON_NAVIGABLE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return None;
    }

    let mut url = base.join(link).ok()?;
    url.set_fragment(None);

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}
