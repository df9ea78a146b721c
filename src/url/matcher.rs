/// Checks if a host matches a forum domain pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact match: "forum.example.com" matches only "forum.example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any
///    subdomain of it
///
/// Comparison is case-insensitive.
///
/// # Examples
///
/// ```
/// use forum_archiver::url::matches_wildcard;
///
/// assert!(matches_wildcard("forum.example.com", "FORUM.example.com"));
/// assert!(!matches_wildcard("forum.example.com", "example.com"));
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "a.b.example.com"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("forum.example.com", "forum.example.com"));
        assert!(!matches_wildcard("forum.example.com", "www.forum.example.com"));
        assert!(!matches_wildcard("forum.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(matches_wildcard("*.forumfree.it", "forumfree.it"));
        assert!(matches_wildcard("*.forumfree.it", "board.forumfree.it"));
        assert!(!matches_wildcard("*.forumfree.it", "forumfree.it.evil.com"));
        assert!(!matches_wildcard("*.forumfree.it", "notforumfree.it"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_wildcard("Forum.Example.com", "forum.EXAMPLE.com"));
        assert!(matches_wildcard("*.EXAMPLE.com", "Board.example.COM"));
    }
}
