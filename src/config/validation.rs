use crate::archive::safe_filename;
use crate::config::types::{Config, CrawlerConfig, ForumConfig, SectionEntry};
use crate::url::classify;
use crate::ConfigError;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_forum_config(&config.forum)?;
    validate_crawler_config(&config.crawler)?;
    validate_sections(&config.sections, &config.forum)?;
    Ok(())
}

/// Converts a delay in seconds, as given on the command line, to milliseconds
///
/// Negative, NaN and out-of-range values are rejected.
pub fn delay_ms_from_secs(secs: f64) -> Result<u64, ConfigError> {
    let delay = Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Validation(format!("Invalid delay '{}': {}", secs, e)))?;
    u64::try_from(delay.as_millis())
        .map_err(|_| ConfigError::Validation(format!("Delay '{}' is too large", secs)))
}

/// Validates the forum URL scheme
fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    validate_domain_pattern(&config.domain)?;

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be greater than 0".to_string(),
        ));
    }

    for (name, value) in [
        ("thread-param", &config.thread_param),
        ("section-param", &config.section_param),
        ("offset-param", &config.offset_param),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates crawl timing settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("page-load-timeout-ms", config.page_load_timeout_ms),
        ("settle-timeout-ms", config.settle_timeout_ms),
        ("asset-timeout-ms", config.asset_timeout_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }

    if config.persist_every == 0 {
        return Err(ConfigError::Validation(
            "persist-every must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the section list against the forum scheme
fn validate_sections(sections: &[SectionEntry], forum: &ForumConfig) -> Result<(), ConfigError> {
    if sections.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[sections]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    // Directory name, lowercased for case-insensitive filesystems
    let mut directories: HashMap<String, &str> = HashMap::new();
    for section in sections {
        if section.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "section name cannot be empty".to_string(),
            ));
        }

        if !names.insert(section.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate section name '{}'",
                section.name
            )));
        }

        let directory = safe_filename(&section.name);
        if let Some(other) = directories.insert(directory.to_lowercase(), &section.name) {
            return Err(ConfigError::Validation(format!(
                "sections '{}' and '{}' share the archive directory '{}'",
                other, section.name, directory
            )));
        }

        let url = Url::parse(&section.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid section URL '{}': {}", section.url, e))
        })?;

        let class = classify(&url, forum);
        if !class.in_domain {
            return Err(ConfigError::Validation(format!(
                "Section '{}' URL is outside the forum domain '{}'",
                section.name, forum.domain
            )));
        }

        if class.section_id.is_none() {
            return Err(ConfigError::Validation(format!(
                "Section '{}' URL has no '{}' parameter",
                section.name, forum.section_param
            )));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'forum.example.com')",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config_with_sections(sections: &str) -> String {
        format!(
            "[forum]\ndomain = \"forum.example.com\"\n\n{}",
            sections
        )
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("127.0.0.1").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern("example").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("exa mple.com").is_err());
    }

    #[test]
    fn test_rejects_empty_section_list() {
        let result = parse_config(&config_with_sections(""));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_section_outside_domain() {
        let result = parse_config(&config_with_sections(
            "[[sections]]\nname = \"A\"\nurl = \"https://other.org/?f=1\"\n",
        ));
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("outside")));
    }

    #[test]
    fn test_rejects_section_without_section_param() {
        let result = parse_config(&config_with_sections(
            "[[sections]]\nname = \"A\"\nurl = \"https://forum.example.com/?t=1\"\n",
        ));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_duplicate_section_names() {
        let result = parse_config(&config_with_sections(
            "[[sections]]\nname = \"A\"\nurl = \"https://forum.example.com/?f=1\"\n\n\
             [[sections]]\nname = \"A\"\nurl = \"https://forum.example.com/?f=2\"\n",
        ));
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_rejects_sections_sharing_a_directory() {
        let result = parse_config(&config_with_sections(
            "[[sections]]\nname = \"Q&A?\"\nurl = \"https://forum.example.com/?f=1\"\n\n\
             [[sections]]\nname = \"Q&A*\"\nurl = \"https://forum.example.com/?f=2\"\n",
        ));
        assert!(
            matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("share the archive directory"))
        );

        let result = parse_config(&config_with_sections(
            "[[sections]]\nname = \"News\"\nurl = \"https://forum.example.com/?f=1\"\n\n\
             [[sections]]\nname = \"news\"\nurl = \"https://forum.example.com/?f=2\"\n",
        ));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_delay_ms_from_secs() {
        assert_eq!(delay_ms_from_secs(1.5).unwrap(), 1500);
        assert_eq!(delay_ms_from_secs(0.0).unwrap(), 0);
        assert!(delay_ms_from_secs(-1.0).is_err());
        assert!(delay_ms_from_secs(f64::NAN).is_err());
        assert!(delay_ms_from_secs(f64::INFINITY).is_err());
    }

    #[test]
    fn test_rejects_zero_persist_interval() {
        let result = parse_config(
            "[forum]\ndomain = \"forum.example.com\"\n\n[crawler]\npersist-every = 0\n\n\
             [[sections]]\nname = \"A\"\nurl = \"https://forum.example.com/?f=1\"\n",
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
