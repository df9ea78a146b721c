use crate::config::types::{Config, SectionEntry};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forum_archiver::config::load_config;
///
/// let config = load_config(Path::new("forum.toml")).unwrap();
/// println!("Sections: {}", config.sections.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that runs against different configurations can be
/// told apart in the logs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Parses a comma-separated list of section indices (e.g., "0,1,5")
pub fn parse_section_indices(raw: &str) -> Result<Vec<usize>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                ConfigError::Validation(format!("Invalid section index '{}'", part))
            })
        })
        .collect()
}

/// Resolves the sections selected for a run
///
/// `None` selects every configured section in file order; otherwise the
/// indices are applied in the order given.
pub fn select_sections(
    config: &Config,
    indices: Option<&[usize]>,
) -> Result<Vec<SectionEntry>, ConfigError> {
    let Some(indices) = indices else {
        return Ok(config.sections.clone());
    };

    indices
        .iter()
        .map(|&index| {
            config
                .sections
                .get(index)
                .cloned()
                .ok_or(ConfigError::SectionIndex {
                    index,
                    count: config.sections.len(),
                })
        })
        .collect()
}
