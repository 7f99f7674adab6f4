//! Process-level configuration for a [`crate::RepositoryContext`].
//!
//! Loaded from a TOML file (see [`MongormConfig::from_toml_str`]), with
//! every field defaulting if the file omits it.

use serde::Deserialize;

use mongorm_tracking::CacheCleanerConfig;

/// Root configuration for a repository context.
///
/// # Examples
///
/// ```
/// use mongorm::config::MongormConfig;
///
/// let toml = r#"
/// mongo_uri = "mongodb://localhost:27017"
/// database = "app"
/// "#;
///
/// let config = MongormConfig::from_toml_str(toml).unwrap();
/// assert_eq!(config.save_slice_size, 1000);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MongormConfig {
    /// Connection string for the document store.
    pub mongo_uri: String,
    /// Target database name.
    pub database: String,
    /// Maximum entries per bulk command.
    #[serde(default = "default_save_slice_size")]
    pub save_slice_size: usize,
    /// Fraction of cache capacity a partial clean-up reclaims.
    #[serde(default = "default_partial_cleanup_percent")]
    pub partial_cleanup_percent: u8,
    /// Cache cleaner timing bounds.
    #[serde(default)]
    pub cache_cleaner: CacheCleanerConfig,
}

impl MongormConfig {
    /// Parses configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or a required field
    /// (`mongo_uri`, `database`) is missing.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Validates cross-field constraints not expressible through `serde`
    /// defaults alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `partial_cleanup_percent` is out of `1..=100`
    /// or the cache cleaner's bounds are inverted.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(1..=100).contains(&self.partial_cleanup_percent) {
            return Err(crate::error::MongormError::Config(format!(
                "partial_cleanup_percent must be in 1..=100, got {}",
                self.partial_cleanup_percent
            )));
        }
        self.cache_cleaner
            .validate()
            .map_err(|e| crate::error::MongormError::Config(e.to_string()))
    }
}

const fn default_save_slice_size() -> usize {
    1000
}

const fn default_partial_cleanup_percent() -> u8 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_must_be_present() {
        let err = MongormConfig::from_toml_str("").unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn defaults_match_spec() {
        let config = MongormConfig::from_toml_str(
            r#"
            mongo_uri = "mongodb://localhost:27017"
            database = "app"
            "#,
        )
        .unwrap();
        assert_eq!(config.save_slice_size, 1000);
        assert_eq!(config.partial_cleanup_percent, 10);
        assert_eq!(config.cache_cleaner.lower_bound_ms, 10_000);
        assert_eq!(config.cache_cleaner.upper_bound_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_partial_cleanup_percent() {
        let config = MongormConfig::from_toml_str(
            r#"
            mongo_uri = "mongodb://localhost:27017"
            database = "app"
            partial_cleanup_percent = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
