//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::filters::FILTER_NAMES;
use crate::output::OutputFormat;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.workers == 0 {
            return Err(ConfigError::ValidationError(
                "pool.workers must be > 0".into(),
            ));
        }
        if self.batch.size == 0 {
            return Err(ConfigError::ValidationError(
                "batch.size must be > 0".into(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.timeout_ms must be > 0".into(),
            ));
        }
        if self.fetch.max_download_mb == 0 {
            return Err(ConfigError::ValidationError(
                "fetch.max_download_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.filter_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.filter_timeout_ms must be > 0".into(),
            ));
        }
        if self.filters.thumbnail_size == 0 {
            return Err(ConfigError::ValidationError(
                "filters.thumbnail_size must be > 0".into(),
            ));
        }
        if !(self.filters.blur_sigma > 0.0) {
            return Err(ConfigError::ValidationError(
                "filters.blur_sigma must be > 0.0".into(),
            ));
        }
        if self.filters.enabled.is_empty() {
            return Err(ConfigError::ValidationError(
                "filters.enabled must name at least one filter".into(),
            ));
        }
        if let Some(unknown) = self
            .filters
            .enabled
            .iter()
            .find(|name| !FILTER_NAMES.contains(&name.as_str()))
        {
            return Err(ConfigError::ValidationError(format!(
                "filters.enabled contains unknown filter '{unknown}' (available: {})",
                FILTER_NAMES.join(", ")
            )));
        }
        if !matches!(
            self.filters.output_format.to_lowercase().as_str(),
            "png" | "jpeg" | "jpg" | "webp"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "filters.output_format '{}' is not one of png, jpeg, webp",
                self.filters.output_format
            )));
        }
        if OutputFormat::parse(&self.output.format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.format '{}' is not one of json, jsonl",
                self.output.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.pool.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pool.workers"));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.batch.size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch.size"));
    }

    #[test]
    fn test_validate_rejects_unknown_filter() {
        let mut config = Config::default();
        config.filters.enabled = vec!["grayscale".to_string(), "sepia".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sepia"));
    }

    #[test]
    fn test_validate_rejects_empty_filter_set() {
        let mut config = Config::default();
        config.filters.enabled.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("filters.enabled"));
    }

    #[test]
    fn test_validate_rejects_bad_formats() {
        let mut config = Config::default();
        config.filters.output_format = "tga".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.format = "xml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output.format"));
    }

    #[test]
    fn test_validate_rejects_non_positive_sigma() {
        let mut config = Config::default();
        config.filters.blur_sigma = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("blur_sigma"));
    }
}
