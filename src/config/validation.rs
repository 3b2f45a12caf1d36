use crate::config::types::{Config, HarvestConfig, HttpConfig, OutputConfig};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};

/// Upper bound on workers; the upstream starts blocking well before this
const MAX_CONCURRENCY: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_locales(&config.locales)?;
    validate_harvest_config(&config.harvest)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the locale list
fn validate_locales(locales: &[String]) -> Result<(), ConfigError> {
    for locale in locales {
        if locale.trim().is_empty() {
            return Err(ConfigError::Validation(
                "locales cannot contain empty entries".to_string(),
            ));
        }

        if locale.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "locale '{}' must not contain path separators",
                locale
            )));
        }
    }

    Ok(())
}

/// Validates worker pool and retry settings
pub fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) must not exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.progress_interval == 0 {
        return Err(ConfigError::Validation(
            "progress-interval must be greater than 0".to_string(),
        ));
    }

    if config.identity_param.is_empty() {
        return Err(ConfigError::Validation(
            "identity-param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every configured header is sendable
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    for (name, value) in config.header_pairs() {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("'{}': {}", name, e)))?;
        HeaderValue::from_str(&value)
            .map_err(|e| ConfigError::InvalidHeader(format!("value of '{}': {}", name, e)))?;
    }

    Ok(())
}

/// Validates input and output locations
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.urls_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "urls-dir cannot be empty".to_string(),
        ));
    }

    if config.dumps_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "dumps-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut config = Config::default();
        config.harvest.concurrency = 0;
        assert!(validate(&config).is_err());

        config.harvest.concurrency = MAX_CONCURRENCY + 1;
        assert!(validate(&config).is_err());

        config.harvest.concurrency = 1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_retries_allowed() {
        let mut config = Config::default();
        config.harvest.retries = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_timeout() {
        let mut config = Config::default();
        config.harvest.timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_jitter_range() {
        let mut config = Config::default();
        config.harvest.jitter_min_ms = 300;
        config.harvest.jitter_max_ms = 100;
        assert!(validate(&config).is_err());

        config.harvest.jitter_min_ms = 0;
        config.harvest.jitter_max_ms = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_identity_param() {
        let mut config = Config::default();
        config.harvest.identity_param = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_locale() {
        let mut config = Config::default();
        config.locales = vec!["en".to_string(), " ".to_string()];
        assert!(validate(&config).is_err());

        config.locales = vec!["../etc".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_header_name() {
        let mut config = Config::default();
        config
            .http
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_invalid_header_value() {
        let mut config = Config::default();
        config.http.referer = Some("line\nbreak".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_empty_dirs() {
        let mut config = Config::default();
        config.output.dumps_dir = PathBuf::new();
        assert!(validate(&config).is_err());
    }
}
