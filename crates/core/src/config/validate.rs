use super::{types::Config, ApiConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - API domain and key are present
/// - API scheme is http or https
/// - Poller budget is at least one attempt
/// - Server port is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;

    if config.poller.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "poller.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate the remote API section on its own.
///
/// Used by the HTTP client constructor so a client can never be built
/// without a host or credential.
pub(crate) fn validate_api_config(api: &ApiConfig) -> Result<(), ConfigError> {
    if api.domain.trim().is_empty() {
        return Err(ConfigError::MissingField("api.domain"));
    }
    if api.api_key.trim().is_empty() {
        return Err(ConfigError::MissingField("api.api_key"));
    }
    if api.scheme != "http" && api.scheme != "https" {
        return Err(ConfigError::ValidationError(format!(
            "api.scheme must be http or https, got '{}'",
            api.scheme
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PollerConfig, ServerConfig};

    fn valid_config() -> Config {
        Config {
            api: ApiConfig::new("tryon.example.com", "secret"),
            poller: PollerConfig::default(),
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_domain() {
        let mut config = valid_config();
        config.api.domain = "".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("api.domain")));
    }

    #[test]
    fn test_validate_missing_api_key() {
        let mut config = valid_config();
        config.api.api_key = "   ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("api.api_key")));
    }

    #[test]
    fn test_validate_bad_scheme() {
        let mut config = valid_config();
        config.api.scheme = "ftp".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = valid_config();
        config.poller.max_attempts = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
