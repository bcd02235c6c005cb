use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - At least one worker
/// - At least one attempt per job
/// - FFmpeg path is set
/// - Timeout, when set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Engine validation
    if config.engine.workers == 0 {
        return Err(ConfigError::ValidationError(
            "engine.workers must be at least 1".to_string(),
        ));
    }

    if config.engine.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "engine.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    // Transcoder validation
    if config.transcoder.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "transcoder.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.transcoder.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0 (omit it to disable the timeout)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.engine.workers = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("engine.workers"));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = Config::default();
        config.engine.retry.max_attempts = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validate_transcoder() {
        let mut config = Config::default();
        config.transcoder.ffmpeg_path = PathBuf::new();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.transcoder.timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());

        config.transcoder.timeout_secs = Some(30);
        assert!(validate_config(&config).is_ok());
    }
}
