use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Bot token is not empty
/// - Poll timeout is not 0
/// - Server port is not 0
/// - Storage data dir is not empty
/// - Cover bounds are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Bot validation
    if config.bot.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "bot.token cannot be empty".to_string(),
        ));
    }
    if config.bot.poll_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "bot.poll_timeout_secs cannot be 0".to_string(),
        ));
    }

    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Storage validation
    if config.storage.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.data_dir cannot be empty".to_string(),
        ));
    }

    // Cover validation
    if config.covers.max_photo_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "covers.max_photo_bytes cannot be 0".to_string(),
        ));
    }
    if config.covers.max_width == 0 {
        return Err(ConfigError::ValidationError(
            "covers.max_width cannot be 0".to_string(),
        ));
    }

    Ok(())
}
