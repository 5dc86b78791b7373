//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (LEARNHUB__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::Role;
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use crate::import::is_valid_email;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "learnhub.toml",
    ".learnhub.toml",
    "~/.config/learnhub/config.toml",
    "/etc/learnhub/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // First existing default path wins
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g. LEARNHUB__PIPELINE__ROW_TIMEOUT_MS, LEARNHUB__DIRECTORY__EMAILS=a@x.org,b@x.org
    builder = builder.add_source(
        Environment::with_prefix("LEARNHUB")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("directory.emails")
            .with_list_parse_key("directory.roles")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.pipeline.row_timeout_ms == 0 {
        return Err(ConfigError::Invalid {
            message: "pipeline.row_timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.pipeline.batch_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "pipeline.batch_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.audit.capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "audit.capacity must be greater than 0".to_string(),
        });
    }

    validate_current_user(config)?;

    if let Some(email) = config
        .directory
        .emails
        .iter()
        .find(|email| !is_valid_email(email.trim()))
    {
        return Err(ConfigError::Invalid {
            message: format!("directory.emails contains an invalid address: {}", email),
        });
    }

    if config.directory.roles.iter().any(|r| r.trim().is_empty()) {
        return Err(ConfigError::Invalid {
            message: "directory.roles must not contain empty names".to_string(),
        });
    }

    Ok(())
}

fn validate_current_user(config: &AppConfig) -> Result<(), ConfigError> {
    let user = &config.current_user;

    if user.name.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "current_user.name".to_string(),
        });
    }

    if !is_valid_email(user.email.trim()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "current_user.email must be a valid address, got: {}",
                user.email
            ),
        });
    }

    if Role::from_name(&user.role).is_none() {
        return Err(ConfigError::Invalid {
            message: format!(
                "current_user.role must be one of SuperAdmin, Admin, Reviewer, Creator, Translator, got: {}",
                user.role
            ),
        });
    }

    Ok(())
}
