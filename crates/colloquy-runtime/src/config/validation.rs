//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ColloquyConfig, LogOutput, LoggingConfig, StorageBackend, StorageConfig};
use colloquy_dialog::DialogOptions;

/// Validates the entire configuration.
pub fn validate_config(config: &ColloquyConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dialog_options(&config.dialog)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter module name cannot be empty: {module:?}"
        )));
    }

    Ok(())
}

fn validate_dialog_options(dialog: &DialogOptions) -> ConfigResult<()> {
    if dialog.max_steps_per_turn == 0 {
        return Err(ConfigError::validation(
            "dialog.max_steps_per_turn must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_storage_config(storage: &StorageConfig) -> ConfigResult<()> {
    match storage.backend {
        StorageBackend::Memory => Ok(()),
        StorageBackend::File => match &storage.base_dir {
            None => Err(ConfigError::missing_field("storage.base_dir")),
            Some(dir) if dir.as_os_str().is_empty() => Err(ConfigError::validation(
                "storage.base_dir cannot be empty",
            )),
            Some(_) => Ok(()),
        },
    }
}
