use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ValidationResult};

/// Application state shared by every command: validated configuration and
/// the directories derived from it.
#[derive(Debug, Clone)]
pub struct App {
    config: Arc<Config>,
    validation: ValidationResult,
}

impl App {
    /// Build an application around an already-loaded configuration.
    ///
    /// Fails when the configuration has validation errors.
    pub fn from_config(config: Config) -> Result<Self> {
        let validation = config.validate();
        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        tracing::info!(
            "Application configured for backend {} ({} warnings)",
            config.backend.url,
            validation.warnings.len()
        );

        Ok(Self {
            config: Arc::new(config),
            validation,
        })
    }

    /// Shared handle to the config for long-lived tasks
    pub fn config_arc(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Warnings produced while validating the config
    pub fn warnings(&self) -> &[crate::config::ConfigValidationError] {
        &self.validation.warnings
    }

    /// Directory holding the persisted auth session
    pub fn tokens_dir(&self) -> PathBuf {
        self.config.config_dir.join("tokens")
    }
}
