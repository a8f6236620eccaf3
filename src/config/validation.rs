//! Configuration validation
//!
//! Validates import configuration for correctness:
//! - Positive page, batch and concurrency sizes
//! - Sensible retry delays

use super::import_config::ImportConfig;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an import configuration, reporting every problem at once
pub fn validate_config(config: &ImportConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.page_size == 0 {
        errors.push(ValidationError::new("page_size", "Must be greater than 0"));
    }

    if config.batch_size == 0 {
        errors.push(ValidationError::new("batch_size", "Must be greater than 0"));
    }

    if config.max_concurrent == 0 {
        errors.push(ValidationError::new(
            "max_concurrent",
            "Must be at least 1",
        ));
    }

    if config.retry.initial_delay_ms == 0 {
        errors.push(ValidationError::new(
            "retry.initial_delay_ms",
            "Must be greater than 0",
        ));
    }

    if config.retry.max_delay_ms < config.retry.initial_delay_ms {
        errors.push(ValidationError::new(
            "retry.max_delay_ms",
            format!(
                "Must not be below retry.initial_delay_ms ({})",
                config.retry.initial_delay_ms
            ),
        ));
    }

    if config.database.as_os_str().is_empty() {
        errors.push(ValidationError::new("database", "Path cannot be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and convert to a crate error
pub fn validate_config_result(config: &ImportConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        crate::ImportError::Config(format!(
            "Invalid configuration:\n  {}",
            messages.join("\n  ")
        ))
    })
}
