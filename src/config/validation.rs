//! Configuration validation logic.

use crate::config::loader::Config;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.options.retries == 0 {
        return Err(Error::ConfigValidation {
            field: "retries".to_string(),
            message: "At least one attempt is required".to_string(),
        });
    }

    if config.pools.resolver_workers == 0 || config.pools.download_workers == 0 {
        return Err(Error::ConfigValidation {
            field: "pools".to_string(),
            message: "Worker pool sizes must be at least 1".to_string(),
        });
    }

    if config.pools.queue_capacity == 0 {
        return Err(Error::ConfigValidation {
            field: "queue_capacity".to_string(),
            message: "Queue capacity must be at least 1".to_string(),
        });
    }

    if config.rate_limit.initial_delay_seconds < 0.0 {
        return Err(Error::ConfigValidation {
            field: "initial_delay_seconds".to_string(),
            message: "Delay cannot be negative".to_string(),
        });
    }

    if config.rate_limit.backoff_factor < 0.0 {
        return Err(Error::ConfigValidation {
            field: "backoff_factor".to_string(),
            message: "Backoff factor cannot be negative".to_string(),
        });
    }

    if config.rate_limit.max_penalty_weight == 0 {
        return Err(Error::ConfigValidation {
            field: "max_penalty_weight".to_string(),
            message: "Max penalty weight must be at least 1".to_string(),
        });
    }

    for ext in &config.options.extensions {
        if ext.starts_with('.') || ext.contains('/') {
            return Err(Error::ConfigValidation {
                field: "extensions".to_string(),
                message: format!(
                    "Extension '{}' must be given without a leading dot (e.g. \"jpg\")",
                    ext
                ),
            });
        }
    }

    Ok(())
}
