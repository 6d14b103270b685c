//! Configuration validation
//!
//! Validates configuration and reports issues.

use std::time::Duration;

use super::types::RuntimeConfig;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &RuntimeConfig) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_catalog_config(config, result);
    result = validate_sessions_config(config, result);
    result = validate_filesystem_config(config, result);
    result = validate_log_config(config, result);

    result
}

fn validate_catalog_config(config: &RuntimeConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.catalog.max_body_load_attempts == 0 {
        result = result.with_error(
            ValidationIssue::new(
                "catalog.max_body_load_attempts",
                "Body loads need at least one attempt",
            )
            .with_suggestion("Use the default of 5"),
        );
    }

    result
}

fn validate_sessions_config(config: &RuntimeConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let sessions = &config.sessions;

    if sessions.max_sessions == 0 {
        result = result.with_error(
            ValidationIssue::new("sessions.max_sessions", "At least one session must be allowed")
                .with_suggestion("Set OPENSKILLS_MAX_SESSIONS or sessions.max_sessions"),
        );
    } else if sessions.max_sessions > 1_000_000 {
        result = result.with_warning(ValidationIssue::new(
            "sessions.max_sessions",
            format!("{} live sessions may use a lot of memory", sessions.max_sessions),
        ));
    }

    if sessions.max_active_skills == 0 {
        result = result.with_error(
            ValidationIssue::new(
                "sessions.max_active_skills",
                "Sessions could never activate a skill",
            )
            .with_suggestion("Set OPENSKILLS_MAX_ACTIVE or sessions.max_active_skills"),
        );
    }

    if sessions.max_commit_attempts == 0 {
        result = result.with_error(ValidationIssue::new(
            "sessions.max_commit_attempts",
            "Activations need at least one commit attempt",
        ));
    }

    match sessions.idle_ttl {
        Some(ttl) if ttl.is_zero() => {
            result = result.with_error(
                ValidationIssue::new("sessions.idle_ttl", "A zero TTL expires every session immediately")
                    .with_suggestion("Use null to disable expiry"),
            );
        }
        None => {
            result = result.with_warning(ValidationIssue::new(
                "sessions.idle_ttl",
                "Idle sessions never expire; only max_sessions bounds the store",
            ));
        }
        _ => {}
    }

    result
}

fn validate_filesystem_config(config: &RuntimeConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let fs = &config.filesystem;

    for root in &fs.roots {
        if !root.is_dir() {
            result = result.with_warning(
                ValidationIssue::new(
                    "filesystem.roots",
                    format!("Skill root does not exist: {}", root.display()),
                )
                .with_suggestion("Create the directory or remove it from filesystem.roots"),
            );
        }
    }

    if fs.script_timeout < Duration::from_millis(100) {
        result = result.with_error(ValidationIssue::new(
            "filesystem.script_timeout",
            "Script timeout is too short to run anything",
        ));
    }

    if fs.max_resource_bytes == 0 || fs.max_output_bytes == 0 {
        result = result.with_error(ValidationIssue::new(
            "filesystem",
            "Resource and output limits must be greater than zero",
        ));
    }

    result
}

fn validate_log_config(config: &RuntimeConfig, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if tracing_subscriber::EnvFilter::try_new(&config.log.level).is_err() {
        result = result.with_error(
            ValidationIssue::new(
                "log.level",
                format!("Invalid log filter: {}", config.log.level),
            )
            .with_suggestion("Use a level such as info or a directive such as openskills=debug"),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = RuntimeConfig::default();
        let result = validate_config(&config);

        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_zero_limits_are_errors() {
        let mut config = RuntimeConfig::default();
        config.sessions.max_sessions = 0;
        config.sessions.max_active_skills = 0;
        config.sessions.idle_ttl = Some(Duration::ZERO);

        let result = validate_config(&config);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_missing_root_and_disabled_ttl_are_warnings() {
        let mut config = RuntimeConfig::default();
        config.filesystem.roots = vec!["/definitely/not/here".into()];
        config.sessions.idle_ttl = None;

        let result = validate_config(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
    }
}
