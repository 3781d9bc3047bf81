//! Configuration validation rules.

use super::schema::Config;

const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.agent.model.trim().is_empty() {
        errors.push("agent.model must not be empty".to_string());
    }
    if config.agent.system_instruction.trim().is_empty() {
        errors.push("agent.system_instruction must not be empty".to_string());
    }
    if config.store.path.trim().is_empty() {
        errors.push("store.path must not be empty".to_string());
    }
    if config.logging.dir.trim().is_empty() {
        errors.push("logging.dir must not be empty".to_string());
    }
    if !LOG_FORMATS.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(format!(
            "logging.format must be one of {}",
            LOG_FORMATS.join(", ")
        ));
    }
    if let Some(base) = &config.providers.gemini.api_base {
        let base = base.trim();
        if !base.is_empty() && !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push("providers.gemini.api_base must be an http(s) URL".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.store.path = String::new();
        config.logging.format = "yaml".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("store.path"));
        assert!(err.contains("logging.format"));
    }

    #[test]
    fn test_validate_api_base_scheme() {
        let mut config = Config::default();
        config.providers.gemini.api_base = Some("generativelanguage.googleapis.com".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("providers.gemini.api_base"));
    }
}
