use crate::config::types::{Config, FetcherConfig, NotifyConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;

    if config.schedule.interval_minutes < 1 {
        return Err(ConfigError::Validation(
            "interval_minutes must be >= 1".to_string(),
        ));
    }

    if let Some(notify) = &config.notify {
        validate_notify_config(notify)?;
    }

    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("snapshots_dir", &config.snapshots_dir),
        ("exports_dir", &config.exports_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    if let Some(webhook) = &config.webhook_url {
        Url::parse(webhook)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webhook_url: {}", e)))?;
    }
    Ok(())
}

fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Source name cannot be empty".to_string(),
            ));
        }

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source name '{}'",
                source.name
            )));
        }

        let url = Url::parse(&source.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL for source '{}': {}", source.name, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Source '{}' must use http or https, got '{}'",
                source.name,
                url.scheme()
            )));
        }

        let selectors = source.selectors();
        for selector in [
            &selectors.list,
            &selectors.title,
            &selectors.link,
            &selectors.content,
            &selectors.price,
        ]
        .into_iter()
        .flatten()
        {
            validate_selector(&source.name, selector)?;
        }
    }

    Ok(())
}

fn validate_selector(source: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector).map_err(|e| {
        ConfigError::InvalidSelector(format!(
            "Source '{}' has invalid selector '{}': {:?}",
            source, selector, e
        ))
    })?;
    Ok(())
}
