//! Environment variable handling and .env file loading

use crate::error::{AppError, Result};
use crate::models::config::{
    split_list, validate_host, BROKER_REQUESTS_RANGE, ENV_BROKER_REQUESTS, ENV_ENABLE_COLOR,
    ENV_ENDPOINTS, ENV_INTERVAL, ENV_LOG_DIR, ENV_SUSTAINED_SECONDS, INTERVAL_RANGE,
    SUSTAINED_RANGE,
};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the working directory if present. Variables already set
    /// in the environment win over the file.
    pub fn load_env_file(debug: bool) -> Result<bool> {
        if !Path::new(".env").exists() {
            if debug {
                println!("No .env file found, using defaults and CLI arguments");
            }
            return Ok(false);
        }

        dotenv::from_filename(".env")
            .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

        if debug {
            println!("Loaded configuration from .env file");
        }
        Ok(true)
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            ENV_ENDPOINTS => {
                let hosts = split_list(value);
                if hosts.is_empty() {
                    return Err(AppError::config(format!("{} lists no endpoints", ENV_ENDPOINTS)));
                }
                for host in &hosts {
                    validate_host(host)?;
                }
            }
            ENV_INTERVAL => {
                let minutes: u32 = value.trim().parse().map_err(|e| {
                    AppError::config(format!("Invalid {} value '{}': {}", ENV_INTERVAL, value, e))
                })?;
                if !INTERVAL_RANGE.contains(&minutes) {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and 1440, got: {}",
                        ENV_INTERVAL, minutes
                    )));
                }
            }
            ENV_LOG_DIR => {
                if value.trim().is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", ENV_LOG_DIR)));
                }
            }
            ENV_ENABLE_COLOR => {
                value.trim().parse::<bool>().map_err(|e| {
                    AppError::config(format!("Invalid {} value '{}': {}", ENV_ENABLE_COLOR, value, e))
                })?;
            }
            ENV_SUSTAINED_SECONDS => {
                let seconds: u64 = value.trim().parse().map_err(|e| {
                    AppError::config(format!("Invalid {} value '{}': {}", ENV_SUSTAINED_SECONDS, value, e))
                })?;
                if !SUSTAINED_RANGE.contains(&seconds) {
                    return Err(AppError::config(format!(
                        "{} must be between 2 and 600, got: {}",
                        ENV_SUSTAINED_SECONDS, seconds
                    )));
                }
            }
            ENV_BROKER_REQUESTS => {
                let requests: u32 = value.trim().parse().map_err(|e| {
                    AppError::config(format!("Invalid {} value '{}': {}", ENV_BROKER_REQUESTS, value, e))
                })?;
                if !BROKER_REQUESTS_RANGE.contains(&requests) {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and 100, got: {}",
                        ENV_BROKER_REQUESTS, requests
                    )));
                }
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            (ENV_ENDPOINTS, "Comma-separated endpoint hostnames", "rdweb.wvd.microsoft.com,client.wvd.microsoft.com"),
            (ENV_INTERVAL, "Minutes between runs (1-1440)", "5"),
            (ENV_LOG_DIR, "Directory for the log and CSV files", "/var/log/avdmon"),
            (ENV_ENABLE_COLOR, "Enable colored output", "true"),
            (ENV_SUSTAINED_SECONDS, "Sustained-connection test length (2-600)", "30"),
            (ENV_BROKER_REQUESTS, "Broker stress test requests (1-100)", "10"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_validation() {
        assert!(EnvManager::validate_env_var(ENV_ENDPOINTS, "a.example.com, b.example.com").is_ok());
        assert!(EnvManager::validate_env_var(ENV_INTERVAL, "5").is_ok());
        assert!(EnvManager::validate_env_var(ENV_LOG_DIR, "/tmp").is_ok());
        assert!(EnvManager::validate_env_var(ENV_ENABLE_COLOR, "true").is_ok());
        assert!(EnvManager::validate_env_var(ENV_SUSTAINED_SECONDS, "30").is_ok());
        assert!(EnvManager::validate_env_var(ENV_BROKER_REQUESTS, "10").is_ok());

        assert!(EnvManager::validate_env_var(ENV_ENDPOINTS, " , ").is_err());
        assert!(EnvManager::validate_env_var(ENV_ENDPOINTS, "https://a.example.com").is_err());
        assert!(EnvManager::validate_env_var(ENV_INTERVAL, "0").is_err());
        assert!(EnvManager::validate_env_var(ENV_INTERVAL, "1441").is_err());
        assert!(EnvManager::validate_env_var(ENV_LOG_DIR, "  ").is_err());
        assert!(EnvManager::validate_env_var(ENV_ENABLE_COLOR, "maybe").is_err());
        assert!(EnvManager::validate_env_var(ENV_SUSTAINED_SECONDS, "1").is_err());
        assert!(EnvManager::validate_env_var(ENV_BROKER_REQUESTS, "101").is_err());
    }

    #[test]
    fn test_unknown_vars_are_ignored() {
        assert!(EnvManager::validate_env_var("PATH", "anything").is_ok());
    }

    #[test]
    fn test_env_help_lists_every_variable() {
        let help = EnvManager::display_env_help();
        for (var, _, _) in EnvManager::get_supported_env_vars() {
            assert!(help.contains(var), "{} missing from help", var);
        }
        assert!(help.contains("Command-line arguments"));
    }
}
