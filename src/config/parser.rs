//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration:
    /// defaults, then `.env`, then the environment, then CLI flags
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(interval) = self.cli.interval {
            config.interval_minutes = interval;
        }

        if let Some(ref dir) = self.cli.log_dir {
            config.log_dir = dir.clone();
        }

        if !self.cli.endpoints.is_empty() {
            config.endpoints = self.cli.endpoints.clone();
        }

        config.enable_color = self.cli.use_colors(config.enable_color);

        // CLI-only flags
        config.debug = self.cli.debug;
        config.once = self.cli.once;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for the startup banner
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Endpoints: {}", config.endpoints.join(", ")));
    summary.push(format!("Interval: {} min", config.interval_minutes));
    summary.push(format!("Log directory: {}", config.log_dir.display()));
    summary.push(format!("Sustained test: {}s", config.sustained_test_seconds));
    summary.push(format!("Broker stress requests: {}", config.broker_stress_requests));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
