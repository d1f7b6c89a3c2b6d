//! Command-line interface

use crate::config::EnvManager;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// AVD Connectivity Monitor - periodic network diagnostics for Azure Virtual Desktop
#[derive(Parser, Debug, Clone)]
#[command(name = "avdmon")]
#[command(version, about, long_about = None)]
#[command(after_long_help = EnvManager::display_env_help())]
pub struct Cli {
    /// Minutes between diagnostic runs (1-1440) [default: 5]
    #[arg(short, long, value_name = "MINUTES", value_parser = parse_interval)]
    pub interval: Option<u32>,

    /// Directory for the session log and daily CSV [default: current directory]
    #[arg(short, long, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    /// Endpoint hostname to test (can be used multiple times)
    #[arg(short, long = "endpoint", value_name = "HOST", action = ArgAction::Append)]
    pub endpoints: Vec<String>,

    /// Run the diagnostic suite once and exit
    #[arg(long)]
    pub once: bool,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Color preference expressed on the command line, if any
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled, given the configured preference
    pub fn use_colors(&self, configured: bool) -> bool {
        self.color_override()
            .unwrap_or_else(|| configured && supports_color())
    }
}

/// Parse the run interval in whole minutes
fn parse_interval(s: &str) -> Result<u32, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid interval: {}", s));
    }

    s.parse::<u32>()
        .map_err(|_| format!("Invalid interval: {}", s))
        .and_then(|minutes| {
            if minutes == 0 {
                Err("Interval must be at least 1 minute".to_string())
            } else if minutes > 1440 {
                Err("Interval cannot exceed 1440 minutes (24 hours)".to_string())
            } else {
                Ok(minutes)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        // Windows 10+ terminals handle ANSI; colored enables VT processing
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let cli = Cli::parse_from(["avdmon"]);
        assert_eq!(cli.interval, None);
        assert_eq!(cli.log_dir, None);
        assert!(cli.endpoints.is_empty());
        assert!(!cli.once);
        assert!(!cli.debug);
        assert_eq!(cli.color_override(), None);
    }

    #[test]
    fn test_cli_parsing_all_options() {
        let cli = Cli::parse_from([
            "avdmon",
            "--interval", "15",
            "--log-dir", "/tmp/avd",
            "--endpoint", "a.example.com",
            "--endpoint", "b.example.com",
            "--once",
            "--no-color",
            "--debug",
        ]);

        assert_eq!(cli.interval, Some(15));
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/avd")));
        assert_eq!(cli.endpoints, vec!["a.example.com", "b.example.com"]);
        assert!(cli.once);
        assert!(cli.debug);
        assert_eq!(cli.color_override(), Some(false));
        assert!(!cli.use_colors(true));
    }

    #[test]
    fn test_color_flags_conflict() {
        assert!(Cli::try_parse_from(["avdmon", "--color", "--no-color"]).is_err());
        let forced = Cli::parse_from(["avdmon", "--color"]);
        assert!(forced.use_colors(false));
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!(parse_interval("1").unwrap(), 1);
        assert_eq!(parse_interval("5").unwrap(), 5);
        assert_eq!(parse_interval("1440").unwrap(), 1440);

        assert!(parse_interval("0").is_err());
        assert!(parse_interval("1441").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("2.5").is_err());
        assert!(parse_interval("+10").is_err());
        assert!(parse_interval("0x10").is_err());
        assert!(parse_interval("-5").is_err());
    }

    #[test]
    fn test_invalid_interval_rejected_by_parser() {
        assert!(Cli::try_parse_from(["avdmon", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["avdmon", "--interval", "abc"]).is_err());
    }
}
