//! AVD Connectivity Monitor - command-line entry point
//!
//! Runs the diagnostic suite against the configured endpoints every
//! interval until interrupted with Ctrl+C.

use avd_connectivity_monitor::{
    cli::{supports_color, Cli},
    config::{display_config_summary, load_config, EnvManager},
    error::{AppError, Result},
    output::print_banner,
    DiagnosticSuite, Logger, Reporter, Scheduler, SystemProbe,
};
use clap::Parser;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();

    if let Err(e) = run_application(cli).await {
        eprintln!("{}", e.format_for_console(supports_color()));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    let config = load_config(cli)?;
    if !config.enable_color {
        colored::control::set_override(false);
    }

    let logger = Arc::new(Logger::for_config(&config)?);
    print_banner(&config, &logger, &config.log_dir);
    for warning in EnvManager::validate_current_env() {
        logger.warning(warning).log();
    }
    if config.debug {
        for line in display_config_summary(&config).lines() {
            logger.debug(line).log();
        }
    }

    let probe = Arc::new(SystemProbe::new()?);
    let suite = Arc::new(DiagnosticSuite::new(probe, logger.clone(), &config));
    let reporter = Reporter::for_config(logger.clone(), &config);
    let mut scheduler = Scheduler::new(suite, reporter, logger.clone(), config.interval());
    if config.once {
        scheduler = scheduler.with_max_runs(1);
    }

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            shutdown_logger
                .warning("Cannot listen for Ctrl+C; stop the process to end monitoring")
                .error_info(&AppError::from(e))
                .log();
            std::future::pending::<()>().await;
        }
    };

    scheduler.run_until(shutdown).await;
    Ok(())
}

/// Print helpful suggestions for startup errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Endpoints are bare host names, without scheme or path");
            eprintln!("  - The interval is a whole number of minutes between 1 and 1440");
            eprintln!("  - Run with --help to list supported environment variables");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("File system help:");
            eprintln!("  - Check that the log directory exists or can be created");
            eprintln!("  - Verify you have write permission to it (see --log-dir)");
        }
        _ => {}
    }
}
