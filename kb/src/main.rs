//! kickbot - quorum-based game formation
//!
//! CLI entry point: runs a command session on stdin against a console announcer.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use kickbot::cli::{Cli, Command};
use kickbot::config::Config;
use kickbot::{ConsoleAnnouncer, FormationCoordinator, Session};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kickbot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("kickbot.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(timeout_secs = config.formation.timeout_secs, "kickbot loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Run) | None => cmd_run(&config).await,
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}

async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let coordinator = FormationCoordinator::new(config.formation.clone(), Arc::new(ConsoleAnnouncer::new()));
    let session = Session::new(coordinator.clone());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = session.run(stdin) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    let report = coordinator.shutdown(config.formation.shutdown_grace()).await;
    let summary = format!(
        "shutdown: {} drained, {} cleaned up, {} failed",
        report.drained, report.cleaned_up, report.failed
    );
    if report.timed_out || report.failed > 0 {
        println!("{} (cleanup incomplete)", summary.yellow());
    } else {
        println!("{}", summary.dimmed());
    }
    Ok(())
}
