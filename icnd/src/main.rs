use std::fs::OpenOptions;
use std::process;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use log::{error, info};
use serde::Serialize;
use tokio::signal;

mod config;
mod connections;
mod daemon;

use config::{Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use daemon::Daemon;
use icn_forwarder::ProcessorStatus;

/// Final report printed with `--stats-json`
#[derive(Serialize)]
struct StatsReport {
    timestamp: String,
    daemon: String,
    status: ProcessorStatus,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(logging.level.as_str()),
    );
    if let Some(path) = &logging.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = Command::new("icnd")
        .version("0.1.0")
        .about("ICN forwarder daemon")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Print the effective configuration as TOML and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats-json")
                .long("stats-json")
                .help("Print the final forwarder statistics as JSON on shutdown")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    if matches.get_flag("dump-config") {
        match toml::to_string_pretty(&config) {
            Ok(contents) => print!("{}", contents),
            Err(e) => {
                eprintln!("Failed to serialize configuration: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        process::exit(1);
    }

    info!("Starting ICN forwarder daemon");
    info!("Config file: {}", config_path);

    let mut daemon = Daemon::new(config);
    if let Err(e) = daemon.start().await {
        error!("Failed to start daemon: {:#}", e);
        process::exit(1);
    }

    info!("{} started successfully", daemon.config().daemon.name);

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for ctrl+c: {}", e);
    }

    info!("Shutting down ICN forwarder daemon");
    let status = daemon.stop().await;

    if matches.get_flag("stats-json") {
        let Some(status) = status else {
            error!("No final statistics available");
            process::exit(1);
        };
        let report = StatsReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            daemon: daemon.config().daemon.name.clone(),
            status,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize statistics: {}", e);
                process::exit(1);
            }
        }
    }
}
