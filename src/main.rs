//! Telemetry agent entry point
//!
//! Loads configuration, builds the agent with its injected transport, and
//! runs it until an interrupt or termination signal triggers the graceful
//! shutdown sequence. The only fatal runtime error is a failed initial
//! broker connection.

use clap::{Parser, Subcommand};
use sensor_agent::config::AgentConfig;
use sensor_agent::error::AgentResult;
use sensor_agent::observability::init_default_logging;
use sensor_agent::sensor::VirtualSensor;
use sensor_agent::transport::mqtt::MqttConnection;
use sensor_agent::Agent;
use std::path::PathBuf;
use std::process;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

/// Virtual sensor that publishes telemetry to an MQTT broker
#[derive(Parser)]
#[command(name = "sensor-agent")]
#[command(about = "Virtual environment sensor publishing telemetry over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting sensor-agent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_agent(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Agent shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AgentConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["sensor-agent.toml", "config/sensor-agent.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Provide one with -c/--config or create sensor-agent.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_agent(config: AgentConfig) -> AgentResult<()> {
    info!(device_id = %config.device.id, "Agent starting");

    let connection = MqttConnection::new(&config.device.id, config.mqtt.clone())?;
    let sensor = VirtualSensor::new();
    let mut agent = Agent::new(config, connection, Box::new(sensor));

    // The one fatal path: without an initial session there is nothing to run.
    if let Err(e) = agent.start().await {
        error!(error = %e, "Could not establish the initial broker connection");
        error!(
            "Check the broker URL, that the credential environment variables are set, \
             and that the broker allows this client id to publish"
        );
        return Err(e.into());
    }

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let shutdown = agent.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        }
        shutdown.request();
    });

    agent.run().await;

    signal_task.abort();
    agent.shutdown().await?;
    Ok(())
}

fn handle_config_command(
    config: AgentConfig,
    show: bool,
) -> AgentResult<()> {
    if show {
        match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => error!("Failed to render configuration: {}", e),
        }
    }

    info!("Configuration validation complete");
    Ok(())
}
