//! Command-line client for a MIYO Cube.
//!
//!   cubelink --host 192.168.1.20 link
//!   cubelink status
//!   cubelink irrigate start '{circuit-id}' --duration 10
//!   cubelink edit '{circuit-id}' automatic-mode false

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cubelink_client::{Connection, CubeHttp};
use cubelink_core::{Command, DeviceId, RawFrame, StateType, topology::short_name};
use cubelink_daemon::{ConfigArgs, ConfigError, DaemonConfig};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "cubelink", version, about = "Control a MIYO Cube")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Request an api key. Press the Cube's link button first.
    Link,
    /// Show system status and circuits.
    Status,
    /// Start or stop irrigation.
    Irrigate {
        #[command(subcommand)]
        action: Irrigate,
    },
    /// Change a circuit setting.
    Edit {
        circuit: DeviceId,
        #[arg(value_enum)]
        setting: Setting,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
}

#[derive(Debug, Subcommand)]
enum Irrigate {
    Start {
        circuit: DeviceId,
        /// Minutes (1-60). Defaults to the circuit's configured duration.
        #[arg(long, short)]
        duration: Option<u32>,
    },
    Stop {
        circuit: DeviceId,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Setting {
    AutomaticMode,
    ValveStaggering,
}

impl From<Setting> for StateType {
    fn from(setting: Setting) -> Self {
        match setting {
            Setting::AutomaticMode => StateType::AutomaticMode,
            Setting::ValveStaggering => StateType::ValveStaggering,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cubelink_daemon::init_logging(cli.verbose)?;

    match cli.command {
        Cmd::Link => link(&cli.config).await,
        Cmd::Status => status(&cli.config.load()?).await,
        Cmd::Irrigate { action } => {
            let command = match action {
                Irrigate::Start { circuit, duration } => {
                    Command::start_irrigation(&circuit, duration)?
                }
                Irrigate::Stop { circuit } => Command::stop_irrigation(&circuit),
            };
            send(&cli.config.load()?, &command).await
        }
        Cmd::Edit {
            circuit,
            setting,
            value,
        } => {
            let command = Command::edit_circuit(&circuit, &StateType::from(setting), value);
            send(&cli.config.load()?, &command).await
        }
    }
}

async fn link(args: &ConfigArgs) -> anyhow::Result<()> {
    let file = args.merged()?;
    let host = file.host.ok_or(ConfigError::Missing("host"))?;
    let port = file.http_port.unwrap_or(cubelink_daemon::DEFAULT_HTTP_PORT);
    let http = CubeHttp::new(format!("http://{host}:{port}"), "", CubeHttp::DEFAULT_TIMEOUT)?;

    let key = http
        .link()
        .await
        .context("link refused; press the link button on the Cube and retry")?;
    println!("{key}");
    Ok(())
}

async fn status(config: &DaemonConfig) -> anyhow::Result<()> {
    let http = config.http_client()?;
    let status = http.system_status().await?;
    let circuits = http.circuits().await?;

    println!("cube {} at {}", status.uuid, config.host);
    for circuit in &circuits {
        println!(
            "circuit {} {}",
            circuit.id.braced(),
            circuit.name.as_deref().unwrap_or("(unnamed)")
        );
        for (setting, value) in &circuit.params {
            println!("  {setting}: {value}");
        }
        if let Some(sensor) = &circuit.sensor {
            let name = sensor.ip.as_deref().map(short_name).unwrap_or_default();
            println!("  sensor {} {name}", sensor.id.braced());
            for (st, value) in &sensor.state_types {
                println!("    {st}: {value}");
            }
        }
        for valve in &circuit.valves {
            let name = valve.ip.as_deref().map(short_name).unwrap_or_default();
            println!("  valve {} {name} channel {}", valve.id.braced(), valve.channel);
        }
    }
    Ok(())
}

/// Connect, send one command, and disconnect.
async fn send(config: &DaemonConfig, command: &Command) -> anyhow::Result<()> {
    let connection = Connection::new(config.connection_config(), |_frame: RawFrame| {});
    connection.start();

    let wait = config.idle_timeout.min(Duration::from_secs(10));
    if !connection.wait_connected(wait).await {
        connection.stop().await;
        bail!("could not connect to {} within {wait:?}", config.connection_config().url);
    }
    connection.send(command).await;
    connection.stop().await;
    tracing::info!(method = command.method(), "command sent");
    Ok(())
}
