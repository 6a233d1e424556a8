pub mod config;
pub mod control;
pub mod joystick;
pub mod messages;

use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};
use tokio::sync::watch;
use tracing::{error, info, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::control::ControlNodeHandle;
use crate::joystick::CollectorHandle;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = match parse_args()? {
        CliAction::Run(path) => path,
        CliAction::Exit => return Ok(()),
    };

    // Configuration is frozen from here on; a failed load never reaches the
    // control loop.
    let (config, raw_config) =
        config::load_or_init(config_path).map_err(|e| eyre!("Configuration error: {}", e))?;

    if config.engage_speed_module || config.engage_steering_module {
        info!("Speed module set to engage: {}", config.engage_speed_module);
        info!(
            "Steering module set to engage: {}",
            config.engage_steering_module
        );
    } else {
        error!("No module has been set to engage, commands will stay in mode 0");
    }

    // Latched config echo: late subscribers always see the snapshot.
    let (config_echo_tx, _config_echo_rx) = watch::channel(raw_config);

    let mut node_handle = ControlNodeHandle::new();
    let (input_sender, mut command_receiver) = node_handle
        .start(config)
        .map_err(|e| eyre!("Failed to start control node: {}", e))?;

    let collector = CollectorHandle::spawn(None, input_sender)
        .map_err(|e| eyre!("Failed to spawn joystick collector: {}", e))?;

    // The transport attaches here; until one exists, drain and trace the
    // command stream so the node never backs up on a full channel.
    let command_sink = tokio::spawn(async move {
        while let Some(command) = command_receiver.recv().await {
            trace!("Command ready for transport: {:?}", command);
        }
        warn!("Command stream ended");
    });

    info!("dbw-teleop running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    node_handle
        .shutdown()
        .await
        .map_err(|e| eyre!("Control node shutdown failed: {}", e))?;
    collector.abort();
    command_sink.abort();
    drop(config_echo_tx);

    Ok(())
}

enum CliAction {
    Run(Option<PathBuf>),
    Exit,
}

/// Minimal argument handling: `-h` for help, `-f <file.toml>` to override
/// the config location.
fn parse_args() -> Result<CliAction> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Joystick controller for drive-by-wire speed and steering modules");
                println!("    -h             Show this help menu and exit.");
                println!("    -f <file.toml> Configuration file for all parameters.");
                println!("                   Defaults to the per-user config directory.");
                return Ok(CliAction::Exit);
            }
            "-f" | "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => return Err(eyre!("-f requires a file path")),
            },
            other => return Err(eyre!("Unknown argument: {}", other)),
        }
    }

    Ok(CliAction::Run(config_path))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
