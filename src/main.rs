// Tracing since it's used project wide for logging
#[macro_use]
extern crate tracing;

use std::io::{BufWriter, Write as _};

use anyhow::Context;
use cdk_input::device::DeviceType;
use cdk_input::replay::{self, Replay};
use cdk_input::Display;
use cdk_input_config::Config;
use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cfg!(debug_assertions) {
            "debug"
        } else {
            "error,warn,cdk_input=info"
        })
    });
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = std::env!("CARGO_PKG_VERSION"),
        git_hash = std::option_env!("GIT_HASH").unwrap_or("Unknown"),
        "Starting cdk-input."
    );

    let cli = cli::Cli::parse();
    match cli.command {
        cli::Command::CheckConfiguration => {
            let (_, path) =
                cdk_input_config::load(cli.config_path).context("Invalid configuration")?;
            match path {
                Some(path) => println!("{} is valid", path.display()),
                None => println!("No configuration file, using defaults"),
            }
            Ok(())
        }
        cli::Command::Replay { trace, json } => {
            let config = load_config(cli.config_path);
            let trace = replay::load(&trace)
                .with_context(|| format!("Failed to load trace {}", trace.display()))?;
            let mut runner = Replay::new(&trace, config).context("Failed to set up the trace")?;
            let events = runner.run(&trace.steps).context("Failed to replay the trace")?;

            let mut writer = BufWriter::new(std::io::stdout());
            for event in &events {
                if json {
                    writeln!(&mut writer, "{}", serde_json::to_string(event)?)?;
                } else {
                    writeln!(&mut writer, "{}", replay::format_event(runner.display(), event))?;
                }
            }
            writer.flush()?;
            Ok(())
        }
        cli::Command::Devices { trace, json } => {
            let config = load_config(cli.config_path);
            let trace = replay::load(&trace)
                .with_context(|| format!("Failed to load trace {}", trace.display()))?;
            let runner = Replay::new(&trace, config).context("Failed to set up the trace")?;
            print_devices(runner.display(), json)
        }
    }
}

/// Load the configuration, falling back to the defaults when it is invalid.
fn load_config(path: Option<std::path::PathBuf>) -> Config {
    match cdk_input_config::load(path) {
        Ok((config, path)) => {
            info!(?path, "Loaded config.");
            config
        }
        Err(err) => {
            error!(%err, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

fn print_devices(display: &Display, json: bool) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(std::io::stdout());
    for device_type in [DeviceType::Master, DeviceType::Slave, DeviceType::Floating] {
        for id in display.list_devices(device_type) {
            let Some(device) = display.devices().get(id) else {
                continue;
            };
            if json {
                writeln!(&mut writer, "{}", serde_json::to_string(device)?)?;
                continue;
            }

            writeln!(&mut writer, "{:?} device {}: {}", device_type, id, device.name)?;
            writeln!(&mut writer, "\tSource: {:?}", device.source)?;
            writeln!(&mut writer, "\tMode: {:?}", device.mode)?;
            if let Some(associated) = device.associated {
                writeln!(&mut writer, "\tAssociated: {associated}")?;
            }
            if let Some(active_slave) = device.active_slave() {
                writeln!(&mut writer, "\tActive slave: {active_slave}")?;
            }
            if !device.axes.is_empty() {
                writeln!(&mut writer, "\tAxes:")?;
                for axis in &device.axes {
                    writeln!(
                        &mut writer,
                        "\t\t{:?} {}..{} resolution {}",
                        axis.axis_use, axis.min_value, axis.max_value, axis.resolution
                    )?;
                }
            }
            writeln!(&mut writer, "---")?;
        }
    }
    writer.flush()?;
    Ok(())
}
